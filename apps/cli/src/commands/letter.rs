//! Unsent letter commands.

use super::{require_session, AppContext, Globals, LETTER_SIGN_IN};
use crate::output::{self, OutputFormat};
use anyhow::{bail, Result};
use fixitkit_store::LetterDraft;
use std::io::{self, Read};

const PREVIEW_CHARS: usize = 60;

/// Write a letter from the argument, or from stdin when none is given.
pub async fn letter_write(ctx: &AppContext, globals: &Globals, text: Option<String>) -> Result<()> {
    if !require_session(ctx, globals, LETTER_SIGN_IN).await? {
        return Ok(());
    }

    let content = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    if content.trim().is_empty() {
        bail!("Letter is empty");
    }

    let letter = ctx.letters.add(LetterDraft::new(content)).await?;

    match globals.format {
        OutputFormat::Text => println!("Saved letter {} ({})", letter.id, letter.date),
        OutputFormat::Json => output::print_json(&letter),
    }
    Ok(())
}

pub async fn letter_list(ctx: &AppContext, globals: &Globals) -> Result<()> {
    if !ctx.provider.is_authenticated() {
        output::print_notice(LETTER_SIGN_IN, &globals.format);
        return Ok(());
    }

    ctx.letters.refresh().await?;
    let list = ctx.letters.list();

    match globals.format {
        OutputFormat::Text => {
            if list.is_empty() {
                println!("No letters yet.");
                return Ok(());
            }
            output::print_heading("Unsent letters");
            for letter in list.iter() {
                let body = if letter.burned {
                    "(burned)".to_string()
                } else {
                    output::preview(&letter.content, PREVIEW_CHARS)
                };
                println!("  {}  {:<10} {}", letter.id, letter.date, body);
            }
        }
        OutputFormat::Json => output::print_json(&*list),
    }
    Ok(())
}

/// Burn a letter. It cannot be restored.
pub async fn letter_burn(ctx: &AppContext, globals: &Globals, id: &str) -> Result<()> {
    if !require_session(ctx, globals, LETTER_SIGN_IN).await? {
        return Ok(());
    }

    let letter = ctx.letters.burn(id).await?;
    match globals.format {
        OutputFormat::Text => println!("Burned letter from {}", letter.date),
        OutputFormat::Json => output::print_json(&letter),
    }
    Ok(())
}

pub async fn letter_delete(ctx: &AppContext, globals: &Globals, id: &str) -> Result<()> {
    if !require_session(ctx, globals, LETTER_SIGN_IN).await? {
        return Ok(());
    }

    ctx.letters.delete(id).await?;
    output::print_success(&format!("Deleted letter {}", id), &globals.format);
    Ok(())
}
