//! CLI command implementations.

mod auth;
mod letter;
mod mood;

pub use auth::{login, logout, signup, status};
pub use letter::{letter_burn, letter_delete, letter_list, letter_write};
pub use mood::{mood_delete, mood_list, mood_log, mood_today, mood_trend};

use crate::output::{self, OutputFormat};
use anyhow::Result;
use fixitkit_auth::{AuthBackend, SessionProvider, SupabaseAuthClient};
use fixitkit_config::{Config, Paths};
use fixitkit_storage::{create_session_vault, SessionVault};
use fixitkit_store::{authorize_write, Letters, MoodEntries, RecordBackend, SupabaseRestClient};
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

/// Flags shared by every command.
pub struct Globals {
    pub format: OutputFormat,
    pub no_prompt: bool,
}

/// Everything a command needs: the session provider and one store per
/// record kind, all sharing the same session.
pub struct AppContext {
    pub provider: Arc<SessionProvider>,
    pub moods: MoodEntries,
    pub letters: Letters,
}

impl AppContext {
    /// Build the clients and restore the saved session, if any.
    pub async fn open(paths: &Paths, config: &Config) -> Result<Self> {
        paths.ensure_dirs()?;

        let auth = SupabaseAuthClient::from_config(config)?;
        let rest = SupabaseRestClient::new(
            config.supabase_url.clone(),
            config.supabase_anon_key.clone(),
        );
        Self::with_backends(Arc::new(auth), Arc::new(rest), create_session_vault(paths)).await
    }

    /// Wire the stores to arbitrary backends and restore the session.
    pub async fn with_backends(
        auth: Arc<dyn AuthBackend>,
        records: Arc<dyn RecordBackend>,
        vault: SessionVault,
    ) -> Result<Self> {
        let provider = Arc::new(SessionProvider::new(auth, vault));
        provider.get_current_session().await?;

        Ok(Self {
            moods: MoodEntries::new(provider.clone(), records.clone()),
            letters: Letters::new(provider.clone(), records),
            provider,
        })
    }
}

const MOOD_SIGN_IN: &str = "Sign in to track your mood. Run `fixitkit login` or `fixitkit signup`.";
const LETTER_SIGN_IN: &str =
    "Sign in to save your letters. Run `fixitkit login` or `fixitkit signup`.";

/// Gate for write commands. Returns true when a session is present,
/// offering an interactive login first when possible.
async fn require_session(ctx: &AppContext, globals: &Globals, notice: &str) -> Result<bool> {
    if authorize_write(&ctx.provider).is_open() {
        return Ok(true);
    }

    output::print_notice(notice, &globals.format);
    let interactive = !globals.no_prompt
        && globals.format == OutputFormat::Text
        && io::stdin().is_terminal();
    if !interactive || !confirm("Log in now?") {
        return Ok(false);
    }

    auth::interactive_login(ctx, globals).await?;
    Ok(authorize_write(&ctx.provider).is_open())
}

/// Ask user for confirmation.
fn confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    io::stdout().flush().ok();

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }

    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}
