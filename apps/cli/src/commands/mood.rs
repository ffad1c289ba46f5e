//! Mood check-in commands.

use super::{require_session, AppContext, Globals, MOOD_SIGN_IN};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use chrono::{Local, NaiveDate};
use fixitkit_store::{Mood, MoodDraft, MoodEntry};
use tracing::warn;

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn print_entry(entry: &MoodEntry) {
    let note = entry.note.as_deref().unwrap_or("");
    println!(
        "  {}  {} {:<6} {}",
        entry.date,
        entry.emoji,
        entry.mood.label(),
        note
    );
}

/// Anonymous viewers get the sign-in message instead of an empty list.
fn signed_out(ctx: &AppContext, globals: &Globals) -> bool {
    if ctx.provider.is_authenticated() {
        return false;
    }
    output::print_notice(MOOD_SIGN_IN, &globals.format);
    true
}

/// Record a check-in, replacing any existing one for that day.
pub async fn mood_log(
    ctx: &AppContext,
    globals: &Globals,
    mood: u8,
    note: Option<String>,
    date: Option<NaiveDate>,
) -> Result<()> {
    let mood = Mood::new(mood)?;
    let mut draft = match date {
        Some(date) => MoodDraft::new(date, mood),
        None => MoodDraft::today(mood),
    };
    if let Some(note) = note {
        draft = draft.with_note(note);
    }

    if !require_session(ctx, globals, MOOD_SIGN_IN).await? {
        return Ok(());
    }

    // The lookup only picks the wording; the upsert does not depend on it.
    let replaced = match ctx.moods.refresh().await {
        Ok(()) => Some(ctx.moods.entry_for(draft.date).is_some()),
        Err(e) => {
            warn!(error = %e, "Could not load existing check-ins");
            None
        }
    };
    let entry = ctx.moods.add(draft).await?;

    match globals.format {
        OutputFormat::Text => {
            let verb = match replaced {
                Some(true) => "Updated",
                Some(false) => "Logged",
                None => "Saved",
            };
            println!(
                "{} {} {} for {}",
                verb,
                entry.emoji,
                entry.mood.label(),
                entry.date
            );
        }
        OutputFormat::Json => output::print_json(&entry),
    }
    Ok(())
}

pub async fn mood_today(ctx: &AppContext, globals: &Globals) -> Result<()> {
    if signed_out(ctx, globals) {
        return Ok(());
    }

    ctx.moods.refresh().await?;
    let entry = ctx.moods.entry_for(today());

    match (globals.format, entry) {
        (OutputFormat::Json, entry) => output::print_json(&entry),
        (OutputFormat::Text, Some(entry)) => print_entry(&entry),
        (OutputFormat::Text, None) => {
            println!("No check-in yet today. Try `fixitkit mood log <1-5>`.")
        }
    }
    Ok(())
}

pub async fn mood_list(ctx: &AppContext, globals: &Globals, limit: Option<usize>) -> Result<()> {
    if signed_out(ctx, globals) {
        return Ok(());
    }

    ctx.moods.refresh().await?;
    let list = ctx.moods.list();
    let shown = &list[..limit.unwrap_or(list.len()).min(list.len())];

    match globals.format {
        OutputFormat::Text => {
            if shown.is_empty() {
                println!("No check-ins yet.");
                return Ok(());
            }
            output::print_heading("Mood check-ins");
            for entry in shown {
                print_entry(entry);
            }
        }
        OutputFormat::Json => output::print_json(&shown),
    }
    Ok(())
}

/// Delete the check-in for a day (today by default).
pub async fn mood_delete(ctx: &AppContext, globals: &Globals, date: Option<NaiveDate>) -> Result<()> {
    let date = date.unwrap_or_else(today);
    if !require_session(ctx, globals, MOOD_SIGN_IN).await? {
        return Ok(());
    }

    ctx.moods.delete_by_date(date).await?;
    output::print_success(&format!("Deleted check-in for {}", date), &globals.format);
    Ok(())
}

pub async fn mood_trend(ctx: &AppContext, globals: &Globals, days: usize) -> Result<()> {
    if signed_out(ctx, globals) {
        return Ok(());
    }

    ctx.moods.refresh().await?;
    let count = ctx.moods.list().len().min(days);
    let average = ctx.moods.recent_average(days);

    match globals.format {
        OutputFormat::Text => match average {
            Some(average) => {
                let nearest = Mood::new(average.round() as u8)?;
                output::print_heading("Mood trend");
                output::print_row("Check-ins", &count.to_string());
                output::print_row("Average", &format!("{:.1} {}", average, nearest.emoji()));
                output::print_row("Feeling", nearest.label());
            }
            None => println!("No check-ins yet."),
        },
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "days": days,
            "count": count,
            "average": average,
        })),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixitkit_auth::memory::MemoryAuthBackend;
    use fixitkit_storage::{MemoryStorage, SessionVault};
    use fixitkit_store::memory::{MemoryRecordBackend, RecordOp};
    use fixitkit_store::{MoodKind, RecordKind, StoreError};
    use std::sync::Arc;

    const EMAIL: &str = "sam@example.com";
    const PASSWORD: &str = "correct-horse";

    fn globals() -> Globals {
        Globals {
            format: OutputFormat::Json,
            no_prompt: true,
        }
    }

    async fn context(records: Arc<MemoryRecordBackend>, signed_in: bool) -> AppContext {
        let auth = Arc::new(MemoryAuthBackend::new());
        auth.add_user(EMAIL, PASSWORD);
        let ctx = AppContext::with_backends(
            auth,
            records,
            SessionVault::new(Box::new(MemoryStorage::new())),
        )
        .await
        .unwrap();
        if signed_in {
            ctx.provider.sign_in(EMAIL, PASSWORD).await.unwrap();
        }
        ctx
    }

    #[tokio::test]
    async fn log_writes_even_when_the_lookup_fails() {
        let records = Arc::new(MemoryRecordBackend::new());
        let ctx = context(records.clone(), true).await;
        records.fail_next(
            RecordOp::Select,
            StoreError::Remote {
                status: 503,
                message: "service unavailable".into(),
            },
        );

        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        mood_log(&ctx, &globals(), 4, Some("walked".into()), Some(date))
            .await
            .unwrap();

        assert_eq!(records.calls(RecordOp::Select), 1);
        assert_eq!(records.calls(RecordOp::Upsert), 1);
        let rows = records.rows(MoodKind::TABLE);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["mood"], 4);
        assert_eq!(ctx.moods.entry_for(date).unwrap().mood.value(), 4);
    }

    #[tokio::test]
    async fn log_while_signed_out_never_calls_the_store() {
        let records = Arc::new(MemoryRecordBackend::new());
        let ctx = context(records.clone(), false).await;

        mood_log(&ctx, &globals(), 3, None, None).await.unwrap();

        assert_eq!(records.total_calls(), 0);
        assert!(records.rows(MoodKind::TABLE).is_empty());
    }
}
