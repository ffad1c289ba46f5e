//! FixItKit CLI - daily mood check-ins and unsent letters.

mod commands;
mod output;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use commands::{AppContext, Globals};
use fixitkit_config::{init_logging, Config, Paths};
use tracing::debug;

/// FixItKit CLI - check in with your mood, write letters you will never send.
#[derive(Parser)]
#[command(name = "fixitkit")]
#[command(about = "Mood tracking and private journaling backed by your FixItKit account")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Never offer an interactive login when a command needs one
    #[arg(long, global = true)]
    no_prompt: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account with email and password
    Signup,

    /// Login with email and password
    Login,

    /// Logout and clear the saved session
    Logout,

    /// Show who is signed in
    Status,

    /// Daily mood check-ins
    Mood {
        #[command(subcommand)]
        command: MoodCommands,
    },

    /// Letters you write but never send
    Letter {
        #[command(subcommand)]
        command: LetterCommands,
    },
}

#[derive(Subcommand)]
enum MoodCommands {
    /// Record how you feel (1 = awful, 5 = great). Replaces that day's check-in.
    Log {
        /// Mood from 1 to 5
        #[arg(value_parser = clap::value_parser!(u8).range(1..=5))]
        mood: u8,
        /// Optional note (up to 200 characters)
        #[arg(short, long)]
        note: Option<String>,
        /// Day to record (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Show today's check-in
    Today,
    /// List check-ins, newest first
    List {
        /// Maximum number of entries to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Delete the check-in for a day
    Delete {
        /// Day to delete (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Average mood over recent check-ins
    Trend {
        /// Number of most recent check-ins to include
        #[arg(short, long, default_value = "7")]
        days: usize,
    },
}

#[derive(Subcommand)]
enum LetterCommands {
    /// Write a letter. Reads stdin when no text is given.
    Write {
        /// Letter text
        text: Option<String>,
    },
    /// List your letters, newest first
    List,
    /// Burn a letter. It stays in the list, but its words are gone.
    Burn {
        /// Letter ID
        id: String,
    },
    /// Delete a letter
    Delete {
        /// Letter ID
        id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = run(cli).await;
    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let paths = Paths::new()?;
    let config = Config::load(&paths)?;

    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    init_logging(&paths, &level, false);
    debug!(base_dir = %paths.base_dir().display(), "Starting fixitkit");

    let globals = Globals {
        format: cli.format,
        no_prompt: cli.no_prompt,
    };
    let ctx = AppContext::open(&paths, &config).await?;

    match cli.command {
        Commands::Signup => commands::signup(&ctx, &globals).await,
        Commands::Login => commands::login(&ctx, &globals).await,
        Commands::Logout => commands::logout(&ctx, &globals).await,
        Commands::Status => commands::status(&ctx, &globals).await,
        Commands::Mood { command } => match command {
            MoodCommands::Log { mood, note, date } => {
                commands::mood_log(&ctx, &globals, mood, note, date).await
            }
            MoodCommands::Today => commands::mood_today(&ctx, &globals).await,
            MoodCommands::List { limit } => commands::mood_list(&ctx, &globals, limit).await,
            MoodCommands::Delete { date } => commands::mood_delete(&ctx, &globals, date).await,
            MoodCommands::Trend { days } => commands::mood_trend(&ctx, &globals, days).await,
        },
        Commands::Letter { command } => match command {
            LetterCommands::Write { text } => commands::letter_write(&ctx, &globals, text).await,
            LetterCommands::List => commands::letter_list(&ctx, &globals).await,
            LetterCommands::Burn { id } => commands::letter_burn(&ctx, &globals, &id).await,
            LetterCommands::Delete { id } => commands::letter_delete(&ctx, &globals, &id).await,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn mood_must_be_between_one_and_five() {
        assert!(Cli::try_parse_from(["fixitkit", "mood", "log", "0"]).is_err());
        assert!(Cli::try_parse_from(["fixitkit", "mood", "log", "6"]).is_err());

        let cli = Cli::try_parse_from([
            "fixitkit", "mood", "log", "4", "--date", "2024-01-01", "--note", "ok",
        ])
        .unwrap();
        match cli.command {
            Commands::Mood {
                command: MoodCommands::Log { mood, note, date },
            } => {
                assert_eq!(mood, 4);
                assert_eq!(note.as_deref(), Some("ok"));
                assert_eq!(date, Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
            }
            _ => panic!("expected mood log"),
        }
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli =
            Cli::try_parse_from(["fixitkit", "letter", "list", "--format", "json", "--no-prompt"])
                .unwrap();
        assert_eq!(cli.format, output::OutputFormat::Json);
        assert!(cli.no_prompt);
    }
}
