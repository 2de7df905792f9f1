// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use bear_hunt_ledger::{
    build_recognizer, CommandHandler, ImageUpload, Reply, ReplyStatus, Requester, Settings,
    Tracker,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "bear-hunt",
    version,
    about = "Track Bear Hunt damage standings from event screenshots"
)]
struct Cli {
    /// Settings file (JSON)
    #[arg(short, long, global = true, env = "BEAR_HUNT_CONFIG", default_value = "bear_hunt.json")]
    config: PathBuf,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct RequesterArgs {
    /// Numeric id of whoever issues the command
    #[arg(long, default_value_t = 0)]
    actor_id: u64,

    /// Name written to the audit log
    #[arg(long, default_value = "cli")]
    actor: String,

    #[arg(long, default_value_t = 0)]
    channel_id: u64,

    /// Role held by the requester (repeatable)
    #[arg(long = "role")]
    roles: Vec<String>,
}

impl From<RequesterArgs> for Requester {
    fn from(args: RequesterArgs) -> Self {
        Requester {
            actor_id: args.actor_id,
            display_name: args.actor,
            channel_id: args.channel_id,
            roles: args.roles,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// OCR screenshots and merge the results into the ledger
    Process {
        #[arg(required = true)]
        images: Vec<PathBuf>,

        #[command(flatten)]
        requester: RequesterArgs,
    },

    /// Show the damage leaderboard
    Top {
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        limit: Option<u64>,

        #[command(flatten)]
        requester: RequesterArgs,
    },

    /// Clear all standings for a new event
    Reset {
        #[command(flatten)]
        requester: RequesterArgs,
    },

    /// Write the ledger to a `name,damage` CSV file
    Export { path: PathBuf },

    /// Merge a `name,damage` CSV file into the ledger
    Import {
        path: PathBuf,

        #[arg(long, default_value = "csv-import")]
        actor: String,
    },

    /// Browse standings and the upload log in the terminal
    Ui,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::load(&cli.config)
        .with_context(|| format!("Failed to load settings from {}", cli.config.display()))?;

    match cli.command {
        Command::Process { images, requester } => run_process(&settings, images, requester.into()),
        Command::Top { limit, requester } => {
            let handler = handler(&settings)?;
            finish(handler.top(&requester.into(), limit.map(|l| l as usize)))
        }
        Command::Reset { requester } => {
            let handler = handler(&settings)?;
            finish(handler.reset(&requester.into()))
        }
        Command::Export { path } => {
            let tracker = Tracker::open(&settings)?;
            let rows = tracker.export_csv(&path)?;
            println!("✓ Exported {} players to {}", rows, path.display());
            Ok(())
        }
        Command::Import { path, actor } => {
            let tracker = Tracker::open(&settings)?;
            let rows = tracker
                .import_csv(&path, &actor)
                .with_context(|| format!("Failed to import {}", path.display()))?;
            println!("✓ Imported {} rows from {}", rows, path.display());
            Ok(())
        }
        Command::Ui => run_ui_mode(&settings),
    }
}

fn handler(settings: &Settings) -> Result<CommandHandler> {
    let tracker = Tracker::open(settings).context("Failed to open ledger")?;

    Ok(CommandHandler::new(
        Arc::new(tracker),
        build_recognizer(&settings.engine),
        settings.access.clone(),
        settings.default_limit,
    ))
}

fn run_process(settings: &Settings, paths: Vec<PathBuf>, requester: Requester) -> Result<()> {
    let mut images = Vec::with_capacity(paths.len());

    for path in &paths {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        images.push(
            ImageUpload::new(bytes, filename, requester.display_name.clone()).with_path(path),
        );
    }

    let handler = handler(settings)?;
    finish(handler.process(&requester, &images))
}

fn finish(reply: Reply) -> Result<()> {
    if reply.status == ReplyStatus::Done {
        println!("{}", reply.text);
        Ok(())
    } else {
        eprintln!("{}", reply.text);
        std::process::exit(1);
    }
}

#[cfg(feature = "tui")]
fn run_ui_mode(settings: &Settings) -> Result<()> {
    // Viewer only: a missing ledger or log shows up empty instead of being created
    let entries = if settings.ledger_path.exists() {
        bear_hunt_ledger::LedgerStore::open(&settings.ledger_path)
            .context("Failed to open ledger")?
            .entries()?
    } else {
        Vec::new()
    };
    let audit_lines = bear_hunt_ledger::read_log_lines(&settings.audit_path)?;

    let mut app = ui::App::new(entries, audit_lines);
    ui::run_ui(&mut app)?;

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_settings: &Settings) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_requester_flags() {
        let cli = Cli::try_parse_from([
            "bear-hunt", "reset", "--actor-id", "42", "--actor", "officer", "--channel-id", "7",
            "--role", "Member", "--role", "OCR Access",
        ])
        .unwrap();

        let Command::Reset { requester } = cli.command else {
            panic!("expected reset");
        };
        let requester = Requester::from(requester);
        assert_eq!(requester.actor_id, 42);
        assert_eq!(requester.display_name, "officer");
        assert_eq!(requester.channel_id, 7);
        assert_eq!(requester.roles, vec!["Member", "OCR Access"]);
    }

    #[test]
    fn test_top_limit_must_be_positive() {
        assert!(Cli::try_parse_from(["bear-hunt", "top", "--limit", "0"]).is_err());
        assert!(Cli::try_parse_from(["bear-hunt", "top", "-l", "3"]).is_ok());
    }
}
