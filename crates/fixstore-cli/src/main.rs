//! # fixstore-cli
//!
//! Command-line tool for inspecting and administering a fixstore directory.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fixstore_core::error::format_error_with_suggestion;
use fixstore_core::{Config, SessionId};

mod commands;

/// Application context shared by the subcommands.
pub struct AppContext {
    pub config: Config,
    pub session: SessionArgs,
}

impl AppContext {
    /// Session selected on the command line.
    pub fn session_id(&self) -> anyhow::Result<SessionId> {
        self.session.session_id()
    }
}

/// fixstore - inspect and administer file-backed FIX message stores
#[derive(Parser)]
#[command(name = "fixstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Explicit configuration file, merged over the user and project files
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Store directory (overrides store.path)
    #[arg(short, long, global = true, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    session: SessionArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Identity of the session whose files are addressed.
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    /// Protocol version, e.g. FIX.4.2
    #[arg(long, global = true, default_value = "FIX.4.2")]
    pub begin_string: String,

    /// Sender comp id
    #[arg(long, global = true)]
    pub sender: Option<String>,

    /// Target comp id
    #[arg(long, global = true)]
    pub target: Option<String>,

    /// Session qualifier
    #[arg(long, global = true)]
    pub qualifier: Option<String>,
}

impl SessionArgs {
    pub fn session_id(&self) -> anyhow::Result<SessionId> {
        let (Some(sender), Some(target)) = (self.sender.as_deref(), self.target.as_deref()) else {
            anyhow::bail!("This command needs --sender and --target");
        };
        SessionId::parse_parts(
            &self.begin_string,
            sender,
            target,
            self.qualifier.as_deref(),
        )
        .map_err(|e| anyhow::anyhow!(format_error_with_suggestion(&e)))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show counters, creation time and the message index
    Inspect {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print stored messages in a sequence range
    Get {
        /// First sequence number
        start: u64,
        /// Last sequence number (inclusive)
        end: u64,
        /// Show SOH field delimiters as '|'
        #[arg(long)]
        pipes: bool,
    },
    /// Overwrite the next sequence numbers
    SetSeq {
        /// Next sender sequence number
        #[arg(long, value_name = "N")]
        next_sender: Option<u64>,
        /// Next target sequence number
        #[arg(long, value_name = "N")]
        next_target: Option<u64>,
    },
    /// Restart both counters at 1 and stamp a new creation time
    Reset,
    /// Delete all files of the session and start over
    Wipe {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
    /// Reload the store from disk and compare with the open state
    RefreshCheck,
    /// Send stored messages through the configured session logs
    Replay {
        /// First sequence number
        start: u64,
        /// Last sequence number (inclusive)
        end: u64,
        /// Treat the messages as received instead of sent
        #[arg(long)]
        incoming: bool,
        /// Print every category to the screen regardless of configuration
        #[arg(long)]
        screen: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration as TOML
    Show,
    /// Show where configuration is read from
    Path,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load configuration
    let mut config = Config::load_validated(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!(format_error_with_suggestion(&e)))
        .context("Failed to load configuration")?;
    if let Some(dir) = cli.dir {
        config.store.path = dir;
    }

    let ctx = AppContext {
        config,
        session: cli.session,
    };

    match cli.command {
        Commands::Inspect { json } => commands::inspect::run(&ctx, json)?,
        Commands::Get { start, end, pipes } => commands::messages::get(&ctx, start, end, pipes)?,
        Commands::SetSeq {
            next_sender,
            next_target,
        } => commands::admin::set_seq(&ctx, next_sender, next_target)?,
        Commands::Reset => commands::admin::reset(&ctx)?,
        Commands::Wipe { yes } => commands::admin::wipe(&ctx, yes)?,
        Commands::RefreshCheck => commands::check::run(&ctx)?,
        Commands::Replay {
            start,
            end,
            incoming,
            screen,
        } => commands::messages::replay(&ctx, start, end, incoming, screen)?,
        Commands::Config { action } => commands::config::handle(&ctx, action)?,
        Commands::Version => {
            println!("fixstore {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
