pub mod commands;
pub mod logging;
pub mod session_store;
pub mod terminal;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use crate::commands::run::RunOptions;

#[derive(Debug, Parser)]
#[command(
    name = "intake",
    about = "Config-driven intake assistant",
    long_about = "Collect structured service requests through a guided conversation driven by an intent pack.",
    after_help = "Examples:\n  intake run --session sess_local_001\n  intake validate --config configs/intents_generic.json\n  intake config\n  intake session show sess_local_001"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run one intake conversation and print the result document")]
    Run(RunArgs),
    #[command(about = "Load an intent pack and summarize its intents")]
    Validate {
        #[arg(long, help = "Intent pack to validate (defaults to the configured pack)")]
        config: Option<PathBuf>,
        #[arg(long, help = "Settings file (defaults to intake.toml or config/intake.toml)")]
        settings: Option<PathBuf>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config {
        #[arg(long, help = "Settings file (defaults to intake.toml or config/intake.toml)")]
        settings: Option<PathBuf>,
    },
    #[command(about = "Inspect or clear stored session memory")]
    Session {
        #[command(subcommand)]
        action: SessionAction,
        #[arg(long, global = true, help = "Directory holding session files")]
        sessions_dir: Option<PathBuf>,
        #[arg(long, global = true, help = "Settings file")]
        settings: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long, help = "Intent pack to drive the conversation")]
    config: Option<PathBuf>,
    #[arg(long, help = "Session id to resume or create (asked when omitted)")]
    session: Option<String>,
    #[arg(long, help = "Request id for the result document (generated when omitted)")]
    request_id: Option<String>,
    #[arg(long, help = "Directory holding session files")]
    sessions_dir: Option<PathBuf>,
    #[arg(long, help = "Settings file (defaults to intake.toml or config/intake.toml)")]
    settings: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum SessionAction {
    #[command(about = "Print the stored memory for a session")]
    Show { session_id: String },
    #[command(about = "Delete the stored memory for a session")]
    Clear { session_id: String },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run(args) => commands::run::run(RunOptions {
            intents_path: args.config,
            session_id: args.session,
            request_id: args.request_id,
            sessions_dir: args.sessions_dir,
            settings_path: args.settings,
        }),
        Command::Validate { config, settings } => commands::validate::run(config, settings),
        Command::Config { settings } => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(settings) }
        }
        Command::Session { action, sessions_dir, settings } => match action {
            SessionAction::Show { session_id } => {
                commands::session::show(session_id, sessions_dir, settings)
            }
            SessionAction::Clear { session_id } => {
                commands::session::clear(session_id, sessions_dir, settings)
            }
        },
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
