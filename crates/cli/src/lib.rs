pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "timebot",
    about = "Timebot operator CLI",
    long_about = "Inspect timebot configuration, check Slack readiness, and try timezone lookups offline.",
    after_help = "Examples:\n  timebot doctor --json\n  timebot config\n  timebot resolve us/pacific\n  timebot channels"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Validate config, Slack token readiness, API reachability, and bot identity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Resolve a place the way the bot would and print its reply")]
    Resolve {
        #[arg(help = "Place name, alias, or tz database name (for example `india` or `Europe/Paris`)")]
        place: String,
    },
    #[command(about = "List the workspace channels visible to the bot token")]
    Channels,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Config => commands::config::run(),
        Command::Resolve { place } => commands::resolve::run(&place),
        Command::Channels => commands::channels::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
