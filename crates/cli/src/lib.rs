pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "concierge",
    about = "Concierge operator CLI",
    long_about = "Inspect configuration, check turn readiness, and run offline chat turns.",
    after_help = "Examples:\n  concierge doctor --json\n  concierge config\n  \
                  concierge chat --user demo --message \"Book me a haircut tomorrow at 2pm\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, build the turn executor, and probe one turn")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run messages as turns of one in-process session, one JSON line per turn")]
    Chat {
        #[arg(long, default_value = "cli-user", help = "User id attached to every turn")]
        user: String,
        #[arg(
            long = "message",
            short = 'm',
            required = true,
            help = "Message to send (repeatable)"
        )]
        messages: Vec<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Chat { user, messages } => commands::chat::run(&user, &messages),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
