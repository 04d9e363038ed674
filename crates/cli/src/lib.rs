pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "orderline",
    about = "Orderline operator CLI",
    long_about = "Inspect configuration, try the order parser and pricing against the menu, apply migrations and check readiness.",
    after_help = "Examples:\n  orderline parse \"two large lamb kebabs with garlic\"\n  orderline quote \"large chicken kebab\" \"large chips\" \"can of coke\"\n  orderline doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
    #[command(about = "Parse one spoken item description against the menu")]
    Parse {
        #[arg(help = "Item description, e.g. \"small hsp with lamb and garlic\"")]
        phrase: String,
    },
    #[command(about = "Build a cart from item descriptions and price it, including combo savings")]
    Quote {
        #[arg(required = true, help = "One description per cart line")]
        phrases: Vec<String>,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Validate config, menu and database connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::CommandResult { exit_code: 0, output: commands::config::run() },
        Command::Parse { phrase } => commands::parse::run(&phrase),
        Command::Quote { phrases } => commands::quote::run(&phrases),
        Command::Migrate => commands::migrate::run(),
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
