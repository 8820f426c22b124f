pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "trainhub",
    about = "Trainhub operator CLI",
    long_about = "Operate Trainhub migrations, demo data, config inspection, and readiness checks.",
    after_help = "Examples:\n  trainhub doctor --json\n  trainhub config\n  trainhub report --format csv --output budget.csv"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load a deterministic demo roster and budget dataset")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, email relay readiness, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Export a budget report from the configured database")]
    Report {
        #[arg(long, default_value = "year", help = "Reporting window: month, quarter, or year")]
        range: String,
        #[arg(long, default_value = "csv", help = "Output format: json, csv, or excel")]
        format: String,
        #[arg(long, help = "File to write; defaults to budget-report.<ext>")]
        output: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Report { range, format, output } => {
            commands::report::run(&range, &format, output.as_deref())
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
