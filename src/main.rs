use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use kurs::core::RateError;
use kurs::core::log::init_logging;
use std::process::ExitCode;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for kurs::AppCommand {
    fn from(cmd: Commands) -> kurs::AppCommand {
        match cmd {
            Commands::List => kurs::AppCommand::List,
            Commands::Convert { amount, from, to } => kurs::AppCommand::Convert { amount, from, to },
            Commands::Interactive => kurs::AppCommand::Interactive,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// List currencies with today's rates
    List,
    /// Convert an amount between two currencies
    Convert {
        /// Amount of the source currency
        #[arg(allow_hyphen_values = true)]
        amount: String,
        /// Source currency code, e.g. USD
        from: String,
        /// Target currency code, e.g. RUB
        to: String,
    },
    /// Convert interactively while rates load in the background
    Interactive,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => kurs::cli::setup::setup(),
        Some(cmd) => kurs::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            tracing::error!(error = %e, "Application failed");
            // Rate errors were already printed as styled messages by the command.
            if e.is::<RateError>() {
                Ok(ExitCode::FAILURE)
            } else {
                Err(e)
            }
        }
    }
}
