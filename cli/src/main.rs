mod commands;
mod terminal;

use std::process::ExitCode;

use commands::{CommandLine, Commands, report, run};
use terminal::logging;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let commands = CommandLine::parse_args();

    logging::init_logging(&commands.log_level);

    let result: anyhow::Result<()> = match commands.command {
        Commands::Run(args) => run::run(args).await,
        Commands::Report { config } => report::report(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
