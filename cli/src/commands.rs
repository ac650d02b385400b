pub mod report;
pub mod run;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sweepr")]
#[command(version, about = "Directory-driven warranty inventory sweep.")]
pub struct CommandLine {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sweep the directory and record warranty status for every live device
    #[command(alias = "r")]
    Run(RunArgs),
    /// Summarize the output files written by earlier runs
    Report {
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },
}

#[derive(Args)]
pub struct RunArgs {
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Concurrent liveness probes
    #[arg(long)]
    pub probe_workers: Option<usize>,

    /// Concurrent remote serial number queries
    #[arg(long)]
    pub identity_workers: Option<usize>,

    /// Concurrent browser sessions
    #[arg(long)]
    pub lookup_workers: Option<usize>,

    /// Run the browser with a visible window
    #[arg(long)]
    pub show_browser: bool,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        CommandLine::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = CommandLine::parse_from([
            "sweepr",
            "run",
            "--config",
            "prod.json",
            "--lookup-workers",
            "2",
            "--show-browser",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config, PathBuf::from("prod.json"));
                assert_eq!(args.lookup_workers, Some(2));
                assert_eq!(args.probe_workers, None);
                assert!(args.show_browser);
            }
            Commands::Report { .. } => panic!("expected run"),
        }
    }
}
