use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

use crate::config::BackendKind;

#[derive(Debug, Subcommand, PartialEq)]
pub(crate) enum Command {
    /// Stream telemetry from attached controllers.
    Run {
        /// Device discovery backend
        #[clap(short, long, value_enum)]
        backend: Option<BackendKind>,
        /// Record motion samples and save them on Ctrl+C
        #[clap(short, long)]
        record: bool,
        /// Directory for recorded sample files
        #[clap(short, long)]
        output_dir: Option<PathBuf>,
        /// Keep waiting when no controller is attached at startup
        #[clap(short, long)]
        wait: bool,
        /// Do not print telemetry lines
        #[clap(short, long)]
        quiet: bool,
    },
    /// List discovered devices.
    List {
        /// Device discovery backend
        #[clap(short, long, value_enum)]
        backend: Option<BackendKind>,
        /// Also show devices that do not match the target controller
        #[clap(short, long)]
        all: bool,
    },
    /// Summarize a recorded sample file.
    Inspect {
        /// The sample file to read
        file: PathBuf,
    },
}

/// Telemetry reader for DS4 controllers.
#[derive(Parser)]
#[command(version, about, long_about = None)]
pub(crate) struct Cli {
    /// Turn debugging information on
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Config file (defaults to ./ds4tap.yaml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// The command to run
    #[clap(subcommand)]
    pub command: Command,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "ds4tap", "run", "--backend", "hid", "--record", "-o", "/tmp", "--wait",
        ])
        .expect("parse");
        assert_eq!(
            cli.command,
            Command::Run {
                backend: Some(BackendKind::Hid),
                record: true,
                output_dir: Some(PathBuf::from("/tmp")),
                wait: true,
                quiet: false,
            }
        );
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["ds4tap", "list", "--all", "--verbose", "--no-color"])
            .expect("parse");
        assert!(cli.verbose);
        assert!(cli.no_color);
        assert_eq!(
            cli.command,
            Command::List {
                backend: None,
                all: true
            }
        );
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(Cli::try_parse_from(["ds4tap", "run", "--backend", "bluetooth"]).is_err());
    }

    #[test]
    fn inspect_requires_file() {
        assert!(Cli::try_parse_from(["ds4tap", "inspect"]).is_err());
    }
}
