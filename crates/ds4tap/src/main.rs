mod cli;
mod config;
mod console;
mod error;
mod logging;
mod record;
mod session;

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use crate::cli::{Cli, Command};
use crate::config::{BackendKind, Config};
use crate::console::Console;
use crate::error::StartupError;
use crate::record::{rate_per_second, read_samples};

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = logging::setup(cli.verbose, cli.no_color) {
        let _ = writeln!(std::io::stderr(), "failed to set up logger: {err}");
        return ExitCode::FAILURE;
    }

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_error!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn execute(cli: Cli) -> Result<(), StartupError> {
    let mut config = Config::load(cli.config.as_deref())?;
    match cli.command {
        Command::Run {
            backend,
            record,
            output_dir,
            wait,
            quiet,
        } => {
            if let Some(backend) = backend {
                config.backend = backend;
            }
            if record {
                config.record.enabled = true;
            }
            if let Some(dir) = output_dir {
                config.record.dir = dir;
            }
            if wait {
                config.require_device = false;
                if config.backend == BackendKind::Hid {
                    print_warning!("hid backend has no hot-plug, --wait only skips the startup check");
                }
            }
            session::run(&config, quiet)
        }
        Command::List { backend, all } => {
            session::list(backend.unwrap_or(config.backend), config.target, all)
        }
        Command::Inspect { file } => inspect(&file),
    }
}

/// Prints the sample count, duration and per-second rate of a recording.
fn inspect(path: &Path) -> Result<(), StartupError> {
    let samples = read_samples(BufReader::new(File::open(path)?))?;
    let mut console = Console::new();

    let duration = match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => last.time - first.time,
        _ => 0.0,
    };
    console.line(&format!("file:     {}", path.display()))?;
    console.line(&format!("samples:  {}", samples.len()))?;
    console.line(&format!("duration: {duration:.3}s"))?;
    if samples.is_empty() {
        return Ok(());
    }

    console.line("second samples_per_sec")?;
    for (second, count) in rate_per_second(&samples) {
        console.line(&format!("{second:>6} {count:>15}"))?;
    }
    Ok(())
}
