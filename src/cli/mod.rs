//! CLI module for aeroschema
//!
//! Provides command-line access to dataset schemas:
//! - list / exists: probe datasets by name
//! - inspect: print definition, collections and validators
//! - create: create a dataset from declared classes
//! - delete: drop a dataset and its backing collections

mod args;
mod classes;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use classes::{load_classes, parse_classes};
pub use commands::{connect, delete, exists, inspect, list, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::schema::ClassRegistry;

/// Parse arguments, run one command and print its response.
///
/// Failures are also printed as an error response before being returned.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();

    match execute(cli) {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

fn execute(cli: Cli) -> CliResult<serde_json::Value> {
    let config = Config::load(&cli.config)?;
    init_logging(&config.log_filter);

    let classes = match &cli.classes {
        Some(path) => load_classes(path)?,
        None => ClassRegistry::new(),
    };
    let conn = connect(&config, classes)?;
    run_command(cli.command, &config, &conn)
}

/// Installs JSON logging on stderr. `RUST_LOG` overrides the configured filter.
fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // A subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
