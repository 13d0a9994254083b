//! aeroschema CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`, which also installs
//! logging once the configuration is known. Errors have already been
//! written to stdout as a JSON response; they are repeated on stderr and
//! the process exits non-zero.

use aeroschema::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
