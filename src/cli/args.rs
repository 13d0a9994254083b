//! CLI argument definitions using clap
//!
//! Commands:
//! - aeroschema list
//! - aeroschema exists <name>
//! - aeroschema inspect <name>
//! - aeroschema delete <name>
//! - aeroschema create <name> --root <class> [--media-type <type>] [--persistent]
//!
//! `--config` and `--classes` are accepted by every command. Loading a
//! dataset needs the classes its document fields refer to.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::reference::MediaType;

/// aeroschema - evolving document schemas with write-time enforcement
#[derive(Parser, Debug)]
#[command(name = "aeroschema")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./aeroschema.json")]
    pub config: PathBuf,

    /// Path to a JSON file declaring document classes
    #[arg(long, global = true)]
    pub classes: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List dataset names
    List,

    /// Check whether a dataset exists
    Exists {
        /// Dataset name
        name: String,
    },

    /// Print a dataset's definition, collections and validators
    Inspect {
        /// Dataset name
        name: String,
    },

    /// Delete a dataset and its backing collections
    Delete {
        /// Dataset name
        name: String,
    },

    /// Create a dataset from a declared root class
    Create {
        /// Dataset name
        name: String,

        /// Name of the root document class
        #[arg(long)]
        root: String,

        /// Media type of the dataset's samples
        #[arg(long)]
        media_type: Option<MediaType>,

        /// Mark the dataset persistent
        #[arg(long)]
        persistent: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
