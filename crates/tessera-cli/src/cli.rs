//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tessera - Register, resolve and run configurations
#[derive(Parser, Debug)]
#[command(name = "tessera")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Discover namespaces, register and validate every configuration
    ///
    /// Writes registrations/valid_keys.json and registrations/invalid_keys.json
    /// below the target directory.
    ///
    /// Examples:
    ///   tessera setup                          # Current directory
    ///   tessera setup --dir models             # Another directory
    ///   tessera setup -e ../shared -e https://example.com/org/models.git
    Setup {
        /// Directory to scan
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Extra directory or git URL providing namespaces (repeatable)
        #[arg(short = 'e', long = "external-path")]
        external_paths: Vec<String>,

        /// JSON file holding an array of external directories
        #[arg(long)]
        external_json: Option<PathBuf>,

        /// Where git URLs are cloned
        #[arg(long)]
        save_dir: Option<PathBuf>,

        /// Exit with an error if any key fails validation
        #[arg(long)]
        fail_on_invalid: bool,
    },

    /// Build and run a runnable component
    ///
    /// Examples:
    ///   tessera run "name:greeter--namespace:demo"
    ///   tessera run "name:greeter--namespace:demo" --set name=tessera
    ///   tessera run --interactive
    Run {
        /// Registration key of the component
        key: Option<String>,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Parameter override of the root configuration (name=value, repeatable)
        #[arg(short, long = "set")]
        set: Vec<String>,

        /// Pick the key with prompts
        #[arg(short, long)]
        interactive: bool,
    },

    /// List registered keys
    List {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Only keys in this namespace
        #[arg(long)]
        namespace: Option<String>,

        /// Only keys with this name
        #[arg(long)]
        name: Option<String>,

        /// Only keys carrying this tag (repeatable)
        #[arg(short, long)]
        tag: Vec<String>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}
