//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Create and manage go/links for quick navigation to frequently used URLs.
///
///   go/meeting -> http://zoom.us/...
///   go/drive   -> https://docs.google.com/...
///   go/gh      -> https://github.com/...
#[derive(Parser, Debug, Clone)]
#[command(name = "golink", version, about, arg_required_else_help = true)]
pub struct Cli {
    /// Directory holding config.toml (default: ~/.config/golink)
    #[arg(long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub config_dir: Option<PathBuf>,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Add a new go link
    Add {
        alias: String,
        url: String,

        /// Description of the link
        #[arg(short, long)]
        description: Option<String>,

        /// Category for the link
        #[arg(short, long)]
        category: Option<String>,
    },

    /// List all go links
    #[command(visible_alias = "ls")]
    List,

    /// Open a go link in the default browser
    Open {
        alias: String,

        /// Open the direct URL instead of the go/link format
        #[arg(short, long)]
        direct: bool,
    },

    /// Change the URL, description or category of a go link.
    /// Pass an empty string to clear description or category.
    Edit {
        alias: String,

        /// New target URL
        #[arg(short, long)]
        url: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        category: Option<String>,
    },

    /// Delete a go link
    #[command(visible_alias = "rm")]
    Delete { alias: String },

    /// Start the go links HTTP server
    Serve {
        /// Port to serve on (default: 80)
        #[arg(short, long)]
        port: Option<u16>,

        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        /// URL to redirect to when a go link is not found
        #[arg(long, value_name = "URL")]
        not_found: Option<String>,
    },

    /// Manage golink configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Set the directory to store links
    StorageDir {
        #[arg(value_hint = clap::ValueHint::DirPath)]
        path: PathBuf,
    },

    /// View current configuration
    View,
}

impl Commands {
    /// Long-running commands log at info level by default.
    pub fn is_server(&self) -> bool {
        matches!(self, Commands::Serve { .. })
    }
}
