//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "docent",
    version,
    author = "neur0map",
    about = "Conversational study assistant over your indexed documents",
    long_about = "Docent answers questions about a persisted document index. Each chat session \
                  retrieves the most similar passages, reranks them and streams the model's \
                  answer back token by token."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/docent/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Provider profile to apply on top of the config file
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the chat server in the foreground
    Serve {
        /// Socket path (defaults to server.socket_path)
        #[arg(short, long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Start an interactive chat session
    Chat {
        /// Socket path (defaults to server.socket_path)
        #[arg(short, long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Ask a single question and print the streamed answer
    Ask {
        /// Question to ask
        question: String,

        /// Socket path (defaults to server.socket_path)
        #[arg(short, long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Show only a specific section
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
