//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Ads insights report pipeline
#[derive(Parser, Debug)]
#[command(name = "insights-pipeline")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (YAML)
    #[arg(short, long, global = true, env = "INSIGHTS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP trigger
    Serve {
        /// Port to listen on (defaults to server.port / PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Queue one task per pipeline and discovered account
    Dispatch {
        /// First day, YYYY-MM-DD (default: 7 days ago)
        #[arg(long)]
        start: Option<String>,

        /// Last day, YYYY-MM-DD (default: today)
        #[arg(long)]
        end: Option<String>,
    },

    /// Run one pipeline for one account in process
    Run {
        #[arg(long)]
        pipeline: String,

        /// Ad account id, without the act_ prefix
        #[arg(long)]
        account: String,

        /// First day, YYYY-MM-DD
        #[arg(long)]
        start: String,

        /// Last day, YYYY-MM-DD
        #[arg(long)]
        end: String,
    },

    /// List the built-in pipelines and their table schemas
    Pipelines,

    /// Print the OAuth dialog URL
    AuthUrl,
}

impl Commands {
    /// Subcommand name as typed on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Serve { .. } => "serve",
            Commands::Dispatch { .. } => "dispatch",
            Commands::Run { .. } => "run",
            Commands::Pipelines => "pipelines",
            Commands::AuthUrl => "auth-url",
        }
    }
}
