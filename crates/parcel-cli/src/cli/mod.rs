//! CLI for the parcel download engine.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use parcel_core::config::{self, Settings};
use std::path::PathBuf;

use commands::{run_checksum, run_config, run_get, GetArgs};

/// Top-level CLI for the parcel download engine.
#[derive(Debug, Parser)]
#[command(name = "parcel")]
#[command(about = "parcel: concurrent chunked downloads", long_about = None)]
pub struct Cli {
    /// Read settings from this file instead of the default config path.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one or more URLs and wait for them to finish.
    Get {
        /// Direct HTTP/HTTPS URLs.
        #[arg(required = true)]
        urls: Vec<String>,

        /// Output file (one URL) or directory (several URLs).
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Split each download into exactly N chunks.
        #[arg(long, value_name = "N")]
        chunks: Option<usize>,

        /// Expected digest of the result (32 hex chars = MD5, 64 = SHA-256).
        #[arg(long, value_name = "HEX")]
        checksum: Option<String>,

        /// Extra request header, `Name: value`. Repeatable.
        #[arg(short = 'H', long = "header", value_name = "K:V")]
        headers: Vec<String>,

        /// Print final job records as JSON instead of progress lines.
        #[arg(long)]
        json: bool,
    },

    /// Print the SHA-256 (or MD5) of a file.
    Checksum {
        /// Path to the file.
        path: PathBuf,

        #[arg(long)]
        md5: bool,
    },

    /// Inspect or create the config file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum ConfigAction {
    /// Print the effective settings as TOML.
    Show,
    /// Print the config file path.
    Path,
    /// Write the default settings unless a config file already exists.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub async fn run_from_args() -> Result<()> {
        Cli::parse().run().await
    }

    async fn run(self) -> Result<()> {
        match self.command {
            CliCommand::Get {
                urls,
                output,
                chunks,
                checksum,
                headers,
                json,
            } => {
                let settings = load_settings(self.config.as_deref());
                tracing::debug!("loaded config: {:?}", settings);
                let args = GetArgs {
                    urls,
                    output,
                    chunks,
                    checksum,
                    headers,
                    json,
                };
                run_get(settings, args).await?;
            }
            CliCommand::Checksum { path, md5 } => run_checksum(&path, md5).await?,
            CliCommand::Config { action } => run_config(action, self.config.as_deref())?,
        }
        Ok(())
    }
}

fn load_settings(path: Option<&std::path::Path>) -> Settings {
    match path {
        Some(p) => config::load_from_or_default(p),
        None => config::load_or_default(),
    }
}

#[cfg(test)]
mod tests;
