// Command-line surface and the resolved runtime configuration. The parsed
// flags are turned into a `Config` once in `main` and handed down explicitly.

use crate::error::ConfigError;
use clap::{Parser, Subcommand};
use reqwest::Url;
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "https://api.reel.tube";

#[derive(Parser, Debug)]
#[command(name = "reeltube")]
#[command(about = "Reeltube is a CLI for interacting with the Reeltube API")]
#[command(version)]
pub struct Cli {
    /// API key for authentication (required unless REELTUBE_API_KEY is set)
    #[arg(short = 'k', long, global = true, env = "REELTUBE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the API
    #[arg(short = 'u', long, global = true, env = "REELTUBE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Enable debug mode
    #[arg(short, long, global = true, default_value_t = false)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a media file to ReelTube
    Upload(UploadArgs),
    /// Ping the ReelTube API to verify authentication
    #[command(alias = "me")]
    Whoami,
    /// Print the version number of Reeltube CLI
    Version,
}

#[derive(clap::Args, Debug)]
pub struct UploadArgs {
    /// Path of the media file to upload
    #[arg(short, long)]
    pub file: PathBuf,

    /// Upload name override (defaults to the file name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Number of parts uploaded in parallel (defaults to the CPU count)
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: Option<u16>,
}

/// Settings every API-facing command needs.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: Url,
    pub api_key: String,
}

impl Config {
    pub fn resolve(api_key: Option<&str>, base_url: &str) -> Result<Self, ConfigError> {
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?
            .to_string();
        let base_url = Url::parse(base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "URL cannot carry a path".into(),
            });
        }
        Ok(Config {
            base_url,
            api_key,
        })
    }

    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        Self::resolve(cli.api_key.as_deref(), &cli.base_url)
    }
}
