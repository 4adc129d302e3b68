// Command layer: one handler per subcommand. Handlers print user-facing
// output and return `anyhow` errors with the failing stage attached.

use crate::api::ApiClient;
use crate::config::{Cli, Command, Config, UploadArgs};
use crate::inspect::inspect;
use crate::progress::ProgressReporter;
use crate::upload::{HttpTransport, Uploader};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const COMMIT: &str = match option_env!("REELTUBE_COMMIT") {
    Some(c) => c,
    None => "none",
};

const BUILD_DATE: &str = match option_env!("REELTUBE_BUILD_DATE") {
    Some(d) => d,
    None => "unknown",
};

/// Version, commit and build date stamped at compile time.
pub fn version_info() -> String {
    format!(
        "Version: {}, Commit: {}, Build date: {}",
        env!("CARGO_PKG_VERSION"),
        COMMIT,
        BUILD_DATE
    )
}

/// Dispatch the parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    if let Command::Version = cli.command {
        println!("{}", version_info());
        return Ok(());
    }

    let config = Config::from_cli(&cli)?;
    match cli.command {
        Command::Upload(args) => handle_upload(&config, &args),
        Command::Whoami => handle_whoami(&config),
        Command::Version => Ok(()),
    }
}

fn handle_whoami(config: &Config) -> Result<()> {
    let api = ApiClient::new(config)?;
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Contacting API...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let res = api.me();
    spinner.finish_and_clear();

    let me = res.context("Failed to fetch profile")?;
    println!("{}", me.profile.handle);
    Ok(())
}

fn handle_upload(config: &Config, args: &UploadArgs) -> Result<()> {
    // Validation happens before any network call.
    let file = inspect(&args.file)?;

    println!("File to upload: {}", file.path.display());
    let upload_name = match &args.name {
        Some(name) => {
            println!("Upload name override: {name}");
            name.clone()
        }
        None => file.file_name(),
    };

    let api = ApiClient::new(config)?;
    let transport = HttpTransport::without_timeout().context("Failed to build HTTP client")?;
    let progress = ProgressReporter::new();
    let mut uploader = Uploader::new(&api, &transport, &progress);
    if let Some(n) = args.concurrency {
        uploader = uploader.concurrency(n as usize);
    }

    let media_upload_id = uploader
        .upload(&file, &upload_name)
        .context("Error uploading file")?;

    println!("File uploaded successfully (media upload {media_upload_id})");
    Ok(())
}
