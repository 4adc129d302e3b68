// Entrypoint for the CLI application.
// - Keeps `main` small: load `.env`, parse flags, set up logging, hand off
//   to `ui::run`.
// - Any error is printed with its context chain and exits with status 1.

use clap::Parser;
use reeltube_cli::{config::Cli, ui};
use tracing_subscriber::EnvFilter;

fn main() {
    // Must run before parsing so `env = ...` flags see values from `.env`.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env file"),
        Err(e) => tracing::debug!(
            error = %e,
            "No .env file found. Assuming environment variables are set by the system."
        ),
    }

    if let Err(e) = ui::run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
