//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `url_pipeline` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - User-facing output and exit codes

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use url_pipeline::initialization::init_logger_with;
use url_pipeline::{run_pipeline, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal; RUST_LOG and friends may still come from it
    let _ = dotenvy::dotenv();

    let config = Config::parse();

    init_logger_with(config.log_level.clone().into(), config.log_format.clone())
        .context("Failed to initialize logger")?;

    if config.urls.is_empty() && config.file.is_none() {
        eprintln!("url_pipeline error: no URLs given (pass URLs or --file)");
        process::exit(2);
    }

    match run_pipeline(&config).await {
        Ok(report) => {
            eprintln!(
                "✅ Processed {} URL{} ({} succeeded, {} failed, {} cancelled) in {:.1}s",
                report.total_urls,
                if report.total_urls == 1 { "" } else { "s" },
                report.successful,
                report.failed,
                report.cancelled,
                report.elapsed_seconds
            );
            match report.export {
                Ok(count) => {
                    if config.output.as_os_str() != "-" {
                        eprintln!("{count} result(s) saved in {}", config.output.display());
                    }
                    Ok(())
                }
                Err(e) => {
                    eprintln!("url_pipeline error: {e}");
                    process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("url_pipeline error: {:#}", e);
            process::exit(1);
        }
    }
}
