//! image-cate-tools — serve `get_image_link` as a JSON-RPC tool over stdio.
//!
//! Loads the image manifest once at startup. A missing or unreadable
//! manifest leaves the service running but uninitialized; every call then
//! reports that the image store is not available.

use image_cate::error::AppError;
use image_cate::retrieval::{ManifestSource, RetrievalService, server};
use image_cate::{cli, config, logger};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let _ = dotenvy::dotenv();

    let args = cli::parse_or_exit("image-cate-tools", "Serve random image links per category over stdio.");

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = logger::init_effective(args.log_level, &config.log_level)?;

    let service = match &config.retrieval.manifest_url {
        Some(url) => {
            RetrievalService::connect(ManifestSource {
                location: url.clone(),
                token: config.manifest_token.clone(),
                timeout_seconds: config.retrieval.timeout_seconds,
            })
            .await
        }
        None => {
            warn!("retrieval.manifest_url is not set; image store stays uninitialized");
            RetrievalService::uninitialized()
        }
    };

    info!(
        initialized = service.is_initialized(),
        categories = ?service.category_names(),
        effective_log_level = %effective_log_level,
        "retrieval service ready"
    );

    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received; shutting down");
            ctrlc_token.cancel();
        }
    });

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    server::serve(&service, stdin, tokio::io::stdout(), shutdown).await?;
    Ok(())
}
