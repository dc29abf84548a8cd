//! image-cate — classify a local image folder and upload by category.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Validate run settings, build provider and store
//!   6. Walk the folder, then print the run summary

use image_cate::classify::{ClassificationPipeline, RunConfig, RunSummary};
use image_cate::error::AppError;
use image_cate::{cli, config, llm, logger, store};
use tracing::info;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let _ = dotenvy::dotenv();

    let args = cli::parse_or_exit(
        "image-cate",
        "Classify images with a vision model and upload them to GitHub by category.",
    );

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = logger::init_effective(args.log_level, &config.log_level)?;

    let run = RunConfig::from_config(&config)?;

    info!(
        image_folder = %run.image_folder.display(),
        categories = ?run.categories,
        repo = %run.repo,
        upload_dir = %run.upload_dir,
        provider = %config.llm.provider,
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    let provider = llm::providers::build(&config.llm, config.llm_api_key.clone())?;
    let store = store::build(&config.github, &run.repo, &run.github_token)?;

    info!(provider = provider.name(), store = store.name(), "starting classification run");

    let mut pipeline = ClassificationPipeline::new(&run, provider, store);
    let summary = pipeline.run(&run.image_folder).await?;

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("✓ Run complete");
    println!("  files seen:      {}", summary.files_seen);
    println!("  not images:      {}", summary.not_images);
    println!("  failed:          {}", summary.failed);
    println!("  unclassified:    {}", summary.unclassified);
    println!("  uploaded:        {}", summary.uploaded);
    println!("  upload failures: {}", summary.upload_failures);
    println!("  total tokens:    {}", summary.total_tokens);
}
