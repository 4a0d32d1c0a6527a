//! `lmx discover` — run the full discovery/scraping pipeline.
//!
//! Prints a per-tick progress line and a final summary. SIGINT/SIGTERM
//! pause the pipeline and save a checkpoint before exiting.

use std::time::Duration;

use lex_config::{LexmexConfig, StorageMode};
use lex_pipeline::messages::{DiscoverCommand, SearchQuery};
use lex_pipeline::{
    spawn_http_pipeline, DiscoveryOutcome, PipelineHandle, PipelineOptions, PipelinePhase,
};

use crate::cli::DiscoverArgs;
use crate::progress::Progress;

const POLL_INTERVAL: Duration = Duration::from_secs(3);
const MAX_STALL_POLLS: u32 = 10;

pub async fn handle(args: DiscoverArgs, quiet: bool) -> anyhow::Result<()> {
    let config = build_config(&args)?;

    println!("{}", "=".repeat(60));
    println!("Lexmex — SCJN legislation scraper");
    println!("{}", "=".repeat(60));
    println!("Output directory:     {}", config.storage.storage_dir);
    println!("Checkpoint directory: {}", config.storage.checkpoint_dir);
    println!("Max results:          {}", args.max_results);
    println!("Rate limit:           {} req/s", config.scrape.rate_limit_per_second);
    println!("Concurrency:          {}", config.scrape.max_concurrent_downloads);
    if let Some(category) = &args.category {
        println!("Category filter:      {category}");
    }
    if let Some(scope) = &args.scope {
        println!("Scope filter:         {scope}");
    }
    if let Some(status) = &args.status {
        println!("Status filter:        {status}");
    }
    println!("{}", "=".repeat(60));

    let options = PipelineOptions {
        skip_pdfs: args.skip_pdfs,
        ..PipelineOptions::default()
    };

    let spinner = Progress::spinner("starting pipeline…", quiet);
    let pipeline = spawn_http_pipeline(&config, &options).await?;
    spinner.set_message("discovering documents…");

    let cmd = DiscoverCommand::new(
        SearchQuery {
            category: args.category.clone(),
            scope: args.scope.clone(),
            status: args.status.clone(),
        },
        args.max_results,
        args.all_pages,
    );

    let outcome = pipeline.discover(cmd).await?;
    match outcome {
        DiscoveryOutcome::Page(page) => {
            spinner.finish_ok(&format!(
                "initial page: {} documents, {} total pages",
                page.documents_found, page.total_pages
            ));
        }
        DiscoveryOutcome::Error(error) => {
            spinner.finish_err("discovery failed");
            pipeline.shutdown().await;
            anyhow::bail!("discovery failed: {}: {}", error.error_type, error.error_message);
        }
    }

    let result = progress_loop(&pipeline).await;
    pipeline.shutdown().await;
    println!("Shutdown complete.");
    result
}

/// Poll the coordinator until the run drains, stalls, or is interrupted.
async fn progress_loop(pipeline: &PipelineHandle) -> anyhow::Result<()> {
    let mut last_downloaded = 0usize;
    let mut stall_polls = 0u32;

    loop {
        let interrupted = tokio::select! {
            () = tokio::time::sleep(POLL_INTERVAL) => false,
            _ = interrupt_signal() => true,
        };

        if interrupted {
            println!();
            println!("Interrupted — saving checkpoint…");
            let status = pipeline.pause().await?;
            println!(
                "Paused at {} downloaded (session {}). Re-run discover to continue.",
                status.downloaded_count, status.session_id
            );
            return Ok(());
        }

        let status = pipeline.status().await?;
        println!(
            "[{}] discovered={} downloaded={} pending={} active={} errors={}",
            status.phase,
            status.discovered_count,
            status.downloaded_count,
            status.pending_count,
            status.active_downloads,
            status.error_count,
        );

        if status.phase == PipelinePhase::Error {
            println!();
            println!("Pipeline entered the error phase; aborting.");
            println!("Total discovered: {}", status.discovered_count);
            println!("Total downloaded: {}", status.downloaded_count);
            println!("Total errors:     {}", status.error_count);
            anyhow::bail!("pipeline failed before completing");
        }

        if status.downloaded_count == last_downloaded {
            stall_polls += 1;
        } else {
            stall_polls = 0;
            last_downloaded = status.downloaded_count;
        }

        if status.is_drained() || stall_polls >= MAX_STALL_POLLS {
            println!();
            if status.is_drained() {
                println!("Discovery complete.");
            } else {
                println!("Processing appears stalled, exiting.");
            }
            println!("Total discovered: {}", status.discovered_count);
            println!("Total downloaded: {}", status.downloaded_count);
            println!("Total errors:     {}", status.error_count);
            return Ok(());
        }
    }
}

async fn interrupt_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn build_config(args: &DiscoverArgs) -> anyhow::Result<LexmexConfig> {
    let mut config = LexmexConfig::load()?;
    config.scrape.rate_limit_per_second = args.rate_limit;
    config.scrape.max_concurrent_downloads = args.concurrency;
    config.storage.storage_dir.clone_from(&args.output_dir);
    config.storage.checkpoint_dir.clone_from(&args.checkpoint_dir);

    if config.storage.mode != StorageMode::Local && config.storage.remote_url.is_none() {
        tracing::warn!("remote storage mode configured without a URL; falling back to local");
        config.storage.mode = StorageMode::Local;
    }

    Ok(config)
}
