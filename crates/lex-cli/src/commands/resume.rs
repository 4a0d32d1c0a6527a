//! `lmx resume` — inspect a previous session's checkpoint.

use std::path::Path;

use lex_store::CheckpointStore;

use crate::cli::ResumeArgs;

pub async fn handle(args: ResumeArgs) -> anyhow::Result<()> {
    let store = CheckpointStore::open(Path::new(&args.checkpoint_dir)).await?;

    let Some(checkpoint) = store.load(&args.session_id).await else {
        anyhow::bail!("checkpoint not found: {}", args.session_id);
    };

    println!("Session:        {}", checkpoint.session_id);
    println!("Processed:      {} documents", checkpoint.processed_count);
    println!(
        "Last processed: {}",
        if checkpoint.last_processed_q_param.is_empty() {
            "none"
        } else {
            &checkpoint.last_processed_q_param
        }
    );
    println!(
        "Saved at:       {}",
        checkpoint.created_at.format("%Y-%m-%d %H:%M:%S")
    );

    if !checkpoint.failed_q_params.is_empty() {
        println!("Failed:         {} documents", checkpoint.failed_q_params.len());
        for q_param in &checkpoint.failed_q_params {
            println!("  - {q_param}");
        }
    }

    println!();
    println!("Already-saved documents are skipped automatically; run 'lmx discover'");
    println!("with the same filters to continue this session's work.");

    Ok(())
}
