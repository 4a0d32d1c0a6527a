//! `lmx status` — list saved checkpoints.

use std::path::Path;

use lex_store::CheckpointStore;

use crate::cli::StatusArgs;

pub async fn handle(args: StatusArgs) -> anyhow::Result<()> {
    let dir = Path::new(&args.checkpoint_dir);
    if !dir.exists() {
        println!("No checkpoint directory found.");
        return Ok(());
    }

    let store = CheckpointStore::open(dir).await?;
    let mut sessions = store.list().await;
    sessions.sort();

    if sessions.is_empty() {
        println!("No checkpoints found.");
        return Ok(());
    }

    println!("Available checkpoints:");
    println!("{}", "-".repeat(60));
    for session_id in &sessions {
        if let Some(checkpoint) = store.load(session_id).await {
            println!(
                "  {session_id}  processed={}  failed={}  at={}",
                checkpoint.processed_count,
                checkpoint.failed_q_params.len(),
                checkpoint.created_at.format("%Y-%m-%d %H:%M:%S"),
            );
        } else {
            println!("  {session_id}");
        }
    }
    println!("{}", "-".repeat(60));
    println!("Total: {} checkpoint(s)", sessions.len());

    Ok(())
}
