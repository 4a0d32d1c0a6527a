//! Checkpoint worker: owns the [`CheckpointStore`] and serializes
//! checkpoint I/O through its mailbox.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use lex_core::entities::Checkpoint;
use lex_store::CheckpointStore;

use crate::coordinator::CoordinatorMsg;
use crate::mailbox::{mailbox, Addr};
use crate::messages::{ActorError, CheckpointSaved, SaveCheckpointCommand};

const ACTOR_NAME: &str = "checkpoint";

/// Messages the checkpoint worker consumes.
pub enum CheckpointMsg {
    Save(SaveCheckpointCommand),
    Load {
        session_id: String,
        reply: oneshot::Sender<Option<Checkpoint>>,
    },
    List {
        reply: oneshot::Sender<Vec<String>>,
    },
    Delete {
        session_id: String,
    },
    Shutdown,
}

/// Store-owning worker.
pub struct CheckpointWorker {
    coordinator: Addr<CoordinatorMsg>,
    store: CheckpointStore,
}

impl CheckpointWorker {
    /// Spawn the worker loop.
    pub fn spawn(
        coordinator: Addr<CoordinatorMsg>,
        store: CheckpointStore,
        capacity: usize,
    ) -> (Addr<CheckpointMsg>, JoinHandle<()>) {
        let (addr, rx) = mailbox("checkpoint", capacity);
        let worker = Self { coordinator, store };
        let handle = tokio::spawn(worker.run(rx));
        (addr, handle)
    }

    async fn run(self, mut rx: mpsc::Receiver<CheckpointMsg>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                CheckpointMsg::Save(cmd) => self.handle_save(cmd).await,
                CheckpointMsg::Load { session_id, reply } => {
                    let _ = reply.send(self.store.load(&session_id).await);
                }
                CheckpointMsg::List { reply } => {
                    let _ = reply.send(self.store.list().await);
                }
                CheckpointMsg::Delete { session_id } => {
                    if let Err(error) = self.store.delete(&session_id).await {
                        tracing::warn!(session_id, %error, "checkpoint delete failed");
                    }
                }
                CheckpointMsg::Shutdown => break,
            }
        }
    }

    async fn handle_save(&self, cmd: SaveCheckpointCommand) {
        match self.store.save(&cmd.checkpoint).await {
            Ok(()) => {
                self.coordinator
                    .tell_detached(CoordinatorMsg::CheckpointDone(CheckpointSaved {
                        correlation_id: cmd.correlation_id,
                        timestamp: chrono::Utc::now(),
                        session_id: cmd.checkpoint.session_id,
                        processed_count: cmd.checkpoint.processed_count,
                    }));
            }
            Err(error) => {
                // The next interval will try again; nothing is lost but
                // resume granularity.
                self.coordinator
                    .tell_detached(CoordinatorMsg::Error(ActorError::new(
                        &cmd.correlation_id,
                        ACTOR_NAME,
                        "CheckpointSaveFailed",
                        error.to_string(),
                        true,
                        None,
                    )));
            }
        }
    }
}
