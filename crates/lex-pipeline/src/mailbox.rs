//! Bounded mailboxes and ask/tell plumbing.
//!
//! Every worker owns one bounded mpsc receiver and processes messages in
//! arrival order. Senders hold an [`Addr`]; a full mailbox suspends the
//! sender, which is the pipeline's flow-control mechanism.
//!
//! Two send flavors:
//!
//! - [`Addr::tell`] awaits mailbox space — use on the data plane where
//!   backpressure is intended (discovered documents, PDF bytes, chunks).
//! - [`Addr::tell_detached`] spawns the send — use for low-volume
//!   notifications back to the coordinator, so two components that notify
//!   each other can never block in a cycle.
//!
//! The ask pattern is a message carrying a `oneshot` reply handle; [`ask`]
//! wraps construction and the await.

use tokio::sync::{mpsc, oneshot};

use crate::error::PipelineError;

/// Default mailbox capacity for workers.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 32;

/// Cloneable sending handle to a worker mailbox.
#[derive(Debug)]
pub struct Addr<M> {
    name: &'static str,
    tx: mpsc::Sender<M>,
}

impl<M> Clone for Addr<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
        }
    }
}

impl<M: Send + 'static> Addr<M> {
    /// Fire-and-forget with backpressure: suspends while the mailbox is
    /// full. Returns `false` when the worker has stopped.
    pub async fn tell(&self, message: M) -> bool {
        self.tx.send(message).await.is_ok()
    }

    /// Fire-and-forget without blocking the caller: the send happens on a
    /// spawned task.
    pub fn tell_detached(&self, message: M) {
        let tx = self.tx.clone();
        let name = self.name;
        tokio::spawn(async move {
            if tx.send(message).await.is_err() {
                tracing::debug!(worker = name, "detached send to stopped worker dropped");
            }
        });
    }

    /// Worker name, for diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

/// Create a mailbox: the sending handle and the receiver the worker loop
/// owns.
#[must_use]
pub fn mailbox<M>(name: &'static str, capacity: usize) -> (Addr<M>, mpsc::Receiver<M>) {
    let (tx, rx) = mpsc::channel(capacity);
    (Addr { name, tx }, rx)
}

/// Ask pattern: build a message embedding a fresh reply handle, send it,
/// await the reply.
///
/// # Errors
///
/// [`PipelineError::MailboxClosed`] when the worker has stopped,
/// [`PipelineError::ReplyDropped`] when it discarded the reply handle.
pub async fn ask<M, R>(
    addr: &Addr<M>,
    make: impl FnOnce(oneshot::Sender<R>) -> M,
) -> Result<R, PipelineError>
where
    M: Send + 'static,
{
    let (reply_tx, reply_rx) = oneshot::channel();
    if !addr.tell(make(reply_tx)).await {
        return Err(PipelineError::MailboxClosed(addr.name()));
    }
    reply_rx
        .await
        .map_err(|_| PipelineError::ReplyDropped(addr.name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    enum Msg {
        Echo {
            value: u32,
            reply: oneshot::Sender<u32>,
        },
        Note(u32),
        Shutdown,
    }

    fn spawn_echo(mut rx: mpsc::Receiver<Msg>) -> tokio::task::JoinHandle<Vec<u32>> {
        tokio::spawn(async move {
            let mut notes = Vec::new();
            while let Some(msg) = rx.recv().await {
                match msg {
                    Msg::Echo { value, reply } => {
                        let _ = reply.send(value * 2);
                    }
                    Msg::Note(v) => notes.push(v),
                    Msg::Shutdown => break,
                }
            }
            notes
        })
    }

    #[tokio::test]
    async fn ask_round_trips() {
        let (addr, rx) = mailbox("echo", 4);
        let worker = spawn_echo(rx);

        let doubled = ask(&addr, |reply| Msg::Echo { value: 21, reply })
            .await
            .unwrap();
        assert_eq!(doubled, 42);

        addr.tell(Msg::Shutdown).await;
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn messages_arrive_in_order() {
        let (addr, rx) = mailbox("echo", 4);
        let worker = spawn_echo(rx);

        for v in 0..10 {
            assert!(addr.tell(Msg::Note(v)).await);
        }
        addr.tell(Msg::Shutdown).await;
        assert_eq!(worker.await.unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn full_mailbox_applies_backpressure() {
        let (addr, mut rx) = mailbox::<Msg>("slow", 1);

        assert!(addr.tell(Msg::Note(1)).await);

        // Second send must wait until the worker drains the first.
        let sender = {
            let addr = addr.clone();
            tokio::spawn(async move { addr.tell(Msg::Note(2)).await })
        };
        tokio::task::yield_now().await;
        assert!(!sender.is_finished());

        rx.recv().await;
        assert!(sender.await.unwrap());
    }

    #[tokio::test]
    async fn ask_surfaces_closed_mailbox() {
        let (addr, rx) = mailbox::<Msg>("gone", 1);
        drop(rx);
        let result = ask(&addr, |reply| Msg::Echo { value: 1, reply }).await;
        assert!(matches!(result, Err(PipelineError::MailboxClosed("gone"))));
    }
}
