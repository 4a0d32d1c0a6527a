//! Control/status bridge for external clients.
//!
//! Translates coarse commands (`start_search`, `stop_search`,
//! `pause_search`, `resume_search`, `get_status`, `get_progress`) into the
//! internal command set, polls the coordinator at a fixed interval, and
//! fans job-lifecycle events out to registered listeners. One search runs
//! at a time per bridge. Listener panics are contained — a broken listener
//! never breaks the bridge or its siblings. Async consumers register a
//! sync closure that hands the event to their own channel or task.
//!
//! Stall detection lives here, not in the coordinator: when
//! `downloaded_count` stops increasing for `stall_polls` consecutive polls
//! the job is reported completed. The coordinator keeps reporting state
//! faithfully either way.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::coordinator::{CoordinatorMsg, PipelinePhase, PipelineStatus};
use crate::error::PipelineError;
use crate::mailbox::{ask, Addr};
use crate::messages::{DiscoverCommand, SearchQuery};

/// Bridge polling knobs.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub poll_interval: Duration,
    /// Consecutive no-progress polls before the job is considered done.
    pub stall_polls: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            stall_polls: 10,
        }
    }
}

/// External search request, translated into a [`DiscoverCommand`].
#[derive(Debug, Clone, Default)]
pub struct SearchSpec {
    pub query: SearchQuery,
    pub max_results: usize,
    pub discover_all_pages: bool,
}

/// Job lifecycle events delivered to listeners.
#[derive(Debug, Clone)]
pub enum JobEvent {
    Started {
        job_id: String,
    },
    Progress {
        job_id: String,
        status: PipelineStatus,
    },
    Completed {
        job_id: String,
        discovered: usize,
        downloaded: usize,
        errors: usize,
    },
    Failed {
        job_id: String,
        message: String,
    },
}

/// Listener callback. Must not block; spawn for anything slow.
pub type JobListener = Arc<dyn Fn(JobEvent) + Send + Sync>;

struct ActiveJob {
    job_id: String,
    poll_task: JoinHandle<()>,
}

struct Inner {
    coordinator: Addr<CoordinatorMsg>,
    config: BridgeConfig,
    listeners: Mutex<Vec<JobListener>>,
    job: Mutex<Option<ActiveJob>>,
}

/// The bridge. Cheap to clone; all clones share one job slot.
#[derive(Clone)]
pub struct ControlBridge {
    inner: Arc<Inner>,
}

impl ControlBridge {
    #[must_use]
    pub fn new(coordinator: Addr<CoordinatorMsg>, config: BridgeConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                coordinator,
                config,
                listeners: Mutex::new(Vec::new()),
                job: Mutex::new(None),
            }),
        }
    }

    /// Register a listener for job events.
    pub fn add_listener(&self, listener: JobListener) {
        if let Ok(mut listeners) = self.inner.listeners.lock() {
            listeners.push(listener);
        }
    }

    /// Whether a search is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner
            .job
            .lock()
            .map(|job| {
                job.as_ref()
                    .is_some_and(|active| !active.poll_task.is_finished())
            })
            .unwrap_or(false)
    }

    /// Start a search job. Returns its job id (also the run's correlation
    /// id).
    ///
    /// # Errors
    ///
    /// [`PipelineError::JobActive`] when a search is already running,
    /// [`PipelineError::MailboxClosed`] when the pipeline stopped.
    pub async fn start_search(&self, spec: SearchSpec) -> Result<String, PipelineError> {
        let cmd = DiscoverCommand::new(spec.query, spec.max_results, spec.discover_all_pages);
        let job_id = cmd.correlation_id.clone();

        {
            let mut job = self
                .inner
                .job
                .lock()
                .map_err(|_| PipelineError::JobActive("bridge lock poisoned".into()))?;
            if let Some(active) = job.as_ref()
                && !active.poll_task.is_finished()
            {
                return Err(PipelineError::JobActive(active.job_id.clone()));
            }

            let poll_task = tokio::spawn(poll_loop(Arc::clone(&self.inner), job_id.clone()));
            *job = Some(ActiveJob {
                job_id: job_id.clone(),
                poll_task,
            });
        }

        if !self
            .inner
            .coordinator
            .tell(CoordinatorMsg::Discover { cmd, reply: None })
            .await
        {
            self.finish_job();
            return Err(PipelineError::MailboxClosed("coordinator"));
        }

        emit(&self.inner, JobEvent::Started {
            job_id: job_id.clone(),
        });
        Ok(job_id)
    }

    /// Pause the running search, saving a checkpoint.
    ///
    /// # Errors
    ///
    /// [`PipelineError`] when the coordinator stopped.
    pub async fn pause_search(&self) -> Result<PipelineStatus, PipelineError> {
        ask(&self.inner.coordinator, |reply| CoordinatorMsg::Pause {
            reply: Some(reply),
        })
        .await
    }

    /// Resume a paused search.
    ///
    /// # Errors
    ///
    /// [`PipelineError`] when the coordinator stopped.
    pub async fn resume_search(&self) -> Result<PipelineStatus, PipelineError> {
        ask(&self.inner.coordinator, |reply| CoordinatorMsg::Resume {
            reply: Some(reply),
        })
        .await
    }

    /// Stop the current search: pause the pipeline and close the job.
    ///
    /// # Errors
    ///
    /// [`PipelineError`] when the coordinator stopped.
    pub async fn stop_search(&self) -> Result<PipelineStatus, PipelineError> {
        let status = self.pause_search().await?;
        if let Some(job_id) = self.finish_job() {
            emit(&self.inner, JobEvent::Completed {
                job_id,
                discovered: status.discovered_count,
                downloaded: status.downloaded_count,
                errors: status.error_count,
            });
        }
        Ok(status)
    }

    /// Current pipeline snapshot.
    ///
    /// # Errors
    ///
    /// [`PipelineError`] when the coordinator stopped.
    pub async fn get_status(&self) -> Result<PipelineStatus, PipelineError> {
        ask(&self.inner.coordinator, |reply| CoordinatorMsg::GetState { reply }).await
    }

    /// Alias for status polling clients.
    ///
    /// # Errors
    ///
    /// [`PipelineError`] when the coordinator stopped.
    pub async fn get_progress(&self) -> Result<PipelineStatus, PipelineError> {
        self.get_status().await
    }

    /// Clear the job slot, aborting its poll task. Returns the job id when
    /// one was active.
    fn finish_job(&self) -> Option<String> {
        let mut job = self.inner.job.lock().ok()?;
        job.take().map(|active| {
            active.poll_task.abort();
            active.job_id
        })
    }
}

async fn poll_loop(inner: Arc<Inner>, job_id: String) {
    let mut last_downloaded = 0usize;
    let mut stalled_polls = 0u32;

    loop {
        tokio::time::sleep(inner.config.poll_interval).await;

        let status = match ask(&inner.coordinator, |reply| CoordinatorMsg::GetState { reply }).await
        {
            Ok(status) => status,
            Err(error) => {
                emit(&inner, JobEvent::Failed {
                    job_id: job_id.clone(),
                    message: error.to_string(),
                });
                break;
            }
        };

        emit(&inner, JobEvent::Progress {
            job_id: job_id.clone(),
            status: status.clone(),
        });

        if status.phase == PipelinePhase::Error {
            emit(&inner, JobEvent::Failed {
                job_id: job_id.clone(),
                message: "pipeline entered the error phase".into(),
            });
            if let Ok(mut job) = inner.job.lock() {
                *job = None;
            }
            break;
        }

        if status.phase == PipelinePhase::Paused {
            stalled_polls = 0;
            continue;
        }

        if status.downloaded_count == last_downloaded {
            stalled_polls += 1;
        } else {
            stalled_polls = 0;
            last_downloaded = status.downloaded_count;
        }

        let drained = status.is_drained() && status.phase == PipelinePhase::Idle;
        if drained || stalled_polls >= inner.config.stall_polls {
            if !drained {
                tracing::warn!(job_id, "no progress for {} polls, closing job", stalled_polls);
            }
            emit(&inner, JobEvent::Completed {
                job_id: job_id.clone(),
                discovered: status.discovered_count,
                downloaded: status.downloaded_count,
                errors: status.error_count,
            });
            if let Ok(mut job) = inner.job.lock() {
                *job = None;
            }
            break;
        }
    }
}

/// Deliver an event to every listener, containing panics per listener.
fn emit(inner: &Inner, event: JobEvent) {
    let listeners = match inner.listeners.lock() {
        Ok(listeners) => listeners.clone(),
        Err(_) => return,
    };
    for listener in listeners {
        let delivered = catch_unwind(AssertUnwindSafe(|| listener(event.clone())));
        if delivered.is_err() {
            tracing::warn!("job event listener panicked; continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::mailbox;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Minimal coordinator stand-in answering GetState with a scripted
    /// sequence of statuses (the last repeats forever).
    fn scripted_coordinator(
        statuses: Vec<PipelineStatus>,
    ) -> (Addr<CoordinatorMsg>, JoinHandle<()>) {
        let (addr, mut rx): (Addr<CoordinatorMsg>, mpsc::Receiver<CoordinatorMsg>) =
            mailbox("coordinator", 16);
        let task = tokio::spawn(async move {
            let mut cursor = 0usize;
            while let Some(msg) = rx.recv().await {
                match msg {
                    CoordinatorMsg::GetState { reply } => {
                        let status = statuses[cursor.min(statuses.len() - 1)].clone();
                        cursor += 1;
                        let _ = reply.send(status);
                    }
                    CoordinatorMsg::Pause { reply } => {
                        if let Some(reply) = reply {
                            let _ = reply.send(statuses[statuses.len() - 1].clone());
                        }
                    }
                    CoordinatorMsg::Shutdown => break,
                    _ => {}
                }
            }
        });
        (addr, task)
    }

    fn status(phase: PipelinePhase, discovered: usize, downloaded: usize) -> PipelineStatus {
        PipelineStatus {
            phase,
            session_id: "s".into(),
            discovered_count: discovered,
            downloaded_count: downloaded,
            pending_count: 0,
            active_downloads: 0,
            error_count: 0,
        }
    }

    fn fast_config(stall_polls: u32) -> BridgeConfig {
        BridgeConfig {
            poll_interval: Duration::from_millis(5),
            stall_polls,
        }
    }

    #[tokio::test]
    async fn completes_when_drained() {
        let (addr, _task) = scripted_coordinator(vec![
            status(PipelinePhase::Downloading, 2, 1),
            status(PipelinePhase::Idle, 2, 2),
        ]);
        let bridge = ControlBridge::new(addr, fast_config(50));

        let completed = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&completed);
        bridge.add_listener(Arc::new(move |event| {
            if matches!(event, JobEvent::Completed { .. }) {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }));

        bridge.start_search(SearchSpec::default()).await.unwrap();
        for _ in 0..200 {
            if !bridge.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!bridge.is_running());
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_job_at_a_time() {
        let (addr, _task) =
            scripted_coordinator(vec![status(PipelinePhase::Downloading, 10, 0)]);
        let bridge = ControlBridge::new(addr, fast_config(1000));

        bridge.start_search(SearchSpec::default()).await.unwrap();
        let second = bridge.start_search(SearchSpec::default()).await;
        assert!(matches!(second, Err(PipelineError::JobActive(_))));
        bridge.stop_search().await.unwrap();
    }

    #[tokio::test]
    async fn stall_detection_closes_the_job() {
        // Downloaded count never moves; discovered > 0 but never drained
        // (pending stays high) — only the stall counter can close this.
        let mut stuck = status(PipelinePhase::Downloading, 5, 1);
        stuck.pending_count = 4;
        let (addr, _task) = scripted_coordinator(vec![stuck]);
        let bridge = ControlBridge::new(addr, fast_config(3));

        bridge.start_search(SearchSpec::default()).await.unwrap();
        for _ in 0..200 {
            if !bridge.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!bridge.is_running());
    }

    #[tokio::test]
    async fn error_phase_fails_the_job() {
        let (addr, _task) = scripted_coordinator(vec![
            status(PipelinePhase::Downloading, 2, 1),
            status(PipelinePhase::Error, 2, 1),
        ]);
        let bridge = ControlBridge::new(addr, fast_config(50));

        let failed = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&failed);
        bridge.add_listener(Arc::new(move |event| {
            if matches!(event, JobEvent::Failed { .. }) {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }));

        bridge.start_search(SearchSpec::default()).await.unwrap();
        for _ in 0..200 {
            if !bridge.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!bridge.is_running());
        assert_eq!(failed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_listener_does_not_break_the_bridge() {
        let (addr, _task) = scripted_coordinator(vec![
            status(PipelinePhase::Downloading, 1, 0),
            status(PipelinePhase::Idle, 1, 1),
        ]);
        let bridge = ControlBridge::new(addr, fast_config(50));

        bridge.add_listener(Arc::new(|_| panic!("bad listener")));
        let healthy = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&healthy);
        bridge.add_listener(Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        bridge.start_search(SearchSpec::default()).await.unwrap();
        for _ in 0..200 {
            if !bridge.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(healthy.load(Ordering::SeqCst) >= 2);
    }
}
