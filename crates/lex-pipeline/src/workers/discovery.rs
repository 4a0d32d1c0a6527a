//! Discovery worker: drives the paginated search and emits
//! `DocumentDiscovered` events.
//!
//! Keeps a process-local set of already-emitted `q_params` so a document
//! seen on two pages is announced once. Page-1 failures abort the command
//! (parse errors non-recoverably, network errors recoverably); failures on
//! later pages only skip that page.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use lex_parser::search::{extract_pagination, parse_search_results, PageInfo};

use crate::coordinator::{CoordinatorMsg, DiscoveryOutcome};
use crate::fetch::{FetchError, PageFetcher};
use crate::mailbox::{mailbox, Addr};
use crate::messages::{
    ActorError, DiscoverCommand, DiscoverPageCommand, DocumentDiscovered, PageDiscovered,
    RetryCommand, SearchQuery,
};
use crate::rate_limit::RateLimiter;

const ACTOR_NAME: &str = "discovery";

/// Messages the discovery worker consumes.
pub enum DiscoveryMsg {
    Discover {
        cmd: DiscoverCommand,
        reply: Option<oneshot::Sender<DiscoveryOutcome>>,
    },
    DiscoverPage {
        cmd: DiscoverPageCommand,
        reply: Option<oneshot::Sender<DiscoveryOutcome>>,
    },
    Shutdown,
}

/// Search-driving worker.
pub struct DiscoveryWorker<F> {
    coordinator: Addr<CoordinatorMsg>,
    fetcher: Arc<F>,
    limiter: Arc<RateLimiter>,
    max_pages: u32,
    seen: HashSet<String>,
}

impl<F: PageFetcher> DiscoveryWorker<F> {
    /// Spawn the worker loop.
    pub fn spawn(
        coordinator: Addr<CoordinatorMsg>,
        fetcher: Arc<F>,
        limiter: Arc<RateLimiter>,
        max_pages: u32,
        capacity: usize,
    ) -> (Addr<DiscoveryMsg>, JoinHandle<()>) {
        let (addr, rx) = mailbox("discovery", capacity);
        let worker = Self {
            coordinator,
            fetcher,
            limiter,
            max_pages,
            seen: HashSet::new(),
        };
        let handle = tokio::spawn(worker.run(rx));
        (addr, handle)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<DiscoveryMsg>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                DiscoveryMsg::Discover { cmd, reply } => {
                    let outcome = self.handle_discover(cmd).await;
                    self.report(outcome, reply).await;
                }
                DiscoveryMsg::DiscoverPage { cmd, reply } => {
                    let outcome = self.handle_discover_page(cmd).await;
                    self.report(outcome, reply).await;
                }
                DiscoveryMsg::Shutdown => break,
            }
        }
    }

    /// Forward the outcome to the coordinator and complete the ask, if any.
    async fn report(
        &self,
        outcome: DiscoveryOutcome,
        reply: Option<oneshot::Sender<DiscoveryOutcome>>,
    ) {
        match &outcome {
            DiscoveryOutcome::Page(page) => {
                self.coordinator
                    .tell(CoordinatorMsg::Page(page.clone()))
                    .await;
            }
            DiscoveryOutcome::Error(error) => {
                self.coordinator
                    .tell(CoordinatorMsg::Error(error.clone()))
                    .await;
            }
        }
        if let Some(reply) = reply {
            let _ = reply.send(outcome);
        }
    }

    async fn handle_discover(&mut self, cmd: DiscoverCommand) -> DiscoveryOutcome {
        self.limiter.acquire().await;

        let html = match self.fetcher.fetch_search_page(&cmd.query, 1).await {
            Ok(html) => html,
            Err(error) => return self.fetch_error(&cmd.correlation_id, &error, Some(&cmd)),
        };

        let items = match parse_search_results(&html) {
            Ok(items) => items,
            Err(error) => {
                return DiscoveryOutcome::Error(ActorError::new(
                    &cmd.correlation_id,
                    ACTOR_NAME,
                    "ParseError",
                    error.to_string(),
                    false,
                    None,
                ));
            }
        };

        let mut found = 0usize;
        for item in items {
            if self.at_cap(cmd.max_results, found) {
                break;
            }
            found += self
                .emit_discovered(&cmd.correlation_id, &item.q_param, &item.title, &item.category)
                .await;
        }

        let mut info = extract_pagination(&html);
        tracing::info!(
            page = info.current_page,
            total_pages = info.total_pages,
            found,
            "search page parsed"
        );

        if cmd.discover_all_pages {
            let mut pages_fetched = 1u32;
            while info.has_more()
                && pages_fetched < self.max_pages
                && !self.at_cap(cmd.max_results, found)
            {
                self.limiter.acquire().await;
                let page = info.current_page + 1;
                pages_fetched += 1;

                let html = match self.fetcher.fetch_search_page(&cmd.query, page).await {
                    Ok(html) => html,
                    Err(error) => {
                        tracing::warn!(page, %error, "search page fetch failed, skipping");
                        info.current_page = page;
                        continue;
                    }
                };
                let items = match parse_search_results(&html) {
                    Ok(items) => items,
                    Err(error) => {
                        tracing::warn!(page, %error, "search page parse failed, skipping");
                        info.current_page = page;
                        continue;
                    }
                };

                let mut page_found = 0usize;
                for item in items {
                    if self.at_cap(cmd.max_results, found) {
                        break;
                    }
                    let emitted = self
                        .emit_discovered(
                            &cmd.correlation_id,
                            &item.q_param,
                            &item.title,
                            &item.category,
                        )
                        .await;
                    found += emitted;
                    page_found += emitted;
                }
                tracing::info!(page, found = page_found, "search page parsed");

                let page_info = extract_pagination(&html);
                info.current_page = page;
                if page_info.total_pages > info.total_pages {
                    info.total_pages = page_info.total_pages;
                }
            }
        }

        DiscoveryOutcome::Page(self.page_event(&cmd.correlation_id, found, &info))
    }

    async fn handle_discover_page(&mut self, cmd: DiscoverPageCommand) -> DiscoveryOutcome {
        self.limiter.acquire().await;

        let html = match self.fetcher.fetch_search_page(&cmd.query, cmd.page).await {
            Ok(html) => html,
            Err(error) => {
                let recoverable = error.is_transient();
                return DiscoveryOutcome::Error(ActorError::new(
                    &cmd.correlation_id,
                    ACTOR_NAME,
                    error.kind(),
                    error.to_string(),
                    recoverable,
                    None,
                ));
            }
        };

        let items = match parse_search_results(&html) {
            Ok(items) => items,
            Err(error) => {
                return DiscoveryOutcome::Error(ActorError::new(
                    &cmd.correlation_id,
                    ACTOR_NAME,
                    "ParseError",
                    error.to_string(),
                    false,
                    None,
                ));
            }
        };

        let mut found = 0usize;
        for item in items {
            found += self
                .emit_discovered(&cmd.correlation_id, &item.q_param, &item.title, &item.category)
                .await;
        }

        let mut info = extract_pagination(&html);
        if info.current_page == 1 && cmd.page > 1 {
            info.current_page = cmd.page;
        }
        DiscoveryOutcome::Page(self.page_event(&cmd.correlation_id, found, &info))
    }

    async fn emit_discovered(
        &mut self,
        correlation_id: &str,
        q_param: &str,
        title: &str,
        category: &str,
    ) -> usize {
        if !self.seen.insert(q_param.to_string()) {
            return 0;
        }
        self.coordinator
            .tell(CoordinatorMsg::Discovered(DocumentDiscovered {
                correlation_id: correlation_id.to_string(),
                timestamp: chrono::Utc::now(),
                q_param: q_param.to_string(),
                title: title.to_string(),
                category: category.to_string(),
            }))
            .await;
        1
    }

    fn at_cap(&self, max_results: usize, found: usize) -> bool {
        max_results > 0 && found >= max_results
    }

    fn page_event(&self, correlation_id: &str, found: usize, info: &PageInfo) -> PageDiscovered {
        PageDiscovered {
            correlation_id: correlation_id.to_string(),
            timestamp: chrono::Utc::now(),
            documents_found: found,
            current_page: info.current_page,
            total_pages: info.total_pages,
            has_more_pages: info.has_more(),
        }
    }

    fn fetch_error(
        &self,
        correlation_id: &str,
        error: &FetchError,
        original: Option<&DiscoverCommand>,
    ) -> DiscoveryOutcome {
        let recoverable = error.is_transient();
        DiscoveryOutcome::Error(ActorError::new(
            correlation_id,
            ACTOR_NAME,
            error.kind(),
            error.to_string(),
            recoverable,
            recoverable
                .then(|| original.map(|cmd| RetryCommand::Discover(cmd.clone())))
                .flatten(),
        ))
    }
}

/// Convenience for building a page-scoped command from a discover command.
#[must_use]
pub fn page_command(cmd: &DiscoverCommand, page: u32) -> DiscoverPageCommand {
    DiscoverPageCommand {
        correlation_id: cmd.correlation_id.clone(),
        timestamp: chrono::Utc::now(),
        query: SearchQuery {
            category: cmd.query.category.clone(),
            scope: cmd.query.scope.clone(),
            status: cmd.query.status.clone(),
        },
        page,
    }
}
