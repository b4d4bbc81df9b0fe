// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use crate::state::ChangeReason;

/// Events emitted while a sync pass runs
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A pass over all collections is starting
    PassStarted { collections: usize },

    /// Remote metadata is being fetched for a collection
    FetchingCollection { collection_id: String },

    /// The collection matches its snapshot; nothing else happens this pass
    CollectionUnchanged {
        collection_id: String,
        total_episodes: u32,
    },

    /// The collection must be reprocessed
    CollectionChanged {
        collection_id: String,
        reason: ChangeReason,
    },

    /// Missing episodes were resolved
    PlanReady {
        collection_id: String,
        total_episodes: usize,
        to_fetch: usize,
    },

    /// An episode fetch is starting
    FetchStarting {
        collection_id: String,
        episode_id: String,
        episode_title: String,
        /// Index of this episode in the fetch queue
        episode_index: usize,
        /// Total number of episodes to fetch
        total_to_fetch: usize,
    },

    /// An episode landed at its canonical path
    FetchCompleted {
        collection_id: String,
        episode_id: String,
    },

    /// An episode could not be fetched; it is retried next pass
    FetchFailed {
        collection_id: String,
        episode_id: String,
        error: String,
    },

    /// The feed document was rewritten
    FeedWritten {
        collection_id: String,
        entries: usize,
    },

    /// Processing a collection failed and was abandoned for this pass
    CollectionFailed {
        collection_id: String,
        error: String,
    },

    /// Pass finished
    PassCompleted {
        changed: usize,
        unchanged: usize,
        failed: usize,
        fetched: usize,
    },
}

/// Trait for reporting progress events during synchronization.
///
/// Implementations can use this to log, collect statistics, or drive a UI.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

/// Turns progress events into structured `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl LogReporter {
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

impl ProgressReporter for LogReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::PassStarted { collections } => {
                tracing::info!(collections, "sync pass started");
            }
            ProgressEvent::FetchingCollection { collection_id } => {
                tracing::debug!(collection = %collection_id, "fetching remote metadata");
            }
            ProgressEvent::CollectionUnchanged {
                collection_id,
                total_episodes,
            } => {
                tracing::info!(collection = %collection_id, total_episodes, "unchanged");
            }
            ProgressEvent::CollectionChanged {
                collection_id,
                reason,
            } => {
                tracing::info!(collection = %collection_id, %reason, "changed");
            }
            ProgressEvent::PlanReady {
                collection_id,
                total_episodes,
                to_fetch,
            } => {
                tracing::info!(collection = %collection_id, total_episodes, to_fetch, "resolved missing episodes");
            }
            ProgressEvent::FetchStarting {
                collection_id,
                episode_id,
                episode_title,
                episode_index,
                total_to_fetch,
            } => {
                tracing::info!(
                    collection = %collection_id,
                    episode = %episode_id,
                    title = %episode_title,
                    "fetching [{}/{}]",
                    episode_index + 1,
                    total_to_fetch
                );
            }
            ProgressEvent::FetchCompleted {
                collection_id,
                episode_id,
            } => {
                tracing::info!(collection = %collection_id, episode = %episode_id, "fetched");
            }
            ProgressEvent::FetchFailed {
                collection_id,
                episode_id,
                error,
            } => {
                tracing::warn!(collection = %collection_id, episode = %episode_id, %error, "fetch failed, retrying next pass");
            }
            ProgressEvent::FeedWritten {
                collection_id,
                entries,
            } => {
                tracing::info!(collection = %collection_id, entries, "feed written");
            }
            ProgressEvent::CollectionFailed {
                collection_id,
                error,
            } => {
                tracing::error!(collection = %collection_id, %error, "collection skipped this pass");
            }
            ProgressEvent::PassCompleted {
                changed,
                unchanged,
                failed,
                fetched,
            } => {
                tracing::info!(changed, unchanged, failed, fetched, "sync pass complete");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_events() -> Vec<ProgressEvent> {
        vec![
            ProgressEvent::PassStarted { collections: 2 },
            ProgressEvent::FetchingCollection {
                collection_id: "abc123".to_string(),
            },
            ProgressEvent::CollectionUnchanged {
                collection_id: "abc123".to_string(),
                total_episodes: 5,
            },
            ProgressEvent::CollectionChanged {
                collection_id: "abc123".to_string(),
                reason: ChangeReason::CountChanged {
                    previous: 4,
                    current: 5,
                },
            },
            ProgressEvent::PlanReady {
                collection_id: "abc123".to_string(),
                total_episodes: 5,
                to_fetch: 1,
            },
            ProgressEvent::FetchStarting {
                collection_id: "abc123".to_string(),
                episode_id: "e5".to_string(),
                episode_title: "Episode 5".to_string(),
                episode_index: 0,
                total_to_fetch: 1,
            },
            ProgressEvent::FetchCompleted {
                collection_id: "abc123".to_string(),
                episode_id: "e5".to_string(),
            },
            ProgressEvent::FetchFailed {
                collection_id: "abc123".to_string(),
                episode_id: "e6".to_string(),
                error: "Downloader exited with 1".to_string(),
            },
            ProgressEvent::FeedWritten {
                collection_id: "abc123".to_string(),
                entries: 5,
            },
            ProgressEvent::CollectionFailed {
                collection_id: "def456".to_string(),
                error: "HTTP error 429".to_string(),
            },
            ProgressEvent::PassCompleted {
                changed: 1,
                unchanged: 0,
                failed: 1,
                fetched: 1,
            },
        ]
    }

    #[test]
    fn noop_reporter_handles_all_events() {
        let reporter = NoopReporter;
        for event in all_events() {
            reporter.report(event);
        }
    }

    #[test]
    fn log_reporter_handles_all_events() {
        let reporter = LogReporter;
        for event in all_events() {
            reporter.report(event);
        }
    }
}
