// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;

use crate::catalog::{CatalogApi, fetch_all_episodes};
use crate::config::{AppConfig, CollectionConfig, Layout};
use crate::episode::{Downloader, fetch_episode};
use crate::error::{FetchError, StateError, SyncError};
use crate::feed::{FEED_FILENAME, build_feed, write_feed};
use crate::metadata::{Snapshot, read_snapshot, write_snapshot};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::state::{
    Change, ChangeReason, detect_change, ensure_collection_dir, plan_collection, reset_staging,
};

/// What happened to one collection during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionOutcome {
    /// Snapshot matched the remote state; no downloads, feed untouched
    Unchanged,
    /// The collection was resolved and fetched
    Synced {
        /// Episodes moved into place this pass
        fetched: usize,
        /// Episodes that failed and will be retried
        failed: usize,
        /// Episodes verified on disk, i.e. entries of the published feed
        feed_entries: usize,
    },
}

/// Totals for one pass over all collections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub changed: usize,
    pub unchanged: usize,
    /// Collections abandoned because of an error
    pub failed: usize,
    /// Episodes fetched across all collections
    pub fetched: usize,
    /// Episodes that failed across all collections
    pub fetch_failures: usize,
}

/// The incremental synchronization engine.
///
/// Owns everything one sync loop needs; the HTTP side never touches it and
/// only sees the files it writes.
pub struct SyncEngine<C, D> {
    config: AppConfig,
    layout: Layout,
    catalog: C,
    downloader: D,
    reporter: SharedProgressReporter,
}

impl<C: CatalogApi, D: Downloader> SyncEngine<C, D> {
    pub fn new(
        config: AppConfig,
        layout: Layout,
        catalog: C,
        downloader: D,
        reporter: SharedProgressReporter,
    ) -> Self {
        Self {
            config,
            layout,
            catalog,
            downloader,
            reporter,
        }
    }

    /// Clear the staging area; call once before the first pass
    pub fn prepare(&self) -> Result<(), StateError> {
        reset_staging(&self.layout.staging_root)
    }

    /// Run passes forever, sleeping a fixed interval between them
    pub async fn run_forever(&self) {
        loop {
            self.run_pass().await;
            tokio::time::sleep(self.config.sync_interval()).await;
        }
    }

    /// Process every configured collection once, in order.
    ///
    /// Errors are reported per collection and never abort the pass.
    pub async fn run_pass(&self) -> PassSummary {
        let mut summary = PassSummary::default();

        self.reporter.report(ProgressEvent::PassStarted {
            collections: self.config.collections.len(),
        });

        for entry in &self.config.collections {
            match self.sync_collection(entry).await {
                Ok(CollectionOutcome::Unchanged) => summary.unchanged += 1,
                Ok(CollectionOutcome::Synced {
                    fetched, failed, ..
                }) => {
                    summary.changed += 1;
                    summary.fetched += fetched;
                    summary.fetch_failures += failed;
                }
                Err(e) => {
                    summary.failed += 1;
                    self.reporter.report(ProgressEvent::CollectionFailed {
                        collection_id: entry.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        self.reporter.report(ProgressEvent::PassCompleted {
            changed: summary.changed,
            unchanged: summary.unchanged,
            failed: summary.failed,
            fetched: summary.fetched,
        });

        summary
    }

    /// Bring one collection up to date.
    ///
    /// Reads the snapshot, compares it with the remote metadata and, when
    /// something changed, fetches the missing episodes and rewrites the feed
    /// from exactly the episodes verified on disk. A retry of pending episodes
    /// that fetches nothing keeps the existing feed. The snapshot is rewritten
    /// in every case.
    pub async fn sync_collection(
        &self,
        entry: &CollectionConfig,
    ) -> Result<CollectionOutcome, SyncError> {
        let collection_id = entry.id.as_str();
        let collection_dir = self.layout.collection_dir(collection_id);

        let snapshot = match read_snapshot(&collection_dir) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(collection = %collection_id, error = %e, "ignoring unreadable snapshot");
                None
            }
        };

        self.reporter.report(ProgressEvent::FetchingCollection {
            collection_id: collection_id.to_string(),
        });
        let remote = self.catalog.get_collection(collection_id).await?;

        let feed_exists = collection_dir.join(FEED_FILENAME).exists();

        let reason = match detect_change(snapshot.as_ref(), &remote, feed_exists) {
            Change::Unchanged => {
                self.reporter.report(ProgressEvent::CollectionUnchanged {
                    collection_id: collection_id.to_string(),
                    total_episodes: remote.total_episodes,
                });

                // Refresh collection metadata, keep the last resolved episode state
                let (episodes, satisfied) = snapshot
                    .map(|s| (s.episodes, s.satisfied))
                    .unwrap_or_default();
                write_snapshot(&collection_dir, &Snapshot::new(remote, episodes, satisfied))?;

                return Ok(CollectionOutcome::Unchanged);
            }
            Change::Changed(reason) => reason,
        };

        self.reporter.report(ProgressEvent::CollectionChanged {
            collection_id: collection_id.to_string(),
            reason,
        });

        let episodes = fetch_all_episodes(
            &self.catalog,
            collection_id,
            self.config.effective_page_size(),
        )
        .await?;

        ensure_collection_dir(&collection_dir)?;

        let plan = plan_collection(episodes.clone(), &self.layout.output_root, collection_id);
        self.reporter.report(ProgressEvent::PlanReady {
            collection_id: collection_id.to_string(),
            total_episodes: plan.total_episodes,
            to_fetch: plan.to_fetch.len(),
        });

        let mut verified: HashSet<String> =
            plan.already_present.iter().map(|e| e.id.clone()).collect();
        let mut fetched = 0;
        let mut failed = 0;
        let total_to_fetch = plan.to_fetch.len();

        for (episode_index, episode) in plan.to_fetch.iter().enumerate() {
            self.reporter.report(ProgressEvent::FetchStarting {
                collection_id: collection_id.to_string(),
                episode_id: episode.id.clone(),
                episode_title: episode.title.clone(),
                episode_index,
                total_to_fetch,
            });

            // The downloader names its output after the remote show name
            let result = fetch_episode(
                &self.downloader,
                &self.layout,
                collection_id,
                &remote.name,
                episode,
            )
            .await;

            match result {
                Ok(_) => {
                    fetched += 1;
                    verified.insert(episode.id.clone());
                    self.reporter.report(ProgressEvent::FetchCompleted {
                        collection_id: collection_id.to_string(),
                        episode_id: episode.id.clone(),
                    });
                }
                Err(e) => {
                    failed += 1;
                    if let FetchError::StagingArtifactMissing(path) = &e {
                        tracing::error!(
                            collection = %collection_id,
                            episode = %episode.id,
                            path = %path.display(),
                            "downloader output not found where expected; file naming may have changed"
                        );
                    }
                    self.reporter.report(ProgressEvent::FetchFailed {
                        collection_id: collection_id.to_string(),
                        episode_id: episode.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        // Feed entries come from this pass's verified set, in remote order
        let feed_episodes: Vec<_> = episodes
            .iter()
            .filter(|e| verified.contains(&e.id))
            .cloned()
            .collect();

        // A retry that fetched nothing leaves the published feed as it was
        let retry_found_nothing =
            reason == ChangeReason::PendingEpisodes && fetched == 0 && feed_exists;

        if retry_found_nothing {
            tracing::debug!(collection = %collection_id, "nothing new fetched, feed left untouched");
        } else {
            let channel = build_feed(
                &self.config.base_url,
                &self.layout.output_root,
                collection_id,
                &remote,
                &feed_episodes,
            );
            write_feed(&collection_dir, &channel)?;
            self.reporter.report(ProgressEvent::FeedWritten {
                collection_id: collection_id.to_string(),
                entries: feed_episodes.len(),
            });
        }

        let satisfied = feed_episodes.iter().map(|e| e.id.clone()).collect();
        write_snapshot(&collection_dir, &Snapshot::new(remote, episodes, satisfied))?;

        Ok(CollectionOutcome::Synced {
            fetched,
            failed,
            feed_entries: feed_episodes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::tempdir;

    use crate::catalog::{Collection, Episode, EpisodePage};
    use crate::config::CollectionConfig;
    use crate::episode::{canonical_path, staging_path};
    use crate::error::CatalogError;
    use crate::progress::NoopReporter;

    struct MockCatalog {
        collections: HashMap<String, (Collection, Vec<Episode>)>,
    }

    #[async_trait]
    impl CatalogApi for MockCatalog {
        async fn get_collection(&self, id: &str) -> Result<Collection, CatalogError> {
            self.collections
                .get(id)
                .map(|(c, _)| c.clone())
                .ok_or_else(|| CatalogError::HttpStatus {
                    url: format!("https://api.example.com/shows/{id}"),
                    status: 404,
                })
        }

        async fn list_episodes(
            &self,
            id: &str,
            _page_size: u32,
            _cursor: Option<&str>,
        ) -> Result<EpisodePage, CatalogError> {
            Ok(EpisodePage {
                items: self.collections[id].1.clone(),
                next_cursor: None,
            })
        }
    }

    /// Writes staging files for every locator it knows about
    struct MockDownloader {
        titles: HashMap<String, (String, String)>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl Downloader for MockDownloader {
        async fn download(&self, locator: &str, staging_root: &Path) -> Result<(), FetchError> {
            *self.calls.lock().unwrap() += 1;
            let (show, title) = &self.titles[locator];
            let path = staging_path(staging_root, show, title);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, b"audio").unwrap();
            Ok(())
        }
    }

    fn make_episode(id: &str) -> Episode {
        Episode {
            id: id.to_string(),
            title: format!("Episode {id}"),
            description: String::new(),
            published_at: None,
            duration_ms: 1000,
            locator: format!("locator:{id}"),
        }
    }

    fn make_collection(id: &str, total: u32) -> Collection {
        Collection {
            id: id.to_string(),
            name: format!("Show {id}"),
            description: String::new(),
            image_url: None,
            total_episodes: total,
        }
    }

    fn engine(
        root: &Path,
        collections: Vec<(Collection, Vec<Episode>)>,
        configured: &[&str],
    ) -> SyncEngine<MockCatalog, MockDownloader> {
        let mut titles = HashMap::new();
        for (collection, episodes) in &collections {
            for episode in episodes {
                titles.insert(
                    episode.locator.clone(),
                    (collection.name.clone(), episode.title.clone()),
                );
            }
        }

        let config = AppConfig {
            collections: configured
                .iter()
                .map(|id| CollectionConfig {
                    name: id.to_string(),
                    id: id.to_string(),
                })
                .collect(),
            ..AppConfig::template()
        };

        SyncEngine::new(
            config,
            Layout::new(root),
            MockCatalog {
                collections: collections
                    .into_iter()
                    .map(|(c, e)| (c.id.clone(), (c, e)))
                    .collect(),
            },
            MockDownloader {
                titles,
                calls: Mutex::new(0),
            },
            NoopReporter::shared(),
        )
    }

    #[tokio::test]
    async fn first_sync_fetches_everything() {
        let dir = tempdir().unwrap();
        let episodes = vec![make_episode("e1"), make_episode("e2")];
        let engine = engine(
            dir.path(),
            vec![(make_collection("abc123", 2), episodes)],
            &["abc123"],
        );
        engine.prepare().unwrap();

        let outcome = engine
            .sync_collection(&engine.config.collections[0])
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CollectionOutcome::Synced {
                fetched: 2,
                failed: 0,
                feed_entries: 2
            }
        );
        let root = &engine.layout.output_root;
        assert!(canonical_path(root, "abc123", "e1").exists());
        assert!(canonical_path(root, "abc123", "e2").exists());
        assert!(root.join("abc123").join("rss.xml").exists());
        assert!(root.join("abc123").join("metadata.json").exists());
    }

    #[tokio::test]
    async fn second_sync_is_a_noop() {
        let dir = tempdir().unwrap();
        let engine = engine(
            dir.path(),
            vec![(make_collection("abc123", 1), vec![make_episode("e1")])],
            &["abc123"],
        );

        engine.run_pass().await;
        let summary = engine.run_pass().await;

        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.fetched, 0);
        assert_eq!(*engine.downloader.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn catalog_error_does_not_abort_pass() {
        let dir = tempdir().unwrap();
        let engine = engine(
            dir.path(),
            vec![(make_collection("good", 1), vec![make_episode("g1")])],
            &["missing", "good"],
        );

        let summary = engine.run_pass().await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.changed, 1);
        assert!(canonical_path(&engine.layout.output_root, "good", "g1").exists());
    }

    #[tokio::test]
    async fn unreadable_snapshot_triggers_reprocessing() {
        let dir = tempdir().unwrap();
        let engine = engine(
            dir.path(),
            vec![(make_collection("abc123", 1), vec![make_episode("e1")])],
            &["abc123"],
        );
        let collection_dir = engine.layout.collection_dir("abc123");
        std::fs::create_dir_all(&collection_dir).unwrap();
        std::fs::write(collection_dir.join("metadata.json"), "garbage").unwrap();

        let outcome = engine
            .sync_collection(&engine.config.collections[0])
            .await
            .unwrap();

        assert!(matches!(outcome, CollectionOutcome::Synced { fetched: 1, .. }));
        assert!(read_snapshot(&collection_dir).unwrap().is_some());
    }

    #[tokio::test]
    async fn prepare_clears_staging_leftovers() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path(), vec![], &[]);
        let orphan = engine.layout.staging_root.join("Show").join("Show - Ep.ogg");
        std::fs::create_dir_all(orphan.parent().unwrap()).unwrap();
        std::fs::write(&orphan, b"partial").unwrap();

        engine.prepare().unwrap();

        assert!(!orphan.exists());
        assert!(engine.layout.staging_root.is_dir());
    }
}
