// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::path::Path;

use crate::catalog::{Collection, Episode};
use crate::episode::canonical_path;
use crate::error::StateError;
use crate::metadata::Snapshot;

/// Why a collection has to be reprocessed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// Never synced before, or the snapshot was unreadable
    NoSnapshot,
    /// The remote episode total differs from the snapshot's
    CountChanged { previous: u32, current: u32 },
    /// The last pass left episodes that are not on disk yet
    PendingEpisodes,
    /// The feed document is gone
    FeedMissing,
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSnapshot => write!(f, "no snapshot"),
            Self::CountChanged { previous, current } => {
                write!(f, "episode count {previous} -> {current}")
            }
            Self::PendingEpisodes => write!(f, "episodes pending from last pass"),
            Self::FeedMissing => write!(f, "feed missing"),
        }
    }
}

/// Outcome of change detection for one collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Unchanged,
    Changed(ChangeReason),
}

/// Decide whether a collection needs reprocessing.
///
/// Detection is count based: a remote edit that keeps the episode total
/// constant (one episode removed, another added) or that only touches metadata
/// goes unnoticed until the total moves again.
pub fn detect_change(snapshot: Option<&Snapshot>, remote: &Collection, feed_exists: bool) -> Change {
    let Some(snapshot) = snapshot else {
        return Change::Changed(ChangeReason::NoSnapshot);
    };

    if snapshot.total_episodes() != remote.total_episodes {
        return Change::Changed(ChangeReason::CountChanged {
            previous: snapshot.total_episodes(),
            current: remote.total_episodes,
        });
    }

    if !snapshot.is_complete() {
        return Change::Changed(ChangeReason::PendingEpisodes);
    }

    if !feed_exists {
        return Change::Changed(ChangeReason::FeedMissing);
    }

    Change::Unchanged
}

/// Plan for one collection, indicating what needs to be fetched
#[derive(Debug, Clone)]
pub struct SyncPlan {
    /// Episodes whose canonical file is missing, in remote order
    pub to_fetch: Vec<Episode>,
    /// Episodes already on disk
    pub already_present: Vec<Episode>,
    /// Total number of episodes in the remote listing
    pub total_episodes: usize,
}

/// Split `episodes` by the `is_present` predicate.
///
/// Presence is existence of the canonical file only; a truncated file that
/// already exists is never fetched again.
pub fn create_sync_plan<F>(episodes: Vec<Episode>, is_present: F) -> SyncPlan
where
    F: Fn(&Episode) -> bool,
{
    let total_episodes = episodes.len();
    let (already_present, to_fetch): (Vec<Episode>, Vec<Episode>) =
        episodes.into_iter().partition(|e| is_present(e));

    SyncPlan {
        to_fetch,
        already_present,
        total_episodes,
    }
}

/// Create a sync plan against the canonical files below `output_root`
pub fn plan_collection(episodes: Vec<Episode>, output_root: &Path, collection_id: &str) -> SyncPlan {
    create_sync_plan(episodes, |episode| {
        canonical_path(output_root, collection_id, &episode.id).exists()
    })
}

/// Make sure a collection's output directory exists
pub fn ensure_collection_dir(collection_dir: &Path) -> Result<(), StateError> {
    std::fs::create_dir_all(collection_dir).map_err(|e| StateError::CreateDirectoryFailed {
        path: collection_dir.to_path_buf(),
        source: e,
    })
}

/// Wipe and recreate the staging area.
///
/// Runs once before the sync loop starts to discard files orphaned by a crash
/// in the middle of a fetch.
pub fn reset_staging(staging_root: &Path) -> Result<(), StateError> {
    match std::fs::remove_dir_all(staging_root) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(StateError::ClearStagingFailed {
                path: staging_root.to_path_buf(),
                source: e,
            });
        }
    }

    std::fs::create_dir_all(staging_root).map_err(|e| StateError::CreateDirectoryFailed {
        path: staging_root.to_path_buf(),
        source: e,
    })
}
