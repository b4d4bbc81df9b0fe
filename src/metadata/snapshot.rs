// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::atomic::write_atomic;
use crate::catalog::{Collection, Episode};
use crate::error::MetadataError;

pub const SNAPSHOT_FILENAME: &str = "metadata.json";

/// Last observed remote state of one collection.
///
/// Only used as a change signal: the collection is reprocessed when the
/// snapshot is missing, its episode total differs from the remote one, or some
/// episodes were not yet on disk when it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub collection: Collection,
    pub episodes: Vec<Episode>,
    /// IDs of episodes whose canonical file existed when the snapshot was taken
    #[serde(default)]
    pub satisfied: Vec<String>,
    pub synced_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(collection: Collection, episodes: Vec<Episode>, satisfied: Vec<String>) -> Self {
        Self {
            collection,
            episodes,
            satisfied,
            synced_at: Utc::now(),
        }
    }

    pub fn total_episodes(&self) -> u32 {
        self.collection.total_episodes
    }

    /// Whether every listed episode was on disk at snapshot time
    pub fn is_complete(&self) -> bool {
        let satisfied: HashSet<&str> = self.satisfied.iter().map(String::as_str).collect();
        self.episodes
            .iter()
            .all(|episode| satisfied.contains(episode.id.as_str()))
    }
}

/// Read the snapshot stored in `collection_dir`, `None` if there is none yet
pub fn read_snapshot(collection_dir: &Path) -> Result<Option<Snapshot>, MetadataError> {
    let path = collection_dir.join(SNAPSHOT_FILENAME);

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(MetadataError::ReadFailed { path, source: e }),
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| MetadataError::JsonParseFailed { path, source: e })
}

/// Replace the snapshot in `collection_dir`
pub fn write_snapshot(collection_dir: &Path, snapshot: &Snapshot) -> Result<(), MetadataError> {
    let path = collection_dir.join(SNAPSHOT_FILENAME);
    let json = serde_json::to_string_pretty(snapshot)?;

    write_atomic(&path, json.as_bytes()).map_err(|e| MetadataError::WriteFailed { path, source: e })
}
