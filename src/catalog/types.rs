// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A tracked show as reported by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub total_episodes: u32,
}

/// One remote episode. The `id` is stable across syncs and keys the on-disk file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    /// Reference handed to the downloader; never used for naming
    pub locator: String,
}

impl Episode {
    /// Duration rounded down to whole seconds
    pub fn duration_secs(&self) -> u64 {
        self.duration_ms / 1000
    }
}

/// One page of an episode listing
#[derive(Debug, Clone, Default)]
pub struct EpisodePage {
    pub items: Vec<Episode>,
    /// Opaque continuation; `None` once the listing is exhausted
    pub next_cursor: Option<String>,
}

/// Normalize a catalog release date to midnight UTC.
///
/// The catalog reports `YYYY`, `YYYY-MM` or `YYYY-MM-DD` depending on
/// `precision`; coarser values map to the first day they cover.
pub fn parse_release_date(date: &str, precision: Option<&str>) -> Option<DateTime<Utc>> {
    let padded = match precision {
        Some("year") => format!("{date}-01-01"),
        Some("month") => format!("{date}-01"),
        _ => date.to_string(),
    };

    NaiveDate::parse_from_str(&padded, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
