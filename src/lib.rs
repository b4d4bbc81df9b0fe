// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod atomic;
pub mod catalog;
pub mod config;
pub mod episode;
pub mod error;
pub mod feed;
pub mod metadata;
pub mod progress;
pub mod server;
pub mod state;
pub mod sync;

// Re-export main types for convenience
pub use catalog::{CatalogApi, Collection, Episode, EpisodePage, SpotifyCatalog, fetch_all_episodes};
pub use config::{
    AppConfig, CollectionConfig, ConfigState, Layout, bootstrap_config, load_config,
};
pub use episode::{Downloader, ZotifyDownloader, canonical_path, sanitize_filename, staging_path};
pub use error::{
    CatalogError, ConfigError, FeedError, FetchError, MetadataError, StateError, SyncError,
};
pub use progress::{
    LogReporter, NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter,
};
pub use server::{ServerState, router, serve};
pub use sync::{CollectionOutcome, PassSummary, SyncEngine};
