// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating the configuration.
///
/// All of these are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "No config file found at {0}. A default one was written there; \
         fill in your credentials and collections, then restart."
    )]
    CreatedDefault(PathBuf),

    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write default config file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Config field '{field}' still holds the placeholder value; edit {path} and restart")]
    Placeholder { field: &'static str, path: PathBuf },

    #[error("Config field '{field}' {reason}; edit {path} and restart")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
        path: PathBuf,
    },

    #[error("No collections configured in {0}")]
    NoCollections(PathBuf),

    #[error("Downloader credentials not found at {0}; log in with the downloader once to create them")]
    MissingCredentials(PathBuf),

    #[error("Failed to prepare directory {path}: {source}")]
    DirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the remote catalog API
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Request to {url} failed: {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to obtain access token: {0}")]
    TokenFailed(String),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuildFailed(#[source] reqwest::Error),

    #[error("Invalid catalog URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Errors from fetching a single episode through the external downloader
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to launch downloader '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Downloader exited with {status} for {locator}")]
    DownloaderFailed { locator: String, status: String },

    #[error("Downloader reported success but no file appeared at {0}")]
    StagingArtifactMissing(PathBuf),

    #[error("Failed to move {from} to {to}: {source}")]
    RelocateFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from reading or writing the per-collection snapshot
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Failed to read metadata file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write metadata file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse metadata JSON in {path}: {source}")]
    JsonParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize metadata: {0}")]
    JsonSerializeFailed(#[from] serde_json::Error),
}

/// Errors from rendering or writing a feed document
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to render feed: {0}")]
    RenderFailed(#[from] rss::Error),

    #[error("Failed to write feed {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors when preparing the output tree
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to clear staging directory {path}: {source}")]
    ClearStagingFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level errors for processing one collection
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("State error: {0}")]
    State(#[from] StateError),
}
