// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::catalog::Episode;
use crate::config::Layout;
use crate::error::FetchError;

use super::filename::{MEDIA_EXTENSION, canonical_path, staging_path};

/// External media fetcher.
///
/// Given an episode locator it produces a file somewhere below `staging_root`;
/// only the exit status is reported back.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, locator: &str, staging_root: &Path) -> Result<(), FetchError>;
}

/// Runs the zotify command line tool
#[derive(Debug, Clone)]
pub struct ZotifyDownloader {
    program: String,
    credentials_path: PathBuf,
}

impl ZotifyDownloader {
    pub fn new(program: impl Into<String>, credentials_path: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            credentials_path: credentials_path.into(),
        }
    }

    fn command(&self, locator: &str, staging_root: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg(format!(
                "--credentials-location={}",
                self.credentials_path.display()
            ))
            .arg(format!("--root-podcast-path={}", staging_root.display()))
            .arg(format!(
                "--temp-download-dir={}",
                staging_root.join(".tmp").display()
            ))
            .arg(format!("--download-format={MEDIA_EXTENSION}"))
            .arg(locator)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Downloader for ZotifyDownloader {
    async fn download(&self, locator: &str, staging_root: &Path) -> Result<(), FetchError> {
        let status = self
            .command(locator, staging_root)
            .status()
            .await
            .map_err(|e| FetchError::SpawnFailed {
                program: self.program.clone(),
                source: e,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(FetchError::DownloaderFailed {
                locator: locator.to_string(),
                status: status.to_string(),
            })
        }
    }
}

/// Fetch one episode and move it to its canonical, ID-keyed location.
///
/// The downloader names its output after the collection name and episode
/// title; this function locates that file and renames it to
/// `{collection_id}/{episode_id}.ogg`. Nothing is recorded on failure: the
/// canonical file is still missing, so the next pass retries.
pub async fn fetch_episode<D: Downloader + ?Sized>(
    downloader: &D,
    layout: &Layout,
    collection_id: &str,
    collection_name: &str,
    episode: &Episode,
) -> Result<PathBuf, FetchError> {
    downloader
        .download(&episode.locator, &layout.staging_root)
        .await?;

    let staged = staging_path(&layout.staging_root, collection_name, &episode.title);
    if !tokio::fs::try_exists(&staged).await.unwrap_or(false) {
        return Err(FetchError::StagingArtifactMissing(staged));
    }

    let target = canonical_path(&layout.output_root, collection_id, &episode.id);
    relocate(&staged, &target).await?;

    Ok(target)
}

/// Move `from` to `to`, falling back to copy + rename across filesystems
async fn relocate(from: &Path, to: &Path) -> Result<(), FetchError> {
    let relocate_error = |source| FetchError::RelocateFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(relocate_error)?;
    }

    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            copy_into_place(from, to).await
        }
        Err(e) => Err(relocate_error(e)),
    }
}

/// Copy `from` next to `to` under a `.partial` name, rename it into place,
/// then remove `from`.
///
/// The canonical name only ever refers to a complete file. If the copy or the
/// rename fails the partial file is removed again so it is never published.
async fn copy_into_place(from: &Path, to: &Path) -> Result<(), FetchError> {
    let partial = to.with_extension(format!("{MEDIA_EXTENSION}.partial"));

    let placed = match tokio::fs::copy(from, &partial).await {
        Ok(_) => tokio::fs::rename(&partial, to).await,
        Err(e) => Err(e),
    };

    if let Err(source) = placed {
        if let Err(e) = tokio::fs::remove_file(&partial).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %partial.display(), error = %e, "failed to remove partial copy");
        }
        return Err(FetchError::RelocateFailed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        });
    }

    // The episode is in place; a leftover staging file is wiped on next start
    if let Err(e) = tokio::fs::remove_file(from).await {
        tracing::warn!(path = %from.display(), error = %e, "failed to remove staging file");
    }
    Ok(())
}
