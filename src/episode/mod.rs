mod download;
mod filename;

pub use download::{Downloader, ZotifyDownloader, fetch_episode};
pub use filename::{
    MEDIA_EXTENSION, canonical_path, media_mime_type, sanitize_filename, staging_path,
};
