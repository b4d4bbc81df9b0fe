// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use rss::extension::itunes::ITunesItemExtensionBuilder;
use rss::{Channel, ChannelBuilder, EnclosureBuilder, GuidBuilder, ImageBuilder, Item, ItemBuilder};
use url::Url;

use crate::atomic::write_atomic;
use crate::catalog::{Collection, Episode};
use crate::episode::{MEDIA_EXTENSION, canonical_path, media_mime_type};
use crate::error::FeedError;

pub const FEED_FILENAME: &str = "rss.xml";
pub const FEED_MIME_TYPE: &str = "application/rss+xml";

/// Public URL of `file` inside a collection's directory
pub fn public_url(base_url: &Url, collection_id: &str, file: &str) -> String {
    format!(
        "{}/{}/{}",
        base_url.as_str().trim_end_matches('/'),
        collection_id,
        file
    )
}

/// Build the feed for one collection.
///
/// `episodes` must be the verified set of the current pass: every entry gets an
/// enclosure pointing at its canonical file. Timestamps are rendered in UTC so
/// the same input always yields the same document.
pub fn build_feed(
    base_url: &Url,
    output_root: &Path,
    collection_id: &str,
    collection: &Collection,
    episodes: &[Episode],
) -> Channel {
    let feed_url = public_url(base_url, collection_id, FEED_FILENAME);

    let items = episodes
        .iter()
        .map(|episode| build_item(base_url, output_root, collection_id, episode))
        .collect::<Vec<_>>();

    let image = collection.image_url.as_ref().map(|url| {
        ImageBuilder::default()
            .url(url.clone())
            .title(collection.name.clone())
            .link(feed_url.clone())
            .build()
    });

    ChannelBuilder::default()
        .title(collection.name.clone())
        .link(feed_url)
        .description(collection.description.clone())
        .image(image)
        .items(items)
        .build()
}

fn build_item(base_url: &Url, output_root: &Path, collection_id: &str, episode: &Episode) -> Item {
    let file = format!("{}.{MEDIA_EXTENSION}", episode.id);
    let enclosure_url = public_url(base_url, collection_id, &file);

    // Readers expect a byte length; the file was verified to exist this pass
    let length = std::fs::metadata(canonical_path(output_root, collection_id, &episode.id))
        .map(|m| m.len())
        .unwrap_or(0);

    let enclosure = EnclosureBuilder::default()
        .url(enclosure_url.clone())
        .length(length.to_string())
        .mime_type(media_mime_type(MEDIA_EXTENSION).to_string())
        .build();

    let guid = GuidBuilder::default()
        .value(episode.id.clone())
        .permalink(false)
        .build();

    let itunes = ITunesItemExtensionBuilder::default()
        .duration(Some(episode.duration_secs().to_string()))
        .build();

    ItemBuilder::default()
        .title(Some(episode.title.clone()))
        .description(Some(episode.description.clone()))
        .link(Some(enclosure_url))
        .guid(Some(guid))
        .pub_date(episode.published_at.map(|dt| dt.to_rfc2822()))
        .enclosure(Some(enclosure))
        .itunes_ext(Some(itunes))
        .build()
}

/// Serialize a channel to pretty-printed XML
pub fn render_feed(channel: &Channel) -> Result<Vec<u8>, FeedError> {
    Ok(channel.pretty_write_to(Vec::new(), b' ', 2)?)
}

/// Replace the feed document in `collection_dir` in one step
pub fn write_feed(collection_dir: &Path, channel: &Channel) -> Result<(), FeedError> {
    let xml = render_feed(channel)?;
    let path = collection_dir.join(FEED_FILENAME);

    write_atomic(&path, &xml).map_err(|e| FeedError::WriteFailed { path, source: e })
}
