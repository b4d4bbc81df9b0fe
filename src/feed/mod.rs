mod build;

pub use build::{FEED_FILENAME, FEED_MIME_TYPE, build_feed, public_url, render_feed, write_feed};
