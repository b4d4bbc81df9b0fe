mod client;
mod types;

pub use client::{CatalogApi, SpotifyCatalog, fetch_all_episodes};
pub use types::{Collection, Episode, EpisodePage, parse_release_date};
