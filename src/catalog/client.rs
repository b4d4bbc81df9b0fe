// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use url::Url;

use crate::config::AppConfig;
use crate::error::CatalogError;

use super::types::{Collection, Episode, EpisodePage, parse_release_date};

/// Tokens are refreshed this long before the catalog says they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Read-only access to the remote catalog.
///
/// The sync engine only talks to the catalog through this trait so tests can
/// substitute an in-memory catalog.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Fetch collection-level metadata including the total episode count
    async fn get_collection(&self, id: &str) -> Result<Collection, CatalogError>;

    /// Fetch one page of episodes; pass the previous page's cursor to continue
    async fn list_episodes(
        &self,
        id: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<EpisodePage, CatalogError>;
}

/// Follow continuation cursors until the listing is exhausted
pub async fn fetch_all_episodes<C: CatalogApi + ?Sized>(
    catalog: &C,
    id: &str,
    page_size: u32,
) -> Result<Vec<Episode>, CatalogError> {
    let mut episodes = Vec::new();
    let mut cursor: Option<String> = None;
    let mut seen = HashSet::new();

    loop {
        let page = catalog
            .list_episodes(id, page_size, cursor.as_deref())
            .await?;
        episodes.extend(page.items);

        match page.next_cursor {
            // A cursor seen before would start the listing over
            Some(next) if seen.insert(next.clone()) => cursor = Some(next),
            Some(next) => {
                tracing::warn!(collection = %id, cursor = %next, "episode listing cursor repeats, stopping");
                break;
            }
            None => break,
        }
    }

    Ok(episodes)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    valid_until: Instant,
}

#[derive(Debug, Deserialize)]
struct ShowResponse {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    images: Vec<ImageObject>,
    total_episodes: u32,
}

#[derive(Debug, Deserialize)]
struct ImageObject {
    url: String,
}

#[derive(Debug, Deserialize)]
struct EpisodesResponse {
    // Episodes unavailable in the market come back as null
    items: Vec<Option<EpisodeObject>>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EpisodeObject {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    release_date: Option<String>,
    release_date_precision: Option<String>,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default)]
    external_urls: ExternalUrls,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

impl From<EpisodeObject> for Episode {
    fn from(raw: EpisodeObject) -> Self {
        let published_at = raw
            .release_date
            .as_deref()
            .and_then(|d| parse_release_date(d, raw.release_date_precision.as_deref()));
        let locator = raw
            .external_urls
            .spotify
            .unwrap_or_else(|| format!("https://open.spotify.com/episode/{}", raw.id));

        Self {
            id: raw.id,
            title: raw.name,
            description: raw.description,
            published_at,
            duration_ms: raw.duration_ms,
            locator,
        }
    }
}

/// Catalog client for the Spotify Web API using the client-credentials grant
pub struct SpotifyCatalog {
    client: reqwest::Client,
    api_base_url: Url,
    token_url: Url,
    client_id: String,
    client_secret: String,
    market: String,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyCatalog {
    /// Create a catalog client whose requests time out after
    /// `config.request_timeout()`
    pub fn new(config: &AppConfig) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(CatalogError::ClientBuildFailed)?;

        Ok(Self::with_client(client, config))
    }

    /// Create a catalog client with a custom reqwest::Client
    pub fn with_client(client: reqwest::Client, config: &AppConfig) -> Self {
        Self {
            client,
            api_base_url: config.api_base_url.clone(),
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            market: config.market.clone(),
            token: Mutex::new(None),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, CatalogError> {
        let base = self.api_base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    async fn access_token(&self) -> Result<String, CatalogError> {
        let mut guard = self.token.lock().await;

        if let Some(token) = guard.as_ref()
            && token.valid_until > Instant::now()
        {
            return Ok(token.value.clone());
        }

        let url = self.token_url.to_string();
        let response = self
            .client
            .post(self.token_url.clone())
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| CatalogError::RequestFailed {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(CatalogError::TokenFailed(format!(
                "token endpoint answered {}",
                response.status().as_u16()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::RequestFailed { url, source: e })?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *guard = Some(CachedToken {
            value: token.access_token.clone(),
            valid_until: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }

    /// GET `url` as JSON. A 401 drops the cached token and the request is
    /// retried once with a fresh one.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, CatalogError> {
        let url_str = url.to_string();
        let mut retried = false;

        let response = loop {
            let token = self.access_token().await?;
            let response = self
                .client
                .get(url.clone())
                .bearer_auth(token)
                .send()
                .await
                .map_err(|e| CatalogError::RequestFailed {
                    url: url_str.clone(),
                    source: e,
                })?;

            if response.status() != reqwest::StatusCode::UNAUTHORIZED {
                break response;
            }
            self.token.lock().await.take();
            if retried {
                break response;
            }
            retried = true;
        };

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::HttpStatus {
                url: url_str,
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| CatalogError::RequestFailed {
                url: url_str,
                source: e,
            })
    }
}

#[async_trait]
impl CatalogApi for SpotifyCatalog {
    async fn get_collection(&self, id: &str) -> Result<Collection, CatalogError> {
        let mut url = self.endpoint(&format!("shows/{id}"))?;
        url.query_pairs_mut().append_pair("market", &self.market);

        let show: ShowResponse = self.get_json(url).await?;

        Ok(Collection {
            id: show.id,
            name: show.name,
            description: show.description,
            image_url: show.images.into_iter().next().map(|i| i.url),
            total_episodes: show.total_episodes,
        })
    }

    async fn list_episodes(
        &self,
        id: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<EpisodePage, CatalogError> {
        let url = match cursor {
            Some(next) => Url::parse(next)?,
            None => {
                let mut url = self.endpoint(&format!("shows/{id}/episodes"))?;
                url.query_pairs_mut()
                    .append_pair("limit", &page_size.to_string())
                    .append_pair("market", &self.market);
                url
            }
        };

        let page: EpisodesResponse = self.get_json(url).await?;

        Ok(EpisodePage {
            items: page.items.into_iter().flatten().map(Episode::from).collect(),
            next_cursor: page.next,
        })
    }
}
