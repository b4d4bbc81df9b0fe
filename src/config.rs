// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Startup configuration.
//!
//! The configuration lives in `config.json` inside the data directory and is
//! read exactly once. A missing file is replaced by a placeholder template and
//! startup stops, so the process never runs half-configured.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::{Host, Url};

use crate::error::ConfigError;

pub const CONFIG_FILENAME: &str = "config.json";

const PLACEHOLDER_CLIENT_ID: &str = "your_client_ID";
const PLACEHOLDER_CLIENT_SECRET: &str = "your_client_secret";
const PLACEHOLDER_COLLECTION_ID: &str = "your_show_ID";

/// Upper bound the catalog API accepts for one page of episodes
pub const MAX_PAGE_SIZE: u32 = 50;

/// A tracked show: display name plus remote identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    pub id: String,
}

/// Application configuration, constructed once at startup and passed by reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Public URL prefix under which the output tree is served
    pub base_url: Url,
    pub client_id: String,
    pub client_secret: String,
    /// Downloader credential file; relative paths resolve against the data directory
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    pub collections: Vec<CollectionConfig>,
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_downloader")]
    pub downloader: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: Url,
    #[serde(default = "default_token_url")]
    pub token_url: Url,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Market the catalog is queried for; content unavailable there is skipped
    #[serde(default = "default_market")]
    pub market: String,
    /// Upper bound for one catalog API request, connect included
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("zotify_credentials.json")
}

fn default_sync_interval_secs() -> u64 {
    3600
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 80))
}

fn default_downloader() -> String {
    "zotify".to_string()
}

fn default_api_base_url() -> Url {
    Url::parse("https://api.spotify.com/v1/").expect("static URL is valid")
}

fn default_token_url() -> Url {
    Url::parse("https://accounts.spotify.com/api/token").expect("static URL is valid")
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_market() -> String {
    "US".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    /// Template written when no configuration exists yet
    pub fn template() -> Self {
        Self {
            base_url: Url::parse("http://127.0.0.1/").expect("static URL is valid"),
            client_id: PLACEHOLDER_CLIENT_ID.to_string(),
            client_secret: PLACEHOLDER_CLIENT_SECRET.to_string(),
            credentials_path: default_credentials_path(),
            collections: vec![CollectionConfig {
                name: "My Show".to_string(),
                id: PLACEHOLDER_COLLECTION_ID.to_string(),
            }],
            sync_interval_secs: default_sync_interval_secs(),
            listen_addr: default_listen_addr(),
            downloader: default_downloader(),
            api_base_url: default_api_base_url(),
            token_url: default_token_url(),
            page_size: default_page_size(),
            market: default_market(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Page size clamped to what the catalog API accepts
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    /// Resolve the credential path against the data directory
    pub fn resolved_credentials_path(&self, data_dir: &Path) -> PathBuf {
        if self.credentials_path.is_absolute() {
            self.credentials_path.clone()
        } else {
            data_dir.join(&self.credentials_path)
        }
    }

    /// Reject placeholder or incomplete values
    pub fn validate(&self, config_path: &Path) -> Result<(), ConfigError> {
        let placeholder = |field| ConfigError::Placeholder {
            field,
            path: config_path.to_path_buf(),
        };

        if self.client_id.trim().is_empty() || self.client_id == PLACEHOLDER_CLIENT_ID {
            return Err(placeholder("client_id"));
        }
        if self.client_secret.trim().is_empty() || self.client_secret == PLACEHOLDER_CLIENT_SECRET
        {
            return Err(placeholder("client_secret"));
        }
        if self.collections.is_empty() {
            return Err(ConfigError::NoCollections(config_path.to_path_buf()));
        }
        if self
            .collections
            .iter()
            .any(|c| c.id.trim().is_empty() || c.id == PLACEHOLDER_COLLECTION_ID)
        {
            return Err(placeholder("collections[].id"));
        }

        let invalid = |field, reason| ConfigError::InvalidValue {
            field,
            reason,
            path: config_path.to_path_buf(),
        };

        if is_loopback(&self.base_url) {
            return Err(invalid(
                "base_url",
                "must be the public address feed readers use, not a loopback address",
            ));
        }
        if self.sync_interval_secs == 0 {
            return Err(invalid("sync_interval_secs", "must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "must be at least 1"));
        }

        Ok(())
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        None => false,
    }
}

/// Directory layout derived from the data directory
#[derive(Debug, Clone)]
pub struct Layout {
    pub data_dir: PathBuf,
    /// Root of the published tree: one directory per collection
    pub output_root: PathBuf,
    /// Where the downloader drops its title-named files
    pub staging_root: PathBuf,
}

impl Layout {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            output_root: data_dir.join("podcasts"),
            staging_root: data_dir.join("staging"),
            data_dir,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILENAME)
    }

    pub fn collection_dir(&self, collection_id: &str) -> PathBuf {
        self.output_root.join(collection_id)
    }

    /// Create the data and output directories if missing
    pub fn ensure_dirs(&self) -> Result<(), ConfigError> {
        for dir in [&self.data_dir, &self.output_root] {
            std::fs::create_dir_all(dir).map_err(|e| ConfigError::DirectoryFailed {
                path: dir.clone(),
                source: e,
            })?;
        }
        Ok(())
    }
}

/// Load and validate the configuration for `layout`.
///
/// When no config file exists a template is written and
/// [`ConfigError::CreatedDefault`] is returned. The downloader credential file
/// must already exist.
pub fn load_config(layout: &Layout) -> Result<AppConfig, ConfigError> {
    let path = layout.config_path();

    if !path.exists() {
        write_template(&path)?;
        return Err(ConfigError::CreatedDefault(path));
    }

    let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadFailed {
        path: path.clone(),
        source: e,
    })?;

    let config: AppConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.clone(),
            source: e,
        })?;

    config.validate(&path)?;

    let credentials = config.resolved_credentials_path(&layout.data_dir);
    if !credentials.is_file() {
        return Err(ConfigError::MissingCredentials(credentials));
    }

    Ok(config)
}

/// Outcome of reading the configuration on startup
#[derive(Debug)]
pub enum ConfigState {
    /// A usable configuration
    Loaded(AppConfig),
    /// No configuration existed; a template was written here for the user to fill in
    TemplateWritten(PathBuf),
}

/// Like [`load_config`], but treats writing the first template as a normal
/// outcome rather than an error.
pub fn bootstrap_config(layout: &Layout) -> Result<ConfigState, ConfigError> {
    match load_config(layout) {
        Ok(config) => Ok(ConfigState::Loaded(config)),
        Err(ConfigError::CreatedDefault(path)) => Ok(ConfigState::TemplateWritten(path)),
        Err(e) => Err(e),
    }
}

fn write_template(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::DirectoryFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let json = serde_json::to_string_pretty(&AppConfig::template()).map_err(|e| {
        ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        }
    })?;

    std::fs::write(path, json).map_err(|e| ConfigError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn valid_config() -> AppConfig {
        AppConfig {
            base_url: Url::parse("https://shows.example.com/").unwrap(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            collections: vec![CollectionConfig {
                name: "Heavyweight".to_string(),
                id: "5c26B28vZMN8PG0Nppmn5G".to_string(),
            }],
            ..AppConfig::template()
        }
    }

    #[test]
    fn missing_config_writes_template_and_halts() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());

        let result = load_config(&layout);

        assert!(matches!(result, Err(ConfigError::CreatedDefault(_))));
        assert!(layout.config_path().exists());

        // The template itself is rejected on the next start
        let result = load_config(&layout);
        assert!(matches!(
            result,
            Err(ConfigError::Placeholder {
                field: "client_id",
                ..
            })
        ));
    }

    #[test]
    fn bootstrap_reports_template_then_rejects_it() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());

        match bootstrap_config(&layout) {
            Ok(ConfigState::TemplateWritten(path)) => assert_eq!(path, layout.config_path()),
            other => panic!("Expected TemplateWritten, got {other:?}"),
        }

        assert!(matches!(
            bootstrap_config(&layout),
            Err(ConfigError::Placeholder { .. })
        ));
    }

    #[test]
    fn bootstrap_loads_complete_config() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        std::fs::write(
            layout.config_path(),
            serde_json::to_string(&valid_config()).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("zotify_credentials.json"), "{}").unwrap();

        assert!(matches!(
            bootstrap_config(&layout),
            Ok(ConfigState::Loaded(_))
        ));
    }

    #[test]
    fn placeholder_secret_is_rejected() {
        let config = AppConfig {
            client_secret: PLACEHOLDER_CLIENT_SECRET.to_string(),
            ..valid_config()
        };
        let result = config.validate(Path::new("config.json"));
        assert!(matches!(
            result,
            Err(ConfigError::Placeholder {
                field: "client_secret",
                ..
            })
        ));
    }

    #[test]
    fn empty_collection_list_is_rejected() {
        let config = AppConfig {
            collections: vec![],
            ..valid_config()
        };
        assert!(matches!(
            config.validate(Path::new("config.json")),
            Err(ConfigError::NoCollections(_))
        ));
    }

    #[test]
    fn missing_credentials_halt_startup() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        std::fs::write(
            layout.config_path(),
            serde_json::to_string(&valid_config()).unwrap(),
        )
        .unwrap();

        let result = load_config(&layout);
        assert!(matches!(result, Err(ConfigError::MissingCredentials(_))));

        std::fs::write(dir.path().join("zotify_credentials.json"), "{}").unwrap();
        let config = load_config(&layout).unwrap();
        assert_eq!(config.collections.len(), 1);
    }

    #[test]
    fn optional_fields_take_defaults() {
        let json = r#"{
            "base_url": "https://shows.example.com/",
            "client_id": "id",
            "client_secret": "secret",
            "collections": [{"name": "A", "id": "abc123"}]
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.sync_interval(), Duration::from_secs(3600));
        assert_eq!(config.downloader, "zotify");
        assert_eq!(config.effective_page_size(), 50);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(
            config.resolved_credentials_path(Path::new("/data")),
            PathBuf::from("/data/zotify_credentials.json")
        );
    }

    #[test]
    fn loopback_base_url_is_rejected() {
        for base in [
            "http://127.0.0.1/",
            "http://localhost:8080/",
            "http://[::1]/",
        ] {
            let config = AppConfig {
                base_url: Url::parse(base).unwrap(),
                ..valid_config()
            };
            assert!(
                matches!(
                    config.validate(Path::new("config.json")),
                    Err(ConfigError::InvalidValue {
                        field: "base_url",
                        ..
                    })
                ),
                "{base} should be rejected"
            );
        }
        assert!(valid_config().validate(Path::new("config.json")).is_ok());
    }

    #[test]
    fn template_with_real_credentials_still_needs_base_url() {
        let config = AppConfig {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            collections: valid_config().collections,
            ..AppConfig::template()
        };
        assert!(matches!(
            config.validate(Path::new("config.json")),
            Err(ConfigError::InvalidValue {
                field: "base_url",
                ..
            })
        ));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let config = AppConfig {
            sync_interval_secs: 0,
            ..valid_config()
        };
        assert!(matches!(
            config.validate(Path::new("config.json")),
            Err(ConfigError::InvalidValue {
                field: "sync_interval_secs",
                ..
            })
        ));

        let config = AppConfig {
            request_timeout_secs: 0,
            ..valid_config()
        };
        assert!(matches!(
            config.validate(Path::new("config.json")),
            Err(ConfigError::InvalidValue {
                field: "request_timeout_secs",
                ..
            })
        ));
    }

    #[test]
    fn page_size_is_clamped() {
        let config = AppConfig {
            page_size: 500,
            ..valid_config()
        };
        assert_eq!(config.effective_page_size(), MAX_PAGE_SIZE);

        let config = AppConfig {
            page_size: 0,
            ..valid_config()
        };
        assert_eq!(config.effective_page_size(), 1);
    }
}
