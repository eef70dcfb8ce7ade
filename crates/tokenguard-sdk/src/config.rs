//! Client configuration
//!
//! Loaded through [`ConfigLoader`]: defaults, then an optional TOML file, then
//! `TOKENGUARD_*` environment variables (`TOKENGUARD_HTTP__BASE_URL`, ...).

use crate::auth::{
    AuthResult, CredentialStore, FileCredentialStore, KeyringCredentialStore,
    MemoryCredentialStore,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokenguard_common::{ConfigLoader, ConfigurationError};
use url::Url;

/// Default API URL when not specified
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Top-level configuration of an [`crate::AuthClient`]
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Transport settings
    pub http: HttpConfig,

    /// Refresh behaviour
    pub refresh: RefreshConfig,

    /// Auth routes exempt from refresh-and-replay
    pub routes: RoutesConfig,

    /// Where the credential lives
    pub store: StoreConfig,
}

/// Transport settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Base URL every request path is joined to
    pub base_url: String,

    /// Per-request timeout in seconds; applies to refresh and replays too
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// Refresh behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RefreshConfig {
    /// Upper bound on one refresh call; expiry fails every waiter
    pub timeout_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

/// Auth route paths
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoutesConfig {
    pub login: String,
    pub register: String,
    pub refresh: String,
    pub logout: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_string(),
            register: "/auth/register".to_string(),
            refresh: "/auth/refresh".to_string(),
            logout: "/auth/logout".to_string(),
        }
    }
}

impl RoutesConfig {
    fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("routes.login", self.login.as_str()),
            ("routes.register", self.register.as_str()),
            ("routes.refresh", self.refresh.as_str()),
            ("routes.logout", self.logout.as_str()),
        ]
        .into_iter()
    }
}

/// Credential store backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    File,
    Keyring,
}

/// Credential store selection
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,

    /// File location for `kind = "file"`; platform data dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Instantiate the configured backend
    pub fn build(&self) -> AuthResult<Arc<dyn CredentialStore>> {
        Ok(match self.kind {
            StoreKind::Memory => Arc::new(MemoryCredentialStore::new()),
            StoreKind::File => match &self.path {
                Some(path) => Arc::new(FileCredentialStore::new(path)),
                None => Arc::new(FileCredentialStore::default_location()?),
            },
            StoreKind::Keyring => Arc::new(KeyringCredentialStore::default()),
        })
    }
}

impl ClientConfig {
    /// Parsed base URL
    pub fn base_url(&self) -> Result<Url, ConfigurationError> {
        Url::parse(&self.http.base_url)
            .map_err(|e| ConfigurationError::invalid("http.base_url", e.to_string()))
    }

    /// Request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    /// Connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.http.connect_timeout_secs)
    }

    /// Refresh timeout as Duration
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh.timeout_secs)
    }
}

impl ConfigLoader for ClientConfig {
    const ENV_PREFIX: &'static str = "TOKENGUARD_";

    fn validate(&self) -> Result<(), ConfigurationError> {
        self.base_url()?;

        for (key, value) in [
            ("http.timeout_secs", self.http.timeout_secs),
            ("http.connect_timeout_secs", self.http.connect_timeout_secs),
            ("refresh.timeout_secs", self.refresh.timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigurationError::invalid(key, "must be greater than 0"));
            }
        }

        for (key, path) in self.routes.iter() {
            if !path.starts_with('/') {
                return Err(ConfigurationError::invalid(key, "must start with '/'"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.refresh_timeout(), Duration::from_secs(30));
        assert_eq!(config.routes.refresh, "/auth/refresh");
        assert_eq!(config.store.kind, StoreKind::Memory);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[http]
base_url = "https://shop.example.com/api"

[refresh]
timeout_secs = 5

[store]
kind = "file"
path = "/tmp/tokenguard/credential.json"
"#
        )
        .unwrap();

        let config = ClientConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.http.base_url, "https://shop.example.com/api");
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.refresh_timeout(), Duration::from_secs(5));
        assert_eq!(config.routes, RoutesConfig::default());
        assert_eq!(config.store.kind, StoreKind::File);
    }

    #[test]
    fn test_rejects_bad_values() {
        let zero_timeout = ClientConfig::figment(None).merge(("refresh.timeout_secs", 0));
        assert!(matches!(
            ClientConfig::from_figment(zero_timeout),
            Err(ConfigurationError::InvalidValue { key, .. }) if key == "refresh.timeout_secs"
        ));

        let bad_route = ClientConfig::figment(None).merge(("routes.login", "auth/login"));
        assert!(matches!(
            ClientConfig::from_figment(bad_route),
            Err(ConfigurationError::InvalidValue { key, .. }) if key == "routes.login"
        ));

        let bad_url = ClientConfig::figment(None).merge(("http.base_url", "not a url"));
        assert!(ClientConfig::from_figment(bad_url).is_err());
    }

    #[tokio::test]
    async fn test_store_config_builds_backends() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            kind: StoreKind::File,
            path: Some(dir.path().join("credential.json")),
        };
        let store = config.build().unwrap();
        assert_eq!(store.name(), "file");

        let memory = StoreConfig::default().build().unwrap();
        assert_eq!(memory.name(), "memory");
        assert_eq!(memory.get().await.unwrap(), None);

        let keyring = StoreConfig {
            kind: StoreKind::Keyring,
            path: None,
        }
        .build()
        .unwrap();
        assert_eq!(keyring.name(), "keyring");
    }

    #[test]
    fn test_store_kind_parses_lowercase() {
        let config = ClientConfig::figment(None).merge(("store.kind", "keyring"));
        let config = ClientConfig::from_figment(config).unwrap();
        assert_eq!(config.store.kind, StoreKind::Keyring);
    }
}
