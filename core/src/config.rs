//! Client configuration.
//!
//! # Design
//! `Configuration` is a plain value injected into `CrudClient`. A process-wide
//! default instance is kept behind a `RwLock` for applications that prefer a
//! single global setup; clients built with `CrudClient::from_shared` take a
//! snapshot of it once, at construction.

use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use once_cell::sync::Lazy;

/// Application domain reported by local errors when none is configured.
pub const DEFAULT_APP_DOMAIN: &str = "crud-core";

/// Callback producing extra headers for every request build.
pub type HeaderProvider = Arc<dyn Fn() -> Vec<(String, String)> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Configuration {
    /// API root, e.g. `https://api.example.com/v1`.
    pub base_url: String,
    /// Domain reported by `CrudError::Server`.
    pub server_domain: String,
    /// Domain reported by local errors; falls back to `DEFAULT_APP_DOMAIN`.
    pub app_domain: Option<String>,
    pub custom_headers: Option<HeaderProvider>,
    /// Applied by `ReqwestTransport::from_config`.
    pub timeout: Option<Duration>,
}

impl Configuration {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_server_domain(mut self, domain: impl Into<String>) -> Self {
        self.server_domain = domain.into();
        self
    }

    pub fn with_app_domain(mut self, domain: impl Into<String>) -> Self {
        self.app_domain = Some(domain.into());
        self
    }

    pub fn with_custom_headers<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Vec<(String, String)> + Send + Sync + 'static,
    {
        self.custom_headers = Some(Arc::new(provider));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn app_domain(&self) -> &str {
        self.app_domain.as_deref().unwrap_or(DEFAULT_APP_DOMAIN)
    }

    /// Build a configuration from `CRUD_BASE_URL`, `CRUD_SERVER_DOMAIN`,
    /// `CRUD_APP_DOMAIN` and `CRUD_TIMEOUT_SECS`. Missing variables leave the
    /// corresponding field at its default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let timeout = lookup("CRUD_TIMEOUT_SECS").and_then(|raw| match raw.parse::<u64>() {
            Ok(secs) => Some(Duration::from_secs(secs)),
            Err(e) => {
                tracing::warn!(value = %raw, error = %e, "ignoring invalid CRUD_TIMEOUT_SECS");
                None
            }
        });
        Self {
            base_url: lookup("CRUD_BASE_URL").unwrap_or_default(),
            server_domain: lookup("CRUD_SERVER_DOMAIN").unwrap_or_default(),
            app_domain: lookup("CRUD_APP_DOMAIN"),
            custom_headers: None,
            timeout,
        }
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("base_url", &self.base_url)
            .field("server_domain", &self.server_domain)
            .field("app_domain", &self.app_domain)
            .field("custom_headers", &self.custom_headers.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

static SHARED: Lazy<RwLock<Configuration>> = Lazy::new(|| RwLock::new(Configuration::default()));

/// The process-wide default configuration.
pub fn shared() -> &'static RwLock<Configuration> {
    &SHARED
}

/// Replace the process-wide default configuration.
pub fn set_shared(config: Configuration) {
    let mut guard = shared().write().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = config;
}

/// Clone of the current process-wide default configuration.
pub fn shared_snapshot() -> Configuration {
    shared()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn from_lookup_reads_all_fields() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("CRUD_BASE_URL", "https://api.example.com"),
            ("CRUD_SERVER_DOMAIN", "api"),
            ("CRUD_APP_DOMAIN", "com.example.app"),
            ("CRUD_TIMEOUT_SECS", "30"),
        ]);
        let config = Configuration::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.server_domain, "api");
        assert_eq!(config.app_domain(), "com.example.app");
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn from_lookup_ignores_bad_timeout() {
        let config = Configuration::from_lookup(|k| {
            (k == "CRUD_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(config.timeout.is_none());
        assert!(config.base_url.is_empty());
        assert_eq!(config.app_domain(), DEFAULT_APP_DOMAIN);
    }

    #[test]
    fn debug_hides_header_provider() {
        let config = Configuration::new("http://x").with_custom_headers(Vec::new);
        let rendered = format!("{config:?}");
        assert!(rendered.contains("custom_headers: true"));
    }
}
