//! OpenSearch transport configuration.

use std::env;
use std::time::Duration;

/// Environment variable holding the cluster URL(s), comma-separated.
pub const URL_ENV: &str = "ELSEARM_URL";

/// Environment variable holding the basic auth username.
pub const USERNAME_ENV: &str = "ELSEARM_USERNAME";

/// Environment variable holding the basic auth password.
pub const PASSWORD_ENV: &str = "ELSEARM_PASSWORD";

/// URL used when none is configured.
pub const DEFAULT_URL: &str = "http://localhost:9200";

/// OpenSearch transport configuration.
#[derive(Debug, Clone)]
pub struct OpenSearchConfig {
    /// OpenSearch URL(s). Requests go to the first one.
    pub urls: Vec<String>,
    /// Basic auth username.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// Request timeout.
    pub request_timeout: Duration,
    /// Ignore system proxy settings.
    pub disable_proxy: bool,
    /// TLS configuration.
    pub tls: Option<TlsConfig>,
    /// Retries of idempotent requests that failed without a response.
    /// Document creation and bulk requests are never retried.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub retry_backoff: Duration,
}

impl OpenSearchConfig {
    /// Create a new configuration with a single URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            password: None,
            request_timeout: Duration::from_secs(30),
            disable_proxy: true,
            tls: None,
            max_retries: 3,
            retry_backoff: Duration::from_millis(100),
        }
    }

    /// Read `ELSEARM_URL`, `ELSEARM_USERNAME` and `ELSEARM_PASSWORD`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let urls: Vec<String> = lookup(URL_ENV)
            .map(|urls| {
                urls.split(',')
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut config = Self::new(DEFAULT_URL);
        if !urls.is_empty() {
            config.urls = urls;
        }
        if let (Some(user), Some(pass)) = (lookup(USERNAME_ENV), lookup(PASSWORD_ENV)) {
            config = config.with_basic_auth(user, pass);
        }
        config
    }

    /// Set basic authentication credentials.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Use or ignore system proxy settings.
    pub fn with_proxy(mut self, enabled: bool) -> Self {
        self.disable_proxy = !enabled;
        self
    }

    /// Set TLS configuration.
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Set maximum retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the delay before the first retry.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

impl Default for OpenSearchConfig {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

/// TLS configuration.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Path to a PEM CA certificate to validate the server against.
    pub ca_cert: Option<String>,
    /// Skip certificate verification (not recommended for production).
    pub danger_accept_invalid_certs: bool,
}

impl TlsConfig {
    /// Create TLS config with CA certificate.
    pub fn with_ca_cert(ca_cert: impl Into<String>) -> Self {
        Self {
            ca_cert: Some(ca_cert.into()),
            ..Default::default()
        }
    }

    /// Skip certificate verification (DANGER: only for development).
    pub fn danger_accept_invalid_certs(mut self) -> Self {
        self.danger_accept_invalid_certs = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = OpenSearchConfig::from_lookup(lookup(&[]));
        assert_eq!(config.urls, vec![DEFAULT_URL.to_string()]);
        assert!(config.username.is_none());
    }

    #[test]
    fn test_from_lookup_reads_urls_and_auth() {
        let config = OpenSearchConfig::from_lookup(lookup(&[
            (URL_ENV, "https://a:9200, https://b:9200"),
            (USERNAME_ENV, "admin"),
            (PASSWORD_ENV, "secret"),
        ]));
        assert_eq!(config.urls, vec!["https://a:9200", "https://b:9200"]);
        assert_eq!(config.username.as_deref(), Some("admin"));
        assert_eq!(config.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_username_without_password_is_ignored() {
        let config = OpenSearchConfig::from_lookup(lookup(&[(USERNAME_ENV, "admin")]));
        assert!(config.username.is_none());
    }

    #[test]
    fn test_builder() {
        let config = OpenSearchConfig::new("http://search:9200")
            .with_request_timeout(Duration::from_secs(5))
            .with_max_retries(0)
            .with_proxy(true)
            .with_tls(TlsConfig::default().danger_accept_invalid_certs());
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 0);
        assert!(!config.disable_proxy);
        assert!(config.tls.unwrap().danger_accept_invalid_certs);
    }
}
