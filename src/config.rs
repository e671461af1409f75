//! Configuration Management
//!
//! Typesense connection settings: the credential record handed to the client
//! factory, and the persistent config file the CLI falls back to.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Connection timeout used when none is configured
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Default port for HTTPS connections
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Default port for plain HTTP connections
pub const DEFAULT_HTTP_PORT: u16 = 8108;

/// Transport protocol for the Typesense node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    #[default]
    Https,
}

impl Protocol {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    /// Port used when the credentials leave it unset
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Http => DEFAULT_HTTP_PORT,
            Self::Https => DEFAULT_HTTPS_PORT,
        }
    }
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

/// Credential record supplied by the host
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub api_key: String,
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default = "default_timeout", alias = "connectionTimeoutSeconds")]
    pub timeout_seconds: u64,
}

impl Credentials {
    pub fn new(api_key: &str, host: &str, protocol: Protocol) -> Self {
        Self {
            api_key: api_key.to_string(),
            host: host.to_string(),
            port: None,
            protocol,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Port to connect to (explicit, or the protocol default)
    pub fn effective_port(&self) -> u16 {
        self.port
            .filter(|p| *p != 0)
            .unwrap_or_else(|| self.protocol.default_port())
    }

    /// `protocol://host:port` with no trailing slash
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}:{}",
            self.protocol.as_str(),
            self.host.trim().trim_end_matches('/'),
            self.effective_port()
        )
    }
}

// The API key must never end up in logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("protocol", &self.protocol)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Persisted configuration
///
/// Every field is optional so a partial file can be completed from the
/// environment or the command line.
#[derive(Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub protocol: Option<Protocol>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("protocol", &self.protocol)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("typesense-node").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config file {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Overlay `TYPESENSE_*` environment variables
    pub fn with_env(self) -> Self {
        self.with_lookup(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable lookup
    pub fn with_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("TYPESENSE_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(host) = non_empty("TYPESENSE_HOST") {
            self.host = Some(host);
        }
        if let Some(port) = non_empty("TYPESENSE_PORT").and_then(|p| p.trim().parse().ok()) {
            self.port = Some(port);
        }
        if let Some(protocol) = non_empty("TYPESENSE_PROTOCOL").and_then(|p| Protocol::from_str(&p)) {
            self.protocol = Some(protocol);
        }
        if let Some(timeout) = non_empty("TYPESENSE_TIMEOUT").and_then(|t| t.trim().parse().ok()) {
            self.timeout_seconds = Some(timeout);
        }
        self
    }

    /// Overlay explicit values (CLI flags win over everything)
    pub fn merge(mut self, other: Config) -> Self {
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.protocol.is_some() {
            self.protocol = other.protocol;
        }
        if other.timeout_seconds.is_some() {
            self.timeout_seconds = other.timeout_seconds;
        }
        self
    }

    /// Build the credential record, if the mandatory parts are present
    pub fn credentials(&self) -> Option<Credentials> {
        let api_key = self.api_key.as_deref().filter(|k| !k.trim().is_empty())?;
        let host = self.host.as_deref().filter(|h| !h.trim().is_empty())?;

        Some(Credentials {
            api_key: api_key.to_string(),
            host: host.trim().to_string(),
            port: self.port,
            protocol: self.protocol.unwrap_or_default(),
            timeout_seconds: self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_ports_follow_protocol() {
        let https = Credentials::new("key", "search.example.com", Protocol::Https);
        assert_eq!(https.effective_port(), 443);

        let http = Credentials::new("key", "localhost", Protocol::Http);
        assert_eq!(http.effective_port(), 8108);
        assert_eq!(http.base_url(), "http://localhost:8108");

        let explicit = http.with_port(9000);
        assert_eq!(explicit.base_url(), "http://localhost:9000");
    }

    #[test]
    fn test_credentials_deserialize_with_defaults() {
        let creds: Credentials =
            serde_json::from_str(r#"{"apiKey":"abc","host":"localhost","protocol":"http"}"#)
                .unwrap();
        assert_eq!(creds.timeout_seconds, DEFAULT_TIMEOUT_SECONDS);
        assert_eq!(creds.port, None);
        assert_eq!(creds.protocol, Protocol::Http);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let creds = Credentials::new("super-secret", "localhost", Protocol::Http);
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_env_overlay_and_merge_precedence() {
        let env: HashMap<&str, &str> = [
            ("TYPESENSE_API_KEY", "env-key"),
            ("TYPESENSE_HOST", "env-host"),
            ("TYPESENSE_PROTOCOL", "HTTP"),
            ("TYPESENSE_PORT", "not-a-port"),
        ]
        .into_iter()
        .collect();

        let file = Config {
            host: Some("file-host".to_string()),
            port: Some(7000),
            ..Default::default()
        };

        let config = file
            .with_lookup(|k| env.get(k).map(|v| v.to_string()))
            .merge(Config {
                host: Some("cli-host".to_string()),
                ..Default::default()
            });

        let creds = config.credentials().expect("credentials should be complete");
        assert_eq!(creds.api_key, "env-key");
        assert_eq!(creds.host, "cli-host");
        assert_eq!(creds.port, Some(7000));
        assert_eq!(creds.protocol, Protocol::Http);
    }

    #[test]
    fn test_credentials_require_key_and_host() {
        let config = Config {
            host: Some("localhost".to_string()),
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(config.credentials().is_none());
    }
}
