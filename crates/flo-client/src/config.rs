//! Configuration for the flo client
//!
//! Credentials and the API endpoint come from explicit values, a JSON
//! configuration object, or the environment. Explicit values win over the
//! environment, field by field.

use std::env;
use std::fmt;
use std::path::Path;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FloError, FloResult};

/// Environment variable holding the access key
pub const ACCESS_KEY_ENV: &str = "FLO_ACCESS_KEY";
/// Environment variable holding the access secret
pub const ACCESS_SECRET_ENV: &str = "FLO_ACCESS_SECRET";
/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "FLO_API_URL";
/// Environment variable overriding the request timeout
pub const TIMEOUT_ENV: &str = "FLO_TIMEOUT_SECS";

/// API key pair used to sign every request
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub access_secret: String,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, access_secret: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            access_secret: access_secret.into(),
        }
    }

    /// Reads both fields from the process environment; unset fields stay empty
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads both fields through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            access_key: lookup(ACCESS_KEY_ENV).unwrap_or_default(),
            access_secret: lookup(ACCESS_SECRET_ENV).unwrap_or_default(),
        }
    }

    /// Explicit values override the environment, each field on its own
    pub fn resolve(access_key: Option<String>, access_secret: Option<String>) -> Self {
        Self::resolve_from(|name| env::var(name).ok(), access_key, access_secret)
    }

    /// Same as [`Credentials::resolve`], reading the environment through `lookup`
    pub fn resolve_from<F>(lookup: F, access_key: Option<String>, access_secret: Option<String>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup(lookup).overridden_by(access_key, access_secret)
    }

    /// Replaces the fields that are given explicitly
    pub fn overridden_by(mut self, access_key: Option<String>, access_secret: Option<String>) -> Self {
        if let Some(key) = access_key {
            self.access_key = key;
        }
        if let Some(secret) = access_secret {
            self.access_secret = secret;
        }
        self
    }

    /// Parses a `{ "accessKey": ..., "accessSecret": ... }` configuration object
    pub fn from_json_str(json: &str) -> FloResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| FloError::ConfigParse(format!("Invalid credentials object: {}", e)))
    }

    /// Loads a configuration object from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> FloResult<Self> {
        let path = path.as_ref();
        debug!("Loading credentials from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Both fields present and non-empty
    pub fn is_complete(&self) -> bool {
        !self.access_key.is_empty() && !self.access_secret.is_empty()
    }

    pub fn ensure_complete(&self) -> FloResult<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(FloError::MissingCredentials)
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("access_secret", &if self.access_secret.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

/// Where the flo API lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub protocol: String,
    pub host: String,
    pub port: u16,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            protocol: "https".to_string(),
            host: "api.flo.dev".to_string(),
            port: 443,
        }
    }
}

impl Endpoint {
    /// Parses a base URL such as `https://api.flo.dev` or `http://127.0.0.1:8080`
    pub fn parse(url: &str) -> FloResult<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| FloError::ConfigParse(format!("Invalid API URL {}: {}", url, e)))?;

        let host = parsed
            .host_str()
            .ok_or_else(|| FloError::ConfigParse(format!("API URL has no host: {}", url)))?
            .to_string();
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| FloError::ConfigParse(format!("API URL has no port: {}", url)))?;

        Ok(Self {
            protocol: parsed.scheme().to_string(),
            host,
            port,
        })
    }

    /// `protocol://host:port`, without a trailing slash
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// Everything needed to construct a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub credentials: Credentials,

    #[serde(default)]
    pub endpoint: Endpoint,

    /// Timeout in seconds for a single HTTP request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            endpoint: Endpoint::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    pub fn load() -> FloResult<Self> {
        Self::load_from(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn load_from<F>(lookup: F) -> FloResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            credentials: Credentials::resolve_from(&lookup, None, None),
            ..Self::default()
        };

        if let Some(url) = lookup(API_URL_ENV) {
            config.endpoint = Endpoint::parse(&url)?;
        }

        if let Some(timeout) = lookup(TIMEOUT_ENV) {
            match timeout.parse::<u64>() {
                Ok(secs) => config.timeout_secs = secs,
                Err(_) => warn!("Invalid {} value: {}", TIMEOUT_ENV, timeout),
            }
        }

        if !config.credentials.is_complete() {
            warn!("No complete flo credentials configured; signed requests will fail");
        }

        Ok(config)
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }
}
