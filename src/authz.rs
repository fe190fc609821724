//! Client for the external namespace authorization service.
//!
//! The service owns the namespace permission records; this crate only asks it
//! one question: what access level does the bearer of this token have on a
//! given namespace?

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{error, info};

use crate::config::{REGISTRY_CONNECT_TIMEOUT_SECS, REGISTRY_REQUEST_TIMEOUT_SECS};

/// Ordinal access tier as reported by the registry.
///
/// Anything at or above [`AccessLevel::READ`] grants read, at or above
/// [`AccessLevel::ADMIN`] grants write.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct AccessLevel(pub i32);

impl AccessLevel {
    pub const NONE: AccessLevel = AccessLevel(0);
    pub const READ: AccessLevel = AccessLevel(1);
    pub const MGMT: AccessLevel = AccessLevel(2);
    pub const ADMIN: AccessLevel = AccessLevel(3);
    pub const ROOT: AccessLevel = AccessLevel(4);
}

#[derive(Debug)]
pub enum RegistryError {
    /// The registry did not answer within the request timeout.
    Timeout,
    /// Any other transport or protocol failure.
    Transport(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Timeout => write!(f, "registry timed out"),
            RegistryError::Transport(msg) => write!(f, "registry unreachable: {msg}"),
        }
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RegistryError::Timeout
        } else {
            RegistryError::Transport(err.to_string())
        }
    }
}

/// Resolves the caller's access level on a namespace.
///
/// `Ok(None)` means the registry has no access record for this caller; the
/// middleware treats that the same as a level below `READ`.
#[async_trait]
pub trait NamespaceRegistry: Send + Sync {
    async fn get(&self, ns: &str, bearer: &str) -> Result<Option<AccessLevel>, RegistryError>;
}

#[derive(Deserialize)]
struct NamespaceRecord {
    access: Option<AccessRecord>,
}

#[derive(Deserialize)]
struct AccessRecord {
    level: AccessLevel,
}

/// Registry client over HTTP/JSON. One instance per process; the underlying
/// connection pool is shared across requests.
pub struct HttpNamespaceRegistry {
    client: Client,
    base_url: String,
}

impl HttpNamespaceRegistry {
    /// Builds the client and probes the registry address. Startup must fail
    /// when the registry cannot be reached within the connect timeout.
    pub async fn connect(base_url: &str) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(REGISTRY_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REGISTRY_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| RegistryError::Transport(err.to_string()))?;

        let registry = Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        };

        // Only connectivity matters here; any HTTP status proves the
        // registry is answering.
        registry
            .client
            .head(&registry.base_url)
            .timeout(Duration::from_secs(REGISTRY_CONNECT_TIMEOUT_SECS))
            .send()
            .await?;
        info!(registry = registry.base_url, "connected to namespace registry");

        Ok(registry)
    }
}

#[async_trait]
impl NamespaceRegistry for HttpNamespaceRegistry {
    async fn get(&self, ns: &str, bearer: &str) -> Result<Option<AccessLevel>, RegistryError> {
        let url = format!("{}/namespaces/{ns}", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, bearer)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let record: NamespaceRecord = response.json().await?;
                Ok(record.access.map(|access| access.level))
            }
            status => {
                error!(ns, %status, "registry returned unexpected status");
                Err(RegistryError::Transport(format!(
                    "unexpected registry status {status}"
                )))
            }
        }
    }
}
