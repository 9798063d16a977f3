//! Debugging endpoint addressing and discovery.

use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::net::TcpListener;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CDP_PORT: u16 = 9222;
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Chrome is only ever launched on this machine.
pub const LOCAL_HOST: &str = "127.0.0.1";

/// A debugging endpoint, e.g. `http://127.0.0.1:9223`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Parse a user-supplied CDP URL. A missing scheme means `http`,
    /// a missing port means 9222.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };
        let url = Url::parse(&with_scheme)
            .map_err(|e| Error::Connection(format!("Invalid CDP URL: {} ({})", raw, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::Connection(format!("Invalid CDP URL: {}", raw)))?
            .to_string();
        let port = url.port().unwrap_or(DEFAULT_CDP_PORT);
        if port == 0 {
            return Err(Error::Connection(format!("Invalid CDP URL: {}", raw)));
        }

        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            port,
        })
    }

    /// Same host, different port.
    pub fn with_port(&self, port: u16) -> Self {
        Self {
            port,
            ..self.clone()
        }
    }

    pub fn version_url(&self) -> String {
        format!("{}/json/version", self)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// `/json/version` response subset.
#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: Option<String>,
}

/// Reachability and control-channel discovery for debugging endpoints.
#[async_trait]
pub trait EndpointProbe: Send + Sync {
    /// WebSocket address of the browser's control channel.
    async fn resolve_control_channel(&self, endpoint: &Endpoint) -> Result<String>;

    /// Side-effect free; never fails.
    async fn reachable(&self, endpoint: &Endpoint) -> bool {
        self.resolve_control_channel(endpoint).await.is_ok()
    }

    /// Whether nothing is bound to `port` on the local machine.
    fn port_is_free(&self, port: u16) -> bool;
}

/// Probe over HTTP with `reqwest`.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| Error::Connection(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl EndpointProbe for HttpProbe {
    async fn resolve_control_channel(&self, endpoint: &Endpoint) -> Result<String> {
        let version_url = endpoint.version_url();
        tracing::debug!("Probing {}", version_url);

        let response = self
            .client
            .get(&version_url)
            .send()
            .await
            .map_err(|e| Error::Connection(format!("{} unreachable: {}", version_url, e)))?;
        if !response.status().is_success() {
            return Err(Error::Connection(format!(
                "CDP endpoint returned {} at {}",
                response.status(),
                version_url
            )));
        }

        let info: VersionInfo = response.json().await.map_err(|e| {
            Error::Connection(format!("Malformed CDP response at {}: {}", version_url, e))
        })?;
        info.web_socket_debugger_url
            .filter(|ws| !ws.is_empty())
            .ok_or_else(|| Error::Connection(format!("No webSocketDebuggerUrl at {}", version_url)))
    }

    fn port_is_free(&self, port: u16) -> bool {
        TcpListener::bind((LOCAL_HOST, port)).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_adds_scheme_and_default_port() {
        let endpoint = Endpoint::parse("127.0.0.1").unwrap();
        assert_eq!(endpoint.to_string(), "http://127.0.0.1:9222");

        let endpoint = Endpoint::parse("http://localhost:9223/").unwrap();
        assert_eq!(endpoint.port, 9223);
        assert_eq!(endpoint.version_url(), "http://localhost:9223/json/version");
    }

    #[test]
    fn test_with_port() {
        let endpoint = Endpoint::parse("http://127.0.0.1:9223").unwrap();
        assert_eq!(endpoint.with_port(9230).to_string(), "http://127.0.0.1:9230");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(Endpoint::parse("http://"), Err(Error::Connection(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_not_an_error() {
        let probe = HttpProbe::new().unwrap();
        // bind then drop to get a port nothing listens on
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let endpoint = Endpoint::parse(&format!("http://127.0.0.1:{}", port)).unwrap();

        assert!(!probe.reachable(&endpoint).await);
        assert!(matches!(
            probe.resolve_control_channel(&endpoint).await,
            Err(Error::Connection(_))
        ));
    }

    #[test]
    fn test_port_is_free_checks_local_machine() {
        let probe = HttpProbe::new().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(!probe.port_is_free(port));
        drop(listener);
        assert!(probe.port_is_free(port));
    }
}
