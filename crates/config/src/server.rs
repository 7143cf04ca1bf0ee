//! Listener, TLS and health endpoint settings for the admission service.

use std::{borrow::Cow, net::SocketAddr, path::PathBuf};

use serde::Deserialize;

/// HTTP server configuration settings.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// The socket address the server should listen on.
    pub listen_address: Option<SocketAddr>,
    /// TLS configuration for secure connections.
    pub tls: Option<TlsServerConfig>,
    /// Health endpoint configuration.
    #[serde(default)]
    pub health: HealthConfig,
}

/// PEM files used to terminate TLS on the listener.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsServerConfig {
    /// Certificate chain.
    pub certificate: PathBuf,
    /// Private key matching the certificate.
    pub key: PathBuf,
}

/// Liveness endpoint settings.
///
/// The endpoint is never guarded, so orchestrators can probe it regardless of
/// how the quotas are set.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// Whether the endpoint is exposed at all.
    pub enabled: bool,
    /// Serve the endpoint on a dedicated listener instead of the main one.
    pub listen: Option<SocketAddr>,
    /// Route path.
    pub path: Cow<'static, str>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: None,
            path: Cow::Borrowed("/health"),
        }
    }
}
