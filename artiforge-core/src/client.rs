//! Artifactory API client.
//!
//! The backend only needs two capabilities from the external service:
//! reading its version (which doubles as a credential check) and fetching
//! its root certificate. [`ArtifactoryClient`] names exactly those;
//! [`HttpArtifactoryClient`] implements them over HTTP with a bounded
//! per-request timeout.

use async_trait::async_trait;
use thiserror::Error;

use crate::store::Secret;

/// Path of the version endpoint, relative to the service URL.
pub const VERSION_PATH: &str = "artifactory/api/system/version";

/// Path of the root certificate endpoint, relative to the service URL.
pub const ROOT_CERT_PATH: &str = "access/api/v1/cert/root";

/// Error type for Artifactory API calls.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The version endpoint was unreachable or rejected the credential.
    #[error("could not get the system version: {message}")]
    Version { message: String },

    /// The root certificate endpoint failed.
    #[error("could not get the root certificate: {message}")]
    RootCertificate { message: String },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {message}")]
    Build { message: String },
}

/// Where and how to reach the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub url: String,
    pub access_token: Secret,
    pub bypass_tls_verification: bool,
}

impl ConnectionParams {
    /// Join `path` onto the service URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), path)
    }
}

/// The capabilities the backend needs from the Artifactory service.
#[async_trait]
pub trait ArtifactoryClient: Send + Sync {
    /// Fetch the service version using the configured credential.
    async fn get_version(&self, conn: &ConnectionParams) -> Result<String, ClientError>;

    /// Fetch the service's root certificate.
    async fn get_root_certificate(&self, conn: &ConnectionParams) -> Result<String, ClientError>;
}

#[cfg(feature = "http-client")]
pub use http_client::{DEFAULT_TIMEOUT, HttpArtifactoryClient};

#[cfg(feature = "http-client")]
mod http_client {
    use super::*;
    use serde::Deserialize;
    use std::time::Duration;
    use tracing::debug;

    /// Default timeout for a single API call.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    #[derive(Debug, Deserialize)]
    struct VersionResponse {
        version: String,
    }

    /// reqwest-backed [`ArtifactoryClient`].
    ///
    /// Holds one client that verifies TLS and one that does not; each call
    /// picks by [`ConnectionParams::bypass_tls_verification`].
    #[derive(Debug, Clone)]
    pub struct HttpArtifactoryClient {
        verified: reqwest::Client,
        unverified: reqwest::Client,
    }

    impl HttpArtifactoryClient {
        /// Create a client whose requests time out after `timeout`.
        pub fn new(timeout: Duration) -> Result<Self, ClientError> {
            let build = |accept_invalid_certs: bool| {
                reqwest::Client::builder()
                    .timeout(timeout)
                    .danger_accept_invalid_certs(accept_invalid_certs)
                    .build()
                    .map_err(|e| ClientError::Build {
                        message: e.to_string(),
                    })
            };

            Ok(Self {
                verified: build(false)?,
                unverified: build(true)?,
            })
        }

        /// Create a client with [`DEFAULT_TIMEOUT`].
        pub fn with_default_timeout() -> Result<Self, ClientError> {
            Self::new(DEFAULT_TIMEOUT)
        }

        fn http(&self, conn: &ConnectionParams) -> &reqwest::Client {
            if conn.bypass_tls_verification {
                &self.unverified
            } else {
                &self.verified
            }
        }

        async fn get(
            &self,
            conn: &ConnectionParams,
            path: &str,
        ) -> Result<reqwest::Response, reqwest::Error> {
            let url = conn.endpoint(path);
            debug!(%url, "calling Artifactory");
            self.http(conn)
                .get(&url)
                .bearer_auth(conn.access_token.expose())
                .send()
                .await?
                .error_for_status()
        }
    }

    #[async_trait]
    impl ArtifactoryClient for HttpArtifactoryClient {
        async fn get_version(&self, conn: &ConnectionParams) -> Result<String, ClientError> {
            let to_error = |e: reqwest::Error| ClientError::Version {
                message: e.to_string(),
            };
            let body: VersionResponse = self
                .get(conn, VERSION_PATH)
                .await
                .map_err(to_error)?
                .json()
                .await
                .map_err(to_error)?;
            Ok(body.version)
        }

        async fn get_root_certificate(
            &self,
            conn: &ConnectionParams,
        ) -> Result<String, ClientError> {
            let to_error = |e: reqwest::Error| ClientError::RootCertificate {
                message: e.to_string(),
            };
            let cert = self
                .get(conn, ROOT_CERT_PATH)
                .await
                .map_err(to_error)?
                .text()
                .await
                .map_err(to_error)?;

            if cert.trim().is_empty() {
                return Err(ClientError::RootCertificate {
                    message: "empty response body".to_string(),
                });
            }
            Ok(cert)
        }
    }
}
