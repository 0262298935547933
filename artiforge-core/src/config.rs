//! Admin configuration types.
//!
//! - [`AdminConfiguration`] - the single persisted record per mount
//! - [`ConfigDelta`] - a validated partial update
//! - [`ConfigView`] - the read projection returned to callers
//! - [`CachedRootCert`] - the service root certificate kept with the record
//!
//! [`AdminConfiguration`] holds the access token as a [`Secret`] and is only
//! ever serialized into storage. Callers see a [`ConfigView`], which has no
//! token field at all, only its SHA-256 digest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::client::ConnectionParams;
use crate::store::{Secret, StoreError};
use crate::template::{DEFAULT_USERNAME_TEMPLATE, TemplateError, UsernameTemplate};

fn default_username_template() -> String {
    DEFAULT_USERNAME_TEMPLATE.to_string()
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// The service root certificate, fetched once and cached with the config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRootCert {
    /// Certificate body as returned by the service.
    pub pem: String,

    /// When the certificate was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl CachedRootCert {
    /// Wrap a freshly fetched certificate.
    pub fn new(pem: impl Into<String>) -> Self {
        Self {
            pem: pem.into(),
            fetched_at: Utc::now(),
        }
    }

    /// Fingerprint of the certificate body.
    pub fn sha256(&self) -> String {
        sha256_hex(self.pem.as_bytes())
    }
}

/// The persisted admin configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminConfiguration {
    /// Root credential for the Artifactory service.
    pub access_token: Secret,

    /// Base URL of the Artifactory service.
    pub artifactory_url: String,

    #[serde(default)]
    pub use_expiring_tokens: bool,

    #[serde(default)]
    pub bypass_artifactory_tls_verification: bool,

    /// Source text of the username template; compiled on use.
    #[serde(default = "default_username_template")]
    pub username_template: String,

    #[serde(default)]
    pub revoke_on_delete: bool,

    #[serde(default)]
    pub allow_scope_override: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_cert: Option<CachedRootCert>,
}

impl AdminConfiguration {
    /// Build a fresh record from a first-time update, filling defaults.
    ///
    /// The validator guarantees `access_token` and `url` are present on
    /// creation; missing values become empty strings rather than panicking.
    pub fn from_delta(delta: ConfigDelta) -> Self {
        Self {
            access_token: delta.access_token.unwrap_or_default(),
            artifactory_url: delta.url.unwrap_or_default(),
            use_expiring_tokens: delta.use_expiring_tokens.unwrap_or(false),
            bypass_artifactory_tls_verification: delta
                .bypass_artifactory_tls_verification
                .unwrap_or(false),
            username_template: delta
                .username_template
                .unwrap_or_else(default_username_template),
            revoke_on_delete: delta.revoke_on_delete.unwrap_or(false),
            allow_scope_override: delta.allow_scope_override.unwrap_or(false),
            root_cert: None,
        }
    }

    /// Merge a partial update onto this record.
    ///
    /// Fields absent from the delta keep their current value. A new URL or
    /// token invalidates the cached root certificate.
    pub fn apply(&mut self, delta: ConfigDelta) {
        let mut target_changed = false;

        if let Some(token) = delta.access_token {
            target_changed |= token != self.access_token;
            self.access_token = token;
        }
        if let Some(url) = delta.url {
            target_changed |= url != self.artifactory_url;
            self.artifactory_url = url;
        }
        if let Some(v) = delta.use_expiring_tokens {
            self.use_expiring_tokens = v;
        }
        if let Some(v) = delta.bypass_artifactory_tls_verification {
            self.bypass_artifactory_tls_verification = v;
        }
        if let Some(template) = delta.username_template {
            self.username_template = template;
        }
        if let Some(v) = delta.revoke_on_delete {
            self.revoke_on_delete = v;
        }
        if let Some(v) = delta.allow_scope_override {
            self.allow_scope_override = v;
        }

        if target_changed {
            self.root_cert = None;
        }
    }

    /// Merge `delta` onto `existing`, or create a record if there is none.
    pub fn merge(existing: Option<Self>, delta: ConfigDelta) -> Self {
        match existing {
            Some(mut config) => {
                config.apply(delta);
                config
            }
            None => Self::from_delta(delta),
        }
    }

    /// Compile the stored username template. An empty template means the default.
    pub fn compiled_username_template(&self) -> Result<UsernameTemplate, TemplateError> {
        if self.username_template.is_empty() {
            UsernameTemplate::compile(DEFAULT_USERNAME_TEMPLATE)
        } else {
            UsernameTemplate::compile(&self.username_template)
        }
    }

    /// Connection parameters for the external service.
    pub fn connection(&self) -> ConnectionParams {
        ConnectionParams {
            url: self.artifactory_url.clone(),
            access_token: self.access_token.clone(),
            bypass_tls_verification: self.bypass_artifactory_tls_verification,
        }
    }

    /// The externally visible projection of this record.
    pub fn view(&self) -> ConfigView {
        ConfigView::from(self)
    }
}

/// A validated partial update. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDelta {
    pub access_token: Option<Secret>,
    pub url: Option<String>,
    pub use_expiring_tokens: Option<bool>,
    pub bypass_artifactory_tls_verification: Option<bool>,
    pub username_template: Option<String>,
    pub revoke_on_delete: Option<bool>,
    pub allow_scope_override: Option<bool>,
}

/// Read projection of [`AdminConfiguration`].
///
/// Has no token field; `access_token_sha256` is the only trace of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigView {
    pub access_token_sha256: String,
    pub url: String,
    pub use_expiring_tokens: bool,
    pub bypass_artifactory_tls_verification: bool,
    pub username_template: String,
    pub revoke_on_delete: bool,
    pub allow_scope_override: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_cert_sha256: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_cert_fetched_at: Option<DateTime<Utc>>,

    /// Service version, when the read-time version check succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl From<&AdminConfiguration> for ConfigView {
    fn from(config: &AdminConfiguration) -> Self {
        Self {
            access_token_sha256: sha256_hex(config.access_token.expose().as_bytes()),
            url: config.artifactory_url.clone(),
            use_expiring_tokens: config.use_expiring_tokens,
            bypass_artifactory_tls_verification: config.bypass_artifactory_tls_verification,
            username_template: config.username_template.clone(),
            revoke_on_delete: config.revoke_on_delete,
            allow_scope_override: config.allow_scope_override,
            root_cert_sha256: config.root_cert.as_ref().map(CachedRootCert::sha256),
            root_cert_fetched_at: config.root_cert.as_ref().map(|c| c.fetched_at),
            version: None,
        }
    }
}

impl ConfigView {
    /// Flatten into a response data map.
    pub fn into_data(self) -> Result<Map<String, Value>, StoreError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}
