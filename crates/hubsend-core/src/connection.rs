//! # Connection Module
//!
//! Parsing of hub connection strings and construction of REST URLs.
//!
//! A connection string looks like:
//!
//! ```text
//! Endpoint=sb://<namespace>.servicebus.windows.net/;SharedAccessKeyName=<name>;SharedAccessKey=<key>
//! ```
//!
//! The `sb://` scheme is the Service Bus form of the namespace address; the
//! REST API is served over `https://` at the same host.

use crate::{API_VERSION, Error, Result};
use std::fmt;

// =============================================================================
// CONNECTION STRING
// =============================================================================

/// A parsed connection string.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    /// Normalized endpoint, always `http(s)://host[:port]/...` ending in `/`.
    pub endpoint: String,
    /// Shared access policy name (`skn` in the token).
    pub key_name: String,
    /// Shared access key, used verbatim as HMAC key bytes.
    pub key: String,
}

// Keep the key out of logs and panics.
impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("endpoint", &self.endpoint)
            .field("key_name", &self.key_name)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl ConnectionString {
    /// Parse a `key=value;key=value` connection string.
    ///
    /// Keys are case-insensitive and values are split at the first `=` only,
    /// so base64 padding in the key survives. Unknown keys are ignored.
    pub fn parse(input: &str) -> Result<Self> {
        let mut endpoint = None;
        let mut key_name = None;
        let mut key = None;

        for segment in input.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let Some((name, value)) = segment.split_once('=') else {
                return Err(Error::InvalidConnectionString(format!(
                    "segment without '=': {:?}",
                    segment
                )));
            };
            let value = value.trim().to_string();
            match name.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value),
                "sharedaccesskeyname" => key_name = Some(value),
                "sharedaccesskey" => key = Some(value),
                _ => {}
            }
        }

        let endpoint = endpoint
            .filter(|v| !v.is_empty())
            .ok_or(Error::MissingField("Endpoint"))?;
        let key_name = key_name
            .filter(|v| !v.is_empty())
            .ok_or(Error::MissingField("SharedAccessKeyName"))?;
        let key = key
            .filter(|v| !v.is_empty())
            .ok_or(Error::MissingField("SharedAccessKey"))?;

        Ok(Self {
            endpoint: normalize_endpoint(&endpoint)?,
            key_name,
            key,
        })
    }
}

/// Rewrite `sb://` to `https://` and guarantee a trailing slash.
fn normalize_endpoint(raw: &str) -> Result<String> {
    let Some((scheme, rest)) = raw.split_once("://") else {
        return Err(Error::InvalidEndpoint(format!("missing scheme in {:?}", raw)));
    };
    let scheme = match scheme.to_ascii_lowercase().as_str() {
        "sb" | "https" => "https",
        "http" => "http",
        other => {
            return Err(Error::InvalidEndpoint(format!(
                "unsupported scheme {:?}",
                other
            )));
        }
    };
    if rest.is_empty() || rest.starts_with('/') {
        return Err(Error::InvalidEndpoint(format!("missing host in {:?}", raw)));
    }
    let mut endpoint = format!("{}://{}", scheme, rest);
    if !endpoint.ends_with('/') {
        endpoint.push('/');
    }
    Ok(endpoint)
}

// =============================================================================
// HUB ADDRESS
// =============================================================================

/// Endpoint plus hub path: everything needed to build request URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubAddress {
    endpoint: String,
    hub_path: String,
}

impl HubAddress {
    /// Combine a parsed connection string with a hub name.
    pub fn new(connection: &ConnectionString, hub_path: impl Into<String>) -> Result<Self> {
        let hub_path = hub_path.into();
        let trimmed = hub_path.trim();
        if trimmed.is_empty() || trimmed.contains('/') {
            return Err(Error::InvalidHubPath(hub_path));
        }
        Ok(Self {
            endpoint: connection.endpoint.clone(),
            hub_path: trimmed.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn hub_path(&self) -> &str {
        &self.hub_path
    }

    /// The resource a SAS token is scoped to: endpoint + hub, lowercased.
    pub fn resource_uri(&self) -> String {
        format!("{}{}", self.endpoint, self.hub_path).to_lowercase()
    }

    /// `POST` target for sending notifications.
    pub fn messages_url(&self) -> String {
        format!(
            "{}{}/messages/?api-version={}",
            self.endpoint, self.hub_path, API_VERSION
        )
    }

    /// `POST` target for creating registrations.
    pub fn registrations_url(&self) -> String {
        format!(
            "{}{}/registrations/?api-version={}",
            self.endpoint, self.hub_path, API_VERSION
        )
    }

    /// `PUT`/`DELETE` target for a single registration.
    pub fn registration_url(&self, registration_id: &str) -> String {
        format!(
            "{}{}/registrations/{}?api-version={}",
            self.endpoint, self.hub_path, registration_id, API_VERSION
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
