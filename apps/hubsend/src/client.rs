//! # Hub Client
//!
//! HTTP client for the Notification Hub REST API.
//!
//! Every request is signed with a fresh SAS token scoped to the hub resource.
//! Non-success responses are run through the XML status parser and surfaced
//! as [`Error::Hub`].

use crate::{Error, Result};
use hubsend_core::sas::{self, expiry_after};
use hubsend_core::{
    ATOM_CONTENT_TYPE, ConnectionString, DEFAULT_TOKEN_TTL_SECS, HubAddress, Notification,
    NotificationFormat, RegistrationDescription, Tag, TagExpression, parse_registration,
    parse_status,
};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

const FORMAT_HEADER: &str = "ServiceBusNotification-Format";
const TAGS_HEADER: &str = "ServiceBusNotification-Tags";
const TRACKING_HEADERS: [&str; 2] = ["TrackingId", "x-ms-correlation-request-id"];

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Current Unix time in seconds. A clock before the epoch reads as 0.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// =============================================================================
// OPTIONS / OUTCOME
// =============================================================================

/// Tunables for a [`HubClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub token_ttl_secs: u64,
    /// Payload format used by [`HubClient::send_notification`].
    pub format: NotificationFormat,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            format: NotificationFormat::default(),
        }
    }
}

/// Result of an accepted send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendOutcome {
    pub status: u16,
    pub tracking_id: Option<String>,
}

// =============================================================================
// CLIENT
// =============================================================================

/// Signed HTTP client for one hub.
#[derive(Clone)]
pub struct HubClient {
    address: HubAddress,
    key_name: String,
    key: String,
    options: ClientOptions,
    http: reqwest::Client,
}

impl fmt::Debug for HubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubClient")
            .field("address", &self.address)
            .field("key_name", &self.key_name)
            .field("options", &self.options)
            .finish()
    }
}

impl HubClient {
    /// Create a client for `address`, signing with the given policy.
    pub fn new(
        address: HubAddress,
        key_name: impl Into<String>,
        key: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()?;
        debug!(
            endpoint = address.endpoint(),
            hub = address.hub_path(),
            format = %options.format,
            "hub client ready"
        );
        Ok(Self {
            address,
            key_name: key_name.into(),
            key: key.into(),
            options,
            http,
        })
    }

    /// Create a client straight from a connection string and hub name.
    pub fn from_connection_string(
        connection_string: &str,
        hub_path: &str,
        options: ClientOptions,
    ) -> Result<Self> {
        let conn = ConnectionString::parse(connection_string)?;
        let address = HubAddress::new(&conn, hub_path)?;
        Self::new(address, conn.key_name, conn.key, options)
    }

    pub fn address(&self) -> &HubAddress {
        &self.address
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// SAS token valid for the configured TTL from `now_secs`.
    pub fn token_at(&self, now_secs: u64) -> Result<String> {
        let expiry = expiry_after(now_secs, self.options.token_ttl_secs);
        let token = sas::generate(
            &self.address.resource_uri(),
            &self.key_name,
            &self.key,
            expiry,
        )?;
        Ok(token.to_string())
    }

    fn signed(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token_at(unix_now())?;
        let value = HeaderValue::from_str(&token)
            .map_err(|e| Error::InvalidHeader(format!("Authorization: {}", e)))?;
        Ok(builder.header(AUTHORIZATION, value))
    }

    // -------------------------------------------------------------------------
    // Notifications
    // -------------------------------------------------------------------------

    /// Send `text` to everyone listening on `channel`.
    ///
    /// The channel and text are validated before any request is made.
    pub async fn send_notification(&self, text: &str, channel: &str) -> Result<SendOutcome> {
        let tag = Tag::from_channel(channel)?;
        let notification = Notification::for_format(self.options.format, text)?;
        self.send(&notification, Some(&TagExpression::single(tag)))
            .await
    }

    /// Send a prepared notification. `None` tags broadcasts to every registration.
    pub async fn send(
        &self,
        notification: &Notification,
        tags: Option<&TagExpression>,
    ) -> Result<SendOutcome> {
        let url = self.address.messages_url();
        let mut builder = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, Notification::CONTENT_TYPE)
            .header(FORMAT_HEADER, notification.format.header_value())
            .body(notification.body.clone());

        if let Some(expr) = tags {
            let value = HeaderValue::from_str(&expr.to_header())
                .map_err(|e| Error::InvalidHeader(format!("{}: {}", TAGS_HEADER, e)))?;
            builder = builder.header(TAGS_HEADER, value);
        }

        let tag_header = tags.map(TagExpression::to_header).unwrap_or_default();
        debug!(
            hub = self.address.hub_path(),
            format = %notification.format,
            tags = %tag_header,
            bytes = notification.body.len(),
            "sending notification"
        );

        let resp = self.signed(builder)?.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(hub_error(resp).await);
        }

        let tracking_id = TRACKING_HEADERS.iter().find_map(|name| {
            resp.headers()
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        });
        info!(
            status = status.as_u16(),
            tracking_id = tracking_id.as_deref().unwrap_or("-"),
            tags = %tag_header,
            "notification accepted"
        );
        Ok(SendOutcome {
            status: status.as_u16(),
            tracking_id,
        })
    }

    // -------------------------------------------------------------------------
    // Registrations
    // -------------------------------------------------------------------------

    /// Create a registration; the hub assigns its id.
    pub async fn create_registration(
        &self,
        description: &RegistrationDescription,
    ) -> Result<RegistrationDescription> {
        let builder = self
            .http
            .post(self.address.registrations_url())
            .header(CONTENT_TYPE, ATOM_CONTENT_TYPE)
            .body(description.to_atom_xml());
        let created = self.registration_request(builder).await?;
        info!(
            registration_id = created.registration_id.as_deref().unwrap_or("-"),
            tags = %created.tags_csv(),
            "registration created"
        );
        Ok(created)
    }

    /// Create or replace the registration with id `registration_id`.
    pub async fn upsert_registration(
        &self,
        registration_id: &str,
        description: &RegistrationDescription,
    ) -> Result<RegistrationDescription> {
        let builder = self
            .http
            .put(self.address.registration_url(registration_id))
            .header(CONTENT_TYPE, ATOM_CONTENT_TYPE)
            .body(description.to_atom_xml());
        let updated = self.registration_request(builder).await?;
        info!(
            registration_id,
            tags = %updated.tags_csv(),
            "registration updated"
        );
        Ok(updated)
    }

    /// Delete a registration. An already-missing registration counts as deleted.
    pub async fn delete_registration(&self, registration_id: &str) -> Result<()> {
        let builder = self
            .http
            .delete(self.address.registration_url(registration_id))
            .header("If-Match", "*");
        let resp = self.signed(builder)?.send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            warn!(registration_id, "registration already gone");
            return Ok(());
        }
        if !status.is_success() {
            return Err(hub_error(resp).await);
        }
        info!(registration_id, "registration deleted");
        Ok(())
    }

    async fn registration_request(
        &self,
        builder: RequestBuilder,
    ) -> Result<RegistrationDescription> {
        let resp = self.signed(builder)?.send().await?;
        if !resp.status().is_success() {
            return Err(hub_error(resp).await);
        }
        let body = resp.text().await?;
        Ok(parse_registration(&body)?)
    }
}

/// Turn a failed response into [`Error::Hub`], keeping the raw body if it is not XML.
async fn hub_error(resp: Response) -> Error {
    let status = resp.status().as_u16();
    let body = match resp.text().await {
        Ok(body) => body,
        Err(e) => return Error::Http(e),
    };
    let parsed = match parse_status(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(error = %e, "hub error body is not XML");
            hubsend_core::HubStatus {
                status_result: body,
                ..Default::default()
            }
        }
    };
    warn!(
        status,
        code = parsed.code.as_deref().unwrap_or("-"),
        detail = parsed.detail.as_deref().unwrap_or("-"),
        "hub rejected request"
    );
    Error::Hub {
        status,
        code: parsed.code,
        detail: parsed.detail,
        status_result: parsed.status_result,
    }
}
