//! # Push Manager
//!
//! Keeps a device's hub registration in step with the chat channels it
//! listens to, and sends channel notifications.
//!
//! The manager is an ordinary value owned by the caller; there is no shared
//! global instance.

use crate::client::{HubClient, SendOutcome};
use crate::{Error, Result};
use hubsend_core::{RegistrationDescription, Tag, normalize_device_handle};
use tracing::{info, warn};

/// Channel-aware front end over a [`HubClient`].
#[derive(Debug, Clone)]
pub struct PushManager {
    client: HubClient,
    channels: Vec<String>,
    registered: bool,
    device_token: Option<String>,
    registration_id: Option<String>,
}

impl PushManager {
    pub fn new(client: HubClient) -> Self {
        Self {
            client,
            channels: Vec::new(),
            registered: false,
            device_token: None,
            registration_id: None,
        }
    }

    /// Resume with a registration id from a previous run.
    #[must_use]
    pub fn with_registration_id(mut self, registration_id: Option<String>) -> Self {
        self.registration_id = registration_id;
        self
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn device_token(&self) -> Option<&str> {
        self.device_token.as_deref()
    }

    pub fn registration_id(&self) -> Option<&str> {
        self.registration_id.as_deref()
    }

    /// Store the device handle. APNs tokens are normalized to uppercase hex,
    /// FCM registration ids are trimmed.
    pub fn set_device_token(&mut self, token: &str) -> Result<()> {
        let format = self.client.options().format;
        self.device_token = Some(normalize_device_handle(format, token)?);
        Ok(())
    }

    /// Replace the listened channels; re-registers if already registered.
    pub async fn listen_to_channels<I, S>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = names.into_iter().map(Into::into).collect();
        if self.registered {
            self.register().await?;
        }
        Ok(())
    }

    /// Tags for the listened channels. Names that are not valid tags are skipped.
    pub fn channel_tags(&self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self
            .channels
            .iter()
            .filter_map(|name| match Tag::from_channel(name) {
                Ok(tag) => Some(tag),
                Err(e) => {
                    warn!(channel = %name, error = %e, "skipping channel that is not a valid tag");
                    None
                }
            })
            .collect();
        tags.sort();
        tags.dedup();
        tags
    }

    /// Mark as registered and, if a device token is known, push the channel
    /// tags to the hub.
    ///
    /// Returns `None` when there is no device token yet; the registration
    /// happens on the next call once one is set.
    pub async fn register(&mut self) -> Result<Option<RegistrationDescription>> {
        self.registered = true;
        let Some(token) = self.device_token.clone() else {
            info!("no device token yet, registration deferred");
            return Ok(None);
        };

        let description = RegistrationDescription::for_format(
            self.client.options().format,
            &token,
            self.channel_tags(),
        )?;
        let result = match self.registration_id.clone() {
            Some(id) => match self.client.upsert_registration(&id, &description).await {
                Err(Error::Hub { status, .. }) if status == 404 || status == 410 => {
                    warn!(registration_id = %id, status, "stored registration gone, creating a new one");
                    self.client.create_registration(&description).await?
                }
                other => other?,
            },
            None => self.client.create_registration(&description).await?,
        };

        self.registration_id = result.registration_id.clone();
        Ok(Some(result))
    }

    /// Delete the hub registration, if any, and stop being registered.
    pub async fn unregister(&mut self) -> Result<()> {
        if let Some(id) = self.registration_id.take() {
            if let Err(e) = self.client.delete_registration(&id).await {
                self.registration_id = Some(id);
                return Err(e);
            }
        }
        self.registered = false;
        Ok(())
    }

    /// Notify everyone listening on `channel`.
    pub async fn send_to_channel(&self, channel: &str, text: &str) -> Result<SendOutcome> {
        self.client.send_notification(text, channel).await
    }
}
