//! # Config Module
//!
//! JSON configuration file plus environment overrides.
//!
//! Resolution order: file, then `HUBSEND_*` environment variables, then
//! validation. Validation parses the connection string so a bad value fails
//! at startup instead of on the first request.

use crate::client::{ClientOptions, HubClient};
use crate::{Error, Result};
use hubsend_core::{ConnectionString, DEFAULT_TOKEN_TTL_SECS, HubAddress, NotificationFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const ENV_CONNECTION_STRING: &str = "HUBSEND_CONNECTION_STRING";
pub const ENV_HUB_PATH: &str = "HUBSEND_HUB_PATH";
pub const ENV_DEVICE_TOKEN: &str = "HUBSEND_DEVICE_TOKEN";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Override lookup backed by the process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn default_token_ttl_secs() -> u64 {
    DEFAULT_TOKEN_TTL_SECS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// On-disk configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub connection_string: String,
    pub hub_path: String,
    #[serde(default)]
    pub format: NotificationFormat,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Device token of this installation, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_token: Option<String>,
    /// Hub registration id, remembered so re-registering updates in place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_id: Option<String>,
}

// The connection string carries the key.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("connection_string", &"<redacted>")
            .field("hub_path", &self.hub_path)
            .field("format", &self.format)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("timeout_secs", &self.timeout_secs)
            .field("device_token", &self.device_token)
            .field("registration_id", &self.registration_id)
            .finish()
    }
}

impl Config {
    /// Starting point written by `hubsend init`.
    pub fn template() -> Self {
        Self {
            connection_string: "Endpoint=sb://<namespace>.servicebus.windows.net/;SharedAccessKeyName=DefaultFullSharedAccessSignature;SharedAccessKey=<key>".to_string(),
            hub_path: "<hub-name>".to_string(),
            format: NotificationFormat::default(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            device_token: None,
            registration_id: None,
        }
    }

    /// Read the file without applying environment overrides or validating.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Read, apply `HUBSEND_*` overrides from the process environment, validate.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, process_env)
    }

    /// [`Config::load`] with overrides taken from `lookup`.
    pub fn load_with<F>(path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::from_file(path)?.resolved(lookup)?;
        debug!(path = %path.display(), hub = %config.hub_path, "config loaded");
        Ok(config)
    }

    /// Copy with overrides from `lookup` applied, validated.
    ///
    /// `self` is left as read from disk, so it can be saved back without
    /// writing environment values into the file.
    pub fn resolved<F>(&self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = self.clone();
        config.apply_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`; empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(v) = get(ENV_CONNECTION_STRING) {
            self.connection_string = v;
        }
        if let Some(v) = get(ENV_HUB_PATH) {
            self.hub_path = v;
        }
        if let Some(v) = get(ENV_DEVICE_TOKEN) {
            self.device_token = Some(v);
        }
    }

    /// Check every field that can be checked offline.
    pub fn validate(&self) -> Result<()> {
        self.address()?;
        if self.token_ttl_secs == 0 {
            return Err(Error::Config("token_ttl_secs must be > 0".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be > 0".to_string()));
        }
        if let Some(token) = &self.device_token {
            hubsend_core::normalize_device_handle(self.format, token)?;
        }
        Ok(())
    }

    /// Parsed connection string and hub address.
    pub fn address(&self) -> Result<(ConnectionString, HubAddress)> {
        let conn = ConnectionString::parse(&self.connection_string)?;
        let address = HubAddress::new(&conn, self.hub_path.as_str())?;
        Ok((conn, address))
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            token_ttl_secs: self.token_ttl_secs,
            format: self.format,
        }
    }

    pub fn build_client(&self) -> Result<HubClient> {
        let (conn, address) = self.address()?;
        HubClient::new(address, conn.key_name, conn.key, self.client_options())
    }

    /// Write as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json + "\n")?;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const CONN: &str = "Endpoint=sb://chatns.servicebus.windows.net/;SharedAccessKeyName=Full;SharedAccessKey=abc=";

    fn valid() -> Config {
        Config {
            connection_string: CONN.to_string(),
            hub_path: "RapiChat".to_string(),
            ..Config::template()
        }
    }

    #[test]
    fn template_does_not_validate() {
        assert!(Config::template().validate().is_err());
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let config = Config {
            token_ttl_secs: 0,
            ..valid()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn bad_device_token_is_rejected() {
        let config = Config {
            device_token: Some("not-hex".to_string()),
            ..valid()
        };
        assert!(matches!(config.validate(), Err(Error::Core(_))));
    }

    #[test]
    fn overrides_replace_fields_and_skip_empty() {
        let mut env = BTreeMap::new();
        env.insert(ENV_HUB_PATH, "OtherHub".to_string());
        env.insert(ENV_CONNECTION_STRING, "  ".to_string());
        env.insert(ENV_DEVICE_TOKEN, "ABCD".to_string());

        let mut config = valid();
        config.apply_overrides(|name| env.get(name).cloned());
        assert_eq!(config.hub_path, "OtherHub");
        assert_eq!(config.connection_string, CONN);
        assert_eq!(config.device_token.as_deref(), Some("ABCD"));
    }

    #[test]
    fn resolved_leaves_original_untouched() -> Result<()> {
        let stored = valid();
        let resolved = stored.resolved(|name| {
            (name == ENV_HUB_PATH).then(|| "EnvHub".to_string())
        })?;
        assert_eq!(resolved.hub_path, "EnvHub");
        assert_eq!(stored.hub_path, "RapiChat");
        Ok(())
    }

    #[test]
    fn resolved_validates_overrides() {
        let result = valid().resolved(|name| {
            (name == ENV_CONNECTION_STRING).then(|| "Endpoint=ftp://x/".to_string())
        });
        assert!(matches!(result, Err(Error::Core(_))));
    }

    #[test]
    fn gcm_device_handle_is_not_hex_checked() {
        let config = Config {
            format: NotificationFormat::Gcm,
            device_token: Some("fcm:APA91b-x".to_string()),
            ..valid()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_optional_fields_take_defaults() -> Result<()> {
        let config: Config = serde_json::from_str(&format!(
            r#"{{"connection_string":"{}","hub_path":"h"}}"#,
            CONN
        ))?;
        assert_eq!(config.token_ttl_secs, DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.format, NotificationFormat::Apple);
        assert!(config.registration_id.is_none());
        Ok(())
    }

    #[test]
    fn debug_redacts_connection_string() {
        let rendered = format!("{:?}", valid());
        assert!(!rendered.contains("SharedAccessKey=abc="));
    }

    #[test]
    fn client_options_follow_config() {
        let config = Config {
            timeout_secs: 5,
            format: NotificationFormat::Gcm,
            ..valid()
        };
        let options = config.client_options();
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.format, NotificationFormat::Gcm);
    }
}
