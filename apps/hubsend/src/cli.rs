//! # CLI Commands
//!
//! One function per subcommand. `main.rs` only parses arguments and
//! dispatches here, so every command can be exercised from tests without
//! spawning a process.
//!
//! Commands print their result to stdout, as text or as JSON with `--json`,
//! and return it for callers that want to inspect it.

use crate::client::{SendOutcome, unix_now};
use crate::config::Config;
use crate::manager::PushManager;
use crate::{Error, Result};
use hubsend_core::{HubStatus, Notification, NotificationFormat, RegistrationDescription};
use serde_json::json;
use std::path::Path;
use tracing::info;

fn print_outcome(outcome: &SendOutcome, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string(outcome)?);
    } else {
        println!(
            "Notification sent (HTTP {}, tracking id {})",
            outcome.status,
            outcome.tracking_id.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

// =============================================================================
// INIT
// =============================================================================

/// Write a config template to `path`.
pub fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    Config::template().save(path)?;
    info!(path = %path.display(), "config template written");
    println!("Wrote config template to {}", path.display());
    Ok(())
}

// =============================================================================
// SEND / BROADCAST
// =============================================================================

/// Send `text` to `channel`, optionally overriding the configured format.
pub async fn cmd_send(
    config: &Config,
    channel: &str,
    text: &str,
    format: Option<NotificationFormat>,
    json_output: bool,
) -> Result<SendOutcome> {
    let mut config = config.clone();
    if let Some(format) = format {
        config.format = format;
    }
    let manager = PushManager::new(config.build_client()?);
    let outcome = manager.send_to_channel(channel, text).await?;
    print_outcome(&outcome, json_output)?;
    Ok(outcome)
}

/// Send `text` to every registration on the hub.
pub async fn cmd_broadcast(
    config: &Config,
    text: &str,
    format: Option<NotificationFormat>,
    json_output: bool,
) -> Result<SendOutcome> {
    let format = format.unwrap_or(config.format);
    let notification = Notification::for_format(format, text)?;
    let outcome = config.build_client()?.send(&notification, None).await?;
    print_outcome(&outcome, json_output)?;
    Ok(outcome)
}

// =============================================================================
// REGISTER / UNREGISTER
// =============================================================================

/// Register this device for `channels`.
///
/// The device token comes from the argument or the config, after `env`
/// overrides. Only the resulting registration id and token are written back
/// to the file, so the next run updates the same registration; override
/// values never reach the disk.
pub async fn cmd_register<F>(
    config_path: &Path,
    env: F,
    device_token: Option<&str>,
    channels: &[String],
    json_output: bool,
) -> Result<RegistrationDescription>
where
    F: Fn(&str) -> Option<String>,
{
    let mut stored = Config::from_file(config_path)?;
    let config = stored.resolved(env)?;
    let token = device_token
        .map(str::to_string)
        .or_else(|| config.device_token.clone())
        .ok_or_else(|| {
            Error::Config("no device token given and none stored in config".to_string())
        })?;

    let mut manager = PushManager::new(config.build_client()?)
        .with_registration_id(config.registration_id.clone());
    manager.set_device_token(&token)?;
    manager.listen_to_channels(channels.iter().cloned()).await?;

    let Some(registration) = manager.register().await? else {
        return Err(Error::Config("device token missing".to_string()));
    };

    stored.device_token = manager.device_token().map(str::to_string);
    stored.registration_id = registration.registration_id.clone();
    stored.save(config_path)?;

    if json_output {
        println!(
            "{}",
            json!({
                "registration_id": registration.registration_id,
                "tags": registration.tags,
                "expiration_time": registration.expiration_time,
            })
        );
    } else {
        println!(
            "Registered {} for [{}]",
            registration.registration_id.as_deref().unwrap_or("-"),
            registration.tags_csv()
        );
    }
    Ok(registration)
}

/// Delete a registration given by argument or stored in the config.
pub async fn cmd_unregister<F>(
    config_path: &Path,
    env: F,
    registration_id: Option<&str>,
    json_output: bool,
) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut stored = Config::from_file(config_path)?;
    let config = stored.resolved(env)?;
    let id = registration_id
        .map(str::to_string)
        .or_else(|| config.registration_id.clone())
        .ok_or_else(|| Error::Config("no registration id given or stored".to_string()))?;

    let mut manager =
        PushManager::new(config.build_client()?).with_registration_id(Some(id.clone()));
    manager.unregister().await?;

    if stored.registration_id.as_deref() == Some(id.as_str()) {
        stored.registration_id = None;
        stored.save(config_path)?;
    }

    if json_output {
        println!("{}", json!({ "deleted": id }));
    } else {
        println!("Deleted registration {}", id);
    }
    Ok(id)
}

// =============================================================================
// TOKEN / PARSE-STATUS
// =============================================================================

/// Print a SAS token for the hub resource, valid for `ttl_secs` (or the configured TTL).
pub fn cmd_token(config: &Config, ttl_secs: Option<u64>, json_output: bool) -> Result<String> {
    let mut config = config.clone();
    if let Some(ttl) = ttl_secs {
        if ttl == 0 {
            return Err(Error::Config("ttl must be > 0".to_string()));
        }
        config.token_ttl_secs = ttl;
    }
    let now = unix_now();
    let token = config.build_client()?.token_at(now)?;
    if json_output {
        println!(
            "{}",
            json!({
                "token": token,
                "expires_at": now.saturating_add(config.token_ttl_secs),
            })
        );
    } else {
        println!("{}", token);
    }
    Ok(token)
}

/// Parse a saved hub response body and print its status lines.
pub fn cmd_parse_status(file: &Path, json_output: bool) -> Result<HubStatus> {
    let body = std::fs::read_to_string(file)?;
    let status = hubsend_core::parse_status(&body)?;
    if json_output {
        println!("{}", serde_json::to_string(&status)?);
    } else if status.is_empty() {
        println!("(empty status)");
    } else {
        print!("{}", status.status_result);
    }
    Ok(status)
}
