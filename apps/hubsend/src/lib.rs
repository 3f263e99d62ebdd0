//! # hubsend
//!
//! Sends push notifications to chat channels through an Azure Notification Hub.
//!
//! The binary uses these modules through the `main.rs` entry point; they are
//! exposed here for testing and integration.
//!
//! ```text
//! ┌──────────────┐  send_to_channel   ┌──────────────┐   POST /{hub}/messages/        ┌─────────────────┐
//! │ PushManager  │ ─────────────────► │  HubClient   │ ─────────────────────────────► │ Notification    │
//! │ (channels,   │  register          │  (reqwest,   │   POST/PUT/DELETE              │ Hub (REST)      │
//! │  token, id)  │ ─────────────────► │  SAS signer) │   /{hub}/registrations/...     │                 │
//! └──────────────┘                    └──────────────┘ ◄───── 201 / XML status ────── └─────────────────┘
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod manager;

pub use client::{ClientOptions, HubClient, SendOutcome};
pub use config::Config;
pub use manager::PushManager;

// Re-export hubsend_core for convenience
pub use hubsend_core;

use thiserror::Error;

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Errors from the hubsend application layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Validation, signing or XML failure in the core.
    #[error(transparent)]
    Core(#[from] hubsend_core::Error),

    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Hub answered with a non-success status.
    #[error("Hub error (HTTP {status}): {}", .detail.as_deref().unwrap_or(.status_result.trim()))]
    Hub {
        status: u16,
        code: Option<String>,
        detail: Option<String>,
        status_result: String,
    },

    /// Configuration missing or invalid.
    #[error("Config error: {0}")]
    Config(String),

    /// File I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A header value could not be encoded.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

impl Error {
    /// HTTP status of a hub error, if this is one.
    pub fn hub_status(&self) -> Option<u16> {
        match self {
            Error::Hub { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
