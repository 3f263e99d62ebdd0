//! # hubsend-core
//!
//! The pure half of the Notification Hub sender.
//!
//! Nothing in this crate performs I/O or reads the clock. Callers pass the
//! current Unix time in seconds wherever an expiry is involved, which keeps
//! token generation reproducible in tests.
//!
//! ```text
//! connection string ──► HubAddress ──► resource_uri ──► sas::generate ──► Authorization
//!                                  └─► messages_url / registrations_url
//! text + channel ──► Notification + Tag ──► request body / headers
//! response body ──► status::parse_status ──► HubStatus
//! ```

pub mod connection;
pub mod encoding;
pub mod notification;
pub mod registration;
pub mod sas;
pub mod status;

pub use connection::{ConnectionString, HubAddress};
pub use notification::{Notification, NotificationFormat, Tag, TagExpression};
pub use registration::{
    ATOM_CONTENT_TYPE, Platform, RegistrationDescription, normalize_device_handle,
    normalize_device_token, parse_registration,
};
pub use sas::SasToken;
pub use status::{HubStatus, StatusParser, parse_status};

use thiserror::Error;

// =============================================================================
// CONSTANTS
// =============================================================================

/// REST API version sent as the `api-version` query parameter.
pub const API_VERSION: &str = "2015-01";

/// Default SAS token lifetime in seconds.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Largest notification body the hub accepts, in bytes.
pub const MAX_PAYLOAD_BYTES: usize = 4096;

/// Longest tag the hub accepts, in characters.
pub const MAX_TAG_LEN: usize = 120;

/// Most tags allowed in a single OR expression.
pub const MAX_TAGS_PER_EXPRESSION: usize = 20;

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Errors produced by the core logic.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection string could not be parsed.
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// A required field was absent.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Endpoint URL has an unsupported shape or scheme.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Hub path is empty or contains a separator.
    #[error("Invalid hub path: {0:?}")]
    InvalidHubPath(String),

    /// Tag is empty, too long, or uses a disallowed character.
    #[error("Invalid tag {0:?}")]
    InvalidTag(String),

    /// Tag expression has no tags or more than the hub allows.
    #[error("Tag expression must contain 1..={max} tags, got {count}")]
    TooManyTags { count: usize, max: usize },

    /// Notification text was empty.
    #[error("Notification text is empty")]
    EmptyText,

    /// Body exceeded [`MAX_PAYLOAD_BYTES`].
    #[error("Payload of {size} bytes exceeds limit of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    /// Device token is not even-length hex.
    #[error("Invalid device token: {0}")]
    InvalidDeviceToken(String),

    /// SAS token text could not be parsed.
    #[error("Invalid SAS token: {0}")]
    InvalidToken(String),

    /// SAS token is past its expiry.
    #[error("SAS token expired at {expiry} (now {now})")]
    TokenExpired { expiry: u64, now: u64 },

    /// SAS token signature did not match the key.
    #[error("SAS token signature mismatch")]
    SignatureMismatch,

    /// Percent-decoding failed.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// XML was malformed.
    #[error("XML error: {0}")]
    Xml(String),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::Xml(e.to_string())
    }
}

/// Result alias used across the core.
pub type Result<T> = std::result::Result<T, Error>;
