//! # Registration Module
//!
//! Native device registrations, exchanged with the hub as Atom entries.
//!
//! A registration ties one device handle (APNs device token or FCM
//! registration id) to a set of tags. The hub assigns the `RegistrationId`;
//! later updates `PUT` to that id so a device never accumulates duplicates.

use crate::notification::{NotificationFormat, Tag};
use crate::status::{XmlEvents, drive};
use crate::{Error, Result};
use std::collections::BTreeMap;

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const SB_NS: &str = "http://schemas.microsoft.com/netservices/2010/10/servicebus/connect";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Content type for registration bodies.
pub const ATOM_CONTENT_TYPE: &str = "application/atom+xml;type=entry;charset=utf-8";

// =============================================================================
// DEVICE TOKEN
// =============================================================================

/// Normalize an APNs device token to uppercase hex.
///
/// Accepts the `<abcd 1234 ...>` form that the OS description prints.
pub fn normalize_device_token(raw: &str) -> Result<String> {
    let token: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '<' | '>'))
        .collect::<String>()
        .to_ascii_uppercase();
    if token.is_empty() || token.len() % 2 != 0 || !token.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(Error::InvalidDeviceToken(raw.to_string()));
    }
    Ok(token)
}

/// Normalize the device handle for the platform `format` registers as.
///
/// FCM registration ids are opaque and only trimmed; every other format
/// registers as APNs and takes a hex device token.
pub fn normalize_device_handle(format: NotificationFormat, raw: &str) -> Result<String> {
    match format {
        NotificationFormat::Gcm => {
            let handle = raw.trim();
            if handle.is_empty() {
                return Err(Error::InvalidDeviceToken(raw.to_string()));
            }
            Ok(handle.to_string())
        }
        NotificationFormat::Apple | NotificationFormat::Template => normalize_device_token(raw),
    }
}

// =============================================================================
// DESCRIPTION
// =============================================================================

/// Device handle of a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    Apple { device_token: String },
    Gcm { registration_id: String },
}

impl Platform {
    fn description_element(&self) -> &'static str {
        match self {
            Platform::Apple { .. } => "AppleRegistrationDescription",
            Platform::Gcm { .. } => "GcmRegistrationDescription",
        }
    }

    fn handle_element(&self) -> &'static str {
        match self {
            Platform::Apple { .. } => "DeviceToken",
            Platform::Gcm { .. } => "GcmRegistrationId",
        }
    }

    fn handle(&self) -> &str {
        match self {
            Platform::Apple { device_token } => device_token,
            Platform::Gcm { registration_id } => registration_id,
        }
    }
}

/// A native registration as sent to, or returned by, the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationDescription {
    /// Hub-assigned id; `None` until created.
    pub registration_id: Option<String>,
    pub etag: Option<String>,
    pub expiration_time: Option<String>,
    pub tags: Vec<Tag>,
    pub platform: Platform,
}

impl RegistrationDescription {
    /// New APNs registration. The token is normalized.
    pub fn apple(device_token: &str, tags: Vec<Tag>) -> Result<Self> {
        Ok(Self::with_platform(
            Platform::Apple {
                device_token: normalize_device_token(device_token)?,
            },
            tags,
        ))
    }

    /// New FCM registration.
    pub fn gcm(registration_id: &str, tags: Vec<Tag>) -> Result<Self> {
        let registration_id = registration_id.trim();
        if registration_id.is_empty() {
            return Err(Error::MissingField("GcmRegistrationId"));
        }
        Ok(Self::with_platform(
            Platform::Gcm {
                registration_id: registration_id.to_string(),
            },
            tags,
        ))
    }

    /// Native registration for the platform `format` sends to.
    pub fn for_format(format: NotificationFormat, handle: &str, tags: Vec<Tag>) -> Result<Self> {
        match format {
            NotificationFormat::Gcm => Self::gcm(handle, tags),
            NotificationFormat::Apple | NotificationFormat::Template => Self::apple(handle, tags),
        }
    }

    fn with_platform(platform: Platform, mut tags: Vec<Tag>) -> Self {
        tags.sort();
        tags.dedup();
        Self {
            registration_id: None,
            etag: None,
            expiration_time: None,
            tags,
            platform,
        }
    }

    /// Comma-joined tag list as the hub stores it.
    pub fn tags_csv(&self) -> String {
        self.tags
            .iter()
            .map(Tag::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Request body for create / update.
    pub fn to_atom_xml(&self) -> String {
        let element = self.platform.description_element();
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>");
        xml.push_str(&format!("<entry xmlns=\"{}\">", ATOM_NS));
        xml.push_str("<content type=\"application/xml\">");
        xml.push_str(&format!(
            "<{} xmlns:i=\"{}\" xmlns=\"{}\">",
            element, XSI_NS, SB_NS
        ));
        if !self.tags.is_empty() {
            xml.push_str(&format!("<Tags>{}</Tags>", escape_xml(&self.tags_csv())));
        }
        let handle = self.platform.handle_element();
        xml.push_str(&format!(
            "<{}>{}</{}>",
            handle,
            escape_xml(self.platform.handle()),
            handle
        ));
        xml.push_str(&format!("</{}>", element));
        xml.push_str("</content></entry>");
        xml
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

// =============================================================================
// RESPONSE PARSING
// =============================================================================

#[derive(Default)]
struct RegistrationParser {
    current_element: String,
    description: Option<String>,
    fields: BTreeMap<String, String>,
}

impl XmlEvents for RegistrationParser {
    fn start_element(&mut self, name: &str) {
        if name.ends_with("RegistrationDescription") {
            self.description = Some(name.to_string());
        }
        self.current_element = name.to_string();
    }

    fn characters(&mut self, text: &str) {
        // Only fields inside the description; the Atom envelope has its own <title>, <id>...
        if self.description.is_some() && !self.current_element.is_empty() {
            self.fields
                .entry(self.current_element.clone())
                .or_default()
                .push_str(text);
        }
    }

    fn end_element(&mut self, _name: &str) {
        self.current_element.clear();
    }
}

/// Parse a registration entry returned by create / update / get.
pub fn parse_registration(xml: &str) -> Result<RegistrationDescription> {
    let mut parser = RegistrationParser::default();
    drive(xml, &mut parser)?;

    let Some(description) = parser.description else {
        return Err(Error::Xml("no registration description in response".to_string()));
    };
    let mut fields = parser.fields;

    let platform = if description.starts_with("Apple") {
        Platform::Apple {
            device_token: fields
                .remove("DeviceToken")
                .ok_or(Error::MissingField("DeviceToken"))?,
        }
    } else if description.starts_with("Gcm") {
        Platform::Gcm {
            registration_id: fields
                .remove("GcmRegistrationId")
                .ok_or(Error::MissingField("GcmRegistrationId"))?,
        }
    } else {
        return Err(Error::Xml(format!(
            "unsupported registration type {}",
            description
        )));
    };

    let registration_id = fields
        .remove("RegistrationId")
        .ok_or(Error::MissingField("RegistrationId"))?;

    let tags = fields
        .remove("Tags")
        .map(|csv| {
            csv.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(Tag::new)
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?
        .unwrap_or_default();

    Ok(RegistrationDescription {
        registration_id: Some(registration_id),
        etag: fields.remove("ETag"),
        expiration_time: fields.remove("ExpirationTime"),
        tags,
        platform,
    })
}

// =============================================================================
// TESTS
// =============================================================================
