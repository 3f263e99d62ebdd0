//! # Notification Module
//!
//! Payload formats, tags and tag expressions.
//!
//! A chat channel maps one-to-one onto a hub tag: devices register with the
//! tags of the channels they listen to, and a message is sent to the tag of
//! the channel it was posted in.

use crate::{Error, MAX_PAYLOAD_BYTES, MAX_TAG_LEN, MAX_TAGS_PER_EXPRESSION, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// FORMAT
// =============================================================================

/// Target platform format, sent as `ServiceBusNotification-Format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationFormat {
    /// APNs payload (`{"aps": {...}}`).
    #[default]
    Apple,
    /// FCM legacy payload (`{"data": {...}}`).
    Gcm,
    /// Template properties, expanded per registration by the hub.
    Template,
}

impl NotificationFormat {
    /// Wire value of the format header.
    pub fn header_value(self) -> &'static str {
        match self {
            NotificationFormat::Apple => "apple",
            NotificationFormat::Gcm => "gcm",
            NotificationFormat::Template => "template",
        }
    }
}

impl fmt::Display for NotificationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header_value())
    }
}

impl FromStr for NotificationFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "apple" | "apns" => Ok(NotificationFormat::Apple),
            "gcm" | "fcm" => Ok(NotificationFormat::Gcm),
            "template" => Ok(NotificationFormat::Template),
            other => Err(format!(
                "unknown format '{}' (expected apple, gcm or template)",
                other
            )),
        }
    }
}

// =============================================================================
// NOTIFICATION
// =============================================================================

/// A ready-to-send notification body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub format: NotificationFormat,
    pub body: String,
}

impl Notification {
    /// Content type for the body. All supported formats are JSON.
    pub const CONTENT_TYPE: &'static str = "application/json;charset=utf-8";

    fn checked(format: NotificationFormat, body: String) -> Result<Self> {
        if body.len() > MAX_PAYLOAD_BYTES {
            return Err(Error::PayloadTooLarge {
                size: body.len(),
                max: MAX_PAYLOAD_BYTES,
            });
        }
        Ok(Self { format, body })
    }

    fn require_text(text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(Error::EmptyText);
        }
        Ok(())
    }

    /// `{"aps":{"alert":text}}`
    pub fn apple_alert(text: &str) -> Result<Self> {
        Self::require_text(text)?;
        let body = serde_json::to_string(&json!({ "aps": { "alert": text } }))?;
        Self::checked(NotificationFormat::Apple, body)
    }

    /// `{"data":{"message":text}}`
    pub fn gcm_message(text: &str) -> Result<Self> {
        Self::require_text(text)?;
        let body = serde_json::to_string(&json!({ "data": { "message": text } }))?;
        Self::checked(NotificationFormat::Gcm, body)
    }

    /// Flat JSON object of template properties, keys in sorted order.
    pub fn template(properties: &BTreeMap<String, String>) -> Result<Self> {
        if properties.is_empty() {
            return Err(Error::EmptyText);
        }
        let body = serde_json::to_string(properties)?;
        Self::checked(NotificationFormat::Template, body)
    }

    /// Build the default body for `format` carrying `text`.
    pub fn for_format(format: NotificationFormat, text: &str) -> Result<Self> {
        match format {
            NotificationFormat::Apple => Self::apple_alert(text),
            NotificationFormat::Gcm => Self::gcm_message(text),
            NotificationFormat::Template => {
                Self::require_text(text)?;
                let mut props = BTreeMap::new();
                props.insert("message".to_string(), text.to_string());
                Self::template(&props)
            }
        }
    }
}

// =============================================================================
// TAGS
// =============================================================================

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '@' | '#' | '.' | ':' | '-')
}

/// A validated hub tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(String);

impl Tag {
    /// Validate a tag: 1..=120 chars from `[A-Za-z0-9_@#.:-]`.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let len = value.chars().count();
        if len == 0 || len > MAX_TAG_LEN || !value.chars().all(is_tag_char) {
            return Err(Error::InvalidTag(value));
        }
        Ok(Self(value))
    }

    /// Tag for a chat channel name.
    pub fn from_channel(channel: &str) -> Result<Self> {
        Self::new(channel.trim())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Tag {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Tag::new(value)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// OR of tags, sent as `ServiceBusNotification-Tags`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagExpression {
    tags: Vec<Tag>,
}

impl TagExpression {
    /// Expression for a single tag.
    pub fn single(tag: Tag) -> Self {
        Self { tags: vec![tag] }
    }

    /// Expression matching any of `tags`. Duplicates are dropped.
    pub fn any_of(tags: impl IntoIterator<Item = Tag>) -> Result<Self> {
        let mut unique: Vec<Tag> = Vec::new();
        for tag in tags {
            if !unique.contains(&tag) {
                unique.push(tag);
            }
        }
        if unique.is_empty() || unique.len() > MAX_TAGS_PER_EXPRESSION {
            return Err(Error::TooManyTags {
                count: unique.len(),
                max: MAX_TAGS_PER_EXPRESSION,
            });
        }
        Ok(Self { tags: unique })
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Header value.
    pub fn to_header(&self) -> String {
        self.tags
            .iter()
            .map(Tag::as_str)
            .collect::<Vec<_>>()
            .join(" || ")
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn apple_alert_wraps_text_in_aps() -> Result<()> {
        let n = Notification::apple_alert("Hello \"chat\"")?;
        assert_eq!(n.format, NotificationFormat::Apple);
        assert_eq!(n.body, r#"{"aps":{"alert":"Hello \"chat\""}}"#);
        Ok(())
    }

    #[test]
    fn gcm_message_wraps_text_in_data() -> Result<()> {
        let n = Notification::gcm_message("hi")?;
        assert_eq!(n.body, r#"{"data":{"message":"hi"}}"#);
        Ok(())
    }

    #[test]
    fn template_properties_are_sorted() -> Result<()> {
        let mut props = BTreeMap::new();
        props.insert("zeta".to_string(), "1".to_string());
        props.insert("alpha".to_string(), "2".to_string());
        let n = Notification::template(&props)?;
        assert_eq!(n.body, r#"{"alpha":"2","zeta":"1"}"#);
        Ok(())
    }

    #[test]
    fn for_format_template_uses_message_property() -> Result<()> {
        let n = Notification::for_format(NotificationFormat::Template, "yo")?;
        assert_eq!(n.body, r#"{"message":"yo"}"#);
        assert_eq!(n.format.header_value(), "template");
        Ok(())
    }

    #[test]
    fn empty_text_is_rejected() {
        assert!(matches!(Notification::apple_alert("   "), Err(Error::EmptyText)));
        assert!(matches!(
            Notification::template(&BTreeMap::new()),
            Err(Error::EmptyText)
        ));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let text = "x".repeat(MAX_PAYLOAD_BYTES);
        assert!(matches!(
            Notification::apple_alert(&text),
            Err(Error::PayloadTooLarge { max: MAX_PAYLOAD_BYTES, .. })
        ));
    }

    #[test]
    fn payload_at_limit_is_accepted() -> Result<()> {
        // {"aps":{"alert":""}} is 20 bytes of framing.
        let text = "x".repeat(MAX_PAYLOAD_BYTES - 20);
        let n = Notification::apple_alert(&text)?;
        assert_eq!(n.body.len(), MAX_PAYLOAD_BYTES);

        let over = "x".repeat(MAX_PAYLOAD_BYTES - 19);
        assert!(matches!(
            Notification::apple_alert(&over),
            Err(Error::PayloadTooLarge { size, .. }) if size == MAX_PAYLOAD_BYTES + 1
        ));
        Ok(())
    }

    #[test]
    fn format_parses_aliases() {
        assert_eq!(
            "APNS".parse::<NotificationFormat>().ok(),
            Some(NotificationFormat::Apple)
        );
        assert_eq!(
            "fcm".parse::<NotificationFormat>().ok(),
            Some(NotificationFormat::Gcm)
        );
        assert!("wns".parse::<NotificationFormat>().is_err());
    }

    #[test]
    fn tag_rejects_spaces_and_length() {
        assert!(matches!(Tag::new("general chat"), Err(Error::InvalidTag(_))));
        assert!(matches!(Tag::new(""), Err(Error::InvalidTag(_))));
        assert!(matches!(Tag::new("a".repeat(121)), Err(Error::InvalidTag(_))));
        assert!(Tag::new("a".repeat(120)).is_ok());
    }

    #[test]
    fn tag_from_channel_trims() -> Result<()> {
        assert_eq!(Tag::from_channel("  general ")?.as_str(), "general");
        Ok(())
    }

    #[test]
    fn tag_deserialization_validates() {
        let ok: std::result::Result<Tag, _> = serde_json::from_str(r#""user:42""#);
        assert!(ok.is_ok());
        let bad: std::result::Result<Tag, _> = serde_json::from_str(r#""no spaces""#);
        assert!(bad.is_err());
    }

    #[test]
    fn expression_joins_with_or_and_dedups() -> Result<()> {
        let expr = TagExpression::any_of([Tag::new("a")?, Tag::new("b")?, Tag::new("a")?])?;
        assert_eq!(expr.to_header(), "a || b");
        assert_eq!(expr.tags().len(), 2);
        Ok(())
    }

    #[test]
    fn expression_bounds_are_enforced() -> Result<()> {
        assert!(matches!(
            TagExpression::any_of(Vec::new()),
            Err(Error::TooManyTags { count: 0, .. })
        ));
        let many = (0..21)
            .map(|i| Tag::new(format!("t{}", i)))
            .collect::<Result<Vec<_>>>()?;
        assert!(matches!(
            TagExpression::any_of(many),
            Err(Error::TooManyTags { count: 21, max: 20 })
        ));
        Ok(())
    }

    proptest! {
        #[test]
        fn any_valid_charset_tag_is_accepted(s in "[A-Za-z0-9_@#.:-]{1,120}") {
            prop_assert!(Tag::new(s).is_ok());
        }
    }
}
