//! # Status Module
//!
//! Event-driven parsing of hub XML responses.
//!
//! The hub reports failures as a small XML document:
//!
//! ```text
//! <Error><Code>401</Code><Detail>ExpiredToken: ...</Detail></Error>
//! ```
//!
//! Parsing is callback-style. [`drive`] pulls events from `quick-xml` and
//! forwards them to an [`XmlEvents`] handler, so the same driver serves the
//! status parser here and the registration parser.

use crate::{Error, Result};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Serialize;

// =============================================================================
// EVENT DRIVER
// =============================================================================

/// Receiver of parse events, one call per start tag, text node and end tag.
pub trait XmlEvents {
    fn start_element(&mut self, name: &str);
    fn characters(&mut self, text: &str);
    fn end_element(&mut self, name: &str);
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Parse `xml`, delivering events to `handler`.
///
/// Self-closing tags produce a start and an end call. Text is trimmed and
/// whitespace-only nodes are dropped. A document that ends with open tags is
/// an error.
pub fn drive<H: XmlEvents>(xml: &str, handler: &mut H) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut depth: usize = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                handler.start_element(&local_name(e.local_name().as_ref()));
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(e.local_name().as_ref());
                handler.start_element(&name);
                handler.end_element(&name);
            }
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                handler.end_element(&local_name(e.local_name().as_ref()));
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| Error::Xml(e.to_string()))?;
                let text = text.trim();
                if !text.is_empty() {
                    handler.characters(text);
                }
            }
            Ok(Event::CData(c)) => {
                let raw = c.into_inner();
                let text = String::from_utf8_lossy(&raw);
                let text = text.trim();
                if !text.is_empty() {
                    handler.characters(text);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
    }

    if depth != 0 {
        return Err(Error::Xml(format!(
            "unexpected end of document with {} open element(s)",
            depth
        )));
    }
    Ok(())
}

// =============================================================================
// STATUS PARSER
// =============================================================================

/// Parse state for a status response.
///
/// `status_result` collects one `"{element}: {text}"` line per text node,
/// which is the human-readable summary shown when a send fails.
#[derive(Debug, Clone, Default)]
pub struct StatusParser {
    pub current_element: String,
    pub status_result: String,
    code: Option<String>,
    detail: Option<String>,
}

impl StatusParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> HubStatus {
        HubStatus {
            status_result: self.status_result,
            code: self.code,
            detail: self.detail,
        }
    }
}

impl XmlEvents for StatusParser {
    fn start_element(&mut self, name: &str) {
        self.current_element = name.to_string();
    }

    fn characters(&mut self, text: &str) {
        if self.current_element.is_empty() {
            self.status_result.push_str(text);
        } else {
            self.status_result
                .push_str(&format!("{}: {}", self.current_element, text));
        }
        self.status_result.push('\n');

        match self.current_element.as_str() {
            "Code" => self.code = Some(text.to_string()),
            "Detail" => self.detail = Some(text.to_string()),
            _ => {}
        }
    }

    fn end_element(&mut self, _name: &str) {
        self.current_element.clear();
    }
}

/// Result of parsing a status response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HubStatus {
    pub status_result: String,
    pub code: Option<String>,
    pub detail: Option<String>,
}

impl HubStatus {
    pub fn is_empty(&self) -> bool {
        self.status_result.is_empty()
    }
}

/// Parse a response body into a [`HubStatus`]. An empty body is an empty status.
pub fn parse_status(xml: &str) -> Result<HubStatus> {
    let mut parser = StatusParser::new();
    if xml.trim().is_empty() {
        return Ok(parser.finish());
    }
    drive(xml, &mut parser)?;
    Ok(parser.finish())
}

// =============================================================================
// TESTS
// =============================================================================
