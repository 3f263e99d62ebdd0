//! # Encoding Module
//!
//! Percent-encoding for SAS token components.
//!
//! Only RFC 3986 unreserved characters survive unescaped. This is stricter
//! than form encoding (no `+` for space) and matches what the hub expects in
//! the `sr` and `sig` fields of a token.

use crate::{Error, Result};

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

/// Percent-encode every byte outside the unreserved set.
pub fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for &b in input.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX_UPPER[(b >> 4) as usize] as char);
            out.push(HEX_UPPER[(b & 0x0F) as usize] as char);
        }
    }
    out
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decode `%XX` escapes.
///
/// `+` is left as-is; token fields never use form encoding.
pub fn percent_decode(input: &str) -> Result<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let (Some(&hi), Some(&lo)) = (bytes.get(i + 1), bytes.get(i + 2)) else {
                return Err(Error::Encoding(format!("truncated escape at offset {}", i)));
            };
            match (hex_value(hi), hex_value(lo)) {
                (Some(h), Some(l)) => out.push((h << 4) | l),
                _ => {
                    return Err(Error::Encoding(format!(
                        "invalid escape '%{}{}' at offset {}",
                        hi as char, lo as char, i
                    )));
                }
            }
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|e| Error::Encoding(e.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encodes_uri_reserved_characters() {
        assert_eq!(
            percent_encode("https://ns.servicebus.windows.net/hub"),
            "https%3A%2F%2Fns.servicebus.windows.net%2Fhub"
        );
    }

    #[test]
    fn encodes_base64_padding_and_plus() {
        assert_eq!(percent_encode("ab+/c=="), "ab%2B%2Fc%3D%3D");
    }

    #[test]
    fn encodes_multibyte_utf8() {
        assert_eq!(percent_encode("é"), "%C3%A9");
    }

    #[test]
    fn decode_accepts_lowercase_hex() {
        assert_eq!(percent_decode("a%2fb").ok().as_deref(), Some("a/b"));
    }

    #[test]
    fn decode_rejects_truncated_escape() {
        assert!(matches!(percent_decode("abc%2"), Err(Error::Encoding(_))));
    }

    #[test]
    fn decode_rejects_non_hex_escape() {
        assert!(matches!(percent_decode("%zz"), Err(Error::Encoding(_))));
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        assert!(matches!(percent_decode("%FF"), Err(Error::Encoding(_))));
    }

    proptest! {
        #[test]
        fn encoded_output_is_unreserved_or_escape(s in ".*") {
            let encoded = percent_encode(&s);
            let bytes = encoded.as_bytes();
            let mut i = 0;
            while i < bytes.len() {
                if bytes[i] == b'%' {
                    prop_assert!(bytes[i + 1].is_ascii_hexdigit());
                    prop_assert!(bytes[i + 2].is_ascii_hexdigit());
                    i += 3;
                } else {
                    prop_assert!(is_unreserved(bytes[i]));
                    i += 1;
                }
            }
        }

        #[test]
        fn decode_inverts_encode(s in ".*") {
            prop_assert_eq!(percent_decode(&percent_encode(&s)).ok(), Some(s));
        }
    }
}
