//! # SAS Module
//!
//! Shared Access Signature tokens for the `Authorization` header.
//!
//! ```text
//! string_to_sign = percent_encode(lowercase(resource_uri)) + "\n" + expiry
//! sig            = base64(HMAC-SHA256(key_bytes, string_to_sign))
//! token          = "SharedAccessSignature sr={enc(resource)}&sig={enc(sig)}&se={expiry}&skn={key_name}"
//! ```
//!
//! The key is used as its UTF-8 bytes. It looks like base64 but the hub signs
//! with the literal string, so it must not be decoded first.

use crate::encoding::{percent_decode, percent_encode};
use crate::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_PREFIX: &str = "SharedAccessSignature ";

/// A signed SAS token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SasToken {
    /// Lowercased resource URI the token is scoped to.
    pub resource: String,
    /// Base64 HMAC-SHA256 signature (not percent-encoded).
    pub signature: String,
    /// Expiry as Unix seconds.
    pub expiry: u64,
    /// Shared access policy name.
    pub key_name: String,
}

/// Expiry `ttl_secs` after `now_secs`, saturating at `u64::MAX`.
pub fn expiry_after(now_secs: u64, ttl_secs: u64) -> u64 {
    now_secs.saturating_add(ttl_secs)
}

fn sign(resource: &str, expiry: u64, key: &str) -> Result<Vec<u8>> {
    let string_to_sign = format!("{}\n{}", percent_encode(resource), expiry);
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| Error::InvalidToken(format!("HMAC key rejected: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Sign a token for `resource_uri` valid until `expiry`.
pub fn generate(resource_uri: &str, key_name: &str, key: &str, expiry: u64) -> Result<SasToken> {
    let resource = resource_uri.to_lowercase();
    let signature = BASE64.encode(sign(&resource, expiry, key)?);
    Ok(SasToken {
        resource,
        signature,
        expiry,
        key_name: key_name.to_string(),
    })
}

impl SasToken {
    /// Parse the `Display` form back into its fields.
    pub fn parse(input: &str) -> Result<Self> {
        let Some(body) = input.trim().strip_prefix(TOKEN_PREFIX) else {
            return Err(Error::InvalidToken(
                "missing 'SharedAccessSignature' prefix".to_string(),
            ));
        };

        let mut resource = None;
        let mut signature = None;
        let mut expiry = None;
        let mut key_name = None;

        for pair in body.split('&') {
            let Some((name, value)) = pair.split_once('=') else {
                return Err(Error::InvalidToken(format!("malformed field {:?}", pair)));
            };
            let value = percent_decode(value)?;
            match name {
                "sr" => resource = Some(value),
                "sig" => signature = Some(value),
                "se" => {
                    let secs = value
                        .parse::<u64>()
                        .map_err(|e| Error::InvalidToken(format!("bad expiry {:?}: {}", value, e)))?;
                    expiry = Some(secs);
                }
                "skn" => key_name = Some(value),
                _ => {}
            }
        }

        Ok(Self {
            resource: resource.ok_or(Error::MissingField("sr"))?,
            signature: signature.ok_or(Error::MissingField("sig"))?,
            expiry: expiry.ok_or(Error::MissingField("se"))?,
            key_name: key_name.ok_or(Error::MissingField("skn"))?,
        })
    }

    /// True once `now_secs` has reached the expiry.
    pub fn is_expired(&self, now_secs: u64) -> bool {
        now_secs >= self.expiry
    }

    /// Check expiry, then recompute the signature and compare in constant time.
    pub fn verify(&self, key: &str, now_secs: u64) -> Result<()> {
        if self.is_expired(now_secs) {
            return Err(Error::TokenExpired {
                expiry: self.expiry,
                now: now_secs,
            });
        }
        let presented = BASE64
            .decode(self.signature.as_bytes())
            .map_err(|_| Error::SignatureMismatch)?;
        let expected = sign(&self.resource, self.expiry, key)?;
        if bool::from(presented.as_slice().ct_eq(expected.as_slice())) {
            Ok(())
        } else {
            Err(Error::SignatureMismatch)
        }
    }
}

impl fmt::Display for SasToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}sr={}&sig={}&se={}&skn={}",
            TOKEN_PREFIX,
            percent_encode(&self.resource),
            percent_encode(&self.signature),
            self.expiry,
            percent_encode(&self.key_name)
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
