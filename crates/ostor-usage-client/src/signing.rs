//! Request signing for the admin API
//!
//! The admin API uses S3 v2 style signatures: an HMAC-SHA1 over a newline
//! separated string of method, content type, date and the canonical resource,
//! base64 encoded into an `Authorization: AWS <access>:<signature>` header.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use ostor_usage_core::error::{Result, UsageError};
use sha1::Sha1;
use std::fmt;

type HmacSha1 = Hmac<Sha1>;

/// Format a timestamp as an RFC 1123 GMT date header value
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Build the string the signature is computed over
///
/// The Content-MD5 slot is always empty.
pub fn string_to_sign(method: &str, content_type: &str, date: &str, canonical_resource: &str) -> String {
    format!("{method}\n\n{content_type}\n{date}\n{canonical_resource}")
}

/// Signs requests with an access/secret key pair
#[derive(Clone)]
pub struct RequestSigner {
    access_key: String,
    secret_key: String,
}

impl RequestSigner {
    /// Create a signer for the given credentials
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Base64 HMAC-SHA1 signature of `string_to_sign`
    pub fn sign(&self, string_to_sign: &str) -> Result<String> {
        let mut mac = HmacSha1::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| UsageError::Config(format!("invalid secret key: {e}")))?;
        mac.update(string_to_sign.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// `Authorization` header value for a signature
    pub fn authorization(&self, signature: &str) -> String {
        format!("AWS {}:{}", self.access_key, signature)
    }
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}
