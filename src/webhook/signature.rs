//! Messaging webhook request signatures.
//!
//! The provider signs each request with HMAC-SHA1 keyed by the account auth
//! token over the full public URL followed by every form parameter as
//! `key + value`, sorted by key, and sends the base64 digest in the
//! `X-Twilio-Signature` header.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "X-Twilio-Signature";

type HmacSha1 = Hmac<Sha1>;

/// Signature validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// The request carried no signature header.
    #[error("missing X-Twilio-Signature header")]
    Missing,

    /// The header is not valid base64.
    #[error("malformed signature")]
    Malformed,

    /// The signature does not match the request.
    #[error("signature mismatch")]
    Invalid,
}

/// Validates request signatures with the account auth token.
#[derive(Clone)]
pub struct SignatureValidator {
    auth_token: String,
}

impl std::fmt::Debug for SignatureValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureValidator").finish_non_exhaustive()
    }
}

impl SignatureValidator {
    /// Create a validator for `auth_token`.
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
        }
    }

    fn digest(&self, url: &str, params: &BTreeMap<String, String>) -> Vec<u8> {
        // Hmac accepts keys of any length
        let mut mac = match HmacSha1::new_from_slice(self.auth_token.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return Vec::new(),
        };
        mac.update(url.as_bytes());
        for (key, value) in params {
            mac.update(key.as_bytes());
            mac.update(value.as_bytes());
        }
        mac.finalize().into_bytes().to_vec()
    }

    /// The base64 signature expected for a request.
    pub fn sign(&self, url: &str, params: &BTreeMap<String, String>) -> String {
        STANDARD.encode(self.digest(url, params))
    }

    /// Check `signature` against the request, in constant time.
    pub fn validate(
        &self,
        url: &str,
        params: &BTreeMap<String, String>,
        signature: Option<&str>,
    ) -> Result<(), SignatureError> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(SignatureError::Missing)?;
        let provided = STANDARD
            .decode(signature)
            .map_err(|_| SignatureError::Malformed)?;
        let expected = self.digest(url, params);

        if expected.is_empty() || !bool::from(expected.ct_eq(&provided)) {
            return Err(SignatureError::Invalid);
        }
        Ok(())
    }
}
