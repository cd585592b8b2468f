//! Request field decoding and canonical signing string
//!
//! A signed request is a flat JSON object of string values. The signature is
//! the lowercase hex MD5 of `k1=v1&k2=v2&...` over every non-empty field
//! except `sign`, with names in byte-wise order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const SIGN_FIELD: &str = "sign";
pub const NONCE_FIELD: &str = "nonce";
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Decoded request fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestFields(HashMap<String, String>);

impl RequestFields {
    /// Decode a raw payload
    ///
    /// Fails unless the payload is a JSON object whose values are all strings.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Field value, empty when absent
    pub fn get(&self, name: &str) -> &str {
        self.0.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Request timestamp in epoch seconds; absent or unparseable reads as 0
    pub fn timestamp(&self) -> i64 {
        self.get(TIMESTAMP_FIELD).parse().unwrap_or(0)
    }

    pub fn nonce(&self) -> &str {
        self.get(NONCE_FIELD)
    }

    pub fn sign(&self) -> &str {
        self.get(SIGN_FIELD)
    }

    /// Build the canonical signing string
    pub fn canonical_string(&self) -> String {
        let mut signed: Vec<(&str, &str)> = self
            .0
            .iter()
            .filter(|(name, value)| name.as_str() != SIGN_FIELD && !value.is_empty())
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        signed.sort_unstable_by(|a, b| a.0.cmp(b.0));

        signed
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Signature a correct client would send for these fields
    pub fn expected_sign(&self) -> String {
        sign_digest(&self.canonical_string())
    }

    /// Set `sign` to the expected signature, for building client requests
    pub fn signed(mut self) -> Self {
        let sign = self.expected_sign();
        self.insert(SIGN_FIELD, sign);
        self
    }

    pub fn to_payload(&self) -> Vec<u8> {
        // A map of strings always serializes.
        serde_json::to_vec(&self.0).unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Lowercase hex MD5 of the canonical string's bytes
pub fn sign_digest(canonical: &str) -> String {
    let digest = md5::compute(canonical.as_bytes());
    hex::encode(*digest)
}
