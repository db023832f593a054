// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decoding of compact-token claim segments.
//!
//! Token payloads arrive base64url-encoded and usually unpadded. The decoder
//! normalizes the URL-safe alphabet back to the standard one, restores
//! padding, and parses the result as a JSON object. Signatures are never
//! verified here; the only consumer reads the unverified `exp` claim.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};

use crate::error::Error;

/// Decode one base64url segment of a compact token into its claims object.
///
/// Accepts both the URL-safe and standard alphabets, padded or unpadded.
/// A length of 1 mod 4 can never be valid base64.
pub fn decode_segment(segment: &str) -> Result<Map<String, Value>, Error> {
    let mut normalized: String = segment
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    match normalized.len() % 4 {
        0 => {}
        1 => return Err(Error::Decode("illegal base64url segment length".into())),
        rem => normalized.push_str(&"=".repeat(4 - rem)),
    }

    let bytes = STANDARD.decode(normalized.as_bytes()).map_err(|e| Error::Decode(e.to_string()))?;
    match serde_json::from_slice(&bytes) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(_) => Err(Error::Decode("claims are not a JSON object".into())),
        Err(e) => Err(Error::Decode(e.to_string())),
    }
}

#[cfg(test)]
#[path = "claims_tests.rs"]
mod tests;
