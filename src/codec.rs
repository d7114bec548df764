//! # Codec Primitives
//!
//! Byte-exact base64url (no padding), canonical JSON for disclosure
//! hashing, and a CSPRNG-backed source of salts and decoys. Everything
//! above this module builds on these three primitives; none of them hold
//! state.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::RngCore;
use serde::Serialize;

use crate::error::{Error, Result};

/// Number of random bytes in a disclosure salt, per draft-22 §3.1.
pub const SALT_BYTES: usize = 16;

/// Number of random bytes hashed to produce a decoy digest. Matches the
/// byte length of a disclosure's own digest input closely enough that a
/// decoy is indistinguishable from a real digest once hashed.
const DECOY_BYTES: usize = 32;

/// Base64url-encodes (no padding) the given bytes.
#[must_use]
pub fn encode(bytes: &[u8]) -> String {
    Base64UrlUnpadded::encode_string(bytes)
}

/// Decodes a base64url (no padding) string.
///
/// # Errors
///
/// Returns [`Error::MalformedEncoding`] if `value` contains characters
/// outside the URL-safe alphabet or has an invalid length.
pub fn decode(value: &str) -> Result<Vec<u8>> {
    Base64UrlUnpadded::decode_vec(value)
        .map_err(|e| Error::MalformedEncoding(format!("invalid base64url: {e}")))
}

/// Serializes `value` to its canonical on-wire JSON form: UTF-8, no
/// superfluous whitespace, nested object keys left in the order the
/// caller's [`serde_json::Value`] carries them.
///
/// This crate builds `serde_json` with the `preserve_order` feature so
/// that an opaque claim value supplied by the caller is re-emitted with
/// its original key order rather than being re-sorted alphabetically;
/// disclosures must hash exactly the bytes they emit, never a
/// re-ordered equivalent.
///
/// # Errors
///
/// Returns [`Error::InvalidStructure`] if `value` cannot be serialized
/// (this only happens for types with custom, fallible `Serialize`
/// impls; a [`serde_json::Value`] tree never fails).
pub fn canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| Error::InvalidStructure(format!("canonical JSON: {e}")))
}

/// Generates a fresh, cryptographically random, base64url-encoded salt
/// (22 characters, decoding to 16 bytes).
///
/// # Errors
///
/// Returns [`Error::RandomFailure`] if the platform CSPRNG cannot supply
/// entropy.
pub fn random_salt() -> Result<String> {
    random_bytes(SALT_BYTES).map(|bytes| encode(&bytes))
}

/// Reads `len` bytes from the platform CSPRNG.
///
/// # Errors
///
/// Returns [`Error::RandomFailure`] if the platform CSPRNG cannot supply
/// entropy.
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    rand::rng().try_fill_bytes(&mut bytes).map_err(|e| Error::RandomFailure(e.to_string()))?;
    Ok(bytes)
}

/// Returns `len` fresh random bytes suitable for hashing into a decoy
/// digest.
///
/// # Errors
///
/// Returns [`Error::RandomFailure`] if the platform CSPRNG cannot supply
/// entropy.
pub fn decoy_input() -> Result<Vec<u8>> {
    random_bytes(DECOY_BYTES)
}

/// Constant-time equality check for digest comparison, preventing
/// timing side channels from leaking how many leading bytes matched.
#[must_use]
pub fn digests_equal(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
