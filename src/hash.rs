//! # Hash Registry
//!
//! A closed set of digest algorithms, named by their IANA "Named
//! Information" hash algorithm identifiers. `sha-256` is the default for
//! new issuance; `sha-224` is recognized on the verification path (an
//! issuer may have produced it under an older policy) but issuance never
//! selects it.

use sha2::{Digest as _, Sha224, Sha256, Sha384, Sha512};
use sha3::{Sha3_256, Sha3_512};

use crate::codec;
use crate::error::{Error, Result};

/// A digest algorithm from the closed set SD-JWT VC recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlg {
    /// `sha-224`. Verification-only; not offered for new issuance.
    Sha224,
    /// `sha-256`, the default issuance algorithm.
    Sha256,
    /// `sha-384`.
    Sha384,
    /// `sha-512`.
    Sha512,
    /// `sha3-256`.
    Sha3_256,
    /// `sha3-512`.
    Sha3_512,
}

impl Default for HashAlg {
    fn default() -> Self {
        Self::Sha256
    }
}

impl HashAlg {
    /// Returns the IANA hash algorithm name used in `_sd_alg`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha224 => "sha-224",
            Self::Sha256 => "sha-256",
            Self::Sha384 => "sha-384",
            Self::Sha512 => "sha-512",
            Self::Sha3_256 => "sha3-256",
            Self::Sha3_512 => "sha3-512",
        }
    }

    /// Resolves a [`HashAlg`] from its IANA name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedHashAlgorithm`] if `name` is outside
    /// the closed set.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "sha-224" => Ok(Self::Sha224),
            "sha-256" => Ok(Self::Sha256),
            "sha-384" => Ok(Self::Sha384),
            "sha-512" => Ok(Self::Sha512),
            "sha3-256" => Ok(Self::Sha3_256),
            "sha3-512" => Ok(Self::Sha3_512),
            other => Err(Error::UnsupportedHashAlgorithm(other.to_string())),
        }
    }

    /// Hashes `input` using a fresh digest state. Never reuses state
    /// across calls.
    #[must_use]
    pub fn digest(self, input: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha224 => Sha224::digest(input).to_vec(),
            Self::Sha256 => Sha256::digest(input).to_vec(),
            Self::Sha384 => Sha384::digest(input).to_vec(),
            Self::Sha512 => Sha512::digest(input).to_vec(),
            Self::Sha3_256 => Sha3_256::digest(input).to_vec(),
            Self::Sha3_512 => Sha3_512::digest(input).to_vec(),
        }
    }

    /// Hashes `input` and base64url-encodes the result, as used for
    /// disclosure digests and decoys.
    #[must_use]
    pub fn encoded_digest(self, input: &[u8]) -> String {
        codec::encode(&self.digest(input))
    }
}
