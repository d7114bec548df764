//! # Error Taxonomy
//!
//! A closed set of error kinds covering every failure mode of the
//! disclosure engine, the signature envelope, and the credential
//! orchestrator. Issuance fails fast with the first error encountered;
//! verification aggregates non-fatal errors into
//! [`crate::credential::VerifyResult::errors`] and only returns early for
//! the fatal categories called out on each variant.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds produced by the disclosure engine, signature envelope, and
/// credential orchestrator.
#[derive(Error, Debug)]
pub enum Error {
    /// Base64url or disclosure JSON decoding failed.
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    /// `_sd_alg` (or an explicitly requested hash algorithm) is outside the
    /// closed set the registry supports.
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedHashAlgorithm(String),

    /// The JWT header's `alg` does not match the verification key's type,
    /// or names an algorithm the envelope does not implement.
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedSignatureAlgorithm(String),

    /// A claim path in the VCTM, or a disclosed claim name, uses a reserved
    /// key (`_sd`, `_sd_alg`, or `...`).
    #[error("forbidden claim name: {0}")]
    ForbiddenClaimName(String),

    /// A claim descriptor's final path step is a null (every-element) step
    /// but the addressed value is not an array.
    #[error("invalid array element path: {0}")]
    InvalidArrayElementPath(String),

    /// Appending a digest would duplicate an existing entry of the same
    /// `_sd` array.
    #[error("duplicate digest in _sd array")]
    DuplicateDigest,

    /// A disclosure's digest does not occur anywhere in the transformed
    /// tree's `_sd` arrays or array `...` sentinels.
    #[error("unbound disclosure: {0}")]
    UnboundDisclosure(String),

    /// A required claim (`vct`, a mandatory VCTM claim, `cnf`, ...) is
    /// absent.
    #[error("missing required claim: {0}")]
    MissingRequiredClaim(String),

    /// `exp`, `iat`, or `nbf` fall outside the permitted clock skew.
    #[error("time validation failed: {0}")]
    TimeValidation(String),

    /// A Key Binding JWT was presented but the credential carries no
    /// `cnf.jwk`.
    #[error("missing confirmation claim (cnf.jwk)")]
    MissingConfirmation,

    /// Key Binding JWT signature, `typ`, `nonce`, `aud`, or `sd_hash`
    /// mismatch.
    #[error("key binding failure: {0}")]
    KeyBindingFailure(String),

    /// A configured trust evaluator returned "not trusted" for the
    /// presented certificate chain.
    #[error("trust evaluator rejected issuer: {0}")]
    TrustRejected(String),

    /// The CSPRNG failed to produce random bytes.
    #[error("random source failure: {0}")]
    RandomFailure(String),

    /// Catch-all for malformed VCTM documents, invalid claim trees, and
    /// other structural problems that do not fit a more specific kind.
    #[error("invalid structure: {0}")]
    InvalidStructure(String),
}
