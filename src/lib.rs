//! Selective Disclosure JWTs for Verifiable Credentials (SD-JWT VC).
//!
//! This crate turns a plaintext claim set into a signed credential
//! whose claims a holder can individually reveal or withhold, and
//! turns a presented credential back into verified plaintext claims.
//!
//! # Feature Flags
//!
//! Both features are enabled by default.
//!
//! * `issuer` - Enables [`build_credential`] and [`create_key_binding_jwt`].
//! * `verifier` - Enables [`parse_and_verify`].
//!
//! # Module Overview
//!
//! - [`codec`]: base64url, canonical JSON, and the CSPRNG-backed salt
//!   and decoy sources everything else builds on.
//! - [`hash`]: the closed digest algorithm registry used for `_sd_alg`.
//! - [`jws`]: the closed signature algorithm registry and compact
//!   JWT sign/verify functions.
//! - [`vctm`]: the credential type metadata model (claim descriptors,
//!   disclosure policy, `extends` resolution).
//! - [`disclosure`]: the disclosure engine itself — concealing a claim
//!   tree into its selectively disclosable form and reconstructing it
//!   back from a holder's chosen disclosures.
//! - [`credential`]: the orchestrator tying the above into
//!   [`build_credential`] and [`parse_and_verify`].

pub mod codec;
pub mod error;
pub mod hash;
pub mod jws;
pub mod vctm;

pub mod disclosure;

#[cfg(any(feature = "issuer", feature = "verifier"))]
pub mod credential;

pub use error::{Error, Result};

#[cfg(feature = "issuer")]
pub use credential::{build_credential, create_key_binding_jwt};

#[cfg(feature = "verifier")]
pub use credential::parse_and_verify;
