//! # Signature Envelope
//!
//! Compact JWT signing and verification over the closed algorithm set
//! `ES256`, `ES384`, `ES512`, `RS256`, `RS384`, `RS512`, plus the two
//! `typ` header values this crate produces (`dc+sd-jwt` / legacy
//! `vc+sd-jwt` for the issued credential, `kb+jwt` for key binding).
//!
//! Keys are opaque to callers beyond this module: a [`SigningKey`] or
//! [`VerifyingKey`] wraps a concrete RustCrypto key type, and the crate
//! never reads PEM, PKCS#8, or any other file-based key encoding — that
//! is a host concern.

use ecdsa::signature::{Signer as _, Verifier as _};
use elliptic_curve::sec1::FromEncodedPoint;
use p256::ecdsa::{Signature as P256Signature, SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p384::ecdsa::{Signature as P384Signature, SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey};
use p521::ecdsa::{Signature as P521Signature, SigningKey as P521SigningKey, VerifyingKey as P521VerifyingKey};
use rsa::pkcs1v15::{Signature as RsaSignature, SigningKey as RsaSigningKey, VerifyingKey as RsaVerifyingKey};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Sha256, Sha384, Sha512};

use crate::codec;
use crate::error::{Error, Result};

/// The JWT `typ` header values this crate assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderType {
    /// `dc+sd-jwt`, the issued credential.
    SdJwt,
    /// `vc+sd-jwt`, accepted on verification for transition but never
    /// produced by [`sign`].
    SdJwtLegacy,
    /// `kb+jwt`, a key-binding proof.
    KbJwt,
}

impl HeaderType {
    /// Returns the header string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SdJwt => "dc+sd-jwt",
            Self::SdJwtLegacy => "vc+sd-jwt",
            Self::KbJwt => "kb+jwt",
        }
    }

    /// Parses a `typ` header value, accepting both the current and
    /// legacy credential type strings.
    #[must_use]
    pub fn from_str(typ: &str) -> Option<Self> {
        match typ {
            "dc+sd-jwt" => Some(Self::SdJwt),
            "vc+sd-jwt" => Some(Self::SdJwtLegacy),
            "kb+jwt" => Some(Self::KbJwt),
            _ => None,
        }
    }
}

/// A JWS/JWT signature algorithm from the closed set this crate
/// implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// ECDSA over P-256 with SHA-256.
    Es256,
    /// ECDSA over P-384 with SHA-384.
    Es384,
    /// ECDSA over P-521 with SHA-512.
    Es512,
    /// RSASSA-PKCS1-v1_5 with SHA-256, modulus < 3072 bits.
    Rs256,
    /// RSASSA-PKCS1-v1_5 with SHA-384, modulus 3072..4096 bits.
    Rs384,
    /// RSASSA-PKCS1-v1_5 with SHA-512, modulus >= 4096 bits.
    Rs512,
}

impl Algorithm {
    /// Returns the JWA `alg` name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Es256 => "ES256",
            Self::Es384 => "ES384",
            Self::Es512 => "ES512",
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
        }
    }

    /// Resolves an [`Algorithm`] from its JWA `alg` name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedSignatureAlgorithm`] if `name` is
    /// outside the closed set (this notably rejects `none`).
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "ES256" => Ok(Self::Es256),
            "ES384" => Ok(Self::Es384),
            "ES512" => Ok(Self::Es512),
            "RS256" => Ok(Self::Rs256),
            "RS384" => Ok(Self::Rs384),
            "RS512" => Ok(Self::Rs512),
            other => Err(Error::UnsupportedSignatureAlgorithm(format!("{other} (or \"none\")"))),
        }
    }

    const fn is_rsa(self) -> bool {
        matches!(self, Self::Rs256 | Self::Rs384 | Self::Rs512)
    }
}

/// A private signing key, opaque to callers beyond its algorithm.
///
/// The RSA variant caches the algorithm chosen for it at construction
/// time, derived from the modulus size per §4.3's table: < 3072 bits
/// signs `RS256`, 3072..4096 signs `RS384`, >= 4096 signs `RS512`.
#[derive(Debug, Clone)]
pub enum SigningKey {
    /// EC key on the P-256 curve; signs `ES256`.
    P256(Box<P256SigningKey>),
    /// EC key on the P-384 curve; signs `ES384`.
    P384(Box<P384SigningKey>),
    /// EC key on the P-521 curve; signs `ES512`.
    P521(Box<P521SigningKey>),
    /// RSA key; signs `RS256`/`RS384`/`RS512` depending on modulus size.
    Rsa(Box<RsaPrivateKey>, Algorithm),
}

impl SigningKey {
    /// Wraps an RSA private key, selecting its signing algorithm from
    /// its modulus size.
    #[must_use]
    pub fn from_rsa(key: RsaPrivateKey) -> Self {
        let alg = rsa_algorithm_for_bits(key.size() * 8);
        Self::Rsa(Box::new(key), alg)
    }

    /// The algorithm this key signs with.
    ///
    /// Best-effort: a key type this envelope does not recognize would
    /// default to `ES256` in the reference design, but this enum is
    /// closed to the four supported key families, so every value here
    /// resolves unambiguously.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        match self {
            Self::P256(_) => Algorithm::Es256,
            Self::P384(_) => Algorithm::Es384,
            Self::P521(_) => Algorithm::Es512,
            Self::Rsa(_, alg) => *alg,
        }
    }

    fn sign_bytes(&self, signing_input: &[u8]) -> Vec<u8> {
        match self {
            Self::P256(key) => {
                let sig: P256Signature = key.sign(signing_input);
                sig.to_bytes().to_vec()
            }
            Self::P384(key) => {
                let sig: P384Signature = key.sign(signing_input);
                sig.to_bytes().to_vec()
            }
            Self::P521(key) => {
                let sig: P521Signature = key.sign(signing_input);
                sig.to_bytes().to_vec()
            }
            Self::Rsa(key, alg) => match alg {
                Algorithm::Rs256 => {
                    let signer = RsaSigningKey::<Sha256>::new((**key).clone());
                    signer.sign(signing_input).to_vec()
                }
                Algorithm::Rs384 => {
                    let signer = RsaSigningKey::<Sha384>::new((**key).clone());
                    signer.sign(signing_input).to_vec()
                }
                Algorithm::Rs512 => {
                    let signer = RsaSigningKey::<Sha512>::new((**key).clone());
                    signer.sign(signing_input).to_vec()
                }
                _ => unreachable!("SigningKey::Rsa only ever carries an RSA algorithm"),
            },
        }
    }
}

fn jwk_str<'a>(jwk: &'a Map<String, Value>, member: &str) -> Result<&'a str> {
    jwk.get(member)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidStructure(format!("jwk missing {member}")))
}

fn jwk_coordinate(jwk: &Map<String, Value>, member: &str) -> Result<Vec<u8>> {
    codec::decode(jwk_str(jwk, member)?)
}

fn rsa_algorithm_for_bits(bits: usize) -> Algorithm {
    if bits < 3072 {
        Algorithm::Rs256
    } else if bits < 4096 {
        Algorithm::Rs384
    } else {
        Algorithm::Rs512
    }
}

/// A public verification key, opaque to callers beyond its key family.
#[derive(Debug, Clone)]
pub enum VerifyingKey {
    /// EC key on the P-256 curve; verifies `ES256`.
    P256(Box<P256VerifyingKey>),
    /// EC key on the P-384 curve; verifies `ES384`.
    P384(Box<P384VerifyingKey>),
    /// EC key on the P-521 curve; verifies `ES512`.
    P521(Box<P521VerifyingKey>),
    /// RSA key; verifies `RS256`/`RS384`/`RS512`.
    Rsa(Box<RsaPublicKey>),
}

impl VerifyingKey {
    /// Checks whether `alg` is consistent with this key's family: an EC
    /// key requires the algorithm naming its exact curve, an RSA key
    /// accepts any of `RS256`/`RS384`/`RS512`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedSignatureAlgorithm`] on mismatch
    /// (e.g. an `RS256` header over an EC key).
    pub fn require_matching_algorithm(&self, alg: Algorithm) -> Result<()> {
        let matches = match self {
            Self::P256(_) => alg == Algorithm::Es256,
            Self::P384(_) => alg == Algorithm::Es384,
            Self::P521(_) => alg == Algorithm::Es512,
            Self::Rsa(_) => alg.is_rsa(),
        };
        if matches {
            Ok(())
        } else {
            Err(Error::UnsupportedSignatureAlgorithm(format!(
                "header alg {} does not match verification key type",
                alg.name()
            )))
        }
    }

    /// Builds a [`VerifyingKey`] from a JSON Web Key, as carried in a
    /// credential's `cnf.jwk` confirmation claim.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStructure`] if `jwk` is missing required
    /// members, names an unsupported `kty`/`crv`, or encodes a point
    /// that is not on the named curve.
    pub fn from_jwk(jwk: &Value) -> Result<Self> {
        let jwk = jwk.as_object().ok_or_else(|| Error::InvalidStructure("jwk must be a JSON object".to_string()))?;
        let kty = jwk_str(jwk, "kty")?;
        match kty {
            "EC" => {
                let crv = jwk_str(jwk, "crv")?;
                let x = jwk_coordinate(jwk, "x")?;
                let y = jwk_coordinate(jwk, "y")?;
                match crv {
                    "P-256" => {
                        let point = p256::EncodedPoint::from_affine_coordinates(
                            p256::FieldBytes::from_slice(&x),
                            p256::FieldBytes::from_slice(&y),
                            false,
                        );
                        let public = Option::<p256::PublicKey>::from(p256::PublicKey::from_encoded_point(&point))
                            .ok_or_else(|| Error::InvalidStructure("EC point not on P-256".to_string()))?;
                        Ok(Self::P256(Box::new(P256VerifyingKey::from(public))))
                    }
                    "P-384" => {
                        let point = p384::EncodedPoint::from_affine_coordinates(
                            p384::FieldBytes::from_slice(&x),
                            p384::FieldBytes::from_slice(&y),
                            false,
                        );
                        let public = Option::<p384::PublicKey>::from(p384::PublicKey::from_encoded_point(&point))
                            .ok_or_else(|| Error::InvalidStructure("EC point not on P-384".to_string()))?;
                        Ok(Self::P384(Box::new(P384VerifyingKey::from(public))))
                    }
                    "P-521" => {
                        let point = p521::EncodedPoint::from_affine_coordinates(
                            p521::FieldBytes::from_slice(&x),
                            p521::FieldBytes::from_slice(&y),
                            false,
                        );
                        let public = Option::<p521::PublicKey>::from(p521::PublicKey::from_encoded_point(&point))
                            .ok_or_else(|| Error::InvalidStructure("EC point not on P-521".to_string()))?;
                        Ok(Self::P521(Box::new(P521VerifyingKey::from(public))))
                    }
                    other => Err(Error::InvalidStructure(format!("unsupported EC curve: {other}"))),
                }
            }
            "RSA" => {
                let n = BigUint::from_bytes_be(&jwk_coordinate(jwk, "n")?);
                let e = BigUint::from_bytes_be(&jwk_coordinate(jwk, "e")?);
                let key = RsaPublicKey::new(n, e)
                    .map_err(|e| Error::InvalidStructure(format!("invalid RSA public key: {e}")))?;
                Ok(Self::Rsa(Box::new(key)))
            }
            other => Err(Error::InvalidStructure(format!("unsupported jwk kty: {other}"))),
        }
    }

    fn verify_bytes(&self, signing_input: &[u8], signature: &[u8], alg: Algorithm) -> Result<()> {
        let bad_sig = || Error::UnsupportedSignatureAlgorithm("signature verification failed".to_string());
        match self {
            Self::P256(key) => {
                let sig = P256Signature::from_slice(signature).map_err(|_| bad_sig())?;
                key.verify(signing_input, &sig).map_err(|_| bad_sig())
            }
            Self::P384(key) => {
                let sig = P384Signature::from_slice(signature).map_err(|_| bad_sig())?;
                key.verify(signing_input, &sig).map_err(|_| bad_sig())
            }
            Self::P521(key) => {
                let sig = P521Signature::from_slice(signature).map_err(|_| bad_sig())?;
                key.verify(signing_input, &sig).map_err(|_| bad_sig())
            }
            Self::Rsa(key) => {
                let sig = RsaSignature::try_from(signature).map_err(|_| bad_sig())?;
                match alg {
                    Algorithm::Rs256 => RsaVerifyingKey::<Sha256>::new((**key).clone())
                        .verify(signing_input, &sig)
                        .map_err(|_| bad_sig()),
                    Algorithm::Rs384 => RsaVerifyingKey::<Sha384>::new((**key).clone())
                        .verify(signing_input, &sig)
                        .map_err(|_| bad_sig()),
                    Algorithm::Rs512 => RsaVerifyingKey::<Sha512>::new((**key).clone())
                        .verify(signing_input, &sig)
                        .map_err(|_| bad_sig()),
                    _ => unreachable!("require_matching_algorithm already ruled out EC algs for an RSA key"),
                }
            }
        }
    }
}

/// Signs `payload` as a compact JWS, merging `extra_header` on top of
/// the `alg`/`typ` (and `kid`, if given) this function sets.
///
/// Caller-supplied `alg` or `kid` entries in `extra_header` win over the
/// defaults this function would otherwise set, per §4.3's header
/// merging rule.
///
/// # Errors
///
/// Returns [`Error::InvalidStructure`] if `payload` cannot be
/// serialized.
pub fn sign<T: Serialize>(
    key: &SigningKey,
    typ: HeaderType,
    kid: Option<&str>,
    mut extra_header: Map<String, Value>,
    payload: &T,
) -> Result<String> {
    extra_header.entry("alg").or_insert_with(|| Value::from(key.algorithm().name()));
    extra_header.entry("typ").or_insert_with(|| Value::from(typ.as_str()));
    if let Some(kid) = kid {
        extra_header.entry("kid").or_insert_with(|| Value::from(kid));
    }

    let header_bytes = codec::canonical_json(&extra_header)?;
    let payload_bytes = codec::canonical_json(payload)?;
    let signing_input = format!("{}.{}", codec::encode(&header_bytes), codec::encode(&payload_bytes));
    let signature = key.sign_bytes(signing_input.as_bytes());

    Ok(format!("{signing_input}.{}", codec::encode(&signature)))
}

/// A parsed, signature-verified compact JWS: header map and raw payload
/// bytes (left undeserialized so the caller can parse into whichever
/// claims type applies).
pub struct Verified {
    /// The JOSE header.
    pub header: Map<String, Value>,
    /// The raw (decoded) payload bytes.
    pub payload: Vec<u8>,
}

/// Parses and verifies a compact JWS (`header.payload.signature`)
/// against `key`.
///
/// # Errors
///
/// - [`Error::MalformedEncoding`] if the input is not three
///   base64url-separated-by-dots segments, or either segment fails to
///   decode.
/// - [`Error::UnsupportedSignatureAlgorithm`] if the header's `alg` is
///   outside the closed set (this rejects `none`), or does not match
///   `key`'s family.
pub fn verify(jws: &str, key: &VerifyingKey) -> Result<Verified> {
    let mut parts = jws.splitn(3, '.');
    let (Some(header_b64), Some(payload_b64), Some(sig_b64)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(Error::MalformedEncoding("JWS must have three dot-separated segments".to_string()));
    };

    let header_bytes = codec::decode(header_b64)?;
    let header: Map<String, Value> = serde_json::from_slice(&header_bytes)
        .map_err(|e| Error::MalformedEncoding(format!("invalid JWS header JSON: {e}")))?;

    let alg_name = header
        .get("alg")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::UnsupportedSignatureAlgorithm("missing alg header".to_string()))?;
    let alg = Algorithm::from_name(alg_name)?;
    key.require_matching_algorithm(alg)?;

    let signature = codec::decode(sig_b64)?;
    let signing_input = format!("{header_b64}.{payload_b64}");
    key.verify_bytes(signing_input.as_bytes(), &signature, alg)?;

    let payload = codec::decode(payload_b64)?;
    Ok(Verified { header, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use elliptic_curve::sec1::ToEncodedPoint;
    use serde_json::json;

    fn p256_pair() -> (SigningKey, VerifyingKey) {
        let sk = P256SigningKey::random(&mut rand_core::OsRng);
        let vk = *sk.verifying_key();
        (SigningKey::P256(Box::new(sk)), VerifyingKey::P256(Box::new(vk)))
    }

    #[test]
    fn signs_and_verifies_es256() {
        let (sk, vk) = p256_pair();
        let jws = sign(&sk, HeaderType::SdJwt, Some("key-1"), Map::new(), &json!({"a": 1})).unwrap();
        let verified = verify(&jws, &vk).unwrap();
        assert_eq!(verified.header.get("alg").unwrap(), "ES256");
        assert_eq!(verified.header.get("kid").unwrap(), "key-1");
        assert_eq!(verified.payload, codec::canonical_json(&json!({"a": 1})).unwrap());
    }

    #[test]
    fn rejects_alg_key_mismatch() {
        let (sk, _) = p256_pair();
        let jws = sign(&sk, HeaderType::SdJwt, None, Map::new(), &json!({})).unwrap();
        let rsa_key = RsaPrivateKey::new(&mut rand_core::OsRng, 2048).unwrap();
        let vk = VerifyingKey::Rsa(Box::new(rsa_key.to_public_key()));
        assert!(matches!(verify(&jws, &vk), Err(Error::UnsupportedSignatureAlgorithm(_))));
    }

    #[test]
    fn caller_header_overrides_default_kid() {
        let (sk, vk) = p256_pair();
        let mut header = Map::new();
        header.insert("kid".to_string(), Value::from("explicit-kid"));
        let jws = sign(&sk, HeaderType::SdJwt, Some("default-kid"), header, &json!({})).unwrap();
        let verified = verify(&jws, &vk).unwrap();
        assert_eq!(verified.header.get("kid").unwrap(), "explicit-kid");
    }

    #[test]
    fn rejects_none_algorithm() {
        assert!(matches!(Algorithm::from_name("none"), Err(Error::UnsupportedSignatureAlgorithm(_))));
    }

    #[test]
    fn rsa_modulus_selects_algorithm() {
        assert_eq!(rsa_algorithm_for_bits(2048).name(), "RS256");
        assert_eq!(rsa_algorithm_for_bits(3072).name(), "RS384");
        assert_eq!(rsa_algorithm_for_bits(4096).name(), "RS512");
    }

    #[test]
    fn builds_verifying_key_from_jwk() {
        let sk = P256SigningKey::random(&mut rand_core::OsRng);
        let point = sk.verifying_key().to_encoded_point(false);
        let jwk = json!({
            "kty": "EC",
            "crv": "P-256",
            "x": codec::encode(point.x().unwrap()),
            "y": codec::encode(point.y().unwrap()),
        });
        let vk = VerifyingKey::from_jwk(&jwk).unwrap();
        let signing_key = SigningKey::P256(Box::new(sk));
        let jws = sign(&signing_key, HeaderType::KbJwt, None, Map::new(), &json!({"nonce": "n"})).unwrap();
        assert!(verify(&jws, &vk).is_ok());
    }
}
