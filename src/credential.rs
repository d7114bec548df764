//! # Credential Orchestrator
//!
//! Ties the signature envelope, disclosure engine, and type metadata
//! model together into the two operations a caller actually wants: turn
//! a claim set into a signed, selectively disclosable credential
//! ([`build_credential`]), and turn a presented credential back into
//! verified plaintext claims ([`parse_and_verify`]).
//!
//! The combined-format string this module produces and consumes is
//! `<JWT>~<Disclosure1>~...~<DisclosureN>~[<KB-JWT>]`: a trailing `~`
//! with nothing after it (or no `~` at all when there are zero
//! disclosures) marks the absence of a Key Binding JWT; a non-empty
//! segment after the last `~` is always the Key Binding JWT. This is a
//! structural rule, not a guess about what the final segment looks
//! like, so it never has to distinguish "a disclosure that happens to
//! look like a JWT" from "a Key Binding JWT".

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::codec;
use crate::disclosure::{self, Disclosure};
use crate::error::{Error, Result};
use crate::hash::HashAlg;
use crate::jws::{self, HeaderType, SigningKey, VerifyingKey};
use crate::vctm::{SdPolicy, Step, TypeMetadata, TypeResolver, flatten_claims};

/// Claims carried by a Key Binding JWT's payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbJwtClaims {
    /// The verifier-supplied nonce this proof answers.
    pub nonce: String,
    /// The intended audience (verifier identifier).
    pub aud: String,
    /// Issuance time, seconds since the epoch.
    pub iat: i64,
    /// Digest of the SD-JWT presentation (the JWT plus every disclosure
    /// the holder is presenting, up to and including the `~`
    /// immediately preceding the Key Binding JWT) this proof covers.
    pub sd_hash: String,
}

/// Everything [`build_credential`] needs beyond the signing key itself.
pub struct IssuanceRequest<'a> {
    /// The credential type URI.
    pub vct: String,
    /// The issuer identifier.
    pub issuer: String,
    /// The claim payload beyond the registered claims this function
    /// injects (`iss`, `vct`, `jti`, `nbf`, `exp`, `cnf`).
    pub claims: Map<String, Value>,
    /// The holder's public key, as a JSON Web Key, bound into `cnf.jwk`
    /// so a later presentation can carry a Key Binding JWT.
    pub holder_jwk: Value,
    /// The resolved `extends` chain for `vct`, most-specific document
    /// first. Drives the disclosure descriptor list and is embedded,
    /// one entry per document, in the JWT's `vctm` header.
    pub type_metadata: &'a [TypeMetadata],
    /// Issuance time, used to compute `nbf` and, with `validity_days`,
    /// `exp`.
    pub now: DateTime<Utc>,
    /// Credential validity period in days.
    pub validity_days: u32,
    /// Decoy digests added to every container the disclosure engine
    /// touches.
    pub decoy_digests: u32,
}

/// The result of [`build_credential`].
pub struct IssuedCredential {
    /// The combined-format credential: `<JWT>~<Disclosure1>~...~`.
    pub compact: String,
    /// Every disclosure produced, for the issuer to hand the holder
    /// out-of-band (the holder chooses which to present later).
    pub disclosures: Vec<Disclosure>,
}

/// Builds and signs a selectively disclosable credential.
///
/// Issuance always hashes disclosures with `sha-256`; a verifier
/// willing to accept a different algorithm reads it from `_sd_alg` on
/// whatever credential is actually presented to it, but this function
/// does not offer a choice, matching the fixed algorithm the issuance
/// pipeline specifies.
///
/// # Errors
///
/// Propagates any [`crate::disclosure::issue`] or [`jws::sign`] error.
pub fn build_credential(
    request: IssuanceRequest<'_>,
    key_id: &str,
    signing_key: &SigningKey,
) -> Result<IssuedCredential> {
    let descriptors = flatten_claims(request.type_metadata);

    let mut claims = request.claims;
    claims.insert("iss".to_string(), Value::String(request.issuer));
    claims.insert("vct".to_string(), Value::String(request.vct));
    claims.insert("jti".to_string(), Value::String(Uuid::new_v4().to_string()));
    claims.insert("nbf".to_string(), Value::from(request.now.timestamp()));
    let expires_at = request.now + Duration::days(i64::from(request.validity_days));
    claims.insert("exp".to_string(), Value::from(expires_at.timestamp()));
    claims.insert("cnf".to_string(), json!({"jwk": request.holder_jwk}));

    let issuance = disclosure::issue(
        Value::Object(claims),
        &descriptors,
        HashAlg::Sha256,
        request.decoy_digests as usize,
    )?;

    let mut header = Map::new();
    header.insert("vctm".to_string(), encode_vctm_header(request.type_metadata)?);
    let jwt = jws::sign(signing_key, HeaderType::SdJwt, Some(key_id), header, &issuance.claims)?;

    let mut compact = jwt;
    compact.push('~');
    for disclosure in &issuance.disclosures {
        compact.push_str(&disclosure.encoded()?);
        compact.push('~');
    }

    tracing::debug!(
        vct = %request.vct,
        disclosures = issuance.disclosures.len(),
        "issued credential"
    );
    Ok(IssuedCredential { compact, disclosures: issuance.disclosures })
}

fn encode_vctm_header(chain: &[TypeMetadata]) -> Result<Value> {
    let mut entries = Vec::with_capacity(chain.len());
    for doc in chain {
        let bytes = codec::canonical_json(doc)?;
        entries.push(Value::String(codec::encode(&bytes)));
    }
    Ok(Value::Array(entries))
}

/// Decodes the `vctm` header entry, tolerating any shape the
/// specification allows (an array of base64url-encoded documents, a
/// single base64url-encoded document, or an inline JSON object). A
/// malformed `vctm` header is not a verification failure: the VCTM is
/// informational unless an upper layer enforces it.
#[must_use]
pub fn decode_vctm_header(header: &Map<String, Value>) -> Option<Vec<TypeMetadata>> {
    let decode_one = |value: &Value| -> Option<TypeMetadata> {
        match value {
            Value::String(encoded) => {
                let bytes = codec::decode(encoded).ok()?;
                serde_json::from_slice(&bytes).ok()
            }
            Value::Object(_) => serde_json::from_value(value.clone()).ok(),
            _ => None,
        }
    };

    match header.get("vctm")? {
        Value::Array(entries) => entries.iter().map(decode_one).collect(),
        single @ (Value::String(_) | Value::Object(_)) => decode_one(single).map(|doc| vec![doc]),
        _ => None,
    }
}

/// Builds and signs a Key Binding JWT over `presentation`, the
/// combined-format string up to and including the trailing `~` after
/// the last disclosure the holder has chosen to present.
///
/// # Errors
///
/// Propagates any [`jws::sign`] error.
pub fn create_key_binding_jwt(
    signing_key: &SigningKey,
    kid: Option<&str>,
    presentation: &str,
    nonce: &str,
    audience: &str,
    hash_alg: HashAlg,
    now: DateTime<Utc>,
) -> Result<String> {
    let claims = KbJwtClaims {
        nonce: nonce.to_string(),
        aud: audience.to_string(),
        iat: now.timestamp(),
        sd_hash: hash_alg.encoded_digest(presentation.as_bytes()),
    };
    jws::sign(signing_key, HeaderType::KbJwt, kid, Map::new(), &claims)
}

/// Evaluates whether an issuer is trusted. A key-provider concern:
/// certificate-chain parsing and leaf-key extraction happen outside
/// this crate (see the crate's Non-goals); `verifying_key` in
/// [`VerifyOptions`] is expected to already be the key the caller's own
/// x5c (or other PKI) evaluation selected, and this trait exists only
/// so the verification pipeline can record whether that selection was
/// actually trusted.
pub trait TrustEvaluator {
    /// Returns whether the issuer presenting `header` is trusted.
    ///
    /// # Errors
    ///
    /// Implementations may return an error (rather than `Ok(false)`) if
    /// evaluating trust itself fails, e.g. a certificate chain that
    /// fails to parse.
    fn is_trusted(&self, header: &Map<String, Value>) -> Result<bool>;
}

/// Options controlling [`parse_and_verify`].
///
/// `require_key_binding`, `expected_nonce`, and `expected_audience` are
/// three independent knobs, not one bundled requirement: a verifier can
/// demand a Key Binding JWT's mere presence without checking its nonce
/// or audience, can check a nonce/audience only if a KB-JWT happens to
/// be presented without making it mandatory, or any combination of the
/// three. `expected_nonce`/`expected_audience` are checked whenever a
/// KB-JWT is present, regardless of `require_key_binding`; only the
/// absence of a KB-JWT is conditioned on `require_key_binding`.
pub struct VerifyOptions<'a> {
    /// The issuer's verification key.
    pub verifying_key: &'a VerifyingKey,
    /// If set, the reconstructed `iss` claim must match exactly.
    pub expected_issuer: Option<&'a str>,
    /// Resolves `vct` to its type metadata document, used to check
    /// mandatory claims. Skipped entirely if `None`.
    pub type_resolver: Option<&'a dyn TypeResolver>,
    /// Evaluates issuer trust from the JWT header. Skipped entirely if
    /// `None`.
    pub trust_evaluator: Option<&'a dyn TrustEvaluator>,
    /// Whether a Key Binding JWT must be present at all.
    pub require_key_binding: bool,
    /// If set, a presented Key Binding JWT's `nonce` must match exactly.
    pub expected_nonce: Option<&'a str>,
    /// If set, a presented Key Binding JWT's `aud` must match exactly.
    pub expected_audience: Option<&'a str>,
    /// Whether to enforce `exp`/`nbf` at all.
    pub validate_time: bool,
    /// Permitted clock skew for `nbf`/`exp` comparisons.
    pub allowed_clock_skew: Duration,
    /// The verifier's current time.
    pub now: DateTime<Utc>,
}

/// The outcome of [`parse_and_verify`].
pub struct VerifyResult {
    /// `true` iff `errors` is empty.
    pub valid: bool,
    /// The JWT's JOSE header.
    pub header: Map<String, Value>,
    /// The fully reconstructed plaintext claim tree.
    pub claims: Value,
    /// The subset of `claims` the holder actually chose to disclose
    /// (object-member disclosures only; an array-element disclosure
    /// carries no claim name, so it cannot appear here even though its
    /// values are present in `claims`).
    pub disclosed_claims: Map<String, Value>,
    /// The raw disclosure strings as presented, in presentation order.
    pub disclosures: Vec<String>,
    /// The decoded `vctm` header chain, if present and well-formed.
    pub vctm: Option<Vec<TypeMetadata>>,
    /// Whether a Key Binding JWT was presented and verified.
    pub key_binding_valid: bool,
    /// The Key Binding JWT's claims, if one was presented and verified.
    pub key_binding_claims: Option<KbJwtClaims>,
    /// Every problem found. Non-empty does not necessarily mean every
    /// check was fatal; the pipeline only returns `Err` for the fatal
    /// categories (signature, trust rejection, structural parse
    /// failure).
    pub errors: Vec<Error>,
}

/// Parses and verifies a presented credential.
///
/// Signature verification, the JWT payload's own structural parsing,
/// and digest uniqueness are fatal: they return `Err` immediately, since
/// no meaningful claim tree exists without them. Everything else
/// (a malformed disclosure, issuer mismatch, time validation, missing
/// mandatory claims, unbound disclosures, key binding failure) is
/// collected into [`VerifyResult::errors`] so a caller can see the
/// complete picture of what, if anything, is wrong with an otherwise
/// well-formed presentation. Per §4.6.2 step 6, a disclosure that fails
/// to parse is one such non-fatal problem: it is recorded as an
/// [`Error::MalformedEncoding`] entry in `errors` and dropped from the
/// disclosure set the rest of the pipeline reconstructs against, rather
/// than aborting the whole call.
///
/// # Errors
///
/// - [`Error::MalformedEncoding`] if the combined format cannot be
///   split, or the JWT itself does not decode.
/// - [`Error::UnsupportedSignatureAlgorithm`] if the JWT's signature
///   does not verify.
/// - [`Error::DuplicateDigest`] if two presented disclosures collide.
/// - [`Error::TrustRejected`] if a configured trust evaluator rejects
///   the issuer.
pub fn parse_and_verify(presentation: &str, options: &VerifyOptions<'_>) -> Result<VerifyResult> {
    let mut errors = Vec::new();
    let mut push_error = |error: Error| {
        tracing::warn!(%error, "sd-jwt vc verification problem");
        errors.push(error);
    };

    let (jwt_part, disclosure_strs, kb_jwt_part) = split_presentation(presentation)?;

    let verified = jws::verify(jwt_part, options.verifying_key)?;
    if let Some(trust_evaluator) = options.trust_evaluator {
        if !trust_evaluator.is_trusted(&verified.header)? {
            return Err(Error::TrustRejected("issuer not trusted".to_string()));
        }
    }

    let transformed: Value = serde_json::from_slice(&verified.payload)
        .map_err(|e| Error::InvalidStructure(format!("credential payload is not valid JSON: {e}")))?;

    let hash_alg = match transformed.get("_sd_alg").and_then(Value::as_str) {
        Some(name) => HashAlg::from_name(name)?,
        None => HashAlg::default(),
    };

    let mut disclosures = Vec::with_capacity(disclosure_strs.len());
    for s in &disclosure_strs {
        match Disclosure::decode(s) {
            Ok(disclosure) => disclosures.push(disclosure),
            Err(error) => push_error(error),
        }
    }

    let (reconstructed, used) = disclosure::reconstruct(transformed, &disclosures, hash_alg)?;
    tracing::debug!(
        vct = reconstructed.get("vct").and_then(Value::as_str).unwrap_or_default(),
        disclosures = disclosures.len(),
        "verifying credential"
    );
    for digest in disclosure::unbound_digests(&disclosures, hash_alg, &used)? {
        push_error(Error::UnboundDisclosure(digest));
    }

    if let Some(expected_issuer) = options.expected_issuer {
        match reconstructed.get("iss").and_then(Value::as_str) {
            Some(iss) if iss == expected_issuer => {}
            _ => push_error(Error::MissingRequiredClaim("iss".to_string())),
        }
    }
    if reconstructed.get("vct").and_then(Value::as_str).is_none() {
        push_error(Error::MissingRequiredClaim("vct".to_string()));
    }

    if options.validate_time {
        if let Err(error) = validate_times(&reconstructed, options.now, options.allowed_clock_skew) {
            push_error(error);
        }
    }

    if let Some(resolver) = options.type_resolver {
        match check_mandatory_claims(&reconstructed, resolver) {
            Ok(missing) => missing.into_iter().for_each(&mut push_error),
            Err(error) => push_error(error),
        }
    }

    let mut key_binding_valid = false;
    let mut key_binding_claims = None;
    match kb_jwt_part {
        Some(kb_jwt) => {
            match verify_key_binding(kb_jwt, jwt_part, &disclosure_strs, &reconstructed, options) {
                Ok(claims) => {
                    key_binding_valid = true;
                    key_binding_claims = Some(claims);
                }
                Err(error) => push_error(error),
            }
        }
        None => {
            if options.require_key_binding {
                push_error(Error::KeyBindingFailure(
                    "key binding required but no Key Binding JWT was presented".to_string(),
                ));
            }
        }
    }

    let mut disclosed_claims = Map::new();
    for disclosure in &disclosures {
        if let Some(name) = disclosure.claim_name() {
            disclosed_claims.insert(name.to_string(), disclosure.value().clone());
        }
    }

    let vctm = decode_vctm_header(&verified.header);
    let valid = errors.is_empty();
    Ok(VerifyResult {
        valid,
        header: verified.header,
        claims: reconstructed,
        disclosed_claims,
        disclosures: disclosure_strs.into_iter().map(str::to_string).collect(),
        vctm,
        key_binding_valid,
        key_binding_claims,
        errors,
    })
}

fn split_presentation(presentation: &str) -> Result<(&str, Vec<&str>, Option<&str>)> {
    if presentation.is_empty() {
        return Err(Error::MalformedEncoding("presentation must not be empty".to_string()));
    }
    let ends_with_tilde = presentation.ends_with('~');
    let mut segments: Vec<&str> = presentation.split('~').collect();
    if ends_with_tilde {
        segments.pop();
    }
    let Some((jwt, rest)) = segments.split_first() else {
        return Err(Error::MalformedEncoding("presentation must not be empty".to_string()));
    };
    if ends_with_tilde || rest.is_empty() {
        Ok((jwt, rest.to_vec(), None))
    } else {
        let (last, disclosures) = rest.split_last().expect("rest is non-empty");
        Ok((jwt, disclosures.to_vec(), Some(*last)))
    }
}

fn validate_times(claims: &Value, now: DateTime<Utc>, skew: Duration) -> Result<()> {
    if let Some(exp) = claims.get("exp").and_then(Value::as_i64) {
        let exp = DateTime::<Utc>::from_timestamp(exp, 0)
            .ok_or_else(|| Error::TimeValidation("exp is out of range".to_string()))?;
        if now > exp + skew {
            return Err(Error::TimeValidation("credential has expired".to_string()));
        }
    }
    if let Some(nbf) = claims.get("nbf").and_then(Value::as_i64) {
        let nbf = DateTime::<Utc>::from_timestamp(nbf, 0)
            .ok_or_else(|| Error::TimeValidation("nbf is out of range".to_string()))?;
        if now + skew < nbf {
            return Err(Error::TimeValidation("credential is not yet valid".to_string()));
        }
    }
    Ok(())
}

fn check_mandatory_claims(claims: &Value, resolver: &dyn TypeResolver) -> Result<Vec<Error>> {
    let Some(vct) = claims.get("vct").and_then(Value::as_str) else {
        return Ok(Vec::new());
    };
    let root = resolver.resolve(vct)?;
    let chain = crate::vctm::resolve_chain(&root, resolver)?;
    let descriptors = flatten_claims(&chain);

    let mut missing = Vec::new();
    for descriptor in &descriptors {
        if !descriptor.mandatory || matches!(descriptor.sd, SdPolicy::Never) {
            continue;
        }
        if !path_exists(claims, &descriptor.path) {
            missing.push(Error::MissingRequiredClaim(describe_path(&descriptor.path)));
        }
    }
    Ok(missing)
}

fn path_exists(value: &Value, path: &[Step]) -> bool {
    let mut current = value;
    for step in path {
        match step {
            Step::Key(key) => {
                let Some(next) = current.as_object().and_then(|o| o.get(key)) else { return false };
                current = next;
            }
            Step::EveryElement => return current.as_array().is_some_and(|a| !a.is_empty()),
        }
    }
    true
}

fn describe_path(path: &[Step]) -> String {
    path.iter()
        .map(|step| match step {
            Step::Key(key) => key.clone(),
            Step::EveryElement => "*".to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn verify_key_binding(
    kb_jwt: &str,
    jwt_part: &str,
    disclosure_strs: &[&str],
    reconstructed: &Value,
    options: &VerifyOptions<'_>,
) -> Result<KbJwtClaims> {
    let jwk = reconstructed.get("cnf").and_then(|cnf| cnf.get("jwk")).ok_or(Error::MissingConfirmation)?;
    let holder_key = VerifyingKey::from_jwk(jwk)?;

    let verified = jws::verify(kb_jwt, &holder_key)?;
    if verified.header.get("typ").and_then(Value::as_str) != Some(HeaderType::KbJwt.as_str()) {
        return Err(Error::KeyBindingFailure("Key Binding JWT typ header mismatch".to_string()));
    }

    let claims: KbJwtClaims = serde_json::from_slice(&verified.payload)
        .map_err(|e| Error::KeyBindingFailure(format!("invalid Key Binding JWT claims: {e}")))?;

    if let Some(expected_nonce) = options.expected_nonce {
        if claims.nonce != expected_nonce {
            return Err(Error::KeyBindingFailure("nonce does not match".to_string()));
        }
    }
    if let Some(expected_audience) = options.expected_audience {
        if claims.aud != expected_audience {
            return Err(Error::KeyBindingFailure("audience does not match".to_string()));
        }
    }

    let hash_alg = match reconstructed.get("_sd_alg").and_then(Value::as_str) {
        Some(name) => HashAlg::from_name(name)?,
        None => HashAlg::default(),
    };
    let mut signed_portion = jwt_part.to_string();
    signed_portion.push('~');
    for disclosure in disclosure_strs {
        signed_portion.push_str(disclosure);
        signed_portion.push('~');
    }
    let expected = hash_alg.encoded_digest(signed_portion.as_bytes());
    if !codec::digests_equal(&expected, &claims.sd_hash) {
        return Err(Error::KeyBindingFailure(
            "sd_hash does not cover the presented JWT and disclosures".to_string(),
        ));
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vctm::ClaimMetadata;
    use elliptic_curve::sec1::ToEncodedPoint;
    use p256::ecdsa::SigningKey as P256SigningKey;
    use serde_json::json;

    fn key_pair() -> (SigningKey, VerifyingKey) {
        let sk = P256SigningKey::random(&mut rand_core::OsRng);
        let vk = *sk.verifying_key();
        (SigningKey::P256(Box::new(sk)), VerifyingKey::P256(Box::new(vk)))
    }

    fn holder_jwk(vk: &VerifyingKey) -> Value {
        let VerifyingKey::P256(key) = vk else { unreachable!() };
        let point = key.to_encoded_point(false);
        json!({
            "kty": "EC",
            "crv": "P-256",
            "x": codec::encode(point.x().unwrap()),
            "y": codec::encode(point.y().unwrap()),
        })
    }

    fn base_options<'a>(verifying_key: &'a VerifyingKey, now: DateTime<Utc>) -> VerifyOptions<'a> {
        VerifyOptions {
            verifying_key,
            expected_issuer: None,
            type_resolver: None,
            trust_evaluator: None,
            require_key_binding: false,
            expected_nonce: None,
            expected_audience: None,
            validate_time: true,
            allowed_clock_skew: Duration::minutes(1),
            now,
        }
    }

    fn type_metadata() -> TypeMetadata {
        TypeMetadata {
            vct: "https://example.com/id".to_string(),
            name: None,
            description: None,
            extends: None,
            extends_integrity: None,
            schema: None,
            display: vec![],
            claims: vec![ClaimMetadata {
                path: vec![Step::Key("given_name".to_string())],
                sd: SdPolicy::Allowed,
                mandatory: false,
                display: vec![],
            }],
        }
    }

    #[test]
    fn issues_and_verifies_a_credential_without_key_binding() {
        let (signing_key, verifying_key) = key_pair();
        let (_, holder_verifying_key) = key_pair();
        let mut claims = Map::new();
        claims.insert("given_name".to_string(), json!("Erika"));
        let type_metadata = type_metadata();
        let now = Utc::now();
        let request = IssuanceRequest {
            vct: "https://example.com/id".to_string(),
            issuer: "https://issuer.example".to_string(),
            claims,
            holder_jwk: holder_jwk(&holder_verifying_key),
            type_metadata: std::slice::from_ref(&type_metadata),
            now,
            validity_days: 365,
            decoy_digests: 0,
        };
        let issued = build_credential(request, "issuer-key-1", &signing_key).unwrap();

        let options = base_options(&verifying_key, now);
        let result = parse_and_verify(&issued.compact, &options).unwrap();
        assert!(result.valid);
        assert_eq!(result.claims.get("given_name").unwrap(), "Erika");
        assert_eq!(result.disclosed_claims.get("given_name").unwrap(), "Erika");
        assert!(result.vctm.is_some());
    }

    #[test]
    fn detects_tampered_signature() {
        let (signing_key, _) = key_pair();
        let (_, other_verifying_key) = key_pair();
        let (_, holder_verifying_key) = key_pair();
        let request = IssuanceRequest {
            vct: "https://example.com/id".to_string(),
            issuer: "https://issuer.example".to_string(),
            claims: Map::new(),
            holder_jwk: holder_jwk(&holder_verifying_key),
            type_metadata: &[],
            now: Utc::now(),
            validity_days: 365,
            decoy_digests: 0,
        };
        let issued = build_credential(request, "issuer-key-1", &signing_key).unwrap();
        let options = base_options(&other_verifying_key, Utc::now());
        assert!(parse_and_verify(&issued.compact, &options).is_err());
    }

    #[test]
    fn round_trips_key_binding() {
        let (signing_key, verifying_key) = key_pair();
        let (holder_signing_key, holder_verifying_key) = key_pair();
        let mut claims = Map::new();
        claims.insert("given_name".to_string(), json!("Erika"));
        let type_metadata = type_metadata();
        let now = Utc::now();
        let request = IssuanceRequest {
            vct: "https://example.com/id".to_string(),
            issuer: "https://issuer.example".to_string(),
            claims,
            holder_jwk: holder_jwk(&holder_verifying_key),
            type_metadata: std::slice::from_ref(&type_metadata),
            now,
            validity_days: 365,
            decoy_digests: 0,
        };
        let issued = build_credential(request, "issuer-key-1", &signing_key).unwrap();

        let kb_jwt = create_key_binding_jwt(
            &holder_signing_key,
            None,
            &issued.compact,
            "n-0S6_WzA2Mj",
            "https://verifier.example",
            HashAlg::Sha256,
            now,
        )
        .unwrap();
        let presentation = format!("{}{kb_jwt}", issued.compact);

        let mut options = base_options(&verifying_key, now);
        options.require_key_binding = true;
        options.expected_nonce = Some("n-0S6_WzA2Mj");
        options.expected_audience = Some("https://verifier.example");
        let result = parse_and_verify(&presentation, &options).unwrap();
        assert!(result.valid);
        assert!(result.key_binding_valid);
        assert_eq!(result.key_binding_claims.unwrap().nonce, "n-0S6_WzA2Mj");
    }

    #[test]
    fn time_validation_can_be_disabled() {
        let (signing_key, verifying_key) = key_pair();
        let (_, holder_verifying_key) = key_pair();
        let now = Utc::now();
        let request = IssuanceRequest {
            vct: "https://example.com/id".to_string(),
            issuer: "https://issuer.example".to_string(),
            claims: Map::new(),
            holder_jwk: holder_jwk(&holder_verifying_key),
            type_metadata: &[],
            now,
            validity_days: 0,
            decoy_digests: 0,
        };
        let issued = build_credential(request, "issuer-key-1", &signing_key).unwrap();

        let later = now + Duration::days(2);
        let mut strict = base_options(&verifying_key, later);
        let strict_result = parse_and_verify(&issued.compact, &strict).unwrap();
        assert!(!strict_result.valid);

        strict.validate_time = false;
        let lenient_result = parse_and_verify(&issued.compact, &strict).unwrap();
        assert!(lenient_result.valid);
    }

    #[test]
    fn split_presentation_detects_key_binding_jwt() {
        assert_eq!(split_presentation("jwt~d1~d2~").unwrap(), ("jwt", vec!["d1", "d2"], None));
        assert_eq!(split_presentation("jwt~d1~d2~kb").unwrap(), ("jwt", vec!["d1", "d2"], Some("kb")));
        assert_eq!(split_presentation("jwt").unwrap(), ("jwt", vec![], None));
        assert_eq!(split_presentation("jwt~kb").unwrap(), ("jwt", vec![], Some("kb")));
    }
}
