//! # Disclosure Engine
//!
//! Transforms a plaintext claim tree into its selectively disclosable
//! form at issuance ([`issue`]), and reassembles a plaintext claim tree
//! from a transformed tree plus the disclosures a holder chose to
//! present ([`reconstruct`]).
//!
//! A claim path's final step determines what kind of disclosure it
//! produces: a [`Step::Key`] conceals one object member (a three-element
//! disclosure: salt, claim name, value); a [`Step::EveryElement`]
//! conceals every element of an array (a two-element disclosure: salt,
//! value, one per element). A [`Step::EveryElement`] may only appear as
//! a path's final step — concealing a claim nested inside every element
//! of an array is out of scope for this engine, and [`issue`] rejects
//! such a descriptor with [`Error::InvalidArrayElementPath`].

use std::collections::{HashMap, HashSet};

use serde_json::{Value, json};

use crate::codec;
use crate::error::{Error, Result};
use crate::hash::HashAlg;
use crate::vctm::{ClaimMetadata, RESERVED_CLAIM_NAMES, Step};

/// A single disclosure: the random salt, optional claim name (absent
/// for an array-element disclosure), and the concealed value.
#[derive(Debug, Clone, PartialEq)]
pub struct Disclosure {
    salt: String,
    claim_name: Option<String>,
    value: Value,
}

impl Disclosure {
    /// Builds a disclosure for an object member, generating a fresh
    /// salt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RandomFailure`] if the CSPRNG cannot supply a
    /// salt.
    pub fn new_object_member(claim_name: impl Into<String>, value: Value) -> Result<Self> {
        Ok(Self { salt: codec::random_salt()?, claim_name: Some(claim_name.into()), value })
    }

    /// Builds a disclosure for an array element, generating a fresh
    /// salt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RandomFailure`] if the CSPRNG cannot supply a
    /// salt.
    pub fn new_array_element(value: Value) -> Result<Self> {
        Ok(Self { salt: codec::random_salt()?, claim_name: None, value })
    }

    /// The claim name this disclosure reveals, `None` for an
    /// array-element disclosure.
    #[must_use]
    pub fn claim_name(&self) -> Option<&str> {
        self.claim_name.as_deref()
    }

    /// The concealed value.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    fn wire_form(&self) -> Value {
        match &self.claim_name {
            Some(name) => json!([self.salt, name, self.value]),
            None => json!([self.salt, self.value]),
        }
    }

    /// The base64url-encoded disclosure, as it appears in the `~`
    /// separated list after a compact SD-JWT.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStructure`] if the disclosure's value
    /// cannot be serialized (never happens for a [`Value`] tree).
    pub fn encoded(&self) -> Result<String> {
        Ok(codec::encode(&codec::canonical_json(&self.wire_form())?))
    }

    /// The base64url digest of this disclosure under `hash_alg`, as it
    /// appears in a `_sd` array or `...` sentinel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStructure`] if the disclosure's value
    /// cannot be serialized.
    pub fn digest(&self, hash_alg: HashAlg) -> Result<String> {
        Ok(hash_alg.encoded_digest(self.encoded()?.as_bytes()))
    }

    /// Parses a disclosure from its base64url encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedEncoding`] if the value does not
    /// decode to a two- or three-element JSON array of the expected
    /// shape.
    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = codec::decode(encoded)?;
        let parsed: Value = serde_json::from_slice(&bytes)
            .map_err(|e| Error::MalformedEncoding(format!("disclosure is not valid JSON: {e}")))?;
        let Value::Array(elements) = parsed else {
            return Err(Error::MalformedEncoding("disclosure must be a JSON array".to_string()));
        };
        match elements.as_slice() {
            [Value::String(salt), value] => {
                Ok(Self { salt: salt.clone(), claim_name: None, value: value.clone() })
            }
            [Value::String(salt), Value::String(name), value] => {
                Ok(Self { salt: salt.clone(), claim_name: Some(name.clone()), value: value.clone() })
            }
            _ => Err(Error::MalformedEncoding("disclosure array must have 2 or 3 elements".to_string())),
        }
    }
}

/// The result of transforming a plaintext claim tree into its
/// selectively disclosable form.
pub struct Issuance {
    /// The transformed claim tree, ready to become a signed payload.
    pub claims: Value,
    /// Every disclosure produced, in the order the issuer should offer
    /// them to a holder.
    pub disclosures: Vec<Disclosure>,
}

/// Transforms `claims` into its selectively disclosable form, driven by
/// `descriptors`. `decoys_per_container` decoy digests are added to
/// every object or array this pass touches.
///
/// Processing order is descriptors sorted by descending path length
/// (deepest first, ties broken by original order), so a descriptor
/// never tries to navigate into a container its own ancestor descriptor
/// has already concealed.
///
/// # Errors
///
/// - [`Error::InvalidStructure`] if `claims` is not a JSON object, or a
///   descriptor's path does not resolve to a container of the expected
///   kind.
/// - [`Error::ForbiddenClaimName`] if a descriptor names a reserved
///   claim.
/// - [`Error::InvalidArrayElementPath`] if a [`Step::EveryElement`]
///   appears anywhere but a path's final step, or the path resolves to
///   a non-array.
/// - [`Error::DuplicateDigest`] if two digests in the same `_sd` array
///   collide (a decoy colliding with a real digest, or with another
///   decoy).
/// - [`Error::RandomFailure`] if the CSPRNG cannot supply a salt or
///   decoy input.
pub fn issue(
    claims: Value,
    descriptors: &[ClaimMetadata],
    hash_alg: HashAlg,
    decoys_per_container: usize,
) -> Result<Issuance> {
    let Value::Object(_) = &claims else {
        return Err(Error::InvalidStructure("credential claims must be a JSON object".to_string()));
    };
    let mut root = claims;
    let mut disclosures = Vec::new();

    let mut ordered: Vec<&ClaimMetadata> =
        descriptors.iter().filter(|d| !matches!(d.sd, crate::vctm::SdPolicy::Never)).collect();
    ordered.sort_by(|a, b| b.path.len().cmp(&a.path.len()));

    for descriptor in ordered {
        conceal_one(&mut root, &descriptor.path, hash_alg, &mut disclosures)?;
    }

    add_decoys_and_finalize(&mut root, hash_alg, decoys_per_container)?;

    if !disclosures.is_empty() {
        if let Value::Object(map) = &mut root {
            map.insert("_sd_alg".to_string(), Value::String(hash_alg.name().to_string()));
        }
    }

    Ok(Issuance { claims: root, disclosures })
}

fn conceal_one(
    root: &mut Value,
    path: &[Step],
    hash_alg: HashAlg,
    disclosures: &mut Vec<Disclosure>,
) -> Result<()> {
    let (prefix, last) = path.split_at(path.len() - 1);
    let last = &last[0];

    for step in prefix {
        let Step::Key(key) = step else {
            return Err(Error::InvalidArrayElementPath(
                "a path's every-element step may only appear as its final step".to_string(),
            ));
        };
        if RESERVED_CLAIM_NAMES.contains(&key.as_str()) {
            return Err(Error::ForbiddenClaimName(key.clone()));
        }
    }

    let Some(parent) = navigate_mut(root, prefix) else {
        // A prefix segment is missing from this particular credential instance;
        // nothing to conceal.
        return Ok(());
    };

    match last {
        Step::Key(name) => {
            if RESERVED_CLAIM_NAMES.contains(&name.as_str()) {
                return Err(Error::ForbiddenClaimName(name.clone()));
            }
            let Value::Object(map) = parent else {
                return Err(Error::InvalidStructure(format!(
                    "cannot conceal claim {name}: parent is not an object"
                )));
            };
            let Some(value) = map.remove(name) else {
                return Ok(());
            };
            let disclosure = Disclosure::new_object_member(name.clone(), value)?;
            let digest = disclosure.digest(hash_alg)?;
            let sd_array = map.entry("_sd").or_insert_with(|| Value::Array(Vec::new()));
            let Value::Array(sd_array) = sd_array else {
                return Err(Error::InvalidStructure("_sd claim must be an array".to_string()));
            };
            sd_array.push(Value::String(digest));
            disclosures.push(disclosure);
        }
        Step::EveryElement => {
            let Value::Array(arr) = parent else {
                return Err(Error::InvalidArrayElementPath(
                    "every-element path step requires an array at that position".to_string(),
                ));
            };
            let elements = std::mem::take(arr);
            for element in elements {
                let disclosure = Disclosure::new_array_element(element)?;
                let digest = disclosure.digest(hash_alg)?;
                arr.push(json!({"...": digest}));
                disclosures.push(disclosure);
            }
        }
    }
    Ok(())
}

fn navigate_mut<'a>(root: &'a mut Value, prefix: &[Step]) -> Option<&'a mut Value> {
    let mut current = root;
    for step in prefix {
        let Step::Key(key) = step else { return None };
        let Value::Object(map) = current else { return None };
        current = map.get_mut(key.as_str())?;
    }
    Some(current)
}

fn add_decoys_and_finalize(value: &mut Value, hash_alg: HashAlg, decoys: usize) -> Result<()> {
    match value {
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                add_decoys_and_finalize(v, hash_alg, decoys)?;
            }
            if map.contains_key("_sd") {
                let sd_array = map.get_mut("_sd").and_then(Value::as_array_mut).ok_or_else(|| {
                    Error::InvalidStructure("_sd claim must be an array".to_string())
                })?;
                for _ in 0..decoys {
                    let input = codec::decoy_input()?;
                    sd_array.push(Value::String(hash_alg.encoded_digest(&input)));
                }
                let mut seen = HashSet::with_capacity(sd_array.len());
                for digest in sd_array.iter() {
                    let Some(digest) = digest.as_str() else {
                        return Err(Error::InvalidStructure("_sd entry must be a string".to_string()));
                    };
                    if !seen.insert(digest.to_string()) {
                        return Err(Error::DuplicateDigest);
                    }
                }
                sd_array.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                add_decoys_and_finalize(v, hash_alg, decoys)?;
            }
            if arr.iter().any(is_array_sentinel) {
                for _ in 0..decoys {
                    let input = codec::decoy_input()?;
                    arr.push(json!({"...": hash_alg.encoded_digest(&input)}));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn is_array_sentinel(value: &Value) -> bool {
    matches!(value.as_object(), Some(map) if map.len() == 1 && map.contains_key("..."))
}

fn sentinel_digest(value: &Value) -> Option<String> {
    let map = value.as_object()?;
    if map.len() == 1 { map.get("...").and_then(Value::as_str).map(String::from) } else { None }
}

/// Reassembles a plaintext claim tree from a transformed tree plus the
/// disclosures a holder presented. Returns the reconstructed tree and
/// the set of digests that were actually consumed, so the caller can
/// detect unbound disclosures (a disclosure the holder sent that
/// matches no digest anywhere in the tree).
///
/// `_sd` and `_sd_alg` claims are stripped from every object as they
/// are expanded; an `...` array sentinel with no matching disclosure is
/// dropped silently, since a non-presented decoy is indistinguishable
/// from a non-presented real digest at this layer.
///
/// # Errors
///
/// - [`Error::DuplicateDigest`] if two distinct disclosures in the
///   presented set hash to the same digest.
/// - [`Error::InvalidStructure`] if a `_sd` entry is not a string, or a
///   digest resolves to a disclosure of the wrong shape for where it
///   was found (an array-element disclosure referenced from an object's
///   `_sd` array, or vice versa).
pub fn reconstruct(
    mut root: Value,
    disclosures: &[Disclosure],
    hash_alg: HashAlg,
) -> Result<(Value, HashSet<String>)> {
    let mut by_digest: HashMap<String, &Disclosure> = HashMap::with_capacity(disclosures.len());
    for disclosure in disclosures {
        let digest = disclosure.digest(hash_alg)?;
        if by_digest.insert(digest, disclosure).is_some() {
            return Err(Error::DuplicateDigest);
        }
    }

    let mut used = HashSet::new();
    reconstruct_value(&mut root, &by_digest, hash_alg, &mut used)?;
    Ok((root, used))
}

fn reconstruct_value(
    value: &mut Value,
    by_digest: &HashMap<String, &Disclosure>,
    hash_alg: HashAlg,
    used: &mut HashSet<String>,
) -> Result<()> {
    match value {
        Value::Object(map) => {
            let sd_digests: Vec<String> = match map.remove("_sd") {
                Some(Value::Array(entries)) => entries
                    .into_iter()
                    .map(|e| {
                        e.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| Error::InvalidStructure("_sd entry must be a string".to_string()))
                    })
                    .collect::<Result<Vec<_>>>()?,
                Some(_) => return Err(Error::InvalidStructure("_sd claim must be an array".to_string())),
                None => Vec::new(),
            };
            map.remove("_sd_alg");

            for digest in sd_digests {
                let Some(disclosure) = by_digest.get(&digest) else { continue };
                let Some(name) = disclosure.claim_name.clone() else {
                    return Err(Error::InvalidStructure(
                        "object _sd digest resolved to an array-element disclosure".to_string(),
                    ));
                };
                let mut expanded = disclosure.value.clone();
                reconstruct_value(&mut expanded, by_digest, hash_alg, used)?;
                map.insert(name, expanded);
                used.insert(digest);
            }

            for (_, v) in map.iter_mut() {
                reconstruct_value(v, by_digest, hash_alg, used)?;
            }
        }
        Value::Array(arr) => {
            let mut rebuilt = Vec::with_capacity(arr.len());
            for element in std::mem::take(arr) {
                if let Some(digest) = sentinel_digest(&element) {
                    let Some(disclosure) = by_digest.get(&digest) else { continue };
                    if disclosure.claim_name.is_some() {
                        return Err(Error::InvalidStructure(
                            "array `...` sentinel resolved to an object-member disclosure".to_string(),
                        ));
                    }
                    let mut expanded = disclosure.value.clone();
                    reconstruct_value(&mut expanded, by_digest, hash_alg, used)?;
                    rebuilt.push(expanded);
                    used.insert(digest);
                } else {
                    let mut element = element;
                    reconstruct_value(&mut element, by_digest, hash_alg, used)?;
                    rebuilt.push(element);
                }
            }
            *arr = rebuilt;
        }
        _ => {}
    }
    Ok(())
}

/// Returns the digest of every disclosure in `disclosures` that
/// [`reconstruct`] did not find a place for in the transformed tree
/// (`used`).
///
/// # Errors
///
/// Returns [`Error::InvalidStructure`] if a disclosure's value cannot
/// be serialized to recompute its digest.
pub fn unbound_digests(
    disclosures: &[Disclosure],
    hash_alg: HashAlg,
    used: &HashSet<String>,
) -> Result<Vec<String>> {
    let mut unbound = Vec::new();
    for disclosure in disclosures {
        let digest = disclosure.digest(hash_alg)?;
        if !used.contains(&digest) {
            unbound.push(digest);
        }
    }
    Ok(unbound)
}
