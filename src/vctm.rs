//! # Credential Type Metadata
//!
//! The VCTM document: a named, versionable description of a credential
//! type's claims, their disclosure policy, and how they should be
//! displayed. The disclosure engine (`crate::disclosure`) consumes a
//! flattened, `extends`-resolved claim list built from this model; it
//! never reads a VCTM document itself.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::{Error, Result};

/// Reserved claim names that can never appear as a path step, at any
/// depth: they are the structural markers the disclosure engine itself
/// writes into the transformed tree.
pub const RESERVED_CLAIM_NAMES: [&str; 3] = ["_sd", "_sd_alg", "..."];

/// One step of a claim path: either a named object key, or the
/// "every element" wildcard used to address array members.
///
/// On the wire this is a JSON array whose entries are either a string
/// (`Key`) or `null` (`EveryElement`), per draft-13's claims path
/// pointer representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A named object key.
    Key(String),
    /// Addresses every element of an array.
    EveryElement,
}

impl Serialize for Step {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Key(key) => serializer.serialize_str(key),
            Self::EveryElement => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        Ok(opt.map_or(Self::EveryElement, Self::Key))
    }
}

/// A claim path: an ordered sequence of [`Step`]s from the credential
/// root.
pub type ClaimPath = Vec<Step>;

/// Disclosure policy for a claim, per draft-13 §5.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdPolicy {
    /// The claim is always made into a disclosure.
    Always,
    /// The issuer may choose whether to disclose the claim. The default.
    #[default]
    Allowed,
    /// The claim is never made selectively disclosable; it stays a
    /// plaintext claim in the issued credential.
    Never,
}

/// A per-language display label for a claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimDisplay {
    /// BCP 47 language tag.
    pub lang: String,
    /// Human-readable label.
    pub label: String,
    /// Optional longer description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Describes one claim of a credential type: its path, disclosure
/// policy, and presentation metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimMetadata {
    /// The path this descriptor addresses.
    pub path: ClaimPath,
    /// Disclosure policy. Defaults to [`SdPolicy::Allowed`].
    #[serde(default)]
    pub sd: SdPolicy,
    /// Whether a verifier should treat absence of this claim (when
    /// disclosed) as invalid. Only meaningful for `sd: always` or
    /// `sd: allowed` claims.
    #[serde(default)]
    pub mandatory: bool,
    /// Per-language display labels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub display: Vec<ClaimDisplay>,
}

impl ClaimMetadata {
    /// Validates that the path is non-empty and touches no reserved
    /// claim name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForbiddenClaimName`] if a [`Step::Key`] in the
    /// path names `_sd`, `_sd_alg`, or `...`; [`Error::InvalidStructure`]
    /// if the path is empty.
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(Error::InvalidStructure("claim descriptor path must not be empty".to_string()));
        }
        for step in &self.path {
            if let Step::Key(key) = step {
                if RESERVED_CLAIM_NAMES.contains(&key.as_str()) {
                    return Err(Error::ForbiddenClaimName(key.clone()));
                }
            }
        }
        Ok(())
    }

    /// Renders this descriptor's path as a JSONPath-like string, for
    /// diagnostics and logging only. The disclosure engine never parses
    /// this back; it walks [`Step`]s directly.
    #[must_use]
    pub fn json_path(&self) -> String {
        let mut out = String::from("$");
        for step in &self.path {
            match step {
                Step::Key(key) => {
                    out.push('.');
                    out.push_str(key);
                }
                Step::EveryElement => out.push_str("[*]"),
            }
        }
        out
    }

    /// Looks up this descriptor's display label for `lang`, falling back
    /// to the first entry if no exact language tag matches.
    #[must_use]
    pub fn display_for(&self, lang: &str) -> Option<&ClaimDisplay> {
        self.display.iter().find(|d| d.lang == lang).or_else(|| self.display.first())
    }
}

/// A per-language display label for the credential type as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayMetadata {
    /// BCP 47 language tag.
    pub lang: String,
    /// Human-readable credential type name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional longer description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A JSON Schema reference or inline body used to validate a
/// credential's non-selectively-disclosable claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeSchema {
    /// A schema fetched from `schema_uri`, optionally integrity-checked.
    Uri {
        /// URI to fetch the schema document from.
        schema_uri: String,
        /// Subresource-integrity string for the fetched document.
        #[serde(rename = "schema_uri#integrity", skip_serializing_if = "Option::is_none")]
        schema_uri_integrity: Option<String>,
    },
    /// A schema embedded directly in the type metadata document.
    Object {
        /// The JSON Schema document.
        schema: Value,
    },
}

/// A credential type's full metadata document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeMetadata {
    /// The Verifiable Credential Type URI this document describes.
    pub vct: String,
    /// Human-readable type name (legacy single-language form).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Human-readable type description (legacy single-language form).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A parent type URI this type extends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Subresource-integrity string for the `extends` document.
    #[serde(rename = "extends#integrity", skip_serializing_if = "Option::is_none")]
    pub extends_integrity: Option<String>,
    /// Schema used to validate plaintext claims.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<TypeSchema>,
    /// Per-language display metadata.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub display: Vec<DisplayMetadata>,
    /// Claim descriptors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub claims: Vec<ClaimMetadata>,
}

impl TypeMetadata {
    /// Validates this document in isolation: every claim descriptor's
    /// path is non-empty and reserved-name free.
    ///
    /// # Errors
    ///
    /// Propagates [`ClaimMetadata::validate`] errors.
    pub fn validate(&self) -> Result<()> {
        for claim in &self.claims {
            claim.validate()?;
        }
        Ok(())
    }

    /// Builds this type's display label for `lang` (credential type name
    /// plus description), falling back to the first declared `display`
    /// entry if no exact language tag matches, and finally to the
    /// legacy single-language `name`/`description` fields.
    #[must_use]
    pub fn display_for(&self, lang: &str) -> Option<&DisplayMetadata> {
        self.display.iter().find(|d| d.lang == lang).or_else(|| self.display.first())
    }

    /// Maps every declared language tag (the type's own `display` list
    /// plus every tag any claim descriptor's `display` list names) to
    /// the type-level display entry for that language, for a caller
    /// building a locale-aware rendering of this credential type.
    #[must_use]
    pub fn display_map(&self) -> std::collections::HashMap<&str, &DisplayMetadata> {
        let mut langs: HashSet<&str> = self.display.iter().map(|d| d.lang.as_str()).collect();
        for claim in &self.claims {
            langs.extend(claim.display.iter().map(|d| d.lang.as_str()));
        }
        langs
            .into_iter()
            .filter_map(|lang| self.display_for(lang).map(|display| (lang, display)))
            .collect()
    }
}

/// Resolves a type metadata document by its `vct` URI, so an `extends`
/// chain can be walked without this module knowing how documents are
/// fetched (HTTP, embedded bundle, local cache, ...).
pub trait TypeResolver {
    /// Fetches the type metadata document for `vct`.
    ///
    /// # Errors
    ///
    /// Implementations return [`Error::InvalidStructure`] (or a more
    /// specific variant) if the document cannot be retrieved or parsed.
    fn resolve(&self, vct: &str) -> Result<TypeMetadata>;
}

/// Walks `root`'s `extends` chain via `resolver`, returning every
/// document in the chain starting with `root` itself, most-specific
/// first.
///
/// # Errors
///
/// Returns [`Error::InvalidStructure`] if the chain cycles back to a
/// `vct` already visited, or if any document in the chain fails to
/// validate or resolve.
pub fn resolve_chain(root: &TypeMetadata, resolver: &dyn TypeResolver) -> Result<Vec<TypeMetadata>> {
    root.validate()?;
    let mut chain = vec![root.clone()];
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(root.vct.clone());

    let mut current = root.clone();
    while let Some(parent_vct) = current.extends.clone() {
        if !visited.insert(parent_vct.clone()) {
            return Err(Error::InvalidStructure(format!("extends chain cycles back to {parent_vct}")));
        }
        let parent = resolver.resolve(&parent_vct)?;
        parent.validate()?;
        chain.push(parent.clone());
        current = parent;
    }
    Ok(chain)
}

/// Flattens an `extends` chain into a single claim descriptor list,
/// most-specific document's descriptors first. A descendant's
/// descriptor for a given path is never overridden by an ancestor's
/// descriptor for the same path; this simply concatenates in
/// most-specific-first order, which is what [`crate::disclosure::issue`]
/// expects.
#[must_use]
pub fn flatten_claims(chain: &[TypeMetadata]) -> Vec<ClaimMetadata> {
    chain.iter().flat_map(|doc| doc.claims.iter().cloned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_step_round_trips_through_json() {
        let path = vec![Step::Key("address".to_string()), Step::EveryElement, Step::Key("street".to_string())];
        let json = serde_json::to_value(&path).unwrap();
        assert_eq!(json, serde_json::json!(["address", null, "street"]));
        let back: ClaimPath = serde_json::from_value(json).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn rejects_reserved_name_in_path() {
        let claim = ClaimMetadata {
            path: vec![Step::Key("_sd".to_string())],
            sd: SdPolicy::Allowed,
            mandatory: false,
            display: vec![],
        };
        assert!(matches!(claim.validate(), Err(Error::ForbiddenClaimName(_))));
    }

    #[test]
    fn rejects_empty_path() {
        let claim = ClaimMetadata { path: vec![], sd: SdPolicy::Allowed, mandatory: false, display: vec![] };
        assert!(matches!(claim.validate(), Err(Error::InvalidStructure(_))));
    }

    #[test]
    fn renders_json_path_diagnostics() {
        let key_only = ClaimMetadata {
            path: vec![Step::Key("address".to_string()), Step::Key("postal".to_string())],
            sd: SdPolicy::Allowed,
            mandatory: false,
            display: vec![],
        };
        assert_eq!(key_only.json_path(), "$.address.postal");

        let with_array = ClaimMetadata {
            path: vec![Step::Key("nationalities".to_string()), Step::EveryElement],
            sd: SdPolicy::Always,
            mandatory: false,
            display: vec![],
        };
        assert_eq!(with_array.json_path(), "$.nationalities[*]");
    }

    #[test]
    fn builds_per_locale_display_map() {
        let doc = TypeMetadata {
            vct: "https://example.com/id".to_string(),
            name: None,
            description: None,
            extends: None,
            extends_integrity: None,
            schema: None,
            display: vec![
                DisplayMetadata { lang: "en-US".to_string(), name: Some("ID Card".to_string()), description: None },
                DisplayMetadata { lang: "de-DE".to_string(), name: Some("Ausweis".to_string()), description: None },
            ],
            claims: vec![ClaimMetadata {
                path: vec![Step::Key("given_name".to_string())],
                sd: SdPolicy::Allowed,
                mandatory: false,
                display: vec![ClaimDisplay {
                    lang: "fr-FR".to_string(),
                    label: "Prénom".to_string(),
                    description: None,
                }],
            }],
        };

        let map = doc.display_map();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("en-US").unwrap().name.as_deref(), Some("ID Card"));
        assert_eq!(map.get("de-DE").unwrap().name.as_deref(), Some("Ausweis"));
        // "fr-FR" has no type-level display entry, so it falls back to the
        // first declared one ("en-US").
        assert_eq!(map.get("fr-FR").unwrap().name.as_deref(), Some("ID Card"));

        let claim = &doc.claims[0];
        assert_eq!(claim.display_for("fr-FR").unwrap().label, "Prénom");
        assert_eq!(claim.display_for("de-DE").unwrap().label, "Prénom");
    }

    struct StaticResolver(Vec<TypeMetadata>);
    impl TypeResolver for StaticResolver {
        fn resolve(&self, vct: &str) -> Result<TypeMetadata> {
            self.0
                .iter()
                .find(|doc| doc.vct == vct)
                .cloned()
                .ok_or_else(|| Error::InvalidStructure(format!("no such type: {vct}")))
        }
    }

    fn bare_type(vct: &str, extends: Option<&str>) -> TypeMetadata {
        TypeMetadata {
            vct: vct.to_string(),
            name: None,
            description: None,
            extends: extends.map(str::to_string),
            extends_integrity: None,
            schema: None,
            display: vec![],
            claims: vec![],
        }
    }

    #[test]
    fn resolves_extends_chain() {
        let parent = bare_type("base", None);
        let child = bare_type("child", Some("base"));
        let resolver = StaticResolver(vec![parent.clone()]);
        let chain = resolve_chain(&child, &resolver).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].vct, "child");
        assert_eq!(chain[1].vct, "base");
    }

    #[test]
    fn detects_extends_cycle() {
        let a = bare_type("a", Some("b"));
        let b = bare_type("b", Some("a"));
        let resolver = StaticResolver(vec![a.clone(), b.clone()]);
        assert!(matches!(resolve_chain(&a, &resolver), Err(Error::InvalidStructure(_))));
    }
}
