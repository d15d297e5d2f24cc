//! Typed lookup table from ground identities to their specs.

use std::collections::BTreeMap;

use highland_core::{EdgeDescriptor, GroundSpec, GroundType, CLIFF_KIND};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while building or querying a [`GroundCatalog`].
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog document is not valid JSON or does not match the schema.
    #[error("failed to parse ground catalog: {0}")]
    Parse(#[from] serde_json::Error),
    /// A kind lacks one of the edge variants the autotiler can produce.
    #[error("ground kind `{kind}` is missing variant `{variant}`")]
    MissingVariant {
        /// Kind being validated.
        kind: String,
        /// Variant that has no spec.
        variant: String,
    },
    /// The cliff filler kind is not defined.
    #[error("ground catalog does not define the `{}` kind", CLIFF_KIND)]
    MissingCliffKind,
    /// A lookup named a ground the catalog does not know.
    #[error("unknown ground `{kind}/{variant}`")]
    UnknownGround {
        /// Requested kind.
        kind: String,
        /// Requested variant.
        variant: String,
    },
    /// The catalog-wide placement radius is not a positive finite number.
    #[error("default radius must be positive, got {0}")]
    InvalidRadius(f32),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogDocument {
    default_radius: f32,
    kinds: BTreeMap<String, KindDocument>,
}

#[derive(Deserialize)]
struct KindDocument {
    types: BTreeMap<String, GroundSpec>,
}

/// Validated table of every ground kind and variant available to a map.
#[derive(Clone, Debug)]
pub struct GroundCatalog {
    default_radius: f32,
    kinds: BTreeMap<String, BTreeMap<String, GroundSpec>>,
}

impl GroundCatalog {
    /// Parses and validates a catalog document.
    pub fn from_json_str(document: &str) -> Result<Self, CatalogError> {
        let parsed: CatalogDocument = serde_json::from_str(document)?;
        let kinds = parsed
            .kinds
            .into_iter()
            .map(|(kind, entry)| (kind, entry.types))
            .collect();
        Self::validated(parsed.default_radius, kinds)
    }

    /// Builds and validates a catalog from individual specs.
    pub fn from_specs<I>(default_radius: f32, specs: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (GroundType, GroundSpec)>,
    {
        let mut kinds: BTreeMap<String, BTreeMap<String, GroundSpec>> = BTreeMap::new();
        for (ground, spec) in specs {
            let _ = kinds
                .entry(ground.kind)
                .or_default()
                .insert(ground.variant, spec);
        }
        Self::validated(default_radius, kinds)
    }

    fn validated(
        default_radius: f32,
        kinds: BTreeMap<String, BTreeMap<String, GroundSpec>>,
    ) -> Result<Self, CatalogError> {
        if !(default_radius.is_finite() && default_radius > 0.0) {
            return Err(CatalogError::InvalidRadius(default_radius));
        }

        for (kind, types) in &kinds {
            let required: Vec<EdgeDescriptor> = if kind == CLIFF_KIND {
                EdgeDescriptor::all_plain()
                    .chain(EdgeDescriptor::all_cliff())
                    .collect()
            } else {
                EdgeDescriptor::all_plain().collect()
            };
            for descriptor in required {
                let variant = descriptor.to_variant();
                if !types.contains_key(&variant) {
                    return Err(CatalogError::MissingVariant {
                        kind: kind.clone(),
                        variant,
                    });
                }
            }
        }

        if !kinds.contains_key(CLIFF_KIND) {
            return Err(CatalogError::MissingCliffKind);
        }

        Ok(Self {
            default_radius,
            kinds,
        })
    }

    /// Radius used for occupant spacing when no layer overrides it.
    #[must_use]
    pub const fn default_radius(&self) -> f32 {
        self.default_radius
    }

    /// Looks up the spec of a ground identity.
    pub fn spec(&self, kind: &str, variant: &str) -> Result<&GroundSpec, CatalogError> {
        self.kinds
            .get(kind)
            .and_then(|types| types.get(variant))
            .ok_or_else(|| CatalogError::UnknownGround {
                kind: kind.to_owned(),
                variant: variant.to_owned(),
            })
    }

    /// Looks up the spec of a ground.
    pub fn spec_of(&self, ground: &GroundType) -> Result<&GroundSpec, CatalogError> {
        self.spec(&ground.kind, &ground.variant)
    }

    /// Reports whether the catalog defines the provided kind.
    #[must_use]
    pub fn contains_kind(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Iterates the defined kinds in alphabetical order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use highland_core::{Passable, SpriteRef, MIDDLE};

    use super::*;

    fn full_kind(kind: &str, cliff: bool) -> Vec<(GroundType, GroundSpec)> {
        let descriptors: Vec<EdgeDescriptor> = if cliff {
            EdgeDescriptor::all_plain()
                .chain(EdgeDescriptor::all_cliff())
                .collect()
        } else {
            EdgeDescriptor::all_plain().collect()
        };
        descriptors
            .into_iter()
            .map(|descriptor| {
                let variant = descriptor.to_variant();
                let spec = GroundSpec {
                    passable: Passable::open(),
                    sprite: SpriteRef::new("ground", format!("{kind}-{variant}")),
                };
                (GroundType::new(kind, variant), spec)
            })
            .collect()
    }

    #[test]
    fn shipped_catalog_is_complete() {
        let catalog = GroundCatalog::from_json_str(include_str!("../../assets/ground.json"))
            .expect("shipped catalog must validate");
        assert!(catalog.contains_kind("grass"));
        assert!(catalog.spec(CLIFF_KIND, "cliff-up-down-left-right").is_ok());
        assert!(catalog.default_radius() > 0.0);
    }

    #[test]
    fn catalog_requires_every_edge_variant() {
        let mut specs = full_kind(CLIFF_KIND, true);
        specs.extend(
            full_kind("grass", false)
                .into_iter()
                .filter(|(ground, _)| ground.variant != "down-left"),
        );

        let error = GroundCatalog::from_specs(0.3, specs).expect_err("missing variant must fail");
        assert!(
            matches!(
                error,
                CatalogError::MissingVariant { ref kind, ref variant }
                    if kind == "grass" && variant == "down-left"
            ),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn catalog_requires_cliff_variants_on_rock() {
        let specs = full_kind(CLIFF_KIND, false);
        let error = GroundCatalog::from_specs(0.3, specs).expect_err("cliff variants are required");
        assert!(matches!(error, CatalogError::MissingVariant { .. }));
    }

    #[test]
    fn catalog_requires_cliff_kind() {
        let error = GroundCatalog::from_specs(0.3, full_kind("grass", false))
            .expect_err("rock kind is required");
        assert!(matches!(error, CatalogError::MissingCliffKind));
    }

    #[test]
    fn catalog_rejects_non_positive_radius() {
        let error = GroundCatalog::from_specs(0.0, full_kind(CLIFF_KIND, true))
            .expect_err("radius must be positive");
        assert!(matches!(error, CatalogError::InvalidRadius(_)));
    }

    #[test]
    fn unknown_lookup_reports_identity() {
        let catalog =
            GroundCatalog::from_specs(0.3, full_kind(CLIFF_KIND, true)).expect("valid catalog");
        assert!(catalog.spec(CLIFF_KIND, MIDDLE).is_ok());
        let error = catalog.spec("lava", MIDDLE).expect_err("lava is not defined");
        assert_eq!(error.to_string(), "unknown ground `lava/middle`");
    }
}
