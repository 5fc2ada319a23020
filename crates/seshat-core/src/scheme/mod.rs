//! Checking schemes: which tiers a TextGrid must contain and how each tier's
//! labels are validated.
//!
//! Schemes are built from declarative [`TierSpec`] lists, usually read from a
//! TOML or JSON scheme file:
//!
//! ```toml
//! name = "syllables"
//!
//! [[tiers]]
//! name = "phones"
//! content_type = "categorical"
//! categories = ["a", "i", "u"]
//!
//! [[tiers]]
//! name = "notes"
//! required = false
//! content_type = "unchecked"
//! ```

pub mod error;
pub mod plugin;
pub mod tier;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub use error::{SchemeError, SchemeFileError, SchemeResult};
pub use plugin::{
    AnnotationChecker, IntegerChecker, InvalidAnnotation, ParserRef, ParserRegistry,
    PatternChecker, SingleWordChecker, BUILTIN_MODULE,
};
pub use tier::{ContentSpec, TierContent, TierScheme, TierSpec};

use crate::textgrid::{IntervalTier, TextGrid};

/// Ordered set of tier schemes, unique by name.
#[derive(Debug, Clone)]
pub struct CheckingScheme {
    name: String,
    tiers: Vec<TierScheme>,
}

impl CheckingScheme {
    /// Build a scheme from its declarative description.
    ///
    /// Parsed tiers whose checker is not in `registry` do not fail the build:
    /// they are kept unresolved and every check of such a tier reports a
    /// structural error.
    pub fn from_spec(
        name: &str,
        specs: &[TierSpec],
        registry: &ParserRegistry,
    ) -> SchemeResult<Self> {
        if name.trim().is_empty() {
            return Err(SchemeError::EmptyName);
        }
        if specs.is_empty() {
            return Err(SchemeError::NoTiers {
                scheme: name.to_string(),
            });
        }

        let mut seen = HashSet::new();
        let mut tiers = Vec::with_capacity(specs.len());
        for (index, spec) in specs.iter().enumerate() {
            if spec.name.trim().is_empty() {
                return Err(SchemeError::EmptyTierName {
                    scheme: name.to_string(),
                    index,
                });
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(SchemeError::DuplicateTier {
                    scheme: name.to_string(),
                    tier: spec.name.clone(),
                });
            }
            let content = match &spec.content {
                ContentSpec::Unchecked => TierContent::Unchecked,
                ContentSpec::Categorical { categories } => {
                    if categories.is_empty() {
                        return Err(SchemeError::EmptyCategories {
                            tier: spec.name.clone(),
                        });
                    }
                    TierContent::Categorical {
                        categories: categories.clone(),
                    }
                }
                ContentSpec::Parsed { module, parser } => {
                    if module.trim().is_empty() || parser.trim().is_empty() {
                        return Err(SchemeError::EmptyParserRef {
                            tier: spec.name.clone(),
                        });
                    }
                    let parser = ParserRef::new(module.as_str(), parser.as_str());
                    let checker = registry.resolve(&parser);
                    if checker.is_none() {
                        warn!(
                            event = "scheme.checker_unresolved",
                            scheme = %name,
                            tier = %spec.name,
                            parser = %parser,
                        );
                    }
                    TierContent::Parsed { parser, checker }
                }
            };
            tiers.push(TierScheme {
                name: spec.name.clone(),
                required: spec.required,
                allow_empty: spec.allow_empty,
                content,
            });
        }

        Ok(Self {
            name: name.to_string(),
            tiers,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tier schemes in declaration order.
    pub fn tiers(&self) -> &[TierScheme] {
        &self.tiers
    }

    pub fn tier(&self, name: &str) -> Option<&TierScheme> {
        self.tiers.iter().find(|tier| tier.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tier(name).is_some()
    }

    pub fn all_tiers(&self) -> Vec<&str> {
        self.tiers.iter().map(|tier| tier.name.as_str()).collect()
    }

    pub fn required_tiers(&self) -> Vec<&str> {
        self.tiers
            .iter()
            .filter(|tier| tier.required)
            .map(|tier| tier.name.as_str())
            .collect()
    }

    /// Whether any tier is validated beyond presence.
    pub fn has_checked_tiers(&self) -> bool {
        self.tiers.iter().any(TierScheme::is_checked)
    }

    /// Blank grid with one tier per scheme tier, each holding a single empty
    /// interval spanning `[0, duration]`.
    pub fn gen_template(&self, duration: f64, filename: &str) -> TextGrid {
        let mut grid = TextGrid::new(filename, 0.0, duration);
        for tier in &self.tiers {
            grid.push(IntervalTier::blank(tier.name.as_str(), 0.0, duration));
        }
        grid
    }

    /// Declarative form of this scheme.
    pub fn to_file(&self) -> SchemeFile {
        SchemeFile {
            name: self.name.clone(),
            tiers: self.tiers.iter().map(TierScheme::to_spec).collect(),
        }
    }
}

/// On-disk scheme description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeFile {
    pub name: String,
    pub tiers: Vec<TierSpec>,
}

impl SchemeFile {
    pub fn from_toml_str(text: &str) -> Result<Self, SchemeFileError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, SchemeFileError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a `.toml` or `.json` scheme file.
    pub fn load(path: &Path) -> Result<Self, SchemeFileError> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| SchemeFileError::Io {
            path: display.clone(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            Some("json") => Self::from_json_str(&text),
            _ => Err(SchemeFileError::UnknownFormat { path: display }),
        }
    }

    pub fn build(&self, registry: &ParserRegistry) -> Result<CheckingScheme, SchemeFileError> {
        Ok(CheckingScheme::from_spec(&self.name, &self.tiers, registry)?)
    }
}
