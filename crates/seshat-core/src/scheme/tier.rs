//! Per-tier validation rules.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::plugin::{AnnotationChecker, ParserRef};
use crate::error_log::ErrorLog;
use crate::textgrid::IntervalTier;

/// How the labels of a tier are validated.
#[derive(Debug, Clone)]
pub enum TierContent {
    /// Any label is accepted.
    Unchecked,
    /// Labels must be one of a fixed set.
    Categorical { categories: Vec<String> },
    /// Labels are delegated to a checker. `checker` is `None` when the
    /// reference could not be resolved at load time.
    Parsed {
        parser: ParserRef,
        checker: Option<Arc<dyn AnnotationChecker>>,
    },
}

/// Rules for one tier of a checking scheme.
#[derive(Debug, Clone)]
pub struct TierScheme {
    pub name: String,
    pub required: bool,
    pub allow_empty: bool,
    pub content: TierContent,
}

impl TierScheme {
    pub fn unchecked(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            allow_empty: true,
            content: TierContent::Unchecked,
        }
    }

    pub fn categorical<I, S>(name: impl Into<String>, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            content: TierContent::Categorical {
                categories: categories.into_iter().map(Into::into).collect(),
            },
            ..Self::unchecked(name)
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn disallow_empty(mut self) -> Self {
        self.allow_empty = false;
        self
    }

    /// Whether labels of this tier are checked at all.
    pub fn is_checked(&self) -> bool {
        !matches!(self.content, TierContent::Unchecked)
    }

    /// Validate every interval of `tier` against this scheme, logging under
    /// `tier.name` (which may carry a stage suffix).
    pub fn check_tier(&self, tier: &IntervalTier, log: &mut ErrorLog) {
        if let TierContent::Parsed {
            parser,
            checker: None,
        } = &self.content
        {
            log.log_structural(format!(
                "The checker {parser} for tier {} could not be loaded: its annotations cannot be checked",
                tier.name
            ));
            return;
        }

        for (index, interval) in tier.iter().enumerate() {
            if interval.is_blank() {
                // Allowed empty labels are exempt from content checks.
                if !self.allow_empty {
                    log.log_annot(
                        &tier.name,
                        index,
                        interval,
                        "Empty annotations are not authorized in this tier",
                    );
                }
                continue;
            }
            let label = interval.label.trim();
            match &self.content {
                TierContent::Unchecked => {}
                TierContent::Categorical { categories } => {
                    if !categories.iter().any(|c| c == label) {
                        log.log_annot(
                            &tier.name,
                            index,
                            interval,
                            format!(
                                "Annotation {label:?} is not one of the authorized categories ({})",
                                categories.join(", ")
                            ),
                        );
                    }
                }
                TierContent::Parsed {
                    checker: Some(checker),
                    ..
                } => {
                    if let Err(err) = checker.check_annotation(label) {
                        log.log_annot(&tier.name, index, interval, err.to_string());
                    }
                }
                TierContent::Parsed { checker: None, .. } => {}
            }
        }
    }

    /// Distance between two labels of this tier, if one is defined.
    ///
    /// Categorical tiers use 0 for equal labels and 1 otherwise; parsed tiers
    /// defer to their checker; unchecked tiers define none.
    pub fn distance(&self, a: &str, b: &str) -> Option<f64> {
        match &self.content {
            TierContent::Unchecked => None,
            TierContent::Categorical { .. } => Some(if a.trim() == b.trim() { 0.0 } else { 1.0 }),
            TierContent::Parsed { checker, .. } => {
                checker.as_ref().and_then(|checker| checker.distance(a, b))
            }
        }
    }

    /// Declarative form of this tier, as read from a scheme file.
    pub fn to_spec(&self) -> TierSpec {
        let content = match &self.content {
            TierContent::Unchecked => ContentSpec::Unchecked,
            TierContent::Categorical { categories } => ContentSpec::Categorical {
                categories: categories.clone(),
            },
            TierContent::Parsed { parser, .. } => ContentSpec::Parsed {
                module: parser.module.clone(),
                parser: parser.parser.clone(),
            },
        };
        TierSpec {
            name: self.name.clone(),
            required: self.required,
            allow_empty: self.allow_empty,
            content,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Declarative tier description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSpec {
    pub name: String,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default = "default_true")]
    pub allow_empty: bool,
    #[serde(flatten)]
    pub content: ContentSpec,
}

/// Declarative content rule, tagged by `content_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "content_type", rename_all = "snake_case")]
pub enum ContentSpec {
    Unchecked,
    Categorical { categories: Vec<String> },
    Parsed { module: String, parser: String },
}
