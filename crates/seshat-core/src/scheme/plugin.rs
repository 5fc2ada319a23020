//! Pluggable annotation checkers for `parsed` tiers.
//!
//! A parsed tier names its checker by `(module, parser)`. Checkers are looked
//! up in a [`ParserRegistry`] when the scheme is built. The registry ships with
//! a few builtin checkers under the `builtin` module; deployments register
//! their own before loading schemes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Module name under which the builtin checkers are registered.
pub const BUILTIN_MODULE: &str = "builtin";

/// Reason a label was refused by a checker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct InvalidAnnotation(pub String);

impl InvalidAnnotation {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Validates the labels of a parsed tier.
pub trait AnnotationChecker: Send + Sync + fmt::Debug {
    /// Validate one non-empty label.
    fn check_annotation(&self, label: &str) -> Result<(), InvalidAnnotation>;

    /// Distance between two labels, if the checker defines one.
    fn distance(&self, _a: &str, _b: &str) -> Option<f64> {
        None
    }
}

/// `(module, parser)` pair identifying a checker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParserRef {
    pub module: String,
    pub parser: String,
}

impl ParserRef {
    pub fn new(module: impl Into<String>, parser: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            parser: parser.into(),
        }
    }

    pub fn builtin(parser: impl Into<String>) -> Self {
        Self::new(BUILTIN_MODULE, parser)
    }
}

impl fmt::Display for ParserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.module, self.parser)
    }
}

/// Lookup table of available checkers.
#[derive(Debug, Clone, Default)]
pub struct ParserRegistry {
    checkers: BTreeMap<ParserRef, Arc<dyn AnnotationChecker>>,
}

impl ParserRegistry {
    /// Registry with no checker at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the builtin checkers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(ParserRef::builtin("integer"), Arc::new(IntegerChecker));
        registry.register(ParserRef::builtin("single_word"), Arc::new(SingleWordChecker));
        registry
    }

    /// Register (or replace) a checker.
    pub fn register(&mut self, key: ParserRef, checker: Arc<dyn AnnotationChecker>) {
        self.checkers.insert(key, checker);
    }

    pub fn resolve(&self, key: &ParserRef) -> Option<Arc<dyn AnnotationChecker>> {
        self.checkers.get(key).cloned()
    }

    /// Registered keys, sorted by module then parser name.
    pub fn keys(&self) -> impl Iterator<Item = &ParserRef> {
        self.checkers.keys()
    }

    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }
}

/// Accepts base-10 integers, optionally signed.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerChecker;

impl AnnotationChecker for IntegerChecker {
    fn check_annotation(&self, label: &str) -> Result<(), InvalidAnnotation> {
        label
            .trim()
            .parse::<i64>()
            .map(|_| ())
            .map_err(|_| InvalidAnnotation::new(format!("{label:?} is not an integer")))
    }

    fn distance(&self, a: &str, b: &str) -> Option<f64> {
        let (a, b) = (a.trim().parse::<i64>().ok()?, b.trim().parse::<i64>().ok()?);
        Some(a.abs_diff(b) as f64)
    }
}

/// Accepts exactly one whitespace-free word.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleWordChecker;

impl AnnotationChecker for SingleWordChecker {
    fn check_annotation(&self, label: &str) -> Result<(), InvalidAnnotation> {
        let mut words = label.split_whitespace();
        match (words.next(), words.next()) {
            (Some(_), None) => Ok(()),
            (None, _) => Err(InvalidAnnotation::new("the annotation contains no word")),
            (Some(_), Some(_)) => Err(InvalidAnnotation::new(format!(
                "{label:?} contains more than one word"
            ))),
        }
    }

    fn distance(&self, a: &str, b: &str) -> Option<f64> {
        Some(if a.trim() == b.trim() { 0.0 } else { 1.0 })
    }
}

/// Accepts labels fully matching a regular expression.
#[derive(Debug, Clone)]
pub struct PatternChecker {
    pattern: Regex,
}

impl PatternChecker {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(&format!("^(?:{pattern})$"))?,
        })
    }
}

impl AnnotationChecker for PatternChecker {
    fn check_annotation(&self, label: &str) -> Result<(), InvalidAnnotation> {
        if self.pattern.is_match(label) {
            Ok(())
        } else {
            Err(InvalidAnnotation::new(format!(
                "{label:?} does not match the pattern {}",
                self.pattern.as_str()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = ParserRegistry::with_builtins();
        assert_eq!(registry.len(), 2);
        assert!(registry.resolve(&ParserRef::builtin("integer")).is_some());
        assert!(registry.resolve(&ParserRef::builtin("single_word")).is_some());
        assert!(registry.resolve(&ParserRef::new("phonology", "ipa")).is_none());
    }

    #[test]
    fn test_integer_checker() {
        assert!(IntegerChecker.check_annotation("42").is_ok());
        assert!(IntegerChecker.check_annotation(" -3 ").is_ok());
        let err = IntegerChecker.check_annotation("4.2").unwrap_err();
        assert!(err.0.contains("not an integer"));
        assert_eq!(IntegerChecker.distance("1", "1"), Some(0.0));
        assert_eq!(IntegerChecker.distance("-2", "3"), Some(5.0));
        assert_eq!(IntegerChecker.distance("1", "x"), None);
    }

    #[test]
    fn test_single_word_checker() {
        assert!(SingleWordChecker.check_annotation("hello").is_ok());
        assert!(SingleWordChecker.check_annotation("hello world").is_err());
        assert!(SingleWordChecker.check_annotation("   ").is_err());
    }

    #[test]
    fn test_pattern_checker_is_anchored() {
        let checker = PatternChecker::new("[a-z]+[0-9]").unwrap();
        assert!(checker.check_annotation("ab1").is_ok());
        assert!(checker.check_annotation("xab1y").is_err());
        assert!(PatternChecker::new("(").is_err());
    }

    #[test]
    fn test_register_custom_checker() {
        let mut registry = ParserRegistry::empty();
        assert!(registry.is_empty());
        let key = ParserRef::new("corpus", "syllables");
        registry.register(key.clone(), Arc::new(PatternChecker::new("[A-Z]+").unwrap()));
        assert_eq!(key.to_string(), "corpus/syllables");
        let checker = registry.resolve(&key).unwrap();
        assert!(checker.check_annotation("CVC").is_ok());
        assert_eq!(checker.distance("CV", "CVC"), None);
    }
}
