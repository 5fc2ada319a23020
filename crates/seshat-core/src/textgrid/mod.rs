//! Interval model for TextGrid annotation files.
//!
//! A [`TextGrid`] is a set of named [`IntervalTier`]s. Every tier is a
//! time-ordered sequence of labeled [`Interval`]s covering the whole grid
//! duration without overlap. That invariant belongs to the file format and is
//! taken as given here: the checkers only look at tier names, interval counts,
//! labels and boundary times.

pub mod format;

use serde::{Deserialize, Serialize};

pub use format::{decode_textgrid_bytes, parse_textgrid, write_textgrid, ParseError};

/// A labeled time span of a tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
    pub label: String,
}

impl Interval {
    pub fn new(start: f64, end: f64, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
        }
    }

    /// Whether the label is blank (whitespace only counts as blank).
    pub fn is_blank(&self) -> bool {
        self.label.trim().is_empty()
    }
}

/// A named sequence of contiguous intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalTier {
    pub name: String,
    pub start: f64,
    pub end: f64,
    pub intervals: Vec<Interval>,
}

impl IntervalTier {
    /// Create a tier with no intervals.
    pub fn new(name: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            intervals: Vec::new(),
        }
    }

    /// Create a tier holding a single blank interval over `[start, end]`.
    pub fn blank(name: impl Into<String>, start: f64, end: f64) -> Self {
        let mut tier = Self::new(name, start, end);
        if end > start {
            tier.intervals.push(Interval::new(start, end, ""));
        }
        tier
    }

    /// Append an interval, returning `self` for chaining.
    pub fn with_interval(mut self, start: f64, end: f64, label: impl Into<String>) -> Self {
        self.intervals.push(Interval::new(start, end, label));
        self
    }

    /// Same tier under another name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Interval> {
        self.intervals.iter()
    }
}

/// A multi-tier annotation document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextGrid {
    /// Document name (the annotated file's name). Not part of the text format.
    #[serde(default)]
    pub name: String,
    pub start: f64,
    pub end: f64,
    pub tiers: Vec<IntervalTier>,
}

impl TextGrid {
    pub fn new(name: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            tiers: Vec::new(),
        }
    }

    /// Parse a TextGrid from its text representation.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        parse_textgrid(text)
    }

    /// Serialize to the Praat long text format.
    pub fn to_text(&self) -> String {
        write_textgrid(self)
    }

    /// An empty grid with the same name and time span.
    pub fn empty_like(&self) -> Self {
        Self::new(self.name.clone(), self.start, self.end)
    }

    /// Tier names in document order, duplicates included.
    pub fn tier_names(&self) -> Vec<&str> {
        self.tiers.iter().map(|t| t.name.as_str()).collect()
    }

    /// First tier with the given name.
    pub fn tier(&self, name: &str) -> Option<&IntervalTier> {
        self.tiers.iter().find(|t| t.name == name)
    }

    pub fn push(&mut self, tier: IntervalTier) {
        self.tiers.push(tier);
    }

    /// Append a tier, returning `self` for chaining.
    pub fn with_tier(mut self, tier: IntervalTier) -> Self {
        self.tiers.push(tier);
        self
    }
}

impl std::str::FromStr for TextGrid {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_textgrid(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_tier_spans_duration() {
        let tier = IntervalTier::blank("words", 0.0, 3.5);
        assert_eq!(tier.len(), 1);
        assert_eq!(tier.intervals[0].start, 0.0);
        assert_eq!(tier.intervals[0].end, 3.5);
        assert!(tier.intervals[0].is_blank());
    }

    #[test]
    fn test_blank_tier_zero_duration_has_no_interval() {
        let tier = IntervalTier::blank("words", 0.0, 0.0);
        assert!(tier.is_empty());
    }

    #[test]
    fn test_tier_lookup_returns_first() {
        let grid = TextGrid::new("f", 0.0, 1.0)
            .with_tier(IntervalTier::blank("A", 0.0, 1.0))
            .with_tier(IntervalTier::new("A", 0.0, 1.0));
        assert_eq!(grid.tier_names(), vec!["A", "A"]);
        assert_eq!(grid.tier("A").map(|t| t.len()), Some(1));
        assert!(grid.tier("B").is_none());
    }

    #[test]
    fn test_whitespace_label_is_blank() {
        assert!(Interval::new(0.0, 1.0, "  \t").is_blank());
        assert!(!Interval::new(0.0, 1.0, " a ").is_blank());
    }
}
