//! Praat TextGrid text format.
//!
//! Both the long ("ooTextFile" with `key = value` lines) and the short
//! format carry the same sequence of quoted strings and numbers, so the
//! parser tokenizes the text into that sequence and ignores keys, item
//! indices (`[1]`), `<exists>` flags and `!` comments. Only interval tiers
//! are supported; point tiers (`TextTier`) are rejected.

use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;

use super::{Interval, IntervalTier, TextGrid};

/// Errors produced while reading TextGrid text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("not a TextGrid file: {0}")]
    Header(String),

    #[error("unexpected end of file while reading {expected}")]
    UnexpectedEnd { expected: String },

    #[error("expected {expected}, found {found}")]
    Unexpected { expected: String, found: String },

    #[error("unsupported tier class {class:?} for tier {tier:?}: only IntervalTier is supported")]
    UnsupportedTierClass { class: String, tier: String },

    #[error("invalid count {value} for {what}")]
    InvalidCount { what: String, value: f64 },

    #[error("file is not valid UTF-8 or UTF-16 text")]
    Encoding,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Num(f64),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Str(s) => format!("string {s:?}"),
            Token::Num(n) => format!("number {n}"),
        }
    }
}

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#""((?:[^"]|"")*)"|(-?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][-+]?\d+)?)|\[[^\]]*\]|<[^>]*>|![^\n]*"#,
        )
        .expect("static TextGrid token pattern is valid")
    })
}

fn tokenize(text: &str) -> Vec<Token> {
    token_regex()
        .captures_iter(text)
        .filter_map(|caps| {
            if let Some(s) = caps.get(1) {
                Some(Token::Str(s.as_str().replace("\"\"", "\"")))
            } else {
                caps.get(2)
                    .and_then(|n| n.as_str().parse::<f64>().ok())
                    .map(Token::Num)
            }
        })
        .collect()
}

struct Tokens {
    tokens: std::vec::IntoIter<Token>,
}

impl Tokens {
    fn next_str(&mut self, expected: &str) -> Result<String, ParseError> {
        match self.tokens.next() {
            Some(Token::Str(s)) => Ok(s),
            Some(other) => Err(ParseError::Unexpected {
                expected: expected.to_string(),
                found: other.describe(),
            }),
            None => Err(ParseError::UnexpectedEnd {
                expected: expected.to_string(),
            }),
        }
    }

    fn next_num(&mut self, expected: &str) -> Result<f64, ParseError> {
        match self.tokens.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(other) => Err(ParseError::Unexpected {
                expected: expected.to_string(),
                found: other.describe(),
            }),
            None => Err(ParseError::UnexpectedEnd {
                expected: expected.to_string(),
            }),
        }
    }

    /// Read an item count; each item needs at least `width` more tokens.
    fn next_count(&mut self, what: &str, width: usize) -> Result<usize, ParseError> {
        let value = self.next_num(what)?;
        let available = self.tokens.len() / width;
        if value < 0.0 || value.fract() != 0.0 || value > available as f64 {
            return Err(ParseError::InvalidCount {
                what: what.to_string(),
                value,
            });
        }
        Ok(value as usize)
    }

    fn is_exhausted(&self) -> bool {
        self.tokens.as_slice().is_empty()
    }
}

/// Parse TextGrid text (long or short format).
pub fn parse_textgrid(text: &str) -> Result<TextGrid, ParseError> {
    let mut tokens = Tokens {
        tokens: tokenize(text).into_iter(),
    };

    let file_type = tokens
        .next_str("file type")
        .map_err(|_| ParseError::Header("missing \"ooTextFile\" file type".to_string()))?;
    if file_type != "ooTextFile" {
        return Err(ParseError::Header(format!("unknown file type {file_type:?}")));
    }
    let object_class = tokens.next_str("object class")?;
    if object_class != "TextGrid" {
        return Err(ParseError::Header(format!(
            "object class is {object_class:?}, not \"TextGrid\""
        )));
    }

    let start = tokens.next_num("TextGrid xmin")?;
    let end = tokens.next_num("TextGrid xmax")?;
    let mut grid = TextGrid::new("", start, end);

    // `tiers? <absent>` files stop right after the time span
    if tokens.is_exhausted() {
        return Ok(grid);
    }

    let tier_count = tokens.next_count("tier count", 5)?;
    for _ in 0..tier_count {
        let class = tokens.next_str("tier class")?;
        let name = tokens.next_str("tier name")?;
        if class != "IntervalTier" {
            return Err(ParseError::UnsupportedTierClass { class, tier: name });
        }
        let tier_start = tokens.next_num("tier xmin")?;
        let tier_end = tokens.next_num("tier xmax")?;
        let mut tier = IntervalTier::new(name, tier_start, tier_end);

        let interval_count = tokens.next_count("interval count", 3)?;
        for _ in 0..interval_count {
            let start = tokens.next_num("interval xmin")?;
            let end = tokens.next_num("interval xmax")?;
            let label = tokens.next_str("interval text")?;
            tier.intervals.push(Interval { start, end, label });
        }
        grid.tiers.push(tier);
    }

    Ok(grid)
}

fn quote(label: &str) -> String {
    format!("\"{}\"", label.replace('"', "\"\""))
}

/// Serialize a grid to the Praat long text format.
pub fn write_textgrid(grid: &TextGrid) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "File type = \"ooTextFile\"");
    let _ = writeln!(out, "Object class = \"TextGrid\"");
    let _ = writeln!(out);
    let _ = writeln!(out, "xmin = {} ", grid.start);
    let _ = writeln!(out, "xmax = {} ", grid.end);
    if grid.tiers.is_empty() {
        let _ = writeln!(out, "tiers? <absent> ");
        return out;
    }
    let _ = writeln!(out, "tiers? <exists> ");
    let _ = writeln!(out, "size = {} ", grid.tiers.len());
    let _ = writeln!(out, "item []: ");
    for (i, tier) in grid.tiers.iter().enumerate() {
        let _ = writeln!(out, "    item [{}]:", i + 1);
        let _ = writeln!(out, "        class = \"IntervalTier\" ");
        let _ = writeln!(out, "        name = {} ", quote(&tier.name));
        let _ = writeln!(out, "        xmin = {} ", tier.start);
        let _ = writeln!(out, "        xmax = {} ", tier.end);
        let _ = writeln!(out, "        intervals: size = {} ", tier.intervals.len());
        for (j, interval) in tier.intervals.iter().enumerate() {
            let _ = writeln!(out, "        intervals [{}]:", j + 1);
            let _ = writeln!(out, "            xmin = {} ", interval.start);
            let _ = writeln!(out, "            xmax = {} ", interval.end);
            let _ = writeln!(out, "            text = {} ", quote(&interval.label));
        }
    }
    out
}

/// Decode uploaded file bytes. Praat writes either UTF-8 or UTF-16 with a
/// byte-order mark.
pub fn decode_textgrid_bytes(bytes: &[u8]) -> Result<String, ParseError> {
    fn utf16(bytes: &[u8], big_endian: bool) -> Result<String, ParseError> {
        if bytes.len() % 2 != 0 {
            return Err(ParseError::Encoding);
        }
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| {
                if big_endian {
                    u16::from_be_bytes([c[0], c[1]])
                } else {
                    u16::from_le_bytes([c[0], c[1]])
                }
            })
            .collect();
        String::from_utf16(&units).map_err(|_| ParseError::Encoding)
    }

    match bytes {
        [0xFE, 0xFF, rest @ ..] => utf16(rest, true),
        [0xFF, 0xFE, rest @ ..] => utf16(rest, false),
        [0xEF, 0xBB, 0xBF, rest @ ..] => {
            String::from_utf8(rest.to_vec()).map_err(|_| ParseError::Encoding)
        }
        _ => String::from_utf8(bytes.to_vec()).map_err(|_| ParseError::Encoding),
    }
}
