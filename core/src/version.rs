//! RubyGems-style version values.
//!
//! A version is split into segments: maximal runs of ASCII digits become
//! numeric segments, maximal runs of letters become textual segments and
//! every other character separates segments. Comparison pads the shorter
//! side with `0`, compares numbers numerically and text lexically, and
//! sorts text before numbers so `1.0.a` < `1.0` < `1.0.1`.

use crate::error::{GemauditError, Result};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A non-negative integer of arbitrary width, stored without leading zeros.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Numeric(String);

impl Numeric {
    fn new(digits: &str) -> Self {
        let trimmed = digits.trim_start_matches('0');
        Numeric(trimmed.to_string())
    }

    fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    fn increment(&self) -> Self {
        let mut digits: Vec<u8> = self.0.bytes().collect();
        let mut carry = true;
        for d in digits.iter_mut().rev() {
            if !carry {
                break;
            }
            if *d == b'9' {
                *d = b'0';
            } else {
                *d += 1;
                carry = false;
            }
        }
        if carry {
            digits.insert(0, b'1');
        }
        Numeric(String::from_utf8_lossy(&digits).into_owned())
    }
}

impl Ord for Numeric {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Numeric {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "0")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// One segment of a version. Declaration order matters: textual segments
/// sort before numeric ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Segment {
    Text(String),
    Number(Numeric),
}

impl Segment {
    fn zero() -> Self {
        Segment::Number(Numeric(String::new()))
    }

    fn is_zero(&self) -> bool {
        matches!(self, Segment::Number(n) if n.is_zero())
    }

    fn is_text(&self) -> bool {
        matches!(self, Segment::Text(_))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Text(s) => write!(f, "{}", s),
            Segment::Number(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    segments: Vec<Segment>,
}

impl Version {
    pub fn parse(input: &str) -> Result<Self> {
        let raw = input.trim();
        let segments = tokenize(raw);

        if segments.is_empty() {
            return Err(GemauditError::parse(input, "no version segments found"));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when any segment is textual (`1.0.0.beta`, `2.0-rc1`).
    pub fn is_prerelease(&self) -> bool {
        self.segments.iter().any(Segment::is_text)
    }

    /// The version with its pre-release tail removed: everything from the
    /// first textual segment onward is dropped.
    pub fn release(&self) -> Self {
        if !self.is_prerelease() {
            return self.clone();
        }

        let segments: Vec<Segment> = self
            .segments
            .iter()
            .take_while(|s| !s.is_text())
            .cloned()
            .collect();

        Self::from_segments(if segments.is_empty() {
            vec![Segment::zero()]
        } else {
            segments
        })
    }

    /// The upper bound of a pessimistic constraint: drop pre-release
    /// segments, drop the last segment (unless it is the only one) and
    /// increment the new last segment. `2.3.1` bumps to `2.4`, `2` to `3`.
    pub fn bump(&self) -> Self {
        let mut segments = self.release().segments;

        if segments.len() > 1 {
            segments.pop();
        }

        if let Some(Segment::Number(last)) = segments.last_mut() {
            *last = last.increment();
        }

        Self::from_segments(segments)
    }

    fn from_segments(segments: Vec<Segment>) -> Self {
        let raw = segments
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(".");
        Self { raw, segments }
    }

    /// Segments with trailing zeros removed; two versions are equal exactly
    /// when their canonical segments are equal.
    fn canonical(&self) -> &[Segment] {
        let end = self
            .segments
            .iter()
            .rposition(|s| !s.is_zero())
            .map(|i| i + 1)
            .unwrap_or(0);
        &self.segments[..end]
    }
}

fn tokenize(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();

    let flush = |current: &mut String, segments: &mut Vec<Segment>| {
        if current.is_empty() {
            return;
        }
        if current.bytes().all(|b| b.is_ascii_digit()) {
            segments.push(Segment::Number(Numeric::new(current)));
        } else {
            segments.push(Segment::Text(current.clone()));
        }
        current.clear();
    };

    for c in input.chars() {
        if c.is_ascii_digit() {
            if current.chars().last().is_some_and(|p| !p.is_ascii_digit()) {
                flush(&mut current, &mut segments);
            }
            current.push(c);
        } else if c.is_alphabetic() {
            if current.chars().last().is_some_and(|p| p.is_ascii_digit()) {
                flush(&mut current, &mut segments);
            }
            current.push(c);
        } else {
            flush(&mut current, &mut segments);
        }
    }
    flush(&mut current, &mut segments);

    segments
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        let zero = Segment::zero();

        for i in 0..len {
            let lhs = self.segments.get(i).unwrap_or(&zero);
            let rhs = other.segments.get(i).unwrap_or(&zero);
            match lhs.cmp(rhs) {
                Ordering::Equal => continue,
                ordering => return ordering,
            }
        }

        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl FromStr for Version {
    type Err = GemauditError;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}
