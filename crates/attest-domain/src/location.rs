//! Line ranges within a source document

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Inclusive, 1-indexed range of source lines
///
/// The textual form is `"Lines N-M"`, which is also how ranges appear in
/// persisted fact records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineRange {
    /// First line (1-indexed)
    pub start: usize,

    /// Last line, inclusive
    pub end: usize,
}

/// Error returned when a line range string cannot be parsed
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid line range: '{0}'")]
pub struct ParseRangeError(pub String);

impl LineRange {
    /// Create a range, swapping the bounds if they are reversed
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    /// Range covering a single line
    pub fn single(line: usize) -> Self {
        Self { start: line, end: line }
    }

    /// Number of lines covered
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Ranges always cover at least one line
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Check whether a line falls inside the range
    pub fn contains(&self, line: usize) -> bool {
        line >= self.start && line <= self.end
    }

    /// Grow the range by `lines` on both sides, clamped to `1..=max_line`
    pub fn expand(&self, lines: usize, max_line: usize) -> Self {
        let start = self.start.saturating_sub(lines).max(1);
        let end = (self.end + lines).min(max_line.max(1));
        Self::new(start.min(end), end)
    }

    /// Clamp the range to `1..=max_line`
    pub fn clamp_to(&self, max_line: usize) -> Self {
        let max_line = max_line.max(1);
        Self::new(self.start.clamp(1, max_line), self.end.clamp(1, max_line))
    }

    /// Smallest range covering both `self` and `other`
    pub fn union(&self, other: &LineRange) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Smallest range covering every range in the iterator
    pub fn covering<'a, I>(ranges: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a LineRange>,
    {
        ranges.into_iter().fold(None, |acc, r| match acc {
            None => Some(*r),
            Some(a) => Some(a.union(r)),
        })
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lines {}-{}", self.start, self.end)
    }
}

impl FromStr for LineRange {
    type Err = ParseRangeError;

    /// Accepts `"Lines N-M"`, `"Line N"`, `"N-M"` and `"N"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseRangeError(s.to_string());
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        let body = lower
            .strip_prefix("lines")
            .or_else(|| lower.strip_prefix("line"))
            .unwrap_or(&lower)
            .trim();

        let parse_num = |part: &str| -> Result<usize, ParseRangeError> {
            match part.trim().parse::<usize>() {
                Ok(0) | Err(_) => Err(err()),
                Ok(n) => Ok(n),
            }
        };

        match body.split_once(['-', '\u{2013}']) {
            Some((a, b)) => Ok(Self::new(parse_num(a)?, parse_num(b)?)),
            None => Ok(Self::single(parse_num(body)?)),
        }
    }
}

impl Serialize for LineRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LineRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
