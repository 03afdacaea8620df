//! Index labels for tensor references in Einstein notation.
use crate::error::Error;
use serde::{Serialize, Serializer};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// An ordered list of index labels attached to a tensor reference, e.g. `kp` in `Q['kp']`.
///
/// Every label is a single ASCII letter, and no label occurs more than once.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Indices {
    labels: Vec<char>,
}

impl Indices {
    /// Parses a label string such as `"kp"`.
    pub fn parse(labels: &str) -> Result<Self, Error> {
        let mut parsed: Vec<char> = Vec::with_capacity(labels.len());
        for label in labels.chars() {
            if !label.is_ascii_alphabetic() {
                return Err(Error::InvalidIndices {
                    indices: labels.to_string(),
                    reason: "index labels must be ASCII letters",
                });
            }
            if parsed.contains(&label) {
                return Err(Error::InvalidIndices {
                    indices: labels.to_string(),
                    reason: "index labels must be unique within a tensor reference",
                });
            }
            parsed.push(label);
        }
        Ok(Self { labels: parsed })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn as_slice(&self) -> &[char] {
        &self.labels
    }

    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.labels.iter().copied()
    }

    pub fn contains(&self, label: char) -> bool {
        self.labels.contains(&label)
    }

    pub fn position(&self, label: char) -> Option<usize> {
        self.labels.iter().position(|&l| l == label)
    }

    /// The labels in reverse order.
    ///
    /// Used when a matrix is stored transposed, so that the same equation can be written for
    /// both layouts.
    pub fn reversed(&self) -> Self {
        Self {
            labels: self.labels.iter().rev().copied().collect(),
        }
    }

    /// Inserts `label` before position `pos`.
    pub fn inserted(&self, pos: usize, label: char) -> Result<Self, Error> {
        assert!(pos <= self.len(), "Insertion position out of bounds");
        let mut labels = self.labels.clone();
        labels.insert(pos, label);
        let labels: String = labels.into_iter().collect();
        Self::parse(&labels)
    }
}

impl FromStr for Indices {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for Indices {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for label in &self.labels {
            write!(f, "{}", label)?;
        }
        Ok(())
    }
}

impl Serialize for Indices {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
