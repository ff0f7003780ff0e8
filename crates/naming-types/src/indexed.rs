use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{NamingError, TopoKind};

/// Canonical, positional element name: `<Prefix><1-based index>`.
///
/// Unstable across recomputation; the element map ties it to a mapped name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexedName {
    pub kind: TopoKind,
    pub index: usize,
}

impl IndexedName {
    pub fn new(kind: TopoKind, index: usize) -> Self {
        Self { kind, index }
    }

    /// Parse a canonical name. Returns `None` for anything that is not exactly
    /// a known prefix followed by a positive decimal index.
    pub fn parse(name: &str) -> Option<IndexedName> {
        let (kind, digits) = TopoKind::from_prefix(name)?;
        if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let index = digits.parse::<usize>().ok()?;
        Some(IndexedName { kind, index })
    }
}

impl fmt::Display for IndexedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.index)
    }
}

impl FromStr for IndexedName {
    type Err = NamingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IndexedName::parse(s).ok_or_else(|| NamingError::InvalidCanonicalName {
            name: s.to_string(),
        })
    }
}
