use serde::{Deserialize, Serialize};

/// The kind of topological entity.
///
/// `Shape` is the generic kind: it has neither a canonical prefix nor a type
/// code, and is what classification falls back to for unrecognized names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TopoKind {
    Vertex,
    Edge,
    Face,
    Wire,
    Shell,
    Solid,
    CompSolid,
    Compound,
    Shape,
}

impl TopoKind {
    /// Every kind that can be addressed by a canonical element name.
    pub const ADDRESSABLE: [TopoKind; 8] = [
        TopoKind::Vertex,
        TopoKind::Edge,
        TopoKind::Face,
        TopoKind::Wire,
        TopoKind::Shell,
        TopoKind::Solid,
        TopoKind::CompSolid,
        TopoKind::Compound,
    ];

    /// Canonical name prefix, e.g. `"Edge"` for `Edge3`.
    pub fn prefix(self) -> Option<&'static str> {
        match self {
            TopoKind::Vertex => Some("Vertex"),
            TopoKind::Edge => Some("Edge"),
            TopoKind::Face => Some("Face"),
            TopoKind::Wire => Some("Wire"),
            TopoKind::Shell => Some("Shell"),
            TopoKind::Solid => Some("Solid"),
            TopoKind::CompSolid => Some("CompSolid"),
            TopoKind::Compound => Some("Compound"),
            TopoKind::Shape => None,
        }
    }

    /// One-character type code embedded at the end of mapped names.
    pub fn type_code(self) -> Option<char> {
        match self {
            TopoKind::Vertex => Some('V'),
            TopoKind::Edge => Some('E'),
            TopoKind::Face => Some('F'),
            TopoKind::Wire => Some('W'),
            TopoKind::Shell => Some('S'),
            TopoKind::Solid => Some('O'),
            TopoKind::CompSolid => Some('P'),
            TopoKind::Compound => Some('C'),
            TopoKind::Shape => None,
        }
    }

    pub fn from_type_code(code: char) -> Option<TopoKind> {
        Self::ADDRESSABLE
            .into_iter()
            .find(|kind| kind.type_code() == Some(code))
    }

    /// Match the longest known prefix at the start of `name`, returning the
    /// kind and the remaining text.
    pub fn from_prefix(name: &str) -> Option<(TopoKind, &str)> {
        Self::ADDRESSABLE
            .into_iter()
            .filter_map(|kind| {
                let prefix = kind.prefix()?;
                name.strip_prefix(prefix).map(|rest| (kind, prefix.len(), rest))
            })
            .max_by_key(|(_, len, _)| *len)
            .map(|(kind, _, rest)| (kind, rest))
    }
}

impl std::fmt::Display for TopoKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix().unwrap_or("Shape"))
    }
}
