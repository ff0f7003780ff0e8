//! Mapped element names.
//!
//! A mapped name records where an element came from:
//!
//! ```text
//! <source>;<op>[:H<hex tag>],<type code>
//! ```
//!
//! `<source>` is a canonical name or another mapped name, so a name nests one
//! postfix per naming step. The outermost postfix starts at the last `;`. A
//! postfix without `:H` is a step inside the same shape and carries no tag.

use crate::{IndexedName, NamingError, ObjectTag, TopoKind};

/// Separator introducing a postfix inside a mapped name, and the marker for a
/// mapped element segment inside a sub-path.
pub const ELEMENT_MAP_PREFIX: char = ';';

/// Marker in front of the hex-encoded owner tag.
pub const TAG_MARKER: &str = ":H";

/// The outermost naming step of a mapped name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Postfix<'a> {
    pub source: &'a str,
    pub op: &'a str,
    /// 0 when the step is untagged.
    pub tag: ObjectTag,
    pub kind: TopoKind,
}

/// Split the outermost postfix off `name`, or `None` if `name` is not mapped.
pub fn parse_postfix(name: &str) -> Option<Postfix<'_>> {
    let split = name.rfind(ELEMENT_MAP_PREFIX)?;
    let source = &name[..split];
    if source.is_empty() {
        return None;
    }
    let (head, code) = name[split + 1..].rsplit_once(',')?;
    let mut chars = code.chars();
    let kind = TopoKind::from_type_code(chars.next()?)?;
    if chars.next().is_some() {
        return None;
    }
    let (op, tag) = match head.find(TAG_MARKER) {
        Some(pos) => (&head[..pos], parse_tag(&head[pos + TAG_MARKER.len()..])?),
        None => (head, 0),
    };
    Some(Postfix {
        source,
        op,
        tag,
        kind,
    })
}

fn parse_tag(text: &str) -> Option<ObjectTag> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    if digits.is_empty() {
        return None;
    }
    let value = ObjectTag::from_str_radix(digits, 16).ok()?;
    Some(if negative { -value } else { value })
}

fn write_tag(out: &mut String, tag: ObjectTag) {
    use std::fmt::Write;
    out.push_str(TAG_MARKER);
    if tag < 0 {
        out.push('-');
    }
    // Writing into a String cannot fail.
    let _ = write!(out, "{:x}", tag.unsigned_abs());
}

/// Append one naming step to `source`.
///
/// A zero `tag` produces an untagged (intra-shape) step.
pub fn compose(
    source: &str,
    op: &str,
    tag: ObjectTag,
    kind: TopoKind,
) -> Result<String, NamingError> {
    let code = kind
        .type_code()
        .ok_or(NamingError::UntypedElement { kind })?;
    if source.is_empty() || source.contains('.') {
        return Err(NamingError::InvalidSource {
            name: source.to_string(),
        });
    }
    if op.chars().any(|c| matches!(c, ';' | ',' | ':' | '.')) {
        return Err(NamingError::InvalidOp { op: op.to_string() });
    }
    let mut name = String::with_capacity(source.len() + op.len() + 16);
    name.push_str(source);
    name.push(ELEMENT_MAP_PREFIX);
    name.push_str(op);
    if tag != 0 {
        write_tag(&mut name, tag);
    }
    name.push(',');
    name.push(code);
    Ok(name)
}

pub fn is_mapped_name(name: &str) -> bool {
    parse_postfix(name).is_some()
}

/// Result of unwinding a mapped name down to its first tagged step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameHistory {
    /// Upstream tag, 0 when no tagged step exists.
    pub tag: ObjectTag,
    /// Pre-image name in the upstream shape (or the innermost name when the
    /// tag is 0).
    pub original: String,
    /// Names passed through inside the same shape before the tagged step.
    pub intermediates: Vec<String>,
    /// The tagged step is a bare `;:H<tag>` re-tag, written when a shape is
    /// adopted by another owner.
    pub adopted: bool,
}

/// Whether `postfix` is a bare re-tag step.
pub fn is_adoption(postfix: &Postfix<'_>) -> bool {
    postfix.op.is_empty() && postfix.tag != 0
}

/// Walk untagged postfixes from the outside in until a tagged one is found.
pub fn trace_name(name: &str) -> NameHistory {
    let mut current = name;
    let mut intermediates = Vec::new();
    while let Some(postfix) = parse_postfix(current) {
        if postfix.tag != 0 {
            return NameHistory {
                tag: postfix.tag,
                original: postfix.source.to_string(),
                intermediates,
                adopted: is_adoption(&postfix),
            };
        }
        intermediates.push(postfix.source.to_string());
        current = postfix.source;
    }
    // The innermost name is not an intermediate of anything.
    intermediates.pop();
    NameHistory {
        tag: 0,
        original: current.to_string(),
        intermediates,
        adopted: false,
    }
}

/// Classify an element name by topological kind.
///
/// Accepts canonical names, mapped names and `;`-prefixed sub-path element
/// references. Anything else is the generic [`TopoKind::Shape`].
pub fn element_type(name: &str) -> TopoKind {
    let (mapped, canonical) = split_element(name);
    if let Some(postfix) = mapped.and_then(parse_postfix) {
        return postfix.kind;
    }
    canonical
        .and_then(IndexedName::parse)
        .map(|n| n.kind)
        .unwrap_or(TopoKind::Shape)
}

/// Returns the mapped part of a `;`-prefixed element reference.
pub fn is_mapped_element(name: &str) -> Option<&str> {
    name.strip_prefix(ELEMENT_MAP_PREFIX)
}

/// Split an element reference into its mapped name and canonical hint.
///
/// `;<mapped>.<canonical>` yields both, `;<mapped>` only the mapped name,
/// and a bare name is treated as canonical. A bare mapped name (without the
/// leading `;`) is reported as mapped too.
pub fn split_element(element: &str) -> (Option<&str>, Option<&str>) {
    match is_mapped_element(element) {
        Some(rest) => match rest.rsplit_once('.') {
            Some((mapped, canonical)) => (Some(mapped), Some(canonical)),
            None => (Some(rest), None),
        },
        None if is_mapped_name(element) => (Some(element), None),
        None => (None, Some(element)),
    }
}

/// Return the element part of a dotted sub-path.
///
/// A mapped element starts at the first `;` that opens a segment and runs to
/// the end, dots included. Otherwise the element is whatever follows the last
/// `.`; an object-only path such as `Body.` has an empty element.
pub fn find_element_name(subpath: &str) -> &str {
    if let Some(pos) = subpath.find(ELEMENT_MAP_PREFIX) {
        if pos == 0 || subpath.as_bytes()[pos - 1] == b'.' {
            return &subpath[pos..];
        }
    }
    match subpath.rfind('.') {
        Some(pos) => &subpath[pos + 1..],
        None => subpath,
    }
}
