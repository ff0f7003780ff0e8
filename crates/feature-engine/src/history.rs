//! Element provenance across feature boundaries.

use std::collections::HashSet;

use tracing::{instrument, warn};

use naming_types::{NameHistory, ObjectTag, TopoKind};
use topo_shape::TopoShape;

use crate::graph::ObjectGraph;
use crate::resolve::{resolve_shape, ResolveOptions, ShapeContext};
use crate::types::{HistoryItem, ObjectRef};

/// Feature that introduced the tagged step of `history`, as seen from
/// `current`.
///
/// An adoption step carrying the current object's own tag crosses from a link
/// to its target. Any other tag lives in the document of the resolved link
/// target.
pub fn upstream_object(
    graph: &dyn ObjectGraph,
    current: ObjectRef,
    history: &NameHistory,
) -> Option<ObjectRef> {
    if history.tag == 0 {
        return None;
    }
    let linked = graph.linked_object(current);
    if history.adopted && history.tag == current.tag && linked != current {
        return Some(linked);
    }
    graph.object_by_id(linked.doc, history.tag)
}

/// Topological kind used for type checks, `None` for the generic kind.
fn checked_kind(name: &str) -> Option<TopoKind> {
    Some(TopoShape::element_type(name)).filter(|k| *k != TopoKind::Shape)
}

/// Provenance chain of `name` on `feature`, newest first.
///
/// Each item holds the name on one feature and the upstream tag it came from.
/// The chain ends with an owner-less root item (tag 0) once a name has no
/// tagged history. With `same_type`, the walk stops before crossing into a
/// name (or through an intermediate) of another kind. Without `recursive`,
/// only the first hop is taken and its pre-image is returned as is.
#[instrument(level = "debug", skip(ctx))]
pub fn element_history(
    ctx: &mut ShapeContext<'_>,
    feature: ObjectRef,
    name: &str,
    recursive: bool,
    same_type: bool,
) -> Vec<HistoryItem> {
    let mut items = Vec::new();
    let mut current = feature;
    let mut shape = ctx.shape_of(current);
    let mut mapped = shape.mapped_name(name);
    let kind = if same_type { checked_kind(name) } else { None };
    let mut visited = HashSet::new();

    loop {
        if !visited.insert(current) {
            warn!(object = %current, element = %mapped, "cyclic element history, stopping");
            break;
        }
        let history = shape.get_element_history(&mapped);
        if history.tag == 0 {
            items.push(HistoryItem {
                object: None,
                element: mapped,
                tag: 0,
                intermediates: history.intermediates,
            });
            break;
        }
        let upstream = upstream_object(ctx.graph, current, &history);
        items.push(HistoryItem {
            object: Some(current),
            element: mapped,
            tag: history.tag,
            intermediates: history.intermediates.clone(),
        });
        if !recursive {
            items.push(HistoryItem {
                object: upstream,
                element: history.original,
                tag: history.tag,
                intermediates: Vec::new(),
            });
            break;
        }
        let Some(next) = upstream else {
            break;
        };
        if let Some(kind) = kind {
            if history
                .intermediates
                .iter()
                .any(|h| TopoShape::element_type(h) != kind)
            {
                break;
            }
        }
        current = next;
        shape = ctx.shape_of(current);
        mapped = history.original;
        if kind.is_some_and(|k| TopoShape::element_type(&mapped) != k) {
            break;
        }
    }
    items
}

/// Ultimate source `(tag, name)` of `name` on `shape`, owned by `owner`.
///
/// With `kind`, the walk stops at the last step whose intermediates and
/// pre-image keep that kind. Tag 0 means no upstream source was found.
pub fn element_source(
    ctx: &mut ShapeContext<'_>,
    owner: ObjectRef,
    shape: &TopoShape,
    name: &str,
    kind: Option<TopoKind>,
) -> (ObjectTag, String) {
    let mut tag = 0;
    let mut name = name.to_string();
    let mut owner = owner;
    let mut shape = shape.clone();
    let mut visited = HashSet::from([owner]);

    loop {
        let history = shape.get_element_history(&name);
        if history.tag == 0 {
            break;
        }
        let Some(object) = upstream_object(ctx.graph, owner, &history) else {
            break;
        };
        if let Some(kind) = kind {
            if history
                .intermediates
                .iter()
                .any(|h| TopoShape::element_type(h) != kind)
            {
                return (tag, name);
            }
        }
        if !visited.insert(object) {
            warn!(object = %object, element = %name, "cyclic element source, stopping");
            break;
        }
        let resolved = resolve_shape(ctx, object, "", &ResolveOptions::default());
        let Some(next_owner) = resolved.owner else {
            break;
        };
        if resolved.shape.is_null() {
            break;
        }
        if kind.is_some_and(|k| TopoShape::element_type(&history.original) != k) {
            break;
        }
        name = history.original;
        tag = history.tag;
        owner = next_owner;
        shape = resolved.shape;
    }
    (tag, name)
}
