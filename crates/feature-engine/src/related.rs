use tracing::{debug, error, instrument};

use naming_types::{IndexedName, TopoKind};
use topo_shape::{RelatedElement, TopoShape};

use crate::history::element_source;
use crate::resolve::{resolve_shape, ResolveOptions, ShapeContext};
use crate::types::ObjectRef;

/// Elements of `object`'s shape sharing the ultimate upstream source of
/// `name`, in canonical order.
///
/// Results are cached on the resolved shape, both under the source identity
/// and under each member, until the shape is recomputed.
#[instrument(level = "debug", skip(ctx))]
pub fn related_elements(
    ctx: &mut ShapeContext<'_>,
    object: ObjectRef,
    name: &str,
    same_type: bool,
) -> Vec<RelatedElement> {
    let resolved = resolve_shape(ctx, object, "", &ResolveOptions::default());
    let (Some(owner), shape) = (resolved.owner, resolved.shape) else {
        return Vec::new();
    };
    if shape.is_null() {
        return Vec::new();
    }
    if let Some(found) = shape.related_elements(name, same_type) {
        if !found.is_empty() {
            debug!(count = found.len(), "related elements from shape cache");
            return found;
        }
    }

    let kind = TopoShape::element_type(name);
    if kind == TopoKind::Shape {
        return Vec::new();
    }
    let source = element_source(ctx, owner, &shape, name, Some(kind));
    if source.0 == 0 {
        return Vec::new();
    }
    if let Some(cached) = shape.related_elements_cached(&source.1, source.0, same_type) {
        return cached;
    }

    let count = match shape.count_sub_shapes(ctx.kernel.as_introspect(), kind) {
        Ok(count) => count,
        Err(e) => {
            error!(error = %e, "failed to count sub-shapes");
            return Vec::new();
        }
    };
    let check = same_type.then_some(kind);
    let mut related = Vec::new();
    for index in 1..=count {
        let canonical = IndexedName::new(kind, index);
        let element = canonical.to_string();
        let mapped = shape.mapped_name(&element);
        if mapped == element {
            continue;
        }
        if element_source(ctx, owner, &shape, &mapped, check) == source {
            related.push(RelatedElement { mapped, canonical });
        }
    }
    shape.cache_related_elements(&source.1, source.0, same_type, &related);
    debug!(count = related.len(), "related elements from history");
    related
}
