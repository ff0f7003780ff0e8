//! Assertion helpers with diagnostic output.
//!
//! Every failure names the context and shows expected against actual.

use naming_types::TopoKind;
use shape_kernel::ShapeIntrospect;
use topo_shape::TopoShape;

use feature_engine::HistoryItem;

use crate::helpers::HarnessError;

/// Assert exact topology counts (V, E, F) for a shape.
pub fn assert_topology_eq(
    kernel: &dyn ShapeIntrospect,
    shape: &TopoShape,
    expected: (usize, usize, usize),
    ctx: &str,
) -> Result<(), HarnessError> {
    let count = |kind: TopoKind| {
        shape
            .count_sub_shapes(kernel, kind)
            .map_err(|e| HarnessError::AssertionFailed {
                detail: format!("[{ctx}] counting {kind:?}: {e}"),
            })
    };
    let actual = (
        count(TopoKind::Vertex)?,
        count(TopoKind::Edge)?,
        count(TopoKind::Face)?,
    );
    if actual == expected {
        return Ok(());
    }
    Err(HarnessError::AssertionFailed {
        detail: format!(
            "[{ctx}] expected V={} E={} F={}, got V={} E={} F={}",
            expected.0, expected.1, expected.2, actual.0, actual.1, actual.2,
        ),
    })
}

/// Assert the mapped name of each `(canonical, mapped)` pair.
pub fn assert_element_names(
    shape: &TopoShape,
    expected: &[(&str, &str)],
    ctx: &str,
) -> Result<(), HarnessError> {
    let wrong: Vec<String> = expected
        .iter()
        .filter_map(|(element, mapped)| {
            let actual = shape.mapped_name(element);
            (actual != *mapped).then(|| format!("{element}: expected {mapped}, got {actual}"))
        })
        .collect();
    if wrong.is_empty() {
        return Ok(());
    }
    Err(HarnessError::AssertionFailed {
        detail: format!("[{ctx}] {}", wrong.join("; ")),
    })
}

/// Assert the element names along a history chain, newest first.
pub fn assert_history_elements(
    items: &[HistoryItem],
    expected: &[&str],
    ctx: &str,
) -> Result<(), HarnessError> {
    let actual: Vec<&str> = items.iter().map(|i| i.element.as_str()).collect();
    if actual == expected {
        return Ok(());
    }
    Err(HarnessError::AssertionFailed {
        detail: format!("[{ctx}] history expected {expected:?}, got {actual:?}"),
    })
}
