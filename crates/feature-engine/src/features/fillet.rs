use std::any::Any;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use naming_types::{IndexedName, TopoKind};
use topo_shape::TopoShape;

use crate::feature::{ElementLinks, FeatureBehavior};
use crate::resolve::ShapeContext;
use crate::types::{FeatureError, ObjectRef};

pub const BASE: &str = "Base";
pub const EDGES: &str = "Edges";
pub const EDGE_LINKS: &str = "EdgeLinks";

const FILLET_OP: &str = "FLT";

/// One rounded edge: its 1-based index on the base shape and the radii at
/// both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilletElement {
    pub edge_id: usize,
    pub radius1: f64,
    pub radius2: f64,
}

impl FilletElement {
    pub fn new(edge_id: usize, radius: f64) -> Self {
        Self {
            edge_id,
            radius1: radius,
            radius2: radius,
        }
    }
}

/// Rounds edges of a base feature's shape.
///
/// `edge_links` mirrors `edges` as `Edge<id>` references into the base, and
/// is what keeps the selection attached when upstream edges are renumbered.
#[derive(Debug, Clone, PartialEq)]
pub struct FilletFeature {
    pub base: Option<ObjectRef>,
    pub edges: Vec<FilletElement>,
    edge_links: ElementLinks,
    touched: BTreeSet<&'static str>,
}

impl FilletFeature {
    pub fn new(base: ObjectRef, edges: Vec<FilletElement>) -> Self {
        let mut feature = Self {
            base: Some(base),
            edges,
            edge_links: ElementLinks::default(),
            touched: [BASE, EDGES].into_iter().collect(),
        };
        feature.sync_edge_links();
        feature
    }

    pub fn edge_links(&self) -> &ElementLinks {
        &self.edge_links
    }

    /// Rebuild the edge links from `edges`.
    fn sync_edge_links(&mut self) {
        match self.base {
            Some(base) if !self.edges.is_empty() => {
                let subs = self
                    .edges
                    .iter()
                    .map(|e| IndexedName::new(TopoKind::Edge, e.edge_id).to_string())
                    .collect();
                self.edge_links = ElementLinks::new(base, subs);
            }
            _ => self.edge_links = ElementLinks::default(),
        }
        self.touched.insert(EDGE_LINKS);
    }

    /// Read edge ids back from the link names.
    fn edges_from_links(&mut self) {
        let subs = &self.edge_links.subs;
        let count = self.edges.len();
        for (i, edge) in self.edges.iter_mut().enumerate() {
            let Some(sub) = subs.get(i) else {
                warn!(
                    edges = count,
                    links = subs.len(),
                    "fillet edge count mismatch"
                );
                break;
            };
            match IndexedName::parse(sub).filter(|n| n.kind == TopoKind::Edge) {
                Some(name) => edge.edge_id = name.index,
                None => warn!(link = %sub, "invalid fillet edge link"),
            }
        }
        self.touched.insert(EDGES);
    }
}

impl FeatureBehavior for FilletFeature {
    fn type_name(&self) -> &str {
        "Part::Fillet"
    }

    fn dependencies(&self) -> Vec<ObjectRef> {
        self.base.into_iter().collect()
    }

    fn compute(
        &self,
        ctx: &mut ShapeContext<'_>,
        this: ObjectRef,
    ) -> Result<TopoShape, FeatureError> {
        let base_ref = self.base.ok_or_else(|| FeatureError::MissingInput {
            what: "fillet has no base".into(),
        })?;
        let base = ctx.shape_of(base_ref);
        let Some(solid) = base.geometry() else {
            return Err(FeatureError::MissingInput {
                what: format!("base {base_ref} has no shape"),
            });
        };
        if self.edges.is_empty() {
            return Err(FeatureError::InvalidParameter {
                reason: "no edges selected".into(),
            });
        }
        let edges: Vec<(usize, f64)> = self
            .edges
            .iter()
            .map(|e| (e.edge_id, e.radius1))
            .collect();
        let rounded = ctx.kernel.fillet_edges(solid, &edges)?;
        Ok(TopoShape::make_shape_with_history(
            rounded.shape,
            &[&base],
            &rounded.history,
            FILLET_OP,
            this.tag,
        )?)
    }

    fn must_execute(&self) -> bool {
        [BASE, EDGES, EDGE_LINKS]
            .iter()
            .any(|p| self.touched.contains(p))
    }

    fn purge_touched(&mut self) {
        self.touched.clear();
    }

    fn on_changed(&mut self, property: &str, restoring: bool) {
        match property {
            BASE => {
                self.touched.insert(BASE);
            }
            EDGES => {
                self.touched.insert(EDGES);
            }
            _ => return,
        }
        if !restoring {
            self.sync_edge_links();
        }
    }

    fn on_document_restored(&mut self) {
        if self.edge_links.is_empty() {
            self.sync_edge_links();
        }
    }

    fn element_links(&self) -> Vec<(&'static str, ElementLinks)> {
        vec![(EDGE_LINKS, self.edge_links.clone())]
    }

    fn set_element_links(&mut self, property: &str, links: ElementLinks) {
        if property == EDGE_LINKS {
            self.edge_links = links;
        }
    }

    fn on_update_element_reference(&mut self, property: &str) {
        if property == EDGE_LINKS {
            self.edges_from_links();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
