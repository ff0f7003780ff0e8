//! Document recompute: dependency ordering, element-link upkeep and the
//! per-feature error boundary.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, error, info, warn};

use naming_types::ObjectTag;
use shape_kernel::ShapeKernel;

use crate::document::{ObjectKind, Workspace};
use crate::feature::ElementLinks;
use crate::resolve::ShapeContext;
use crate::types::{DocumentId, EngineError, FeatureStatus, ObjectRef};

/// Outcome of one recompute pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecomputeReport {
    /// Objects whose output changed, in evaluation order.
    pub recomputed: Vec<ObjectRef>,
    /// Features whose compute failed, with the recorded message.
    pub errors: Vec<(ObjectRef, String)>,
}

impl RecomputeReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Workspace {
    /// Recompute every feature of `doc` that is out of date.
    ///
    /// A feature runs when it was edited, reports `must_execute`, has no
    /// shape yet, or depends on an object recomputed earlier in the pass.
    /// A failing feature is marked failed and keeps its previous shape; the
    /// pass carries on with the rest of the document.
    pub fn recompute(
        &mut self,
        doc: DocumentId,
        kernel: &mut dyn ShapeKernel,
    ) -> Result<RecomputeReport, EngineError> {
        let order = self.evaluation_order(doc)?;
        let mut report = RecomputeReport::default();
        let mut changed: HashSet<ObjectRef> = HashSet::new();

        for tag in order {
            let object = ObjectRef { doc, tag };
            let upstream_changed = self
                .dependencies_of(object)
                .iter()
                .any(|d| changed.contains(d));
            let Some(found) = self.object(object) else {
                continue;
            };
            let part = match &found.kind {
                ObjectKind::Part(part) => part,
                ObjectKind::Group(_) | ObjectKind::Link(_) => {
                    if upstream_changed {
                        changed.insert(object);
                        report.recomputed.push(object);
                    }
                    continue;
                }
            };
            let needed = part.touched
                || part.behavior.must_execute()
                || part.shape.is_null()
                || upstream_changed;
            if !needed {
                continue;
            }
            let name = found.name.clone();

            self.refresh_element_links(object)?;

            let result = {
                let Some(part) = self.object(object).and_then(|o| o.as_part()) else {
                    continue;
                };
                let mut ctx = ShapeContext::new(&*self, &mut *kernel, &self.settings);
                part.behavior.compute(&mut ctx, object)
            };

            match result {
                Ok(shape) => {
                    let links = self.updated_shadows(object);
                    let part = self.part_mut(object)?;
                    part.set_shape(shape, true);
                    for (property, links) in links {
                        part.behavior.set_element_links(property, links);
                    }
                    part.behavior.purge_touched();
                    part.touched = false;
                    part.status = FeatureStatus::Valid;
                    debug!(object = %name, "recomputed");
                    changed.insert(object);
                    report.recomputed.push(object);
                }
                Err(err) => {
                    let message = err.to_string();
                    error!(object = %name, error = %message, "recompute failed");
                    let part = self.part_mut(object)?;
                    part.status = FeatureStatus::Failed {
                        message: message.clone(),
                    };
                    report.errors.push((object, message));
                }
            }
        }

        info!(
            recomputed = report.recomputed.len(),
            failed = report.errors.len(),
            "recompute finished"
        );
        Ok(report)
    }

    /// Same-document objects `object` reads from.
    fn dependencies_of(&self, object: ObjectRef) -> Vec<ObjectRef> {
        let Some(found) = self.object(object) else {
            return Vec::new();
        };
        let deps: Vec<ObjectRef> = match &found.kind {
            ObjectKind::Part(part) => part.behavior.dependencies(),
            ObjectKind::Group(group) => group
                .children
                .iter()
                .map(|&tag| ObjectRef {
                    doc: object.doc,
                    tag,
                })
                .collect(),
            ObjectKind::Link(link) => vec![link.target],
        };
        deps.into_iter().filter(|d| d.doc == object.doc).collect()
    }

    /// Topological order of the document's objects. Ties resolve by tag,
    /// i.e. creation order.
    fn evaluation_order(&self, doc: DocumentId) -> Result<Vec<ObjectTag>, EngineError> {
        let document = self
            .document(doc)
            .ok_or(EngineError::DocumentNotFound { doc })?;

        let mut pending: BTreeMap<ObjectTag, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<ObjectTag, Vec<ObjectTag>> = BTreeMap::new();
        for object in document.objects() {
            let deps: BTreeSet<ObjectTag> = self
                .dependencies_of(ObjectRef {
                    doc,
                    tag: object.tag,
                })
                .into_iter()
                .map(|d| d.tag)
                .filter(|tag| document.object(*tag).is_some())
                .collect();
            pending.insert(object.tag, deps.len());
            for dep in deps {
                dependents.entry(dep).or_default().push(object.tag);
            }
        }

        let mut ready: BTreeSet<ObjectTag> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(tag, _)| *tag)
            .collect();
        let mut order = Vec::with_capacity(pending.len());
        while let Some(tag) = ready.pop_first() {
            order.push(tag);
            for dependent in dependents.get(&tag).into_iter().flatten() {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }

        if order.len() < pending.len() {
            let placed: HashSet<ObjectTag> = order.iter().copied().collect();
            let objects = pending
                .keys()
                .filter(|tag| !placed.contains(tag))
                .filter_map(|tag| document.object(*tag))
                .map(|o| o.name.clone())
                .collect();
            return Err(EngineError::CyclicDependency { objects });
        }
        Ok(order)
    }

    /// Re-point element links whose recorded mapped name now lives at a
    /// different index of the base shape.
    fn refresh_element_links(&mut self, object: ObjectRef) -> Result<(), EngineError> {
        let Some(part) = self.object(object).and_then(|o| o.as_part()) else {
            return Ok(());
        };
        let mut updates = Vec::new();
        for (property, mut links) in part.behavior.element_links() {
            let Some(base) = links.base.and_then(|b| self.shape(b)) else {
                continue;
            };
            let mut remapped = false;
            for (sub, shadow) in links.subs.iter_mut().zip(&links.shadows) {
                let Some(shadow) = shadow else {
                    continue;
                };
                match base.element_map().indexed(shadow) {
                    Some(element) => {
                        let current = element.to_string();
                        if *sub != current {
                            debug!(property, from = %sub, to = %current, "remapped element link");
                            *sub = current;
                            remapped = true;
                        }
                    }
                    None => warn!(property, element = %sub, shadow = %shadow, "element link lost its mapped name"),
                }
            }
            if remapped {
                updates.push((property, links));
            }
        }
        if updates.is_empty() {
            return Ok(());
        }
        let part = self.part_mut(object)?;
        for (property, links) in updates {
            part.behavior.set_element_links(property, links);
            part.behavior.on_update_element_reference(property);
        }
        Ok(())
    }

    /// Element links with shadows recorded from the current base shapes.
    fn updated_shadows(&self, object: ObjectRef) -> Vec<(&'static str, ElementLinks)> {
        let Some(part) = self.object(object).and_then(|o| o.as_part()) else {
            return Vec::new();
        };
        part.behavior
            .element_links()
            .into_iter()
            .filter_map(|(property, mut links)| {
                let base = links.base.and_then(|b| self.shape(b))?;
                links.shadows = links
                    .subs
                    .iter()
                    .map(|sub| {
                        let mapped = base.mapped_name(sub);
                        (mapped != *sub).then_some(mapped)
                    })
                    .collect();
                Some((property, links))
            })
            .collect()
    }
}
