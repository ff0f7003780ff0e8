use std::collections::{BTreeMap, HashMap};

use naming_types::{parse_postfix, trace_name, IndexedName};

use crate::ShapeError;

/// Bidirectional map between canonical element names and mapped names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementMap {
    to_mapped: BTreeMap<IndexedName, String>,
    to_indexed: HashMap<String, IndexedName>,
}

impl ElementMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.to_mapped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_mapped.is_empty()
    }

    pub fn mapped(&self, element: &IndexedName) -> Option<&str> {
        self.to_mapped.get(element).map(String::as_str)
    }

    pub fn indexed(&self, mapped: &str) -> Option<IndexedName> {
        self.to_indexed.get(mapped).copied()
    }

    /// Entries in canonical order (by kind, then index).
    pub fn iter(&self) -> impl Iterator<Item = (&IndexedName, &str)> {
        self.to_mapped.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// Name `element`.
    ///
    /// An element already named from a different upstream tag keeps its name:
    /// replacing it is what re-tagging is for.
    pub fn set_element_name(
        &mut self,
        element: IndexedName,
        mapped: String,
    ) -> Result<(), ShapeError> {
        match parse_postfix(&mapped) {
            Some(postfix) if postfix.kind == element.kind => {}
            _ => {
                return Err(ShapeError::InvalidMappedName {
                    element,
                    name: mapped,
                })
            }
        }
        if let Some(owner) = self.to_indexed.get(&mapped) {
            if *owner == element {
                return Ok(());
            }
            return Err(ShapeError::DuplicateName {
                name: mapped,
                element: *owner,
            });
        }
        if let Some(existing) = self.to_mapped.get(&element) {
            if trace_name(existing).tag != trace_name(&mapped).tag {
                return Err(ShapeError::NameConflict {
                    element,
                    existing: existing.clone(),
                    proposed: mapped,
                });
            }
            self.to_indexed.remove(existing);
        }
        self.to_indexed.insert(mapped.clone(), element);
        self.to_mapped.insert(element, mapped);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.to_mapped.clear();
        self.to_indexed.clear();
    }
}
