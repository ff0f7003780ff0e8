use std::collections::HashMap;

use naming_types::{IndexedName, ObjectTag};

/// One related element: its mapped name and current canonical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedElement {
    pub mapped: String,
    pub canonical: IndexedName,
}

/// Per-shape memo of related-element queries.
#[derive(Debug, Default)]
pub(crate) struct RelatedCache {
    /// Keyed by source identity: (source name, source tag, same-type flag).
    by_source: HashMap<(String, ObjectTag, bool), Vec<RelatedElement>>,
    /// Keyed by member element: (mapped name, same-type flag).
    by_element: HashMap<(String, bool), Vec<RelatedElement>>,
}

impl RelatedCache {
    pub(crate) fn by_element(&self, mapped: &str, same_type: bool) -> Option<&[RelatedElement]> {
        self.by_element
            .get(&(mapped.to_string(), same_type))
            .map(Vec::as_slice)
    }

    pub(crate) fn by_source(
        &self,
        source: &str,
        tag: ObjectTag,
        same_type: bool,
    ) -> Option<&[RelatedElement]> {
        self.by_source
            .get(&(source.to_string(), tag, same_type))
            .map(Vec::as_slice)
    }

    /// Store a computed class under its identity and under every member.
    pub(crate) fn insert(
        &mut self,
        source: &str,
        tag: ObjectTag,
        same_type: bool,
        elements: &[RelatedElement],
    ) {
        for element in elements {
            self.by_element
                .insert((element.mapped.clone(), same_type), elements.to_vec());
        }
        self.by_source
            .insert((source.to_string(), tag, same_type), elements.to_vec());
    }
}
