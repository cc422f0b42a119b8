//! The element map: an append-only table from instance-local indexed
//! positions to stable mapped names, with a reverse index and lazily
//! imported child ranges.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use topo_types::{IndexedName, MappedName, ShapeKind};

use crate::encode::child_postfix;
use crate::hasher::Sid;

#[derive(Debug, Error, PartialEq)]
pub enum ElementMapError {
    #[error("cannot map an empty name to {element}")]
    EmptyName { element: IndexedName },
    #[error("invalid element position {element}")]
    InvalidPosition { element: IndexedName },
}

/// One name recorded for a position: the encoded name, the tag of the
/// object that assigned it, and the sids its provenance references.
#[derive(Debug, Clone)]
pub struct NameEntry {
    pub name: MappedName,
    pub tag: i64,
    pub sids: Vec<Sid>,
}

/// A deferred bulk import: positions `offset+1 ..= offset+count` of
/// `kind` take their names from positions `1 ..= count` of a source map,
/// re-encoded with `op` and `tag` appended. Nothing is materialized
/// until one of the covered positions is queried.
#[derive(Debug, Clone)]
pub struct ChildRange {
    pub kind: ShapeKind,
    pub offset: u32,
    pub count: u32,
    pub map: Option<Arc<ElementMap>>,
    pub tag: i64,
    pub op: String,
}

impl ChildRange {
    fn covers(&self, element: IndexedName) -> bool {
        element.kind == self.kind
            && element.index > self.offset
            && element.index <= self.offset + self.count
    }
}

#[derive(Debug, Default, Clone)]
struct Realized {
    names: BTreeMap<IndexedName, Vec<NameEntry>>,
    by_name: HashMap<MappedName, IndexedName>,
    all_done: bool,
}

/// Append-only position-to-names table.
///
/// A position may carry several names (oldest first); a name resolves to
/// exactly one position, first writer wins. Child ranges are realized on
/// demand: querying one position materializes only that position, while
/// reverse lookup and iteration realize everything outstanding.
#[derive(Debug, Default)]
pub struct ElementMap {
    names: BTreeMap<IndexedName, Vec<NameEntry>>,
    by_name: HashMap<MappedName, IndexedName>,
    children: Vec<ChildRange>,
    realized: Mutex<Realized>,
}

impl Clone for ElementMap {
    fn clone(&self) -> Self {
        ElementMap {
            names: self.names.clone(),
            by_name: self.by_name.clone(),
            children: self.children.clone(),
            realized: Mutex::new(self.realized_lock().clone()),
        }
    }
}

/// One flattened map row, as serialized for persistence. Sids are
/// reduced to their numeric ids; the owning document re-associates them
/// with its hasher on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementMapEntry {
    pub element: IndexedName,
    pub name: MappedName,
    pub tag: i64,
    pub sids: Vec<u64>,
}

impl ElementMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name` for `element`. Re-recording an identical pair is a
    /// no-op; the reverse index keeps the first position a name was
    /// recorded for.
    pub fn set_element_name(
        &mut self,
        element: IndexedName,
        name: MappedName,
        tag: i64,
        sids: Vec<Sid>,
    ) -> Result<(), ElementMapError> {
        if !element.is_valid() {
            return Err(ElementMapError::InvalidPosition { element });
        }
        if name.is_empty() {
            return Err(ElementMapError::EmptyName { element });
        }
        let entries = self.names.entry(element).or_default();
        if entries.iter().any(|e| e.name == name) {
            return Ok(());
        }
        match self.by_name.entry(name.clone()) {
            std::collections::hash_map::Entry::Occupied(existing) => {
                if *existing.get() != element {
                    tracing::warn!(%name, first = %existing.get(), second = %element,
                        "duplicate element mapping");
                }
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(element);
            }
        }
        entries.push(NameEntry { name, tag, sids });
        Ok(())
    }

    /// Install the deferred child imports. Replaces any previous set;
    /// meant to be called once, on a freshly built map.
    pub fn set_child_elements(&mut self, children: Vec<ChildRange>) {
        self.children = children;
        *self.realized_lock() = Realized::default();
    }

    /// The oldest (primary) name of `element`, if any.
    pub fn mapped_name(&self, element: IndexedName) -> Option<MappedName> {
        self.mapped_names(element).into_iter().next().map(|e| e.name)
    }

    /// Every name recorded for `element`, oldest first. Positions covered
    /// by a child range are materialized on first query.
    pub fn mapped_names(&self, element: IndexedName) -> Vec<NameEntry> {
        if let Some(entries) = self.names.get(&element) {
            return entries.clone();
        }
        if let Some(entries) = self.realized_lock().names.get(&element) {
            return entries.clone();
        }
        let Some(range) = self.children.iter().find(|r| r.covers(element)) else {
            return Vec::new();
        };
        let entries = Self::import_entries(range, element);
        let mut realized = self.realized_lock();
        for entry in &entries {
            if !self.by_name.contains_key(&entry.name) {
                realized.by_name.entry(entry.name.clone()).or_insert(element);
            }
        }
        realized.names.insert(element, entries.clone());
        entries
    }

    /// Resolve a mapped name back to its position. Realizes all
    /// outstanding child ranges.
    pub fn find(&self, name: &MappedName) -> Option<IndexedName> {
        if let Some(&element) = self.by_name.get(name) {
            return Some(element);
        }
        self.realize_all();
        self.realized_lock().by_name.get(name).copied()
    }

    /// Number of positions carrying at least one name, child ranges
    /// included.
    pub fn len(&self) -> usize {
        self.realize_all();
        let realized = self.realized_lock();
        self.names.len()
            + realized
                .names
                .iter()
                .filter(|(pos, entries)| {
                    !entries.is_empty() && !self.names.contains_key(pos)
                })
                .count()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.children.iter().all(|r| r.count == 0)
    }

    /// Flatten the whole map, position order, oldest name first.
    pub fn entries(&self) -> Vec<ElementMapEntry> {
        self.realize_all();
        let realized = self.realized_lock();
        let mut out = Vec::new();
        let mut push_all = |names: &BTreeMap<IndexedName, Vec<NameEntry>>| {
            for (&element, entries) in names {
                for entry in entries {
                    out.push(ElementMapEntry {
                        element,
                        name: entry.name.clone(),
                        tag: entry.tag,
                        sids: entry.sids.iter().map(|s| s.id()).collect(),
                    });
                }
            }
        };
        push_all(&self.names);
        push_all(&realized.names);
        out.sort_by(|a, b| a.element.cmp(&b.element));
        out
    }

    fn realize_all(&self) {
        if self.realized_lock().all_done {
            return;
        }
        for range in &self.children {
            for index in range.offset + 1..=range.offset + range.count {
                let element = IndexedName::new(range.kind, index);
                if self.names.contains_key(&element)
                    || self.realized_lock().names.contains_key(&element)
                {
                    continue;
                }
                self.mapped_names(element);
            }
        }
        self.realized_lock().all_done = true;
    }

    fn realized_lock(&self) -> MutexGuard<'_, Realized> {
        self.realized.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn import_entries(range: &ChildRange, element: IndexedName) -> Vec<NameEntry> {
        let source = IndexedName::new(element.kind, element.index - range.offset);
        let postfix = child_postfix(&range.op, range.tag);
        let source_entries = match &range.map {
            Some(map) => map.mapped_names(source),
            None => Vec::new(),
        };
        if source_entries.is_empty() {
            // An unmapped but tagged source still contributes its raw
            // indexed name, so fresh shapes seed the naming chain.
            if range.tag == 0 {
                return Vec::new();
            }
            let mut name = MappedName::from(source);
            name.push_str(&postfix);
            return vec![NameEntry {
                name,
                tag: range.tag,
                sids: Vec::new(),
            }];
        }
        source_entries
            .into_iter()
            .map(|entry| {
                let mut name = entry.name;
                name.push_str(&postfix);
                NameEntry {
                    name,
                    tag: range.tag,
                    sids: entry.sids,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(i: u32) -> IndexedName {
        IndexedName::new(ShapeKind::Edge, i)
    }

    #[test]
    fn set_and_get_round_trip() {
        let mut map = ElementMap::new();
        let name = MappedName::new("Edge1;:G;XTR;:T2");
        map.set_element_name(edge(1), name.clone(), 2, Vec::new())
            .unwrap();
        assert_eq!(map.mapped_name(edge(1)), Some(name.clone()));
        assert_eq!(map.find(&name), Some(edge(1)));
        assert_eq!(map.mapped_name(edge(2)), None);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn recording_is_idempotent_and_append_only() {
        let mut map = ElementMap::new();
        let first = MappedName::new("Edge1;:M;FUS;:T3");
        let second = MappedName::new("Edge1;:G;FUS;:T3");
        map.set_element_name(edge(1), first.clone(), 3, Vec::new())
            .unwrap();
        map.set_element_name(edge(1), first.clone(), 3, Vec::new())
            .unwrap();
        map.set_element_name(edge(1), second.clone(), 3, Vec::new())
            .unwrap();
        let names = map.mapped_names(edge(1));
        assert_eq!(names.len(), 2);
        assert_eq!(names[0].name, first);
        assert_eq!(names[1].name, second);
        // Oldest name stays primary.
        assert_eq!(map.mapped_name(edge(1)), Some(first));
    }

    #[test]
    fn reverse_lookup_keeps_first_writer() {
        let mut map = ElementMap::new();
        let shared = MappedName::new("Edge9;:L;CUT;:T1");
        map.set_element_name(edge(1), shared.clone(), 1, Vec::new())
            .unwrap();
        map.set_element_name(edge(2), shared.clone(), 1, Vec::new())
            .unwrap();
        assert_eq!(map.find(&shared), Some(edge(1)));
    }

    #[test]
    fn rejects_empty_names_and_invalid_positions() {
        let mut map = ElementMap::new();
        assert_eq!(
            map.set_element_name(edge(1), MappedName::default(), 1, Vec::new()),
            Err(ElementMapError::EmptyName { element: edge(1) })
        );
        assert_eq!(
            map.set_element_name(edge(0), MappedName::new("x"), 1, Vec::new()),
            Err(ElementMapError::InvalidPosition { element: edge(0) })
        );
        assert!(map.is_empty());
    }

    #[test]
    fn child_range_realizes_per_position() {
        let mut source = ElementMap::new();
        source
            .set_element_name(edge(2), MappedName::new("Edge2;:G;XTR;:T5"), 5, Vec::new())
            .unwrap();

        let mut map = ElementMap::new();
        map.set_child_elements(vec![ChildRange {
            kind: ShapeKind::Edge,
            offset: 12,
            count: 12,
            map: Some(Arc::new(source)),
            tag: 7,
            op: "CMP".to_string(),
        }]);

        // Position 14 maps back to source position 2.
        assert_eq!(
            map.mapped_name(edge(14)),
            Some(MappedName::new("Edge2;:G;XTR;:T5;CMP;:T7"))
        );
        // Outside the range: nothing.
        assert_eq!(map.mapped_name(edge(12)), None);
        assert_eq!(map.mapped_name(edge(25)), None);
    }

    #[test]
    fn unmapped_tagged_child_falls_back_to_raw_name() {
        let mut map = ElementMap::new();
        map.set_child_elements(vec![ChildRange {
            kind: ShapeKind::Face,
            offset: 0,
            count: 6,
            map: None,
            tag: 3,
            op: "CMP".to_string(),
        }]);
        assert_eq!(
            map.mapped_name(IndexedName::new(ShapeKind::Face, 6)),
            Some(MappedName::new("Face6;CMP;:T3"))
        );
        // Untagged ranges contribute nothing.
        let mut untagged = ElementMap::new();
        untagged.set_child_elements(vec![ChildRange {
            kind: ShapeKind::Face,
            offset: 0,
            count: 6,
            map: None,
            tag: 0,
            op: "CMP".to_string(),
        }]);
        assert_eq!(untagged.mapped_name(IndexedName::new(ShapeKind::Face, 1)), None);
    }

    #[test]
    fn find_realizes_child_ranges() {
        let mut source = ElementMap::new();
        source
            .set_element_name(edge(1), MappedName::new("Edge1;:M;FUS;:T2"), 2, Vec::new())
            .unwrap();

        let mut map = ElementMap::new();
        map.set_child_elements(vec![ChildRange {
            kind: ShapeKind::Edge,
            offset: 3,
            count: 4,
            map: Some(Arc::new(source)),
            tag: 9,
            op: "CMP".to_string(),
        }]);

        let wanted = MappedName::new("Edge1;:M;FUS;:T2;CMP;:T9");
        assert_eq!(map.find(&wanted), Some(edge(4)));
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn entries_flatten_in_position_order() {
        let mut map = ElementMap::new();
        map.set_element_name(edge(2), MappedName::new("b"), 1, Vec::new())
            .unwrap();
        map.set_element_name(edge(1), MappedName::new("a"), 1, Vec::new())
            .unwrap();
        map.set_element_name(
            IndexedName::new(ShapeKind::Vertex, 1),
            MappedName::new("v"),
            1,
            Vec::new(),
        )
        .unwrap();
        let entries = map.entries();
        let order: Vec<String> = entries.iter().map(|e| e.name.to_string()).collect();
        assert_eq!(order, ["v", "a", "b"]);
    }

    #[test]
    fn entries_serialize_round_trip() {
        let mut map = ElementMap::new();
        map.set_element_name(edge(3), MappedName::new("Edge3;:G;XTR;:T1"), 1, Vec::new())
            .unwrap();
        let entries = map.entries();
        let json = serde_json::to_string(&entries).unwrap();
        let back: Vec<ElementMapEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entries);
    }
}
