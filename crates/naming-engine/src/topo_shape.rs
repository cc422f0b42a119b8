//! A kernel shape paired with its owning tag, ancestry cache and
//! element map.

use std::sync::{Arc, Mutex, MutexGuard};

use element_map::{
    encode_element_name, ChildRange, ElementMap, ElementMapEntry, Hasher, NameEntry, Sid,
};
use shape_kernel::{Shape, Transform};
use topo_types::{IndexedName, MappedName, ShapeKind, ELEMENT_KINDS};
use tracing::{error, warn};

use crate::cache::{Ancestry, ShapeCache};
use crate::error::NamingError;

/// A shape with naming state attached.
///
/// The cache and element map are created lazily behind locks and shared
/// by handle. One instance is driven from one thread at a time, but
/// independent instances share nothing mutable and may be composed on
/// separate threads.
#[derive(Debug)]
pub struct TopoShape {
    shape: Shape,
    /// Identity of the owning feature. 0 means unset, -1 unmappable.
    pub tag: i64,
    hasher: Option<Hasher>,
    cache: Mutex<Option<Arc<ShapeCache>>>,
    map: Mutex<Option<Arc<ElementMap>>>,
}

impl Clone for TopoShape {
    fn clone(&self) -> Self {
        TopoShape {
            shape: self.shape.clone(),
            tag: self.tag,
            hasher: self.hasher.clone(),
            cache: Mutex::new(self.cache_lock().clone()),
            map: Mutex::new(self.map_lock().clone()),
        }
    }
}

impl TopoShape {
    pub fn new(shape: Shape, tag: i64) -> Self {
        Self {
            shape,
            tag,
            hasher: None,
            cache: Mutex::new(None),
            map: Mutex::new(None),
        }
    }

    pub fn null() -> Self {
        Self::new(Shape::null(), 0)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn is_null(&self) -> bool {
        self.shape.is_null()
    }

    pub fn kind(&self) -> Option<ShapeKind> {
        self.shape.kind()
    }

    /// Replace the underlying shape, discarding the cache and element
    /// map.
    pub fn set_shape(&mut self, shape: Shape) {
        self.shape = shape;
        *self.cache_lock() = None;
        *self.map_lock() = None;
    }

    pub fn hasher(&self) -> Option<&Hasher> {
        self.hasher.as_ref()
    }

    pub fn set_hasher(&mut self, hasher: Option<Hasher>) {
        self.hasher = hasher;
    }

    /// The ancestry cache over the current shape, rebuilt if the shape
    /// was replaced since the last build.
    pub fn init_cache(&self) -> Arc<ShapeCache> {
        let mut slot = self.cache_lock();
        match slot.as_ref() {
            Some(cache) if !cache.is_touched(&self.shape) => Arc::clone(cache),
            _ => {
                let cache = Arc::new(ShapeCache::new(self.shape.clone()));
                *slot = Some(Arc::clone(&cache));
                cache
            }
        }
    }

    pub fn ancestry(&self, kind: ShapeKind) -> Arc<Ancestry> {
        self.init_cache().ancestry(kind)
    }

    pub fn count_sub_shapes(&self, kind: ShapeKind) -> usize {
        if self.is_null() {
            return 0;
        }
        self.ancestry(kind).count()
    }

    /// The occurrence at a 1-based index, `None` if out of range.
    pub fn sub_shape(&self, kind: ShapeKind, index: usize) -> Option<Shape> {
        if self.is_null() {
            return None;
        }
        self.ancestry(kind).find_shape(index)
    }

    /// 1-based occurrence index of `sub` within this shape, 0 if absent.
    pub fn find_shape(&self, sub: &Shape) -> usize {
        if self.is_null() {
            return 0;
        }
        self.init_cache().find_shape(sub)
    }

    /// Resolve either a mapped name or a plain `Edge3`-style indexed
    /// name to the occurrence it denotes. An encoded name absent from
    /// the map is not-found: its indexed prefix refers to a source
    /// shape's positions, not this shape's.
    pub fn find_shape_by_name(&self, name: &str) -> Option<Shape> {
        if let Some(map) = self.element_map() {
            if let Some(element) = map.find(&MappedName::new(name)) {
                return self.sub_shape(element.kind, element.index as usize);
            }
        }
        let element = IndexedName::parse(name)?;
        self.sub_shape(element.kind, element.index as usize)
    }

    /// All super-shapes of `kind` containing `sub`.
    pub fn find_ancestors(&self, sub: &Shape, kind: ShapeKind) -> Vec<Shape> {
        if self.is_null() {
            return Vec::new();
        }
        self.init_cache().find_ancestors(sub, kind)
    }

    pub fn find_ancestor(&self, sub: &Shape, kind: ShapeKind) -> Option<Shape> {
        self.find_ancestors(sub, kind).into_iter().next()
    }

    pub fn element_map(&self) -> Option<Arc<ElementMap>> {
        self.map_lock().clone()
    }

    pub fn has_element_map(&self) -> bool {
        self.element_map().map_or(false, |m| !m.is_empty())
    }

    pub fn element_map_entries(&self) -> Vec<ElementMapEntry> {
        self.element_map().map(|m| m.entries()).unwrap_or_default()
    }

    pub fn reset_element_map(&mut self) {
        *self.map_lock() = None;
    }

    /// The primary mapped name of an element, if any.
    pub fn mapped_name(&self, element: IndexedName) -> Option<MappedName> {
        self.element_map().and_then(|m| m.mapped_name(element))
    }

    pub fn mapped_name_with_sids(&self, element: IndexedName) -> Option<(MappedName, Vec<Sid>)> {
        self.element_map()
            .and_then(|m| m.mapped_names(element).into_iter().next())
            .map(|e| (e.name, e.sids))
    }

    /// Every name of an element, oldest first.
    pub fn mapped_names(&self, element: IndexedName) -> Vec<NameEntry> {
        self.element_map()
            .map(|m| m.mapped_names(element))
            .unwrap_or_default()
    }

    /// Like [`mapped_names`](Self::mapped_names), but an unmapped element
    /// falls back to its raw indexed name. This is how untracked but
    /// tagged shapes seed the naming chain.
    pub fn mapped_names_or_raw(&self, element: IndexedName) -> Vec<NameEntry> {
        let names = self.mapped_names(element);
        if !names.is_empty() {
            return names;
        }
        vec![NameEntry {
            name: MappedName::from(element),
            tag: self.tag,
            sids: Vec::new(),
        }]
    }

    /// This shape moved by `transform` on top of its current placement.
    /// The element map carries over (the result is a partner); the cache
    /// does not.
    pub fn moved(&self, transform: &Transform) -> TopoShape {
        TopoShape {
            shape: self.shape.moved(transform),
            tag: self.tag,
            hasher: self.hasher.clone(),
            cache: Mutex::new(None),
            map: Mutex::new(self.map_lock().clone()),
        }
    }

    /// This shape with its placement reset and then moved by `transform`.
    pub fn located(&self, transform: &Transform) -> TopoShape {
        TopoShape {
            shape: self.shape.located(transform),
            tag: self.tag,
            hasher: self.hasher.clone(),
            cache: Mutex::new(None),
            map: Mutex::new(self.map_lock().clone()),
        }
    }

    /// Whether names can be mapped from `other` into this shape: both
    /// non-null, distinct instances, neither tag the unmappable sentinel,
    /// and `other` either carries map data already or has a real tag.
    pub fn can_map_element(&self, other: &TopoShape) -> bool {
        if self.is_null() || other.is_null() || std::ptr::eq(self, other) {
            return false;
        }
        if self.tag == -1 || other.tag == -1 {
            return false;
        }
        if other.tag == 0 && other.element_map().is_none() {
            return false;
        }
        true
    }

    /// Import `source`'s whole element map as lazy child ranges, one per
    /// element kind. Used when this shape is a kernel partner of the
    /// source.
    pub fn copy_element_map(&mut self, source: &TopoShape, op: &str) {
        if self.is_null() || source.is_null() {
            return;
        }
        let mut children = Vec::new();
        for kind in ELEMENT_KINDS {
            let mut count = self.count_sub_shapes(kind);
            let other = source.count_sub_shapes(kind);
            if count != other {
                warn!(kind = kind.type_name(), count, other, "sub shape mismatch");
                count = count.min(other);
            }
            if count == 0 {
                continue;
            }
            children.push(ChildRange {
                kind,
                offset: 0,
                count: count as u32,
                map: source.element_map(),
                tag: if self.tag != source.tag { source.tag } else { 0 },
                op: op.to_string(),
            });
        }
        self.reset_element_map();
        if self.hasher.is_none() {
            self.hasher = source.hasher.clone();
        }
        self.with_map(|map| map.set_child_elements(children));
    }

    /// Map every element of `other` that survived into this shape (same
    /// kernel occurrence) to its existing names, re-encoded with `op`.
    pub fn map_sub_element(&mut self, other: &TopoShape, op: &str) -> Result<(), NamingError> {
        if !self.can_map_element(other) {
            return Ok(());
        }
        if !self.has_element_map() && self.shape.is_partner(other.shape()) {
            if self.hasher.is_none() {
                self.hasher = other.hasher.clone();
            }
            self.copy_element_map(other, op);
            return Ok(());
        }
        if other.hasher.is_some() {
            self.check_and_match_hasher(other);
        }
        let mut warned = false;
        self.map_sub_element_for_shape(other, op, &mut warned)
    }

    /// Map names from several sources. A compound target whose children
    /// are partners of the sources takes the cheap child-range path.
    pub fn map_sub_elements(&mut self, shapes: &[TopoShape], op: &str) -> Result<(), NamingError> {
        if shapes.is_empty() {
            return Ok(());
        }
        if self.kind() == Some(ShapeKind::Compound) {
            self.map_compound_sub_elements(shapes, op)
        } else {
            for shape in shapes {
                self.map_sub_element(shape, op)?;
            }
            Ok(())
        }
    }

    fn map_compound_sub_elements(
        &mut self,
        shapes: &[TopoShape],
        op: &str,
    ) -> Result<(), NamingError> {
        let children = self.shape.children();
        let mut position = 0;
        for source in shapes {
            if source.is_null() {
                continue;
            }
            let Some(child) = children.get(position) else {
                return Ok(());
            };
            position += 1;
            if !child.is_partner(source.shape()) {
                // Not a plain wrapping of the sources, no mapping at all.
                return Ok(());
            }
        }
        let mut ranges = Vec::new();
        for kind in ELEMENT_KINDS {
            let mut offset = 0u32;
            for source in shapes {
                if source.is_null() {
                    continue;
                }
                let count = source.count_sub_shapes(kind) as u32;
                if count == 0 {
                    continue;
                }
                ranges.push(ChildRange {
                    kind,
                    offset,
                    count,
                    map: source.element_map(),
                    tag: source.tag,
                    op: op.to_string(),
                });
                offset += count;
            }
        }
        self.with_map(|map| map.set_child_elements(ranges));
        Ok(())
    }

    fn map_sub_element_for_shape(
        &mut self,
        other: &TopoShape,
        op: &str,
        warned: &mut bool,
    ) -> Result<(), NamingError> {
        for kind in ELEMENT_KINDS {
            let shape_map = self.ancestry(kind);
            let other_map = other.ancestry(kind);
            if shape_map.count() == 0 || other_map.count() == 0 {
                continue;
            }
            // Walk whichever side is smaller, matching occurrences.
            let forward = other_map.count() <= shape_map.count();
            let count = other_map.count().min(shape_map.count());
            for outer in 1..=count {
                let (index, inner) = if forward {
                    let Some(sub) = other_map.find_shape(outer) else {
                        continue;
                    };
                    let index = shape_map.find_index(&sub);
                    if index == 0 {
                        continue;
                    }
                    (index, outer)
                } else {
                    let Some(sub) = shape_map.find_shape(outer) else {
                        continue;
                    };
                    let inner = other_map.find_index(&sub);
                    if inner == 0 {
                        continue;
                    }
                    (outer, inner)
                };
                let element = IndexedName::new(kind, index as u32);
                for entry in other.mapped_names_or_raw(IndexedName::new(kind, inner as u32)) {
                    let mut name = entry.name;
                    let mut sids = entry.sids;
                    if !sids.is_empty() {
                        match &self.hasher {
                            None => self.hasher = Some(sids[0].hasher().clone()),
                            Some(hasher) if !sids[0].is_from_hasher(hasher) => {
                                if !*warned {
                                    *warned = true;
                                    warn!("hasher mismatch");
                                }
                                sids.clear();
                            }
                            _ => {}
                        }
                    }
                    encode_element_name(
                        kind.type_char(),
                        &mut name,
                        "",
                        &mut sids,
                        self.hasher.as_ref(),
                        self.tag,
                        op,
                        other.tag,
                    );
                    self.set_element_name(element, name, sids)?;
                }
            }
        }
        Ok(())
    }

    fn check_and_match_hasher(&mut self, other: &TopoShape) {
        match (&self.hasher, &other.hasher) {
            (Some(mine), Some(theirs)) if !Arc::ptr_eq(mine, theirs) => {
                if self.has_element_map() {
                    error!("hasher mismatch with existing names");
                } else {
                    warn!("hasher mismatch");
                }
                self.hasher = other.hasher.clone();
            }
            (None, _) => self.hasher = other.hasher.clone(),
            _ => {}
        }
    }

    pub(crate) fn set_element_name(
        &self,
        element: IndexedName,
        name: MappedName,
        sids: Vec<Sid>,
    ) -> Result<(), NamingError> {
        let tag = self.tag;
        self.with_map(|map| map.set_element_name(element, name, tag, sids))?;
        Ok(())
    }

    fn with_map<R>(&self, f: impl FnOnce(&mut ElementMap) -> R) -> R {
        let mut slot = self.map_lock();
        let arc = slot.get_or_insert_with(|| Arc::new(ElementMap::new()));
        f(Arc::make_mut(arc))
    }

    fn cache_lock(&self) -> MutexGuard<'_, Option<Arc<ShapeCache>>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn map_lock(&self) -> MutexGuard<'_, Option<Arc<ElementMap>>> {
        self.map.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use element_map::StringHasher;
    use shape_kernel::builder;

    #[test]
    fn can_map_element_rules() {
        let a = TopoShape::new(builder::make_box(1.0, 1.0, 1.0), 1);
        let mut b = TopoShape::new(builder::make_box(1.0, 1.0, 1.0), 2);
        assert!(a.can_map_element(&b));
        assert!(!a.can_map_element(&a));
        assert!(!a.can_map_element(&TopoShape::null()));
        assert!(!TopoShape::null().can_map_element(&a));

        b.tag = -1;
        assert!(!a.can_map_element(&b));
        b.tag = 0;
        // Tag 0 without a map is unmappable; with one it is fine.
        assert!(!a.can_map_element(&b));
        b.set_element_name(
            IndexedName::new(ShapeKind::Face, 1),
            MappedName::new("F1"),
            Vec::new(),
        )
        .unwrap();
        assert!(a.can_map_element(&b));
    }

    #[test]
    fn partner_copy_imports_names_with_op_postfix() {
        let solid = builder::make_box(1.0, 1.0, 1.0);
        let mut source = TopoShape::new(solid.clone(), 4);
        source
            .set_element_name(
                IndexedName::new(ShapeKind::Face, 2),
                MappedName::new("F2"),
                Vec::new(),
            )
            .unwrap();

        let mut target = TopoShape::new(solid, 4);
        target.map_sub_element(&source, "MOV").unwrap();
        // Same tag, so no tag postfix; just the op.
        assert_eq!(
            target.mapped_name(IndexedName::new(ShapeKind::Face, 2)),
            Some(MappedName::new("F2;MOV"))
        );
    }

    #[test]
    fn occurrence_mapping_re_encodes_surviving_elements() {
        let solid = builder::make_box(1.0, 1.0, 1.0);
        let mut source = TopoShape::new(solid.clone(), 2);
        source
            .set_element_name(
                IndexedName::new(ShapeKind::Edge, 5),
                MappedName::new("E5"),
                Vec::new(),
            )
            .unwrap();

        // Wrap the same solid in a compound: every occurrence survives,
        // but the shapes are not partners, forcing occurrence matching.
        let mut target = TopoShape::new(
            builder::solid(&solid.children()),
            7,
        );
        target.map_sub_element(&source, "FUS").unwrap();
        let named = target.mapped_name(IndexedName::new(ShapeKind::Edge, 5));
        assert_eq!(named, Some(MappedName::new("E5;FUS;:T7,2")));
        // Unmapped source elements seed raw names.
        assert_eq!(
            target.mapped_name(IndexedName::new(ShapeKind::Edge, 1)),
            Some(MappedName::new("Edge1;FUS;:T7,2"))
        );
    }

    #[test]
    fn moved_shape_keeps_map_and_stays_partner() {
        let mut a = TopoShape::new(builder::make_box(1.0, 1.0, 1.0), 1);
        a.set_element_name(
            IndexedName::new(ShapeKind::Vertex, 1),
            MappedName::new("V1"),
            Vec::new(),
        )
        .unwrap();
        let moved = a.moved(&Transform::translation([1.0, 0.0, 0.0]));
        assert!(moved.shape().is_partner(a.shape()));
        assert!(!moved.shape().is_same(a.shape()));
        assert_eq!(
            moved.mapped_name(IndexedName::new(ShapeKind::Vertex, 1)),
            Some(MappedName::new("V1"))
        );
    }

    #[test]
    fn find_shape_by_name_handles_both_name_forms() {
        let mut a = TopoShape::new(builder::make_box(1.0, 1.0, 1.0), 1);
        let face3 = a.sub_shape(ShapeKind::Face, 3).unwrap();
        a.set_element_name(
            IndexedName::new(ShapeKind::Face, 3),
            MappedName::new("Face3;:G;XTR;:T1"),
            Vec::new(),
        )
        .unwrap();
        let by_mapped = a.find_shape_by_name("Face3;:G;XTR;:T1").unwrap();
        let by_indexed = a.find_shape_by_name("Face3").unwrap();
        assert!(by_mapped.is_same(&face3));
        assert!(by_indexed.is_same(&face3));
        assert!(a.find_shape_by_name("Face99").is_none());
        assert!(a.find_shape_by_name("garbage").is_none());
    }

    #[test]
    fn stale_encoded_names_do_not_resolve_positionally() {
        let a = TopoShape::new(builder::make_box(1.0, 1.0, 1.0), 1);
        // An encoded name this shape never carried must not fall back to
        // its indexed prefix, which denotes a different element here.
        assert!(a.find_shape_by_name("Face2;:G;XTR;:T99").is_none());
        assert!(a.find_shape_by_name("Face2").is_some());
    }

    #[test]
    fn hasher_mismatch_adopts_incoming_and_drops_foreign_sids() {
        let solid = builder::make_box(1.0, 1.0, 1.0);
        let hasher_a = StringHasher::new();
        let hasher_b = StringHasher::new();

        let mut source = TopoShape::new(solid.clone(), 2);
        source.set_hasher(Some(hasher_a.clone()));
        let sid_a = hasher_a.intern("edge provenance");
        source
            .set_element_name(
                IndexedName::new(ShapeKind::Edge, 5),
                MappedName::new("E5"),
                vec![sid_a],
            )
            .unwrap();

        // Target already named under a different hasher.
        let mut target = TopoShape::new(builder::solid(&solid.children()), 7);
        target.set_hasher(Some(hasher_b.clone()));
        target
            .set_element_name(
                IndexedName::new(ShapeKind::Vertex, 1),
                MappedName::new("V1"),
                Vec::new(),
            )
            .unwrap();

        target.map_sub_element(&source, "FUS").unwrap();
        // The incoming hasher wins, and sids it issued survive.
        assert!(Arc::ptr_eq(target.hasher().unwrap(), &hasher_a));
        let entry = target
            .mapped_names(IndexedName::new(ShapeKind::Edge, 5))
            .into_iter()
            .find(|e| e.name.as_str().starts_with("E5;"))
            .unwrap();
        assert!(!entry.sids.is_empty());
        assert!(entry.sids[0].is_from_hasher(&hasher_a));

        // A source with no hasher of its own whose entries carry sids
        // from a hasher the target does not hold: the names come over,
        // the foreign sids do not.
        let mut stale = TopoShape::new(solid, 3);
        let sid_b = hasher_b.intern("stale provenance");
        stale
            .set_element_name(
                IndexedName::new(ShapeKind::Face, 2),
                MappedName::new("F2"),
                vec![sid_b],
            )
            .unwrap();
        target.map_sub_element(&stale, "CUT").unwrap();
        assert!(Arc::ptr_eq(target.hasher().unwrap(), &hasher_a));
        let entry = target
            .mapped_names(IndexedName::new(ShapeKind::Face, 2))
            .into_iter()
            .find(|e| e.name.as_str().starts_with("F2;"))
            .unwrap();
        assert!(entry.sids.is_empty());
    }

    #[test]
    fn instances_move_between_threads() {
        fn assert_send<T: Send>() {}
        assert_send::<TopoShape>();

        let a = TopoShape::new(builder::make_box(1.0, 1.0, 1.0), 1);
        let count = std::thread::spawn(move || a.count_sub_shapes(ShapeKind::Edge))
            .join()
            .unwrap();
        assert_eq!(count, 12);
    }

    #[test]
    fn set_shape_discards_cache_and_map() {
        let mut a = TopoShape::new(builder::make_box(1.0, 1.0, 1.0), 1);
        a.set_element_name(
            IndexedName::new(ShapeKind::Face, 1),
            MappedName::new("F1"),
            Vec::new(),
        )
        .unwrap();
        let edge = a.sub_shape(ShapeKind::Edge, 1).unwrap();
        assert_ne!(a.find_shape(&edge), 0);

        a.set_shape(builder::make_box(2.0, 2.0, 2.0));
        assert!(a.element_map().is_none());
        assert_eq!(a.find_shape(&edge), 0);
    }
}
