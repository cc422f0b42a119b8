//! The element-map composer: derives stable names for every element of a
//! newly produced shape from the names of the source shapes it was made
//! from, guided by the operation's modification/generation history.

use std::collections::BTreeMap;

use element_map::{
    encode_element_name, Sid, POSTFIX_EXTRA, POSTFIX_GEN, POSTFIX_LOWER, POSTFIX_MOD,
    POSTFIX_MODGEN, POSTFIX_UPPER,
};
use shape_kernel::{builder, Mapper, Plane, Shape};
use topo_types::{op_code, IndexedName, MappedName, ShapeKind, ELEMENT_KINDS};
use tracing::{error, warn};

use crate::error::NamingError;
use crate::topo_shape::TopoShape;

/// Candidate ordering key: lower-dimensional, earlier-tagged,
/// lexicographically earlier sources win. High-level over-reports get a
/// +3 rank penalty so precise mappings sort first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct NameKey {
    shapetype: i32,
    tag: i64,
    name: MappedName,
}

#[derive(Debug, Clone)]
struct NameInfo {
    /// Positive: k-th modified occurrence. Negative: k-th generated
    /// occurrence. `i32::MIN` / `i32::MIN + 1` are the reserved parallel
    /// and coplanar cap-face priorities.
    index: i32,
    sids: Vec<Sid>,
    kind: ShapeKind,
}

type NewNames = BTreeMap<IndexedName, BTreeMap<NameKey, NameInfo>>;

impl TopoShape {
    /// Adopt `shape` as this instance's shape and derive an element map
    /// for it from `sources`, consulting `mapper` for which new elements
    /// each source element was modified or generated into.
    ///
    /// A null `shape` is an error. Empty `sources`, or sources none of
    /// which are mappable, adopt the shape verbatim with no element map.
    pub fn make_shape_with_element_map(
        &mut self,
        shape: Shape,
        mapper: &dyn Mapper,
        sources: &[TopoShape],
        op: &str,
    ) -> Result<(), NamingError> {
        self.set_shape(shape);
        if self.is_null() {
            return Err(NamingError::NullShape);
        }
        if sources.is_empty() {
            return Ok(());
        }

        let mappable = sources.iter().filter(|s| self.can_map_element(s)).count();
        if mappable == 0 {
            return Ok(());
        }
        if mappable != sources.len() {
            warn!("not all input shapes are mappable");
        }
        let op = if op.is_empty() { op_code::MAKER } else { op };

        self.init_cache();
        // Elements that survived an operation unchanged keep their names.
        self.map_sub_elements(sources, op)?;

        let mut new_names = self.collect_candidates(mapper, sources, op);

        // Names derived from precise low-level mappings commit first;
        // anything only reachable through a high-level over-report is
        // deferred, and admitted in a second round only if elements
        // remain unnamed after the propagation passes.
        let mut delayed = false;
        loop {
            self.commit_candidates(&mut new_names, delayed, op)?;
            self.propagate_down(&new_names, delayed, op)?;
            let has_unnamed = self.propagate_up(&new_names, delayed, op)?;
            if !has_unnamed || delayed || new_names.is_empty() {
                break;
            }
            delayed = true;
        }
        Ok(())
    }

    /// Build a compound wrapping every non-null input, importing each
    /// source's element map as a lazy child range. With a single input
    /// and `force` off, the input is adopted directly instead.
    pub fn make_element_compound(
        &mut self,
        shapes: &[TopoShape],
        op: &str,
        force: bool,
    ) -> Result<(), NamingError> {
        if !force && shapes.len() == 1 {
            *self = shapes[0].clone();
            return Ok(());
        }
        let mut children = Vec::new();
        for source in shapes {
            if source.is_null() {
                warn!("null input shape");
                continue;
            }
            children.push(source.shape().clone());
        }
        if !shapes.is_empty() && children.is_empty() {
            return Err(NamingError::NullShape);
        }
        self.set_shape(builder::compound(&children));
        if shapes.is_empty() {
            return Ok(());
        }
        self.init_cache();
        let op = if op.is_empty() { op_code::COMPOUND } else { op };
        self.map_sub_elements(shapes, op)
    }

    /// Walk every element of every mappable source and record, per new
    /// element position, the source names that claim it.
    fn collect_candidates(
        &self,
        mapper: &dyn Mapper,
        sources: &[TopoShape],
        op: &str,
    ) -> NewNames {
        let mut new_names = NewNames::new();
        for kind in ELEMENT_KINDS {
            for source in sources {
                if !self.can_map_element(source) {
                    continue;
                }
                let count = source.count_sub_shapes(kind);
                for i in 1..=count {
                    let Some(source_element) = source.sub_shape(kind, i) else {
                        continue;
                    };
                    let source_name = IndexedName::new(kind, i as u32);
                    let Some(entry) = source.mapped_names_or_raw(source_name).into_iter().next()
                    else {
                        continue;
                    };
                    let key = NameKey {
                        shapetype: kind.element_rank(),
                        tag: source.tag,
                        name: entry.name,
                    };
                    self.collect_modified(
                        mapper,
                        &source_element,
                        &key,
                        &entry.sids,
                        kind,
                        op,
                        &mut new_names,
                    );
                    self.collect_generated(
                        mapper,
                        &source_element,
                        &key,
                        &entry.sids,
                        kind,
                        op,
                        &mut new_names,
                    );
                }
            }
        }
        new_names
    }

    #[allow(clippy::too_many_arguments)]
    fn collect_modified(
        &self,
        mapper: &dyn Mapper,
        source_element: &Shape,
        key: &NameKey,
        sids: &[Sid],
        kind: ShapeKind,
        op: &str,
        new_names: &mut NewNames,
    ) {
        for (k, new_shape) in mapper.modified(source_element).iter().enumerate() {
            let k = k as i32 + 1;
            let Some(new_kind) = new_shape.kind() else {
                error!(source = %key.name, "null modified shape");
                continue;
            };
            if !new_kind.is_element() {
                // Some makers report modification into a higher-level
                // shape; there is no precise position to name from that.
                warn!(
                    reported = new_kind.type_name(),
                    source = %key.name,
                    "modified shape type mismatch"
                );
                continue;
            }
            let j = self.ancestry(new_kind).find_index(new_shape);
            if j == 0 {
                warn!(op, from = %key.name, "cannot find modified element");
                continue;
            }
            let element = IndexedName::new(new_kind, j as u32);
            if self.mapped_name(element).is_some() {
                continue;
            }
            new_names.entry(element).or_default().insert(
                key.clone(),
                NameInfo {
                    index: k,
                    sids: sids.to_vec(),
                    kind,
                },
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn collect_generated(
        &self,
        mapper: &dyn Mapper,
        source_element: &Shape,
        key: &NameKey,
        sids: &[Sid],
        kind: ShapeKind,
        op: &str,
        new_names: &mut NewNames,
    ) {
        let mut source_plane: Option<Option<Plane>> = None;
        let mut k: i32 = 0;
        for new_shape in mapper.generated(source_element) {
            let Some(raw_kind) = new_shape.kind() else {
                error!(source = %key.name, "null generated shape");
                continue;
            };
            let mut shape_offset = 0;
            let mut coplanar_at: i32 = -1;
            let mut parallel_at: i32 = -1;
            let new_kind;
            let mut new_shapes = Vec::new();
            if raw_kind.is_element() {
                new_kind = raw_kind;
                new_shapes.push(new_shape.clone());
            } else {
                // A high-level over-report (e.g. extrusion reporting the
                // profile face generating the whole solid). Expand it to
                // its elements but rank the resulting names late, and
                // give cap faces coplanar/parallel with the source face
                // a reserved priority so their names stay stable when
                // unrelated profile edges change.
                shape_offset = 3;
                new_kind = raw_kind.mapped_kind();
                let check = if kind == ShapeKind::Face && new_kind == ShapeKind::Face {
                    *source_plane.get_or_insert_with(|| source_element.find_plane())
                } else {
                    None
                };
                for sub in new_shape.sub_shapes(new_kind) {
                    new_shapes.push(sub);
                    if coplanar_at >= 0 && parallel_at >= 0 {
                        continue;
                    }
                    let Some(plane) = check else { continue };
                    let Some(sub_plane) =
                        new_shapes.last().and_then(|s| s.find_plane())
                    else {
                        continue;
                    };
                    if !plane.is_parallel(&sub_plane) {
                        continue;
                    }
                    if coplanar_at < 0 && plane.is_coplanar(&sub_plane) {
                        coplanar_at = new_shapes.len() as i32;
                        continue;
                    }
                    if parallel_at < 0 {
                        parallel_at = new_shapes.len() as i32;
                    }
                }
            }
            let key = NameKey {
                shapetype: key.shapetype + shape_offset,
                tag: key.tag,
                name: key.name.clone(),
            };
            let start = k;
            for sub in &new_shapes {
                k += 1;
                let j = self.ancestry(new_kind).find_index(sub);
                if j == 0 {
                    warn!(op, from = %key.name, "cannot find generated element");
                    continue;
                }
                let element = IndexedName::new(new_kind, j as u32);
                if self.mapped_name(element).is_some() {
                    continue;
                }
                let local = k - start;
                let index = if local == parallel_at {
                    i32::MIN
                } else if local == coplanar_at {
                    i32::MIN + 1
                } else {
                    -k
                };
                new_names.entry(element).or_default().insert(
                    key.clone(),
                    NameInfo {
                        index,
                        sids: sids.to_vec(),
                        kind,
                    },
                );
            }
        }
    }

    /// Commit collected candidates into the element map. In the first
    /// round, high-level candidates (other than the reserved cap-face
    /// priorities) are left pending; committed low-level entries are
    /// dropped from the work list.
    fn commit_candidates(
        &self,
        new_names: &mut NewNames,
        delayed: bool,
        op: &str,
    ) -> Result<(), NamingError> {
        let elements: Vec<IndexedName> = new_names.keys().copied().collect();
        for element in elements {
            let snapshot: Vec<(NameKey, NameInfo)> = match new_names.get(&element) {
                Some(names) => names.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                None => continue,
            };
            let Some((first_key, first_info)) = snapshot.first().cloned() else {
                continue;
            };
            if !delayed && first_key.shapetype >= 3 && first_info.index > i32::MIN + 1 {
                continue;
            }
            if !delayed && self.mapped_name(element).is_some() {
                new_names.remove(&element);
                continue;
            }

            // index > 0 means modified, otherwise generated.
            let mut name_type: u8 = if first_info.index > 0 { 1 } else { 2 };
            let mut sids = first_info.sids.clone();

            // Additional sources beyond the first are folded into a
            // parenthesized list (hashed down when a hasher is set), so
            // the same element modified by several shapes stays
            // associated with all of them.
            let mut postfix = String::new();
            if snapshot.len() > 1 {
                let mut pieces = String::from("(");
                let mut first = true;
                let mut taken = 0;
                for (other_key, other_info) in snapshot.iter().skip(1) {
                    if other_key.shapetype >= 3 && first_key.shapetype < 3 {
                        break;
                    }
                    if first {
                        first = false;
                    } else {
                        pieces.push('|');
                    }
                    let mut fragment = String::new();
                    if other_info.index != 1 {
                        fragment.push_str(POSTFIX_EXTRA);
                        if other_info.index == i32::MIN {
                            fragment.push('0');
                        } else if other_info.index == i32::MIN + 1 {
                            fragment.push_str("00");
                        } else {
                            fragment.push_str(&other_info.index.to_string());
                        }
                    }
                    let mut other_name = other_key.name.clone();
                    encode_element_name(
                        other_info.kind.type_char(),
                        &mut other_name,
                        &fragment,
                        &mut sids,
                        self.hasher(),
                        self.tag,
                        "",
                        other_key.tag,
                    );
                    pieces.push_str(other_name.as_str());
                    if (name_type == 1 && other_info.index < 0)
                        || (name_type == 2 && other_info.index > 0)
                    {
                        warn!(%element, "element is both generated and modified");
                        name_type = 0;
                    }
                    sids.extend(other_info.sids.iter().cloned());
                    taken += 1;
                    if taken == 4 {
                        break;
                    }
                }
                if !first {
                    pieces.push(')');
                    if let Some(hasher) = self.hasher() {
                        let sid = hasher.intern(&pieces);
                        pieces = sid.to_string();
                        sids.push(sid);
                    }
                    postfix = pieces;
                }
            }

            let mut suffix = String::from(match name_type {
                2 => POSTFIX_GEN,
                1 => POSTFIX_MOD,
                _ => POSTFIX_MODGEN,
            });
            if first_info.index == i32::MIN {
                suffix.push('0');
            } else if first_info.index == i32::MIN + 1 {
                suffix.push_str("00");
            } else if first_info.index.abs() > 1 {
                suffix.push_str(&first_info.index.abs().to_string());
            }
            suffix.push_str(&postfix);

            let mut new_name = first_key.name.clone();
            encode_element_name(
                element.kind.type_char(),
                &mut new_name,
                &suffix,
                &mut sids,
                self.hasher(),
                self.tag,
                op,
                first_key.tag,
            );
            self.set_element_name(element, new_name, sids)?;

            if !delayed && first_key.shapetype < 3 {
                new_names.remove(&element);
            }
        }
        Ok(())
    }

    /// Downward pass: a named face names its unnamed edges, a named edge
    /// its unnamed vertices, with an occurrence index disambiguating an
    /// element appearing in several parents.
    fn propagate_down(
        &self,
        new_names: &NewNames,
        delayed: bool,
        op: &str,
    ) -> Result<(), NamingError> {
        for (parent_kind, child_kind) in [
            (ShapeKind::Face, ShapeKind::Edge),
            (ShapeKind::Edge, ShapeKind::Vertex),
        ] {
            let parent_map = self.ancestry(parent_kind);
            let child_map = self.ancestry(child_kind);

            // Parents with still-pending candidates are skipped in the
            // first round; in the delayed round exactly those are the
            // parents to propagate from.
            let candidates: Vec<IndexedName> = if delayed {
                new_names
                    .keys()
                    .filter(|e| e.kind == parent_kind)
                    .copied()
                    .collect()
            } else {
                (1..=parent_map.count() as u32)
                    .map(|i| IndexedName::new(parent_kind, i))
                    .filter(|e| !new_names.contains_key(e))
                    .collect()
            };

            // Collect, per unnamed child, every parent name that could
            // name it; the sorted first is used.
            let mut names: BTreeMap<IndexedName, BTreeMap<MappedName, (i32, Vec<Sid>)>> =
                BTreeMap::new();
            for parent_element in candidates {
                let i = parent_element.index as usize;
                if i == 0 || i > parent_map.count() {
                    continue;
                }
                let Some((mapped, sids)) = self.mapped_name_with_sids(parent_element) else {
                    continue;
                };
                let Some(parent) = parent_map.find_shape(i) else {
                    continue;
                };
                let mut occurrence = 1;
                for sub in parent.sub_shapes(child_kind) {
                    let j = child_map.find_index(&sub);
                    if j == 0 {
                        continue;
                    }
                    let child = IndexedName::new(child_kind, j as u32);
                    if self.mapped_name(child).is_some() {
                        continue;
                    }
                    let slot = names
                        .entry(child)
                        .or_default()
                        .entry(mapped.clone())
                        .or_insert((0, sids.clone()));
                    slot.0 = occurrence;
                    occurrence += 1;
                }
            }
            for (child, candidates) in names {
                let Some((name, (index, mut sids))) = candidates.into_iter().next() else {
                    continue;
                };
                let mut suffix = String::from(POSTFIX_UPPER);
                if index > 1 {
                    suffix.push_str(&index.to_string());
                }
                let mut new_name = name;
                encode_element_name(
                    child.kind.type_char(),
                    &mut new_name,
                    &suffix,
                    &mut sids,
                    self.hasher(),
                    self.tag,
                    op,
                    0,
                );
                self.set_element_name(child, new_name, sids)?;
            }
        }
        Ok(())
    }

    /// Upward pass: an unnamed edge or face whose bounding elements are
    /// all named gets a composite name from them. Returns whether any
    /// element is still unnamed.
    fn propagate_up(
        &self,
        new_names: &NewNames,
        delayed: bool,
        op: &str,
    ) -> Result<bool, NamingError> {
        let mut has_unnamed = false;
        for (parent_kind, child_kind) in [
            (ShapeKind::Edge, ShapeKind::Vertex),
            (ShapeKind::Face, ShapeKind::Edge),
        ] {
            let parent_map = self.ancestry(parent_kind);
            let child_map = self.ancestry(child_kind);
            for i in 1..=parent_map.count() {
                let element = IndexedName::new(parent_kind, i as u32);
                if self.mapped_name(element).is_some() {
                    continue;
                }
                let Some(parent) = parent_map.find_shape(i) else {
                    continue;
                };
                // A face is bounded by its outer wire only; holes do not
                // contribute to its name.
                let boundary = if parent_kind == ShapeKind::Face {
                    match parent.outer_wire() {
                        Some(wire) => wire.sub_shapes(child_kind),
                        None => parent.sub_shapes(child_kind),
                    }
                } else {
                    parent.sub_shapes(child_kind)
                };

                let mut sids: Vec<Sid> = Vec::new();
                let mut names: BTreeMap<MappedName, IndexedName> = BTreeMap::new();
                let mut complete = true;
                for sub in boundary {
                    let j = child_map.find_index(&sub);
                    if j == 0 {
                        continue;
                    }
                    let child = IndexedName::new(child_kind, j as u32);
                    if !delayed && new_names.contains_key(&child) {
                        // A pending candidate may still name this child.
                        complete = false;
                        break;
                    }
                    let Some((name, sid)) = self.mapped_name_with_sids(child) else {
                        warn!(%child, "unnamed lower element");
                        complete = false;
                        break;
                    };
                    match names.entry(name.clone()) {
                        std::collections::btree_map::Entry::Vacant(slot) => {
                            slot.insert(child);
                            sids.extend(sid);
                        }
                        std::collections::btree_map::Entry::Occupied(existing) => {
                            if *existing.get() != child {
                                warn!(%child, other = %existing.get(), %name,
                                    "duplicate boundary name");
                            }
                        }
                    }
                }
                if !complete || names.is_empty() {
                    has_unnamed = true;
                    continue;
                }

                let mut iter = names.iter();
                let Some((first_name, _)) = iter.next() else {
                    continue;
                };
                let mut new_name = first_name.clone();
                let suffix = if names.len() == 1 {
                    POSTFIX_LOWER.to_string()
                } else {
                    let mut pieces = String::new();
                    if self.hasher().is_none() {
                        pieces.push_str(POSTFIX_LOWER);
                    }
                    pieces.push('(');
                    let mut first = true;
                    let mut taken = 0;
                    for (name, _) in iter {
                        if first {
                            first = false;
                        } else {
                            pieces.push('|');
                        }
                        pieces.push_str(name.as_str());
                        taken += 1;
                        if taken == 4 {
                            break;
                        }
                    }
                    pieces.push(')');
                    if let Some(hasher) = self.hasher() {
                        let sid = hasher.intern(&pieces);
                        pieces = format!("{}{}", POSTFIX_LOWER, sid);
                        sids.push(sid);
                    }
                    pieces
                };
                encode_element_name(
                    element.kind.type_char(),
                    &mut new_name,
                    &suffix,
                    &mut sids,
                    self.hasher(),
                    self.tag,
                    op,
                    0,
                );
                self.set_element_name(element, new_name, sids)?;
            }
        }
        Ok(has_unnamed)
    }
}
