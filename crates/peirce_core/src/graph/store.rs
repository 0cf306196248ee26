//! Graph store: owner of every cut and symbol.
//!
//! # Responsibility
//! - Own all objects and the implicit sheet of assertion.
//! - Provide lookup, cascading removal and descendant traversal.
//! - Track whether containment data is current.
//!
//! # Invariants
//! - Child lists are derived from parent links and ordered by creation sequence.
//! - Any mutation invalidates containment until the resolver runs again.
//! - Parent links are rewritten only inside this crate (resolver, rule engine).

use crate::model::object::{
    new_object_id, BoundaryHandle, Container, Cut, GraphObject, ObjectId, ObjectKind,
    ObjectValidationError, Symbol, SymbolLabel,
};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::iter::FusedIterator;

pub type GraphResult<T> = Result<T, GraphError>;

/// Errors from graph store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Object id is not present in the store.
    ObjectNotFound(ObjectId),
    /// Object exists but is a symbol where a cut is required.
    NotACut(ObjectId),
    /// Snapshot carries the same id twice.
    DuplicateObject(ObjectId),
    /// Snapshot record points at a parent that is not in the snapshot.
    UnknownParent { object: ObjectId, parent: ObjectId },
    /// Snapshot record is internally inconsistent.
    InvalidRecord { object: ObjectId, reason: String },
    /// Object field validation failed.
    Validation(ObjectValidationError),
}

impl Display for GraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ObjectNotFound(id) => write!(f, "object not found: {id}"),
            Self::NotACut(id) => write!(f, "object is not a cut: {id}"),
            Self::DuplicateObject(id) => write!(f, "duplicate object id: {id}"),
            Self::UnknownParent { object, parent } => {
                write!(f, "object {object} references unknown parent {parent}")
            }
            Self::InvalidRecord { object, reason } => {
                write!(f, "invalid record for object {object}: {reason}")
            }
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GraphError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ObjectValidationError> for GraphError {
    fn from(value: ObjectValidationError) -> Self {
        Self::Validation(value)
    }
}

/// One object dropped by a removal, with the boundary to release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovedObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub boundary: BoundaryHandle,
}

/// Persisted shape of one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub boundary: BoundaryHandle,
    /// `None` means the object sits on the sheet.
    pub parent: Option<ObjectId>,
    /// Present for symbols only.
    pub label: Option<SymbolLabel>,
}

/// Persisted graph in creation order. Levels are deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub objects: Vec<ObjectRecord>,
}

/// Owner of every cut and symbol in one editing session.
#[derive(Debug, Clone)]
pub struct GraphStore {
    objects: HashMap<ObjectId, GraphObject>,
    order: Vec<ObjectId>,
    sheet_cuts: Vec<ObjectId>,
    sheet_symbols: Vec<ObjectId>,
    proof_selected: Vec<ObjectId>,
    next_sequence: u64,
    resolved: bool,
}

impl GraphStore {
    /// Creates an empty graph: just the sheet, trivially resolved.
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            order: Vec::new(),
            sheet_cuts: Vec::new(),
            sheet_symbols: Vec::new(),
            proof_selected: Vec::new(),
            next_sequence: 0,
            resolved: true,
        }
    }

    /// Adds a cut on the sheet; the resolver places it properly.
    pub fn add_cut(&mut self, boundary: BoundaryHandle) -> ObjectId {
        self.insert_cut(boundary, Container::Sheet)
    }

    /// Adds a symbol on the sheet; the resolver places it properly.
    pub fn add_symbol(&mut self, label: &str, boundary: BoundaryHandle) -> GraphResult<ObjectId> {
        let label = SymbolLabel::new(label)?;
        Ok(self.insert_symbol(label, boundary, Container::Sheet))
    }

    pub fn get(&self, id: ObjectId) -> Option<&GraphObject> {
        self.objects.get(&id)
    }

    pub fn cut(&self, id: ObjectId) -> Option<&Cut> {
        self.objects.get(&id).and_then(GraphObject::as_cut)
    }

    pub fn symbol(&self, id: ObjectId) -> Option<&Symbol> {
        self.objects.get(&id).and_then(GraphObject::as_symbol)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All objects in creation order.
    pub fn objects(&self) -> impl Iterator<Item = &GraphObject> + '_ {
        self.order.iter().filter_map(|id| self.objects.get(id))
    }

    /// Ids of all objects in creation order.
    pub fn object_ids(&self) -> &[ObjectId] {
        &self.order
    }

    /// Direct children of a container in creation order.
    pub fn children(&self, container: Container) -> GraphResult<Vec<ObjectId>> {
        let (cuts, symbols) = match container {
            Container::Sheet => (self.sheet_cuts.as_slice(), self.sheet_symbols.as_slice()),
            Container::Cut(id) => {
                let cut = self.require_cut(id)?;
                (cut.child_cuts(), cut.child_symbols())
            }
        };
        Ok(self.merge_by_sequence(cuts, symbols))
    }

    /// Level of a container: 0 for the sheet, the cut's level otherwise.
    pub fn container_level(&self, container: Container) -> GraphResult<u32> {
        match container {
            Container::Sheet => Ok(0),
            Container::Cut(id) => Ok(self.require_cut(id)?.level()),
        }
    }

    pub fn parent_of(&self, id: ObjectId) -> GraphResult<Container> {
        self.require(id).map(GraphObject::parent)
    }

    /// Level of the area an object sits in, i.e. its parent's level.
    pub fn area_level(&self, id: ObjectId) -> GraphResult<u32> {
        let parent = self.parent_of(id)?;
        self.container_level(parent)
    }

    /// Strict ancestors of a container, innermost first, ending at the sheet.
    pub fn ancestors(&self, container: Container) -> Ancestors<'_> {
        Ancestors {
            store: self,
            cursor: container,
            seen: HashSet::new(),
        }
    }

    /// Whether `container` is `ancestor` or lies somewhere inside it.
    pub fn is_within(&self, container: Container, ancestor: Container) -> bool {
        container == ancestor || self.ancestors(container).any(|item| item == ancestor)
    }

    /// Lazy pre-order walk over everything transitively inside `id`.
    pub fn all_descendants(&self, id: ObjectId) -> Descendants<'_> {
        let stack = match self.cut(id) {
            Some(cut) => {
                let mut children = self.merge_by_sequence(cut.child_cuts(), cut.child_symbols());
                children.reverse();
                children
            }
            None => Vec::new(),
        };
        Descendants { store: self, stack }
    }

    /// Removes an object and all of its descendants.
    ///
    /// # Side effects
    /// - Detaches the object from its parent's child lists and the selection.
    /// - Invalidates containment.
    pub fn remove(&mut self, id: ObjectId) -> GraphResult<Vec<RemovedObject>> {
        self.require(id)?;
        let mut doomed = vec![id];
        doomed.extend(self.all_descendants(id));
        Ok(self.remove_objects(&doomed))
    }

    /// Flips the proof selection of `id`, optionally applying the new state to
    /// every descendant. Returns the new state of `id`.
    pub fn toggle_proof_selected(
        &mut self,
        id: ObjectId,
        include_descendants: bool,
    ) -> GraphResult<bool> {
        let selected = !self.require(id)?.is_proof_selected();
        let mut targets = vec![id];
        if include_descendants {
            targets.extend(self.all_descendants(id));
        }
        for target in targets {
            self.set_proof_selected(target, selected);
        }
        Ok(selected)
    }

    /// Selected objects in selection order.
    pub fn proof_selected(&self) -> &[ObjectId] {
        &self.proof_selected
    }

    pub fn clear_proof_selection(&mut self) {
        for id in std::mem::take(&mut self.proof_selected) {
            if let Some(object) = self.objects.get_mut(&id) {
                object.set_proof_selected(false);
            }
        }
    }

    /// Whether parent links and levels reflect the current geometry.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Marks containment stale, e.g. after the geometry moved something.
    pub fn invalidate(&mut self) {
        self.resolved = false;
    }

    /// Exports the persisted shape of the graph.
    pub fn snapshot(&self) -> GraphSnapshot {
        let objects = self
            .objects()
            .map(|object| ObjectRecord {
                id: object.id(),
                kind: object.kind(),
                boundary: object.boundary(),
                parent: object.parent().cut_id(),
                label: object.as_symbol().map(|symbol| symbol.label().clone()),
            })
            .collect();
        GraphSnapshot { objects }
    }

    /// Rebuilds a store from a snapshot.
    ///
    /// Persisted parents are provisional: the returned store is stale and must
    /// be resolved against the geometry before first use.
    pub fn from_snapshot(snapshot: &GraphSnapshot) -> GraphResult<Self> {
        let mut store = Self::new();
        for record in &snapshot.objects {
            if record.id.is_nil() {
                return Err(ObjectValidationError::NilId.into());
            }
            if store.contains(record.id) {
                return Err(GraphError::DuplicateObject(record.id));
            }
            let sequence = store.take_sequence();
            let object = match (record.kind, &record.label) {
                (ObjectKind::Cut, None) => {
                    GraphObject::Cut(Cut::new(record.id, record.boundary, sequence))
                }
                (ObjectKind::Symbol, Some(label)) => GraphObject::Symbol(Symbol::new(
                    record.id,
                    label.clone(),
                    record.boundary,
                    sequence,
                )),
                (ObjectKind::Cut, Some(_)) => {
                    return Err(GraphError::InvalidRecord {
                        object: record.id,
                        reason: "cuts carry no label".to_string(),
                    });
                }
                (ObjectKind::Symbol, None) => {
                    return Err(GraphError::InvalidRecord {
                        object: record.id,
                        reason: "symbols require a label".to_string(),
                    });
                }
            };
            store.objects.insert(record.id, object);
            store.order.push(record.id);
        }

        for record in &snapshot.objects {
            if let Some(parent) = record.parent {
                match store.objects.get(&parent) {
                    None => {
                        return Err(GraphError::UnknownParent {
                            object: record.id,
                            parent,
                        });
                    }
                    Some(GraphObject::Symbol(_)) => return Err(GraphError::NotACut(parent)),
                    Some(GraphObject::Cut(_)) => {}
                }
            }
            store.set_parent(record.id, Container::from_parent_id(record.parent));
        }

        store.relink();
        store.assign_levels();
        store.invalidate();
        Ok(store)
    }

    pub(crate) fn insert_cut(&mut self, boundary: BoundaryHandle, parent: Container) -> ObjectId {
        let id = new_object_id();
        let sequence = self.take_sequence();
        let mut object = GraphObject::Cut(Cut::new(id, boundary, sequence));
        object.set_parent(parent);
        self.attach(object);
        id
    }

    pub(crate) fn insert_symbol(
        &mut self,
        label: SymbolLabel,
        boundary: BoundaryHandle,
        parent: Container,
    ) -> ObjectId {
        let id = new_object_id();
        let sequence = self.take_sequence();
        let mut object = GraphObject::Symbol(Symbol::new(id, label, boundary, sequence));
        object.set_parent(parent);
        self.attach(object);
        id
    }

    pub(crate) fn set_parent(&mut self, id: ObjectId, parent: Container) {
        if let Some(object) = self.objects.get_mut(&id) {
            object.set_parent(parent);
        }
        self.resolved = false;
    }

    pub(crate) fn remove_objects(&mut self, ids: &[ObjectId]) -> Vec<RemovedObject> {
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(object) = self.objects.remove(id) {
                removed.push(RemovedObject {
                    id: *id,
                    kind: object.kind(),
                    boundary: object.boundary(),
                });
            }
        }
        let gone: HashSet<ObjectId> = removed.iter().map(|item| item.id).collect();
        self.order.retain(|id| !gone.contains(id));
        self.proof_selected.retain(|id| !gone.contains(id));
        self.relink();
        self.resolved = false;
        removed
    }

    /// Rebuilds every child list from parent links, in creation order.
    pub(crate) fn relink(&mut self) {
        self.sheet_cuts.clear();
        self.sheet_symbols.clear();
        for object in self.objects.values_mut() {
            if let GraphObject::Cut(cut) = object {
                cut.clear_children();
            }
        }

        let placements: Vec<(ObjectId, ObjectKind, Container)> = self
            .order
            .iter()
            .filter_map(|id| self.objects.get(id))
            .map(|object| (object.id(), object.kind(), object.parent()))
            .collect();

        for (id, kind, parent) in placements {
            let slot = match parent {
                Container::Sheet => None,
                Container::Cut(parent_id) => match self.objects.get_mut(&parent_id) {
                    Some(GraphObject::Cut(cut)) => Some(cut),
                    _ => {
                        warn!(
                            "event=graph_relink module=graph status=warn object={id} missing_parent={parent_id}"
                        );
                        None
                    }
                },
            };
            match slot {
                Some(cut) => cut.push_child(kind, id),
                None => {
                    if let Some(object) = self.objects.get_mut(&id) {
                        object.set_parent(Container::Sheet);
                    }
                    match kind {
                        ObjectKind::Cut => self.sheet_cuts.push(id),
                        ObjectKind::Symbol => self.sheet_symbols.push(id),
                    }
                }
            }
        }
    }

    /// Assigns levels breadth-first from the sheet. Returns how many objects
    /// were reached; unreached objects keep their previous level.
    pub(crate) fn assign_levels(&mut self) -> usize {
        let mut reached = 0;
        let mut queue: VecDeque<(ObjectId, u32)> = self
            .merge_by_sequence(&self.sheet_cuts, &self.sheet_symbols)
            .into_iter()
            .map(|id| (id, 1))
            .collect();

        while let Some((id, level)) = queue.pop_front() {
            let Some(object) = self.objects.get_mut(&id) else {
                continue;
            };
            object.set_level(level);
            reached += 1;
            if let GraphObject::Cut(cut) = object {
                let children = cut
                    .child_cuts()
                    .iter()
                    .chain(cut.child_symbols())
                    .copied()
                    .collect::<Vec<_>>();
                queue.extend(children.into_iter().map(|child| (child, level + 1)));
            }
        }
        reached
    }

    pub(crate) fn mark_resolved(&mut self) {
        self.resolved = true;
    }

    pub(crate) fn require(&self, id: ObjectId) -> GraphResult<&GraphObject> {
        self.objects.get(&id).ok_or(GraphError::ObjectNotFound(id))
    }

    pub(crate) fn require_cut(&self, id: ObjectId) -> GraphResult<&Cut> {
        match self.objects.get(&id) {
            None => Err(GraphError::ObjectNotFound(id)),
            Some(GraphObject::Cut(cut)) => Ok(cut),
            Some(GraphObject::Symbol(_)) => Err(GraphError::NotACut(id)),
        }
    }

    fn attach(&mut self, object: GraphObject) {
        let id = object.id();
        self.objects.insert(id, object);
        self.order.push(id);
        self.relink();
        self.resolved = false;
    }

    fn take_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    fn set_proof_selected(&mut self, id: ObjectId, selected: bool) {
        let Some(object) = self.objects.get_mut(&id) else {
            return;
        };
        object.set_proof_selected(selected);
        let listed = self.proof_selected.contains(&id);
        if selected && !listed {
            self.proof_selected.push(id);
        } else if !selected && listed {
            self.proof_selected.retain(|item| *item != id);
        }
    }

    fn merge_by_sequence(&self, cuts: &[ObjectId], symbols: &[ObjectId]) -> Vec<ObjectId> {
        let mut merged: Vec<ObjectId> = cuts.iter().chain(symbols).copied().collect();
        merged.sort_by_key(|id| {
            self.objects
                .get(id)
                .map_or(u64::MAX, GraphObject::sequence)
        });
        merged
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk from a container up to the sheet. Stops early on a parent cycle.
pub struct Ancestors<'a> {
    store: &'a GraphStore,
    cursor: Container,
    seen: HashSet<ObjectId>,
}

impl Iterator for Ancestors<'_> {
    type Item = Container;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor.cut_id()?;
        if !self.seen.insert(id) {
            return None;
        }
        let parent = self.store.get(id)?.parent();
        self.cursor = parent;
        Some(parent)
    }
}

/// Lazy pre-order traversal of an object's descendants. Single pass.
pub struct Descendants<'a> {
    store: &'a GraphStore,
    stack: Vec<ObjectId>,
}

impl Iterator for Descendants<'_> {
    type Item = ObjectId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        if let Some(cut) = self.store.cut(id) {
            let mut children = self
                .store
                .merge_by_sequence(cut.child_cuts(), cut.child_symbols());
            children.reverse();
            self.stack.extend(children);
        }
        Some(id)
    }
}

impl FusedIterator for Descendants<'_> {}

#[cfg(test)]
mod tests {
    use super::{GraphError, GraphStore};
    use crate::model::object::{BoundaryHandle, Container, ObjectKind};

    fn handle(raw: u64) -> BoundaryHandle {
        BoundaryHandle::new(raw)
    }

    /// sheet > outer > [inner > [p], q]
    fn nested_store() -> (GraphStore, [uuid::Uuid; 4]) {
        let mut store = GraphStore::new();
        let outer = store.add_cut(handle(1));
        let inner = store.add_cut(handle(2));
        let p = store.add_symbol("P", handle(3)).expect("valid symbol");
        let q = store.add_symbol("Q", handle(4)).expect("valid symbol");
        store.set_parent(inner, Container::Cut(outer));
        store.set_parent(p, Container::Cut(inner));
        store.set_parent(q, Container::Cut(outer));
        store.relink();
        store.assign_levels();
        store.mark_resolved();
        (store, [outer, inner, p, q])
    }

    #[test]
    fn add_objects_land_on_sheet_and_invalidate() {
        let mut store = GraphStore::new();
        assert!(store.is_resolved());
        let cut = store.add_cut(handle(1));
        let symbol = store.add_symbol("A", handle(2)).expect("valid symbol");

        assert!(!store.is_resolved());
        assert_eq!(store.parent_of(cut).unwrap(), Container::Sheet);
        assert_eq!(store.children(Container::Sheet).unwrap(), vec![cut, symbol]);
        assert_eq!(store.symbol(symbol).unwrap().label().as_str(), "A");
    }

    #[test]
    fn add_symbol_rejects_blank_label() {
        let mut store = GraphStore::new();
        let err = store.add_symbol("  ", handle(1)).unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn descendants_are_preorder_and_finite() {
        let (store, [outer, inner, p, q]) = nested_store();
        let walked: Vec<_> = store.all_descendants(outer).collect();
        assert_eq!(walked, vec![inner, p, q]);

        let mut walk = store.all_descendants(inner);
        assert_eq!(walk.next(), Some(p));
        assert_eq!(walk.next(), None);
        assert_eq!(walk.next(), None);
        assert_eq!(store.all_descendants(q).count(), 0);
    }

    #[test]
    fn levels_follow_parent_plus_one() {
        let (store, [outer, inner, p, q]) = nested_store();
        assert_eq!(store.get(outer).unwrap().level(), 1);
        assert_eq!(store.get(inner).unwrap().level(), 2);
        assert_eq!(store.get(p).unwrap().level(), 3);
        assert_eq!(store.get(q).unwrap().level(), 2);
        assert_eq!(store.area_level(p).unwrap(), 2);
        assert_eq!(store.container_level(Container::Sheet).unwrap(), 0);
    }

    #[test]
    fn remove_cascades_and_clears_selection() {
        let (mut store, [outer, inner, p, q]) = nested_store();
        store.toggle_proof_selected(p, false).unwrap();
        store.toggle_proof_selected(q, false).unwrap();

        let removed = store.remove(inner).unwrap();
        let removed_ids: Vec<_> = removed.iter().map(|item| item.id).collect();
        assert_eq!(removed_ids, vec![inner, p]);
        assert_eq!(removed[0].kind, ObjectKind::Cut);
        assert!(!store.contains(p));
        assert_eq!(store.children(Container::Cut(outer)).unwrap(), vec![q]);
        assert_eq!(store.proof_selected(), &[q]);
        assert!(!store.is_resolved());
    }

    #[test]
    fn toggle_with_descendants_selects_whole_subtree() {
        let (mut store, [outer, inner, p, q]) = nested_store();
        assert!(store.toggle_proof_selected(outer, true).unwrap());
        assert_eq!(store.proof_selected(), &[outer, inner, p, q]);
        assert!(store.get(p).unwrap().is_proof_selected());

        assert!(!store.toggle_proof_selected(outer, true).unwrap());
        assert!(store.proof_selected().is_empty());
    }

    #[test]
    fn ancestors_walk_to_sheet() {
        let (store, [outer, inner, _p, _q]) = nested_store();
        let chain: Vec<_> = store.ancestors(Container::Cut(inner)).collect();
        assert_eq!(chain, vec![Container::Cut(outer), Container::Sheet]);
        assert!(store.is_within(Container::Cut(inner), Container::Cut(outer)));
        assert!(!store.is_within(Container::Cut(outer), Container::Cut(inner)));
    }

    #[test]
    fn snapshot_restores_structure_but_stays_stale() {
        let (store, [outer, inner, p, _q]) = nested_store();
        let restored = GraphStore::from_snapshot(&store.snapshot()).unwrap();

        assert!(!restored.is_resolved());
        assert_eq!(restored.len(), 4);
        assert_eq!(restored.parent_of(p).unwrap(), Container::Cut(inner));
        assert_eq!(restored.parent_of(inner).unwrap(), Container::Cut(outer));
        assert_eq!(restored.object_ids(), store.object_ids());
    }

    #[test]
    fn snapshot_rejects_symbol_parent() {
        let (store, [_outer, _inner, p, q]) = nested_store();
        let mut snapshot = store.snapshot();
        for record in &mut snapshot.objects {
            if record.id == q {
                record.parent = Some(p);
            }
        }
        let err = GraphStore::from_snapshot(&snapshot).unwrap_err();
        assert_eq!(err, GraphError::NotACut(p));
    }
}
