//! Subgraph capture.
//!
//! # Responsibility
//! - Turn a set of selected ids into a validated, immutable `Subgraph`.
//! - Extract identifier-free patterns from live objects.
//!
//! # Invariants
//! - Captures require resolved containment.
//! - A `Disjoint` subgraph never holds an object together with one of its
//!   ancestors.
//! - A `NestedPair` subgraph is `[outer, inner]` with `inner` directly inside
//!   `outer`.
//! - A subgraph owns nothing; members may disappear and callers re-validate.

use crate::graph::store::{GraphError, GraphStore};
use crate::model::object::{Container, GraphObject, ObjectId};
use crate::model::pattern::{Pattern, PatternNode};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Why a selection cannot form a subgraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionIssue {
    Empty,
    UnknownObject(ObjectId),
    DuplicateMember(ObjectId),
    /// `descendant` is already covered by the selected `ancestor`.
    AncestorOverlap {
        ancestor: ObjectId,
        descendant: ObjectId,
    },
    NotACut(ObjectId),
    /// Neither cut directly contains the other.
    NotNested { first: ObjectId, second: ObjectId },
    /// Containment must be recalculated before capturing.
    StaleContainment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    InvalidSelection(SelectionIssue),
}

impl SelectionError {
    pub fn issue(&self) -> &SelectionIssue {
        match self {
            Self::InvalidSelection(issue) => issue,
        }
    }
}

impl Display for SelectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let Self::InvalidSelection(issue) = self;
        match issue {
            SelectionIssue::Empty => write!(f, "invalid selection: nothing selected"),
            SelectionIssue::UnknownObject(id) => {
                write!(f, "invalid selection: object {id} does not exist")
            }
            SelectionIssue::DuplicateMember(id) => {
                write!(f, "invalid selection: object {id} selected twice")
            }
            SelectionIssue::AncestorOverlap {
                ancestor,
                descendant,
            } => write!(
                f,
                "invalid selection: {descendant} is already inside selected {ancestor}"
            ),
            SelectionIssue::NotACut(id) => write!(f, "invalid selection: {id} is not a cut"),
            SelectionIssue::NotNested { first, second } => write!(
                f,
                "invalid selection: neither {first} nor {second} directly contains the other"
            ),
            SelectionIssue::StaleContainment => {
                write!(f, "invalid selection: containment is out of date")
            }
        }
    }
}

impl Error for SelectionError {}

impl From<SelectionIssue> for SelectionError {
    fn from(value: SelectionIssue) -> Self {
        Self::InvalidSelection(value)
    }
}

impl From<GraphError> for SelectionError {
    fn from(value: GraphError) -> Self {
        match value {
            GraphError::NotACut(id) => Self::InvalidSelection(SelectionIssue::NotACut(id)),
            GraphError::ObjectNotFound(id)
            | GraphError::DuplicateObject(id)
            | GraphError::UnknownParent { object: id, .. }
            | GraphError::InvalidRecord { object: id, .. } => {
                Self::InvalidSelection(SelectionIssue::UnknownObject(id))
            }
            GraphError::Validation(_) => Self::InvalidSelection(SelectionIssue::Empty),
        }
    }
}

pub type SelectionResult<T> = Result<T, SelectionError>;

/// How the members of a subgraph relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubgraphShape {
    /// No member lies inside another.
    Disjoint,
    /// Exactly `[outer, inner]`, inner a direct child of outer.
    NestedPair,
}

/// Immutable set of member ids captured at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subgraph {
    members: Vec<ObjectId>,
    shape: SubgraphShape,
}

impl Subgraph {
    pub fn members(&self) -> &[ObjectId] {
        &self.members
    }

    pub fn shape(&self) -> SubgraphShape {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.members.contains(&id)
    }

    /// `(outer, inner)` for a nested pair.
    pub fn pair(&self) -> Option<(ObjectId, ObjectId)> {
        match (self.shape, self.members.as_slice()) {
            (SubgraphShape::NestedPair, [outer, inner]) => Some((*outer, *inner)),
            _ => None,
        }
    }

    /// Top-level members: all of them when disjoint, the outer cut of a pair.
    pub fn roots(&self) -> &[ObjectId] {
        match self.shape {
            SubgraphShape::Disjoint => &self.members,
            SubgraphShape::NestedPair => &self.members[..1],
        }
    }

    /// Checks every member still exists.
    pub fn validate(&self, store: &GraphStore) -> SelectionResult<()> {
        match self.members.iter().find(|id| !store.contains(**id)) {
            Some(missing) => Err(SelectionIssue::UnknownObject(*missing).into()),
            None => Ok(()),
        }
    }

    /// Identifier-free copy of the subgraph, one tree per root.
    pub fn pattern(&self, store: &GraphStore) -> SelectionResult<Pattern> {
        let nodes = self
            .roots()
            .iter()
            .map(|id| pattern_of(store, *id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Pattern::new(nodes))
    }

    /// The container shared by every root, if there is one.
    pub fn common_parent(&self, store: &GraphStore) -> Option<Container> {
        let mut parents = self.roots().iter().map(|id| store.parent_of(*id));
        let first = parents.next()?.ok()?;
        parents
            .all(|parent| parent.as_ref().is_ok_and(|parent| *parent == first))
            .then_some(first)
    }
}

/// Captures an ancestor-disjoint selection.
///
/// # Errors
/// - `StaleContainment` when the store needs recalculation.
/// - `Empty`, `UnknownObject`, `DuplicateMember` or `AncestorOverlap` for a bad
///   member list.
pub fn capture(store: &GraphStore, ids: &[ObjectId]) -> SelectionResult<Subgraph> {
    require_resolved(store)?;
    if ids.is_empty() {
        return Err(SelectionIssue::Empty.into());
    }

    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !store.contains(*id) {
            return Err(SelectionIssue::UnknownObject(*id).into());
        }
        if !seen.insert(*id) {
            return Err(SelectionIssue::DuplicateMember(*id).into());
        }
    }

    for id in ids {
        if let Some(ancestor) = selected_ancestor(store, *id, &seen) {
            return Err(SelectionIssue::AncestorOverlap {
                ancestor,
                descendant: *id,
            }
            .into());
        }
    }

    Ok(Subgraph {
        members: ids.to_vec(),
        shape: SubgraphShape::Disjoint,
    })
}

/// Captures the outermost objects of a selection, dropping ids that already
/// sit inside another selected object. Useful after select-with-children.
pub fn capture_roots(store: &GraphStore, ids: &[ObjectId]) -> SelectionResult<Subgraph> {
    require_resolved(store)?;
    let mut unique = Vec::with_capacity(ids.len());
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if seen.insert(*id) {
            unique.push(*id);
        }
    }
    let roots: Vec<ObjectId> = unique
        .iter()
        .copied()
        .filter(|id| selected_ancestor(store, *id, &seen).is_none())
        .collect();
    capture(store, &roots)
}

/// Captures a double-cut pair in either order, normalized to `(outer, inner)`.
///
/// # Errors
/// - `NotACut` when either id is a symbol.
/// - `NotNested` unless one cut is a direct child of the other.
pub fn capture_pair(store: &GraphStore, first: ObjectId, second: ObjectId) -> SelectionResult<Subgraph> {
    require_resolved(store)?;
    if first == second {
        return Err(SelectionIssue::DuplicateMember(first).into());
    }
    let first_cut = store.require_cut(first)?;
    let second_cut = store.require_cut(second)?;

    let (outer, inner) = if second_cut.parent() == Container::Cut(first) {
        (first, second)
    } else if first_cut.parent() == Container::Cut(second) {
        (second, first)
    } else {
        return Err(SelectionIssue::NotNested { first, second }.into());
    };

    Ok(Subgraph {
        members: vec![outer, inner],
        shape: SubgraphShape::NestedPair,
    })
}

/// Identifier-free tree for one object and everything inside it.
pub fn pattern_of(store: &GraphStore, id: ObjectId) -> SelectionResult<PatternNode> {
    match store.get(id) {
        None => Err(SelectionIssue::UnknownObject(id).into()),
        Some(GraphObject::Symbol(symbol)) => Ok(PatternNode::Symbol(symbol.label().clone())),
        Some(GraphObject::Cut(_)) => {
            let children = store
                .children(Container::Cut(id))?
                .into_iter()
                .map(|child| pattern_of(store, child))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(PatternNode::Cut(children))
        }
    }
}

fn require_resolved(store: &GraphStore) -> SelectionResult<()> {
    if store.is_resolved() {
        Ok(())
    } else {
        Err(SelectionIssue::StaleContainment.into())
    }
}

fn selected_ancestor(store: &GraphStore, id: ObjectId, selected: &HashSet<ObjectId>) -> Option<ObjectId> {
    let parent = store.parent_of(id).ok()?;
    std::iter::once(parent)
        .chain(store.ancestors(parent))
        .filter_map(Container::cut_id)
        .find(|ancestor| selected.contains(ancestor))
}
