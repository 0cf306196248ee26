//! Transformation rule engine.
//!
//! # Responsibility
//! - Decide legality of the six classical rules against resolved containment.
//! - Apply legal rules atomically to the graph store and geometry.
//!
//! # Invariants
//! - Validation never mutates anything.
//! - Geometry layout runs before any store mutation; boundaries created for a
//!   failed attempt are released again.
//! - A successful rule leaves containment stale until the next recalculation.

use crate::geometry::{Geometry, GeometryError};
use crate::graph::store::GraphStore;
use crate::graph::subgraph::{pattern_of, SelectionIssue, Subgraph, SubgraphShape};
use crate::model::object::{BoundaryHandle, Container, ObjectId};
use crate::model::pattern::{Pattern, PatternNode};
use crate::rules::error::{RuleRejection, RuleResult};
use log::{debug, info};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Classical transformation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    DoubleCutInsertion,
    DoubleCutRemoval,
    Insertion,
    Erasure,
    Iteration,
    Deiteration,
}

impl Rule {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DoubleCutInsertion => "double_cut_insertion",
            Self::DoubleCutRemoval => "double_cut_removal",
            Self::Insertion => "insertion",
            Self::Erasure => "erasure",
            Self::Iteration => "iteration",
            Self::Deiteration => "deiteration",
        }
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule together with its operands.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleRequest {
    DoubleCutInsertion(Subgraph),
    /// Operand must be a `NestedPair` subgraph.
    DoubleCutRemoval(Subgraph),
    Insertion { pattern: Pattern, target: Container },
    Erasure(Subgraph),
    Iteration { source: Subgraph, target: Container },
    Deiteration(Subgraph),
}

impl RuleRequest {
    pub fn rule(&self) -> Rule {
        match self {
            Self::DoubleCutInsertion(_) => Rule::DoubleCutInsertion,
            Self::DoubleCutRemoval(_) => Rule::DoubleCutRemoval,
            Self::Insertion { .. } => Rule::Insertion,
            Self::Erasure(_) => Rule::Erasure,
            Self::Iteration { .. } => Rule::Iteration,
            Self::Deiteration(_) => Rule::Deiteration,
        }
    }
}

/// What a successful rule did to the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEffect {
    pub rule: Rule,
    /// New objects in creation order.
    pub created: Vec<ObjectId>,
    /// Removed objects, roots before their descendants.
    pub removed: Vec<ObjectId>,
}

impl RuleEffect {
    fn new(rule: Rule) -> Self {
        Self {
            rule,
            created: Vec::new(),
            removed: Vec::new(),
        }
    }
}

/// Applies rules to one graph and its geometry.
pub struct RuleEngine<'a, G: Geometry + ?Sized> {
    store: &'a mut GraphStore,
    geometry: &'a mut G,
}

impl<'a, G: Geometry + ?Sized> RuleEngine<'a, G> {
    pub fn new(store: &'a mut GraphStore, geometry: &'a mut G) -> Self {
        Self { store, geometry }
    }

    /// Checks legality without touching the graph or geometry.
    pub fn check(&self, request: &RuleRequest) -> RuleResult<()> {
        let store: &GraphStore = &*self.store;
        match request {
            RuleRequest::DoubleCutInsertion(subgraph) => {
                validate_double_cut_insertion(store, subgraph).map(|_| ())
            }
            RuleRequest::DoubleCutRemoval(subgraph) => {
                validate_double_cut_removal(store, subgraph).map(|_| ())
            }
            RuleRequest::Insertion { pattern, target } => {
                validate_insertion(store, pattern, *target)
            }
            RuleRequest::Erasure(subgraph) => validate_erasure(store, subgraph).map(|_| ()),
            RuleRequest::Iteration { source, target } => {
                validate_iteration(store, source, *target).map(|_| ())
            }
            RuleRequest::Deiteration(subgraph) => {
                validate_deiteration(store, subgraph).map(|_| ())
            }
        }
    }

    /// Applies any rule request.
    ///
    /// # Side effects
    /// - Emits `rule_apply` logging events with status and duration.
    pub fn apply(&mut self, request: &RuleRequest) -> RuleResult<RuleEffect> {
        let started_at = Instant::now();
        let rule = request.rule();
        let outcome = match request {
            RuleRequest::DoubleCutInsertion(subgraph) => self.double_cut_insertion(subgraph),
            RuleRequest::DoubleCutRemoval(subgraph) => self.double_cut_removal(subgraph),
            RuleRequest::Insertion { pattern, target } => self.insertion(pattern, *target),
            RuleRequest::Erasure(subgraph) => self.erasure(subgraph),
            RuleRequest::Iteration { source, target } => self.iteration(source, *target),
            RuleRequest::Deiteration(subgraph) => self.deiteration(subgraph),
        };

        match &outcome {
            Ok(effect) => info!(
                "event=rule_apply module=rules status=ok rule={} created={} removed={} duration_us={}",
                rule,
                effect.created.len(),
                effect.removed.len(),
                started_at.elapsed().as_micros()
            ),
            Err(rejection) => info!(
                "event=rule_apply module=rules status=rejected rule={} error_code={} duration_us={}",
                rule,
                rejection.code(),
                started_at.elapsed().as_micros()
            ),
        }
        outcome
    }

    /// Wraps sibling members in two fresh nested cuts.
    pub fn double_cut_insertion(&mut self, subgraph: &Subgraph) -> RuleResult<RuleEffect> {
        let parent = validate_double_cut_insertion(self.store, subgraph)?;
        let roots = subgraph.roots().to_vec();

        let mut region = self.region_of(&roots);
        let inner_boundary = self.geometry.enclose(&region)?;
        region.push(inner_boundary);
        let outer_boundary = match self.geometry.enclose(&region) {
            Ok(boundary) => boundary,
            Err(err) => {
                self.geometry.release(inner_boundary);
                return Err(err.into());
            }
        };

        let outer = self.store.insert_cut(outer_boundary, parent);
        let inner = self.store.insert_cut(inner_boundary, Container::Cut(outer));
        for id in &roots {
            self.store.set_parent(*id, Container::Cut(inner));
        }
        self.finish();

        let mut effect = RuleEffect::new(Rule::DoubleCutInsertion);
        effect.created = vec![outer, inner];
        Ok(effect)
    }

    /// Deletes a double cut and lifts the inner cut's contents two levels.
    pub fn double_cut_removal(&mut self, subgraph: &Subgraph) -> RuleResult<RuleEffect> {
        let (outer, inner, parent) = validate_double_cut_removal(self.store, subgraph)?;
        let lifted = self
            .store
            .children(Container::Cut(inner))
            .map_err(|_| RuleRejection::InvalidPair {
                members: vec![outer, inner],
            })?;

        for id in &lifted {
            self.store.set_parent(*id, parent);
        }
        let removed = self.store.remove_objects(&[outer, inner]);
        for item in &removed {
            self.geometry.release(item.boundary);
        }
        self.finish();

        let mut effect = RuleEffect::new(Rule::DoubleCutRemoval);
        effect.removed = removed.into_iter().map(|item| item.id).collect();
        Ok(effect)
    }

    /// Materializes `pattern` inside an odd-level cut.
    pub fn insertion(&mut self, pattern: &Pattern, target: Container) -> RuleResult<RuleEffect> {
        validate_insertion(self.store, pattern, target)?;
        let created = self.materialize(pattern, target)?;
        self.finish();

        let mut effect = RuleEffect::new(Rule::Insertion);
        effect.created = created;
        Ok(effect)
    }

    /// Removes sibling members from an even-level area, with everything inside.
    pub fn erasure(&mut self, subgraph: &Subgraph) -> RuleResult<RuleEffect> {
        validate_erasure(self.store, subgraph)?;
        let mut doomed = Vec::new();
        for id in subgraph.roots() {
            doomed.push(*id);
            doomed.extend(self.store.all_descendants(*id));
        }
        let removed = self.store.remove_objects(&doomed);
        for item in &removed {
            self.geometry.release(item.boundary);
        }
        self.finish();

        let mut effect = RuleEffect::new(Rule::Erasure);
        effect.removed = removed.into_iter().map(|item| item.id).collect();
        Ok(effect)
    }

    /// Copies the source subgraph into `target`, which must lie in its area.
    pub fn iteration(&mut self, source: &Subgraph, target: Container) -> RuleResult<RuleEffect> {
        let pattern = validate_iteration(self.store, source, target)?;
        let created = self.materialize(&pattern, target)?;
        self.finish();

        let mut effect = RuleEffect::new(Rule::Iteration);
        effect.created = created;
        Ok(effect)
    }

    /// Removes a copy justified by an identical one in an enclosing area.
    pub fn deiteration(&mut self, subgraph: &Subgraph) -> RuleResult<RuleEffect> {
        let justification = validate_deiteration(self.store, subgraph)?;
        debug!(
            "event=deiteration_match module=rules status=ok justified_by={}",
            justification
        );
        let mut doomed = Vec::new();
        for id in subgraph.roots() {
            doomed.push(*id);
            doomed.extend(self.store.all_descendants(*id));
        }
        let removed = self.store.remove_objects(&doomed);
        for item in &removed {
            self.geometry.release(item.boundary);
        }
        self.finish();

        let mut effect = RuleEffect::new(Rule::Deiteration);
        effect.removed = removed.into_iter().map(|item| item.id).collect();
        Ok(effect)
    }

    fn region_of(&self, roots: &[ObjectId]) -> Vec<BoundaryHandle> {
        let mut region = Vec::new();
        for id in roots {
            let subtree = std::iter::once(*id).chain(self.store.all_descendants(*id));
            region.extend(
                subtree
                    .filter_map(|member| self.store.get(member))
                    .map(|object| object.boundary()),
            );
        }
        region
    }

    /// Lays out and creates `pattern` under `target`; nothing is created when
    /// layout fails.
    fn materialize(&mut self, pattern: &Pattern, target: Container) -> RuleResult<Vec<ObjectId>> {
        let target_boundary = match target {
            Container::Sheet => None,
            Container::Cut(id) => Some(
                self.store
                    .require_cut(id)
                    .map_err(|err| RuleRejection::InvalidSelection(err.into()))?
                    .boundary(),
            ),
        };
        let handles = self.geometry.place(pattern, target_boundary)?;
        if handles.len() != pattern.node_count() {
            for handle in handles {
                self.geometry.release(handle);
            }
            return Err(RuleRejection::Layout(GeometryError::NoRoom {
                target: target_boundary,
            }));
        }

        let mut created = Vec::with_capacity(handles.len());
        let mut handles = handles.into_iter();
        self.materialize_nodes(pattern.nodes(), target, &mut handles, &mut created);
        Ok(created)
    }

    fn materialize_nodes(
        &mut self,
        nodes: &[PatternNode],
        parent: Container,
        handles: &mut impl Iterator<Item = BoundaryHandle>,
        created: &mut Vec<ObjectId>,
    ) {
        for node in nodes {
            let Some(handle) = handles.next() else {
                return;
            };
            match node {
                PatternNode::Symbol(label) => {
                    created.push(self.store.insert_symbol(label.clone(), handle, parent));
                }
                PatternNode::Cut(children) => {
                    let id = self.store.insert_cut(handle, parent);
                    created.push(id);
                    self.materialize_nodes(children, Container::Cut(id), &mut *handles, created);
                }
            }
        }
    }

    fn finish(&mut self) {
        self.store.relink();
        self.store.assign_levels();
        self.store.clear_proof_selection();
        self.store.invalidate();
    }
}

fn require_resolved(store: &GraphStore) -> RuleResult<()> {
    if store.is_resolved() {
        Ok(())
    } else {
        Err(RuleRejection::StaleContainment)
    }
}

/// Common parent of every root, after checking the members still exist.
fn sibling_area(store: &GraphStore, subgraph: &Subgraph) -> RuleResult<Container> {
    require_resolved(store)?;
    subgraph.validate(store)?;
    if subgraph.is_empty() {
        return Err(RuleRejection::InvalidSelection(SelectionIssue::Empty.into()));
    }
    subgraph
        .common_parent(store)
        .ok_or(RuleRejection::NotSiblings)
}

fn level_of(store: &GraphStore, container: Container) -> RuleResult<u32> {
    store
        .container_level(container)
        .map_err(|err| RuleRejection::InvalidSelection(err.into()))
}

fn validate_double_cut_insertion(store: &GraphStore, subgraph: &Subgraph) -> RuleResult<Container> {
    sibling_area(store, subgraph)
}

/// Returns `(outer, inner, outer's parent)`.
fn validate_double_cut_removal(
    store: &GraphStore,
    subgraph: &Subgraph,
) -> RuleResult<(ObjectId, ObjectId, Container)> {
    require_resolved(store)?;
    subgraph.validate(store)?;
    let Some((outer, inner)) = subgraph.pair() else {
        return Err(RuleRejection::InvalidPair {
            members: subgraph.members().to_vec(),
        });
    };
    let invalid = RuleRejection::InvalidPair {
        members: vec![outer, inner],
    };

    let outer_cut = store.cut(outer).ok_or_else(|| invalid.clone())?;
    let inner_cut = store.cut(inner).ok_or_else(|| invalid.clone())?;
    if inner_cut.parent() != Container::Cut(outer) {
        return Err(invalid);
    }
    if outer_cut.child_cuts() != [inner] || !outer_cut.child_symbols().is_empty() {
        return Err(invalid);
    }
    Ok((outer, inner, outer_cut.parent()))
}

fn validate_insertion(store: &GraphStore, pattern: &Pattern, target: Container) -> RuleResult<()> {
    require_resolved(store)?;
    if pattern.is_empty() {
        return Err(RuleRejection::InvalidSelection(SelectionIssue::Empty.into()));
    }
    let level = level_of(store, target)?;
    if level % 2 == 1 {
        Ok(())
    } else {
        Err(RuleRejection::IllegalInsertion { target, level })
    }
}

fn validate_erasure(store: &GraphStore, subgraph: &Subgraph) -> RuleResult<Container> {
    let area = sibling_area(store, subgraph)?;
    let level = level_of(store, area)?;
    if level % 2 == 0 {
        Ok(area)
    } else {
        Err(RuleRejection::IllegalErasure { area, level })
    }
}

/// Returns the pattern to copy.
fn validate_iteration(store: &GraphStore, source: &Subgraph, target: Container) -> RuleResult<Pattern> {
    let area = sibling_area(store, source)?;
    level_of(store, target)?;
    if !store.is_within(target, area) {
        return Err(RuleRejection::NotContained { target });
    }
    let inside_source = source
        .roots()
        .iter()
        .any(|root| store.is_within(target, Container::Cut(*root)));
    if inside_source {
        return Err(RuleRejection::NotContained { target });
    }
    Ok(source.pattern(store)?)
}

/// Returns the enclosing container that holds the justifying copy.
fn validate_deiteration(store: &GraphStore, subgraph: &Subgraph) -> RuleResult<Container> {
    let area = sibling_area(store, subgraph)?;
    if subgraph.shape() != SubgraphShape::Disjoint {
        return Err(RuleRejection::NoMatchingCopy);
    }
    let wanted: Vec<PatternNode> = subgraph
        .pattern(store)?
        .nodes()
        .iter()
        .map(PatternNode::canonical)
        .collect();

    for ancestor in store.ancestors(area) {
        let children = store
            .children(ancestor)
            .map_err(|err| RuleRejection::InvalidSelection(err.into()))?;
        let mut available: BTreeMap<PatternNode, usize> = BTreeMap::new();
        for child in children {
            let node = pattern_of(store, child)?.canonical();
            *available.entry(node).or_default() += 1;
        }
        if covers(&mut available, &wanted) {
            return Ok(ancestor);
        }
    }
    Err(RuleRejection::NoMatchingCopy)
}

/// Whether each wanted tree can take a distinct equal tree from `available`.
fn covers(available: &mut BTreeMap<PatternNode, usize>, wanted: &[PatternNode]) -> bool {
    wanted.iter().all(|node| match available.get_mut(node) {
        Some(count) if *count > 0 => {
            *count -= 1;
            true
        }
        _ => false,
    })
}
