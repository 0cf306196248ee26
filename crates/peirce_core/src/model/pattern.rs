//! Identifier-free graph structure.
//!
//! # Responsibility
//! - Describe content to insert and copies to compare, without ids or geometry.
//! - Define the structural identity used by iteration and deiteration.
//!
//! # Invariants
//! - Equivalence ignores identifiers, positions and sibling order.
//! - Equivalence respects multiplicity: `[A, A]` is not equivalent to `[A]`.

use crate::model::object::{ObjectValidationError, SymbolLabel};
use serde::{Deserialize, Serialize};

/// One node of a pattern tree.
///
/// Variant order matters: the derived `Ord` places symbols before cuts, which
/// the canonical form relies on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternNode {
    Symbol(SymbolLabel),
    Cut(Vec<PatternNode>),
}

impl PatternNode {
    pub fn symbol(label: &str) -> Result<Self, ObjectValidationError> {
        Ok(Self::Symbol(SymbolLabel::new(label)?))
    }

    pub fn cut(children: Vec<PatternNode>) -> Self {
        Self::Cut(children)
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        match self {
            Self::Symbol(_) => 1,
            Self::Cut(children) => 1 + children.iter().map(Self::node_count).sum::<usize>(),
        }
    }

    /// Returns the canonical form: every cut's children sorted recursively.
    pub fn canonical(&self) -> PatternNode {
        match self {
            Self::Symbol(label) => Self::Symbol(label.clone()),
            Self::Cut(children) => Self::Cut(canonical_forest(children)),
        }
    }

    pub fn is_equivalent(&self, other: &PatternNode) -> bool {
        self.canonical() == other.canonical()
    }
}

/// Ordered forest of pattern nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pattern {
    nodes: Vec<PatternNode>,
}

impl Pattern {
    pub fn new(nodes: Vec<PatternNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[PatternNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of top-level nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes across the whole forest.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().map(PatternNode::node_count).sum()
    }

    pub fn canonical(&self) -> Pattern {
        Pattern::new(canonical_forest(&self.nodes))
    }

    /// Structural identity of two forests.
    pub fn is_equivalent(&self, other: &Pattern) -> bool {
        self.nodes.len() == other.nodes.len() && self.canonical() == other.canonical()
    }

    /// Nodes in pre-order: a node, then its children in order.
    ///
    /// Geometry layout returns boundary handles in this order.
    pub fn preorder(&self) -> Vec<&PatternNode> {
        let mut out = Vec::with_capacity(self.node_count());
        let mut stack: Vec<&PatternNode> = self.nodes.iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            if let PatternNode::Cut(children) = node {
                stack.extend(children.iter().rev());
            }
        }
        out
    }
}

fn canonical_forest(nodes: &[PatternNode]) -> Vec<PatternNode> {
    let mut canonical: Vec<PatternNode> = nodes.iter().map(PatternNode::canonical).collect();
    canonical.sort();
    canonical
}

#[cfg(test)]
mod tests {
    use super::{Pattern, PatternNode};

    fn sym(label: &str) -> PatternNode {
        PatternNode::symbol(label).expect("valid label")
    }

    #[test]
    fn equivalence_ignores_sibling_order_at_every_depth() {
        let left = Pattern::new(vec![
            PatternNode::cut(vec![sym("B"), PatternNode::cut(vec![sym("A"), sym("C")])]),
            sym("D"),
        ]);
        let right = Pattern::new(vec![
            sym("D"),
            PatternNode::cut(vec![PatternNode::cut(vec![sym("C"), sym("A")]), sym("B")]),
        ]);
        assert!(left.is_equivalent(&right));
    }

    #[test]
    fn equivalence_respects_multiplicity_and_nesting() {
        let single = Pattern::new(vec![sym("A")]);
        let double = Pattern::new(vec![sym("A"), sym("A")]);
        let wrapped = Pattern::new(vec![PatternNode::cut(vec![sym("A")])]);
        assert!(!single.is_equivalent(&double));
        assert!(!single.is_equivalent(&wrapped));
    }

    #[test]
    fn canonical_orders_symbols_before_cuts() {
        let pattern = Pattern::new(vec![PatternNode::cut(vec![]), sym("Z"), sym("A")]);
        let canonical = pattern.canonical();
        assert_eq!(
            canonical.nodes(),
            &[sym("A"), sym("Z"), PatternNode::cut(vec![])]
        );
    }

    #[test]
    fn preorder_visits_parent_before_children() {
        let pattern = Pattern::new(vec![
            PatternNode::cut(vec![sym("A"), PatternNode::cut(vec![sym("B")])]),
            sym("C"),
        ]);
        let order: Vec<String> = pattern
            .preorder()
            .into_iter()
            .map(|node| match node {
                PatternNode::Symbol(label) => label.to_string(),
                PatternNode::Cut(_) => "()".to_string(),
            })
            .collect();
        assert_eq!(order, vec!["()", "A", "()", "B", "C"]);
        assert_eq!(pattern.node_count(), 5);
    }
}
