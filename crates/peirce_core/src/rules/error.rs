//! Rule rejection values.
//!
//! Every rejection leaves the graph exactly as it was before the attempt.

use crate::geometry::GeometryError;
use crate::graph::subgraph::SelectionError;
use crate::model::object::{Container, ObjectId};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RuleResult<T> = Result<T, RuleRejection>;

/// Named reason a transformation rule was refused.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleRejection {
    /// Insertion target is not on an odd level.
    IllegalInsertion { target: Container, level: u32 },
    /// Erased content does not sit on an even level.
    IllegalErasure { area: Container, level: u32 },
    /// Operand is not a double cut with nothing between the two cuts.
    InvalidPair { members: Vec<ObjectId> },
    /// No enclosing copy justifies removing the selection.
    NoMatchingCopy,
    /// Iteration target lies outside the source area or inside the copied content.
    NotContained { target: Container },
    /// Selected objects do not share one parent container.
    NotSiblings,
    InvalidSelection(SelectionError),
    /// Containment must be recalculated before rules can run.
    StaleContainment,
    /// Geometry could not make room for new boundaries.
    Layout(GeometryError),
}

impl RuleRejection {
    /// Stable code for logs and UI lookups.
    pub fn code(&self) -> &'static str {
        match self {
            Self::IllegalInsertion { .. } => "illegal_insertion",
            Self::IllegalErasure { .. } => "illegal_erasure",
            Self::InvalidPair { .. } => "invalid_pair",
            Self::NoMatchingCopy => "no_matching_copy",
            Self::NotContained { .. } => "not_contained",
            Self::NotSiblings => "not_siblings",
            Self::InvalidSelection(_) => "invalid_selection",
            Self::StaleContainment => "stale_containment",
            Self::Layout(_) => "layout",
        }
    }
}

impl Display for RuleRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IllegalInsertion { level, .. } => write!(
                f,
                "Insertion is only allowed on an odd level; the target is on level {level}."
            ),
            Self::IllegalErasure { level, .. } => write!(
                f,
                "Erasure is only allowed on an even level; the selection is on level {level}."
            ),
            Self::InvalidPair { .. } => write!(
                f,
                "Select two cuts where the outer cut holds nothing but the inner cut."
            ),
            Self::NoMatchingCopy => write!(
                f,
                "Deiteration needs an identical copy in an enclosing area."
            ),
            Self::NotContained { .. } => write!(
                f,
                "Iteration target must lie in the selection's area and outside the selection."
            ),
            Self::NotSiblings => write!(f, "Selected objects must share the same area."),
            Self::InvalidSelection(err) => write!(f, "{err}"),
            Self::StaleContainment => write!(
                f,
                "Containment is out of date; recalculate before applying rules."
            ),
            Self::Layout(err) => write!(f, "Cannot lay out the result: {err}"),
        }
    }
}

impl Error for RuleRejection {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSelection(err) => Some(err),
            Self::Layout(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SelectionError> for RuleRejection {
    fn from(value: SelectionError) -> Self {
        Self::InvalidSelection(value)
    }
}

impl From<GeometryError> for RuleRejection {
    fn from(value: GeometryError) -> Self {
        Self::Layout(value)
    }
}
