//! Graph object domain model.
//!
//! # Responsibility
//! - Define cuts, symbols and the container relation that places them.
//! - Validate identifiers and symbol labels at construction time.
//!
//! # Invariants
//! - `ObjectId` is stable, never nil, and never reused for another object.
//! - `parent` is a lookup relation only; ownership flows sheet -> cut -> child.
//! - `level` is derived state owned by containment recalculation.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every cut and symbol.
pub type ObjectId = Uuid;

/// Opaque reference to a boundary owned by the geometry collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundaryHandle(u64);

impl BoundaryHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl Display for BoundaryHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Discriminant for the two object variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Negation boundary.
    Cut,
    /// Atomic predicate occurrence.
    Symbol,
}

impl ObjectKind {
    /// Stable string id used in persistence and log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cut => "cut",
            Self::Symbol => "symbol",
        }
    }

    /// Parses the persisted string id.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cut" => Some(Self::Cut),
            "symbol" => Some(Self::Symbol),
            _ => None,
        }
    }
}

/// Area an object sits in: the sheet of assertion or the inside of a cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    /// Implicit root cut at level 0. Has no border and no parent.
    Sheet,
    /// Inside of the cut with the given id.
    Cut(ObjectId),
}

impl Container {
    pub fn cut_id(self) -> Option<ObjectId> {
        match self {
            Self::Sheet => None,
            Self::Cut(id) => Some(id),
        }
    }

    pub fn is_sheet(self) -> bool {
        matches!(self, Self::Sheet)
    }

    /// Builds a container from a persisted nullable parent id.
    pub fn from_parent_id(parent: Option<ObjectId>) -> Self {
        match parent {
            Some(id) => Self::Cut(id),
            None => Self::Sheet,
        }
    }
}

impl Display for Container {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sheet => write!(f, "sheet"),
            Self::Cut(id) => write!(f, "cut {id}"),
        }
    }
}

/// Validation failures for object construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectValidationError {
    /// Nil UUIDs are reserved and never identify an object.
    NilId,
    /// Symbol label is blank after trim.
    EmptyLabel,
    /// Symbol label must be one token.
    LabelContainsWhitespace(String),
}

impl Display for ObjectValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "object id must not be nil"),
            Self::EmptyLabel => write!(f, "symbol label must not be blank"),
            Self::LabelContainsWhitespace(label) => {
                write!(f, "symbol label must be a single token, got `{label}`")
            }
        }
    }
}

impl Error for ObjectValidationError {}

/// Validated symbol label: one non-blank token, stored trimmed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SymbolLabel(String);

impl SymbolLabel {
    pub fn new(value: &str) -> Result<Self, ObjectValidationError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ObjectValidationError::EmptyLabel);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(ObjectValidationError::LabelContainsWhitespace(
                trimmed.to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SymbolLabel {
    type Error = ObjectValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<SymbolLabel> for String {
    fn from(value: SymbolLabel) -> Self {
        value.0
    }
}

impl Display for SymbolLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Negation boundary enclosing child cuts and symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cut {
    id: ObjectId,
    boundary: BoundaryHandle,
    level: u32,
    child_cuts: Vec<ObjectId>,
    child_symbols: Vec<ObjectId>,
    parent: Container,
    sequence: u64,
    is_proof_selected: bool,
}

impl Cut {
    pub(crate) fn new(id: ObjectId, boundary: BoundaryHandle, sequence: u64) -> Self {
        Self {
            id,
            boundary,
            level: 1,
            child_cuts: Vec::new(),
            child_symbols: Vec::new(),
            parent: Container::Sheet,
            sequence,
            is_proof_selected: false,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn boundary(&self) -> BoundaryHandle {
        self.boundary
    }

    /// Nesting depth from the sheet; a cut on the sheet has level 1.
    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn child_cuts(&self) -> &[ObjectId] {
        &self.child_cuts
    }

    pub fn child_symbols(&self) -> &[ObjectId] {
        &self.child_symbols
    }

    pub fn is_empty(&self) -> bool {
        self.child_cuts.is_empty() && self.child_symbols.is_empty()
    }

    pub fn parent(&self) -> Container {
        self.parent
    }

    pub fn is_proof_selected(&self) -> bool {
        self.is_proof_selected
    }

    pub(crate) fn clear_children(&mut self) {
        self.child_cuts.clear();
        self.child_symbols.clear();
    }

    pub(crate) fn push_child(&mut self, kind: ObjectKind, id: ObjectId) {
        match kind {
            ObjectKind::Cut => self.child_cuts.push(id),
            ObjectKind::Symbol => self.child_symbols.push(id),
        }
    }
}

/// Atomic predicate occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    id: ObjectId,
    label: SymbolLabel,
    boundary: BoundaryHandle,
    level: u32,
    parent: Container,
    sequence: u64,
    is_proof_selected: bool,
}

impl Symbol {
    pub(crate) fn new(
        id: ObjectId,
        label: SymbolLabel,
        boundary: BoundaryHandle,
        sequence: u64,
    ) -> Self {
        Self {
            id,
            label,
            boundary,
            level: 1,
            parent: Container::Sheet,
            sequence,
            is_proof_selected: false,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn label(&self) -> &SymbolLabel {
        &self.label
    }

    /// Position handle; the geometry collaborator owns the coordinates.
    pub fn boundary(&self) -> BoundaryHandle {
        self.boundary
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn parent(&self) -> Container {
        self.parent
    }

    pub fn is_proof_selected(&self) -> bool {
        self.is_proof_selected
    }
}

/// Tagged union of everything the graph store owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphObject {
    Cut(Cut),
    Symbol(Symbol),
}

impl GraphObject {
    pub fn id(&self) -> ObjectId {
        match self {
            Self::Cut(cut) => cut.id,
            Self::Symbol(symbol) => symbol.id,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Cut(_) => ObjectKind::Cut,
            Self::Symbol(_) => ObjectKind::Symbol,
        }
    }

    pub fn boundary(&self) -> BoundaryHandle {
        match self {
            Self::Cut(cut) => cut.boundary,
            Self::Symbol(symbol) => symbol.boundary,
        }
    }

    pub fn level(&self) -> u32 {
        match self {
            Self::Cut(cut) => cut.level,
            Self::Symbol(symbol) => symbol.level,
        }
    }

    pub fn parent(&self) -> Container {
        match self {
            Self::Cut(cut) => cut.parent,
            Self::Symbol(symbol) => symbol.parent,
        }
    }

    pub fn is_proof_selected(&self) -> bool {
        match self {
            Self::Cut(cut) => cut.is_proof_selected,
            Self::Symbol(symbol) => symbol.is_proof_selected,
        }
    }

    pub fn as_cut(&self) -> Option<&Cut> {
        match self {
            Self::Cut(cut) => Some(cut),
            Self::Symbol(_) => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Self::Cut(_) => None,
            Self::Symbol(symbol) => Some(symbol),
        }
    }

    pub(crate) fn sequence(&self) -> u64 {
        match self {
            Self::Cut(cut) => cut.sequence,
            Self::Symbol(symbol) => symbol.sequence,
        }
    }

    pub(crate) fn set_parent(&mut self, parent: Container) {
        match self {
            Self::Cut(cut) => cut.parent = parent,
            Self::Symbol(symbol) => symbol.parent = parent,
        }
    }

    pub(crate) fn set_level(&mut self, level: u32) {
        match self {
            Self::Cut(cut) => cut.level = level,
            Self::Symbol(symbol) => symbol.level = level,
        }
    }

    pub(crate) fn set_proof_selected(&mut self, selected: bool) {
        match self {
            Self::Cut(cut) => cut.is_proof_selected = selected,
            Self::Symbol(symbol) => symbol.is_proof_selected = selected,
        }
    }
}

/// Generates a fresh object id.
pub(crate) fn new_object_id() -> ObjectId {
    Uuid::new_v4()
}
