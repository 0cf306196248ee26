//! Editor interaction modes.
//!
//! # Invariants
//! - `Transform` is the default mode.
//! - Every gated operation belongs to exactly one mode.

use serde::{Deserialize, Serialize};

/// Process-wide editing mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Geometric editing; rules disabled.
    #[default]
    Transform,
    /// Multi-select and rule application; geometry frozen.
    Proof,
}

/// Persisted preference value for proof mode on.
pub const PROOF_MODE_ACTIVE: &str = "active";
/// Persisted preference value for proof mode off.
pub const PROOF_MODE_INACTIVE: &str = "inactive";

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transform => "transform",
            Self::Proof => "proof",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Transform => Self::Proof,
            Self::Proof => Self::Transform,
        }
    }

    /// Value stored under the `proof_mode` preference key.
    pub fn preference_value(self) -> &'static str {
        match self {
            Self::Transform => PROOF_MODE_INACTIVE,
            Self::Proof => PROOF_MODE_ACTIVE,
        }
    }

    pub fn from_preference_value(value: &str) -> Option<Self> {
        match value.trim() {
            PROOF_MODE_ACTIVE => Some(Self::Proof),
            PROOF_MODE_INACTIVE => Some(Self::Transform),
            _ => None,
        }
    }
}

/// Operations gated by the current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Drawing a cut or typing a symbol.
    CreateObject,
    /// Dragging or reshaping existing boundaries.
    EditGeometry,
    /// Deleting the object under the pointer.
    DeleteObject,
    /// Toggling proof selection to build a subgraph.
    SelectForProof,
    /// Invoking a transformation rule.
    ApplyRule,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateObject => "create_object",
            Self::EditGeometry => "edit_geometry",
            Self::DeleteObject => "delete_object",
            Self::SelectForProof => "select_for_proof",
            Self::ApplyRule => "apply_rule",
        }
    }

    pub fn required_mode(self) -> Mode {
        match self {
            Self::CreateObject | Self::EditGeometry | Self::DeleteObject => Mode::Transform,
            Self::SelectForProof | Self::ApplyRule => Mode::Proof,
        }
    }
}
