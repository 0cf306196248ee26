//! Core domain logic for the existential graph editor.
//! This crate owns the containment hierarchy and the proof rules.

pub mod db;
pub mod geometry;
pub mod graph;
pub mod logging;
pub mod model;
pub mod repo;
pub mod rules;
pub mod service;

pub use geometry::{Geometry, GeometryError, LayoutConfig, Point, Shape, ShapeTable};
pub use graph::resolver::{recalculate, ResolveError, ResolveReport};
pub use graph::store::{GraphError, GraphSnapshot, GraphStore, ObjectRecord, RemovedObject};
pub use graph::subgraph::{
    capture, capture_pair, capture_roots, SelectionError, SelectionIssue, Subgraph, SubgraphShape,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::mode::{Mode, Operation};
pub use model::object::{
    BoundaryHandle, Container, GraphObject, ObjectId, ObjectKind, ObjectValidationError,
    SymbolLabel,
};
pub use model::pattern::{Pattern, PatternNode};
pub use repo::graph_repo::{GraphRepository, SqliteGraphRepository};
pub use repo::settings_repo::{
    MemorySettingsRepository, SettingsRepository, SqliteSettingsRepository,
};
pub use repo::{RepoError, RepoResult};
pub use rules::{Rule, RuleEffect, RuleEngine, RuleRejection, RuleRequest, RuleResult};
pub use service::editor_service::{EditorError, EditorResult, EditorService};
pub use service::mode_controller::{ModeController, ModeError, PROOF_MODE_KEY};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
