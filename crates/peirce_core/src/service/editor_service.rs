//! Editor use-case service.
//!
//! # Responsibility
//! - Own one graph, its geometry and the mode controller.
//! - Gate every user operation on the current mode.
//! - Keep containment resolved before any rule or selection check.
//!
//! # Invariants
//! - Rules and captures always see freshly resolved containment.
//! - Deleting objects releases their boundaries from the geometry.
//! - A failed `restore` leaves the current graph in place.

use crate::geometry::Geometry;
use crate::graph::resolver::{recalculate, ResolveError, ResolveReport};
use crate::graph::store::{GraphError, GraphSnapshot, GraphStore, RemovedObject};
use crate::graph::subgraph::{self, SelectionError, Subgraph};
use crate::model::mode::{Mode, Operation};
use crate::model::object::{BoundaryHandle, ObjectId};
use crate::repo::graph_repo::GraphRepository;
use crate::repo::settings_repo::SettingsRepository;
use crate::repo::RepoError;
use crate::rules::engine::{RuleEffect, RuleEngine, RuleRequest};
use crate::rules::error::RuleRejection;
use crate::service::mode_controller::{ModeController, ModeError};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type EditorResult<T> = Result<T, EditorError>;

/// Errors surfaced to the editor host.
#[derive(Debug)]
pub enum EditorError {
    Mode(ModeError),
    Graph(GraphError),
    Resolve(ResolveError),
    Selection(SelectionError),
    Rule(RuleRejection),
    Repo(RepoError),
}

impl Display for EditorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mode(err) => write!(f, "{err}"),
            Self::Graph(err) => write!(f, "{err}"),
            Self::Resolve(err) => write!(f, "{err}"),
            Self::Selection(err) => write!(f, "{err}"),
            Self::Rule(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EditorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Mode(err) => Some(err),
            Self::Graph(err) => Some(err),
            Self::Resolve(err) => Some(err),
            Self::Selection(err) => Some(err),
            Self::Rule(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<ModeError> for EditorError {
    fn from(value: ModeError) -> Self {
        Self::Mode(value)
    }
}

impl From<GraphError> for EditorError {
    fn from(value: GraphError) -> Self {
        Self::Graph(value)
    }
}

impl From<ResolveError> for EditorError {
    fn from(value: ResolveError) -> Self {
        Self::Resolve(value)
    }
}

impl From<SelectionError> for EditorError {
    fn from(value: SelectionError) -> Self {
        Self::Selection(value)
    }
}

impl From<RuleRejection> for EditorError {
    fn from(value: RuleRejection) -> Self {
        Self::Rule(value)
    }
}

impl From<RepoError> for EditorError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Single entry point for the editor host.
pub struct EditorService<G: Geometry, S: SettingsRepository> {
    store: GraphStore,
    geometry: G,
    modes: ModeController<S>,
}

impl<G: Geometry, S: SettingsRepository> EditorService<G, S> {
    /// Creates an editor over an empty sheet.
    pub fn new(geometry: G, modes: ModeController<S>) -> Self {
        Self {
            store: GraphStore::new(),
            geometry,
            modes,
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    pub fn mode(&self) -> Mode {
        self.modes.mode()
    }

    pub fn modes(&self) -> &ModeController<S> {
        &self.modes
    }

    /// Registers a drawn cut. The boundary must already exist in the geometry.
    pub fn add_cut(&mut self, boundary: BoundaryHandle) -> EditorResult<ObjectId> {
        self.modes.ensure(Operation::CreateObject)?;
        let id = self.store.add_cut(boundary);
        self.ensure_resolved()?;
        Ok(id)
    }

    /// Registers a typed symbol at an existing geometry position.
    pub fn add_symbol(&mut self, label: &str, boundary: BoundaryHandle) -> EditorResult<ObjectId> {
        self.modes.ensure(Operation::CreateObject)?;
        let id = self.store.add_symbol(label, boundary)?;
        self.ensure_resolved()?;
        Ok(id)
    }

    /// Deletes an object with everything inside it.
    pub fn delete(&mut self, id: ObjectId) -> EditorResult<Vec<RemovedObject>> {
        self.modes.ensure(Operation::DeleteObject)?;
        let removed = self.store.remove(id)?;
        for item in &removed {
            self.geometry.release(item.boundary);
        }
        self.ensure_resolved()?;
        info!(
            "event=object_delete module=editor status=ok removed={}",
            removed.len()
        );
        Ok(removed)
    }

    /// Runs a geometry edit (drag, resize) and re-derives containment.
    pub fn edit_geometry<R>(&mut self, edit: impl FnOnce(&mut G) -> R) -> EditorResult<R> {
        self.modes.ensure(Operation::EditGeometry)?;
        let output = edit(&mut self.geometry);
        self.store.invalidate();
        self.ensure_resolved()?;
        Ok(output)
    }

    /// Recalculates containment when it is stale.
    pub fn ensure_resolved(&mut self) -> EditorResult<Option<ResolveReport>> {
        if self.store.is_resolved() {
            return Ok(None);
        }
        Ok(Some(recalculate(&mut self.store, &self.geometry)?))
    }

    /// Flips proof selection of one object, optionally with its contents.
    pub fn toggle_selection(&mut self, id: ObjectId, include_descendants: bool) -> EditorResult<bool> {
        self.modes.ensure(Operation::SelectForProof)?;
        Ok(self.store.toggle_proof_selected(id, include_descendants)?)
    }

    /// Captures the current proof selection, keeping only its outermost objects.
    pub fn capture_selection(&mut self) -> EditorResult<Subgraph> {
        self.modes.ensure(Operation::SelectForProof)?;
        self.ensure_resolved()?;
        Ok(subgraph::capture_roots(&self.store, self.store.proof_selected())?)
    }

    pub fn capture(&mut self, ids: &[ObjectId]) -> EditorResult<Subgraph> {
        self.modes.ensure(Operation::SelectForProof)?;
        self.ensure_resolved()?;
        Ok(subgraph::capture(&self.store, ids)?)
    }

    pub fn capture_pair(&mut self, first: ObjectId, second: ObjectId) -> EditorResult<Subgraph> {
        self.modes.ensure(Operation::SelectForProof)?;
        self.ensure_resolved()?;
        Ok(subgraph::capture_pair(&self.store, first, second)?)
    }

    /// Reports whether `request` would be accepted, without applying it.
    pub fn check(&mut self, request: &RuleRequest) -> EditorResult<()> {
        self.modes.ensure(Operation::ApplyRule)?;
        self.ensure_resolved()?;
        RuleEngine::new(&mut self.store, &mut self.geometry).check(request)?;
        Ok(())
    }

    /// Applies a rule and resolves the resulting containment.
    pub fn apply(&mut self, request: &RuleRequest) -> EditorResult<RuleEffect> {
        self.modes.ensure(Operation::ApplyRule)?;
        self.ensure_resolved()?;
        let effect = RuleEngine::new(&mut self.store, &mut self.geometry).apply(request)?;
        self.ensure_resolved()?;
        Ok(effect)
    }

    /// Switches modes; leaving proof mode drops the proof selection.
    pub fn toggle_mode(&mut self) -> EditorResult<Mode> {
        let mode = self.modes.toggle()?;
        if mode == Mode::Transform {
            self.store.clear_proof_selection();
        }
        Ok(mode)
    }

    pub fn set_overview_open(&mut self, open: bool) {
        self.modes.set_overview_open(open);
    }

    /// Drops every object, releases their boundaries and resets the mode.
    pub fn clear(&mut self) -> EditorResult<()> {
        for object in self.store.objects() {
            self.geometry.release(object.boundary());
        }
        self.store = GraphStore::new();
        self.modes.reset()?;
        info!("event=editor_clear module=editor status=ok");
        Ok(())
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        self.store.snapshot()
    }

    /// Replaces the graph with a snapshot whose boundaries already live in the
    /// geometry. Containment is recomputed before the snapshot is accepted.
    pub fn restore(&mut self, snapshot: &GraphSnapshot) -> EditorResult<ResolveReport> {
        let mut restored = GraphStore::from_snapshot(snapshot)?;
        let report = recalculate(&mut restored, &self.geometry)?;
        self.store = restored;
        info!(
            "event=editor_restore module=editor status=ok objects={}",
            report.objects
        );
        Ok(report)
    }

    pub fn save_to(&self, repo: &impl GraphRepository) -> EditorResult<()> {
        repo.save(&self.store.snapshot())?;
        Ok(())
    }

    pub fn load_from(&mut self, repo: &impl GraphRepository) -> EditorResult<ResolveReport> {
        let snapshot = repo.load()?;
        self.restore(&snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::{EditorError, EditorService};
    use crate::geometry::{Point, ShapeTable};
    use crate::model::mode::Mode;
    use crate::repo::settings_repo::MemorySettingsRepository;
    use crate::service::mode_controller::{ModeController, ModeError};

    fn editor() -> EditorService<ShapeTable, MemorySettingsRepository> {
        let modes = ModeController::initialize(MemorySettingsRepository::new()).unwrap();
        EditorService::new(ShapeTable::new(), modes)
    }

    #[test]
    fn creation_is_refused_in_proof_mode() {
        let mut editor = editor();
        let at = editor
            .edit_geometry(|table| table.insert_point(Point::new(0.0, 0.0)))
            .unwrap();
        editor.toggle_mode().unwrap();

        let err = editor.add_symbol("A", at).unwrap_err();
        assert!(matches!(
            err,
            EditorError::Mode(ModeError::Disallowed {
                current: Mode::Proof,
                ..
            })
        ));
        assert!(editor.store().is_empty());
    }

    #[test]
    fn delete_releases_geometry() {
        let mut editor = editor();
        let circle = editor
            .edit_geometry(|table| table.insert_circle(Point::new(0.0, 0.0), 5.0))
            .unwrap();
        let at = editor
            .edit_geometry(|table| table.insert_point(Point::new(1.0, 0.0)))
            .unwrap();
        let cut = editor.add_cut(circle).unwrap();
        editor.add_symbol("A", at).unwrap();

        let removed = editor.delete(cut).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(editor.store().is_empty());
        assert!(editor.geometry().is_empty());
    }

    #[test]
    fn leaving_proof_mode_clears_selection() {
        let mut editor = editor();
        let at = editor
            .edit_geometry(|table| table.insert_point(Point::new(0.0, 0.0)))
            .unwrap();
        let a = editor.add_symbol("A", at).unwrap();
        editor.toggle_mode().unwrap();
        editor.toggle_selection(a, false).unwrap();
        assert_eq!(editor.store().proof_selected(), &[a]);

        editor.toggle_mode().unwrap();
        assert!(editor.store().proof_selected().is_empty());
    }
}
