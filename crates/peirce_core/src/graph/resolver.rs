//! Containment resolver.
//!
//! # Responsibility
//! - Derive every object's innermost enclosing cut from fresh geometry.
//! - Rebuild child lists and assign levels breadth-first from the sheet.
//!
//! # Invariants
//! - Pure function of geometry and store contents: running it twice without a
//!   geometry change yields the same tree.
//! - Pairwise containment tests are O(n^2); fine for editor-sized graphs.
//! - A containment cycle aborts the pass before the store is touched.

use crate::geometry::Geometry;
use crate::graph::store::GraphStore;
use crate::model::object::{BoundaryHandle, Container, ObjectId, ObjectKind};
use log::{debug, error};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Fatal recalculation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Geometry placed objects inside each other in a loop.
    MalformedGeometry { cycle: Vec<ObjectId> },
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedGeometry { cycle } => {
                let ids: Vec<String> = cycle.iter().map(ToString::to_string).collect();
                write!(f, "malformed geometry: containment cycle through {}", ids.join(" -> "))
            }
        }
    }
}

impl Error for ResolveError {}

/// Summary of one successful recalculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveReport {
    pub objects: usize,
    pub max_level: u32,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Fresh,
    OnPath,
    Done,
}

/// Recomputes parents, child lists and levels from the current geometry.
///
/// # Errors
/// - `MalformedGeometry` when the containment relation is cyclic; the store is
///   left exactly as it was.
pub fn recalculate<G: Geometry + ?Sized>(
    store: &mut GraphStore,
    geometry: &G,
) -> Result<ResolveReport, ResolveError> {
    let started_at = Instant::now();
    let entries: Vec<(ObjectId, ObjectKind, BoundaryHandle)> = store
        .objects()
        .map(|object| (object.id(), object.kind(), object.boundary()))
        .collect();

    let mut enclosing: Vec<Vec<usize>> = vec![Vec::new(); entries.len()];
    for (inner_index, (inner_id, _, inner_boundary)) in entries.iter().enumerate() {
        for (outer_index, (outer_id, outer_kind, outer_boundary)) in entries.iter().enumerate() {
            if outer_id == inner_id || *outer_kind != ObjectKind::Cut {
                continue;
            }
            if geometry.contains(*outer_boundary, *inner_boundary) {
                enclosing[inner_index].push(outer_index);
            }
        }
    }

    if let Some(cycle) = find_cycle(&entries, &enclosing) {
        error!(
            "event=containment_resolve module=resolver status=error error_code=malformed_geometry cycle_len={}",
            cycle.len()
        );
        return Err(ResolveError::MalformedGeometry { cycle });
    }

    // The innermost enclosing cut is the one enclosed by the most cuts itself.
    let parents: HashMap<ObjectId, Container> = entries
        .iter()
        .enumerate()
        .map(|(index, (id, _, _))| {
            let parent = enclosing[index]
                .iter()
                .copied()
                .fold(None::<usize>, |best, candidate| match best {
                    Some(current) if enclosing[current].len() >= enclosing[candidate].len() => {
                        Some(current)
                    }
                    _ => Some(candidate),
                })
                .map_or(Container::Sheet, |winner| Container::Cut(entries[winner].0));
            (*id, parent)
        })
        .collect();

    for (id, _, _) in &entries {
        if let Some(parent) = parents.get(id) {
            store.set_parent(*id, *parent);
        }
    }
    store.relink();
    let reached = store.assign_levels();
    store.mark_resolved();

    let max_level = store.objects().map(|object| object.level()).max().unwrap_or(0);
    debug!(
        "event=containment_resolve module=resolver status=ok objects={} reached={} max_level={} duration_us={}",
        entries.len(),
        reached,
        max_level,
        started_at.elapsed().as_micros()
    );
    Ok(ResolveReport {
        objects: entries.len(),
        max_level,
    })
}

/// Depth-first search over every containment edge, inner to outer.
fn find_cycle(
    entries: &[(ObjectId, ObjectKind, BoundaryHandle)],
    enclosing: &[Vec<usize>],
) -> Option<Vec<ObjectId>> {
    let mut state = vec![Visit::Fresh; entries.len()];

    for start in 0..entries.len() {
        if state[start] != Visit::Fresh {
            continue;
        }
        state[start] = Visit::OnPath;
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        while let Some(frame) = stack.last_mut() {
            let (node, next_edge) = *frame;
            let Some(&outer) = enclosing[node].get(next_edge) else {
                state[node] = Visit::Done;
                stack.pop();
                continue;
            };
            frame.1 += 1;
            match state[outer] {
                Visit::Fresh => {
                    state[outer] = Visit::OnPath;
                    stack.push((outer, 0));
                }
                Visit::OnPath => {
                    let from = stack
                        .iter()
                        .position(|(index, _)| *index == outer)
                        .unwrap_or(0);
                    return Some(stack[from..].iter().map(|(index, _)| entries[*index].0).collect());
                }
                Visit::Done => {}
            }
        }
    }
    None
}
