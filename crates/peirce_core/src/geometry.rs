//! Geometry collaborator contract and a reference shape table.
//!
//! # Responsibility
//! - Define the boundary test the containment resolver relies on.
//! - Define the layout hooks rules use to create, copy and drop boundaries.
//! - Provide `ShapeTable`, a circle/point implementation for hosts and tests.
//!
//! # Invariants
//! - `contains` is strict: a boundary never contains itself.
//! - Layout hooks either succeed completely or leave the table unchanged.
//! - `place` returns handles in `Pattern::preorder` order.

use crate::model::object::BoundaryHandle;
use crate::model::pattern::{Pattern, PatternNode};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Boundary storage and containment tests owned outside the core.
pub trait Geometry {
    /// Returns whether `inner` lies strictly within `outer`.
    fn contains(&self, outer: BoundaryHandle, inner: BoundaryHandle) -> bool;

    /// Allocates a new cut boundary enclosing every boundary in `region` and
    /// nothing else.
    fn enclose(&mut self, region: &[BoundaryHandle]) -> Result<BoundaryHandle, GeometryError>;

    /// Lays out fresh boundaries for `pattern` inside `target` (`None` means the
    /// sheet). Cut nodes get cut boundaries, symbol nodes get positions.
    fn place(
        &mut self,
        pattern: &Pattern,
        target: Option<BoundaryHandle>,
    ) -> Result<Vec<BoundaryHandle>, GeometryError>;

    /// Drops a boundary that no longer backs any object.
    fn release(&mut self, handle: BoundaryHandle);
}

/// Layout failures reported by geometry hooks.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// Handle is not known to this geometry.
    UnknownHandle(BoundaryHandle),
    /// Handle exists but cannot enclose anything.
    NotACut(BoundaryHandle),
    /// `enclose` was called without boundaries.
    EmptyRegion,
    /// No free space for the requested layout.
    NoRoom { target: Option<BoundaryHandle> },
}

impl Display for GeometryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownHandle(handle) => write!(f, "unknown boundary {handle}"),
            Self::NotACut(handle) => write!(f, "boundary {handle} is not a cut outline"),
            Self::EmptyRegion => write!(f, "cannot enclose an empty region"),
            Self::NoRoom { target: Some(handle) } => {
                write!(f, "not enough free space inside boundary {handle}")
            }
            Self::NoRoom { target: None } => write!(f, "not enough free space on the sheet"),
        }
    }
}

impl Error for GeometryError {}

/// Sheet coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Outline of a cut or position of a symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Circle { center: Point, radius: f64 },
    Point(Point),
}

impl Shape {
    pub fn center(&self) -> Point {
        match self {
            Self::Circle { center, .. } => *center,
            Self::Point(at) => *at,
        }
    }

    /// Extent around the center; zero for points.
    pub fn radius(&self) -> f64 {
        match self {
            Self::Circle { radius, .. } => *radius,
            Self::Point(_) => 0.0,
        }
    }

    pub fn strictly_contains(&self, other: &Shape) -> bool {
        match self {
            Self::Circle { center, radius } => {
                center.distance(other.center()) + other.radius() < *radius
            }
            Self::Point(_) => false,
        }
    }

    pub fn is_disjoint_from(&self, other: &Shape) -> bool {
        self.center().distance(other.center()) > self.radius() + other.radius()
    }
}

/// Spacing used when the table has to invent boundaries.
///
/// Distances are in sheet units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    /// Gap between an enclosed region and its new outline, and between siblings.
    pub margin: f64,
    /// Clearance reserved around a placed symbol.
    pub symbol_radius: f64,
    /// Radius of a placed cut with no contents.
    pub empty_cut_radius: f64,
    /// Grid resolution per axis half when searching for free space.
    pub search_steps: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            margin: 1.0,
            symbol_radius: 1.0,
            empty_cut_radius: 2.0,
            search_steps: 24,
        }
    }
}

/// In-memory geometry: circles for cuts, points for symbols.
#[derive(Debug, Clone, Default)]
pub struct ShapeTable {
    shapes: BTreeMap<BoundaryHandle, Shape>,
    next_handle: u64,
    config: LayoutConfig,
}

impl ShapeTable {
    pub fn new() -> Self {
        Self::with_config(LayoutConfig::default())
    }

    pub fn with_config(config: LayoutConfig) -> Self {
        Self {
            shapes: BTreeMap::new(),
            next_handle: 1,
            config,
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn insert_circle(&mut self, center: Point, radius: f64) -> BoundaryHandle {
        self.insert(Shape::Circle { center, radius })
    }

    pub fn insert_point(&mut self, at: Point) -> BoundaryHandle {
        self.insert(Shape::Point(at))
    }

    pub fn shape(&self, handle: BoundaryHandle) -> Option<&Shape> {
        self.shapes.get(&handle)
    }

    /// Replaces the outline behind `handle`.
    pub fn set_shape(&mut self, handle: BoundaryHandle, shape: Shape) -> Result<(), GeometryError> {
        let slot = self
            .shapes
            .get_mut(&handle)
            .ok_or(GeometryError::UnknownHandle(handle))?;
        *slot = shape;
        Ok(())
    }

    /// Translates one shape; nested shapes are not dragged along.
    pub fn move_by(&mut self, handle: BoundaryHandle, dx: f64, dy: f64) -> Result<(), GeometryError> {
        let slot = self
            .shapes
            .get_mut(&handle)
            .ok_or(GeometryError::UnknownHandle(handle))?;
        *slot = match *slot {
            Shape::Circle { center, radius } => Shape::Circle {
                center: Point::new(center.x + dx, center.y + dy),
                radius,
            },
            Shape::Point(at) => Shape::Point(Point::new(at.x + dx, at.y + dy)),
        };
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    fn insert(&mut self, shape: Shape) -> BoundaryHandle {
        let handle = BoundaryHandle::new(self.next_handle.max(1));
        self.next_handle = handle.value() + 1;
        self.shapes.insert(handle, shape);
        handle
    }

    fn lookup(&self, handle: BoundaryHandle) -> Result<Shape, GeometryError> {
        self.shapes
            .get(&handle)
            .copied()
            .ok_or(GeometryError::UnknownHandle(handle))
    }

    fn node_radius(&self, node: &PatternNode) -> f64 {
        match node {
            PatternNode::Symbol(_) => self.config.symbol_radius,
            PatternNode::Cut(children) if children.is_empty() => self.config.empty_cut_radius,
            PatternNode::Cut(children) => self.row_half_width(children) + self.config.margin,
        }
    }

    fn row_half_width(&self, nodes: &[PatternNode]) -> f64 {
        if nodes.is_empty() {
            return 0.0;
        }
        let diameters: f64 = nodes.iter().map(|node| 2.0 * self.node_radius(node)).sum();
        let gaps = self.config.margin * (nodes.len() - 1) as f64;
        (diameters + gaps) / 2.0
    }

    /// Lays `nodes` out left to right on a horizontal line through `center`.
    fn layout_row(&self, nodes: &[PatternNode], center: Point, out: &mut Vec<Shape>) {
        let mut cursor = center.x - self.row_half_width(nodes);
        for node in nodes {
            let radius = self.node_radius(node);
            let at = Point::new(cursor + radius, center.y);
            match node {
                PatternNode::Symbol(_) => out.push(Shape::Point(at)),
                PatternNode::Cut(children) => {
                    out.push(Shape::Circle { center: at, radius });
                    self.layout_row(children, at, out);
                }
            }
            cursor += 2.0 * radius + self.config.margin;
        }
    }

    /// A candidate is free when every other shape is disjoint from it or
    /// encloses both it and the target.
    fn is_free(&self, candidate: &Shape, target: Option<(BoundaryHandle, Shape)>) -> bool {
        self.shapes.iter().all(|(handle, shape)| {
            if let Some((target_handle, target_shape)) = target {
                if *handle == target_handle {
                    return target_shape.strictly_contains(candidate);
                }
                if shape.strictly_contains(candidate) && shape.strictly_contains(&target_shape) {
                    return true;
                }
            }
            shape.is_disjoint_from(candidate)
        })
    }

    fn find_slot(&self, footprint: f64, target: Option<BoundaryHandle>) -> Result<Point, GeometryError> {
        let Some(target_handle) = target else {
            let right_edge = self
                .shapes
                .values()
                .map(|shape| shape.center().x + shape.radius())
                .fold(0.0_f64, f64::max);
            return Ok(Point::new(
                right_edge + footprint + self.config.margin,
                0.0,
            ));
        };

        let target_shape = self.lookup(target_handle)?;
        let Shape::Circle { center, radius } = target_shape else {
            return Err(GeometryError::NotACut(target_handle));
        };
        let reach = radius - footprint;
        if reach <= 0.0 {
            return Err(GeometryError::NoRoom { target });
        }

        let steps = self.config.search_steps.max(1);
        let step = (reach / steps as f64).max(footprint / 4.0);
        let span = (reach / step).floor() as i64;
        let mut candidates = Vec::new();
        for j in -span..=span {
            for i in -span..=span {
                let at = Point::new(center.x + i as f64 * step, center.y + j as f64 * step);
                if at.distance(center) < reach {
                    candidates.push(at);
                }
            }
        }
        candidates.sort_by(|a, b| {
            a.distance(center)
                .total_cmp(&b.distance(center))
                .then(a.y.total_cmp(&b.y))
                .then(a.x.total_cmp(&b.x))
        });

        candidates
            .into_iter()
            .find(|at| {
                let candidate = Shape::Circle {
                    center: *at,
                    radius: footprint,
                };
                self.is_free(&candidate, Some((target_handle, target_shape)))
            })
            .ok_or(GeometryError::NoRoom { target })
    }
}

impl Geometry for ShapeTable {
    fn contains(&self, outer: BoundaryHandle, inner: BoundaryHandle) -> bool {
        match (self.shapes.get(&outer), self.shapes.get(&inner)) {
            (Some(outer), Some(inner)) => outer.strictly_contains(inner),
            _ => false,
        }
    }

    fn enclose(&mut self, region: &[BoundaryHandle]) -> Result<BoundaryHandle, GeometryError> {
        if region.is_empty() {
            return Err(GeometryError::EmptyRegion);
        }
        let shapes = region
            .iter()
            .map(|handle| self.lookup(*handle))
            .collect::<Result<Vec<_>, _>>()?;

        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for shape in &shapes {
            let (c, r) = (shape.center(), shape.radius());
            min_x = min_x.min(c.x - r);
            min_y = min_y.min(c.y - r);
            max_x = max_x.max(c.x + r);
            max_y = max_y.max(c.y + r);
        }
        let center = Point::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);
        let reach = shapes
            .iter()
            .map(|shape| center.distance(shape.center()) + shape.radius())
            .fold(0.0_f64, f64::max);
        let outline = Shape::Circle {
            center,
            radius: reach + self.config.margin,
        };

        let collides = self.shapes.iter().any(|(handle, shape)| {
            !region.contains(handle)
                && !shape.is_disjoint_from(&outline)
                && !shape.strictly_contains(&outline)
        });
        if collides {
            return Err(GeometryError::NoRoom { target: None });
        }
        Ok(self.insert(outline))
    }

    fn place(
        &mut self,
        pattern: &Pattern,
        target: Option<BoundaryHandle>,
    ) -> Result<Vec<BoundaryHandle>, GeometryError> {
        if pattern.is_empty() {
            return Ok(Vec::new());
        }
        let footprint = self.row_half_width(pattern.nodes()) + self.config.margin;
        let center = self.find_slot(footprint, target)?;

        let mut laid_out = Vec::with_capacity(pattern.node_count());
        self.layout_row(pattern.nodes(), center, &mut laid_out);
        Ok(laid_out.into_iter().map(|shape| self.insert(shape)).collect())
    }

    fn release(&mut self, handle: BoundaryHandle) {
        self.shapes.remove(&handle);
    }
}

#[cfg(test)]
mod tests {
    use super::{Geometry, GeometryError, Point, Shape, ShapeTable};
    use crate::model::pattern::{Pattern, PatternNode};

    fn sym(label: &str) -> PatternNode {
        PatternNode::symbol(label).expect("valid label")
    }

    #[test]
    fn containment_is_strict_and_not_reflexive() {
        let mut table = ShapeTable::new();
        let outer = table.insert_circle(Point::new(0.0, 0.0), 10.0);
        let inner = table.insert_circle(Point::new(2.0, 0.0), 3.0);
        let touching = table.insert_circle(Point::new(7.0, 0.0), 3.0);
        let point = table.insert_point(Point::new(-9.0, 0.0));

        assert!(table.contains(outer, inner));
        assert!(!table.contains(inner, outer));
        assert!(!table.contains(outer, outer));
        assert!(!table.contains(outer, touching));
        assert!(table.contains(outer, point));
        assert!(!table.contains(point, outer));
    }

    #[test]
    fn enclose_wraps_region_and_nests_repeatedly() {
        let mut table = ShapeTable::new();
        let a = table.insert_point(Point::new(0.0, 0.0));
        let b = table.insert_point(Point::new(4.0, 0.0));

        let inner = table.enclose(&[a, b]).expect("inner outline");
        let outer = table.enclose(&[a, b, inner]).expect("outer outline");

        assert!(table.contains(inner, a));
        assert!(table.contains(inner, b));
        assert!(table.contains(outer, inner));
        assert!(!table.contains(inner, outer));
    }

    #[test]
    fn enclose_refuses_to_swallow_neighbours() {
        let mut table = ShapeTable::new();
        let a = table.insert_point(Point::new(0.0, 0.0));
        let b = table.insert_point(Point::new(10.0, 0.0));
        let _between = table.insert_point(Point::new(5.0, 0.0));

        let err = table.enclose(&[a, b]).expect_err("neighbour lies inside");
        assert_eq!(err, GeometryError::NoRoom { target: None });
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn place_puts_pattern_inside_target_away_from_existing_cuts() {
        let mut table = ShapeTable::new();
        let target = table.insert_circle(Point::new(0.0, 0.0), 20.0);
        let occupied = table.insert_circle(Point::new(0.0, 0.0), 4.0);
        let pattern = Pattern::new(vec![PatternNode::cut(vec![sym("A")]), sym("B")]);

        let handles = table.place(&pattern, Some(target)).expect("room available");
        assert_eq!(handles.len(), 3);

        let cut = handles[0];
        let inside_cut = handles[1];
        let beside = handles[2];
        assert!(matches!(table.shape(cut), Some(Shape::Circle { .. })));
        assert!(table.contains(target, cut));
        assert!(table.contains(cut, inside_cut));
        assert!(table.contains(target, beside));
        assert!(!table.contains(cut, beside));
        for handle in handles {
            assert!(!table.contains(occupied, handle));
        }
    }

    #[test]
    fn place_on_sheet_lands_outside_every_shape() {
        let mut table = ShapeTable::new();
        let existing = table.insert_circle(Point::new(0.0, 0.0), 5.0);
        let handles = table
            .place(&Pattern::new(vec![sym("A")]), None)
            .expect("sheet is unbounded");
        assert!(!table.contains(existing, handles[0]));
    }

    #[test]
    fn place_reports_no_room_in_tiny_target() {
        let mut table = ShapeTable::new();
        let target = table.insert_circle(Point::new(0.0, 0.0), 1.5);
        let err = table
            .place(&Pattern::new(vec![sym("A"), sym("B")]), Some(target))
            .expect_err("target too small");
        assert_eq!(err, GeometryError::NoRoom { target: Some(target) });
        assert_eq!(table.len(), 1);
    }
}
