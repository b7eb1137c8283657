//! Live ranges
//!
//! A range is two boundary points kept valid across tree mutation. The
//! tracker indexes ranges by every node they reference so that insert,
//! remove and character-data splices only visit the ranges they affect.
//! Offsets count children for containers and UTF-16 code units for
//! character data.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::NodeId;
use crate::document::{Document, ensure_exists};
use crate::error::{DomError, DomResult};
use crate::node::NodeType;
use crate::tree::DomTree;

/// Live range handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RangeId(u32);

/// Range boundary point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryPoint {
    /// The container node
    pub node: NodeId,
    pub offset: usize,
}

impl BoundaryPoint {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// Start and end of a range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeBoundaries {
    pub start: BoundaryPoint,
    pub end: BoundaryPoint,
}

impl RangeBoundaries {
    pub fn collapsed_at(point: BoundaryPoint) -> Self {
        Self { start: point, end: point }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    fn nodes(&self) -> [NodeId; 2] {
        [self.start.node, self.end.node]
    }
}

/// Which boundary pair `compare_boundary_points` compares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOrdering {
    StartToStart,
    StartToEnd,
    EndToEnd,
    EndToStart,
}

/// Position of boundary point `a` relative to `b`
pub(crate) fn compare_boundary_points(tree: &DomTree, a: BoundaryPoint, b: BoundaryPoint) -> Ordering {
    if a.node == b.node {
        return a.offset.cmp(&b.offset);
    }
    if tree.tree_order(a.node, b.node) == Ordering::Greater {
        return compare_boundary_points(tree, b, a).reverse();
    }
    if tree.is_inclusive_ancestor(a.node, b.node) {
        let mut child = b.node;
        while let Some(parent) = tree.node(child).parent {
            if parent == a.node {
                break;
            }
            child = parent;
        }
        if tree.index(child) < a.offset {
            return Ordering::Greater;
        }
    }
    Ordering::Less
}

/// Live range registry of one document
#[derive(Debug, Default)]
pub(crate) struct RangeTracker {
    ranges: Vec<Option<RangeBoundaries>>,
    by_node: HashMap<NodeId, Vec<RangeId>>,
}

impl RangeTracker {
    fn create(&mut self, bounds: RangeBoundaries) -> RangeId {
        let id = RangeId(self.ranges.len() as u32);
        self.ranges.push(Some(bounds));
        self.register(id, &bounds);
        id
    }

    pub(crate) fn get(&self, id: RangeId) -> Option<RangeBoundaries> {
        self.ranges.get(id.0 as usize).copied().flatten()
    }

    fn register(&mut self, id: RangeId, bounds: &RangeBoundaries) {
        for node in bounds.nodes() {
            let ids = self.by_node.entry(node).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }

    fn unregister(&mut self, id: RangeId, bounds: &RangeBoundaries) {
        for node in bounds.nodes() {
            if let Some(ids) = self.by_node.get_mut(&node) {
                ids.retain(|&r| r != id);
                if ids.is_empty() {
                    self.by_node.remove(&node);
                }
            }
        }
    }

    fn set(&mut self, id: RangeId, bounds: RangeBoundaries) {
        let Some(slot) = self.ranges.get_mut(id.0 as usize) else {
            return;
        };
        let Some(old) = slot.replace(bounds) else {
            // detached ranges stay detached
            *slot = None;
            return;
        };
        self.unregister(id, &old);
        self.register(id, &bounds);
    }

    fn detach(&mut self, id: RangeId) {
        if let Some(old) = self.ranges.get_mut(id.0 as usize).and_then(Option::take) {
            self.unregister(id, &old);
        }
    }

    fn registered_at(&self, node: NodeId) -> Vec<RangeId> {
        self.by_node.get(&node).cloned().unwrap_or_default()
    }

    /// Apply `f` to every range referencing `node`
    fn update_at(&mut self, node: NodeId, mut f: impl FnMut(&mut RangeBoundaries)) {
        for id in self.registered_at(node) {
            if let Some(mut bounds) = self.get(id) {
                f(&mut bounds);
                self.set(id, bounds);
            }
        }
    }

    /// `count` children were inserted into `parent` at `index`
    pub(crate) fn shift_for_insert(&mut self, parent: NodeId, index: usize, count: usize) {
        self.update_at(parent, |bounds| {
            for point in [&mut bounds.start, &mut bounds.end] {
                if point.node == parent && point.offset > index {
                    point.offset += count;
                }
            }
        });
    }

    /// `node`, child `index` of `parent`, is about to be removed
    pub(crate) fn adjust_for_remove(&mut self, tree: &DomTree, parent: NodeId, node: NodeId, index: usize) {
        for descendant in tree.tree_iter(node) {
            self.update_at(descendant, |bounds| {
                for point in [&mut bounds.start, &mut bounds.end] {
                    if point.node == descendant {
                        *point = BoundaryPoint::new(parent, index);
                    }
                }
            });
        }
        self.update_at(parent, |bounds| {
            for point in [&mut bounds.start, &mut bounds.end] {
                if point.node == parent && point.offset > index {
                    point.offset -= 1;
                }
            }
        });
    }

    /// `count` code units at `offset` of `node` were replaced by `inserted` units
    pub(crate) fn adjust_for_splice(&mut self, node: NodeId, offset: usize, count: usize, inserted: usize) {
        self.update_at(node, |bounds| {
            for point in [&mut bounds.start, &mut bounds.end] {
                if point.node != node {
                    continue;
                }
                if point.offset > offset && point.offset <= offset + count {
                    point.offset = offset;
                } else if point.offset > offset + count {
                    point.offset = point.offset - count + inserted;
                }
            }
        });
    }
}

impl Document {
    /// New live range collapsed at the start of the document
    pub fn create_range(&mut self) -> RangeId {
        let root = self.root();
        self.ranges
            .create(RangeBoundaries::collapsed_at(BoundaryPoint::new(root, 0)))
    }

    /// Create a live range over explicit bounds
    pub fn create_range_with(&mut self, start: BoundaryPoint, end: BoundaryPoint) -> DomResult<RangeId> {
        self.check_boundary(start.node, start.offset)?;
        self.check_boundary(end.node, end.offset)?;
        let id = self.create_range();
        self.set_start(id, start.node, start.offset)?;
        self.set_end(id, end.node, end.offset)?;
        Ok(id)
    }

    pub fn range_bounds(&self, range: RangeId) -> Option<RangeBoundaries> {
        self.ranges.get(range)
    }

    fn live_range(&self, range: RangeId) -> DomResult<RangeBoundaries> {
        self.ranges
            .get(range)
            .ok_or_else(|| DomError::InvalidState("the range is detached".to_string()))
    }

    fn check_boundary(&self, node: NodeId, offset: usize) -> DomResult<()> {
        ensure_exists(self, node)?;
        let n = self.tree.node(node);
        if n.node_type() == NodeType::DocumentType {
            return Err(DomError::InvalidState("a doctype cannot contain a boundary point".to_string()));
        }
        if offset > n.length() {
            return Err(DomError::IndexSize);
        }
        Ok(())
    }

    pub fn set_start(&mut self, range: RangeId, node: NodeId, offset: usize) -> DomResult<()> {
        let mut bounds = self.live_range(range)?;
        self.check_boundary(node, offset)?;
        let point = BoundaryPoint::new(node, offset);
        if self.tree.root(bounds.end.node) != self.tree.root(node)
            || compare_boundary_points(&self.tree, point, bounds.end) == Ordering::Greater
        {
            bounds.end = point;
        }
        bounds.start = point;
        self.ranges.set(range, bounds);
        Ok(())
    }

    pub fn set_end(&mut self, range: RangeId, node: NodeId, offset: usize) -> DomResult<()> {
        let mut bounds = self.live_range(range)?;
        self.check_boundary(node, offset)?;
        let point = BoundaryPoint::new(node, offset);
        if self.tree.root(bounds.start.node) != self.tree.root(node)
            || compare_boundary_points(&self.tree, point, bounds.start) == Ordering::Less
        {
            bounds.start = point;
        }
        bounds.end = point;
        self.ranges.set(range, bounds);
        Ok(())
    }

    pub fn collapse(&mut self, range: RangeId, to_start: bool) -> DomResult<()> {
        let bounds = self.live_range(range)?;
        let point = if to_start { bounds.start } else { bounds.end };
        self.ranges.set(range, RangeBoundaries::collapsed_at(point));
        Ok(())
    }

    pub fn select_node(&mut self, range: RangeId, node: NodeId) -> DomResult<()> {
        self.live_range(range)?;
        ensure_exists(self, node)?;
        let Some(parent) = self.tree.node(node).parent else {
            return Err(DomError::InvalidState("the node has no parent".to_string()));
        };
        let index = self.tree.index(node);
        self.ranges.set(
            range,
            RangeBoundaries {
                start: BoundaryPoint::new(parent, index),
                end: BoundaryPoint::new(parent, index + 1),
            },
        );
        Ok(())
    }

    pub fn select_node_contents(&mut self, range: RangeId, node: NodeId) -> DomResult<()> {
        self.live_range(range)?;
        self.check_boundary(node, 0)?;
        let length = self.tree.node(node).length();
        self.ranges.set(
            range,
            RangeBoundaries {
                start: BoundaryPoint::new(node, 0),
                end: BoundaryPoint::new(node, length),
            },
        );
        Ok(())
    }

    pub fn is_collapsed(&self, range: RangeId) -> DomResult<bool> {
        Ok(self.live_range(range)?.is_collapsed())
    }

    /// Deepest node containing both boundary containers
    pub fn common_ancestor_container(&self, range: RangeId) -> DomResult<NodeId> {
        let bounds = self.live_range(range)?;
        self.tree
            .inclusive_ancestors(bounds.start.node)
            .find(|&ancestor| self.tree.is_inclusive_ancestor(ancestor, bounds.end.node))
            .ok_or_else(|| DomError::InvalidState("the boundary points are in different trees".to_string()))
    }

    pub fn compare_boundary_points(&self, range: RangeId, how: RangeOrdering, source: RangeId) -> DomResult<Ordering> {
        let this = self.live_range(range)?;
        let other = self.live_range(source)?;
        if self.tree.root(this.start.node) != self.tree.root(other.start.node) {
            return Err(DomError::InvalidState("the ranges are in different trees".to_string()));
        }
        let (a, b) = match how {
            RangeOrdering::StartToStart => (this.start, other.start),
            RangeOrdering::StartToEnd => (this.end, other.start),
            RangeOrdering::EndToEnd => (this.end, other.end),
            RangeOrdering::EndToStart => (this.start, other.end),
        };
        Ok(compare_boundary_points(&self.tree, a, b))
    }

    /// Stop tracking `range`; later queries see it as detached
    pub fn detach_range(&mut self, range: RangeId) {
        self.ranges.detach(range);
    }
}
