//! The tensor index tree produced by an extraction.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. Each node
//! holds the values selected on one axis; children are kept sorted by
//! `(axis name, values)` so lookups can bisect. Removing a node detaches it
//! from its parent and marks its subtree removed; ids are never reused.

use std::cmp::Ordering;

use tracing::debug;

use crate::axis::{Axis, DEFAULT_TOLERANCE};
use crate::path::DatacubePath;
use crate::value::AxisValue;

/// Name of the axis carried by the root node.
pub const ROOT_AXIS: &str = "root";

/// Handle to a node of a [`TensorIndexTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// The parts of an axis a tree node needs to compare values.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAxis {
    pub name: String,
    pub tol: f64,
    pub can_round: bool,
    pub unsliceable: bool,
}

impl NodeAxis {
    pub fn root() -> Self {
        Self::named(ROOT_AXIS)
    }

    /// An axis compared by exact value equality.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tol: DEFAULT_TOLERANCE,
            can_round: false,
            unsliceable: false,
        }
    }

    pub fn from_axis(axis: &Axis) -> Self {
        Self {
            name: axis.name().to_string(),
            tol: axis.tol(),
            can_round: axis.can_round(),
            unsliceable: axis.is_unsliceable(),
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    axis: NodeAxis,
    values: Vec<AxisValue>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    result: Vec<f64>,
    hidden: bool,
    indexes: Vec<AxisValue>,
    removed: bool,
}

impl Node {
    fn new(axis: NodeAxis, values: Vec<AxisValue>) -> Self {
        Self {
            axis,
            values,
            children: Vec::new(),
            parent: None,
            result: Vec::new(),
            hidden: false,
            indexes: Vec::new(),
            removed: false,
        }
    }
}

fn key_cmp(a_axis: &str, a_values: &[AxisValue], b_axis: &str, b_values: &[AxisValue]) -> Ordering {
    a_axis.cmp(b_axis).then_with(|| a_values.cmp(b_values))
}

/// Node equality: same axis name, and the same values either exactly or,
/// on rounding axes, pairwise within twice the larger tolerance.
fn values_match(a: &NodeAxis, a_values: &[AxisValue], b: &NodeAxis, b_values: &[AxisValue]) -> bool {
    if a.name != b.name {
        return false;
    }
    if a_values == b_values {
        return true;
    }
    if a.unsliceable || !a.can_round || a_values.len() != b_values.len() {
        return false;
    }
    let tol = 2.0 * a.tol.max(b.tol);
    a_values
        .iter()
        .zip(b_values)
        .all(|(x, y)| match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() <= tol,
            _ => x == y,
        })
}

/// Sort values and merge neighbours that are equal within the axis tolerance.
fn normalize_values(axis: &NodeAxis, values: &mut Vec<AxisValue>) {
    values.sort();
    if axis.can_round {
        let tol = 2.0 * axis.tol;
        values.dedup_by(|b, a| match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() <= tol,
            _ => a == b,
        });
    } else {
        values.dedup();
    }
}

#[derive(Debug, Clone)]
pub struct TensorIndexTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for TensorIndexTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TensorIndexTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeAxis::root(), Vec::new())],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn axis(&self, id: NodeId) -> &NodeAxis {
        &self.node(id).axis
    }

    pub fn axis_name(&self, id: NodeId) -> &str {
        &self.node(id).axis.name
    }

    pub fn values(&self, id: NodeId) -> &[AxisValue] {
        &self.node(id).values
    }

    pub fn set_values(&mut self, id: NodeId, values: Vec<AxisValue>) {
        self.node_mut(id).values = values;
        self.resort(id);
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn result(&self, id: NodeId) -> &[f64] {
        &self.node(id).result
    }

    pub fn set_result(&mut self, id: NodeId, result: Vec<f64>) {
        self.node_mut(id).result = result;
    }

    pub fn is_hidden(&self, id: NodeId) -> bool {
        self.node(id).hidden
    }

    /// Flat storage indexes recorded on a node by grid unmapping.
    pub fn indexes(&self, id: NodeId) -> &[AxisValue] {
        &self.node(id).indexes
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        id == self.root
    }

    /// Whether `id` is still attached to the tree.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.get(id.0).is_some_and(|node| !node.removed)
    }

    /// A tree whose root has no children.
    pub fn is_empty(&self) -> bool {
        self.node(self.root).children.is_empty()
    }

    /// Number of attached nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|node| !node.removed).count()
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Child of `parent` equal to `(axis, values)`, if any.
    pub fn find_child(&self, parent: NodeId, axis: &NodeAxis, values: &[AxisValue]) -> Option<NodeId> {
        let children = &self.node(parent).children;
        let pos = children.partition_point(|c| {
            let child = self.node(*c);
            key_cmp(&child.axis.name, &child.values, &axis.name, values) == Ordering::Less
        });
        [pos.checked_sub(1), Some(pos), Some(pos + 1)]
            .into_iter()
            .flatten()
            .filter_map(|i| children.get(i).copied())
            .find(|c| {
                let child = self.node(*c);
                values_match(&child.axis, &child.values, axis, values)
            })
    }

    /// Return the child of `parent` matching `(axis, values)`, creating it
    /// when none exists.
    pub fn create_child(&mut self, parent: NodeId, axis: NodeAxis, mut values: Vec<AxisValue>) -> NodeId {
        normalize_values(&axis, &mut values);
        if let Some(existing) = self.find_child(parent, &axis, &values) {
            return existing;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(axis, values));
        self.attach(parent, id);
        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        let pos = {
            let (name, values) = (&self.node(child).axis.name, &self.node(child).values);
            self.node(parent).children.partition_point(|c| {
                let other = self.node(*c);
                key_cmp(&other.axis.name, &other.values, name, values) == Ordering::Less
            })
        };
        self.node_mut(parent).children.insert(pos, child);
        self.node_mut(child).parent = Some(parent);
    }

    fn detach(&mut self, child: NodeId) -> Option<NodeId> {
        let parent = self.node_mut(child).parent.take()?;
        self.node_mut(parent).children.retain(|c| *c != child);
        Some(parent)
    }

    /// Restore the sibling order after a node's values changed.
    fn resort(&mut self, id: NodeId) {
        if let Some(parent) = self.detach(id) {
            self.attach(parent, id);
        }
    }

    /// Add one more value to a node, keeping values sorted and merged.
    pub fn add_value(&mut self, id: NodeId, value: AxisValue) {
        let node = self.node_mut(id);
        node.values.push(value);
        let axis = node.axis.clone();
        normalize_values(&axis, &mut node.values);
        self.resort(id);
    }

    /// Insert a node between `id` and its children.
    pub fn add_node_layer_after(&mut self, id: NodeId, axis_name: &str, values: Vec<AxisValue>) -> NodeId {
        let layer = NodeId(self.nodes.len());
        let mut node = Node::new(NodeAxis::named(axis_name), values);
        node.children = std::mem::take(&mut self.node_mut(id).children);
        node.parent = Some(id);
        for child in &node.children {
            self.nodes[child.0].parent = Some(layer);
        }
        self.nodes.push(node);
        self.node_mut(id).children.push(layer);
        layer
    }

    /// Record `indexes` on the grandparent of `id` and hide the two grid
    /// levels below it. Returns the grandparent.
    pub fn hide_non_index_nodes(&mut self, id: NodeId, indexes: Vec<AxisValue>) -> NodeId {
        let grandparent = self
            .parent(id)
            .and_then(|parent| self.parent(parent))
            .unwrap_or(id);
        self.node_mut(grandparent).indexes.extend(indexes);
        self.hide_two_levels(id);
        grandparent
    }

    fn hide_two_levels(&mut self, id: NodeId) {
        self.node_mut(id).hidden = true;
        if let Some(parent) = self.parent(id) {
            if self.non_hidden_children(parent) == 0 {
                self.node_mut(parent).hidden = true;
            }
        }
    }

    pub fn non_hidden_children(&self, id: NodeId) -> usize {
        self.children(id)
            .iter()
            .filter(|c| !self.node(**c).hidden)
            .count()
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Remove a node and every ancestor left without children. The root is
    /// never removed.
    pub fn remove_branch(&mut self, id: NodeId) {
        let mut current = id;
        while !self.is_root(current) && self.contains(current) {
            let parent = self.detach(current);
            self.mark_removed(current);
            match parent {
                Some(parent) if self.node(parent).children.is_empty() => current = parent,
                _ => break,
            }
        }
    }

    fn mark_removed(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node_mut(current);
            node.removed = true;
            stack.extend(std::mem::take(&mut node.children));
        }
    }

    /// Drop one value from a compressed node, removing the node when it was
    /// the last one.
    pub fn remove_compressed_branch(&mut self, id: NodeId, value: &AxisValue) {
        let values = &self.node(id).values;
        if !values.contains(value) {
            return;
        }
        if values.len() == 1 {
            self.remove_branch(id);
        } else {
            self.node_mut(id).values.retain(|v| v != value);
        }
    }

    // ========================================================================
    // Merging
    // ========================================================================

    /// Structural union with `other`: matching children are merged
    /// recursively, the rest are copied over.
    pub fn merge(&mut self, other: &TensorIndexTree) {
        self.merge_node(self.root, other, other.root);
    }

    fn merge_node(&mut self, target: NodeId, other: &TensorIndexTree, source: NodeId) {
        for child in other.children(source) {
            let (axis, values) = (other.axis(*child), other.values(*child));
            match self.find_child(target, axis, values) {
                Some(existing) => self.merge_node(existing, other, *child),
                None => {
                    let copied = self.copy_from(other, *child);
                    self.attach(target, copied);
                }
            }
        }
    }

    fn copy_from(&mut self, other: &TensorIndexTree, source: NodeId) -> NodeId {
        let src = other.node(source);
        let id = NodeId(self.nodes.len());
        let mut node = Node::new(src.axis.clone(), src.values.clone());
        node.result = src.result.clone();
        node.hidden = src.hidden;
        node.indexes = src.indexes.clone();
        self.nodes.push(node);
        for child in &src.children {
            let copied = self.copy_from(other, *child);
            self.node_mut(copied).parent = Some(id);
            self.node_mut(id).children.push(copied);
        }
        id
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Ancestors of `id` from the top of the tree down to `id` itself,
    /// excluding the root.
    pub fn get_ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut ancestors = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if self.is_root(node) {
                break;
            }
            ancestors.push(node);
            current = self.parent(node);
        }
        ancestors.reverse();
        ancestors
    }

    /// The axis-to-values path leading to `id`.
    pub fn flatten(&self, id: NodeId) -> DatacubePath {
        self.get_ancestors(id)
            .into_iter()
            .map(|a| (self.axis_name(a).to_string(), self.values(a).to_vec()))
            .collect()
    }

    /// Attached leaves in depth-first order. An empty tree has no leaves.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.leaves_with_ancestors()
            .into_iter()
            .map(|(leaf, _)| leaf)
            .collect()
    }

    /// Each leaf with its non-root ancestors, top first, ending at the leaf.
    pub fn leaves_with_ancestors(&self) -> Vec<(NodeId, Vec<NodeId>)> {
        let mut leaves = Vec::new();
        if self.is_empty() {
            return leaves;
        }
        let mut stack = vec![(self.root, Vec::new())];
        while let Some((id, ancestors)) = stack.pop() {
            let children = self.children(id);
            if children.is_empty() {
                leaves.push((id, ancestors));
                continue;
            }
            for child in children.iter().rev() {
                let mut chain = ancestors.clone();
                chain.push(*child);
                stack.push((*child, chain));
            }
        }
        leaves
    }

    /// Each leaf with its flattened path.
    pub fn leaf_paths(&self) -> Vec<(NodeId, DatacubePath)> {
        self.leaves_with_ancestors()
            .into_iter()
            .map(|(leaf, ancestors)| {
                let path = ancestors
                    .into_iter()
                    .map(|a| (self.axis_name(a).to_string(), self.values(a).to_vec()))
                    .collect();
                (leaf, path)
            })
            .collect()
    }

    /// Log the visible tree at debug level.
    pub fn pprint(&self) {
        self.pprint_node(self.root, 0);
    }

    fn pprint_node(&self, id: NodeId, level: usize) {
        let node = self.node(id);
        let indent = "\t".repeat(level);
        if self.is_root(id) {
            debug!("{indent}\u{21b3}{ROOT_AXIS}");
        } else {
            let values: Vec<String> = node.values.iter().map(|v| v.to_string()).collect();
            debug!("{indent}\u{21b3}{}=({})", node.axis.name, values.join(", "));
        }
        for child in &node.children {
            if !self.node(*child).hidden {
                self.pprint_node(*child, level + 1);
            }
        }
        if node.children.is_empty() {
            debug!("{indent}\t\u{21b3}{:?}", node.result);
        }
    }

    /// JSON encoding of the visible tree.
    pub fn to_json(&self) -> serde_json::Value {
        self.node_json(self.root)
    }

    fn node_json(&self, id: NodeId) -> serde_json::Value {
        let node = self.node(id);
        let mut map = serde_json::Map::new();
        map.insert("axis".to_string(), node.axis.name.clone().into());
        map.insert(
            "values".to_string(),
            node.values.iter().map(AxisValue::to_json).collect(),
        );
        if !node.indexes.is_empty() {
            map.insert(
                "indexes".to_string(),
                node.indexes.iter().map(AxisValue::to_json).collect(),
            );
        }
        if !node.result.is_empty() {
            map.insert("result".to_string(), node.result.clone().into());
        }
        let children: Vec<serde_json::Value> = node
            .children
            .iter()
            .filter(|c| !self.node(**c).hidden)
            .map(|c| self.node_json(*c))
            .collect();
        if !children.is_empty() {
            map.insert("children".to_string(), children.into());
        }
        serde_json::Value::Object(map)
    }
}
