//! # Cosmos
//!
//! Dynamic bounding-volume hierarchy keyed by opaque handles.
//!
//! Leaves hold the exact boxes handed to [`Cosmos::insert`] / [`Cosmos::update`];
//! internal nodes hold the union of their children. Insertion descends by a
//! surface-area cost heuristic and the path back to the root is rebalanced
//! with tree rotations, which keeps the height logarithmic under churn.

use std::collections::HashMap;
use std::hash::Hash;

use super::bounds::Aabb;
use super::spatial_query::SpatialQuery;
use crate::foundation::math::Vec3;

const NULL_NODE: usize = usize::MAX;

#[derive(Debug, Clone)]
struct CosmosNode<K> {
    bounds: Aabb,
    parent: usize,
    left: usize,
    right: usize,
    /// Zero for leaves, -1 for nodes on the free list
    height: i32,
    key: Option<K>,
}

impl<K> CosmosNode<K> {
    fn is_leaf(&self) -> bool {
        self.left == NULL_NODE
    }
}

/// Bounding-volume tree mapping handles to axis-aligned boxes
#[derive(Debug, Clone)]
pub struct Cosmos<K> {
    nodes: Vec<CosmosNode<K>>,
    root: usize,
    free: Vec<usize>,
    leaves: HashMap<K, usize>,
}

impl<K: Copy + Eq + Hash> Default for Cosmos<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + Eq + Hash> Cosmos<K> {
    /// Create an empty tree
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: NULL_NODE,
            free: Vec::new(),
            leaves: HashMap::new(),
        }
    }

    /// Insert a handle; an already indexed handle is updated instead
    pub fn insert(&mut self, key: K, min: Vec3, max: Vec3) {
        if self.leaves.contains_key(&key) {
            self.update(key, min, max);
            return;
        }

        let leaf = self.allocate_node();
        {
            let node = &mut self.nodes[leaf];
            node.bounds = Aabb::new(min, max);
            node.key = Some(key);
            node.height = 0;
        }
        self.leaves.insert(key, leaf);
        self.insert_leaf(leaf);
    }

    /// Move a handle to a new box; returns false if the handle is not indexed
    pub fn update(&mut self, key: K, min: Vec3, max: Vec3) -> bool {
        let Some(&leaf) = self.leaves.get(&key) else {
            return false;
        };

        let bounds = Aabb::new(min, max);
        if self.nodes[leaf].bounds == bounds {
            return true;
        }

        self.remove_leaf(leaf);
        self.nodes[leaf].bounds = bounds;
        self.insert_leaf(leaf);
        true
    }

    /// Remove a handle; removing a handle that is not indexed is a no-op
    pub fn remove(&mut self, key: &K) -> bool {
        let Some(leaf) = self.leaves.remove(key) else {
            return false;
        };

        self.remove_leaf(leaf);
        self.free_node(leaf);
        true
    }

    /// Visit every leaf whose box passes `overlaps`
    ///
    /// Subtrees whose union box fails the predicate are skipped. Visit order
    /// is unspecified.
    pub fn query<P, F>(&self, mut overlaps: P, mut visit: F)
    where
        P: FnMut(&Aabb) -> bool,
        F: FnMut(&K, &Aabb),
    {
        if self.root == NULL_NODE {
            return;
        }

        let mut stack: Vec<usize> = Vec::with_capacity(64);
        stack.push(self.root);

        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !overlaps(&node.bounds) {
                continue;
            }

            if node.is_leaf() {
                if let Some(key) = &node.key {
                    visit(key, &node.bounds);
                }
            } else {
                stack.push(node.left);
                stack.push(node.right);
            }
        }
    }

    /// Visit every leaf overlapping a [`SpatialQuery`] volume
    pub fn query_with<Q, F>(&self, query: &Q, visit: F)
    where
        Q: SpatialQuery + ?Sized,
        F: FnMut(&K, &Aabb),
    {
        self.query(|bounds| query.overlaps(bounds), visit);
    }

    /// Current box of a handle
    pub fn bounds(&self, key: &K) -> Option<Aabb> {
        self.leaves.get(key).map(|&leaf| self.nodes[leaf].bounds)
    }

    /// Whether a handle is indexed
    pub fn contains(&self, key: &K) -> bool {
        self.leaves.contains_key(key)
    }

    /// Number of indexed handles
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Whether nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Height of the tree (0 for a single leaf, -1 when empty)
    pub fn height(&self) -> i32 {
        if self.root == NULL_NODE {
            -1
        } else {
            self.nodes[self.root].height
        }
    }

    /// Drop every handle
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.leaves.clear();
        self.root = NULL_NODE;
    }

    fn allocate_node(&mut self) -> usize {
        let node = CosmosNode {
            bounds: Aabb::unit(),
            parent: NULL_NODE,
            left: NULL_NODE,
            right: NULL_NODE,
            height: 0,
            key: None,
        };

        if let Some(index) = self.free.pop() {
            self.nodes[index] = node;
            index
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn free_node(&mut self, index: usize) {
        let node = &mut self.nodes[index];
        node.key = None;
        node.height = -1;
        node.parent = NULL_NODE;
        node.left = NULL_NODE;
        node.right = NULL_NODE;
        self.free.push(index);
    }

    fn insert_leaf(&mut self, leaf: usize) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf].parent = NULL_NODE;
            return;
        }

        let leaf_bounds = self.nodes[leaf].bounds;
        let mut index = self.root;
        while !self.nodes[index].is_leaf() {
            let node = &self.nodes[index];
            let area = node.bounds.surface_area();
            let combined = node.bounds.merge(&leaf_bounds).surface_area();

            // Cost of pairing the leaf with this node right here
            let cost = 2.0 * combined;
            // Minimum cost pushed down to either child
            let inheritance = 2.0 * (combined - area);

            let cost_left = self.descent_cost(node.left, &leaf_bounds) + inheritance;
            let cost_right = self.descent_cost(node.right, &leaf_bounds) + inheritance;

            if cost < cost_left && cost < cost_right {
                break;
            }

            index = if cost_left < cost_right { node.left } else { node.right };
        }

        let sibling = index;
        let old_parent = self.nodes[sibling].parent;
        let new_parent = self.allocate_node();
        {
            let sibling_node = &self.nodes[sibling];
            let bounds = leaf_bounds.merge(&sibling_node.bounds);
            let height = sibling_node.height + 1;
            let node = &mut self.nodes[new_parent];
            node.parent = old_parent;
            node.bounds = bounds;
            node.height = height;
            node.left = sibling;
            node.right = leaf;
        }

        if old_parent == NULL_NODE {
            self.root = new_parent;
        } else {
            self.replace_child(old_parent, sibling, new_parent);
        }
        self.nodes[sibling].parent = new_parent;
        self.nodes[leaf].parent = new_parent;

        self.refit_from(self.nodes[leaf].parent);
    }

    fn descent_cost(&self, child: usize, leaf_bounds: &Aabb) -> f32 {
        let node = &self.nodes[child];
        let merged = leaf_bounds.merge(&node.bounds).surface_area();
        if node.is_leaf() {
            merged
        } else {
            merged - node.bounds.surface_area()
        }
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf].parent;
        let grand_parent = self.nodes[parent].parent;
        let sibling = if self.nodes[parent].left == leaf {
            self.nodes[parent].right
        } else {
            self.nodes[parent].left
        };

        if grand_parent == NULL_NODE {
            self.root = sibling;
            self.nodes[sibling].parent = NULL_NODE;
            self.free_node(parent);
        } else {
            self.replace_child(grand_parent, parent, sibling);
            self.nodes[sibling].parent = grand_parent;
            self.free_node(parent);
            self.refit_from(grand_parent);
        }
        self.nodes[leaf].parent = NULL_NODE;
    }

    fn replace_child(&mut self, parent: usize, old: usize, new: usize) {
        let node = &mut self.nodes[parent];
        if node.left == old {
            node.left = new;
        } else {
            node.right = new;
        }
    }

    fn refit_from(&mut self, mut index: usize) {
        while index != NULL_NODE {
            index = self.balance(index);

            let (left, right) = (self.nodes[index].left, self.nodes[index].right);
            let height = 1 + self.nodes[left].height.max(self.nodes[right].height);
            let bounds = self.nodes[left].bounds.merge(&self.nodes[right].bounds);
            let node = &mut self.nodes[index];
            node.height = height;
            node.bounds = bounds;

            index = node.parent;
        }
    }

    /// Rotate the taller child up when subtree heights differ by more than one
    fn balance(&mut self, a: usize) -> usize {
        if self.nodes[a].is_leaf() || self.nodes[a].height < 2 {
            return a;
        }

        let b = self.nodes[a].left;
        let c = self.nodes[a].right;
        let skew = self.nodes[c].height - self.nodes[b].height;

        if skew > 1 {
            self.rotate_up(a, c, b, false)
        } else if skew < -1 {
            self.rotate_up(a, b, c, true)
        } else {
            a
        }
    }

    /// Promote child `up` of `a` into `a`'s place; `other` is `a`'s remaining child
    ///
    /// `up_was_left` tells which side of `a` the promoted child came from; `a`
    /// takes that slot in `up`, and the shorter grandchild moves back under `a`.
    fn rotate_up(&mut self, a: usize, up: usize, other: usize, up_was_left: bool) -> usize {
        let f = self.nodes[up].left;
        let g = self.nodes[up].right;

        self.nodes[up].left = a;
        self.nodes[up].parent = self.nodes[a].parent;
        self.nodes[a].parent = up;

        let grand = self.nodes[up].parent;
        if grand == NULL_NODE {
            self.root = up;
        } else {
            self.replace_child(grand, a, up);
        }

        let (keep, give) = if self.nodes[f].height > self.nodes[g].height { (f, g) } else { (g, f) };
        self.nodes[up].right = keep;
        if up_was_left {
            self.nodes[a].left = give;
        } else {
            self.nodes[a].right = give;
        }
        self.nodes[give].parent = a;

        self.nodes[a].bounds = self.nodes[other].bounds.merge(&self.nodes[give].bounds);
        self.nodes[up].bounds = self.nodes[a].bounds.merge(&self.nodes[keep].bounds);
        self.nodes[a].height = 1 + self.nodes[other].height.max(self.nodes[give].height);
        self.nodes[up].height = 1 + self.nodes[a].height.max(self.nodes[keep].height);

        up
    }
}
