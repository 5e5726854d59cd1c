// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Packed node arena shared by every build strategy.
//!
//! Nodes live in one `Vec`, leaves first: indices below `leaves_end` are
//! leaves, the rest are internal. Leaf triangle ids are packed back to back in
//! a single list. Builders append into a [`StoreBuilder`], which keeps leaves
//! and internal nodes apart and concatenates them in [`StoreBuilder::finish`].

use crate::types::Aabb3;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeIdx(usize);

impl NodeIdx {
    pub(crate) const fn new(i: usize) -> Self {
        Self(i)
    }

    pub(crate) const fn get(self) -> usize {
        self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Node {
    /// Triangles `first..first + count` of the packed id list.
    Leaf { first: usize, count: usize },
    /// Pass-through node left over from an odd-sized layer.
    Single { child: NodeIdx },
    Pair { left: NodeIdx, right: NodeIdx },
}

impl Node {
    pub(crate) fn children(&self) -> impl Iterator<Item = NodeIdx> + use<> {
        let (a, b) = match *self {
            Self::Leaf { .. } => (None, None),
            Self::Single { child } => (Some(child), None),
            Self::Pair { left, right } => (Some(left), Some(right)),
        };
        a.into_iter().chain(b)
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct NodeStore {
    nodes: Vec<Node>,
    boxes: Vec<Aabb3>,
    triangles: Vec<usize>,
    leaves_end: usize,
    root: Option<NodeIdx>,
}

impl NodeStore {
    pub(crate) fn root(&self) -> Option<NodeIdx> {
        self.root
    }

    pub(crate) fn node(&self, idx: NodeIdx) -> Node {
        self.nodes[idx.get()]
    }

    pub(crate) fn bounds(&self, idx: NodeIdx) -> &Aabb3 {
        &self.boxes[idx.get()]
    }

    /// Triangle ids stored in a leaf; empty for internal nodes.
    pub(crate) fn leaf_triangles(&self, idx: NodeIdx) -> &[usize] {
        match self.nodes[idx.get()] {
            Node::Leaf { first, count } => &self.triangles[first..first + count],
            _ => &[],
        }
    }

    pub(crate) fn is_leaf(&self, idx: NodeIdx) -> bool {
        idx.get() < self.leaves_end
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn leaf_count(&self) -> usize {
        self.leaves_end
    }

    pub(crate) fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

/// Child handle handed out by [`StoreBuilder`] before leaf and internal
/// indices are merged.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum ChildRef {
    Leaf(usize),
    Internal(usize),
}

#[derive(Copy, Clone, Debug)]
enum Pending {
    Single(ChildRef),
    Pair(ChildRef, ChildRef),
}

/// Append-only arena used while building.
#[derive(Debug, Default)]
pub(crate) struct StoreBuilder {
    leaves: Vec<(usize, usize)>,
    leaf_boxes: Vec<Aabb3>,
    internals: Vec<Pending>,
    internal_boxes: Vec<Aabb3>,
    triangles: Vec<usize>,
}

impl StoreBuilder {
    pub(crate) fn with_capacity(triangles: usize) -> Self {
        Self {
            triangles: Vec::with_capacity(triangles),
            ..Self::default()
        }
    }

    pub(crate) fn push_leaf(&mut self, tris: &[usize], bounds: Aabb3) -> ChildRef {
        debug_assert!(!tris.is_empty(), "leaves hold at least one triangle");
        self.leaves.push((self.triangles.len(), tris.len()));
        self.triangles.extend_from_slice(tris);
        self.leaf_boxes.push(bounds);
        ChildRef::Leaf(self.leaves.len() - 1)
    }

    pub(crate) fn push_single(&mut self, child: ChildRef) -> ChildRef {
        let bounds = self.bounds(child);
        self.internals.push(Pending::Single(child));
        self.internal_boxes.push(bounds);
        ChildRef::Internal(self.internals.len() - 1)
    }

    pub(crate) fn push_pair(&mut self, left: ChildRef, right: ChildRef) -> ChildRef {
        let bounds = self.bounds(left).union(&self.bounds(right));
        self.push_pair_with_bounds(left, right, bounds)
    }

    /// Like [`Self::push_pair`] with a union computed by the caller.
    pub(crate) fn push_pair_with_bounds(
        &mut self,
        left: ChildRef,
        right: ChildRef,
        bounds: Aabb3,
    ) -> ChildRef {
        self.internals.push(Pending::Pair(left, right));
        self.internal_boxes.push(bounds);
        ChildRef::Internal(self.internals.len() - 1)
    }

    pub(crate) fn bounds(&self, child: ChildRef) -> Aabb3 {
        match child {
            ChildRef::Leaf(i) => self.leaf_boxes[i],
            ChildRef::Internal(i) => self.internal_boxes[i],
        }
    }

    /// Concatenate leaves and internal nodes into a [`NodeStore`].
    pub(crate) fn finish(self, root: Option<ChildRef>) -> NodeStore {
        let leaves_end = self.leaves.len();
        let resolve = |c: ChildRef| match c {
            ChildRef::Leaf(i) => NodeIdx::new(i),
            ChildRef::Internal(i) => NodeIdx::new(leaves_end + i),
        };
        debug_assert!(
            match root {
                Some(ChildRef::Internal(i)) => i + 1 == self.internals.len(),
                Some(ChildRef::Leaf(_)) => self.internals.is_empty(),
                None => self.leaves.is_empty(),
            },
            "root must be the last node appended"
        );

        let mut nodes = Vec::with_capacity(leaves_end + self.internals.len());
        nodes.extend(
            self.leaves
                .iter()
                .map(|&(first, count)| Node::Leaf { first, count }),
        );
        nodes.extend(self.internals.iter().map(|p| match *p {
            Pending::Single(c) => Node::Single { child: resolve(c) },
            Pending::Pair(l, r) => Node::Pair {
                left: resolve(l),
                right: resolve(r),
            },
        }));
        let mut boxes = self.leaf_boxes;
        boxes.extend(self.internal_boxes);

        NodeStore {
            nodes,
            boxes,
            triangles: self.triangles,
            leaves_end,
            root: root.map(resolve),
        }
    }
}
