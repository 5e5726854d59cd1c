// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Build configuration.

use crate::error::{Result, TreeError};

/// How the tree is constructed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum BuildStrategy {
    /// Recursive split at the midpoint of the centroid interval, cycling X → Y → Z.
    #[default]
    TopDownMidpoint,
    /// Recursive split at the median centroid, cycling X → Y → Z.
    TopDownMedian,
    /// Seed leaves from vertex one-rings, then pair boxes layer by layer.
    BottomUpFromOneRings,
}

/// How [`BuildStrategy::BottomUpFromOneRings`] pairs boxes within a layer.
///
/// Every policy first sorts the layer by box minimum along X.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClusterPolicy {
    /// Pair neighbours in sorted order.
    Fastest,
    /// Each unpaired box takes the partner within a small lookahead window
    /// whose union has the least volume.
    #[default]
    FastVolumeMetric,
    /// Greedily take the globally smallest-volume pairs of the whole layer.
    MinimalVolume,
}

/// Options for [`MeshAabbTree::build`](crate::MeshAabbTree::build).
///
/// ```
/// use understory_mesh_index::{BuildOptions, BuildStrategy, ClusterPolicy};
///
/// let opts = BuildOptions::default()
///     .with_strategy(BuildStrategy::BottomUpFromOneRings)
///     .with_cluster_policy(ClusterPolicy::MinimalVolume);
/// assert!(opts.validate().is_ok());
/// assert_eq!(opts.leaf_max_tri_count, 4);
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BuildOptions {
    /// Construction strategy.
    pub strategy: BuildStrategy,
    /// Pairing policy for bottom-up builds.
    pub cluster_policy: ClusterPolicy,
    /// Top-down recursion emits a leaf once fewer than this many triangles remain.
    pub leaf_max_tri_count: usize,
    /// Window size for [`ClusterPolicy::FastVolumeMetric`].
    pub cluster_lookahead: usize,
    /// Layers larger than this use [`ClusterPolicy::FastVolumeMetric`] even when
    /// [`ClusterPolicy::MinimalVolume`] is selected, since the full pair table
    /// grows quadratically.
    pub minimal_volume_layer_limit: usize,
    /// Leaf boxes are grown by this amount on every side.
    pub box_epsilon: f64,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            strategy: BuildStrategy::default(),
            cluster_policy: ClusterPolicy::default(),
            leaf_max_tri_count: 4,
            cluster_lookahead: 10,
            minimal_volume_layer_limit: 2048,
            box_epsilon: 50.0 * f64::EPSILON,
        }
    }
}

impl BuildOptions {
    /// Default options with the given strategy.
    pub fn new(strategy: BuildStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Set the construction strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: BuildStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the bottom-up pairing policy.
    #[must_use]
    pub fn with_cluster_policy(mut self, policy: ClusterPolicy) -> Self {
        self.cluster_policy = policy;
        self
    }

    /// Set the top-down leaf size threshold.
    #[must_use]
    pub fn with_leaf_max_tri_count(mut self, count: usize) -> Self {
        self.leaf_max_tri_count = count;
        self
    }

    /// Set the lookahead window for [`ClusterPolicy::FastVolumeMetric`].
    #[must_use]
    pub fn with_cluster_lookahead(mut self, lookahead: usize) -> Self {
        self.cluster_lookahead = lookahead;
        self
    }

    /// Set the layer width above which [`ClusterPolicy::MinimalVolume`]
    /// falls back to lookahead pairing.
    #[must_use]
    pub fn with_minimal_volume_layer_limit(mut self, limit: usize) -> Self {
        self.minimal_volume_layer_limit = limit;
        self
    }

    /// Set the leaf box inflation.
    #[must_use]
    pub fn with_box_epsilon(mut self, eps: f64) -> Self {
        self.box_epsilon = eps;
        self
    }

    /// Check that the options describe a buildable tree.
    pub fn validate(&self) -> Result<()> {
        if self.leaf_max_tri_count < 2 {
            return Err(TreeError::InvalidOptions {
                message: "leaf_max_tri_count must be at least 2",
            });
        }
        if self.cluster_lookahead == 0 {
            return Err(TreeError::InvalidOptions {
                message: "cluster_lookahead must be at least 1",
            });
        }
        if !(self.box_epsilon >= 0.0 && self.box_epsilon.is_finite()) {
            return Err(TreeError::InvalidOptions {
                message: "box_epsilon must be finite and non-negative",
            });
        }
        Ok(())
    }
}
