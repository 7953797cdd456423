// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reconciler configuration.

/// How thoroughly environment parent links are validated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EnvironmentCheck {
    /// Only reject a storage linking to itself.
    #[default]
    SelfLink,
    /// Walk the whole ancestor chain on every link to reject cycles.
    FullChain,
}

/// Tunables for a [`Reconciler`](crate::reconciler::Reconciler).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Number of node slots reserved up front.
    pub node_capacity: usize,
    /// Validation applied when linking environment storages.
    pub environment_check: EnvironmentCheck,
}

impl ReconcilerConfig {
    /// Default configuration: no preallocation, self-link checks only.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            node_capacity: 0,
            environment_check: EnvironmentCheck::SelfLink,
        }
    }

    /// Configuration that validates every environment link against the
    /// full ancestor chain.
    #[must_use]
    pub const fn checked() -> Self {
        Self {
            node_capacity: 0,
            environment_check: EnvironmentCheck::FullChain,
        }
    }

    /// Returns a copy with `node_capacity` slots reserved.
    #[must_use]
    pub const fn with_node_capacity(mut self, node_capacity: usize) -> Self {
        self.node_capacity = node_capacity;
        self
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self::new()
    }
}
