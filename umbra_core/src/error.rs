// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recoverable errors surfaced by reconciliation and traversal.
//!
//! Consistency violations (a stale handle, a cyclic environment link, state
//! touched outside a context, two siblings with the same key) are programmer
//! errors and panic instead.

use alloc::boxed::Box;
use alloc::string::String;

/// Errors returned by [`Reconciler`](crate::reconciler::Reconciler) passes
/// and by element callbacks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required environment value was not found on the node or any
    /// ancestor.
    #[error("missing environment value for `{key}`")]
    MissingEnvironment {
        /// Name of the environment key.
        key: &'static str,
    },
    /// A leaf behavior failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreation(String),
    /// Any other error raised by a leaf behavior.
    #[error("behavior failed: {0}")]
    Behavior(Box<dyn core::error::Error + Send + Sync>),
}

impl Error {
    /// Wraps a behavior error.
    pub fn behavior<E>(err: E) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        Self::Behavior(Box::new(err))
    }

    /// Creates a [`ResourceCreation`](Self::ResourceCreation) error.
    pub fn resource(message: impl Into<String>) -> Self {
        Self::ResourceCreation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[derive(Debug)]
    struct DeviceLost;

    impl core::fmt::Display for DeviceLost {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            f.write_str("device lost")
        }
    }

    impl core::error::Error for DeviceLost {}

    #[test]
    fn messages() {
        let missing = Error::MissingEnvironment { key: "Device" };
        assert_eq!(missing.to_string(), "missing environment value for `Device`");
        assert_eq!(
            Error::resource("pipeline").to_string(),
            "resource creation failed: pipeline"
        );
        assert_eq!(
            Error::behavior(DeviceLost).to_string(),
            "behavior failed: device lost"
        );
    }
}
