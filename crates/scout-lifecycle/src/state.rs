// SPDX-License-Identifier: MIT OR Apache-2.0
//! The lifecycle state machine, spec §4.E.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a [`crate::Lifecycle`].
///
/// ```text
///   Uninitialized -> Connecting -> Ready -> ShuttingDown -> Closed
///                         |
///                         +--> Failed (terminal unless reset)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// `setup()` has not been called.
    Uninitialized,
    /// `setup()` is in progress: spawning/probing, connecting, registering.
    Connecting,
    /// Connected and registered; tracing may flow.
    Ready,
    /// `shutdown()` is in progress.
    ShuttingDown,
    /// `shutdown()` has completed.
    Closed,
    /// `setup()` failed. Terminal: a new [`crate::Lifecycle`] is required to
    /// retry.
    Failed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::ShuttingDown => "shutting_down",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl LifecycleState {
    fn to_tag(self) -> u8 {
        match self {
            Self::Uninitialized => 0,
            Self::Connecting => 1,
            Self::Ready => 2,
            Self::ShuttingDown => 3,
            Self::Closed => 4,
            Self::Failed => 5,
        }
    }

    fn from_tag(tag: u8) -> Self {
        match tag {
            0 => Self::Uninitialized,
            1 => Self::Connecting,
            2 => Self::Ready,
            3 => Self::ShuttingDown,
            4 => Self::Closed,
            _ => Self::Failed,
        }
    }
}

/// Lock-free holder for the current [`LifecycleState`].
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(initial: LifecycleState) -> Self {
        Self(AtomicU8::new(initial.to_tag()))
    }

    pub(crate) fn load(&self) -> LifecycleState {
        LifecycleState::from_tag(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn store(&self, state: LifecycleState) {
        self.0.store(state.to_tag(), Ordering::SeqCst);
    }
}
