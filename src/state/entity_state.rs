//! Per-entity retry state for the crawl scheduler
//!
//! The scheduler drives each entity through these states explicitly rather than
//! relying on caught errors for control flow.

use std::fmt;

/// Represents where an entity is in its bounded retry loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityState {
    // ===== Active States =====
    /// No attempt has been dispatched yet
    Pending,

    /// An attempt is running in its own task
    Running { trial: u32 },

    /// The last attempt failed; another may follow
    Failed { trial: u32, cause: String },

    // ===== Terminal States =====
    /// An attempt completed successfully
    Succeeded { trial: u32 },

    /// Every allowed attempt failed
    Exhausted { trials: u32 },

    /// Waiting on the entity was cancelled
    Interrupted { trial: u32 },
}

impl EntityState {
    /// Moves to the next state that does not require running an attempt
    ///
    /// `Pending` starts trial 1, `Failed` either starts the next trial or
    /// exhausts the budget. Every other state is returned unchanged.
    pub fn advance(self, max_trials: u32) -> Self {
        match self {
            Self::Pending => Self::Running { trial: 1 },
            Self::Failed { trial, .. } if trial < max_trials => Self::Running { trial: trial + 1 },
            Self::Failed { trial, .. } => Self::Exhausted { trials: trial },
            other => other,
        }
    }

    /// Returns true if no further attempt will be made for this entity
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::Exhausted { .. } | Self::Interrupted { .. }
        )
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Trial number associated with this state, if any
    pub fn trial(&self) -> Option<u32> {
        match self {
            Self::Pending => None,
            Self::Running { trial }
            | Self::Failed { trial, .. }
            | Self::Succeeded { trial }
            | Self::Interrupted { trial } => Some(*trial),
            Self::Exhausted { trials } => Some(*trials),
        }
    }

    /// Short lowercase name used in log lines
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running { .. } => "running",
            Self::Failed { .. } => "failed",
            Self::Succeeded { .. } => "succeeded",
            Self::Exhausted { .. } => "exhausted",
            Self::Interrupted { .. } => "interrupted",
        }
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { trial, cause } => write!(f, "failed (trial {}: {})", trial, cause),
            other => match other.trial() {
                Some(trial) => write!(f, "{} (trial {})", other.label(), trial),
                None => write!(f, "{}", other.label()),
            },
        }
    }
}
