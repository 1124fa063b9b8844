//! Worker lifecycle states and the transitions between them.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::WorkerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Constructed, nothing run yet
    #[default]
    Parsed,
    Installing,
    /// Installed and waiting to take over
    Installed,
    Activating,
    /// In control; requests are intercepted
    Activated,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
        }
    }

    /// Move to `next`, or fail if the lifecycle does not allow it.
    pub(crate) fn transition(&mut self, next: WorkerState) -> Result<(), WorkerError> {
        if !is_valid_transition(*self, next) {
            return Err(WorkerError::InvalidStateTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_valid_transition(from: WorkerState, to: WorkerState) -> bool {
    use WorkerState::*;

    matches!(
        (from, to),
        (Parsed, Installing)
            | (Installing, Installed)
            | (Installed, Activating)
            | (Activating, Activated)
    )
}
