//! Script lifecycle states.

use std::fmt;

use fiberlink_sys::{
    FL_FIBER_CREATED, FL_FIBER_RESUMED, FL_FIBER_RUNNING, FL_FIBER_SUSPENDED,
    FL_FIBER_TERMINATED, FL_FIBER_TRANSFERRED, FlFiberState,
};
use tracing::warn;

/// Lifecycle state of a script.
///
/// The first six states mirror the native fiber; `Disposed` only exists on
/// the bridge side once the native resource has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptStatus {
    Created,
    Running,
    Resumed,
    Suspended,
    Transferred,
    Terminated,
    Disposed,
}

impl ScriptStatus {
    /// Map a native fiber ordinal to a status.
    ///
    /// Ordinals outside the documented range are reported as `Terminated`.
    pub fn from_ordinal(ordinal: FlFiberState) -> Self {
        match ordinal {
            FL_FIBER_CREATED => Self::Created,
            FL_FIBER_RUNNING => Self::Running,
            FL_FIBER_RESUMED => Self::Resumed,
            FL_FIBER_SUSPENDED => Self::Suspended,
            FL_FIBER_TRANSFERRED => Self::Transferred,
            FL_FIBER_TERMINATED => Self::Terminated,
            other => {
                warn!(ordinal = other, "Unknown native fiber state, treating as terminated");
                Self::Terminated
            }
        }
    }

    /// Whether Start is allowed from this state
    pub fn is_startable(self) -> bool {
        matches!(self, Self::Created | Self::Terminated)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Resumed => "resumed",
            Self::Suspended => "suspended",
            Self::Transferred => "transferred",
            Self::Terminated => "terminated",
            Self::Disposed => "disposed",
        }
    }
}

impl fmt::Display for ScriptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
