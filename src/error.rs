use std::time::Duration;

use crate::surface_view::lifecycle::LifecycleState;

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceError {
    /// A foreign operation reported a non-success status or panicked.
    ForeignCallFailed {
        operation: &'static str,
        detail: String,
    },
    /// `create()` handed back the sentinel handle.
    CreateReturnedNull,
    /// The operation is not valid in the current lifecycle state.
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },
    /// A progress listener, navigation handler or error handler panicked.
    ListenerPanicked {
        listener: &'static str,
        detail: String,
    },
    DispatcherShutDown,
    /// A task posted with a reply channel was dropped before it answered.
    TaskDropped,
    DispatchTimedOut {
        waited: Duration,
    },
    NotOnUiThread,
}

impl std::fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceError::ForeignCallFailed { operation, detail } => {
                write!(f, "Native surface call `{}` failed: {}", operation, detail)
            }
            SurfaceError::CreateReturnedNull => {
                write!(f, "Native surface create returned a null handle.")
            }
            SurfaceError::InvalidState { operation, state } => {
                write!(f, "`{}` is not valid while the surface is {:?}.", operation, state)
            }
            SurfaceError::ListenerPanicked { listener, detail } => {
                write!(f, "A {} panicked: {}", listener, detail)
            }
            SurfaceError::DispatcherShutDown => {
                write!(f, "The UI dispatcher has been shut down.")
            }
            SurfaceError::TaskDropped => {
                write!(f, "A UI task was dropped before it produced a result.")
            }
            SurfaceError::DispatchTimedOut { waited } => {
                write!(f, "The UI thread did not answer within {:?}.", waited)
            }
            SurfaceError::NotOnUiThread => {
                write!(f, "The call must be made on the bound UI thread.")
            }
        }
    }
}

impl std::error::Error for SurfaceError {}

/// Renders a caught panic payload for logs and error reports.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
