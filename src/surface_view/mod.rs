//! The embeddable view and the components it is composed of.

pub mod geometry;
pub mod lifecycle;
pub mod navigation;
pub mod progress;
pub mod view;

pub use geometry::{Geometry, GeometrySynchronizer};
pub use lifecycle::{Epoch, HandleLifecycleManager, LifecycleState, PublishedHandle};
pub use navigation::{
    NavigationDecision, NavigationHandler, NavigationHandlerRef, NavigationInterceptorChain,
    NavigationVerdict,
};
pub use progress::{ProgressEventBroadcaster, ProgressListenerRef};
pub use view::{EmbeddableSurfaceView, ErrorHandlerRef};
