//! Presence publishing: foreground/background lifecycle and the heartbeat.

pub mod lifecycle;
pub mod publisher;

pub use lifecycle::AppLifecycle;
pub use publisher::{PresenceIdentity, PresencePublisher, PublisherState};
