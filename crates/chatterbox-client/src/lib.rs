//! Viewer side of ChatterBox: the per-session unseen-activity aggregator and
//! the topic subscriptions that feed it.

pub mod activity;
pub mod events;
pub mod session;

pub use activity::{RequestKind, UnseenActivity, View};
pub use events::Outcome;
pub use session::ViewerSession;
