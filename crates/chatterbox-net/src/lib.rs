// Live event fan-out: topic publishing and scoped subscriptions.

pub mod relay;
pub mod subscription;

pub use relay::{EventSink, LocalRelay, RelayError};
pub use subscription::{Inbox, Subscription};
