use std::sync::Arc;

use tracing::{debug, warn};

use chatterbox_net::EventSink;
use chatterbox_shared::protocol::Event;
use chatterbox_shared::topics::Topic;

/// Fire-and-forget publishing on top of an [`EventSink`].
///
/// The store mutation that precedes a publish is the source of truth, so a
/// failed publish is logged and otherwise ignored. Subscribers that miss it
/// catch up on their next full fetch.
#[derive(Clone)]
pub struct Fanout {
    sink: Arc<dyn EventSink>,
}

impl Fanout {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    pub fn publish(&self, topic: Topic, event: &Event) {
        match self.sink.publish(&topic, event) {
            Ok(delivered) => {
                debug!(topic = %topic, event = event.name(), delivered, "event fanned out")
            }
            Err(e) => {
                warn!(topic = %topic, event = event.name(), error = %e, "event publish failed")
            }
        }
    }
}
