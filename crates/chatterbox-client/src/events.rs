use serde::Serialize;

use chatterbox_shared::protocol::ChatPreview;
use chatterbox_shared::types::Message;

/// What the UI layer should do after a live event has been applied to the
/// viewer's [`UnseenActivity`](crate::activity::UnseenActivity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Outcome {
    /// An unseen counter went up; re-render the badge.
    Counted,

    /// A direct message arrived for a chat that is not open. The counter
    /// went up and the preview should be shown as a toast.
    Notify(ChatPreview),

    /// The message was prepended to the open channel's history.
    Displayed(Message),

    /// The friend or group roster changed.
    RosterUpdated,

    /// The viewer is already looking at the page the event belongs to.
    Suppressed,

    /// Nothing to do: own activity, duplicates, or events this view does
    /// not track.
    Ignored,
}

impl Outcome {
    pub fn is_counted(&self) -> bool {
        matches!(self, Outcome::Counted | Outcome::Notify(_))
    }
}
