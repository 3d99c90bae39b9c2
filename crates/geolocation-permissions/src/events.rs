use std::time::SystemTime;

use geoperm_core_types::{Origin, TabId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

/// Where a delivered decision came from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// Tab-scoped table filled by a non-remembered answer.
    Temporary,
    /// Process-wide remembered table.
    Permanent,
    /// Answer supplied by the prompt host for the in-flight request.
    User,
    /// Queued request resolved because another tab remembered a decision.
    CrossTab,
}

impl DecisionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionSource::Temporary => "temporary",
            DecisionSource::Permanent => "permanent",
            DecisionSource::User => "user",
            DecisionSource::CrossTab => "cross_tab",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PermissionEventKind {
    TabOpened,
    TabClosed,
    PromptShown {
        origin: Origin,
    },
    RequestQueued {
        origin: Origin,
    },
    /// Queue limit reached; the request was not recorded.
    RequestDropped {
        origin: Origin,
    },
    Resolved {
        origin: Origin,
        allow: bool,
        source: DecisionSource,
    },
    StaleAnswerDiscarded {
        origin: Origin,
    },
    Reset,
    /// `origin` is `None` when every remembered decision was cleared.
    RememberedCleared {
        origin: Option<Origin>,
    },
}

/// Event emitted on every observable broker transition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PermissionEvent {
    pub tab: Option<TabId>,
    #[serde(flatten)]
    pub kind: PermissionEventKind,
    pub timestamp: SystemTime,
}

#[derive(Clone, Debug)]
pub(crate) struct EventSink {
    sender: broadcast::Sender<PermissionEvent>,
}

impl EventSink {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _rx) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<PermissionEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn publish(&self, tab: Option<&TabId>, kind: PermissionEventKind) {
        if self.sender.receiver_count() == 0 {
            return;
        }
        let event = PermissionEvent {
            tab: tab.cloned(),
            kind,
            timestamp: SystemTime::now(),
        };
        if let Err(err) = self.sender.send(event) {
            warn!(
                target = "geolocation-permissions",
                "failed to publish permission event: {err}"
            );
        }
    }
}
