use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use geoperm_core_types::{Origin, TabId};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::events::{DecisionSource, EventSink, PermissionEventKind};
use crate::host::PromptHost;
use crate::metrics;
use crate::notifier::FrameNotifier;
use crate::registry::Registration;
use crate::responder::{AsyncResponder, DeliveryTicket, Resolution};
use crate::store::PermissionStore;
use crate::tab::TabCommand;

/// Point-in-time view of a controller's transient state.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct TabSnapshot {
    pub tab: TabId,
    pub in_progress: Option<Origin>,
    pub queued: Vec<Origin>,
    pub temporary: BTreeMap<Origin, bool>,
    pub delivery_pending: bool,
}

/// Per-tab permission state machine.
///
/// At most one origin is awaiting an answer from the prompt host; other
/// origins asking in the meantime wait in a FIFO queue. Every method runs on
/// the owning tab's loop.
pub struct TabPermissionController {
    tab: TabId,
    store: Arc<PermissionStore>,
    registration: Registration,
    events: EventSink,
    prompt: Arc<dyn PromptHost>,
    notifier: FrameNotifier,
    mailbox: mpsc::WeakUnboundedSender<TabCommand>,
    temporary: HashMap<Origin, bool>,
    in_progress: Option<Origin>,
    queue: VecDeque<Origin>,
    responder: AsyncResponder,
    max_queue_len: Option<usize>,
}

pub(crate) struct ControllerParts {
    pub tab: TabId,
    pub store: Arc<PermissionStore>,
    pub registration: Registration,
    pub events: EventSink,
    pub prompt: Arc<dyn PromptHost>,
    pub notifier: FrameNotifier,
    pub mailbox: mpsc::WeakUnboundedSender<TabCommand>,
    pub max_queue_len: Option<usize>,
}

impl TabPermissionController {
    pub(crate) fn new(parts: ControllerParts) -> Self {
        Self {
            tab: parts.tab,
            store: parts.store,
            registration: parts.registration,
            events: parts.events,
            prompt: parts.prompt,
            notifier: parts.notifier,
            mailbox: parts.mailbox,
            temporary: HashMap::new(),
            in_progress: None,
            queue: VecDeque::new(),
            responder: AsyncResponder::new(),
            max_queue_len: parts.max_queue_len,
        }
    }

    pub fn tab(&self) -> &TabId {
        &self.tab
    }

    pub fn in_progress(&self) -> Option<&Origin> {
        self.in_progress.as_ref()
    }

    pub fn queued(&self) -> impl Iterator<Item = &Origin> {
        self.queue.iter()
    }

    pub fn temporary_decision(&self, origin: &Origin) -> Option<bool> {
        self.temporary.get(origin).copied()
    }

    pub fn delivery_pending(&self) -> bool {
        self.responder.is_armed()
    }

    pub fn snapshot(&self) -> TabSnapshot {
        TabSnapshot {
            tab: self.tab.clone(),
            in_progress: self.in_progress.clone(),
            queued: self.queue.iter().cloned().collect(),
            temporary: self
                .temporary
                .iter()
                .map(|(origin, allow)| (origin.clone(), *allow))
                .collect(),
            delivery_pending: self.responder.is_armed(),
        }
    }

    /// A document from `origin` wants to use geolocation.
    ///
    /// Known decisions (tab-scoped first, then remembered) are answered on the
    /// next loop turn. Otherwise the origin is prompted for, or queued when a
    /// prompt for another origin is already open.
    pub fn query_permission_state(&mut self, origin: Origin) {
        if let Some(resolution) = self.known_decision(&origin) {
            debug!(
                tab = %self.tab,
                %origin,
                allow = resolution.allow,
                source = resolution.source.as_str(),
                "known decision hit"
            );
            self.respond_async(resolution);
            return;
        }

        match &self.in_progress {
            None => self.start_prompt(origin),
            // The open prompt answers this document as well.
            Some(current) if *current == origin => {}
            Some(_) => self.enqueue(origin),
        }
    }

    /// Answer from the prompt host for the in-flight request.
    ///
    /// Answers for any other origin are stale (the tab was reset while the
    /// answer was travelling back) and are dropped.
    pub fn provide_permission_state(&mut self, origin: &Origin, allow: bool, remember: bool) {
        if self.in_progress.as_ref() != Some(origin) {
            debug!(
                tab = %self.tab,
                %origin,
                in_progress = ?self.in_progress,
                "discarding stale permission answer"
            );
            metrics::record_stale_answer();
            self.events.publish(
                Some(&self.tab),
                PermissionEventKind::StaleAnswerDiscarded {
                    origin: origin.clone(),
                },
            );
            return;
        }

        info!(
            target = "geolocation-permissions",
            tab = %self.tab,
            %origin,
            allow,
            remember,
            "permission decided"
        );
        self.deliver(Resolution::new(origin.clone(), allow, DecisionSource::User));
        self.record_permission_state(origin, allow, remember);

        if remember {
            self.registration.registry().broadcast_cancellation(origin);
        }

        self.promote_next();
    }

    /// Drops all tab-scoped state, e.g. on navigation.
    pub fn reset_temporary_permission_states(&mut self) {
        self.in_progress = None;
        self.queue.clear();
        self.temporary.clear();
        self.responder.cancel();
        self.prompt.hide_prompt();
        debug!(tab = %self.tab, "temporary permission state reset");
        self.events.publish(Some(&self.tab), PermissionEventKind::Reset);
    }

    /// Resolves a queued request for `origin` from the remembered table after
    /// some tab remembered a decision for it.
    ///
    /// If this tab already promoted `origin` into its open prompt before the
    /// cancellation arrived, the prompt is closed and answered the same way.
    pub fn cancel_pending_requests(&mut self, origin: &Origin) {
        if self.in_progress.as_ref() == Some(origin) {
            self.resolve_in_flight(origin);
            return;
        }

        let Some(index) = self.queue.iter().position(|queued| queued == origin) else {
            return;
        };

        let remembered = self.store.get(origin);
        debug_assert!(
            remembered.is_some(),
            "cancelling queued request for {origin} without a remembered decision"
        );
        let Some(allow) = remembered else {
            warn!(
                target = "geolocation-permissions",
                tab = %self.tab,
                %origin,
                "cancellation without a remembered decision; leaving request queued"
            );
            return;
        };

        self.deliver(Resolution::new(origin.clone(), allow, DecisionSource::CrossTab));
        self.queue.remove(index);
    }

    fn resolve_in_flight(&mut self, origin: &Origin) {
        // Cleared again before the cancellation got here; the prompt stays.
        let Some(allow) = self.store.get(origin) else {
            return;
        };
        debug!(tab = %self.tab, %origin, allow, "open prompt answered by another tab");
        self.prompt.hide_prompt();
        self.deliver(Resolution::new(origin.clone(), allow, DecisionSource::CrossTab));
        self.promote_next();
    }

    /// Runs a deferred delivery turn.
    pub(crate) fn fire_delivery(&mut self, ticket: DeliveryTicket) {
        if let Some(resolution) = self.responder.fire(ticket) {
            self.deliver(resolution);
        }
    }

    fn record_permission_state(&mut self, origin: &Origin, allow: bool, remember: bool) {
        if remember {
            self.store.set(origin.clone(), allow);
            // Otherwise clearing the remembered entry later would leave this
            // tab answering from its own table.
            self.temporary.remove(origin);
        } else {
            // Recorded even if another tab remembered a decision meanwhile.
            self.temporary.insert(origin.clone(), allow);
        }
    }

    fn known_decision(&self, origin: &Origin) -> Option<Resolution> {
        if let Some(allow) = self.temporary.get(origin).copied() {
            return Some(Resolution::new(origin.clone(), allow, DecisionSource::Temporary));
        }
        self.store
            .get(origin)
            .map(|allow| Resolution::new(origin.clone(), allow, DecisionSource::Permanent))
    }

    /// Moves the first queued origin that still needs an answer into the
    /// in-flight slot. Queued origins decided in the meantime (another tab
    /// remembered them before its cancellation reached this loop) are
    /// answered on the way.
    fn promote_next(&mut self) {
        while let Some(next) = self.queue.pop_front() {
            match self.known_decision(&next) {
                Some(resolution) => self.deliver(resolution),
                None => {
                    self.start_prompt(next);
                    return;
                }
            }
        }
        self.in_progress = None;
    }

    fn start_prompt(&mut self, origin: Origin) {
        metrics::record_prompt_shown();
        self.events.publish(
            Some(&self.tab),
            PermissionEventKind::PromptShown {
                origin: origin.clone(),
            },
        );
        self.prompt.show_prompt(&origin);
        self.in_progress = Some(origin);
    }

    fn enqueue(&mut self, origin: Origin) {
        if self.queue.contains(&origin) {
            return;
        }
        if let Some(limit) = self.max_queue_len {
            if self.queue.len() >= limit {
                warn!(
                    target = "geolocation-permissions",
                    tab = %self.tab,
                    %origin,
                    limit,
                    "permission queue full; dropping request"
                );
                self.events.publish(
                    Some(&self.tab),
                    PermissionEventKind::RequestDropped { origin },
                );
                return;
            }
        }
        metrics::record_request_queued();
        self.events.publish(
            Some(&self.tab),
            PermissionEventKind::RequestQueued {
                origin: origin.clone(),
            },
        );
        self.queue.push_back(origin);
    }

    fn respond_async(&mut self, resolution: Resolution) {
        let Some(ticket) = self.responder.schedule(resolution) else {
            return;
        };
        let posted = self
            .mailbox
            .upgrade()
            .map(|mailbox| mailbox.send(TabCommand::Deliver(ticket)).is_ok())
            .unwrap_or(false);
        if !posted {
            debug!(tab = %self.tab, "tab loop closing; cached decision not delivered");
            self.responder.cancel();
        }
    }

    fn deliver(&self, resolution: Resolution) {
        let Resolution {
            origin,
            allow,
            source,
        } = resolution;
        let reached = self.notifier.notify(&origin, allow);
        debug!(
            tab = %self.tab,
            %origin,
            allow,
            source = source.as_str(),
            reached,
            "decision delivered"
        );
        metrics::record_decision(source);
        self.events.publish(
            Some(&self.tab),
            PermissionEventKind::Resolved {
                origin,
                allow,
                source,
            },
        );
    }
}

impl std::fmt::Debug for TabPermissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabPermissionController")
            .field("tab", &self.tab)
            .field("in_progress", &self.in_progress)
            .field("queue", &self.queue)
            .field("temporary", &self.temporary)
            .finish_non_exhaustive()
    }
}
