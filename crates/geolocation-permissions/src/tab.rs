use geoperm_core_types::{Origin, TabId};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::controller::{TabPermissionController, TabSnapshot};
use crate::events::{EventSink, PermissionEventKind};
use crate::responder::DeliveryTicket;
use crate::BrokerError;

/// Work item for a tab loop.
#[derive(Debug)]
pub(crate) enum TabCommand {
    Query(Origin),
    Provide {
        origin: Origin,
        allow: bool,
        remember: bool,
    },
    Reset,
    CancelPending(Origin),
    Deliver(DeliveryTicket),
    Snapshot(oneshot::Sender<TabSnapshot>),
    Flush(oneshot::Sender<()>),
    Close,
}

/// Cloneable handle to one tab's permission controller.
///
/// Calls only post to the tab loop and never block, so they are safe from
/// any thread. The loop ends after [`TabHandle::close`] or once every handle
/// is dropped.
#[derive(Clone, Debug)]
pub struct TabHandle {
    id: TabId,
    mailbox: mpsc::UnboundedSender<TabCommand>,
}

impl TabHandle {
    pub(crate) fn new(id: TabId, mailbox: mpsc::UnboundedSender<TabCommand>) -> Self {
        Self { id, mailbox }
    }

    pub fn id(&self) -> &TabId {
        &self.id
    }

    pub fn query_permission_state(&self, origin: impl Into<Origin>) {
        self.post(TabCommand::Query(origin.into()));
    }

    pub fn provide_permission_state(&self, origin: impl Into<Origin>, allow: bool, remember: bool) {
        self.post(TabCommand::Provide {
            origin: origin.into(),
            allow,
            remember,
        });
    }

    pub fn reset_temporary_permission_states(&self) {
        self.post(TabCommand::Reset);
    }

    /// Waits until every command posted before this call has been handled,
    /// including cached-decision deliveries they scheduled.
    pub async fn flush(&self) -> Result<(), BrokerError> {
        let (tx, rx) = oneshot::channel();
        self.mailbox
            .send(TabCommand::Flush(tx))
            .map_err(|_| BrokerError::TabClosed(self.id.clone()))?;
        rx.await.map_err(|_| BrokerError::TabClosed(self.id.clone()))
    }

    pub async fn snapshot(&self) -> Result<TabSnapshot, BrokerError> {
        let (tx, rx) = oneshot::channel();
        self.mailbox
            .send(TabCommand::Snapshot(tx))
            .map_err(|_| BrokerError::TabClosed(self.id.clone()))?;
        rx.await.map_err(|_| BrokerError::TabClosed(self.id.clone()))
    }

    pub fn close(&self) {
        self.post(TabCommand::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }

    fn post(&self, command: TabCommand) {
        if let Err(err) = self.mailbox.send(command) {
            warn!(
                target = "geolocation-permissions",
                tab = %self.id,
                command = ?err.0,
                "tab loop closed; dropping command"
            );
        }
    }
}

/// Drives one controller until its tab closes. Dropping the controller on
/// exit deregisters it.
pub(crate) async fn run_tab_loop(
    mut controller: TabPermissionController,
    mut inbox: mpsc::UnboundedReceiver<TabCommand>,
    mailbox: mpsc::WeakUnboundedSender<TabCommand>,
    events: EventSink,
) {
    let tab = controller.tab().clone();
    debug!(%tab, "tab loop started");

    while let Some(command) = inbox.recv().await {
        match command {
            TabCommand::Query(origin) => controller.query_permission_state(origin),
            TabCommand::Provide {
                origin,
                allow,
                remember,
            } => controller.provide_permission_state(&origin, allow, remember),
            TabCommand::Reset => controller.reset_temporary_permission_states(),
            TabCommand::CancelPending(origin) => controller.cancel_pending_requests(&origin),
            TabCommand::Deliver(ticket) => controller.fire_delivery(ticket),
            TabCommand::Snapshot(reply) => {
                let _ = reply.send(controller.snapshot());
            }
            TabCommand::Flush(reply) => {
                // A delivery turn is still queued behind us; go around once more.
                if controller.delivery_pending() {
                    if let Some(tx) = mailbox.upgrade() {
                        if let Err(err) = tx.send(TabCommand::Flush(reply)) {
                            if let TabCommand::Flush(reply) = err.0 {
                                let _ = reply.send(());
                            }
                        }
                        continue;
                    }
                }
                let _ = reply.send(());
            }
            TabCommand::Close => break,
        }
    }

    drop(controller);
    debug!(%tab, "tab loop stopped");
    events.publish(Some(&tab), PermissionEventKind::TabClosed);
}
