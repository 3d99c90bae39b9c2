use std::sync::Arc;

use dashmap::DashMap;
use geoperm_core_types::{Origin, TabId};
use tokio::sync::mpsc;
use tracing::debug;

use crate::metrics;
use crate::tab::TabCommand;

/// Live tab controllers of one service.
///
/// Entries hold weak mailboxes so the registry never keeps a tab loop alive.
#[derive(Debug, Default)]
pub struct ControllerRegistry {
    controllers: DashMap<TabId, mpsc::WeakUnboundedSender<TabCommand>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a controller. It stays registered until the returned guard drops.
    pub(crate) fn register(
        self: &Arc<Self>,
        tab: TabId,
        mailbox: mpsc::WeakUnboundedSender<TabCommand>,
    ) -> Registration {
        if self.controllers.insert(tab.clone(), mailbox).is_none() {
            metrics::tab_registered();
        }
        Registration {
            registry: Arc::clone(self),
            tab,
        }
    }

    fn deregister(&self, tab: &TabId) {
        if self.controllers.remove(tab).is_some() {
            metrics::tab_deregistered();
        }
    }

    /// Asks every live controller, the caller included, to resolve queued
    /// requests for `origin` from the remembered table. Never blocks; each
    /// controller handles it on its own loop. Returns how many were reached.
    pub fn broadcast_cancellation(&self, origin: &Origin) -> usize {
        let mut reached = 0;
        for entry in self.controllers.iter() {
            let Some(mailbox) = entry.value().upgrade() else {
                continue;
            };
            if mailbox
                .send(TabCommand::CancelPending(origin.clone()))
                .is_ok()
            {
                reached += 1;
            } else {
                debug!(tab = %entry.key(), %origin, "tab loop gone before cancellation");
            }
        }
        reached
    }

    pub(crate) fn close_all(&self) {
        for entry in self.controllers.iter() {
            if let Some(mailbox) = entry.value().upgrade() {
                let _ = mailbox.send(TabCommand::Close);
            }
        }
    }

    pub fn contains(&self, tab: &TabId) -> bool {
        self.controllers.contains_key(tab)
    }

    pub fn live_tabs(&self) -> Vec<TabId> {
        self.controllers
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

/// Membership token owned by a controller.
#[derive(Debug)]
pub(crate) struct Registration {
    registry: Arc<ControllerRegistry>,
    tab: TabId,
}

impl Registration {
    pub(crate) fn registry(&self) -> &Arc<ControllerRegistry> {
        &self.registry
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.deregister(&self.tab);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_follows_registration_lifetime() {
        let registry = Arc::new(ControllerRegistry::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let tab = TabId::new();

        let registration = registry.register(tab.clone(), tx.downgrade());
        assert!(registry.contains(&tab));
        assert_eq!(registry.len(), 1);

        drop(registration);
        assert!(registry.is_empty());
    }

    #[test]
    fn broadcast_reaches_every_open_mailbox() {
        let registry = Arc::new(ControllerRegistry::new());
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let (tx_gone, rx_gone) = mpsc::unbounded_channel::<TabCommand>();
        let _a = registry.register(TabId::new(), tx_a.downgrade());
        let _b = registry.register(TabId::new(), tx_b.downgrade());
        let _gone = registry.register(TabId::new(), tx_gone.downgrade());
        drop(tx_gone);
        drop(rx_gone);

        let origin = Origin::from("https://a.test");
        assert_eq!(registry.broadcast_cancellation(&origin), 2);

        for rx in [&mut rx_a, &mut rx_b] {
            match rx.try_recv() {
                Ok(TabCommand::CancelPending(got)) => assert_eq!(got, origin),
                other => panic!("unexpected command: {other:?}"),
            }
        }
    }
}
