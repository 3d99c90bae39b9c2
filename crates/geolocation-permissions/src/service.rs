use std::collections::BTreeSet;
use std::sync::Arc;

use geoperm_core_types::{Origin, TabId};
use tokio::sync::{broadcast, mpsc};
use tracing::info;

use crate::config::BrokerConfig;
use crate::controller::{ControllerParts, TabPermissionController};
use crate::events::{EventSink, PermissionEvent, PermissionEventKind};
use crate::host::{DocumentTree, PromptHost};
use crate::notifier::FrameNotifier;
use crate::registry::ControllerRegistry;
use crate::store::PermissionStore;
use crate::tab::{run_tab_loop, TabHandle};

/// Process-scoped owner of the remembered table and the live tab set.
///
/// Build one per browser process and hand the `Arc` to whatever opens tabs.
pub struct PermissionService {
    config: BrokerConfig,
    store: Arc<PermissionStore>,
    registry: Arc<ControllerRegistry>,
    events: EventSink,
}

impl PermissionService {
    pub fn new(config: BrokerConfig) -> Arc<Self> {
        let events = EventSink::new(config.event_capacity);
        Arc::new(Self {
            config,
            store: Arc::new(PermissionStore::new()),
            registry: Arc::new(ControllerRegistry::new()),
            events,
        })
    }

    pub fn with_defaults() -> Arc<Self> {
        Self::new(BrokerConfig::default())
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<PermissionStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ControllerRegistry> {
        &self.registry
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PermissionEvent> {
        self.events.subscribe()
    }

    /// Creates a controller for a new tab and starts its loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_tab(
        &self,
        prompt: Arc<dyn PromptHost>,
        documents: Arc<dyn DocumentTree>,
    ) -> TabHandle {
        let tab = TabId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = TabPermissionController::new(ControllerParts {
            tab: tab.clone(),
            store: Arc::clone(&self.store),
            registration: self.registry.register(tab.clone(), tx.downgrade()),
            events: self.events.clone(),
            prompt,
            notifier: FrameNotifier::new(documents),
            mailbox: tx.downgrade(),
            max_queue_len: self.config.max_queue_len,
        });

        info!(target = "geolocation-permissions", %tab, "tab opened");
        self.events.publish(Some(&tab), PermissionEventKind::TabOpened);
        tokio::spawn(run_tab_loop(
            controller,
            rx,
            tx.downgrade(),
            self.events.clone(),
        ));
        TabHandle::new(tab, tx)
    }

    pub fn list_origins(&self) -> BTreeSet<Origin> {
        self.store.list_origins()
    }

    pub fn get_allowed(&self, origin: &Origin) -> bool {
        self.store.get_allowed(origin)
    }

    pub fn clear(&self, origin: &Origin) {
        if self.store.clear(origin) {
            info!(target = "geolocation-permissions", %origin, "remembered decision cleared");
            self.events.publish(
                None,
                PermissionEventKind::RememberedCleared {
                    origin: Some(origin.clone()),
                },
            );
        }
    }

    pub fn clear_all(&self) {
        self.store.clear_all();
        info!(target = "geolocation-permissions", "all remembered decisions cleared");
        self.events.publish(None, PermissionEventKind::RememberedCleared { origin: None });
    }

    pub fn live_tabs(&self) -> Vec<TabId> {
        self.registry.live_tabs()
    }

    /// Asks every open tab loop to stop. Remembered decisions are kept.
    pub fn shutdown(&self) {
        self.registry.close_all();
    }
}

impl std::fmt::Debug for PermissionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionService")
            .field("config", &self.config)
            .field("remembered", &self.store.len())
            .field("live_tabs", &self.registry.len())
            .finish()
    }
}
