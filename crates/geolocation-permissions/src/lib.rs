//! Geolocation permission broker.
//!
//! Arbitrates which origins of a tab may use geolocation: one prompt in flight
//! per tab, a FIFO queue behind it, tab-scoped and remembered decisions, and
//! cross-tab resolution of queued requests once a decision is remembered.

pub mod config;
mod controller;
mod events;
mod frames;
mod host;
pub mod metrics;
mod notifier;
mod registry;
mod responder;
mod service;
mod store;
mod tab;

pub use crate::config::{BrokerConfig, ConfigError};
pub use controller::{TabPermissionController, TabSnapshot};
pub use events::{DecisionSource, PermissionEvent, PermissionEventKind};
pub use frames::InMemoryDocumentTree;
pub use geoperm_core_types::{FrameId, Origin, TabId};
pub use host::{DocumentTree, GeolocationSink, PromptHost};
pub use notifier::FrameNotifier;
pub use registry::ControllerRegistry;
pub use responder::{AsyncResponder, DeliveryTicket, Resolution};
pub use service::PermissionService;
pub use store::PermissionStore;
pub use tab::TabHandle;

use geoperm_core_types::GeoError;
use thiserror::Error;

/// Errors from the tab runtime plumbing. State-machine operations themselves
/// never fail.
#[derive(Clone, Debug, Error)]
pub enum BrokerError {
    #[error("tab {0} is closed")]
    TabClosed(TabId),
}

impl From<BrokerError> for GeoError {
    fn from(value: BrokerError) -> Self {
        GeoError::new(value.to_string())
    }
}
