//! Interfaces the embedding browser implements for the broker.

use std::sync::Arc;

use geoperm_core_types::{FrameId, Origin};

/// Prompt surface owned by the browser UI.
///
/// Both calls are fire-and-forget. The answer comes back later through
/// [`crate::TabHandle::provide_permission_state`].
pub trait PromptHost: Send + Sync {
    fn show_prompt(&self, origin: &Origin);
    fn hide_prompt(&self);
}

/// Geolocation capability object of one document.
pub trait GeolocationSink: Send + Sync {
    fn set_is_allowed(&self, allow: bool);
}

/// Read-only view over the documents currently loaded in a tab.
pub trait DocumentTree: Send + Sync {
    /// Frames in traversal order, main frame first.
    fn frames(&self) -> Vec<FrameId>;

    /// Origin of the document currently loaded in `frame`.
    fn origin_of(&self, frame: &FrameId) -> Option<Origin>;

    /// Geolocation object of the document in `frame`, if it still has one.
    /// Documents that navigated away or were torn down return `None`.
    fn geolocation(&self, frame: &FrameId) -> Option<Arc<dyn GeolocationSink>>;
}
