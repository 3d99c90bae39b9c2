use std::sync::Arc;

use geoperm_core_types::Origin;
use tracing::trace;

use crate::host::DocumentTree;

/// Fans a decision out to every document of a tab loaded from one origin.
///
/// The requesting frame is not tracked: frames can be replaced or removed
/// while a prompt is open, so every document from the origin is called back.
#[derive(Clone)]
pub struct FrameNotifier {
    tree: Arc<dyn DocumentTree>,
}

impl FrameNotifier {
    pub fn new(tree: Arc<dyn DocumentTree>) -> Self {
        Self { tree }
    }

    /// Returns how many geolocation objects received the decision.
    pub fn notify(&self, origin: &Origin, allow: bool) -> usize {
        let mut delivered = 0;
        for frame in self.tree.frames() {
            if self.tree.origin_of(&frame).as_ref() != Some(origin) {
                continue;
            }
            match self.tree.geolocation(&frame) {
                Some(sink) => {
                    sink.set_is_allowed(allow);
                    delivered += 1;
                }
                None => trace!(%frame, %origin, "document has no geolocation object"),
            }
        }
        delivered
    }
}

impl std::fmt::Debug for FrameNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameNotifier").finish_non_exhaustive()
    }
}
