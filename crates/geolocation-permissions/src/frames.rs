use std::sync::{Arc, Weak};

use geoperm_core_types::{FrameId, Origin};
use parking_lot::RwLock;

use crate::host::{DocumentTree, GeolocationSink};

struct FrameEntry {
    id: FrameId,
    origin: Origin,
    geolocation: Option<Weak<dyn GeolocationSink>>,
}

/// Flat in-memory document tree for embedders without their own frame model.
///
/// Geolocation objects are held weakly; the document owns them.
#[derive(Default)]
pub struct InMemoryDocumentTree {
    frames: RwLock<Vec<FrameEntry>>,
}

impl InMemoryDocumentTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a frame in traversal order and returns its id.
    pub fn attach(&self, origin: impl Into<Origin>) -> FrameId {
        let id = FrameId::new();
        self.frames.write().push(FrameEntry {
            id: id.clone(),
            origin: origin.into(),
            geolocation: None,
        });
        id
    }

    pub fn detach(&self, frame: &FrameId) -> bool {
        let mut frames = self.frames.write();
        let before = frames.len();
        frames.retain(|entry| &entry.id != frame);
        frames.len() != before
    }

    /// Loads a new document into `frame`. The old geolocation object goes away.
    pub fn navigate(&self, frame: &FrameId, origin: impl Into<Origin>) -> bool {
        let mut frames = self.frames.write();
        match frames.iter_mut().find(|entry| &entry.id == frame) {
            Some(entry) => {
                entry.origin = origin.into();
                entry.geolocation = None;
                true
            }
            None => false,
        }
    }

    pub fn set_geolocation(&self, frame: &FrameId, sink: &Arc<dyn GeolocationSink>) -> bool {
        let mut frames = self.frames.write();
        match frames.iter_mut().find(|entry| &entry.id == frame) {
            Some(entry) => {
                entry.geolocation = Some(Arc::downgrade(sink));
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.read().is_empty()
    }
}

impl DocumentTree for InMemoryDocumentTree {
    fn frames(&self) -> Vec<FrameId> {
        self.frames
            .read()
            .iter()
            .map(|entry| entry.id.clone())
            .collect()
    }

    fn origin_of(&self, frame: &FrameId) -> Option<Origin> {
        self.frames
            .read()
            .iter()
            .find(|entry| &entry.id == frame)
            .map(|entry| entry.origin.clone())
    }

    fn geolocation(&self, frame: &FrameId) -> Option<Arc<dyn GeolocationSink>> {
        self.frames
            .read()
            .iter()
            .find(|entry| &entry.id == frame)
            .and_then(|entry| entry.geolocation.as_ref())
            .and_then(Weak::upgrade)
    }
}

impl std::fmt::Debug for InMemoryDocumentTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDocumentTree")
            .field("frames", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl GeolocationSink for Noop {
        fn set_is_allowed(&self, _allow: bool) {}
    }

    #[test]
    fn navigation_drops_geolocation_object() {
        let tree = InMemoryDocumentTree::new();
        let frame = tree.attach("https://a.test");
        let sink: Arc<dyn GeolocationSink> = Arc::new(Noop);
        assert!(tree.set_geolocation(&frame, &sink));
        assert!(tree.geolocation(&frame).is_some());

        assert!(tree.navigate(&frame, "https://b.test"));
        assert!(tree.geolocation(&frame).is_none());
        assert_eq!(tree.origin_of(&frame), Some(Origin::from("https://b.test")));
    }

    #[test]
    fn detach_removes_frame_from_traversal() {
        let tree = InMemoryDocumentTree::new();
        let main = tree.attach("https://a.test");
        let child = tree.attach("https://b.test");
        assert_eq!(tree.frames(), vec![main.clone(), child.clone()]);

        assert!(tree.detach(&child));
        assert!(!tree.detach(&child));
        assert_eq!(tree.frames(), vec![main]);
    }
}
