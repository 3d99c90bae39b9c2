use geolocation_permissions::{GeolocationSink, Origin, PromptHost};
use parking_lot::Mutex;
use tracing::info;

/// Prompt host that records requests instead of showing UI.
#[derive(Debug)]
pub struct RecordingPrompt {
    tab: String,
    shown: Mutex<Vec<Origin>>,
    hidden: Mutex<usize>,
}

impl RecordingPrompt {
    pub fn new(tab: impl Into<String>) -> Self {
        Self {
            tab: tab.into(),
            shown: Mutex::new(Vec::new()),
            hidden: Mutex::new(0),
        }
    }

    pub fn shown(&self) -> Vec<Origin> {
        self.shown.lock().clone()
    }

    pub fn hidden(&self) -> usize {
        *self.hidden.lock()
    }
}

impl PromptHost for RecordingPrompt {
    fn show_prompt(&self, origin: &Origin) {
        info!(tab = %self.tab, %origin, "show geolocation prompt");
        self.shown.lock().push(origin.clone());
    }

    fn hide_prompt(&self) {
        info!(tab = %self.tab, "hide geolocation prompt");
        *self.hidden.lock() += 1;
    }
}

/// Geolocation object that remembers every decision it was given.
#[derive(Debug, Default)]
pub struct RecordingGeolocation {
    decisions: Mutex<Vec<bool>>,
}

impl RecordingGeolocation {
    pub fn decisions(&self) -> Vec<bool> {
        self.decisions.lock().clone()
    }
}

impl GeolocationSink for RecordingGeolocation {
    fn set_is_allowed(&self, allow: bool) {
        self.decisions.lock().push(allow);
    }
}
