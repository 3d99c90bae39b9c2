use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::SystemTime;

use geolocation_permissions::{
    BrokerConfig, DocumentTree, FrameId, GeolocationSink, InMemoryDocumentTree, Origin,
    PermissionEvent, PermissionEventKind, PermissionService, TabHandle, TabId, TabSnapshot,
};
use humantime::format_rfc3339_millis;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

use super::host::{RecordingGeolocation, RecordingPrompt};
use super::model::{Scenario, Step};
use super::ScenarioError;

#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    pub name: Option<String>,
    pub events: Vec<EventRecord>,
    pub tabs: Vec<TabReport>,
    pub remembered: BTreeMap<Origin, bool>,
}

/// Permission event with the tab id replaced by its scenario name.
#[derive(Debug, Serialize)]
pub struct EventRecord {
    pub tab: Option<String>,
    #[serde(flatten)]
    pub kind: PermissionEventKind,
    pub at: String,
}

#[derive(Debug, Serialize)]
pub struct TabReport {
    pub name: String,
    pub closed: bool,
    pub prompts: Vec<Origin>,
    pub hide_prompts: usize,
    pub documents: Vec<DocumentReport>,
    pub state: Option<TabSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct DocumentReport {
    pub name: String,
    pub origin: Origin,
    pub decisions: Vec<bool>,
}

struct Document {
    name: String,
    frame: FrameId,
    origin: Origin,
    geolocation: Arc<RecordingGeolocation>,
    // Owned here the way a document owns its geolocation object; the tree
    // only holds it weakly.
    sink: Option<Arc<dyn GeolocationSink>>,
}

struct ScenarioTab {
    name: String,
    handle: TabHandle,
    prompt: Arc<RecordingPrompt>,
    tree: Arc<InMemoryDocumentTree>,
    documents: Vec<Document>,
    closed: bool,
}

impl ScenarioTab {
    fn open(service: &PermissionService, tab: &super::TabSpec) -> Self {
        let tree = Arc::new(InMemoryDocumentTree::new());
        let documents = tab
            .documents
            .iter()
            .map(|doc| {
                let frame = tree.attach(doc.origin.clone());
                let geolocation = Arc::new(RecordingGeolocation::default());
                let sink = doc.geolocation.then(|| {
                    let sink: Arc<dyn GeolocationSink> = geolocation.clone();
                    tree.set_geolocation(&frame, &sink);
                    sink
                });
                Document {
                    name: doc.name.clone(),
                    frame,
                    origin: doc.origin.clone(),
                    geolocation,
                    sink,
                }
            })
            .collect();
        let prompt = Arc::new(RecordingPrompt::new(tab.name.clone()));
        let documents_view: Arc<dyn DocumentTree> = tree.clone();
        let handle = service.spawn_tab(prompt.clone(), documents_view);
        Self {
            name: tab.name.clone(),
            handle,
            prompt,
            tree,
            documents,
            closed: false,
        }
    }

    /// The first document is the tab's main frame; navigating it resets the
    /// tab's transient permission state.
    fn navigate(&mut self, document: &str, origin: &Origin) {
        let Some(position) = self.documents.iter().position(|doc| doc.name == document) else {
            return;
        };
        let doc = &mut self.documents[position];
        self.tree.navigate(&doc.frame, origin.clone());
        doc.origin = origin.clone();
        drop(doc.sink.take());
        if position == 0 {
            self.handle.reset_temporary_permission_states();
        }
    }

    async fn report(&self) -> TabReport {
        let state = if self.closed {
            None
        } else {
            self.handle.snapshot().await.ok()
        };
        TabReport {
            name: self.name.clone(),
            closed: self.closed,
            prompts: self.prompt.shown(),
            hide_prompts: self.prompt.hidden(),
            documents: self
                .documents
                .iter()
                .map(|doc| DocumentReport {
                    name: doc.name.clone(),
                    origin: doc.origin.clone(),
                    decisions: doc.geolocation.decisions(),
                })
                .collect(),
            state,
        }
    }
}

/// Replays `scenario` against a fresh service and collects what every tab,
/// document and the event stream observed.
pub async fn run_scenario(
    scenario: &Scenario,
    config: BrokerConfig,
) -> Result<ScenarioReport, ScenarioError> {
    scenario.validate()?;

    let service = PermissionService::new(config);
    let mut rx = service.subscribe();
    let mut raw_events = Vec::new();

    for (origin, allow) in &scenario.remembered {
        service.store().set(origin.clone(), *allow);
    }

    let mut tabs: Vec<ScenarioTab> = scenario
        .tabs
        .iter()
        .map(|tab| ScenarioTab::open(&service, tab))
        .collect();
    let index: HashMap<String, usize> = tabs
        .iter()
        .enumerate()
        .map(|(idx, tab)| (tab.name.clone(), idx))
        .collect();
    let names: HashMap<TabId, String> = tabs
        .iter()
        .map(|tab| (tab.handle.id().clone(), tab.name.clone()))
        .collect();

    for (step_no, step) in scenario.steps.iter().enumerate() {
        debug!(step = step_no, ?step, "applying scenario step");
        let target = step.tab().and_then(|name| index.get(name).copied());
        match (step, target) {
            (Step::Query { origin, .. }, Some(idx)) => {
                tabs[idx].handle.query_permission_state(origin.clone())
            }
            (
                Step::Provide {
                    origin,
                    allow,
                    remember,
                    ..
                },
                Some(idx),
            ) => tabs[idx].handle.provide_permission_state(origin.clone(), *allow, *remember),
            (Step::Reset { .. }, Some(idx)) => {
                tabs[idx].handle.reset_temporary_permission_states()
            }
            (Step::Navigate { document, origin, .. }, Some(idx)) => {
                tabs[idx].navigate(document, origin)
            }
            (Step::Close { .. }, Some(idx)) => {
                tabs[idx].handle.close();
                tabs[idx].closed = true;
            }
            (Step::Clear { origin }, _) => service.clear(origin),
            (Step::ClearAll, _) => service.clear_all(),
            (step, None) => {
                warn!(step = step_no, ?step, "scenario step targets no tab");
            }
        }
        settle(&tabs).await;
        collect_events(&mut rx, &mut raw_events);
    }

    let mut reports = Vec::with_capacity(tabs.len());
    for tab in &tabs {
        reports.push(tab.report().await);
    }
    let remembered = service
        .list_origins()
        .into_iter()
        .map(|origin| {
            let allow = service.get_allowed(&origin);
            (origin, allow)
        })
        .collect();

    service.shutdown();
    for tab in &tabs {
        let _ = tab.handle.flush().await;
    }
    collect_events(&mut rx, &mut raw_events);

    let events = raw_events
        .into_iter()
        .map(|event| EventRecord {
            tab: event.tab.as_ref().and_then(|id| names.get(id).cloned()),
            kind: event.kind,
            at: timestamp(event.timestamp),
        })
        .collect();

    Ok(ScenarioReport {
        name: scenario.name.clone(),
        events,
        tabs: reports,
        remembered,
    })
}

/// Two passes so cancellations posted by one tab's loop to a tab flushed
/// earlier are handled too.
async fn settle(tabs: &[ScenarioTab]) {
    for _ in 0..2 {
        for tab in tabs.iter().filter(|tab| !tab.closed) {
            let _ = tab.handle.flush().await;
        }
    }
}

fn collect_events(rx: &mut broadcast::Receiver<PermissionEvent>, out: &mut Vec<PermissionEvent>) {
    loop {
        match rx.try_recv() {
            Ok(event) => out.push(event),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "event buffer overflowed; raise event_capacity");
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
}

fn timestamp(at: SystemTime) -> String {
    format_rfc3339_millis(at).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::parse_scenario_str;

    fn kinds(report: &ScenarioReport, tab: &str) -> Vec<PermissionEventKind> {
        report
            .events
            .iter()
            .filter(|event| event.tab.as_deref() == Some(tab))
            .map(|event| event.kind.clone())
            .collect()
    }

    #[tokio::test]
    async fn remembered_answer_resolves_other_tab_queue() {
        let scenario = parse_scenario_str(
            r#"
tabs:
  - name: left
    documents:
      - { name: main, origin: "https://x.test" }
  - name: right
    documents:
      - { name: main, origin: "https://y.test" }
      - { name: frame, origin: "https://x.test" }
steps:
  - { action: query, tab: right, origin: "https://y.test" }
  - { action: query, tab: right, origin: "https://x.test" }
  - { action: query, tab: left, origin: "https://x.test" }
  - { action: provide, tab: left, origin: "https://x.test", allow: true, remember: true }
"#,
        )
        .unwrap();

        let report = run_scenario(&scenario, BrokerConfig::default())
            .await
            .unwrap();

        let right = &report.tabs[1];
        assert_eq!(right.prompts, vec![Origin::from("https://y.test")]);
        assert_eq!(right.documents[1].decisions, vec![true]);
        let state = right.state.as_ref().unwrap();
        assert!(state.queued.is_empty());
        assert_eq!(state.in_progress, Some(Origin::from("https://y.test")));
        assert_eq!(report.remembered.get(&Origin::from("https://x.test")), Some(&true));
        assert!(kinds(&report, "right").iter().any(|kind| matches!(
            kind,
            PermissionEventKind::Resolved {
                source: geolocation_permissions::DecisionSource::CrossTab,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn main_frame_navigation_resets_tab_state() {
        let scenario = parse_scenario_str(
            r#"
tabs:
  - name: only
    documents:
      - { name: main, origin: "https://a.test" }
      - { name: frame, origin: "https://b.test" }
steps:
  - { action: query, tab: only, origin: "https://a.test" }
  - { action: provide, tab: only, origin: "https://a.test", allow: false }
  - { action: query, tab: only, origin: "https://b.test" }
  - { action: navigate, tab: only, document: main, origin: "https://c.test" }
  - { action: query, tab: only, origin: "https://a.test" }
"#,
        )
        .unwrap();

        let report = run_scenario(&scenario, BrokerConfig::default())
            .await
            .unwrap();

        let tab = &report.tabs[0];
        assert_eq!(
            tab.prompts,
            vec![
                Origin::from("https://a.test"),
                Origin::from("https://b.test"),
                Origin::from("https://a.test"),
            ]
        );
        assert_eq!(tab.hide_prompts, 1);
        let state = tab.state.as_ref().unwrap();
        assert!(state.temporary.is_empty());
        assert_eq!(state.in_progress, Some(Origin::from("https://a.test")));
        assert!(kinds(&report, "only").contains(&PermissionEventKind::Reset));
    }

    #[tokio::test]
    async fn navigation_and_close_are_reflected() {
        let scenario = parse_scenario_str(
            r#"
remembered:
  https://a.test: true
tabs:
  - name: only
    documents:
      - { name: main, origin: "https://a.test" }
      - { name: ad, origin: "https://a.test" }
steps:
  - { action: navigate, tab: only, document: ad, origin: "https://b.test" }
  - { action: query, tab: only, origin: "https://a.test" }
  - { action: close, tab: only }
  - { action: clear, origin: "https://a.test" }
"#,
        )
        .unwrap();

        let report = run_scenario(&scenario, BrokerConfig::default())
            .await
            .unwrap();

        let tab = &report.tabs[0];
        assert!(tab.closed);
        assert!(tab.state.is_none());
        assert_eq!(tab.documents[0].decisions, vec![true]);
        assert!(tab.documents[1].decisions.is_empty());
        assert_eq!(tab.documents[1].origin, Origin::from("https://b.test"));
        assert!(report.remembered.is_empty());
        assert!(kinds(&report, "only").contains(&PermissionEventKind::TabClosed));
    }
}
