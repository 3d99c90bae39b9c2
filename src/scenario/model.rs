use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use geolocation_permissions::Origin;
use serde::{Deserialize, Serialize};

use super::ScenarioError;

/// Scripted multi-tab session replayed against a fresh permission service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    /// Remembered decisions restored before any tab opens.
    #[serde(default)]
    pub remembered: BTreeMap<Origin, bool>,
    pub tabs: Vec<TabSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TabSpec {
    pub name: String,
    #[serde(default)]
    pub documents: Vec<DocumentSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentSpec {
    pub name: String,
    pub origin: Origin,
    /// Whether the document has created its geolocation object.
    #[serde(default = "default_true")]
    pub geolocation: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Query {
        tab: String,
        origin: Origin,
    },
    Provide {
        tab: String,
        origin: Origin,
        allow: bool,
        #[serde(default)]
        remember: bool,
    },
    Reset {
        tab: String,
    },
    /// Loads a new document into an existing frame; its geolocation object is
    /// gone. Navigating the tab's first document also resets the tab.
    Navigate {
        tab: String,
        document: String,
        origin: Origin,
    },
    Close {
        tab: String,
    },
    Clear {
        origin: Origin,
    },
    ClearAll,
}

impl Step {
    pub fn tab(&self) -> Option<&str> {
        match self {
            Step::Query { tab, .. }
            | Step::Provide { tab, .. }
            | Step::Reset { tab }
            | Step::Navigate { tab, .. }
            | Step::Close { tab } => Some(tab),
            Step::Clear { .. } | Step::ClearAll => None,
        }
    }
}

impl Scenario {
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let mut names = HashSet::new();
        for tab in &self.tabs {
            if !names.insert(tab.name.as_str()) {
                return Err(ScenarioError::DuplicateTab(tab.name.clone()));
            }
        }

        for (index, step) in self.steps.iter().enumerate() {
            let Some(tab_name) = step.tab() else {
                continue;
            };
            let Some(tab) = self.tabs.iter().find(|tab| tab.name == tab_name) else {
                return Err(ScenarioError::UnknownTab {
                    step: index,
                    tab: tab_name.to_string(),
                });
            };
            if let Step::Navigate { document, .. } = step {
                if !tab.documents.iter().any(|doc| &doc.name == document) {
                    return Err(ScenarioError::UnknownDocument {
                        step: index,
                        tab: tab_name.to_string(),
                        document: document.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

pub fn parse_scenario_str(raw: &str) -> Result<Scenario, ScenarioError> {
    let scenario: Scenario = match serde_json::from_str(raw) {
        Ok(scenario) => scenario,
        Err(json_err) => serde_yaml::from_str(raw).map_err(|yaml_err| {
            ScenarioError::Deserialize(format!(
                "json error: {}; yaml error: {}",
                json_err, yaml_err
            ))
        })?,
    };
    scenario.validate()?;
    Ok(scenario)
}

pub fn load_scenario_from_path(path: impl AsRef<Path>) -> Result<Scenario, ScenarioError> {
    let mut buf = String::new();
    File::open(path.as_ref())?.read_to_string(&mut buf)?;
    parse_scenario_str(&buf)
}
