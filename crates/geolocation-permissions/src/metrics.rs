use lazy_static::lazy_static;
use prometheus::{core::Collector, opts, IntCounter, IntCounterVec, IntGauge, Registry};
use tracing::error;

use crate::events::DecisionSource;

lazy_static! {
    static ref GEOPERM_PROMPTS_SHOWN: IntCounter = IntCounter::new(
        "geoperm_prompts_shown_total",
        "Permission prompts requested from the host"
    )
    .unwrap();
    static ref GEOPERM_DECISIONS: IntCounterVec = IntCounterVec::new(
        opts!(
            "geoperm_decisions_total",
            "Decisions delivered to documents grouped by source"
        ),
        &["source"]
    )
    .unwrap();
    static ref GEOPERM_STALE_ANSWERS: IntCounter = IntCounter::new(
        "geoperm_stale_answers_total",
        "Answers discarded because they no longer matched the in-flight request"
    )
    .unwrap();
    static ref GEOPERM_REQUESTS_QUEUED: IntCounter = IntCounter::new(
        "geoperm_requests_queued_total",
        "Requests queued behind another in-flight prompt"
    )
    .unwrap();
    static ref GEOPERM_LIVE_TABS: IntGauge =
        IntGauge::new("geoperm_live_tabs", "Tab controllers currently registered").unwrap();
    static ref GEOPERM_REMEMBERED_ORIGINS: IntGauge = IntGauge::new(
        "geoperm_remembered_origins",
        "Origins with a remembered decision"
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register geolocation permission metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, GEOPERM_PROMPTS_SHOWN.clone());
    register(registry, GEOPERM_DECISIONS.clone());
    register(registry, GEOPERM_STALE_ANSWERS.clone());
    register(registry, GEOPERM_REQUESTS_QUEUED.clone());
    register(registry, GEOPERM_LIVE_TABS.clone());
    register(registry, GEOPERM_REMEMBERED_ORIGINS.clone());
}

pub fn record_prompt_shown() {
    GEOPERM_PROMPTS_SHOWN.inc();
}

pub fn record_decision(source: DecisionSource) {
    GEOPERM_DECISIONS.with_label_values(&[source.as_str()]).inc();
}

pub fn record_stale_answer() {
    GEOPERM_STALE_ANSWERS.inc();
}

pub fn record_request_queued() {
    GEOPERM_REQUESTS_QUEUED.inc();
}

// Gauges below are shared by every service in the process, so callers
// report changes rather than absolute counts.

pub fn tab_registered() {
    GEOPERM_LIVE_TABS.inc();
}

pub fn tab_deregistered() {
    GEOPERM_LIVE_TABS.dec();
}

pub fn adjust_remembered(delta: i64) {
    GEOPERM_REMEMBERED_ORIGINS.add(delta);
}
