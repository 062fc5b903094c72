#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::Receiver;

use taxlib_core::config::SearchSettings;
use taxlib_core::{BalanceType, Node, NodeProvider, NodeSpec, StaticNodeProvider};
use taxlib_index::IndexEvent;

pub const WAIT: Duration = Duration::from_secs(30);

pub fn settings() -> SearchSettings {
    SearchSettings {
        progress_interval_ms: 10,
        stop_timeout_ms: 10_000,
        stop_poll_interval_ms: 5,
        ..SearchSettings::default()
    }
}

fn element(id: &str, label: &str, order: f64, balance: BalanceType) -> NodeSpec {
    NodeSpec { order, balance, ..NodeSpec::new(id, label) }
}

/// ```text
/// IncomeStatementAbstract            Income Statement
///   Revenue                          Revenue
///   Revenues                         Revenues
///   (structural, no id)              Operating Section
///     CostOfRevenue                  Cost of Revenue
///     DepreciationMethod             Depreciation Method  [Straight Line, Declining Balance]
///   NetIncomeLoss                    Net Income
///   RetiredConcept (prohibited)      Retired Concept
/// ```
pub fn income_statement_specs() -> Vec<NodeSpec> {
    let mut root = NodeSpec::new("IncomeStatementAbstract", "Income Statement");
    root.is_abstract = true;
    let mut method = element("DepreciationMethod", "Depreciation Method", 5.0, BalanceType::None);
    method.enum_values = vec!["Straight Line".into(), "Declining Balance".into()];
    let section = NodeSpec::new("", "Operating Section")
        .with_children(vec![element("CostOfRevenue", "Cost of Revenue", 4.0, BalanceType::Debit), method]);
    let mut retired = element("RetiredConcept", "Retired Concept", 7.0, BalanceType::None);
    retired.prohibited = true;
    let mut net = element("NetIncomeLoss", "Net Income", 6.0, BalanceType::Credit);
    net.definition = Some("Profit or loss for the period".into());
    vec![root.with_children(vec![
        element("Revenue", "Revenue", 1.0, BalanceType::Credit),
        element("Revenues", "Revenues", 2.0, BalanceType::Credit),
        section,
        net,
        retired,
    ])]
}

pub fn income_statement(view: &str) -> Arc<StaticNodeProvider> {
    Arc::new(StaticNodeProvider::from_specs(view, "en", income_statement_specs()))
}

/// `count` flat elements `E0..`, labelled `Item N`.
pub fn flat_specs(count: usize) -> Vec<NodeSpec> {
    (0..count)
        .map(|i| element(&format!("E{}", i), &format!("Item {}", i), i as f64, BalanceType::None))
        .collect()
}

/// Provider wrapper that slows every label lookup down, optionally fails
/// them, and can translate labels per language.
pub struct TestProvider {
    pub inner: StaticNodeProvider,
    pub label_delay: Duration,
    pub fail_labels: bool,
    pub translations: HashMap<(String, String), String>,
}

impl TestProvider {
    pub fn new(inner: StaticNodeProvider) -> Self {
        Self { inner, label_delay: Duration::ZERO, fail_labels: false, translations: HashMap::new() }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.label_delay = delay;
        self
    }

    pub fn failing_labels(mut self) -> Self {
        self.fail_labels = true;
        self
    }

    pub fn translate(mut self, id: &str, language: &str, label: &str) -> Self {
        self.translations.insert((id.to_string(), language.to_string()), label.to_string());
        self
    }
}

impl NodeProvider for TestProvider {
    fn nodes_for_indexing(&self) -> Vec<Arc<Node>> {
        self.inner.nodes_for_indexing()
    }

    fn label_role(&self) -> String {
        self.inner.label_role()
    }

    fn current_language(&self) -> String {
        self.inner.current_language()
    }

    fn view_key_component(&self) -> String {
        self.inner.view_key_component()
    }

    fn label(&self, node: &Node, _role: &str, language: &str) -> anyhow::Result<String> {
        if !self.label_delay.is_zero() {
            thread::sleep(self.label_delay);
        }
        if self.fail_labels {
            anyhow::bail!("label linkbase unavailable");
        }
        Ok(self
            .translations
            .get(&(node.id().to_string(), language.to_string()))
            .cloned()
            .unwrap_or_else(|| node.label()))
    }
}

/// Drain events until one satisfies `stop` or `timeout` passes. Returns the
/// events seen, the matching one included.
pub fn collect_until(
    rx: &mut Receiver<IndexEvent>,
    timeout: Duration,
    stop: impl Fn(&IndexEvent) -> bool,
) -> Vec<IndexEvent> {
    let deadline = Instant::now() + timeout;
    let mut seen = Vec::new();
    while Instant::now() < deadline {
        match rx.try_recv() {
            Ok(event) => {
                let done = stop(&event);
                seen.push(event);
                if done {
                    return seen;
                }
            }
            Err(TryRecvError::Empty) => thread::sleep(Duration::from_millis(2)),
            Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Closed) => break,
        }
    }
    seen
}

pub fn is_completed(event: &IndexEvent) -> bool {
    matches!(event, IndexEvent::Completed { .. })
}

/// Events already queued on `rx`, without waiting.
pub fn drain(rx: &mut Receiver<IndexEvent>) -> Vec<IndexEvent> {
    let mut seen = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => seen.push(event),
            Err(TryRecvError::Lagged(_)) => {}
            Err(_) => return seen,
        }
    }
}
