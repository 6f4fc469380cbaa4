mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the approval workflow
// ============================================================================
//
// - Command throughput and latency, by command and outcome
// - Decisions by verdict
// - Terminal transitions (completed, rejected, rejected_final)
// - Stale-state conflicts and notification delivery failures
//
// Scraped via /metrics on the metrics server.
// ============================================================================

pub struct WorkflowMetrics {
    registry: Registry,

    pub commands_total: IntCounterVec,
    pub command_duration: HistogramVec,
    pub decisions_total: IntCounterVec,
    pub terminal_transitions: IntCounterVec,
    pub stale_state_total: IntCounter,
    pub notification_failures: IntCounter,
}

impl WorkflowMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let commands_total = IntCounterVec::new(
            Opts::new("workflow_commands_total", "Workflow commands handled"),
            &["command", "outcome"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        let command_duration = HistogramVec::new(
            HistogramOpts::new("workflow_command_duration_seconds", "Workflow command duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["command"],
        )?;
        registry.register(Box::new(command_duration.clone()))?;

        let decisions_total = IntCounterVec::new(
            Opts::new("workflow_decisions_total", "Approver decisions recorded"),
            &["verdict"],
        )?;
        registry.register(Box::new(decisions_total.clone()))?;

        let terminal_transitions = IntCounterVec::new(
            Opts::new("workflow_terminal_transitions_total", "Orders reaching a terminal status"),
            &["status"],
        )?;
        registry.register(Box::new(terminal_transitions.clone()))?;

        let stale_state_total = IntCounter::new(
            "workflow_stale_state_total",
            "Commands refused because the order changed underneath them",
        )?;
        registry.register(Box::new(stale_state_total.clone()))?;

        let notification_failures = IntCounter::new(
            "workflow_notification_failures_total",
            "Notifications that could not be delivered",
        )?;
        registry.register(Box::new(notification_failures.clone()))?;

        Ok(Self {
            registry,
            commands_total,
            command_duration,
            decisions_total,
            terminal_transitions,
            stale_state_total,
            notification_failures,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// `outcome` is `ok` or the error kind
    pub fn record_command(&self, command: &str, outcome: &str, duration_secs: f64) {
        self.commands_total.with_label_values(&[command, outcome]).inc();
        self.command_duration.with_label_values(&[command]).observe(duration_secs);
    }

    pub fn record_decision(&self, verdict: &str) {
        self.decisions_total.with_label_values(&[verdict]).inc();
    }

    pub fn record_terminal(&self, status: &str) {
        self.terminal_transitions.with_label_values(&[status]).inc();
    }

    pub fn record_stale_state(&self) {
        self.stale_state_total.inc();
    }

    pub fn record_notification_failure(&self) {
        self.notification_failures.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = WorkflowMetrics::new().unwrap();
        metrics.record_stale_state();
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_command_by_outcome() {
        let metrics = WorkflowMetrics::new().unwrap();
        metrics.record_command("decide", "ok", 0.002);
        metrics.record_command("decide", "stale_state", 0.001);
        metrics.record_command("decide", "ok", 0.003);

        let gathered = metrics.registry().gather();
        let commands = gathered.iter().find(|m| m.name() == "workflow_commands_total").unwrap();
        assert_eq!(commands.metric.len(), 2);

        let duration = gathered
            .iter()
            .find(|m| m.name() == "workflow_command_duration_seconds")
            .unwrap();
        assert_eq!(duration.metric[0].histogram.sample_count, Some(3));
    }

    #[test]
    fn test_notification_failures_counted() {
        let metrics = WorkflowMetrics::new().unwrap();
        metrics.record_notification_failure();
        metrics.record_notification_failure();

        let gathered = metrics.registry().gather();
        let failures = gathered
            .iter()
            .find(|m| m.name() == "workflow_notification_failures_total")
            .unwrap();
        assert_eq!(failures.metric[0].counter.value, Some(2.0));
    }
}
