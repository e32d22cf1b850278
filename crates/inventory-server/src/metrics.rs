use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Replication counters, rendered in the Prometheus text format.
#[derive(Debug, Default)]
pub struct Metrics {
    deliveries_processed: AtomicU64,
    deliveries_no_change: AtomicU64,
    fencing_failures: AtomicU64,
    fatal_errors: AtomicU64,
    conflict_retries: AtomicU64,
    tuples_created: AtomicU64,
    tuples_deleted: AtomicU64,
    tokens_persisted: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_processed(&self) {
        self.deliveries_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_no_change(&self) {
        self.deliveries_no_change.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fencing_failure(&self) {
        self.fencing_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fatal_error(&self) {
        self.fatal_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conflict_retry(&self) {
        self.conflict_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tuples(&self, created: usize, deleted: usize) {
        self.tuples_created
            .fetch_add(created as u64, Ordering::Relaxed);
        self.tuples_deleted
            .fetch_add(deleted as u64, Ordering::Relaxed);
    }

    pub fn record_token_persisted(&self) {
        self.tokens_persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn deliveries_processed(&self) -> u64 {
        self.deliveries_processed.load(Ordering::Relaxed)
    }

    pub fn deliveries_no_change(&self) -> u64 {
        self.deliveries_no_change.load(Ordering::Relaxed)
    }

    pub fn fencing_failures(&self) -> u64 {
        self.fencing_failures.load(Ordering::Relaxed)
    }

    pub fn fatal_errors(&self) -> u64 {
        self.fatal_errors.load(Ordering::Relaxed)
    }

    pub fn conflict_retries(&self) -> u64 {
        self.conflict_retries.load(Ordering::Relaxed)
    }

    pub fn tuples_created(&self) -> u64 {
        self.tuples_created.load(Ordering::Relaxed)
    }

    pub fn tuples_deleted(&self) -> u64 {
        self.tuples_deleted.load(Ordering::Relaxed)
    }

    pub fn tokens_persisted(&self) -> u64 {
        self.tokens_persisted.load(Ordering::Relaxed)
    }

    pub fn render_prometheus(&self) -> String {
        let counters = [
            (
                "inventory_deliveries_processed_total",
                "Deliveries replicated and acknowledged.",
                self.deliveries_processed(),
            ),
            (
                "inventory_deliveries_no_change_total",
                "Deliveries that required no backend write.",
                self.deliveries_no_change(),
            ),
            (
                "inventory_fencing_failures_total",
                "Writes rejected by the fencing check.",
                self.fencing_failures(),
            ),
            (
                "inventory_fatal_errors_total",
                "Deliveries that stopped the consumer.",
                self.fatal_errors(),
            ),
            (
                "inventory_conflict_retries_total",
                "Transactions retried after a storage conflict.",
                self.conflict_retries(),
            ),
            (
                "inventory_tuples_created_total",
                "Relation tuples created.",
                self.tuples_created(),
            ),
            (
                "inventory_tuples_deleted_total",
                "Relation tuples deleted.",
                self.tuples_deleted(),
            ),
            (
                "inventory_consistency_tokens_persisted_total",
                "Consistency tokens written back to resources.",
                self.tokens_persisted(),
            ),
        ];

        let mut output = String::new();
        for (name, help, value) in counters {
            let _ = writeln!(output, "# HELP {name} {help}");
            let _ = writeln!(output, "# TYPE {name} counter");
            let _ = writeln!(output, "{name} {value}");
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_metrics_are_zero() {
        let m = Metrics::new();
        assert_eq!(m.deliveries_processed(), 0);
        assert_eq!(m.fencing_failures(), 0);
        assert_eq!(m.tuples_created(), 0);
    }

    #[test]
    fn record_increments_counters() {
        let m = Metrics::new();
        m.record_processed();
        m.record_processed();
        m.record_no_change();
        m.record_tuples(2, 1);
        m.record_tuples(1, 0);

        assert_eq!(m.deliveries_processed(), 2);
        assert_eq!(m.deliveries_no_change(), 1);
        assert_eq!(m.tuples_created(), 3);
        assert_eq!(m.tuples_deleted(), 1);
    }

    #[test]
    fn render_prometheus_format() {
        let m = Metrics::new();
        m.record_processed();
        m.record_fencing_failure();

        let output = m.render_prometheus();

        assert!(output.contains("# TYPE inventory_deliveries_processed_total counter"));
        assert!(output.contains("inventory_deliveries_processed_total 1"));
        assert!(output.contains("inventory_fencing_failures_total 1"));
        assert!(
            output.contains("inventory_fatal_errors_total 0"),
            "missing fatal errors: {output}"
        );
    }
}
