use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

/// Prometheus Metrics für Reconciliation-Läufe, Zeilenstatus und Athena-Latenz
pub struct Metrics {
    pub registry: Registry,
    pub runs: IntCounterVec,
    pub rows: IntCounterVec,
    pub rows_skipped: IntCounterVec,
    pub query_duration: Histogram,
    pub notifications: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let runs = IntCounterVec::new(
            Opts::new("recon_runs_total", "Reconciliation runs by outcome"),
            &["outcome"],
        )
        .expect("Failed to create recon_runs_total metric");

        let rows = IntCounterVec::new(
            Opts::new("recon_rows_total", "Verified rows by status"),
            &["status"],
        )
        .expect("Failed to create recon_rows_total metric");

        let rows_skipped = IntCounterVec::new(
            Opts::new("recon_rows_skipped_total", "Rows skipped before verification"),
            &["reason"],
        )
        .expect("Failed to create recon_rows_skipped_total metric");

        let query_duration = Histogram::with_opts(
            HistogramOpts::new(
                "recon_query_duration_seconds",
                "Athena count query latency including polling",
            )
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        )
        .expect("Failed to create recon_query_duration_seconds metric");

        let notifications = IntCounterVec::new(
            Opts::new("recon_notifications_total", "SNS notifications by outcome"),
            &["outcome"],
        )
        .expect("Failed to create recon_notifications_total metric");

        registry.register(Box::new(runs.clone())).ok();
        registry.register(Box::new(rows.clone())).ok();
        registry.register(Box::new(rows_skipped.clone())).ok();
        registry.register(Box::new(query_duration.clone())).ok();
        registry.register(Box::new(notifications.clone())).ok();

        Self {
            registry,
            runs,
            rows,
            rows_skipped,
            query_duration,
            notifications,
        }
    }

    /// Exportiere alle Metriken im Prometheus Text-Format
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_counters() {
        let metrics = Metrics::new();
        metrics.runs.with_label_values(&["succeeded"]).inc();
        metrics.rows.with_label_values(&["Match"]).inc_by(3);

        let text = metrics.render();
        assert!(text.contains("recon_runs_total{outcome=\"succeeded\"} 1"));
        assert!(text.contains("recon_rows_total{status=\"Match\"} 3"));
    }
}
