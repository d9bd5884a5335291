//! Metrics registry for describing the catalog to the recorder
//!
//! Every catalogued metric is described up front so help texts show up on the
//! first scrape, and name conflicts are detected at startup instead of
//! surfacing as clashing series later.

use crate::metrics::catalog::CATALOG;
use crate::metrics::{MetricDoc, MetricType};
use std::collections::HashMap;
use tracing::{info, warn};

/// Describe all catalogued metrics and report name conflicts
///
/// Returns the number of distinct metrics registered.
pub fn register_all_metrics() -> usize {
    let registered = collect_unique(CATALOG.iter());

    for doc in registered.values() {
        describe(doc);
    }

    info!("Registered {} metrics", registered.len());

    if std::env::var("EXPORTER_METRICS_DEBUG").is_ok() {
        log_metrics_summary(&registered);
    }

    registered.len()
}

/// Keep the first definition of every name, warn about the rest
fn collect_unique<'a>(docs: impl Iterator<Item = &'a MetricDoc>) -> HashMap<&'static str, &'a MetricDoc> {
    let mut all_metrics: HashMap<&'static str, &'a MetricDoc> = HashMap::new();
    for doc in docs {
        if let Some(existing) = all_metrics.get(doc.name) {
            warn!(
                "Metric name conflict detected: '{}' is defined as {:?} and again as {:?}",
                doc.name, existing.metric_type, doc.metric_type
            );
        } else {
            all_metrics.insert(doc.name, doc);
        }
    }
    all_metrics
}

fn describe(doc: &MetricDoc) {
    match doc.metric_type {
        MetricType::Counter => ::metrics::describe_counter!(doc.name, doc.help),
        MetricType::Gauge => ::metrics::describe_gauge!(doc.name, doc.help),
        MetricType::Histogram => ::metrics::describe_histogram!(doc.name, doc.help),
    }
}

/// Log a summary of all registered metrics for debugging
fn log_metrics_summary(all_metrics: &HashMap<&'static str, &MetricDoc>) {
    info!("=== Metrics Registry Summary ===");

    let mut by_family: HashMap<&str, Vec<&MetricDoc>> = HashMap::new();
    for doc in all_metrics.values() {
        by_family.entry(metric_family(doc.name)).or_default().push(doc);
    }

    for (family, metrics) in by_family {
        info!("Family '{}': {} metrics", family, metrics.len());
        for metric in metrics {
            info!(
                "  - {} ({:?}) [{}]: {}",
                metric.name,
                metric.metric_type,
                metric.labels.join(","),
                metric.help
            );
        }
    }

    info!("=== End Metrics Summary ===");
}

/// Extract the family prefix from a metric name (e.g., "kg_solvers" -> "kg")
fn metric_family(metric_name: &str) -> &str {
    match metric_name.find('_') {
        Some(idx) if idx > 0 => &metric_name[..idx],
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::catalog::MetricName;

    #[test]
    fn test_metric_family() {
        assert_eq!(metric_family("kg_graphdb_is_corrupted"), "kg");
        assert_eq!(metric_family("exporter_job_runs_total"), "exporter");
        assert_eq!(metric_family("_odd"), "unknown");
        assert_eq!(metric_family("plain"), "unknown");
    }

    #[test]
    fn test_conflicting_names_keep_first_definition() {
        let first = MetricName::Solvers.doc();
        let mut clash = MetricName::Solvers.doc();
        clash.metric_type = MetricType::Counter;
        let other = MetricName::GraphDbIsCorrupted.doc();

        let docs = [first, clash, other];
        let unique = collect_unique(docs.iter());
        assert_eq!(unique.len(), 2);
        assert_eq!(unique["kg_solvers"].metric_type, MetricType::Gauge);
    }

    #[test]
    fn test_register_all_metrics_without_recorder() {
        assert_eq!(register_all_metrics(), MetricName::ALL.len());
    }
}
