use crate::app::ports::MetricSink;
use crate::types::Labels;

/// Publishes through the `metrics` facade into whatever recorder is installed
pub struct PrometheusSink;

fn to_labels(labels: &Labels) -> Vec<::metrics::Label> {
    labels
        .iter()
        .map(|(k, v)| ::metrics::Label::new(k.to_string(), v.to_string()))
        .collect()
}

impl MetricSink for PrometheusSink {
    fn set(&self, metric: &str, labels: &Labels, value: f64) {
        ::metrics::gauge!(metric.to_string(), to_labels(labels)).set(value);
    }

    fn increment(&self, metric: &str, labels: &Labels, amount: u64) {
        ::metrics::counter!(metric.to_string(), to_labels(labels)).increment(amount);
    }
}
