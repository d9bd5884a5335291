pub mod http_graph;
pub mod in_memory;
pub mod kube_cluster;
pub mod metrics_sink;
pub mod prometheus_query;
