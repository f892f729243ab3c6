// Observability: metrics recording and the Prometheus snapshot

pub mod metrics;

pub use metrics::{install_recorder, write_snapshot};
