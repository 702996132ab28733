pub mod metrics;
pub mod pipeline;

pub use metrics::RelayerMetrics;
pub use pipeline::{InMemoryIntentVault, IntentSource, Relayer};
