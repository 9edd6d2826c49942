//! # huddle-observability
//!
//! Observability-Crate fuer Huddle:
//! - Structured Logging via tracing-subscriber (Text oder JSON)
//! - Prometheus-kompatible Session-Metriken

pub mod logging;
pub mod metrics;

pub use logging::{logging_aus_config, logging_initialisieren, LoggingConfig};
pub use metrics::SessionMetrics;
