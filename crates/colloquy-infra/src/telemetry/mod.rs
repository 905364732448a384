//! Telemetry sink implementations.

pub mod http;

use std::time::Duration;

use colloquy_core::telemetry::{BoxTelemetrySink, NoopSink};
use colloquy_types::config::TelemetryConfig;

pub use http::HttpTelemetrySink;

/// The HTTP sink when an endpoint is configured, otherwise the no-op sink.
pub fn sink_from_config(config: &TelemetryConfig) -> BoxTelemetrySink {
    match &config.endpoint {
        Some(endpoint) => match HttpTelemetrySink::new(endpoint, Duration::from_secs(config.timeout_secs)) {
            Ok(sink) => {
                tracing::info!(endpoint = %endpoint, "telemetry enabled");
                BoxTelemetrySink::new(sink)
            }
            Err(e) => {
                tracing::warn!(endpoint = %endpoint, error = %e, "telemetry disabled");
                BoxTelemetrySink::new(NoopSink)
            }
        },
        None => BoxTelemetrySink::new(NoopSink),
    }
}
