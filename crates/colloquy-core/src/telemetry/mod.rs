//! Best-effort telemetry.
//!
//! - `sink`: the `TelemetrySink` trait and its boxed wrapper
//! - `snapshot`: persona snapshots and record assembly
//! - `emit_detached`: fire-and-forget delivery with a timeout

pub mod sink;
pub mod snapshot;

use std::sync::Arc;
use std::time::Duration;

use colloquy_types::telemetry::TelemetryRecord;

pub use sink::{BoxTelemetrySink, NoopSink, TelemetrySink, TelemetrySinkDyn};
pub use snapshot::{RecordBuilder, persona_snapshot, simulation_context};

/// Deliver `record` on its own task. Failures and timeouts are logged at
/// debug and dropped.
pub fn emit_detached(sink: Arc<BoxTelemetrySink>, record: TelemetryRecord, timeout: Duration) {
    tokio::spawn(async move {
        match tokio::time::timeout(timeout, sink.emit(&record)).await {
            Ok(Ok(())) => {
                tracing::trace!(sink = sink.name(), event = %record.event_type, "telemetry delivered");
            }
            Ok(Err(e)) => {
                tracing::debug!(sink = sink.name(), error = %e, "telemetry dropped");
            }
            Err(_) => {
                tracing::debug!(sink = sink.name(), timeout_secs = timeout.as_secs(), "telemetry timed out");
            }
        }
    });
}
