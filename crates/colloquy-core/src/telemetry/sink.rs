//! Telemetry sink trait.
//!
//! Best-effort delivery of [`TelemetryRecord`]s. Failures are reported to
//! the caller, which logs and drops them; nothing is retried or queued.

use std::future::Future;
use std::pin::Pin;

use colloquy_types::error::TelemetryError;
use colloquy_types::telemetry::TelemetryRecord;

pub trait TelemetrySink: Send + Sync {
    fn name(&self) -> &str;

    fn emit(
        &self,
        record: &TelemetryRecord,
    ) -> impl Future<Output = Result<(), TelemetryError>> + Send;
}

/// Object-safe version of [`TelemetrySink`].
pub trait TelemetrySinkDyn: Send + Sync {
    fn name(&self) -> &str;

    fn emit_boxed<'a>(
        &'a self,
        record: &'a TelemetryRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), TelemetryError>> + Send + 'a>>;
}

impl<T: TelemetrySink> TelemetrySinkDyn for T {
    fn name(&self) -> &str {
        TelemetrySink::name(self)
    }

    fn emit_boxed<'a>(
        &'a self,
        record: &'a TelemetryRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), TelemetryError>> + Send + 'a>> {
        Box::pin(self.emit(record))
    }
}

pub struct BoxTelemetrySink {
    inner: Box<dyn TelemetrySinkDyn + Send + Sync>,
}

impl BoxTelemetrySink {
    pub fn new<T: TelemetrySink + 'static>(sink: T) -> Self {
        Self {
            inner: Box::new(sink),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn emit(&self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        self.inner.emit_boxed(record).await
    }
}

impl std::fmt::Debug for BoxTelemetrySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxTelemetrySink")
            .field("name", &self.name())
            .finish()
    }
}

/// Sink used when no endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn name(&self) -> &str {
        "noop"
    }

    async fn emit(&self, _record: &TelemetryRecord) -> Result<(), TelemetryError> {
        Ok(())
    }
}
