//! Tracing subscriber initialization with structured logging and optional
//! OpenTelemetry trace export.
//!
//! ```no_run
//! let filter = colloquy_observe::tracing_setup::filter_for(1, false);
//! colloquy_observe::tracing_setup::init_tracing(filter, false).unwrap();
//! ```

use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Kept so buffered spans can be flushed on exit.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Filter directive for a `-v` count. `RUST_LOG` still wins when set.
pub fn filter_for(verbose: u8, quiet: bool) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "info,colloquy_core=debug,colloquy_infra=debug",
        _ => "trace",
    }
}

/// Install the global subscriber.
///
/// Always adds a `fmt` layer. With `enable_otel`, spans are also bridged to
/// OpenTelemetry through a stdout exporter.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_tracing(default_filter: &str, enable_otel: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

    if enable_otel {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("colloquy");
        let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}

/// Flush and shut down the tracer provider. No-op when OTel was off.
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get()
        && let Err(e) = provider.shutdown()
    {
        eprintln!("Warning: OTel tracer provider shutdown error: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(filter_for(0, true), "error");
        assert_eq!(filter_for(0, false), "warn");
        assert_eq!(filter_for(1, true), "info");
        assert!(filter_for(2, false).contains("colloquy_core=debug"));
        assert_eq!(filter_for(7, false), "trace");
    }

    #[test]
    fn test_filters_parse() {
        for v in 0..4 {
            assert!(EnvFilter::try_new(filter_for(v, false)).is_ok());
        }
    }
}
