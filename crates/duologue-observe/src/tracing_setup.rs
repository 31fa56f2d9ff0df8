//! Tracing subscriber initialization with structured logging and optional
//! OpenTelemetry trace export.
//!
//! # Usage
//!
//! ```no_run
//! use duologue_observe::tracing_setup::{TracingOptions, init_tracing};
//!
//! // Warnings only, human-readable
//! init_tracing(&TracingOptions::default()).unwrap();
//!
//! // Debug logs as JSON lines plus OpenTelemetry spans on stdout
//! init_tracing(&TracingOptions { verbosity: 2, quiet: false, json: true, enable_otel: true }).unwrap();
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use std::sync::OnceLock;

/// Stores the OTel tracer provider so it can be shut down cleanly on exit.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Registry with the level filter applied; every output layer sits on top.
type Filtered = Layered<EnvFilter, Registry>;

/// How logging should be set up for this process.
#[derive(Debug, Clone, Default)]
pub struct TracingOptions {
    /// 0 = warn, 1 = info, 2+ = debug. Ignored when `RUST_LOG` is set.
    pub verbosity: u8,
    /// Errors only. Wins over `verbosity`.
    pub quiet: bool,
    /// Emit log lines as JSON instead of the human-readable format.
    pub json: bool,
    /// Bridge spans to OpenTelemetry with a stdout exporter.
    pub enable_otel: bool,
}

/// Filter directive for a `-v` count and `--quiet`.
pub fn default_directive(verbosity: u8, quiet: bool) -> &'static str {
    match verbosity {
        _ if quiet => "error",
        0 => "warn",
        1 => "info,sqlx=warn",
        _ => "debug,sqlx=info",
    }
}

/// Initialize the global tracing subscriber.
///
/// - Always installs a structured `fmt` layer writing to stderr with target
///   visibility and span close timing, so stdout stays free for command output.
/// - When `enable_otel` is true, additionally bridges tracing spans to
///   OpenTelemetry using a stdout exporter (suitable for local development;
///   swap the exporter for OTLP in production).
/// - `RUST_LOG` takes precedence over `verbosity`.
///
/// # Errors
///
/// Returns an error if the global subscriber has already been set.
pub fn init_tracing(options: &TracingOptions) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(options.verbosity, options.quiet)));

    // Boxed so every combination of optional layers stacks onto one type.
    let mut layers: Vec<Box<dyn Layer<Filtered> + Send + Sync>> = Vec::new();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);
    if options.json {
        layers.push(fmt_layer.json().boxed());
    } else {
        layers.push(fmt_layer.boxed());
    }

    if options.enable_otel {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("duologue");

        // Store the provider for shutdown and register it globally.
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);

        layers.push(tracing_opentelemetry::layer().with_tracer(tracer).boxed());
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()?;

    Ok(())
}

/// Flush pending traces and shut down the OpenTelemetry tracer provider.
///
/// Call this before process exit to ensure all buffered spans are exported.
/// Safe to call even when OTel was not enabled (no-op in that case).
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
    fn test_verbosity_maps_to_directives() {
        assert_eq!(default_directive(0, false), "warn");
        assert!(default_directive(1, false).starts_with("info"));
        assert!(default_directive(2, false).starts_with("debug"));
        assert_eq!(default_directive(7, false), default_directive(2, false));
    }

    #[test]
    fn test_quiet_wins_over_verbosity() {
        assert_eq!(default_directive(0, true), "error");
        assert_eq!(default_directive(2, true), "error");
    }

    #[test]
    fn test_directives_parse() {
        for v in 0..3 {
            assert!(EnvFilter::try_new(default_directive(v, false)).is_ok());
        }
    }

    #[test]
    fn test_init_tracing_installs_once() {
        let options = TracingOptions {
            verbosity: 1,
            quiet: false,
            json: true,
            enable_otel: true,
        };
        assert!(init_tracing(&options).is_ok());
        assert!(init_tracing(&options).is_err());
        shutdown_tracing();
    }
}
