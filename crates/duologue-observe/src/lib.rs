//! Observability setup for Duologue: structured logging and optional
//! OpenTelemetry trace export.

pub mod tracing_setup;
