pub(crate) const DEFAULT_USER_AGENT: &str = concat!("tracefire/", env!("CARGO_PKG_VERSION"));

/// OTLP/HTTP collector listening on the standard port.
pub(crate) const DEFAULT_ENDPOINT: &str = "http://localhost:4318";
pub(crate) const DEFAULT_SERVICE_NAME: &str = "tracefire";
