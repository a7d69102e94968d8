use std::fmt;

use http::{HeaderMap, HeaderName, HeaderValue};
use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::propagation::{Injector, TextMapPropagator};
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer, TracerProvider as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::{debug, warn};
use url::Url;

use crate::config::RunConfig;
use crate::error::{ConfigError, TelemetryError};

use super::context::SpanTracer;

const INSTRUMENTATION_NAME: &str = "tracefire";
const OTLP_TRACES_PATH: &str = "/v1/traces";

/// [`SpanTracer`] backed by the globally installed OpenTelemetry provider.
///
/// Spans are carried as [`Context`] values so a child started from the run
/// context records the run span as its parent.
pub struct OtelTracer {
    tracer: BoxedTracer,
}

impl OtelTracer {
    #[must_use]
    pub fn global() -> Self {
        Self {
            tracer: global::tracer(INSTRUMENTATION_NAME),
        }
    }

    /// Tracer bound to `provider` instead of the global one.
    #[must_use]
    pub fn from_provider(provider: &SdkTracerProvider) -> Self {
        Self {
            tracer: BoxedTracer::new(Box::new(provider.tracer(INSTRUMENTATION_NAME))),
        }
    }
}

/// Writes propagator fields as request headers.
struct HeaderInjector<'headers>(&'headers mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            self.0.insert(name, value);
        } else {
            debug!("Skipping unrepresentable propagation header '{}'", key);
        }
    }
}

impl fmt::Debug for OtelTracer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("OtelTracer")
            .field("instrumentation", &INSTRUMENTATION_NAME)
            .finish_non_exhaustive()
    }
}

impl SpanTracer for OtelTracer {
    type Span = Context;

    fn start_run(&self, name: &str) -> Context {
        let span = self
            .tracer
            .span_builder(name.to_owned())
            .with_kind(SpanKind::Internal)
            .start_with_context(&self.tracer, &Context::new());
        Context::new().with_span(span)
    }

    fn start_child(&self, parent: &Context, name: String) -> Context {
        let span = self
            .tracer
            .span_builder(name)
            .with_kind(SpanKind::Client)
            .start_with_context(&self.tracer, parent);
        parent.with_span(span)
    }

    fn set_attributes(&self, span: &Context, attributes: Vec<KeyValue>) {
        span.span().set_attributes(attributes);
    }

    fn record_error(&self, span: &Context, error: &dyn std::error::Error) {
        let span_ref = span.span();
        span_ref.record_error(error);
        span_ref.set_status(Status::error(error.to_string()));
    }

    fn inject(&self, span: &Context, headers: &mut HeaderMap) {
        global::get_text_map_propagator(|propagator| {
            TextMapPropagator::inject_context(propagator, span, &mut HeaderInjector(headers));
        });
    }

    fn end(&self, span: Context) {
        span.span().end();
    }
}

/// Owns the tracer provider and shuts it down exactly once.
///
/// Call [`TracerHandle::shutdown`] to observe flush errors; dropping the
/// handle shuts down as well and only logs them.
pub struct TracerHandle {
    provider: Option<SdkTracerProvider>,
}

impl TracerHandle {
    #[must_use]
    pub fn tracer(&self) -> OtelTracer {
        self.provider
            .as_ref()
            .map_or_else(OtelTracer::global, OtelTracer::from_provider)
    }

    /// Flushes pending spans and stops the exporter.
    ///
    /// # Errors
    ///
    /// Returns an error when the provider fails to flush or shut down.
    pub fn shutdown(mut self) -> Result<(), TelemetryError> {
        match self.provider.take() {
            Some(provider) => provider
                .shutdown()
                .map_err(|err| TelemetryError::Shutdown {
                    message: err.to_string(),
                }),
            None => Ok(()),
        }
    }
}

impl Drop for TracerHandle {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take()
            && let Err(err) = provider.shutdown()
        {
            warn!("Failed to shut down tracer: {}", err);
        }
    }
}

/// Builds the tracer provider and installs it globally, together with the
/// W3C trace-context propagator used to stamp `traceparent` on requests.
///
/// With export disabled the provider has no exporter: spans are created and
/// ended but never leave the process.
///
/// # Errors
///
/// Returns an error when the endpoint is malformed or the exporter cannot be
/// built.
pub fn init_tracer(config: &RunConfig) -> Result<TracerHandle, TelemetryError> {
    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .build();
    let mut builder = SdkTracerProvider::builder().with_resource(resource);

    if config.export {
        let endpoint =
            normalize_endpoint(&config.endpoint).map_err(|err| TelemetryError::Setup {
                endpoint: config.endpoint.clone(),
                message: err.to_string(),
            })?;
        let exporter = SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint.clone())
            .build()
            .map_err(|err| TelemetryError::Setup {
                endpoint: endpoint.clone(),
                message: err.to_string(),
            })?;
        debug!("Exporting spans to {}", endpoint);
        builder = builder.with_batch_exporter(exporter);
    } else {
        debug!("Span export disabled");
    }

    let provider = builder.build();
    global::set_text_map_propagator(TraceContextPropagator::new());
    global::set_tracer_provider(provider.clone());
    Ok(TracerHandle {
        provider: Some(provider),
    })
}

/// Turns `host:port` or a bare collector URL into the OTLP/HTTP traces URL.
pub(crate) fn normalize_endpoint(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_owned()
    } else {
        format!("http://{}", trimmed)
    };
    let mut url = Url::parse(&with_scheme).map_err(|err| ConfigError::InvalidEndpoint {
        endpoint: raw.to_owned(),
        source: err,
    })?;
    if url.path().is_empty() || url.path() == "/" {
        url.set_path(OTLP_TRACES_PATH);
    }
    Ok(url.to_string())
}
