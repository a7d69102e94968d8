use std::future::Future;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderMap, HeaderValue};
use opentelemetry::KeyValue;

use crate::error::{AppError, AppResult, AttemptError, TransportError};
use crate::http::{AttemptRequest, AttemptResponse, HttpExecutor};
use crate::telemetry::SpanTracer;

const REQUEST_HEAD_LIMIT: usize = 16 * 1024;

pub(crate) fn run_async_test<F>(future: F) -> AppResult<()>
where
    F: Future<Output = AppResult<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::validation(format!("Failed to build runtime: {}", err)))?;
    runtime.block_on(future)
}

/// Like [`run_async_test`], on a runtime with several worker threads.
pub(crate) fn run_multi_thread_test<F>(future: F) -> AppResult<()>
where
    F: Future<Output = AppResult<()>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .map_err(|err| AppError::validation(format!("Failed to build runtime: {}", err)))?;
    runtime.block_on(future)
}

/// Header value [`RecordingTracer`] propagates for the span with `id`.
pub(crate) fn recorded_traceparent(id: usize) -> String {
    format!("recorded-{}", id)
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedSpan {
    pub name: String,
    pub parent: Option<usize>,
    pub attributes: Vec<KeyValue>,
    pub errors: Vec<String>,
    pub end_count: usize,
}

impl RecordedSpan {
    pub fn attribute(&self, key: &str) -> Option<&opentelemetry::Value> {
        self.attributes
            .iter()
            .rev()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| &kv.value)
    }
}

#[derive(Debug)]
pub(crate) struct RecordedHandle {
    id: usize,
}

/// In-memory tracer that keeps every span it was asked to create.
#[derive(Debug, Default)]
pub(crate) struct RecordingTracer {
    spans: Mutex<Vec<RecordedSpan>>,
}

impl RecordingTracer {
    pub fn spans(&self) -> Vec<RecordedSpan> {
        self.spans
            .lock()
            .map(|spans| spans.clone())
            .unwrap_or_default()
    }

    fn with_span<F>(&self, handle: &RecordedHandle, update: F)
    where
        F: FnOnce(&mut RecordedSpan),
    {
        if let Ok(mut spans) = self.spans.lock()
            && let Some(span) = spans.get_mut(handle.id)
        {
            update(span);
        }
    }

    fn push(&self, name: String, parent: Option<usize>) -> RecordedHandle {
        let mut id = usize::MAX;
        if let Ok(mut spans) = self.spans.lock() {
            id = spans.len();
            spans.push(RecordedSpan {
                name,
                parent,
                attributes: Vec::new(),
                errors: Vec::new(),
                end_count: 0,
            });
        }
        RecordedHandle { id }
    }
}

impl SpanTracer for RecordingTracer {
    type Span = RecordedHandle;

    fn start_run(&self, name: &str) -> RecordedHandle {
        self.push(name.to_owned(), None)
    }

    fn start_child(&self, parent: &RecordedHandle, name: String) -> RecordedHandle {
        self.push(name, Some(parent.id))
    }

    fn set_attributes(&self, span: &RecordedHandle, attributes: Vec<KeyValue>) {
        self.with_span(span, |recorded| recorded.attributes.extend(attributes));
    }

    fn record_error(&self, span: &RecordedHandle, error: &dyn std::error::Error) {
        let message = error.to_string();
        self.with_span(span, |recorded| recorded.errors.push(message));
    }

    fn inject(&self, span: &RecordedHandle, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&recorded_traceparent(span.id)) {
            headers.insert("traceparent", value);
        }
    }

    fn end(&self, span: RecordedHandle) {
        self.with_span(&span, |recorded| {
            recorded.end_count = recorded.end_count.saturating_add(1);
        });
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Script {
    Status(u16),
    Fail,
    /// Even-numbered calls succeed with 200, odd-numbered calls fail.
    Alternate,
    Hang,
}

/// Executor that follows a script and tracks how many calls overlap.
#[derive(Debug)]
pub(crate) struct ScriptedExecutor {
    script: Script,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    traceparents: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new(script: Script, delay: Duration) -> Self {
        Self {
            script,
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            traceparents: Mutex::new(Vec::new()),
        }
    }

    /// `traceparent` values seen on requests, in call order.
    pub fn traceparents(&self) -> Vec<String> {
        self.traceparents
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpExecutor for ScriptedExecutor {
    async fn execute(&self, request: AttemptRequest) -> Result<AttemptResponse, AttemptError> {
        if let Some(value) = request.headers.get("traceparent")
            && let Ok(mut seen) = self.traceparents.lock()
        {
            seen.push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        match self.script {
            Script::Hang => std::future::pending::<()>().await,
            Script::Status(_) | Script::Fail | Script::Alternate => {
                tokio::time::sleep(self.delay).await;
            }
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.script {
            Script::Status(status) => Ok(AttemptResponse::status_only(status)),
            Script::Alternate if call % 2 == 0 => Ok(AttemptResponse::status_only(200)),
            Script::Fail | Script::Alternate | Script::Hang => {
                Err(TransportError::new("connection refused").into())
            }
        }
    }
}

pub(crate) struct ServerHandle {
    shutdown: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl ServerHandle {
    /// Request heads received so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _send_result = self.shutdown.send(());
        if let Some(handle) = self.thread.take() {
            drop(handle.join());
        }
    }
}

/// Spawns a blocking HTTP server answering every request with `status`.
pub(crate) fn spawn_http_server(status: u16) -> Result<(String, ServerHandle), String> {
    spawn_http_server_with_body_delay(status, Duration::ZERO)
}

/// Like [`spawn_http_server`], but holds the body back for `body_delay`
/// after the response head was sent.
pub(crate) fn spawn_http_server_with_body_delay(
    status: u16,
    body_delay: Duration,
) -> Result<(String, ServerHandle), String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("bind test server failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("server addr failed: {}", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| format!("set_nonblocking failed: {}", err))?;

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&requests);

    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            match listener.accept() {
                Ok((stream, _)) => {
                    let recorded = Arc::clone(&recorded);
                    thread::spawn(move || handle_client(stream, status, body_delay, &recorded));
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(5));
                }
                Err(_) => break,
            }
        }
    });

    Ok((
        format!("http://{}", addr),
        ServerHandle {
            shutdown: shutdown_tx,
            thread: Some(handle),
            requests,
        },
    ))
}

/// Returns a loopback address nothing is listening on.
pub(crate) fn closed_port_url() -> Result<String, String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("bind placeholder failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("placeholder addr failed: {}", err))?;
    drop(listener);
    Ok(format!("http://{}", addr))
}

fn handle_client(
    mut stream: TcpStream,
    status: u16,
    body_delay: Duration,
    recorded: &Mutex<Vec<String>>,
) {
    if stream.set_nonblocking(false).is_err() {
        return;
    }
    let mut head = Vec::new();
    let mut buffer = [0u8; 1024];
    while !head.windows(4).any(|window| window == b"\r\n\r\n") && head.len() < REQUEST_HEAD_LIMIT {
        match stream.read(&mut buffer) {
            Ok(0) | Err(_) => break,
            Ok(read) => head.extend_from_slice(buffer.get(..read).unwrap_or_default()),
        }
    }
    if let Ok(mut requests) = recorded.lock() {
        requests.push(String::from_utf8_lossy(&head).into_owned());
    }

    let response_head = format!(
        "HTTP/1.1 {} Test\r\nContent-Length: 2\r\nConnection: close\r\n\r\n",
        status
    );
    if stream.write_all(response_head.as_bytes()).is_err() || stream.flush().is_err() {
        return;
    }
    if !body_delay.is_zero() {
        thread::sleep(body_delay);
    }
    if stream.write_all(b"OK").is_err() || stream.flush().is_err() {
        return;
    }
    drop(stream.shutdown(Shutdown::Both));
}
