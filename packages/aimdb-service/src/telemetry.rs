//! LLM-observability spans around embedding and retrieval calls.
//!
//! A span is opened before the wrapped call and closed when its [`SpanGuard`] drops, so every exit
//! path (success, error, cancellation, panic unwind) hands exactly one span to the collector.
//! Output, metadata, and metrics are only recorded when the call succeeds. Collector failures are
//! logged and dropped; they never change the wrapped call's result.

use std::{
	collections::BTreeMap,
	fmt::Display,
	future::Future,
	sync::Arc,
	time::{Duration, Instant},
};

use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tracing::Instrument;

/// Spans drained from the queue per intake request.
const HTTP_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
	Embedding,
	Retrieval,
}
impl SpanKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Embedding => "embedding",
			Self::Retrieval => "retrieval",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
	Ok,
	Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySpan {
	pub name: String,
	pub kind: SpanKind,
	pub input: Option<Value>,
	pub output: Option<Value>,
	pub metadata: Map<String, Value>,
	pub metrics: Map<String, Value>,
	pub tags: BTreeMap<String, String>,
	pub start_ns: i64,
	pub duration_ns: u64,
	pub status: SpanStatus,
	pub error_message: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
	#[error("Span queue is full.")]
	QueueFull,
	#[error("Span queue is closed.")]
	Closed,
}

pub trait SpanCollector
where
	Self: Send + Sync,
{
	fn collect(&self, span: TelemetrySpan) -> Result<(), CollectError>;
}

pub struct NoopCollector;
impl SpanCollector for NoopCollector {
	fn collect(&self, _span: TelemetrySpan) -> Result<(), CollectError> {
		Ok(())
	}
}

/// Emits each closed span as a structured log event.
pub struct LogCollector;
impl SpanCollector for LogCollector {
	fn collect(&self, span: TelemetrySpan) -> Result<(), CollectError> {
		let metrics = Value::Object(span.metrics);

		tracing::info!(
			target: "aimdb::llmobs",
			name = %span.name,
			kind = span.kind.as_str(),
			status = ?span.status,
			duration_ns = span.duration_ns,
			metrics = %metrics,
			tags = ?span.tags,
			"Span closed."
		);

		Ok(())
	}
}

/// Queues spans for a background task that ships them to the span intake.
pub struct HttpCollector {
	sender: Sender<TelemetrySpan>,
}
impl HttpCollector {
	/// Must be called inside a Tokio runtime.
	pub fn spawn(client: Client, cfg: aimdb_config::Telemetry) -> Self {
		let (sender, receiver) = mpsc::channel(cfg.queue_capacity);

		tokio::spawn(drain_to_intake(client, cfg, receiver));

		Self { sender }
	}
}
impl SpanCollector for HttpCollector {
	fn collect(&self, span: TelemetrySpan) -> Result<(), CollectError> {
		self.sender.try_send(span).map_err(|err| match err {
			TrySendError::Full(_) => CollectError::QueueFull,
			TrySendError::Closed(_) => CollectError::Closed,
		})
	}
}

/// Shared, cheap-to-clone handle that opens spans tagged with the deployment environment.
#[derive(Clone)]
pub struct Telemetry {
	collector: Arc<dyn SpanCollector>,
	tags: BTreeMap<String, String>,
}
impl Telemetry {
	pub fn new(collector: Arc<dyn SpanCollector>, env: &str, ml_app: &str) -> Self {
		let tags = BTreeMap::from([
			("env".to_string(), env.to_string()),
			("ml_app".to_string(), ml_app.to_string()),
		]);

		Self { collector, tags }
	}

	pub fn disabled() -> Self {
		Self::new(Arc::new(NoopCollector), "none", "aimdb")
	}

	/// Picks the collector named by `telemetry.collector`. The HTTP collector spawns its drain
	/// task, so this must run inside a Tokio runtime when that collector is configured.
	pub fn from_config(cfg: &aimdb_config::Telemetry, client: Client) -> Self {
		let collector: Arc<dyn SpanCollector> = match cfg.collector.as_str() {
			"http" => Arc::new(HttpCollector::spawn(client, cfg.clone())),
			"log" => Arc::new(LogCollector),
			_ => Arc::new(NoopCollector),
		};

		Self::new(collector, &cfg.env, &cfg.ml_app)
	}

	pub fn open(&self, kind: SpanKind, name: &str) -> SpanGuard {
		let span = TelemetrySpan {
			name: name.to_string(),
			kind,
			input: None,
			output: None,
			metadata: Map::new(),
			metrics: Map::new(),
			tags: self.tags.clone(),
			start_ns: OffsetDateTime::now_utc().unix_timestamp_nanos() as i64,
			duration_ns: 0,
			status: SpanStatus::Ok,
			error_message: None,
		};

		SpanGuard {
			span: Some(span),
			started: Instant::now(),
			finished: false,
			collector: self.collector.clone(),
		}
	}

	/// Runs `call` inside a span. `annotate` sees the successful value only.
	pub async fn with_span<T, E, Fut, A>(
		&self,
		kind: SpanKind,
		name: &str,
		input: Option<Value>,
		call: Fut,
		annotate: A,
	) -> Result<T, E>
	where
		Fut: Future<Output = Result<T, E>>,
		E: Display,
		A: FnOnce(&T, &mut SpanGuard),
	{
		let mut guard = self.open(kind, name);

		if let Some(input) = input {
			guard.set_input(input);
		}

		let result = call
			.instrument(tracing::info_span!("llmobs", span_name = name, kind = kind.as_str()))
			.await;

		match &result {
			Ok(value) => {
				annotate(value, &mut guard);
				guard.finish();
			},
			Err(err) => guard.fail(err),
		}

		result
	}
}

/// Open span. Dropping the guard closes the span and hands it to the collector; a guard dropped
/// before [`SpanGuard::finish`] or [`SpanGuard::fail`] reports the call as cancelled.
pub struct SpanGuard {
	span: Option<TelemetrySpan>,
	started: Instant,
	finished: bool,
	collector: Arc<dyn SpanCollector>,
}
impl SpanGuard {
	pub fn set_input(&mut self, input: Value) {
		if let Some(span) = self.span.as_mut() {
			span.input = Some(input);
		}
	}

	pub fn set_output(&mut self, output: Value) {
		if let Some(span) = self.span.as_mut() {
			span.output = Some(output);
		}
	}

	pub fn metadata(&mut self, key: &str, value: impl Into<Value>) {
		if let Some(span) = self.span.as_mut() {
			span.metadata.insert(key.to_string(), value.into());
		}
	}

	pub fn metric(&mut self, key: &str, value: impl Into<Value>) {
		if let Some(span) = self.span.as_mut() {
			span.metrics.insert(key.to_string(), value.into());
		}
	}

	/// Marks the wrapped call as completed successfully.
	pub fn finish(&mut self) {
		self.finished = true;

		if let Some(span) = self.span.as_mut() {
			span.status = SpanStatus::Ok;
		}
	}

	/// Marks the span failed and discards anything but its input.
	pub fn fail(&mut self, err: &dyn Display) {
		self.finished = true;

		if let Some(span) = self.span.as_mut() {
			span.status = SpanStatus::Error;
			span.error_message = Some(err.to_string());
			span.output = None;
			span.metadata.clear();
			span.metrics.clear();
		}
	}
}
impl Drop for SpanGuard {
	fn drop(&mut self) {
		if !self.finished {
			self.fail(&"cancelled");
		}

		let Some(mut span) = self.span.take() else {
			return;
		};

		span.duration_ns = duration_ns(self.started.elapsed());

		let name = span.name.clone();

		if let Err(err) = self.collector.collect(span) {
			tracing::warn!(error = %err, span = %name, "Dropped telemetry span.");
		}
	}
}

fn duration_ns(elapsed: Duration) -> u64 {
	u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
}

async fn drain_to_intake(
	client: Client,
	cfg: aimdb_config::Telemetry,
	mut receiver: Receiver<TelemetrySpan>,
) {
	let mut batch = Vec::with_capacity(HTTP_BATCH_SIZE);

	while receiver.recv_many(&mut batch, HTTP_BATCH_SIZE).await > 0 {
		let spans = batch.drain(..).map(|span| intake_span(&span)).collect::<Vec<_>>();
		let count = spans.len();

		if let Err(err) = aimdb_providers::llmobs::submit_spans(&client, &cfg, spans).await {
			tracing::warn!(error = %err, count, "Failed to submit telemetry spans.");
		}
	}

	tracing::debug!("Telemetry span queue closed.");
}

/// Renders a span in the intake's per-span layout.
pub fn intake_span(span: &TelemetrySpan) -> Value {
	let (span_id, trace_id) = uuid::Uuid::new_v4().as_u64_pair();
	let mut meta = Map::new();

	meta.insert("span.kind".to_string(), Value::from(span.kind.as_str()));

	if let Some(input) = span.input.as_ref() {
		meta.insert("input".to_string(), serde_json::json!({ "value": input }));
	}
	if let Some(output) = span.output.as_ref() {
		meta.insert("output".to_string(), serde_json::json!({ "value": output }));
	}
	if let Some(message) = span.error_message.as_ref() {
		meta.insert("error.message".to_string(), Value::from(message.as_str()));
	}

	meta.insert("metadata".to_string(), Value::Object(span.metadata.clone()));

	serde_json::json!({
		"name": span.name,
		"span_id": span_id.to_string(),
		"trace_id": trace_id.to_string(),
		"parent_id": "undefined",
		"start_ns": span.start_ns,
		"duration": span.duration_ns,
		"status": match span.status {
			SpanStatus::Ok => "ok",
			SpanStatus::Error => "error",
		},
		"meta": meta,
		"metrics": span.metrics,
		"tags": span.tags.iter().map(|(key, value)| format!("{key}:{value}")).collect::<Vec<_>>(),
	})
}
