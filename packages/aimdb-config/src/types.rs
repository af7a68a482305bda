use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub search: Search,
	pub telemetry: Telemetry,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	/// Upper bound for one similarity request, embedding and index query included.
	#[serde(default = "default_request_timeout_ms")]
	pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub api_key: Option<String>,
	pub collection: String,
	#[serde(default = "default_vector_name")]
	pub vector_name: String,
	pub vector_dim: u32,
	/// Must be the metric the collection was built with: "cosine" or "dot".
	#[serde(default = "default_distance")]
	pub distance: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	#[serde(default = "default_task_type")]
	pub task_type: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Search {
	pub limit: u32,
	/// Candidate pool handed to the approximate index. Ignored by exact search.
	pub num_candidates: u32,
	pub exact_timeout_ms: u64,
	/// Exact search refuses to scan collections larger than this.
	pub exact_max_corpus: Option<u64>,
}
impl Default for Search {
	fn default() -> Self {
		Self { limit: 10, num_candidates: 150, exact_timeout_ms: 5_000, exact_max_corpus: None }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Telemetry {
	pub env: String,
	#[serde(default = "default_ml_app")]
	pub ml_app: String,
	/// One of "off", "log", or "http".
	pub collector: String,
	pub intake_url: Option<String>,
	pub api_key: Option<String>,
	#[serde(default = "default_telemetry_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default = "default_queue_capacity")]
	pub queue_capacity: usize,
}

fn default_request_timeout_ms() -> u64 {
	15_000
}

fn default_vector_name() -> String {
	"plot_embedding".to_string()
}

fn default_distance() -> String {
	"cosine".to_string()
}

fn default_task_type() -> String {
	"RETRIEVAL_DOCUMENT".to_string()
}

fn default_ml_app() -> String {
	"aimdb".to_string()
}

fn default_telemetry_timeout_ms() -> u64 {
	2_000
}

fn default_queue_capacity() -> usize {
	1_024
}
