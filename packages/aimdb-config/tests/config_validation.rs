use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use aimdb_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let mut table = root.as_table_mut().expect("Template config must be a table.");

	for part in section.split('.') {
		table = table
			.get_mut(part)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Template config must include [{section}]."));
	}

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("aimdb_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_payload(payload: String) -> aimdb_config::Result<Config> {
	let path = write_temp_config(payload);
	let result = aimdb_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn expect_validation(payload: String, needle: &str) {
	let err = load_payload(payload).expect_err("Expected validation error.");

	assert!(matches!(err, Error::Validation { .. }), "Unexpected error kind: {err:?}");

	let message = err.to_string();

	assert!(message.contains(needle), "Unexpected error message: {message}");
}

#[test]
fn sample_config_loads_and_normalizes_blank_secrets() {
	let cfg = load_payload(SAMPLE_CONFIG_TEMPLATE_TOML.to_string())
		.expect("Sample config must load.");

	assert_eq!(cfg.search.limit, 10);
	assert_eq!(cfg.search.num_candidates, 150);
	assert_eq!(cfg.storage.qdrant.vector_name, "plot_embedding");
	assert_eq!(cfg.providers.embedding.task_type, "RETRIEVAL_DOCUMENT");
	assert!(cfg.storage.qdrant.api_key.is_none());
	assert!(cfg.telemetry.intake_url.is_none());
	assert!(cfg.telemetry.api_key.is_none());
}

#[test]
fn search_section_defaults_when_omitted() {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");

	root.as_table_mut().expect("Template config must be a table.").remove("search");

	let cfg: Config = toml::from_str(&toml::to_string(&root).expect("Failed to render config."))
		.expect("Config without [search] must parse.");

	assert_eq!(cfg.search.limit, 10);
	assert_eq!(cfg.search.num_candidates, 150);
	assert_eq!(cfg.search.exact_timeout_ms, 5_000);
	assert!(cfg.search.exact_max_corpus.is_none());
	aimdb_config::validate(&cfg).expect("Default search config must validate.");
}

#[test]
fn embedding_dimensions_must_match_vector_dim() {
	expect_validation(
		sample_toml_with("providers.embedding", "dimensions", Value::Integer(1_536)),
		"providers.embedding.dimensions must match storage.qdrant.vector_dim.",
	);
}

#[test]
fn embedding_dimensions_must_be_positive() {
	expect_validation(
		sample_toml_with("providers.embedding", "dimensions", Value::Integer(0)),
		"providers.embedding.dimensions must be greater than zero.",
	);
}

#[test]
fn num_candidates_must_cover_limit() {
	expect_validation(
		sample_toml_with("search", "num_candidates", Value::Integer(5)),
		"search.num_candidates must be greater than or equal to search.limit.",
	);
}

#[test]
fn search_limit_must_be_positive() {
	expect_validation(
		sample_toml_with("search", "limit", Value::Integer(0)),
		"search.limit must be greater than zero.",
	);
}

#[test]
fn exact_max_corpus_must_be_positive_when_set() {
	expect_validation(
		sample_toml_with("search", "exact_max_corpus", Value::Integer(0)),
		"search.exact_max_corpus must be greater than zero.",
	);
}

#[test]
fn distance_must_be_known() {
	expect_validation(
		sample_toml_with("storage.qdrant", "distance", Value::String("euclid".to_string())),
		"storage.qdrant.distance must be one of cosine or dot.",
	);
}

#[test]
fn http_collector_requires_intake_url() {
	expect_validation(
		sample_toml_with("telemetry", "collector", Value::String("http".to_string())),
		"telemetry.intake_url must be set when telemetry.collector is http.",
	);
}

#[test]
fn unknown_collector_is_rejected() {
	expect_validation(
		sample_toml_with("telemetry", "collector", Value::String("statsd".to_string())),
		"telemetry.collector must be one of off, log, or http.",
	);
}

#[test]
fn embedding_api_key_must_be_non_empty() {
	expect_validation(
		sample_toml_with("providers.embedding", "api_key", Value::String("  ".to_string())),
		"Provider embedding api_key must be non-empty.",
	);
}

#[test]
fn missing_file_reports_path() {
	let path = env::temp_dir().join("aimdb_config_test_missing.toml");
	let err = aimdb_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }));
	assert!(err.to_string().contains("aimdb_config_test_missing.toml"));
}
