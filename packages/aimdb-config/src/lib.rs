mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, Postgres, Providers, Qdrant, Search, Service, Storage,
	Telemetry,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.request_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "service.request_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.vector_name.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.vector_name must be non-empty.".to_string(),
		});
	}
	if !matches!(cfg.storage.qdrant.distance.as_str(), "cosine" | "dot") {
		return Err(Error::Validation {
			message: "storage.qdrant.distance must be one of cosine or dot.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.task_type.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.task_type must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.search.limit == 0 {
		return Err(Error::Validation {
			message: "search.limit must be greater than zero.".to_string(),
		});
	}
	if cfg.search.num_candidates < cfg.search.limit {
		return Err(Error::Validation {
			message: "search.num_candidates must be greater than or equal to search.limit."
				.to_string(),
		});
	}
	if cfg.search.exact_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "search.exact_timeout_ms must be greater than zero.".to_string(),
		});
	}

	if let Some(max) = cfg.search.exact_max_corpus
		&& max == 0
	{
		return Err(Error::Validation {
			message: "search.exact_max_corpus must be greater than zero.".to_string(),
		});
	}

	match cfg.telemetry.collector.as_str() {
		"off" | "log" => {},
		"http" => {
			for (label, value) in [
				("telemetry.intake_url", &cfg.telemetry.intake_url),
				("telemetry.api_key", &cfg.telemetry.api_key),
			] {
				if value.is_none() {
					return Err(Error::Validation {
						message: format!("{label} must be set when telemetry.collector is http."),
					});
				}
			}
		},
		_ => {
			return Err(Error::Validation {
				message: "telemetry.collector must be one of off, log, or http.".to_string(),
			});
		},
	}

	if cfg.telemetry.queue_capacity == 0 {
		return Err(Error::Validation {
			message: "telemetry.queue_capacity must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.storage.qdrant.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.storage.qdrant.api_key = None;
	}
	if cfg.telemetry.intake_url.as_deref().map(|url| url.trim().is_empty()).unwrap_or(false) {
		cfg.telemetry.intake_url = None;
	}
	if cfg.telemetry.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.telemetry.api_key = None;
	}
}
