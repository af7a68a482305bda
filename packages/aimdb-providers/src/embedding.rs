use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// One embedding returned by the model, with its usage statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
	pub values: Vec<f32>,
	pub token_count: u32,
	pub truncated: bool,
}

pub async fn embed(
	client: &Client,
	cfg: &aimdb_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Embedding>> {
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let instances = texts
		.iter()
		.map(|text| serde_json::json!({ "content": text, "task_type": cfg.task_type }))
		.collect::<Vec<_>>();
	let body = serde_json::json!({
		"instances": instances,
		"parameters": { "outputDimensionality": cfg.dimensions },
	});
	let res = client
		.post(url)
		.timeout(Duration::from_millis(cfg.timeout_ms))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json = crate::read_json(res).await?;
	let embeddings = parse_embedding_response(json)?;

	if embeddings.len() != texts.len() {
		return Err(Error::InvalidResponse {
			message: format!(
				"Embedding provider returned {} embeddings for {} inputs.",
				embeddings.len(),
				texts.len()
			),
		});
	}

	Ok(embeddings)
}

fn parse_embedding_response(json: Value) -> Result<Vec<Embedding>> {
	let predictions = json.get("predictions").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse {
			message: "Embedding response is missing predictions array.".to_string(),
		}
	})?;
	let mut out = Vec::with_capacity(predictions.len());

	for prediction in predictions {
		let embeddings = prediction.get("embeddings").ok_or_else(|| Error::InvalidResponse {
			message: "Embedding prediction is missing embeddings object.".to_string(),
		})?;
		let values =
			embeddings.get("values").and_then(|v| v.as_array()).ok_or_else(|| {
				Error::InvalidResponse {
					message: "Embedding prediction is missing values array.".to_string(),
				}
			})?;
		let mut vec = Vec::with_capacity(values.len());

		for value in values {
			let number = value.as_f64().ok_or_else(|| Error::InvalidResponse {
				message: "Embedding value must be numeric.".to_string(),
			})?;

			vec.push(number as f32);
		}

		let statistics = embeddings.get("statistics");
		let token_count = statistics
			.and_then(|s| s.get("token_count"))
			.and_then(|v| v.as_f64())
			.map(|v| v as u32)
			.unwrap_or(0);
		let truncated =
			statistics.and_then(|s| s.get("truncated")).and_then(|v| v.as_bool()).unwrap_or(false);

		out.push(Embedding { values: vec, token_count, truncated });
	}

	Ok(out)
}
