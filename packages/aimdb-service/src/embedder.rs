use std::sync::Arc;

use aimdb_config::EmbeddingProviderConfig;

use crate::{EmbeddingProvider, Error, Result, SpanKind, Telemetry};

const SPAN_NAME: &str = "embed_text";

/// Query embedding plus the provider's usage statistic for it.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector {
	pub values: Vec<f32>,
	pub token_count: u32,
}
impl EmbeddingVector {
	pub fn dimension(&self) -> usize {
		self.values.len()
	}
}

pub struct Embedder {
	provider: Arc<dyn EmbeddingProvider>,
	cfg: EmbeddingProviderConfig,
	telemetry: Telemetry,
}
impl Embedder {
	pub fn new(
		provider: Arc<dyn EmbeddingProvider>,
		cfg: EmbeddingProviderConfig,
		telemetry: Telemetry,
	) -> Self {
		Self { provider, cfg, telemetry }
	}

	pub fn dimensions(&self) -> u32 {
		self.cfg.dimensions
	}

	/// Embeds `text` as a one-item batch. No retries; every failure reaches the caller.
	pub async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
		if text.is_empty() {
			return Err(Error::InvalidInput {
				message: "Text to embed must be non-empty.".to_string(),
			});
		}

		let texts = [text.to_string()];
		let call = async {
			let embeddings = self.provider.embed(&self.cfg, &texts).await?;

			single_embedding(embeddings, self.cfg.dimensions)
		};

		self.telemetry
			.with_span(
				SpanKind::Embedding,
				SPAN_NAME,
				Some(serde_json::Value::from(text)),
				call,
				|vector, span| {
					span.set_output(serde_json::json!(vector.values));
					span.metadata(
						SPAN_NAME,
						format!("embedded {text} using {}", self.cfg.model),
					);
					span.metadata("model_name", self.cfg.model.as_str());
					span.metadata("model_provider", self.cfg.provider_id.as_str());
					span.metric("total_tokens", vector.token_count);
				},
			)
			.await
	}
}

fn single_embedding(
	embeddings: Vec<aimdb_providers::embedding::Embedding>,
	dimensions: u32,
) -> Result<EmbeddingVector> {
	if embeddings.len() != 1 {
		return Err(Error::ProviderContractViolation {
			message: format!("Expected one embedding for one input, got {}.", embeddings.len()),
		});
	}

	let Some(embedding) = embeddings.into_iter().next() else {
		return Err(Error::ProviderContractViolation {
			message: "Embedding provider returned no vectors.".to_string(),
		});
	};

	if embedding.values.len() != dimensions as usize {
		return Err(Error::ProviderContractViolation {
			message: format!(
				"Embedding has {} dimensions but {dimensions} were requested.",
				embedding.values.len()
			),
		});
	}

	Ok(EmbeddingVector { values: embedding.values, token_count: embedding.token_count })
}
