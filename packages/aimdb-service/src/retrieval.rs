use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use aimdb_config::Config;

use crate::{
	AimdbService, Candidate, Embedder, Error, Providers, Result, SearchMode,
	SimilarityIndexClient, Telemetry, VectorIndex,
};

/// Free-text query, optionally excluding the document it was taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
	pub text: String,
	pub exclude_self_text: Option<String>,
}
impl Query {
	/// A query that must not match the document whose plot is `text` itself.
	pub fn excluding_self(text: impl Into<String>) -> Self {
		let text = text.into();

		Self { exclude_self_text: Some(text.clone()), text }
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarRequest {
	#[serde(default)]
	pub plot: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarResponse {
	pub similar_movies: Vec<Candidate>,
}

/// Embed-then-search pipeline shared by every similarity endpoint.
pub struct Retriever {
	embedder: Embedder,
	index: SimilarityIndexClient,
	limit: u32,
	num_candidates: u32,
	request_timeout: Duration,
}
impl Retriever {
	pub fn new(
		embedder: Embedder,
		index: SimilarityIndexClient,
		search: &aimdb_config::Search,
		request_timeout: Duration,
	) -> Self {
		Self {
			embedder,
			index,
			limit: search.limit,
			num_candidates: search.num_candidates,
			request_timeout,
		}
	}

	pub fn from_config(
		cfg: &Config,
		providers: Providers,
		index: Arc<dyn VectorIndex>,
		telemetry: Telemetry,
	) -> Self {
		let embedder =
			Embedder::new(providers.embedding, cfg.providers.embedding.clone(), telemetry.clone());
		let index = SimilarityIndexClient::new(index, &cfg.search, telemetry);

		Self::new(
			embedder,
			index,
			&cfg.search,
			Duration::from_millis(cfg.service.request_timeout_ms),
		)
	}

	pub fn approximate_mode(&self) -> SearchMode {
		SearchMode::Approximate { num_candidates: self.num_candidates }
	}

	pub async fn retrieve_similar(
		&self,
		query_text: &str,
		mode: SearchMode,
	) -> Result<Vec<Candidate>> {
		self.retrieve(&Query::excluding_self(query_text), mode).await
	}

	pub async fn retrieve(&self, query: &Query, mode: SearchMode) -> Result<Vec<Candidate>> {
		if query.text.is_empty() {
			return Err(Error::InvalidInput {
				message: "Query text must be non-empty.".to_string(),
			});
		}

		let pipeline = async {
			let vector = self.embedder.embed(&query.text).await?;

			self.index
				.search(&vector, mode, &query.text, query.exclude_self_text.as_deref(), self.limit)
				.await
		};
		let candidates = tokio::time::timeout(self.request_timeout, pipeline).await.map_err(|_| {
			Error::QueryTimeout {
				message: format!(
					"Similarity request did not finish within {} ms.",
					self.request_timeout.as_millis()
				),
			}
		})??;

		tracing::debug!(
			mode = mode.label(),
			results = candidates.len(),
			"Similarity retrieval completed."
		);

		Ok(candidates)
	}
}

impl AimdbService {
	pub async fn similar_movies(
		&self,
		req: SimilarRequest,
		mode: SearchMode,
	) -> Result<SimilarResponse> {
		let similar_movies = self.retriever.retrieve_similar(&req.plot, mode).await?;

		Ok(SimilarResponse { similar_movies })
	}
}
