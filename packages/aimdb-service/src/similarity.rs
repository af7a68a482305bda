use std::{collections::HashMap, sync::Arc, time::Duration};

use qdrant_client::qdrant::{
	Condition, Filter, PayloadIncludeSelector, Query, QueryPointsBuilder, ScoredPoint,
	SearchParamsBuilder, Value, point_id::PointIdOptions, value::Kind,
	with_payload_selector::SelectorOptions,
};
use serde::{Deserialize, Serialize};

use aimdb_storage::qdrant::{MOVIE_ID_FIELD, PLOT_FIELD, QdrantStore, TITLE_FIELD};

use crate::{BoxFuture, EmbeddingVector, Error, Result, SpanKind, Telemetry, VectorIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
	/// Managed ANN search over a candidate pool of `num_candidates`.
	Approximate { num_candidates: u32 },
	/// Exhaustive scan returning the true top results.
	Exact,
}
impl SearchMode {
	pub fn span_name(self) -> &'static str {
		match self {
			Self::Approximate { .. } => "vector_search",
			Self::Exact => "exact_vector_search",
		}
	}

	pub fn label(self) -> &'static str {
		match self {
			Self::Approximate { .. } => "approximate",
			Self::Exact => "exact",
		}
	}
}

/// One ranked match. The indexed vector is never part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
	#[serde(rename = "_id")]
	pub id: String,
	pub title: String,
	pub plot: String,
	pub score: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct IndexQuery<'a> {
	pub vector: &'a [f32],
	pub mode: SearchMode,
	/// Documents whose plot equals this text are filtered out inside the index query.
	pub exclude_plot: Option<&'a str>,
	pub limit: u32,
	/// Server-side budget for the query, when the backend supports one.
	pub timeout: Option<Duration>,
}

pub struct SimilarityIndexClient {
	index: Arc<dyn VectorIndex>,
	telemetry: Telemetry,
	exact_timeout: Duration,
	exact_max_corpus: Option<u64>,
}
impl SimilarityIndexClient {
	pub fn new(
		index: Arc<dyn VectorIndex>,
		cfg: &aimdb_config::Search,
		telemetry: Telemetry,
	) -> Self {
		Self {
			index,
			telemetry,
			exact_timeout: Duration::from_millis(cfg.exact_timeout_ms),
			exact_max_corpus: cfg.exact_max_corpus,
		}
	}

	pub fn dimension(&self) -> u32 {
		self.index.dimension()
	}

	/// `query_text` labels the span; only `exclude_text` filters documents.
	pub async fn search(
		&self,
		vector: &EmbeddingVector,
		mode: SearchMode,
		query_text: &str,
		exclude_text: Option<&str>,
		limit: u32,
	) -> Result<Vec<Candidate>> {
		let expected = self.index.dimension();

		if vector.dimension() == 0 || vector.dimension() != expected as usize {
			return Err(Error::DimensionMismatch { expected, actual: vector.dimension() });
		}
		if limit == 0 {
			return Err(Error::InvalidInput {
				message: "Search limit must be greater than zero.".to_string(),
			});
		}
		if let SearchMode::Approximate { num_candidates } = mode
			&& num_candidates < limit
		{
			return Err(Error::InvalidInput {
				message: format!(
					"Candidate pool of {num_candidates} is smaller than the limit of {limit}."
				),
			});
		}

		let query = IndexQuery {
			vector: &vector.values,
			mode,
			exclude_plot: exclude_text,
			limit,
			timeout: matches!(mode, SearchMode::Exact).then_some(self.exact_timeout),
		};
		let span_name = mode.span_name();

		self.telemetry
			.with_span(
				SpanKind::Retrieval,
				span_name,
				Some(serde_json::json!(vector.values)),
				self.run(query),
				|candidates, span| {
					span.set_output(traced_candidates(candidates));
					span.metadata(span_name, search_label(mode, query_text));
					span.metric("result_count", candidates.len());
				},
			)
			.await
	}

	async fn run(&self, query: IndexQuery<'_>) -> Result<Vec<Candidate>> {
		match query.mode {
			SearchMode::Approximate { .. } => self.index.search(query).await,
			SearchMode::Exact => {
				if let Some(max) = self.exact_max_corpus {
					let size = self.index.corpus_size().await?;

					if size > max {
						return Err(Error::QueryTimeout {
							message: format!(
								"Exact search over {size} documents exceeds the bound of {max}."
							),
						});
					}
				}

				tokio::time::timeout(self.exact_timeout, self.index.search(query)).await.map_err(
					|_| Error::QueryTimeout {
						message: format!(
							"Exact search did not finish within {} ms.",
							self.exact_timeout.as_millis()
						),
					},
				)?
			},
		}
	}
}

impl VectorIndex for QdrantStore {
	fn dimension(&self) -> u32 {
		self.vector_dim
	}

	fn corpus_size(&self) -> BoxFuture<'_, Result<u64>> {
		Box::pin(async move { Ok(self.approximate_count().await?) })
	}

	fn search<'a>(&'a self, query: IndexQuery<'a>) -> BoxFuture<'a, Result<Vec<Candidate>>> {
		Box::pin(async move {
			let request = build_query(&self.collection, &self.vector_name, &query);
			let response = self.client.query(request).await?;

			Ok(response.result.into_iter().map(candidate_from_point).collect())
		})
	}
}

fn build_query(collection: &str, vector_name: &str, query: &IndexQuery<'_>) -> QueryPointsBuilder {
	let params = match query.mode {
		SearchMode::Approximate { num_candidates } =>
			SearchParamsBuilder::default().hnsw_ef(u64::from(num_candidates)).exact(false),
		SearchMode::Exact => SearchParamsBuilder::default().exact(true),
	};
	let mut builder = QueryPointsBuilder::new(collection.to_string())
		.query(Query::new_nearest(query.vector.to_vec()))
		.using(vector_name)
		.params(params)
		.limit(u64::from(query.limit))
		.with_payload(projection())
		.with_vectors(false);

	if let Some(plot) = query.exclude_plot {
		builder =
			builder.filter(Filter::must_not([Condition::matches(PLOT_FIELD, plot.to_string())]));
	}
	if let Some(timeout) = query.timeout {
		builder = builder.timeout(server_timeout_secs(timeout));
	}

	builder
}

fn projection() -> SelectorOptions {
	SelectorOptions::Include(PayloadIncludeSelector {
		fields: [MOVIE_ID_FIELD, TITLE_FIELD, PLOT_FIELD].map(str::to_string).to_vec(),
	})
}

/// Whole seconds for the server-side budget, rounded up so it never undercuts the client one.
fn server_timeout_secs(timeout: Duration) -> u64 {
	u64::try_from(timeout.as_millis().div_ceil(1_000)).unwrap_or(u64::MAX).max(1)
}

fn search_label(mode: SearchMode, query_text: &str) -> String {
	format!("{} vector search on \"{query_text}\"", mode.label())
}

fn candidate_from_point(point: ScoredPoint) -> Candidate {
	let id = payload_string(&point.payload, MOVIE_ID_FIELD)
		.or_else(|| point.id.as_ref().and_then(point_id_string))
		.unwrap_or_default();

	Candidate {
		id,
		title: payload_string(&point.payload, TITLE_FIELD).unwrap_or_default(),
		plot: payload_string(&point.payload, PLOT_FIELD).unwrap_or_default(),
		score: point.score,
	}
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	match &payload.get(key)?.kind {
		Some(Kind::StringValue(text)) => Some(text.clone()),
		_ => None,
	}
}

fn point_id_string(point_id: &qdrant_client::qdrant::PointId) -> Option<String> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Some(id.clone()),
		Some(PointIdOptions::Num(id)) => Some(id.to_string()),
		None => None,
	}
}

fn traced_candidates(candidates: &[Candidate]) -> serde_json::Value {
	candidates
		.iter()
		.map(|candidate| {
			serde_json::json!({
				"id": candidate.id,
				"score": candidate.score,
				"text": candidate.plot,
				"name": candidate.title,
			})
		})
		.collect()
}
