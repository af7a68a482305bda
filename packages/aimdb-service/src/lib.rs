pub mod catalog;
pub mod embedder;
pub mod retrieval;
pub mod similarity;
pub mod telemetry;

mod error;

pub use aimdb_providers::embedding::Embedding;
pub use catalog::{
	CountResponse, DeleteResponse, GenreResponse, InsertResponse, ListRequest, ListResponse,
	MovieResponse, SearchResponse, TitleQuery, UpdateResponse,
};
pub use embedder::{Embedder, EmbeddingVector};
pub use error::{Error, Result};
pub use retrieval::{Query, Retriever, SimilarRequest, SimilarResponse};
pub use similarity::{Candidate, IndexQuery, SearchMode, SimilarityIndexClient};
pub use telemetry::{SpanCollector, SpanKind, Telemetry, TelemetrySpan};

use std::{future::Future, pin::Pin, sync::Arc};

use reqwest::Client;

use aimdb_config::{Config, EmbeddingProviderConfig};
use aimdb_providers::embedding;
use aimdb_storage::db::Db;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, aimdb_providers::Result<Vec<Embedding>>>;
}

/// Vector-search-capable store holding the pre-embedded corpus.
pub trait VectorIndex
where
	Self: Send + Sync,
{
	/// Dimensionality the index was built with.
	fn dimension(&self) -> u32;

	fn corpus_size(&self) -> BoxFuture<'_, Result<u64>>;

	fn search<'a>(&'a self, query: IndexQuery<'a>) -> BoxFuture<'a, Result<Vec<Candidate>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
}

pub struct AimdbService {
	pub cfg: Config,
	pub db: Db,
	pub retriever: Retriever,
}

struct DefaultProviders {
	client: Client,
}

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, aimdb_providers::Result<Vec<Embedding>>> {
		Box::pin(embedding::embed(&self.client, cfg, texts))
	}
}

impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>) -> Self {
		Self { embedding }
	}

	/// Providers backed by the real HTTP APIs, sharing one connection pool.
	pub fn with_client(client: Client) -> Self {
		Self { embedding: Arc::new(DefaultProviders { client }) }
	}
}

impl Default for Providers {
	fn default() -> Self {
		Self::with_client(Client::new())
	}
}

impl AimdbService {
	pub fn new(
		cfg: Config,
		db: Db,
		index: Arc<dyn VectorIndex>,
		providers: Providers,
		telemetry: Telemetry,
	) -> Self {
		let retriever = Retriever::from_config(&cfg, providers, index, telemetry);

		Self { cfg, db, retriever }
	}
}
