use qdrant_client::qdrant::{
	CountPointsBuilder, Distance, VectorParams, vectors_config::Config as VectorsConfig,
};

use crate::{Error, Result};

pub const MOVIE_ID_FIELD: &str = "movie_id";
pub const TITLE_FIELD: &str = "title";
pub const PLOT_FIELD: &str = "plot";

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_name: String,
	pub vector_dim: u32,
	pub distance: Distance,
}
impl QdrantStore {
	pub fn new(cfg: &aimdb_config::Qdrant) -> Result<Self> {
		let mut builder = qdrant_client::Qdrant::from_url(&cfg.url);

		if let Some(api_key) = cfg.api_key.as_deref() {
			builder = builder.api_key(api_key);
		}

		let client = builder.build()?;

		Ok(Self {
			client,
			collection: cfg.collection.clone(),
			vector_name: cfg.vector_name.clone(),
			vector_dim: cfg.vector_dim,
			distance: parse_distance(&cfg.distance)?,
		})
	}

	/// Fails unless the collection's named vector has the configured size and metric.
	pub async fn verify_collection(&self) -> Result<()> {
		let info = self.client.collection_info(self.collection.clone()).await?;
		let params = info
			.result
			.and_then(|info| info.config)
			.and_then(|config| config.params)
			.and_then(|params| params.vectors_config)
			.and_then(|vectors| vectors.config)
			.ok_or_else(|| {
				let collection = &self.collection;

				Error::Schema(format!("Collection {collection} has no vector configuration."))
			})?;
		let vector = match params {
			VectorsConfig::ParamsMap(map) => map.map.get(&self.vector_name).cloned(),
			VectorsConfig::Params(_) => None,
		}
		.ok_or_else(|| {
			Error::Schema(format!(
				"Collection {} has no named vector {}.",
				self.collection, self.vector_name
			))
		})?;

		check_vector_params(&vector, self.vector_dim, self.distance)?;

		tracing::info!(
			collection = %self.collection,
			vector_name = %self.vector_name,
			vector_dim = self.vector_dim,
			"Qdrant collection verified."
		);

		Ok(())
	}

	/// Approximate point count, cheap enough to run before an exhaustive scan.
	pub async fn approximate_count(&self) -> Result<u64> {
		let response = self
			.client
			.count(CountPointsBuilder::new(self.collection.clone()).exact(false))
			.await?;

		Ok(response.result.map(|result| result.count).unwrap_or(0))
	}
}

pub fn parse_distance(raw: &str) -> Result<Distance> {
	match raw {
		"cosine" => Ok(Distance::Cosine),
		"dot" => Ok(Distance::Dot),
		other => Err(Error::InvalidArgument(format!("Unsupported distance {other}."))),
	}
}

fn check_vector_params(params: &VectorParams, vector_dim: u32, distance: Distance) -> Result<()> {
	if params.size != u64::from(vector_dim) {
		return Err(Error::Schema(format!(
			"Vector size is {} but {} is configured.",
			params.size, vector_dim
		)));
	}
	if params.distance != distance as i32 {
		return Err(Error::Schema(format!(
			"Vector distance is {} but {} is configured.",
			params.distance, distance as i32
		)));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn params(size: u64, distance: Distance) -> VectorParams {
		VectorParams { size, distance: distance as i32, ..Default::default() }
	}

	#[test]
	fn accepts_matching_vector_params() {
		check_vector_params(&params(768, Distance::Cosine), 768, Distance::Cosine)
			.expect("Matching params must pass.");
	}

	#[test]
	fn rejects_size_mismatch() {
		let err = check_vector_params(&params(1_536, Distance::Cosine), 768, Distance::Cosine)
			.expect_err("Size mismatch must fail.");

		assert!(err.to_string().contains("Vector size is 1536"));
	}

	#[test]
	fn rejects_metric_mismatch() {
		let err = check_vector_params(&params(768, Distance::Dot), 768, Distance::Cosine)
			.expect_err("Metric mismatch must fail.");

		assert!(matches!(err, Error::Schema(_)));
	}

	#[test]
	fn parses_known_distances() {
		assert_eq!(parse_distance("cosine").expect("cosine"), Distance::Cosine);
		assert_eq!(parse_distance("dot").expect("dot"), Distance::Dot);
		assert!(parse_distance("manhattan").is_err());
	}
}
