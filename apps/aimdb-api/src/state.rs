use std::sync::Arc;

use aimdb_service::{AimdbService, Providers, Telemetry, VectorIndex};
use aimdb_storage::{db::Db, qdrant::QdrantStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<AimdbService>,
}
impl AppState {
	/// Connects both stores and checks them before the listener binds.
	pub async fn new(config: aimdb_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let qdrant = QdrantStore::new(&config.storage.qdrant)?;

		qdrant.verify_collection().await?;

		let client = aimdb_providers::http_client(config.providers.embedding.timeout_ms)?;
		let telemetry = Telemetry::from_config(&config.telemetry, client.clone());
		let index: Arc<dyn VectorIndex> = Arc::new(qdrant);
		let service =
			AimdbService::new(config, db, index, Providers::with_client(client), telemetry);

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: AimdbService) -> Self {
		Self { service: Arc::new(service) }
	}
}
