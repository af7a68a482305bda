mod error;

pub use error::{Error, Result};

use std::{collections::HashMap, env, str::FromStr, sync::Mutex, thread, time::Duration};

use qdrant_client::{
	Payload, Qdrant,
	qdrant::{
		CreateCollectionBuilder, Distance, PointStruct, UpsertPointsBuilder, Vector,
		VectorParamsBuilder, VectorsConfigBuilder,
	},
};
use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::{runtime::Builder, time};
use uuid::Uuid;

const ADMIN_DATABASES: [&str; 2] = ["postgres", "template1"];

/// A movie point as stored in the similarity collection.
pub struct SeedMovie {
	pub movie_id: String,
	pub title: String,
	pub plot: String,
	pub vector: Vec<f32>,
}

/// Disposable Postgres database plus the Qdrant collections created for it.
pub struct TestDatabase {
	name: String,
	dsn: String,
	admin_options: PgConnectOptions,
	cleaned: bool,
	collections: Mutex<Vec<String>>,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base_options = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("Failed to parse AIMDB_PG_DSN: {err}.")))?;
		let (admin_options, mut admin_conn) = connect_admin(&base_options).await?;
		let name = format!("aimdb_test_{}", Uuid::new_v4().simple());

		admin_conn
			.execute(format!(r#"CREATE DATABASE "{name}""#).as_str())
			.await
			.map_err(|err| Error::Message(format!("Failed to create test database: {err}.")))?;

		let dsn = base_options.clone().database(&name).to_url_lossy().to_string();

		Ok(Self { name, dsn, admin_options, cleaned: false, collections: Mutex::new(Vec::new()) })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	pub fn collection_name(&self, prefix: &str) -> String {
		let collection = format!("{prefix}_{}", self.name);

		self.collections.lock().unwrap_or_else(|err| err.into_inner()).push(collection.clone());

		collection
	}

	pub async fn cleanup(mut self) -> Result<()> {
		let collections = self.tracked_collections();
		let qdrant_result = drop_collections(&collections).await;

		drop_database(&self.name, &self.admin_options).await?;
		qdrant_result?;

		self.cleaned = true;

		Ok(())
	}

	fn tracked_collections(&self) -> Vec<String> {
		self.collections.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.cleaned {
			return;
		}

		let name = self.name.clone();
		let admin_options = self.admin_options.clone();
		let collections = self.tracked_collections();
		let cleanup = thread::spawn(move || {
			let runtime = match Builder::new_current_thread().enable_all().build() {
				Ok(runtime) => runtime,
				Err(err) => {
					eprintln!("Test cleanup failed: {err}.");

					return;
				},
			};

			if let Err(err) = runtime.block_on(drop_collections(&collections)) {
				eprintln!("Test Qdrant cleanup failed: {err}.");
			}
			if let Err(err) = runtime.block_on(drop_database(&name, &admin_options)) {
				eprintln!("Test database cleanup failed: {err}.");
			}
		});
		let _ = cleanup.join();
	}
}

pub fn env_dsn() -> Option<String> {
	env::var("AIMDB_PG_DSN").ok()
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("AIMDB_QDRANT_URL").ok()
}

/// Recreates `collection` with one named dense vector and upserts `movies` into it.
pub async fn seed_movie_collection(
	client: &Qdrant,
	collection: &str,
	vector_name: &str,
	distance: Distance,
	movies: &[SeedMovie],
) -> Result<()> {
	let dim = movies.first().map(|movie| movie.vector.len()).unwrap_or(1) as u64;
	let mut vectors_config = VectorsConfigBuilder::default();

	vectors_config.add_named_vector_params(vector_name, VectorParamsBuilder::new(dim, distance));

	let _ = client.delete_collection(collection.to_string()).await;

	client
		.create_collection(
			CreateCollectionBuilder::new(collection.to_string()).vectors_config(vectors_config),
		)
		.await?;

	let mut points = Vec::with_capacity(movies.len());

	for movie in movies {
		let mut payload = Payload::new();

		payload.insert("movie_id", movie.movie_id.clone());
		payload.insert("title", movie.title.clone());
		payload.insert("plot", movie.plot.clone());

		let vectors = HashMap::from([(vector_name.to_string(), Vector::from(movie.vector.clone()))]);

		points.push(PointStruct::new(Uuid::new_v4().to_string(), vectors, payload));
	}

	client.upsert_points(UpsertPointsBuilder::new(collection.to_string(), points).wait(true)).await?;

	Ok(())
}

async fn connect_admin(base_options: &PgConnectOptions) -> Result<(PgConnectOptions, PgConnection)> {
	let mut last_err = None;

	for database in ADMIN_DATABASES {
		let options = base_options.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => last_err = Some(err),
		}
	}

	Err(Error::Message(format!("Failed to connect to an admin database: {last_err:?}.")))
}

async fn drop_database(name: &str, admin_options: &PgConnectOptions) -> Result<()> {
	let mut conn = PgConnection::connect_with(admin_options).await?;
	let _ = sqlx::query(
		"SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = $1 AND pid <> pg_backend_pid()",
	)
	.bind(name)
	.fetch_all(&mut conn)
	.await;

	conn.execute(format!(r#"DROP DATABASE IF EXISTS "{name}""#).as_str()).await?;

	Ok(())
}

async fn drop_collections(collections: &[String]) -> Result<()> {
	if collections.is_empty() {
		return Ok(());
	}

	let Some(qdrant_url) = env_qdrant_url() else {
		eprintln!("Skipping Qdrant cleanup; set AIMDB_QDRANT_URL to delete test collections.");

		return Ok(());
	};
	let client = Qdrant::from_url(&qdrant_url).build()?;

	for collection in collections {
		time::timeout(Duration::from_secs(10), client.delete_collection(collection.clone()))
			.await
			.map_err(|_| Error::Message(format!("Timed out deleting collection {collection}.")))??;
	}

	Ok(())
}
