use serde_json::{Map, Value};
use time::OffsetDateTime;

use aimdb_config::Postgres;
use aimdb_storage::{
	Error,
	db::Db,
	models::{MergeOutcome, Movie},
	queries,
};
use aimdb_testkit::TestDatabase;

fn movie(movie_id: &str, doc: Value) -> Movie {
	let now = OffsetDateTime::now_utc();
	let title = doc.get("title").and_then(Value::as_str).unwrap_or_default().to_string();

	Movie { movie_id: movie_id.to_string(), title, doc, created_at: now, updated_at: now }
}

async fn bootstrap(test_db: &TestDatabase) -> Db {
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	db
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set AIMDB_PG_DSN to run."]
async fn schema_bootstrap_is_idempotent() {
	let Some(base_dsn) = aimdb_testkit::env_dsn() else {
		eprintln!("Skipping schema_bootstrap_is_idempotent; set AIMDB_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	db.ensure_schema().await.expect("Second bootstrap should be a no-op.");

	let count: i64 = sqlx::query_scalar(
		"SELECT count(*) FROM information_schema.tables WHERE table_name = 'movies'",
	)
	.fetch_one(&db.pool)
	.await
	.expect("Failed to query schema tables.");

	assert_eq!(count, 1);

	db.pool.close().await;
	test_db.cleanup().await.expect("Failed to clean up test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set AIMDB_PG_DSN to run."]
async fn catalog_queries_round_trip() {
	let Some(base_dsn) = aimdb_testkit::env_dsn() else {
		eprintln!("Skipping catalog_queries_round_trip; set AIMDB_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	for (id, doc) in [
		("m1", serde_json::json!({ "title": "The Great Train Robbery", "genres": ["Western"] })),
		("m2", serde_json::json!({ "title": "Train of Thought", "genres": ["Drama"] })),
		("m3", serde_json::json!({ "title": "100% Cotton", "genres": ["Drama", "Comedy"] })),
	] {
		queries::insert_movie(&db, &movie(id, doc)).await.expect("Failed to insert movie.");
	}

	assert_eq!(queries::count_movies(&db).await.expect("count"), 3);
	assert_eq!(queries::list_movies(&db, 1, 10).await.expect("page").len(), 2);

	let trains = queries::search_movies_by_title(&db, "TRAIN").await.expect("search");

	assert_eq!(trains.len(), 2);
	assert_eq!(queries::count_movies_by_title(&db, "train").await.expect("count by title"), 2);
	// `%` is matched literally, not as a wildcard.
	assert_eq!(queries::count_movies_by_title(&db, "0%").await.expect("literal percent"), 1);

	let dramas = queries::movies_by_genre(&db, "Drama").await.expect("genre");

	assert_eq!(dramas.iter().map(|movie| movie.movie_id.as_str()).collect::<Vec<_>>(), ["m3", "m2"]);

	let err = queries::insert_movie(&db, &movie("m1", serde_json::json!({ "title": "Dup" })))
		.await
		.expect_err("Duplicate id must conflict.");

	assert!(matches!(err, Error::Conflict(_)));

	db.pool.close().await;
	test_db.cleanup().await.expect("Failed to clean up test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set AIMDB_PG_DSN to run."]
async fn merge_reports_modification_and_missing_rows() {
	let Some(base_dsn) = aimdb_testkit::env_dsn() else {
		eprintln!(
			"Skipping merge_reports_modification_and_missing_rows; set AIMDB_PG_DSN to run this test."
		);

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	queries::insert_movie(&db, &movie("m1", serde_json::json!({ "title": "Heat", "year": 1995 })))
		.await
		.expect("Failed to insert movie.");

	let mut patch = Map::new();

	patch.insert("title".to_string(), Value::from("Heat (1995)"));

	let now = OffsetDateTime::now_utc();

	assert_eq!(
		queries::merge_movie(&db, "m1", &patch, now).await.expect("merge"),
		MergeOutcome::Modified
	);
	assert_eq!(
		queries::merge_movie(&db, "m1", &patch, now).await.expect("repeat merge"),
		MergeOutcome::Unchanged
	);

	let stored = queries::get_movie(&db, "m1").await.expect("get").expect("movie exists");

	assert_eq!(stored.title, "Heat (1995)");
	assert_eq!(stored.doc["year"], 1995);

	let err = queries::merge_movie(&db, "missing", &patch, now)
		.await
		.expect_err("Missing movie must not merge.");

	assert!(matches!(err, Error::NotFound(_)));
	assert_eq!(queries::delete_movie(&db, "m1").await.expect("delete"), 1);
	assert_eq!(queries::delete_movie(&db, "m1").await.expect("repeat delete"), 0);

	db.pool.close().await;
	test_db.cleanup().await.expect("Failed to clean up test database.");
}
