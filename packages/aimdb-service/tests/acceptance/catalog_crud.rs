use std::sync::Arc;

use aimdb_service::{Error, ListRequest, Providers, TitleQuery};

use super::{FixedEmbedding, build_service, test_config, test_db};

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set AIMDB_PG_DSN and AIMDB_QDRANT_URL to run."]
async fn catalog_lifecycle() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping catalog_lifecycle; set AIMDB_PG_DSN to run this test.");

		return;
	};
	let Some(qdrant_url) = aimdb_testkit::env_qdrant_url() else {
		eprintln!("Skipping catalog_lifecycle; set AIMDB_QDRANT_URL to run this test.");

		return;
	};
	let collection = test_db.collection_name("aimdb_catalog");
	let client = qdrant_client::Qdrant::from_url(&qdrant_url)
		.build()
		.expect("Failed to build Qdrant client.");

	aimdb_testkit::seed_movie_collection(
		&client,
		&collection,
		super::VECTOR_NAME,
		qdrant_client::qdrant::Distance::Cosine,
		&[],
	)
	.await
	.expect("Failed to create movie collection.");

	let mut cfg = test_config(test_db.dsn().to_string(), qdrant_url, 1, collection);

	cfg.providers.embedding.dimensions = 1;

	let providers = Providers::new(Arc::new(FixedEmbedding { vector: vec![1.0] }));
	let service = build_service(cfg, providers).await.expect("Failed to build service.");
	let inserted = service
		.add_movie(serde_json::json!({
			"_id": "ignored",
			"title": "The Matrix",
			"genres": ["Action", "Sci-Fi"],
			"year": 1999,
		}))
		.await
		.expect("Failed to add movie.");
	let fetched = service.get_movie(&inserted.id).await.expect("Failed to get movie.");

	assert_eq!(fetched.movie["_id"], inserted.id.as_str());
	assert_eq!(fetched.movie["title"], "The Matrix");

	let listed = service.list_movies(ListRequest::default()).await.expect("Failed to list.");

	assert_eq!(listed.total, 1);
	assert_eq!((listed.page, listed.per_page), (1, 10));

	let found = service
		.search_movies(TitleQuery { title: "matrix".to_string() })
		.await
		.expect("Failed to search.");

	assert_eq!(found.count, 1);
	assert_eq!(
		service.count_movies(TitleQuery { title: "MATRIX".to_string() }).await.expect("count").count,
		1
	);
	assert_eq!(service.movies_by_genre("Sci-Fi").await.expect("genre").count, 1);

	let updated = service
		.update_movie(&inserted.id, serde_json::json!({ "year": 2000 }))
		.await
		.expect("Failed to update.");

	assert_eq!(updated.modified_count, 1);

	service.delete_movie(&inserted.id).await.expect("Failed to delete.");

	let err = service.get_movie(&inserted.id).await.expect_err("Deleted movie must be gone.");

	assert!(matches!(err, Error::NotFound { .. }));

	let err = service
		.add_movie(serde_json::json!({ "year": 2001 }))
		.await
		.expect_err("Title is required.");

	assert!(matches!(err, Error::InvalidInput { .. }));

	service.db.pool.close().await;
	test_db.cleanup().await.expect("Failed to clean up test resources.");
}
