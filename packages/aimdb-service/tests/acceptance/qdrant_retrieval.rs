use std::sync::Arc;

use qdrant_client::{Qdrant, qdrant::Distance};

use aimdb_service::{Error, Providers, SearchMode, SimilarRequest};
use aimdb_testkit::SeedMovie;

use super::{FixedEmbedding, VECTOR_NAME, build_service, test_config, test_db};

const QUERY_PLOT: &str = "A farm boy joins a rebellion against an empire.";

fn seed_movies() -> Vec<SeedMovie> {
	let movie = |id: &str, title: &str, plot: &str, vector: [f32; 3]| SeedMovie {
		movie_id: id.to_string(),
		title: title.to_string(),
		plot: plot.to_string(),
		vector: vector.to_vec(),
	};

	vec![
		movie("D1", "Knight", "A knight rides out at dawn.", [0.81, 0.586_43, 0.0]),
		movie("D2", "Rebel", QUERY_PLOT, [1.0, 0.0, 0.0]),
		movie("D3", "Pilot", "A pilot leaves home for the stars.", [0.92, 0.391_92, 0.0]),
		movie("D4", "Baker", "A baker opens a shop.", [0.0, 0.0, 1.0]),
	]
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set AIMDB_PG_DSN and AIMDB_QDRANT_URL to run."]
async fn approximate_and_exact_rank_seeded_movies() {
	let Some(test_db) = test_db().await else {
		eprintln!(
			"Skipping approximate_and_exact_rank_seeded_movies; set AIMDB_PG_DSN to run this test."
		);

		return;
	};
	let Some(qdrant_url) = aimdb_testkit::env_qdrant_url() else {
		eprintln!(
			"Skipping approximate_and_exact_rank_seeded_movies; set AIMDB_QDRANT_URL to run this test."
		);

		return;
	};
	let collection = test_db.collection_name("aimdb_movies");
	let client = Qdrant::from_url(&qdrant_url).build().expect("Failed to build Qdrant client.");

	aimdb_testkit::seed_movie_collection(
		&client,
		&collection,
		VECTOR_NAME,
		Distance::Cosine,
		&seed_movies(),
	)
	.await
	.expect("Failed to seed movie collection.");

	let cfg = test_config(test_db.dsn().to_string(), qdrant_url, 3, collection);
	let providers = Providers::new(Arc::new(FixedEmbedding { vector: vec![1.0, 0.0, 0.0] }));
	let service = build_service(cfg, providers).await.expect("Failed to build service.");
	let request = SimilarRequest { plot: QUERY_PLOT.to_string() };
	let approximate = service
		.similar_movies(request.clone(), service.retriever.approximate_mode())
		.await
		.expect("Approximate search failed.");
	let exact =
		service.similar_movies(request, SearchMode::Exact).await.expect("Exact search failed.");
	let ids = |movies: &[aimdb_service::Candidate]| {
		movies.iter().map(|movie| movie.id.clone()).collect::<Vec<_>>()
	};

	assert_eq!(ids(&exact.similar_movies), ["D3", "D1", "D4"]);
	assert_eq!(ids(&approximate.similar_movies), ids(&exact.similar_movies));
	assert!((exact.similar_movies[0].score - 0.92).abs() < 1e-3);
	assert!((exact.similar_movies[1].score - 0.81).abs() < 1e-3);

	let err = service
		.similar_movies(SimilarRequest { plot: String::new() }, SearchMode::Exact)
		.await
		.expect_err("Empty plot must be rejected.");

	assert!(matches!(err, Error::InvalidInput { .. }));

	service.db.pool.close().await;
	test_db.cleanup().await.expect("Failed to clean up test resources.");
}
