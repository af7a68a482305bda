use axum::{
	Json, Router,
	extract::{
		Path, Query, State,
		rejection::{JsonRejection, QueryRejection},
	},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;

use aimdb_service::{
	CountResponse, DeleteResponse, Error, GenreResponse, InsertResponse, ListRequest, ListResponse,
	MovieResponse, SearchMode, SearchResponse, SimilarRequest, SimilarResponse, TitleQuery,
	UpdateResponse,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/", get(index))
		.route("/health", get(health))
		.route("/api/movies", get(list_movies).post(add_movie))
		.route("/api/movies/search", get(search_movies))
		.route("/api/movies/count", get(count_movies))
		.route("/api/movies/genre/{genre}", get(movies_by_genre))
		.route("/api/movies/similar", post(similar_movies))
		.route("/api/movies/exact", post(exact_movies))
		.route("/api/movies/{id}", get(get_movie).put(update_movie).delete(delete_movie))
		.with_state(state)
}

#[derive(Debug, Serialize)]
pub struct Success<T> {
	status: &'static str,
	#[serde(flatten)]
	body: T,
}

fn success<T>(body: T) -> Json<Success<T>> {
	Json(Success { status: "success", body })
}

async fn index() -> Json<Value> {
	Json(serde_json::json!({
		"message": "Welcome to the AIMDB movie API.",
		"endpoints": {
			"GET /api/movies": "List movies, paginated with page and per_page.",
			"POST /api/movies": "Add a movie.",
			"GET /api/movies/search?title=": "Search movies by title.",
			"GET /api/movies/count?title=": "Count movies by title.",
			"GET /api/movies/genre/{genre}": "List movies in a genre.",
			"POST /api/movies/similar": "Movies with a similar plot, approximate search.",
			"POST /api/movies/exact": "Movies with a similar plot, exact search.",
			"GET /api/movies/{id}": "Get a movie.",
			"PUT /api/movies/{id}": "Update a movie.",
			"DELETE /api/movies/{id}": "Delete a movie.",
		},
	}))
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn list_movies(
	State(state): State<AppState>,
	query: Result<Query<ListRequest>, QueryRejection>,
) -> Result<Json<Success<ListResponse>>, ApiError> {
	let Query(req) = query?;
	let response = state.service.list_movies(req).await?;

	Ok(success(response))
}

async fn add_movie(
	State(state): State<AppState>,
	payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Success<InsertResponse>>), ApiError> {
	let Json(doc) = payload?;
	let response = state.service.add_movie(doc).await?;

	Ok((StatusCode::CREATED, success(response)))
}

async fn search_movies(
	State(state): State<AppState>,
	query: Result<Query<TitleQuery>, QueryRejection>,
) -> Result<Json<Success<SearchResponse>>, ApiError> {
	let Query(req) = query?;
	let response = state.service.search_movies(req).await?;

	Ok(success(response))
}

async fn count_movies(
	State(state): State<AppState>,
	query: Result<Query<TitleQuery>, QueryRejection>,
) -> Result<Json<Success<CountResponse>>, ApiError> {
	let Query(req) = query?;
	let response = state.service.count_movies(req).await?;

	Ok(success(response))
}

async fn movies_by_genre(
	State(state): State<AppState>,
	Path(genre): Path<String>,
) -> Result<Json<Success<GenreResponse>>, ApiError> {
	let response = state.service.movies_by_genre(&genre).await?;

	Ok(success(response))
}

async fn similar_movies(
	State(state): State<AppState>,
	payload: Result<Json<SimilarRequest>, JsonRejection>,
) -> Result<Json<Success<SimilarResponse>>, ApiError> {
	let mode = state.service.retriever.approximate_mode();

	similar(&state, payload, mode).await
}

async fn exact_movies(
	State(state): State<AppState>,
	payload: Result<Json<SimilarRequest>, JsonRejection>,
) -> Result<Json<Success<SimilarResponse>>, ApiError> {
	similar(&state, payload, SearchMode::Exact).await
}

/// Both similarity routes differ only in the search mode.
async fn similar(
	state: &AppState,
	payload: Result<Json<SimilarRequest>, JsonRejection>,
	mode: SearchMode,
) -> Result<Json<Success<SimilarResponse>>, ApiError> {
	let Json(req) = payload?;
	let response = state.service.similar_movies(req, mode).await?;

	Ok(success(response))
}

async fn get_movie(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Success<MovieResponse>>, ApiError> {
	let response = state.service.get_movie(&id).await?;

	Ok(success(response))
}

async fn update_movie(
	State(state): State<AppState>,
	Path(id): Path<String>,
	payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Success<UpdateResponse>>, ApiError> {
	let Json(patch) = payload?;
	let response = state.service.update_movie(&id, patch).await?;

	Ok(success(response))
}

async fn delete_movie(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Success<DeleteResponse>>, ApiError> {
	let response = state.service.delete_movie(&id).await?;

	Ok(success(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	status: &'static str,
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError::new(status, code, message)
}

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let (status, code) = match &err {
			Error::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
			Error::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
			Error::Conflict { .. } => (StatusCode::CONFLICT, "CONFLICT"),
			Error::ProviderUnavailable { .. } =>
				(StatusCode::BAD_GATEWAY, "EMBEDDING_PROVIDER_UNAVAILABLE"),
			Error::ProviderContractViolation { .. } =>
				(StatusCode::BAD_GATEWAY, "EMBEDDING_PROVIDER_CONTRACT_VIOLATION"),
			Error::IndexUnavailable { .. } =>
				(StatusCode::SERVICE_UNAVAILABLE, "SIMILARITY_INDEX_UNAVAILABLE"),
			Error::QueryTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "QUERY_TIMEOUT"),
			Error::DimensionMismatch { .. } =>
				(StatusCode::INTERNAL_SERVER_ERROR, "DIMENSION_MISMATCH"),
			Error::Storage { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
		};

		if status.is_server_error() {
			tracing::error!(error = %err, error_code = code, "Request failed.");
		}

		json_error(status, code, err.to_string())
	}
}

impl From<JsonRejection> for ApiError {
	fn from(err: JsonRejection) -> Self {
		json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", err.body_text())
	}
}

impl From<QueryRejection> for ApiError {
	fn from(err: QueryRejection) -> Self {
		json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", err.body_text())
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { status: "error", error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
