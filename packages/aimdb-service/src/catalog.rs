use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use aimdb_storage::{
	models::{MergeOutcome, Movie},
	queries,
};

use crate::{AimdbService, Error, Result};

const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRequest {
	pub page: Option<i64>,
	pub per_page: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TitleQuery {
	#[serde(default)]
	pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
	pub total: i64,
	pub page: i64,
	pub per_page: i64,
	pub movies: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieResponse {
	pub movie: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
	pub count: usize,
	pub movies: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountResponse {
	pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenreResponse {
	pub count: usize,
	pub genre: String,
	pub movies: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertResponse {
	pub message: String,
	pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResponse {
	pub message: String,
	pub modified_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
	pub message: String,
}

impl AimdbService {
	pub async fn list_movies(&self, req: ListRequest) -> Result<ListResponse> {
		let Page { page, per_page, offset } = resolve_page(&req)?;
		let movies = queries::list_movies(&self.db, offset, per_page).await?;
		let total = queries::count_movies(&self.db).await?;

		Ok(ListResponse { total, page, per_page, movies: render_all(movies) })
	}

	pub async fn get_movie(&self, movie_id: &str) -> Result<MovieResponse> {
		let movie = queries::get_movie(&self.db, movie_id)
			.await?
			.ok_or_else(|| Error::NotFound { message: "Movie not found".to_string() })?;

		Ok(MovieResponse { movie: render_movie(movie) })
	}

	pub async fn search_movies(&self, req: TitleQuery) -> Result<SearchResponse> {
		let title = required_title(&req)?;
		let movies = queries::search_movies_by_title(&self.db, title).await?;

		Ok(SearchResponse { count: movies.len(), movies: render_all(movies) })
	}

	pub async fn count_movies(&self, req: TitleQuery) -> Result<CountResponse> {
		let title = required_title(&req)?;
		let count = queries::count_movies_by_title(&self.db, title).await?;

		Ok(CountResponse { count })
	}

	pub async fn movies_by_genre(&self, genre: &str) -> Result<GenreResponse> {
		let movies = queries::movies_by_genre(&self.db, genre).await?;

		Ok(GenreResponse {
			count: movies.len(),
			genre: genre.to_string(),
			movies: render_all(movies),
		})
	}

	pub async fn add_movie(&self, doc: Value) -> Result<InsertResponse> {
		let mut doc = into_object(doc)?;

		doc.remove("_id");

		let title = doc
			.get("title")
			.and_then(Value::as_str)
			.ok_or_else(|| Error::InvalidInput { message: "Movie title is required".to_string() })?
			.to_string();
		let now = OffsetDateTime::now_utc();
		let movie = Movie {
			movie_id: Uuid::new_v4().to_string(),
			title,
			doc: Value::Object(doc),
			created_at: now,
			updated_at: now,
		};

		queries::insert_movie(&self.db, &movie).await?;

		tracing::info!(movie_id = %movie.movie_id, "Movie added.");

		Ok(InsertResponse { message: "Movie added successfully".to_string(), id: movie.movie_id })
	}

	pub async fn update_movie(&self, movie_id: &str, patch: Value) -> Result<UpdateResponse> {
		let patch = into_object(patch)?;
		let outcome =
			queries::merge_movie(&self.db, movie_id, &patch, OffsetDateTime::now_utc()).await?;
		let modified_count = match outcome {
			MergeOutcome::Modified => 1,
			MergeOutcome::Unchanged => 0,
		};

		Ok(UpdateResponse { message: "Movie updated successfully".to_string(), modified_count })
	}

	pub async fn delete_movie(&self, movie_id: &str) -> Result<DeleteResponse> {
		if queries::delete_movie(&self.db, movie_id).await? == 0 {
			return Err(Error::NotFound { message: "Movie not found".to_string() });
		}

		tracing::info!(%movie_id, "Movie deleted.");

		Ok(DeleteResponse { message: "Movie deleted successfully".to_string() })
	}
}

#[derive(Debug, PartialEq, Eq)]
struct Page {
	page: i64,
	per_page: i64,
	offset: i64,
}

fn resolve_page(req: &ListRequest) -> Result<Page> {
	let page = req.page.unwrap_or(1);
	let per_page = req.per_page.unwrap_or(10);

	if page < 1 {
		return Err(Error::InvalidInput { message: "page must be 1 or greater.".to_string() });
	}
	if per_page < 1 {
		return Err(Error::InvalidInput { message: "per_page must be 1 or greater.".to_string() });
	}

	let per_page = per_page.min(MAX_PER_PAGE);
	let offset = (page - 1).checked_mul(per_page).ok_or_else(|| Error::InvalidInput {
		message: format!("page {page} is out of range."),
	})?;

	Ok(Page { page, per_page, offset })
}

fn required_title(req: &TitleQuery) -> Result<&str> {
	if req.title.is_empty() {
		return Err(Error::InvalidInput { message: "Search query is required".to_string() });
	}

	Ok(req.title.as_str())
}

fn into_object(doc: Value) -> Result<Map<String, Value>> {
	match doc {
		Value::Object(map) if !map.is_empty() => Ok(map),
		_ => Err(Error::InvalidInput { message: "Invalid movie data".to_string() }),
	}
}

/// The stored document with `_id` set to the catalog identifier.
fn render_movie(movie: Movie) -> Value {
	let mut doc = match movie.doc {
		Value::Object(map) => map,
		_ => Map::new(),
	};

	doc.insert("_id".to_string(), Value::String(movie.movie_id));

	Value::Object(doc)
}

fn render_all(movies: Vec<Movie>) -> Vec<Value> {
	movies.into_iter().map(render_movie).collect()
}
