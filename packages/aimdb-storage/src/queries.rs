use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::{Error, Result, db::Db, models::{MergeOutcome, Movie}};

const MOVIE_COLUMNS: &str = "movie_id, title, doc, created_at, updated_at";

pub async fn list_movies(db: &Db, offset: i64, limit: i64) -> Result<Vec<Movie>> {
	let sql = format!(
		"SELECT {MOVIE_COLUMNS} FROM movies ORDER BY created_at ASC, movie_id ASC OFFSET $1 LIMIT $2"
	);
	let rows = sqlx::query_as::<_, Movie>(&sql).bind(offset).bind(limit).fetch_all(&db.pool).await?;

	Ok(rows)
}

pub async fn count_movies(db: &Db) -> Result<i64> {
	let count = sqlx::query_scalar::<_, i64>("SELECT count(*) FROM movies")
		.fetch_one(&db.pool)
		.await?;

	Ok(count)
}

pub async fn get_movie(db: &Db, movie_id: &str) -> Result<Option<Movie>> {
	let sql = format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE movie_id = $1");
	let row = sqlx::query_as::<_, Movie>(&sql).bind(movie_id).fetch_optional(&db.pool).await?;

	Ok(row)
}

/// Case-insensitive substring match on the title.
pub async fn search_movies_by_title(db: &Db, needle: &str) -> Result<Vec<Movie>> {
	let sql = format!(
		"SELECT {MOVIE_COLUMNS} FROM movies WHERE title ILIKE $1 ESCAPE '\\' ORDER BY title ASC, movie_id ASC"
	);
	let rows = sqlx::query_as::<_, Movie>(&sql)
		.bind(substring_pattern(needle))
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

pub async fn count_movies_by_title(db: &Db, needle: &str) -> Result<i64> {
	let count =
		sqlx::query_scalar::<_, i64>("SELECT count(*) FROM movies WHERE title ILIKE $1 ESCAPE '\\'")
			.bind(substring_pattern(needle))
			.fetch_one(&db.pool)
			.await?;

	Ok(count)
}

pub async fn movies_by_genre(db: &Db, genre: &str) -> Result<Vec<Movie>> {
	let sql = format!(
		"SELECT {MOVIE_COLUMNS} FROM movies WHERE (doc -> 'genres') ? $1 ORDER BY title ASC, movie_id ASC"
	);
	let rows = sqlx::query_as::<_, Movie>(&sql).bind(genre).fetch_all(&db.pool).await?;

	Ok(rows)
}

pub async fn insert_movie(db: &Db, movie: &Movie) -> Result<()> {
	let result = sqlx::query(
		"\
INSERT INTO movies (movie_id, title, doc, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (movie_id) DO NOTHING",
	)
	.bind(movie.movie_id.as_str())
	.bind(movie.title.as_str())
	.bind(&movie.doc)
	.bind(movie.created_at)
	.bind(movie.updated_at)
	.execute(&db.pool)
	.await?;

	if result.rows_affected() == 0 {
		return Err(Error::Conflict(format!("Movie {} already exists.", movie.movie_id)));
	}

	Ok(())
}

/// Shallow-merges `patch` into the stored document, keeping the title column in sync.
pub async fn merge_movie(
	db: &Db,
	movie_id: &str,
	patch: &Map<String, Value>,
	now: OffsetDateTime,
) -> Result<MergeOutcome> {
	let mut tx = db.pool.begin().await?;
	let current = sqlx::query_scalar::<_, Value>(
		"SELECT doc FROM movies WHERE movie_id = $1 FOR UPDATE",
	)
	.bind(movie_id)
	.fetch_optional(&mut *tx)
	.await?
	.ok_or_else(|| Error::NotFound(format!("Movie {movie_id} does not exist.")))?;
	let merged = merge_document(&current, patch)?;

	if merged == current {
		tx.commit().await?;

		return Ok(MergeOutcome::Unchanged);
	}

	let title = merged
		.get("title")
		.and_then(Value::as_str)
		.ok_or_else(|| Error::InvalidArgument("Movie title must be a string.".to_string()))?
		.to_string();

	sqlx::query("UPDATE movies SET doc = $1, title = $2, updated_at = $3 WHERE movie_id = $4")
		.bind(&merged)
		.bind(title)
		.bind(now)
		.bind(movie_id)
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;

	Ok(MergeOutcome::Modified)
}

pub async fn delete_movie(db: &Db, movie_id: &str) -> Result<u64> {
	let result = sqlx::query("DELETE FROM movies WHERE movie_id = $1")
		.bind(movie_id)
		.execute(&db.pool)
		.await?;

	Ok(result.rows_affected())
}

pub fn merge_document(current: &Value, patch: &Map<String, Value>) -> Result<Value> {
	let Value::Object(base) = current else {
		return Err(Error::InvalidArgument("Stored movie document is not an object.".to_string()));
	};
	let mut merged = base.clone();

	for (key, value) in patch {
		if key == "_id" {
			continue;
		}

		merged.insert(key.clone(), value.clone());
	}

	Ok(Value::Object(merged))
}

pub fn escape_like(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());

	for ch in raw.chars() {
		if matches!(ch, '%' | '_' | '\\') {
			out.push('\\');
		}

		out.push(ch);
	}

	out
}

fn substring_pattern(needle: &str) -> String {
	format!("%{}%", escape_like(needle))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn escapes_like_metacharacters() {
		assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
		assert_eq!(substring_pattern("star"), "%star%");
	}

	#[test]
	fn merge_is_shallow_and_ignores_id() {
		let current = serde_json::json!({ "title": "Heat", "year": 1995, "cast": ["Pacino"] });
		let patch = serde_json::json!({ "_id": "other", "year": 1996, "cast": ["De Niro"] });
		let merged = merge_document(&current, patch.as_object().expect("patch object"))
			.expect("merge failed");

		assert_eq!(
			merged,
			serde_json::json!({ "title": "Heat", "year": 1996, "cast": ["De Niro"] })
		);
	}

	#[test]
	fn merge_with_same_values_is_unchanged() {
		let current = serde_json::json!({ "title": "Heat", "year": 1995 });
		let patch = serde_json::json!({ "year": 1995 });
		let merged = merge_document(&current, patch.as_object().expect("patch object"))
			.expect("merge failed");

		assert_eq!(merged, current);
	}
}
