use serde_json::Value;
use time::OffsetDateTime;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Movie {
	pub movie_id: String,
	pub title: String,
	/// Free-form movie document as submitted by clients, without `_id`.
	pub doc: Value,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
	Modified,
	Unchanged,
}
