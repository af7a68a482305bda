pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid input: {message}")]
	InvalidInput { message: String },
	#[error("Embedding provider unavailable: {message}")]
	ProviderUnavailable { message: String },
	#[error("Embedding provider contract violation: {message}")]
	ProviderContractViolation { message: String },
	#[error("Similarity index unavailable: {message}")]
	IndexUnavailable { message: String },
	#[error("Vector dimension mismatch: index expects {expected}, query vector has {actual}.")]
	DimensionMismatch { expected: u32, actual: usize },
	#[error("Query timed out: {message}")]
	QueryTimeout { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<aimdb_providers::Error> for Error {
	fn from(err: aimdb_providers::Error) -> Self {
		if err.is_contract_violation() {
			Self::ProviderContractViolation { message: err.to_string() }
		} else {
			Self::ProviderUnavailable { message: err.to_string() }
		}
	}
}

impl From<aimdb_storage::Error> for Error {
	fn from(err: aimdb_storage::Error) -> Self {
		match err {
			aimdb_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			aimdb_storage::Error::InvalidArgument(message) => Self::InvalidInput { message },
			aimdb_storage::Error::NotFound(message) => Self::NotFound { message },
			aimdb_storage::Error::Conflict(message) => Self::Conflict { message },
			aimdb_storage::Error::Schema(message) => Self::IndexUnavailable { message },
			aimdb_storage::Error::Qdrant(inner) =>
				Self::IndexUnavailable { message: inner.to_string() },
		}
	}
}

impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::IndexUnavailable { message: err.to_string() }
	}
}
