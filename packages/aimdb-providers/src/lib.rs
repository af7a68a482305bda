pub mod embedding;
pub mod llmobs;

mod error;

pub use error::{Error, Result};

use std::time::Duration;

use reqwest::{
	Client,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

/// Builds the pooled client shared by every outbound provider call.
pub fn http_client(connect_timeout_ms: u64) -> Result<Client> {
	let client =
		Client::builder().connect_timeout(Duration::from_millis(connect_timeout_ms)).build()?;

	Ok(client)
}

pub(crate) async fn read_json(res: reqwest::Response) -> Result<Value> {
	let status = res.status();

	if !status.is_success() {
		let body = res.text().await.unwrap_or_default();

		return Err(Error::Status { status: status.as_u16(), body });
	}

	let bytes = res.bytes().await?;

	Ok(serde_json::from_slice(&bytes)?)
}
