//! Client for an LLM-observability span intake.
//!
//! Spans are posted as one batch per request in the intake's envelope format. Callers own the span
//! JSON; this module only wraps and ships it.

use std::time::Duration;

use reqwest::{
	Client,
	header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use serde_json::Value;

use crate::{Error, Result};

pub const API_KEY_HEADER: &str = "dd-api-key";

pub async fn submit_spans(
	client: &Client,
	cfg: &aimdb_config::Telemetry,
	spans: Vec<Value>,
) -> Result<()> {
	let (Some(url), Some(api_key)) = (cfg.intake_url.as_deref(), cfg.api_key.as_deref()) else {
		return Err(Error::InvalidConfig {
			message: "Span intake requires telemetry.intake_url and telemetry.api_key.".to_string(),
		});
	};
	let body = envelope(cfg, spans);
	let res = client
		.post(url)
		.timeout(Duration::from_millis(cfg.timeout_ms))
		.headers(intake_headers(api_key)?)
		.json(&body)
		.send()
		.await?;
	let status = res.status();

	if !status.is_success() {
		let body = res.text().await.unwrap_or_default();

		return Err(Error::Status { status: status.as_u16(), body });
	}

	Ok(())
}

fn intake_headers(api_key: &str) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(HeaderName::from_static(API_KEY_HEADER), api_key.parse()?);
	headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

	Ok(headers)
}

fn envelope(cfg: &aimdb_config::Telemetry, spans: Vec<Value>) -> Value {
	serde_json::json!({
		"data": {
			"type": "span",
			"attributes": {
				"ml_app": cfg.ml_app,
				"tags": [format!("env:{}", cfg.env)],
				"spans": spans,
			},
		},
	})
}
