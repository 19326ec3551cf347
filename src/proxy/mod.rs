mod gateway;
mod upstream;

pub use gateway::Gateway;
pub use upstream::Forwarder;

use crate::http::{Response, StatusCode, full, header};
use crate::policy::Violation;

#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
	#[error("bad request: {0}")]
	BadRequest(String),
	#[error("security policy violation, reason: {0}")]
	PolicyViolation(#[from] Violation),
	#[error("upstream unreachable: {0}")]
	UpstreamUnreachable(String),
	#[error("upgrade failed: {0}")]
	UpgradeFailed(String),
	#[error("upstream call failed: {0:?}")]
	UpstreamCallFailed(hyper_util::client::legacy::Error),
	#[error("processing failed: {0}")]
	Processing(anyhow::Error),
}

impl ProxyError {
	pub fn into_response(self) -> Response {
		match &self {
			// a denial carries a structured body the orchestration client understands
			ProxyError::PolicyViolation(_) => {
				let body = serde_json::json!({
					"status": "Failure",
					"message": self.to_string(),
				});
				::http::Response::builder()
					.status(StatusCode::NOT_ACCEPTABLE)
					.header(header::CONTENT_TYPE, "application/json")
					.body(full(body.to_string()))
					.expect("builder with known status code should not fail")
			},
			_ => {
				let code = match &self {
					ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
					ProxyError::PolicyViolation(_) => StatusCode::NOT_ACCEPTABLE,
					ProxyError::UpstreamUnreachable(_) => StatusCode::INTERNAL_SERVER_ERROR,
					ProxyError::UpgradeFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
					ProxyError::UpstreamCallFailed(_) => StatusCode::BAD_GATEWAY,
					ProxyError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
				};
				::http::Response::builder()
					.status(code)
					.header(header::CONTENT_TYPE, "text/plain")
					.body(full(self.to_string()))
					.expect("builder with known status code should not fail")
			},
		}
	}
}
