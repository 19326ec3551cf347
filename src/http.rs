use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
pub type Body = UnsyncBoxBody<Bytes, BoxError>;
pub type Request = ::http::Request<Body>;
pub type Response = ::http::Response<Body>;

pub use ::http::uri::{Authority, Scheme};
pub use ::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header, uri};

pub fn empty() -> Body {
	Empty::<Bytes>::new()
		.map_err(|never| match never {})
		.boxed_unsync()
}

pub fn full(bytes: impl Into<Bytes>) -> Body {
	Full::new(bytes.into())
		.map_err(|never| match never {})
		.boxed_unsync()
}

pub fn incoming(body: hyper::body::Incoming) -> Body {
	body.map_err(|e| -> BoxError { e.into() }).boxed_unsync()
}

/// Read a body to completion and put an identical body back, so a downstream
/// forwarder observes the same bytes. No streaming decode; the whole body is
/// buffered.
pub async fn inspect_body(body: &mut Body) -> anyhow::Result<Bytes> {
	let orig = std::mem::replace(body, empty());
	let bytes = orig
		.collect()
		.await
		.map_err(|e| anyhow::anyhow!("{e}"))?
		.to_bytes();
	*body = full(bytes.clone());
	Ok(bytes)
}

pub fn modify_req_uri(
	req: &mut Request,
	f: impl FnOnce(&mut uri::Parts) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
	let mut parts = std::mem::take(req.uri_mut()).into_parts();
	f(&mut parts)?;
	*req.uri_mut() = Uri::from_parts(parts)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn inspect_body_restores_the_bytes() {
		let mut body = full(&b"{\"spec\":{}}"[..]);
		let captured = inspect_body(&mut body).await.unwrap();
		assert_eq!(&captured[..], b"{\"spec\":{}}");

		// the replacement body re-delivers the identical bytes
		let replayed = body.collect().await.unwrap().to_bytes();
		assert_eq!(captured, replayed);
	}

	#[test]
	fn rewrites_uri_in_place() {
		let mut req = ::http::Request::builder()
			.uri("/api/v1/pods?watch=true")
			.body(empty())
			.unwrap();
		modify_req_uri(&mut req, |parts| {
			parts.scheme = Some(Scheme::HTTPS);
			parts.authority = Some("127.0.0.1:6443".parse()?);
			Ok(())
		})
		.unwrap();
		assert_eq!(req.uri().to_string(), "https://127.0.0.1:6443/api/v1/pods?watch=true");
	}
}
