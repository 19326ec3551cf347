use std::sync::Arc;
use std::time::Duration;

use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioIo};
use rustls_pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, error, trace};

use super::ProxyError;
use crate::Config;
use crate::http::{Body, Request, Response, StatusCode};
use crate::{http, transport};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const KEEPALIVE: Duration = Duration::from_secs(10);

trait Io: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

/// Forwards authorized traffic to the upstream api. The plain path goes
/// through a pooled client; upgrade requests get a dedicated connection that
/// is spliced to the client's socket.
pub struct Forwarder {
	client: Client<hyper_rustls::HttpsConnector<HttpConnector>, Body>,
	upstream: http::Uri,
	dial_addr: String,
	// None when the upstream scheme is plain http
	tls: Option<Arc<rustls::ClientConfig>>,
}

impl Forwarder {
	pub fn new(cfg: &Config) -> anyhow::Result<Forwarder> {
		let mut connector = HttpConnector::new();
		connector.enforce_http(false);
		connector.set_connect_timeout(Some(CONNECT_TIMEOUT));
		connector.set_keepalive(Some(KEEPALIVE));
		connector.set_nodelay(true);

		let tls_config = transport::tls::insecure_client_config()?;
		let https = hyper_rustls::HttpsConnectorBuilder::new()
			.with_tls_config(tls_config.clone())
			.https_or_http()
			.enable_http1()
			.wrap_connector(connector);
		let client = Client::builder(TokioExecutor::new()).build(https);

		Ok(Forwarder {
			client,
			upstream: cfg.upstream.clone(),
			dial_addr: cfg.upstream_addr(),
			tls: cfg.upstream_is_https().then(|| Arc::new(tls_config)),
		})
	}

	/// Reverse-proxy a request to the upstream. Method, headers and the body
	/// pass through unchanged; only scheme and authority are rewritten.
	pub async fn forward(&self, mut req: Request) -> Result<Response, ProxyError> {
		let scheme = self.upstream.scheme().cloned();
		let authority = self.upstream.authority().cloned();
		http::modify_req_uri(&mut req, |parts| {
			parts.scheme = scheme;
			parts.authority = authority;
			if parts.path_and_query.is_none() {
				parts.path_and_query = Some("/".parse()?);
			}
			Ok(())
		})
		.map_err(ProxyError::Processing)?;

		trace!(uri = %req.uri(), method = %req.method(), "proxying the request");
		let resp = self
			.client
			.request(req)
			.await
			.map_err(ProxyError::UpstreamCallFailed)?;
		Ok(resp.map(http::incoming))
	}

	/// Take over a protocol-upgrade request: dial a fresh upstream
	/// connection, replay the request on it, and once both ends have
	/// switched protocols splice the two sockets together. The request is
	/// never decoded or policy-checked.
	pub async fn upgrade(&self, mut req: Request) -> Result<Response, ProxyError> {
		debug!(upgrade = ?req.headers().get(http::header::UPGRADE), "upgrading the connection");

		let client_upgrade = hyper::upgrade::on(&mut req);

		let io = self.dial().await?;
		let (mut sender, conn) = hyper::client::conn::http1::Builder::new()
			.handshake(TokioIo::new(io))
			.await
			.map_err(|e| ProxyError::UpgradeFailed(format!("upstream handshake failed: {e}")))?;
		tokio::spawn(async move {
			if let Err(e) = conn.with_upgrades().await {
				debug!("upstream connection closed: {e}");
			}
		});

		let mut resp = sender
			.send_request(req)
			.await
			.map_err(|e| ProxyError::UpgradeFailed(format!("unable to write the request upstream: {e}")))?;

		if resp.status() == StatusCode::SWITCHING_PROTOCOLS {
			let upstream_upgrade = hyper::upgrade::on(&mut resp);
			tokio::spawn(async move {
				let (client_io, upstream_io) = match tokio::try_join!(client_upgrade, upstream_upgrade) {
					Ok(both) => both,
					Err(e) => {
						error!("connection upgrade failed: {e}");
						return;
					},
				};
				// both sockets are shut down before this task completes
				if let Err(e) =
					gate_core::copy::copy_bidirectional(TokioIo::new(client_io), TokioIo::new(upstream_io))
						.await
				{
					debug!("upgraded stream terminated: {e}");
				}
			});
		}

		Ok(resp.map(http::incoming))
	}

	async fn dial(&self) -> Result<Box<dyn Io>, ProxyError> {
		trace!(addr = %self.dial_addr, "dialing the upstream endpoint");
		let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.dial_addr))
			.await
			.map_err(|_| ProxyError::UpstreamUnreachable(format!("connect to {} timed out", self.dial_addr)))?
			.map_err(|e| ProxyError::UpstreamUnreachable(format!("connect to {} failed: {e}", self.dial_addr)))?;
		stream
			.set_nodelay(true)
			.map_err(|e| ProxyError::Processing(e.into()))?;
		let keepalive = socket2::TcpKeepalive::new().with_time(KEEPALIVE);
		socket2::SockRef::from(&stream)
			.set_tcp_keepalive(&keepalive)
			.map_err(|e| ProxyError::Processing(e.into()))?;

		let Some(tls) = &self.tls else {
			return Ok(Box::new(stream));
		};
		let server_name = ServerName::try_from(self.upstream.host().unwrap_or_default().to_string())
			.map_err(|e| ProxyError::UpgradeFailed(format!("invalid upstream host: {e}")))?;
		let tls_stream = tokio_rustls::TlsConnector::from(tls.clone())
			.connect(server_name, stream)
			.await
			.map_err(|e| {
				ProxyError::UpstreamUnreachable(format!("tls handshake with {} failed: {e}", self.dial_addr))
			})?;
		Ok(Box::new(tls_stream))
	}
}
