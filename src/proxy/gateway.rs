use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use super::{Forwarder, ProxyError};
use crate::http::{HeaderMap, Method, Request, Response, header};
use crate::policy::{PolicyContext, PolicySet};
use crate::{Config, http, kube, transport};

/// The TLS front-end plus the interception router. Mutating verbs on the
/// guarded resource paths go through the policy engine; everything else is
/// handed straight to the forwarder.
pub struct Gateway {
	cfg: Config,
	policies: PolicySet,
	forwarder: Forwarder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resource {
	Pod,
	ReplicationController,
}

#[derive(Debug, PartialEq, Eq)]
enum Route {
	Guarded { resource: Resource, namespace: String },
	Passthrough,
}

impl Gateway {
	pub fn new(cfg: Config, policies: PolicySet) -> anyhow::Result<Gateway> {
		let forwarder = Forwarder::new(&cfg)?;
		Ok(Gateway {
			cfg,
			policies,
			forwarder,
		})
	}

	/// Terminate TLS on the configured bind address and serve until the
	/// process is signalled to stop.
	pub async fn run(self) -> anyhow::Result<()> {
		let tls = transport::tls::server_config(&self.cfg.tls_cert, &self.cfg.tls_key)?;
		let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(tls));
		let listener = TcpListener::bind(self.cfg.bind).await?;
		info!(bind = %self.cfg.bind, upstream = %self.cfg.upstream, "listening for requests");

		let gateway = Arc::new(self);
		let accept = async {
			loop {
				let (stream, peer) = match listener.accept().await {
					Ok(conn) => conn,
					Err(e) => {
						warn!("failed to accept connection: {e}");
						continue;
					},
				};
				let acceptor = acceptor.clone();
				let gateway = gateway.clone();
				tokio::spawn(async move {
					let stream = match acceptor.accept(stream).await {
						Ok(stream) => stream,
						Err(e) => {
							debug!(%peer, "tls handshake failed: {e}");
							return;
						},
					};
					let service = service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
						let gateway = gateway.clone();
						async move { Ok::<_, Infallible>(gateway.handle(peer, req.map(http::incoming)).await) }
					});
					if let Err(e) = auto::Builder::new(TokioExecutor::new())
						.serve_connection_with_upgrades(TokioIo::new(stream), service)
						.await
					{
						debug!(%peer, "connection closed: {e}");
					}
				});
			}
		};

		tokio::select! {
			_ = accept => {}
			_ = gate_core::signal::shutdown() => {
				info!("stopped accepting connections; shutting down");
			}
		}
		Ok(())
	}

	/// Serve one request. Never fails: errors become their HTTP rendering.
	pub async fn handle(&self, peer: SocketAddr, req: Request) -> Response {
		match self.route(peer, req).await {
			Ok(resp) => resp,
			Err(err) => err.into_response(),
		}
	}

	async fn route(&self, peer: SocketAddr, mut req: Request) -> Result<Response, ProxyError> {
		// streaming endpoints take over the socket before any interception
		if is_upgrade(req.headers()) {
			return self.forwarder.upgrade(req).await;
		}
		if let Route::Guarded {
			resource,
			namespace,
		} = match_route(req.method(), req.uri().path())
		{
			self.admit(peer, resource, namespace, &mut req).await?;
		}
		self.forwarder.forward(req).await
	}

	/// The guarded-handler pipeline: build the policy context, capture and
	/// decode the body, and ask the engine. The captured body is restored so
	/// the forwarder re-delivers it byte for byte.
	async fn admit(
		&self,
		peer: SocketAddr,
		resource: Resource,
		namespace: String,
		req: &mut Request,
	) -> Result<(), ProxyError> {
		if namespace.is_empty() {
			return Err(ProxyError::BadRequest(
				"the request has no namespace associated".to_string(),
			));
		}
		let content = http::inspect_body(req.body_mut())
			.await
			.map_err(|e| ProxyError::BadRequest(format!("unable to read the request body: {e}")))?;

		let pod_spec = decode_pod_spec(resource, &content)?;
		let context = PolicyContext::new(namespace);
		debug!(namespace = %context.namespace, ?resource, "authorizing the request");

		if let Err(reason) = self.policies.authorize(&context, &pod_spec) {
			warn!(%peer, namespace = %context.namespace, %reason, "request denied by security policy");
			debug!(specification = %String::from_utf8_lossy(&content), "denied specification");
			return Err(reason.into());
		}
		Ok(())
	}
}

// The decoder is selected by the route; both resources project to the same
// pod-spec input for the engine.
fn decode_pod_spec(resource: Resource, content: &Bytes) -> Result<kube::PodSpec, ProxyError> {
	let bad_request = |e: serde_json::Error| ProxyError::BadRequest(format!("unable to decode the request body: {e}"));
	match resource {
		Resource::Pod => {
			let pod: kube::Pod = serde_json::from_slice(content).map_err(bad_request)?;
			Ok(pod.spec)
		},
		Resource::ReplicationController => {
			let rc: kube::ReplicationController = serde_json::from_slice(content).map_err(bad_request)?;
			Ok(rc.spec.template.spec)
		},
	}
}

fn is_upgrade(headers: &HeaderMap) -> bool {
	headers
		.get(header::UPGRADE)
		.map(|v| !v.is_empty())
		.unwrap_or(false)
}

// Guarded templates:
//   POST      /api/v1/namespaces/:namespace/{pods,replicationcontrollers}
//   PUT|PATCH /api/v1/namespaces/:namespace/{pods,replicationcontrollers}/:name
fn match_route(method: &Method, path: &str) -> Route {
	let create = *method == Method::POST;
	let update = *method == Method::PUT || *method == Method::PATCH;
	if !create && !update {
		return Route::Passthrough;
	}

	let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
	let (namespace, kind, named) = match segments.as_slice() {
		["api", "v1", "namespaces", ns, kind] => (ns, kind, false),
		["api", "v1", "namespaces", ns, kind, _name] => (ns, kind, true),
		_ => return Route::Passthrough,
	};
	let resource = match *kind {
		"pods" => Resource::Pod,
		"replicationcontrollers" => Resource::ReplicationController,
		_ => return Route::Passthrough,
	};
	// creates target the collection, updates a named object
	if create == named {
		return Route::Passthrough;
	}
	Route::Guarded {
		resource,
		namespace: namespace.to_string(),
	}
}
