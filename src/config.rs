use std::net::SocketAddr;
use std::path::PathBuf;

use ::http::Uri;
use anyhow::{Context, bail};

/// Validated service configuration, assembled once at startup.
#[derive(Debug, Clone)]
pub struct Config {
	pub bind: SocketAddr,
	pub upstream: Uri,
	pub tls_cert: PathBuf,
	pub tls_key: PathBuf,
	pub policy_file: PathBuf,
}

impl Config {
	pub fn new(
		bind: &str,
		url: &str,
		tls_cert: PathBuf,
		tls_key: PathBuf,
		policy_file: PathBuf,
	) -> anyhow::Result<Config> {
		let upstream: Uri = url.parse().with_context(|| format!("invalid upstream url {url:?}"))?;
		if upstream.scheme_str() != Some("https") {
			bail!("the upstream api url must be https, got {url:?}");
		}
		if upstream.host().is_none() {
			bail!("the upstream api url {url:?} has no host");
		}
		Ok(Config {
			bind: parse_bind(bind)?,
			upstream,
			tls_cert,
			tls_key,
			policy_file,
		})
	}

	/// The `host:port` to dial for hijacked streams, defaulting to the
	/// scheme's standard port when the url omits one.
	pub fn upstream_addr(&self) -> String {
		let host = self.upstream.host().unwrap_or_default();
		let port = self.upstream.port_u16().unwrap_or_else(|| {
			match self.upstream.scheme_str() {
				Some("http") => 80,
				_ => 443,
			}
		});
		format!("{host}:{port}")
	}

	pub fn upstream_is_https(&self) -> bool {
		self.upstream.scheme_str() != Some("http")
	}
}

// ":6444" binds every interface on that port
fn parse_bind(bind: &str) -> anyhow::Result<SocketAddr> {
	let addr = match bind.strip_prefix(':') {
		Some(port) => format!("0.0.0.0:{port}"),
		None => bind.to_string(),
	};
	addr
		.parse()
		.with_context(|| format!("invalid bind address {bind:?}"))
}
