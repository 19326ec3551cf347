use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, ServerConfig};

pub fn provider() -> Arc<CryptoProvider> {
	Arc::new(rustls::crypto::ring::default_provider())
}

/// Build the front-end server config from a PEM certificate chain and key.
pub fn server_config(cert: &Path, key: &Path) -> anyhow::Result<ServerConfig> {
	let certs = rustls_pemfile::certs(&mut BufReader::new(
		File::open(cert).with_context(|| format!("unable to open certificate {}", cert.display()))?,
	))
	.collect::<Result<Vec<_>, _>>()
	.with_context(|| format!("unable to parse certificate {}", cert.display()))?;
	if certs.is_empty() {
		bail!("no certificates found in {}", cert.display());
	}
	let key = rustls_pemfile::private_key(&mut BufReader::new(
		File::open(key).with_context(|| format!("unable to open private key {}", key.display()))?,
	))
	.with_context(|| format!("unable to parse private key {}", key.display()))?
	.with_context(|| format!("no private key found in {}", key.display()))?;

	let mut config = ServerConfig::builder_with_provider(provider())
		.with_safe_default_protocol_versions()
		.context("tls protocol configuration")?
		.with_no_client_auth()
		.with_single_cert(certs, key)
		.context("invalid certificate/key pair")?;
	config.alpn_protocols = vec![b"http/1.1".to_vec()];
	Ok(config)
}

/// Client config for the upstream leg. Certificate verification is disabled;
/// the upstream is a trusted co-located endpoint.
pub fn insecure_client_config() -> anyhow::Result<ClientConfig> {
	let config = ClientConfig::builder_with_provider(provider())
		.with_safe_default_protocol_versions()
		.context("tls protocol configuration")?
		.dangerous()
		.with_custom_certificate_verifier(Arc::new(insecure::NoVerifier))
		.with_no_client_auth();
	Ok(config)
}

pub mod insecure {
	use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
	use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
	use rustls::{DigitallySignedStruct, SignatureScheme};

	use super::provider;

	#[derive(Debug)]
	pub struct NoVerifier;

	impl ServerCertVerifier for NoVerifier {
		fn verify_server_cert(
			&self,
			_end_entity: &CertificateDer,
			_intermediates: &[CertificateDer],
			_server_name: &ServerName,
			_ocsp_response: &[u8],
			_now: UnixTime,
		) -> Result<ServerCertVerified, rustls::Error> {
			Ok(ServerCertVerified::assertion())
		}

		fn verify_tls12_signature(
			&self,
			_message: &[u8],
			_cert: &CertificateDer,
			_dss: &DigitallySignedStruct,
		) -> Result<HandshakeSignatureValid, rustls::Error> {
			Ok(HandshakeSignatureValid::assertion())
		}

		fn verify_tls13_signature(
			&self,
			_message: &[u8],
			_cert: &CertificateDer,
			_dss: &DigitallySignedStruct,
		) -> Result<HandshakeSignatureValid, rustls::Error> {
			Ok(HandshakeSignatureValid::assertion())
		}

		fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
			provider().signature_verification_algorithms.supported_schemes()
		}
	}
}
