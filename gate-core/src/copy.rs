use std::io;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::trace;

#[derive(thiserror::Error, Debug)]
pub enum CopyError {
	#[error("io error: {0}")]
	Io(#[from] io::Error),

	#[error("while closing connection: {0}")]
	Shutdown(io::Error),

	#[error("destination disconnected before all data was written")]
	BackendDisconnected,

	#[error("client disconnected before all data was written")]
	ClientDisconnected,
}

/// Splice two streams together until both directions are complete.
///
/// Each direction copies until EOF or error, then shuts down its write half.
/// The two directions are join!-ed rather than raced so that a half-closed
/// stream keeps flowing in the other direction, and both sockets are shut
/// down before the call returns.
pub async fn copy_bidirectional<A, B>(downstream: A, upstream: B) -> Result<(u64, u64), CopyError>
where
	A: AsyncRead + AsyncWrite,
	B: AsyncRead + AsyncWrite,
{
	let (mut rd, mut wd) = tokio::io::split(downstream);
	let (mut ru, mut wu) = tokio::io::split(upstream);

	let downstream_to_upstream = async {
		let res = ignore_io_errors(tokio::io::copy(&mut rd, &mut wu).await).map_err(|e| {
			match e.kind() {
				io::ErrorKind::NotConnected | io::ErrorKind::WriteZero => CopyError::BackendDisconnected,
				io::ErrorKind::UnexpectedEof => CopyError::ClientDisconnected,
				_ => e.into(),
			}
		});
		trace!(?res, "send");
		ignore_shutdown_errors(wu.shutdown().await).map_err(CopyError::Shutdown)?;
		res
	};

	let upstream_to_downstream = async {
		let res = ignore_io_errors(tokio::io::copy(&mut ru, &mut wd).await).map_err(|e| {
			match e.kind() {
				io::ErrorKind::NotConnected | io::ErrorKind::WriteZero => CopyError::ClientDisconnected,
				_ => e.into(),
			}
		});
		trace!(?res, "receive");
		ignore_shutdown_errors(wd.shutdown().await).map_err(CopyError::Shutdown)?;
		res
	};

	// join!() rather than try_join!() so we complete either end once one side is done.
	let (sent, received) = tokio::join!(downstream_to_upstream, upstream_to_downstream);
	let (sent, received) = (sent?, received?);
	trace!(sent, received, "copy complete");
	Ok((sent, received))
}

// During copying we may see errors from either side closing its connection.
// A TCP connection can close at any time, so an abrupt RST is not worth
// surfacing as a failure; only report errors that mean we could not move data
// while both ends were alive.
fn ignore_io_errors(res: io::Result<u64>) -> io::Result<u64> {
	use io::ErrorKind::*;
	match &res {
		Err(e) => match e.kind() {
			NotConnected | UnexpectedEof | ConnectionReset | BrokenPipe => {
				trace!(err=%e, "io terminated ungracefully");
				Ok(0)
			},
			_ => res,
		},
		_ => res,
	}
}

// During shutdown the other end may have already disconnected. That is fine,
// they shut down for us.
fn ignore_shutdown_errors(res: io::Result<()>) -> io::Result<()> {
	match &res {
		Err(e) if e.kind() == io::ErrorKind::NotConnected || e.kind() == io::ErrorKind::UnexpectedEof => {
			trace!(err=%e, "failed to shutdown peer, they already shutdown");
			Ok(())
		},
		_ => res,
	}
}
