/// Wait until the process is told to stop: SIGTERM from the platform or
/// Ctrl-C from an operator.
pub async fn shutdown() {
	imp::wait().await
}

#[cfg(unix)]
mod imp {
	use tokio::signal::unix::{SignalKind, signal};
	use tracing::info;

	pub(super) async fn wait() {
		let mut interrupt = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");
		let mut terminate = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
		let name = tokio::select! {
			_ = interrupt.recv() => "SIGINT",
			_ = terminate.recv() => "SIGTERM",
		};
		info!("received {name}, starting shutdown");
	}
}

#[cfg(not(unix))]
mod imp {
	use tracing::info;

	pub(super) async fn wait() {
		let _ = tokio::signal::ctrl_c().await;
		info!("received interrupt, starting shutdown");
	}
}
