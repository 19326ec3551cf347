use std::path::PathBuf;
use std::process;

use clap::{CommandFactory, Parser};
use podgate::Config;
use podgate::policy::PolicySet;
use podgate::proxy::Gateway;
use tracing::info;

#[derive(Parser, Debug)]
#[command(about = "An admission-control reverse proxy for the orchestration api", version)]
struct Args {
	/// The path to the tls certificate for the service to use
	#[arg(long = "tls-cert", value_name = "path")]
	tls_cert: PathBuf,

	/// The path to the tls private key for the service
	#[arg(long = "tls-key", value_name = "path")]
	tls_key: PathBuf,

	/// The url for the upstream api service, must be https
	#[arg(long = "url", value_name = "url", default_value = "https://127.0.0.1:6443")]
	url: String,

	/// The path to the file containing the pod security policies
	#[arg(long = "policy-file", value_name = "path")]
	policy_file: PathBuf,

	/// The interface and port for the service to listen on
	#[arg(long = "bind", value_name = "host:port", default_value = ":6444")]
	bind: String,
}

fn main() {
	gate_core::telemetry::setup_logging();

	let args = Args::try_parse().unwrap_or_else(|e| {
		let code = if e.use_stderr() { 1 } else { 0 };
		let _ = e.print();
		process::exit(code);
	});

	if let Err(err) = run(args) {
		let _ = Args::command().print_help();
		eprintln!("[error] {err:#}");
		process::exit(1);
	}
}

fn run(args: Args) -> anyhow::Result<()> {
	info!("initializing {}", gate_core::build_info!());

	let cfg = Config::new(&args.bind, &args.url, args.tls_cert, args.tls_key, args.policy_file)?;
	let policies = PolicySet::load(&cfg.policy_file)?;
	info!(upstream = %cfg.upstream, policies = policies.len(), "admission control ready");

	tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()?
		.block_on(async move { Gateway::new(cfg, policies)?.run().await })
}
