//! `vellumd`: boots a [`vellum_core::CoreApi`] from a config file and exposes it
//! over the reference JSON socket front door.

mod framing;
mod ipc;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vellum_core::{Config, CoreApi};

#[derive(Parser, Debug)]
#[command(name = "vellumd", about = "Collaborative-edit server core")]
struct Args {
	/// Path to the project's TOML configuration file.
	#[arg(long, default_value = "vellum.toml")]
	config: PathBuf,

	/// Override the config's socket path for the reference front door.
	#[arg(long)]
	socket: Option<PathBuf>,

	/// Enable debug-level logging.
	#[arg(short, long)]
	verbose: bool,
}

fn setup_tracing(verbose: bool) {
	let default_directive = if verbose { "debug" } else { "info" };
	let filter = EnvFilter::try_from_env("VELLUM_LOG").unwrap_or_else(|_| EnvFilter::new(default_directive));

	if let Ok(dir) = std::env::var("VELLUM_LOG_DIR") {
		let dir = PathBuf::from(dir);
		let _ = std::fs::create_dir_all(&dir);
		let log_path = dir.join(format!("vellumd-{}.log", std::process::id()));
		if let Ok(file) = std::fs::File::create(&log_path) {
			tracing_subscriber::fmt().with_env_filter(filter).with_writer(file).with_ansi(false).init();
			return;
		}
	}

	tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();
	setup_tracing(args.verbose);

	let config = Config::load(&args.config).with_context(|| format!("loading config from {}", args.config.display()))?;
	let socket_path = args.socket.clone().unwrap_or_else(|| config.tmp_dir.join("vellumd.sock"));

	let core = Arc::new(CoreApi::new(&config).context("booting core")?);
	core.start();

	ipc::serve(&socket_path, core).await
}
