use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use vellum_core::{Event, Listener};

/// A test harness that captures every event delivered to it, mirroring the
/// style of per-test listener stand-ins used elsewhere in this codebase.
pub struct TestListener {
	tx: mpsc::Sender<Event>,
}

pub struct TestListenerHandle {
	pub rx: Receiver<Event>,
}

impl TestListener {
	pub fn new() -> (Box<dyn Listener>, TestListenerHandle) {
		let (tx, rx) = mpsc::channel();
		(Box::new(Self { tx }), TestListenerHandle { rx })
	}
}

impl Listener for TestListener {
	fn notify(&self, event: &Event) {
		let _ = self.tx.send(event.clone());
	}
}

impl TestListenerHandle {
	pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
		self.rx.recv_timeout(timeout).ok()
	}
}

pub fn write_config(dir: &std::path::Path, cycle_time_us: u64) -> vellum_core::Config {
	let base = dir.join("base");
	let code = dir.join("code");
	let backup = dir.join("backup");
	let exec = dir.join("exec");
	let tmp = dir.join("tmp");

	let toml = format!(
		r#"
		name = "scenario"
		base_dir = {base:?}
		code_dir = {code:?}
		backup_dir = {backup:?}
		exec_dir = {exec:?}
		tmp_dir = {tmp:?}
		cycle_time = {cycle_time_us}
		buffer_critical = 30
		buffer_secondary = 40
		buffer_auxiliary = 30
		"#
	);
	vellum_core::Config::parse(&toml).expect("valid test config")
}
