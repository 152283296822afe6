//! The cooperative, budget-based [`Scheduler`]: the single worker thread that
//! drains the [`TaskQueue`](crate::task_queue) and runs the critical sweep.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::Config;
use crate::file_registry::FileRegistry;
use crate::notification::{Event, NotificationRouter};
use crate::path::VPath;
use crate::task::Task;
use crate::task_queue::TaskConsumer;

/// Everything a [`Task`] body needs to act on shared state: mutable, exclusive
/// access to the registry (the scheduler is its sole owner) and a read handle
/// onto the notification router (shared with the API side for registration).
pub struct TaskContext<'a> {
	pub registry: &'a mut FileRegistry,
	pub router: &'a NotificationRouter,
}

/// Timing configuration derived from [`Config`]: the cycle period and its three
/// band allocations, plus the declared worst-case duration of the critical
/// sweep itself (also subject to admission control).
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
	pub cycle_time: Duration,
	pub buffer_critical_pct: u8,
	pub buffer_secondary_pct: u8,
	pub buffer_auxiliary_pct: u8,
	pub critical_sweep_worst_case: Duration,
}

impl SchedulerConfig {
	pub fn from_config(config: &Config, critical_sweep_worst_case: Duration) -> Self {
		Self {
			cycle_time: config.cycle_time(),
			buffer_critical_pct: config.buffer_critical,
			buffer_secondary_pct: config.buffer_secondary,
			buffer_auxiliary_pct: config.buffer_auxiliary,
			critical_sweep_worst_case,
		}
	}

	fn band(&self, pct: u8) -> Duration {
		self.cycle_time * pct as u32 / 100
	}

	/// Non-critical budget: secondary + auxiliary bands.
	pub fn t_nc(&self) -> Duration {
		self.band(self.buffer_secondary_pct) + self.band(self.buffer_auxiliary_pct)
	}

	/// Critical band.
	pub fn t_crit(&self) -> Duration {
		self.band(self.buffer_critical_pct)
	}
}

const STOPPED: u8 = 0;
const RUNNING: u8 = 1;
const STOP_REQUESTED: u8 = 2;

/// A cloneable, thread-safe control surface over a running scheduler's
/// `Stopped` / `Running` / `StopRequested` state machine.
#[derive(Clone)]
pub struct SchedulerHandle {
	state: Arc<AtomicU8>,
}

impl SchedulerHandle {
	/// `Stopped -> Running`. Idempotent: starting an already-running scheduler
	/// is a logged no-op.
	pub fn start(&self) {
		let prev = self.state.swap(RUNNING, Ordering::SeqCst);
		if prev == RUNNING {
			debug!("start() on an already-running scheduler is a no-op");
		}
	}

	/// `Running -> StopRequested`. The current cycle always completes before
	/// the worker actually goes idle. Idempotent.
	pub fn stop(&self) {
		match self.state.compare_exchange(RUNNING, STOP_REQUESTED, Ordering::SeqCst, Ordering::SeqCst) {
			Ok(_) => {}
			Err(_) => debug!("stop() on a non-running scheduler is a no-op"),
		}
	}

	pub fn is_running(&self) -> bool {
		self.state.load(Ordering::SeqCst) != STOPPED
	}
}

/// Owns the registry, the shared router/snapshot handles, and the consumer
/// side of the task queue; runs the fixed-period cycle loop on its own thread
/// once spawned.
pub struct Scheduler {
	config: SchedulerConfig,
	registry: FileRegistry,
	router: Arc<Mutex<NotificationRouter>>,
	snapshot: Arc<Mutex<BTreeMap<VPath, (String, u64)>>>,
	consumer: TaskConsumer,
	handle: SchedulerHandle,
}

impl Scheduler {
	pub fn new(
		config: SchedulerConfig,
		registry: FileRegistry,
		router: Arc<Mutex<NotificationRouter>>,
		snapshot: Arc<Mutex<BTreeMap<VPath, (String, u64)>>>,
		consumer: TaskConsumer,
	) -> Self {
		Self {
			config,
			registry,
			router,
			snapshot,
			consumer,
			handle: SchedulerHandle {
				state: Arc::new(AtomicU8::new(STOPPED)),
			},
		}
	}

	/// A handle that can be cloned and given to callers before the scheduler is
	/// moved onto its own thread.
	pub fn handle(&self) -> SchedulerHandle {
		self.handle.clone()
	}

	/// Move this scheduler onto a dedicated OS thread and begin its idle/cycle
	/// loop. The loop runs forever (until the process exits); `start()`/`stop()`
	/// on the returned handle toggle whether cycles actually execute.
	pub fn spawn(self) -> SchedulerHandle {
		let handle = self.handle.clone();
		thread::Builder::new()
			.name("vellum-scheduler".to_string())
			.spawn(move || self.run_loop())
			.expect("failed to spawn scheduler thread");
		handle
	}

	fn run_loop(mut self) {
		let mut anchors: Option<(Instant, Instant)> = None;

		loop {
			match self.handle.state.load(Ordering::SeqCst) {
				STOPPED => {
					thread::park_timeout(Duration::from_millis(20));
					continue;
				}
				STOP_REQUESTED => {
					self.handle.state.store(STOPPED, Ordering::SeqCst);
					anchors = None;
					continue;
				}
				_ => {}
			}

			let (deadline_nc, deadline_crit) = *anchors.get_or_insert_with(|| {
				let now = Instant::now();
				let deadline_nc = now + self.config.t_nc();
				let deadline_crit = deadline_nc + self.config.t_crit();
				(deadline_nc, deadline_crit)
			});

			self.run_non_critical_phase(deadline_nc);
			self.run_critical_phase(deadline_crit);

			anchors = Some((deadline_nc + self.config.cycle_time, deadline_crit + self.config.cycle_time));
		}
	}

	fn run_non_critical_phase(&mut self, deadline_nc: Instant) {
		loop {
			let now = Instant::now();
			if now >= deadline_nc {
				return;
			}
			let Some(task) = self.consumer.get_with_timeout(deadline_nc - now) else {
				return;
			};

			let now = Instant::now();
			if now + task.worst_case() < deadline_nc {
				self.execute_task(task);
			} else {
				self.consumer.requeue(task);
				return;
			}
		}
	}

	fn run_critical_phase(&mut self, deadline_crit: Instant) {
		let now = Instant::now();
		if now + self.config.critical_sweep_worst_case < deadline_crit {
			self.critical_sweep();
		} else {
			warn!("critical sweep skipped this cycle: insufficient remaining budget");
		}
	}

	fn execute_task(&mut self, task: Task) {
		let router = self.router.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
		let mut ctx = TaskContext {
			registry: &mut self.registry,
			router: &router,
		};
		task.execute(&mut ctx);
	}

	/// Flush every non-empty buffer and broadcast the resulting changeset to its
	/// subscribers. Never runs more than once per cycle.
	fn critical_sweep(&mut self) {
		let router = self.router.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
		let dirty: Vec<VPath> = self
			.registry
			.iter()
			.filter(|(_, entry)| !entry.buffer.is_empty())
			.map(|(path, _)| path.clone())
			.collect();

		for path in dirty {
			let Some(entry) = self.registry.get_mut(&path) else {
				continue;
			};
			if entry.buffer.is_empty() {
				continue;
			}
			let (version, changes) = entry.buffer.flush();
			let subscribers = entry.subscribers.clone();
			let content = entry.buffer.content();

			if let Ok(mut snapshot) = self.snapshot.lock() {
				snapshot.insert(path.clone(), (content, version));
			}

			router.dispatch(&Event::FileEdit {
				path,
				changes,
				version,
				subscribers,
			});
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::task_queue::{self, TaskProducer};
	use std::sync::mpsc;

	fn make_scheduler(config: SchedulerConfig) -> (Scheduler, TaskProducer) {
		let (producer, consumer) = task_queue::channel(32);
		let scheduler = Scheduler::new(
			config,
			FileRegistry::new(),
			Arc::new(Mutex::new(NotificationRouter::new())),
			Arc::new(Mutex::new(BTreeMap::new())),
			consumer,
		);
		(scheduler, producer)
	}

	#[test]
	fn cycle_budget_admits_tasks_that_fit() {
		let config = SchedulerConfig {
			cycle_time: Duration::from_millis(100),
			buffer_critical_pct: 20,
			buffer_secondary_pct: 40,
			buffer_auxiliary_pct: 40,
			critical_sweep_worst_case: Duration::from_micros(100),
		};
		let (scheduler, producer) = make_scheduler(config);
		let handle = scheduler.handle();

		let (done_tx, done_rx) = mpsc::channel();
		for i in 0..5 {
			let tx = done_tx.clone();
			producer.put(Task::new("t", Duration::from_millis(10), move |_ctx| {
				tx.send(i).unwrap();
			}));
		}

		let _scheduler_handle = scheduler.spawn();
		handle.start();

		let mut seen = Vec::new();
		for _ in 0..5 {
			seen.push(done_rx.recv_timeout(Duration::from_secs(2)).expect("task ran"));
		}
		seen.sort();
		assert_eq!(seen, vec![0, 1, 2, 3, 4]);
		handle.stop();
	}

	#[test]
	fn oversized_task_is_deferred_not_dropped() {
		let config = SchedulerConfig {
			cycle_time: Duration::from_millis(50),
			buffer_critical_pct: 20,
			buffer_secondary_pct: 40,
			buffer_auxiliary_pct: 40,
			critical_sweep_worst_case: Duration::from_micros(100),
		};
		let (scheduler, producer) = make_scheduler(config);
		let handle = scheduler.handle();

		let (done_tx, done_rx) = mpsc::channel();
		producer.put(Task::new("too-big", Duration::from_millis(200), move |_ctx| {
			done_tx.send(()).unwrap();
		}));

		let _scheduler_handle = scheduler.spawn();
		handle.start();

		// it should not run within a couple of cycles' worth of waiting...
		assert!(done_rx.recv_timeout(Duration::from_millis(300)).is_err());
		handle.stop();
	}

	#[test]
	fn stop_prevents_further_execution() {
		let config = SchedulerConfig {
			cycle_time: Duration::from_millis(20),
			buffer_critical_pct: 20,
			buffer_secondary_pct: 40,
			buffer_auxiliary_pct: 40,
			critical_sweep_worst_case: Duration::from_micros(100),
		};
		let (scheduler, producer) = make_scheduler(config);
		let handle = scheduler.handle();
		let _scheduler_handle = scheduler.spawn();

		handle.start();
		handle.stop();
		// allow the in-flight cycle to wind down
		thread::sleep(Duration::from_millis(50));

		let (done_tx, done_rx) = mpsc::channel();
		producer.put(Task::new("after-stop", Duration::from_micros(1), move |_ctx| {
			done_tx.send(()).unwrap();
		}));
		assert!(done_rx.recv_timeout(Duration::from_millis(200)).is_err());
	}
}
