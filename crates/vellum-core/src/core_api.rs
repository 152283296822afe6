//! [`CoreApi`]: the thin facade external collaborators call into.
//!
//! Every query/mutation method just enqueues a [`Task`]; only
//! [`CoreApi::register_application_listener`],
//! [`CoreApi::unregister_application_listener`], [`CoreApi::start`], and
//! [`CoreApi::stop`] act immediately, matching the sync/async split in the
//! component design.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vellum_proto::UserId;

use crate::archive;
use crate::change::{Change, PendingMod};
use crate::config::Config;
use crate::error::{ArchiveError, CoreError};
use crate::fs_boot;
use crate::notification::{Event, Listener, ListenerHandle, NotificationRouter};
use crate::path::VPath;
use crate::scheduler::{Scheduler, SchedulerConfig, SchedulerHandle};
use crate::task::Task;
use crate::task_queue::{self, TaskProducer};

/// Declared worst-case durations for the metadata operations below. These are
/// static estimates for admission control, not measurements; they stay small
/// because every one of these ops touches only in-memory state.
const METADATA_TASK_DURATION: Duration = Duration::from_micros(200);
const ARCHIVE_TASK_DURATION: Duration = Duration::from_millis(50);

/// The default declared worst-case for the critical sweep itself. Projects
/// with very large files or very many subscribers should raise this via
/// [`CoreApi::with_critical_sweep_budget`].
pub const DEFAULT_CRITICAL_SWEEP_BUDGET: Duration = Duration::from_millis(5);

/// Depth of the bounded task queue before producers start blocking.
const DEFAULT_QUEUE_CAPACITY: usize = 1024;

pub struct CoreApi {
	producer: TaskProducer,
	router: Arc<Mutex<NotificationRouter>>,
	snapshot: Arc<Mutex<BTreeMap<VPath, (String, u64)>>>,
	scheduler: SchedulerHandle,
	project_name: String,
	tmp_dir: PathBuf,
}

impl CoreApi {
	/// Boot the filesystem layout and registry from `config`, spawn the
	/// scheduler thread (stopped; call [`CoreApi::start`] to begin cycling),
	/// and return the facade.
	pub fn new(config: &Config) -> Result<Self, CoreError> {
		Self::with_critical_sweep_budget(config, DEFAULT_CRITICAL_SWEEP_BUDGET)
	}

	pub fn with_critical_sweep_budget(config: &Config, critical_sweep_budget: Duration) -> Result<Self, CoreError> {
		let registry = fs_boot::boot(config)?;

		let snapshot: BTreeMap<VPath, (String, u64)> = registry
			.iter()
			.map(|(path, entry)| (path.clone(), (entry.buffer.content(), entry.buffer.version())))
			.collect();
		let snapshot = Arc::new(Mutex::new(snapshot));
		let router = Arc::new(Mutex::new(NotificationRouter::new()));

		let (producer, consumer) = task_queue::channel(DEFAULT_QUEUE_CAPACITY);
		let scheduler_config = SchedulerConfig::from_config(config, critical_sweep_budget);
		let scheduler = Scheduler::new(scheduler_config, registry, Arc::clone(&router), Arc::clone(&snapshot), consumer);
		let handle = scheduler.handle();
		scheduler.spawn();

		Ok(Self {
			producer,
			router,
			snapshot,
			scheduler: handle,
			project_name: config.name.clone(),
			tmp_dir: config.tmp_dir.clone(),
		})
	}

	/// Begin running scheduler cycles. Idempotent.
	pub fn start(&self) {
		self.scheduler.start();
	}

	/// Request the scheduler stop after the current cycle. Idempotent.
	pub fn stop(&self) {
		self.scheduler.stop();
	}

	pub fn register_application_listener(&self, listener: Box<dyn Listener>) -> ListenerHandle {
		self.router
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.register_listener(listener)
	}

	pub fn unregister_application_listener(&self, handle: ListenerHandle) {
		self.router
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.unregister_listener(handle);
	}

	/// Synchronous read-only accessor over the most recently committed content
	/// and version of `path`. Backed by a snapshot the scheduler publishes after
	/// every flush (and seeded at boot); see the design notes for why this is a
	/// plain accessor rather than a queued, async reply.
	///
	/// Returns `None` both for files that don't exist and for files that exist
	/// but have not yet completed a first flush since boot.
	pub fn peek_file_content(&self, path: &VPath) -> Option<(String, u64)> {
		self.snapshot
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.get(path)
			.cloned()
	}

	pub fn get_project_nodes(&self, caller: UserId) {
		self.producer.put(Task::new("get_project_nodes", METADATA_TASK_DURATION, move |ctx| {
			let nodes = ctx.registry.list_nodes();
			ctx.router.dispatch(&Event::ProjectNodes { nodes, caller });
		}));
	}

	pub fn get_file_content(&self, path: VPath, caller: UserId) {
		self.producer.put(Task::new("get_file_content", METADATA_TASK_DURATION, move |ctx| {
			let result = ctx
				.registry
				.get(&path)
				.map(|entry| (path.clone(), entry.buffer.content(), entry.buffer.version()));
			ctx.router.dispatch(&Event::FileContent { result, caller });
		}));
	}

	pub fn open_file(&self, user: UserId, path: VPath) {
		self.producer.put(Task::new("open_file", METADATA_TASK_DURATION, move |ctx| {
			let entry = ctx.registry.ensure(path.clone());
			entry.subscribers.insert(user.clone());
			let result = Some((path.clone(), entry.buffer.content(), entry.buffer.version()));
			ctx.router.dispatch(&Event::FileContent { result, caller: user });
		}));
	}

	pub fn unregister_user_to_file(&self, user: UserId, path: VPath) {
		self.producer
			.put(Task::new("unregister_user_to_file", METADATA_TASK_DURATION, move |ctx| {
				ctx.registry.unsubscribe(&user, &path);
			}));
	}

	pub fn unregister_user_to_all_files(&self, user: UserId) {
		self.producer
			.put(Task::new("unregister_user_to_all_files", METADATA_TASK_DURATION, move |ctx| {
				ctx.registry.unsubscribe_all(&user);
			}));
	}

	/// Queue `changes` onto `path`'s pending edit buffer, to be applied at the
	/// next critical sweep. Does not itself touch the notification router — the
	/// sweep is solely responsible for `onFileEdit`. A path that has no known
	/// entry (never opened, and not present at boot) is a lifecycle race: the
	/// edit becomes a no-op rather than fabricating a new file out of thin air.
	pub fn file_edit(&self, path: VPath, changes: Vec<Change>, author: impl Into<String>) {
		let author = author.into();
		self.producer.put(Task::new("file_edit", METADATA_TASK_DURATION, move |ctx| {
			let Some(entry) = ctx.registry.get_mut(&path) else {
				return;
			};
			let mods = changes.into_iter().map(|change| PendingMod::new(change, author.clone()));
			entry.buffer.append(mods);
		}));
	}

	/// Enqueue archive creation and return a one-shot future (a plain
	/// `Receiver`) the caller can block on, mirroring the original
	/// queue-as-future pattern for this one synchronous-feeling operation.
	pub fn create_archive(&self, prefix: VPath, caller: UserId) -> Receiver<Result<PathBuf, ArchiveError>> {
		let (tx, rx) = mpsc::channel();
		let tmp_dir = self.tmp_dir.clone();
		let project_name = self.project_name.clone();
		self.producer.put(Task::new("create_archive", ARCHIVE_TASK_DURATION, move |ctx| {
			let out_path = tmp_dir.join(format!("{project_name}-{caller}.zip"));
			let result = archive::create_zip_for_prefix(ctx.registry, &prefix, &out_path).map(|()| out_path);
			let _ = tx.send(result);
		}));
		rx
	}
}
