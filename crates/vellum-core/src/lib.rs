//! Server-side core of a collaborative code editor: a budget-based scheduler,
//! per-file edit buffers, a file registry, and a strategy-based notification
//! router, wired together behind a thin [`core_api::CoreApi`] facade.
//!
//! The hard part is the scheduler (`scheduler`): a single cooperative worker
//! thread that interleaves low-priority request tasks with a reserved,
//! high-priority critical sweep every fixed cycle, so editing latency stays
//! bounded under load without any task preempting another.

pub mod archive;
pub mod change;
pub mod config;
pub mod core_api;
pub mod edit_buffer;
pub mod error;
pub mod file_registry;
pub mod fs_boot;
pub mod notification;
pub mod path;
pub mod scheduler;
pub mod task;
pub mod task_queue;

pub use change::{Change, PendingMod};
pub use config::Config;
pub use core_api::CoreApi;
pub use edit_buffer::EditBuffer;
pub use error::{ArchiveError, ConfigError, CoreError};
pub use file_registry::{FileEntry, FileRegistry};
pub use notification::{Event, Listener, ListenerHandle, NotificationRouter};
pub use path::VPath;
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerHandle};
pub use task::Task;
pub use task_queue::{TaskConsumer, TaskProducer};
