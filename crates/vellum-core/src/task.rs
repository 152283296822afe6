//! [`Task`]: one unit of deferred work, carrying a declared worst-case duration.

use std::time::Duration;

use crate::scheduler::TaskContext;

/// A unit of work the scheduler admits only if it fits the remaining cycle
/// budget. `worst_case` is a static estimate supplied by the caller, not a
/// measurement — admission control trusts it rather than timing the task itself.
///
/// The task body runs with exclusive, synchronous access to the scheduler's
/// owned state via [`TaskContext`]; it must not block on anything beyond its
/// declared worst-case duration.
pub struct Task {
	run: Box<dyn FnOnce(&mut TaskContext<'_>) + Send>,
	worst_case: Duration,
	label: &'static str,
}

impl Task {
	pub fn new(label: &'static str, worst_case: Duration, run: impl FnOnce(&mut TaskContext<'_>) + Send + 'static) -> Self {
		Self {
			run: Box::new(run),
			worst_case,
			label,
		}
	}

	pub fn worst_case(&self) -> Duration {
		self.worst_case
	}

	pub fn label(&self) -> &'static str {
		self.label
	}

	/// Consume and execute the task body against `ctx`.
	pub fn execute(self, ctx: &mut TaskContext<'_>) {
		(self.run)(ctx)
	}
}

impl std::fmt::Debug for Task {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Task")
			.field("label", &self.label)
			.field("worst_case", &self.worst_case)
			.finish_non_exhaustive()
	}
}
