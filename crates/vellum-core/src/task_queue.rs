//! A bounded, blocking task queue split into a cloneable producer side and a
//! single-consumer side owned by the scheduler's worker thread.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::time::Duration;

use crate::task::Task;

/// The producer half: cheap to clone, safe to hand to every thread that calls
/// into [`crate::core_api::CoreApi`].
#[derive(Clone)]
pub struct TaskProducer {
	sender: SyncSender<Task>,
}

impl TaskProducer {
	/// Enqueue `task`. Blocks the caller if the queue is at capacity — this
	/// repository's chosen backpressure policy (see the concurrency design's
	/// "Backpressure" note) rather than a fail-fast alternative.
	pub fn put(&self, task: Task) {
		// An Err here means the consumer end was dropped, i.e. the scheduler has
		// shut down; there is nothing useful left to do with the task.
		let _ = self.sender.send(task);
	}
}

/// The consumer half: owned exclusively by the scheduler's worker thread.
///
/// `retry` is a local, unbounded holding area for tasks the scheduler itself
/// deferred because they didn't fit the remaining cycle budget. It is
/// deliberately *not* the same bounded channel producers write to: writing a
/// requeued task back into that channel would block on `send` once it's at
/// capacity, and since the scheduler is the channel's only consumer, that
/// would be a second, self-inflicted suspension point beyond
/// `get_with_timeout` — a deadlock under sustained producer load. Draining
/// `retry` first preserves "the worker suspends only on `getWithTimeout`".
pub struct TaskConsumer {
	receiver: Receiver<Task>,
	retry: VecDeque<Task>,
}

impl TaskConsumer {
	/// Return the next task without blocking if one was deferred from a
	/// previous cycle; otherwise block for up to `timeout` waiting on the
	/// producer-facing channel. Returns `None` on timeout without an error — a
	/// timeout is an expected, routine outcome, not a failure.
	pub fn get_with_timeout(&mut self, timeout: Duration) -> Option<Task> {
		if let Some(task) = self.retry.pop_front() {
			return Some(task);
		}
		match self.receiver.recv_timeout(timeout) {
			Ok(task) => Some(task),
			Err(RecvTimeoutError::Timeout) => None,
			Err(RecvTimeoutError::Disconnected) => None,
		}
	}

	/// Defer a task that did not fit in the remaining budget this cycle, so it
	/// is retried (ahead of newly arrived tasks) on the next one. Tasks are
	/// commutative with respect to each other (each targets one file or user,
	/// reconciled by the critical sweep), so deferring one is a
	/// correctness-preserving transformation. Never blocks.
	pub fn requeue(&mut self, task: Task) {
		self.retry.push_back(task);
	}
}

/// Construct a bounded task queue with the given capacity.
pub fn channel(capacity: usize) -> (TaskProducer, TaskConsumer) {
	let (sender, receiver) = mpsc::sync_channel(capacity.max(1));
	(
		TaskProducer { sender },
		TaskConsumer {
			receiver,
			retry: VecDeque::new(),
		},
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::file_registry::FileRegistry;
	use crate::notification::NotificationRouter;
	use crate::scheduler::TaskContext;
	use std::sync::Arc;

	/// A scratch context for tests that only need *a* context to execute
	/// against, not the scheduler's real owned state.
	fn scratch_context<'a>(registry: &'a mut FileRegistry, router: &'a NotificationRouter) -> TaskContext<'a> {
		TaskContext { registry, router }
	}

	#[test]
	fn put_then_get_runs_in_order() {
		let (producer, mut consumer) = channel(8);
		let log = Arc::new(std::sync::Mutex::new(Vec::new()));

		for i in 0..3 {
			let log = Arc::clone(&log);
			producer.put(Task::new("t", Duration::from_millis(1), move |_ctx| {
				log.lock().unwrap().push(i);
			}));
		}

		let mut registry = FileRegistry::new();
		let router = NotificationRouter::new();
		for _ in 0..3 {
			let mut ctx = scratch_context(&mut registry, &router);
			consumer
				.get_with_timeout(Duration::from_millis(50))
				.expect("task available")
				.execute(&mut ctx);
		}

		assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
	}

	#[test]
	fn get_with_timeout_returns_none_when_empty() {
		let (_producer, mut consumer) = channel(4);
		assert!(consumer.get_with_timeout(Duration::from_millis(10)).is_none());
	}

	#[test]
	fn requeue_is_returned_on_the_next_get_ahead_of_the_channel() {
		let (producer, mut consumer) = channel(8);

		producer.put(Task::new("first", Duration::from_millis(1), |_ctx| {}));
		producer.put(Task::new("second", Duration::from_millis(1), |_ctx| {}));

		let first = consumer.get_with_timeout(Duration::from_millis(50)).unwrap();
		assert_eq!(first.label(), "first");
		consumer.requeue(first);

		// the deferred task is retried before "second", which was already
		// waiting in the channel.
		let next = consumer.get_with_timeout(Duration::from_millis(50)).unwrap();
		assert_eq!(next.label(), "first");
		let after = consumer.get_with_timeout(Duration::from_millis(50)).unwrap();
		assert_eq!(after.label(), "second");
	}

	#[test]
	fn requeue_never_blocks_even_when_the_channel_is_at_capacity() {
		let (producer, mut consumer) = channel(1);
		producer.put(Task::new("filler", Duration::from_millis(1), |_ctx| {}));

		let task = consumer.get_with_timeout(Duration::from_millis(50)).unwrap();
		// the channel is empty again here, but requeue must not depend on that:
		// it writes to the local retry queue, never back into the channel.
		producer.put(Task::new("filler-2", Duration::from_millis(1), |_ctx| {}));
		consumer.requeue(task);

		let next = consumer.get_with_timeout(Duration::from_millis(50)).unwrap();
		assert_eq!(next.label(), "filler");
	}
}
