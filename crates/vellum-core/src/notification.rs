//! [`NotificationRouter`]: strategy-selected fan-out of core events to registered
//! listeners.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, error};
use vellum_proto::UserId;

use crate::change::Change;
use crate::path::VPath;

/// The three event kinds the router can deliver.
#[derive(Debug, Clone)]
pub enum Event {
	FileEdit {
		path: VPath,
		changes: Vec<Change>,
		version: u64,
		subscribers: HashSet<UserId>,
	},
	ProjectNodes {
		nodes: Vec<(VPath, bool)>,
		caller: UserId,
	},
	FileContent {
		/// `None` means the requested path does not exist.
		result: Option<(VPath, String, u64)>,
		caller: UserId,
	},
}

/// Anything that wants to receive router events. Implementations own whatever
/// transport (socket, channel) turns an event into bytes on the wire; the core
/// itself never touches I/O.
pub trait Listener: Send {
	fn notify(&self, event: &Event);
}

/// A handle returned by [`NotificationRouter::register_listener`], needed to
/// unregister later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle(usize);

/// Which fan-out mode is currently installed. Kept as a plain tag (rather than a
/// boxed strategy object) per the design note allowing either representation;
/// what matters is that dispatch with zero listeners never allocates or
/// iterates.
enum Strategy {
	Empty,
	Active,
}

/// Fan-out of [`Event`]s to every registered [`Listener`], degenerating to a
/// no-op when no listener is registered.
pub struct NotificationRouter {
	listeners: Vec<Option<Box<dyn Listener>>>,
	active_count: usize,
	strategy: Strategy,
}

impl NotificationRouter {
	pub fn new() -> Self {
		Self {
			listeners: Vec::new(),
			active_count: 0,
			strategy: Strategy::Empty,
		}
	}

	/// Register a listener, switching `Empty -> Active` if this is the first one.
	pub fn register_listener(&mut self, listener: Box<dyn Listener>) -> ListenerHandle {
		let slot = self.listeners.iter().position(Option::is_none);
		let handle = match slot {
			Some(index) => {
				self.listeners[index] = Some(listener);
				index
			}
			None => {
				self.listeners.push(Some(listener));
				self.listeners.len() - 1
			}
		};
		self.active_count += 1;
		self.change_strategy();
		ListenerHandle(handle)
	}

	/// Unregister a previously registered listener, switching `Active -> Empty`
	/// if this was the last one. A double-unregister is a no-op.
	pub fn unregister_listener(&mut self, handle: ListenerHandle) {
		if let Some(slot) = self.listeners.get_mut(handle.0) {
			if slot.take().is_some() {
				self.active_count = self.active_count.saturating_sub(1);
				self.change_strategy();
			}
		}
	}

	fn change_strategy(&mut self) {
		let next = if self.active_count == 0 {
			Strategy::Empty
		} else {
			Strategy::Active
		};
		if matches!((&self.strategy, &next), (Strategy::Empty, Strategy::Active))
			|| matches!((&self.strategy, &next), (Strategy::Active, Strategy::Empty))
		{
			debug!(active_count = self.active_count, "notification router changed strategy");
		}
		self.strategy = next;
	}

	/// Deliver `event` to every registered listener. With zero listeners this is
	/// the cheap fast path: a single match, no iteration, no allocation.
	///
	/// A listener that panics while handling an event is caught and logged; it
	/// does not prevent delivery to the remaining listeners, matching the
	/// "listener error" disposition.
	pub fn dispatch(&self, event: &Event) {
		if let Strategy::Empty = self.strategy {
			return;
		}
		for listener in self.listeners.iter().flatten() {
			let result = catch_unwind(AssertUnwindSafe(|| listener.notify(event)));
			if result.is_err() {
				error!("listener panicked while handling a notification");
			}
		}
	}
}

impl Default for NotificationRouter {
	fn default() -> Self {
		Self::new()
	}
}
