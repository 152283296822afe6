//! [`EditBuffer`]: one file's content, its pending modification queue, and its
//! monotonic version counter.

use std::collections::VecDeque;

use ropey::Rope;
use tracing::warn;

use crate::change::{Change, PendingMod};

/// Per-file content plus the not-yet-applied edit queue.
///
/// Not thread-safe by itself — serialization is the scheduler's job; only the
/// single worker thread ever calls [`EditBuffer::flush`].
pub struct EditBuffer {
	content: Rope,
	pending: VecDeque<PendingMod>,
	version: u64,
}

impl EditBuffer {
	/// An empty buffer, as created the first time a path is touched with no
	/// corresponding on-disk file.
	pub fn new() -> Self {
		Self {
			content: Rope::new(),
			pending: VecDeque::new(),
			version: 0,
		}
	}

	/// A buffer seeded with existing content, as created when the registry boots
	/// from the on-disk source tree.
	pub fn from_content(initial: &str) -> Self {
		Self {
			content: Rope::from_str(initial),
			pending: VecDeque::new(),
			version: 0,
		}
	}

	pub fn version(&self) -> u64 {
		self.version
	}

	/// The currently committed content (as of the last successful flush).
	pub fn content(&self) -> String {
		self.content.to_string()
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}

	/// Queue modifications for the next flush. Non-blocking; the caller has
	/// already validated argument shapes.
	pub fn append(&mut self, mods: impl IntoIterator<Item = PendingMod>) {
		self.pending.extend(mods);
	}

	/// Drain the entire pending queue, applying each change to `content` in queue
	/// order. A change with an out-of-range position is dropped and logged rather
	/// than aborting the flush; all others are applied. `version` is incremented
	/// exactly once, even if every queued change turns out to be invalid.
	///
	/// Returns the new version and the changes that were actually applied, in
	/// apply order.
	pub fn flush(&mut self) -> (u64, Vec<Change>) {
		let drained: Vec<PendingMod> = self.pending.drain(..).collect();
		let mut applied = Vec::with_capacity(drained.len());

		for pending_mod in drained {
			match self.apply_one(pending_mod.change) {
				Some(applied_change) => applied.push(applied_change),
				None => warn!(author = %pending_mod.author, "dropped out-of-range change"),
			}
		}

		self.version += 1;
		(self.version, applied)
	}

	/// Apply a single change, clamping in-range overruns and rejecting changes
	/// that cannot be made sensible by clamping. Returns the change as actually
	/// applied (after clamping), so subscribers are told exactly what happened to
	/// the content.
	fn apply_one(&mut self, change: Change) -> Option<Change> {
		let len_chars = self.content.len_chars();
		match change {
			Change::Insert { pos, text } => {
				let pos = pos.min(len_chars);
				self.content.insert(pos, &text);
				Some(Change::Insert { pos, text })
			}
			Change::Delete { pos, count } => {
				if pos > len_chars {
					return None;
				}
				let count = count.min(len_chars - pos);
				if count == 0 {
					return Some(Change::Delete { pos, count: 0 });
				}
				self.content.remove(pos..pos + count);
				Some(Change::Delete { pos, count })
			}
		}
	}
}

impl Default for EditBuffer {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn insert(pos: usize, text: &str) -> PendingMod {
		PendingMod::new(
			Change::Insert {
				pos,
				text: text.to_string(),
			},
			"tester",
		)
	}

	fn delete(pos: usize, count: usize) -> PendingMod {
		PendingMod::new(Change::Delete { pos, count }, "tester")
	}

	#[test]
	fn flush_on_empty_queue_is_a_no_op() {
		let mut buf = EditBuffer::from_content("hello");
		assert!(buf.is_empty());
		// scheduler only calls flush() on non-empty buffers, but the method itself
		// must still behave sanely if misused.
		let (version, applied) = buf.flush();
		assert_eq!(version, 1);
		assert!(applied.is_empty());
		assert_eq!(buf.content(), "hello");
	}

	#[test]
	fn insert_then_delete_round_trips() {
		let mut buf = EditBuffer::from_content("hello");
		buf.append([insert(5, " world")]);
		let (v1, _) = buf.flush();
		assert_eq!(v1, 1);
		assert_eq!(buf.content(), "hello world");

		buf.append([delete(5, 6)]);
		let (v2, _) = buf.flush();
		assert_eq!(v2, 2);
		assert_eq!(buf.content(), "hello");
	}

	#[test]
	fn version_increments_once_per_flush_regardless_of_change_count() {
		let mut buf = EditBuffer::new();
		buf.append([insert(0, "a"), insert(1, "b"), insert(2, "c")]);
		let (version, applied) = buf.flush();
		assert_eq!(version, 1);
		assert_eq!(applied.len(), 3);
		assert_eq!(buf.content(), "abc");
	}

	#[test]
	fn insert_past_end_clamps_to_append() {
		let mut buf = EditBuffer::from_content("abc");
		buf.append([insert(999, "!")]);
		let (_, applied) = buf.flush();
		assert_eq!(buf.content(), "abc!");
		assert_eq!(applied[0].pos(), 3);
	}

	#[test]
	fn delete_overrun_clamps_count_not_dropped() {
		let mut buf = EditBuffer::from_content("abc");
		buf.append([delete(1, 999)]);
		let (version, applied) = buf.flush();
		assert_eq!(version, 1);
		assert_eq!(buf.content(), "a");
		assert_eq!(applied.len(), 1);
	}

	#[test]
	fn delete_starting_past_end_is_dropped_not_clamped() {
		let mut buf = EditBuffer::from_content("abc");
		buf.append([delete(10, 1), insert(0, "X")]);
		let (version, applied) = buf.flush();
		assert_eq!(version, 1);
		// the out-of-range delete is dropped; the valid insert still applies.
		assert_eq!(applied.len(), 1);
		assert_eq!(buf.content(), "Xabc");
	}

	#[test]
	fn pending_order_is_preserved_across_files() {
		let mut buf = EditBuffer::new();
		buf.append([insert(0, "1")]);
		buf.append([insert(1, "2")]);
		let (_, applied) = buf.flush();
		assert_eq!(applied.len(), 2);
		assert_eq!(buf.content(), "12");
	}
}
