//! [`FileRegistry`]: the path-keyed map of every file the core knows about.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use ignore::WalkBuilder;
use tracing::warn;
use vellum_proto::UserId;

use crate::edit_buffer::EditBuffer;
use crate::path::VPath;

/// One file's buffer and the set of users currently subscribed to its edits.
pub struct FileEntry {
	pub buffer: EditBuffer,
	pub subscribers: HashSet<UserId>,
}

impl FileEntry {
	fn empty() -> Self {
		Self {
			buffer: EditBuffer::new(),
			subscribers: HashSet::new(),
		}
	}

	fn with_content(content: &str) -> Self {
		Self {
			buffer: EditBuffer::from_content(content),
			subscribers: HashSet::new(),
		}
	}
}

/// Owns every [`FileEntry`] in the project, keyed by validated path.
///
/// `FileRegistry` is not internally synchronized: it is exclusively owned and
/// mutated by the scheduler's single worker thread.
pub struct FileRegistry {
	files: BTreeMap<VPath, FileEntry>,
	/// Directories discovered at boot, kept separately from files so `list_nodes`
	/// can report a directory even if it currently has no files known to the
	/// registry (e.g. all its files were removed).
	directories: HashSet<VPath>,
}

impl FileRegistry {
	pub fn new() -> Self {
		Self {
			files: BTreeMap::new(),
			directories: HashSet::new(),
		}
	}

	/// Walk `root` with gitignore-aware filtering, seeding one [`FileEntry`] per
	/// file found and recording every directory encountered. Non-UTF-8 file
	/// contents are skipped with a warning rather than failing the whole boot.
	pub fn boot_from_disk(root: &Path) -> std::io::Result<Self> {
		let mut registry = Self::new();
		let walker = WalkBuilder::new(root)
			.standard_filters(true)
			.follow_links(false)
			.build();

		for entry in walker {
			let entry = match entry {
				Ok(entry) => entry,
				Err(err) => {
					warn!(%err, "skipping unreadable directory entry during boot walk");
					continue;
				}
			};
			let Ok(relative) = entry.path().strip_prefix(root) else {
				continue;
			};
			if relative.as_os_str().is_empty() {
				continue;
			}
			let relative_str = relative.to_string_lossy();
			let Ok(vpath) = VPath::from_relative(&relative_str) else {
				warn!(path = %relative_str, "skipping path that fails validation during boot walk");
				continue;
			};

			let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
			if is_dir {
				registry.directories.insert(vpath);
				continue;
			}

			match std::fs::read_to_string(entry.path()) {
				Ok(content) => {
					registry.files.insert(vpath, FileEntry::with_content(&content));
				}
				Err(err) => {
					warn!(path = %relative_str, %err, "skipping unreadable or non-UTF-8 file during boot walk");
				}
			}
		}

		Ok(registry)
	}

	/// Return the entry for `path`, creating an empty one if absent.
	pub fn ensure(&mut self, path: VPath) -> &mut FileEntry {
		self.files.entry(path).or_insert_with(FileEntry::empty)
	}

	pub fn get(&self, path: &VPath) -> Option<&FileEntry> {
		self.files.get(path)
	}

	pub fn get_mut(&mut self, path: &VPath) -> Option<&mut FileEntry> {
		self.files.get_mut(path)
	}

	/// Iterate every known file, in path order.
	pub fn iter(&self) -> impl Iterator<Item = (&VPath, &FileEntry)> {
		self.files.iter()
	}

	pub fn iter_mut(&mut self) -> impl Iterator<Item = (&VPath, &mut FileEntry)> {
		self.files.iter_mut()
	}

	pub fn remove(&mut self, path: &VPath) {
		self.files.remove(path);
	}

	pub fn subscribe(&mut self, user: UserId, path: VPath) {
		self.ensure(path).subscribers.insert(user);
	}

	pub fn unsubscribe(&mut self, user: &UserId, path: &VPath) {
		if let Some(entry) = self.files.get_mut(path) {
			entry.subscribers.remove(user);
		}
	}

	/// Remove `user` from every file's subscriber set, wherever it appears.
	pub fn unsubscribe_all(&mut self, user: &UserId) {
		for entry in self.files.values_mut() {
			entry.subscribers.remove(user);
		}
	}

	/// Sorted union of every known directory and every known file path, each
	/// flagged as a directory or not.
	pub fn list_nodes(&self) -> Vec<(VPath, bool)> {
		let mut nodes: Vec<(VPath, bool)> = self
			.directories
			.iter()
			.cloned()
			.map(|p| (p, true))
			.chain(self.files.keys().cloned().map(|p| (p, false)))
			.collect();
		nodes.sort_by(|a, b| a.0.cmp(&b.0));
		nodes
	}
}

impl Default for FileRegistry {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn user(id: &str) -> UserId {
		UserId(id.to_string())
	}

	fn path(p: &str) -> VPath {
		VPath::parse(p).unwrap()
	}

	#[test]
	fn ensure_creates_and_reuses() {
		let mut reg = FileRegistry::new();
		reg.ensure(path("/a.txt")).subscribers.insert(user("u1"));
		assert!(reg.get(&path("/a.txt")).unwrap().subscribers.contains(&user("u1")));
	}

	#[test]
	fn subscribe_unsubscribe_round_trip() {
		let mut reg = FileRegistry::new();
		reg.subscribe(user("u1"), path("/a.txt"));
		assert!(reg.get(&path("/a.txt")).unwrap().subscribers.contains(&user("u1")));
		reg.unsubscribe(&user("u1"), &path("/a.txt"));
		assert!(!reg.get(&path("/a.txt")).unwrap().subscribers.contains(&user("u1")));
	}

	#[test]
	fn unsubscribe_all_is_isolated_to_the_named_user() {
		let mut reg = FileRegistry::new();
		reg.subscribe(user("a"), path("/x"));
		reg.subscribe(user("b"), path("/x"));
		reg.subscribe(user("a"), path("/y"));
		reg.unsubscribe_all(&user("a"));
		assert!(!reg.get(&path("/x")).unwrap().subscribers.contains(&user("a")));
		assert!(reg.get(&path("/x")).unwrap().subscribers.contains(&user("b")));
		assert!(!reg.get(&path("/y")).unwrap().subscribers.contains(&user("a")));
	}

	#[test]
	fn list_nodes_is_sorted() {
		let mut reg = FileRegistry::new();
		reg.ensure(path("/b.txt"));
		reg.ensure(path("/a.txt"));
		reg.directories.insert(path("/c"));
		let nodes = reg.list_nodes();
		let paths: Vec<&str> = nodes.iter().map(|(p, _)| p.as_str()).collect();
		let mut sorted = paths.clone();
		sorted.sort();
		assert_eq!(paths, sorted);
	}

	#[test]
	fn boot_from_disk_seeds_content_and_directories() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::create_dir(dir.path().join("sub")).unwrap();
		std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
		std::fs::write(dir.path().join("sub/b.txt"), "world").unwrap();

		let reg = FileRegistry::boot_from_disk(dir.path()).unwrap();
		assert_eq!(reg.get(&path("/a.txt")).unwrap().buffer.content(), "hello");
		assert_eq!(reg.get(&path("/sub/b.txt")).unwrap().buffer.content(), "world");
		let nodes = reg.list_nodes();
		assert!(nodes.iter().any(|(p, is_dir)| p.as_str() == "/sub" && *is_dir));
	}
}
