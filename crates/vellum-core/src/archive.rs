//! ZIP archive creation over committed file content.
//!
//! Archives are built from each file's committed `content` (the result of its
//! last successful `flush()`), never from its pending queue — a pending edit
//! that has not yet been flushed must not appear in the archive, matching the
//! fidelity requirement in the testable-properties scenario for archives.

use std::io::Write;
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::ArchiveError;
use crate::file_registry::FileRegistry;
use crate::path::VPath;

/// Write every file under `prefix` into a ZIP archive at `out_path`.
///
/// Entry names are the file's path with the leading `/` stripped (ZIP entries
/// are conventionally relative).
pub fn create_zip_for_prefix(registry: &FileRegistry, prefix: &VPath, out_path: &Path) -> Result<(), ArchiveError> {
	let file = std::fs::File::create(out_path)?;
	let mut writer = ZipWriter::new(file);
	let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

	for (path, entry) in registry.iter() {
		if !path.starts_with(prefix) {
			continue;
		}
		let entry_name = path.as_str().trim_start_matches('/');
		if entry_name.is_empty() {
			continue;
		}
		writer.start_file(entry_name, options)?;
		writer.write_all(entry.buffer.content().as_bytes())?;
	}

	writer.finish()?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::change::{Change, PendingMod};

	#[test]
	fn archive_contains_committed_content_not_pending_edits() {
		let mut registry = FileRegistry::new();
		let path = VPath::parse("/a.txt").unwrap();
		registry.ensure(path.clone()).buffer = crate::edit_buffer::EditBuffer::from_content("hello");
		registry
			.get_mut(&path)
			.unwrap()
			.buffer
			.append([PendingMod::new(
				Change::Insert {
					pos: 5,
					text: "!".to_string(),
				},
				"u1",
			)]);

		let dir = tempfile::tempdir().unwrap();
		let out = dir.path().join("out.zip");
		let root = VPath::parse("/").unwrap();
		create_zip_for_prefix(&registry, &root, &out).unwrap();

		let zip_file = std::fs::File::open(&out).unwrap();
		let mut zip = zip::ZipArchive::new(zip_file).unwrap();
		let mut entry = zip.by_name("a.txt").unwrap();
		let mut content = String::new();
		std::io::Read::read_to_string(&mut entry, &mut content).unwrap();
		assert_eq!(content, "hello");
	}

	#[test]
	fn archive_only_includes_files_under_prefix() {
		let mut registry = FileRegistry::new();
		registry.ensure(VPath::parse("/a/x.txt").unwrap()).buffer =
			crate::edit_buffer::EditBuffer::from_content("in");
		registry.ensure(VPath::parse("/b/y.txt").unwrap()).buffer =
			crate::edit_buffer::EditBuffer::from_content("out");

		let dir = tempfile::tempdir().unwrap();
		let out = dir.path().join("out.zip");
		create_zip_for_prefix(&registry, &VPath::parse("/a").unwrap(), &out).unwrap();

		let zip_file = std::fs::File::open(&out).unwrap();
		let mut zip = zip::ZipArchive::new(zip_file).unwrap();
		assert_eq!(zip.len(), 1);
		assert!(zip.by_name("a/x.txt").is_ok());
	}
}
