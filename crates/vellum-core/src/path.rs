//! Project-path validation and the [`VPath`] key type.

use std::fmt;

/// A normalized, validated project path: the key type for every `FileEntry`.
///
/// Validation mirrors the original controller's `is_valid_path`: a path must begin
/// with `/`, must not end with `/`, and must not contain a `.` or `..` segment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VPath(String);

impl VPath {
	/// Validate and wrap `raw`. Returns the static reason for rejection on failure.
	pub fn parse(raw: &str) -> Result<Self, &'static str> {
		if !raw.starts_with('/') {
			return Err("path must start with '/'");
		}
		if raw.len() > 1 && raw.ends_with('/') {
			return Err("path must not end with '/'");
		}
		if raw.split('/').any(|seg| seg == "." || seg == "..") {
			return Err("path must not contain '.' or '..' segments");
		}
		Ok(Self(raw.to_string()))
	}

	/// Build a `VPath` from a root-relative filesystem path, e.g. from a directory
	/// walk rooted at the project's source directory. `relative` must not itself
	/// start with `/`.
	pub fn from_relative(relative: &str) -> Result<Self, &'static str> {
		let normalized = relative.replace(std::path::MAIN_SEPARATOR, "/");
		Self::parse(&format!("/{normalized}"))
	}

	/// True if `self` names the same path as, or a descendant of, `prefix`.
	///
	/// Used by archive creation to select the files under a requested subtree.
	pub fn starts_with(&self, prefix: &VPath) -> bool {
		if prefix.0 == "/" {
			return true;
		}
		self.0 == prefix.0 || self.0.starts_with(&format!("{}/", prefix.0))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for VPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl AsRef<str> for VPath {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_relative_paths() {
		assert!(VPath::parse("a/b").is_err());
	}

	#[test]
	fn rejects_trailing_slash() {
		assert!(VPath::parse("/a/b/").is_err());
	}

	#[test]
	fn rejects_dot_segments() {
		assert!(VPath::parse("/a/../b").is_err());
		assert!(VPath::parse("/a/./b").is_err());
	}

	#[test]
	fn accepts_root() {
		assert!(VPath::parse("/").is_ok());
	}

	#[test]
	fn starts_with_root_matches_everything() {
		let root = VPath::parse("/").unwrap();
		let file = VPath::parse("/a/b.txt").unwrap();
		assert!(file.starts_with(&root));
	}

	#[test]
	fn starts_with_is_segment_aware() {
		let prefix = VPath::parse("/a").unwrap();
		assert!(VPath::parse("/a/b.txt").unwrap().starts_with(&prefix));
		assert!(!VPath::parse("/ab.txt").unwrap().starts_with(&prefix));
	}
}
