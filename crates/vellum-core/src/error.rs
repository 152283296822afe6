//! Error types for `vellum-core`.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the core's public API.
///
/// Per the error-handling design, most of these are logged-and-continue at the call
/// site that discovers them; this type exists for the minority of operations that
/// must report failure to their caller (config load, archive creation, path
/// validation).
#[derive(Debug, Error)]
pub enum CoreError {
	#[error("invalid path {0:?}: {1}")]
	InvalidPath(String, &'static str),

	#[error("no such file: {0:?}")]
	NotFound(String),

	#[error("config error: {0}")]
	Config(#[from] ConfigError),

	#[error("archive error: {0}")]
	Archive(#[from] ArchiveError),
}

/// Errors loading or validating [`crate::config::Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("I/O error reading {path}: {error}")]
	Io {
		path: PathBuf,
		#[source]
		error: std::io::Error,
	},

	#[error(
		"buffer percentages must sum to <= 100 (critical={critical}, secondary={secondary}, auxiliary={auxiliary}, sum={sum})"
	)]
	BudgetOverflow {
		critical: u8,
		secondary: u8,
		auxiliary: u8,
		sum: u16,
	},

	#[error("cycle_time must be nonzero")]
	ZeroCycleTime,

	#[error("could not create directory {path}: {error}")]
	CreateDir {
		path: PathBuf,
		#[source]
		error: std::io::Error,
	},
}

/// Errors creating a project archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("zip error: {0}")]
	Zip(#[from] zip::result::ZipError),
}
