//! [`Config`]: boot-time TOML configuration for a project.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Raw, as-parsed configuration. Field names match the enumerated configuration
/// options exactly.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub name: String,
	pub base_dir: PathBuf,
	pub code_dir: PathBuf,
	pub backup_dir: PathBuf,
	pub exec_dir: PathBuf,
	pub tmp_dir: PathBuf,
	/// Scheduler cycle period, in microseconds.
	pub cycle_time: u64,
	pub buffer_critical: u8,
	pub buffer_secondary: u8,
	pub buffer_auxiliary: u8,
}

impl Config {
	/// Read `path` and parse it as TOML, wrapping I/O and parse failures in a
	/// typed [`ConfigError`].
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let raw = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::parse(&raw)
	}

	/// Parse and validate a TOML document.
	pub fn parse(input: &str) -> Result<Self, ConfigError> {
		let config: Config = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.cycle_time == 0 {
			return Err(ConfigError::ZeroCycleTime);
		}
		let sum = self.buffer_critical as u16 + self.buffer_secondary as u16 + self.buffer_auxiliary as u16;
		if sum > 100 {
			return Err(ConfigError::BudgetOverflow {
				critical: self.buffer_critical,
				secondary: self.buffer_secondary,
				auxiliary: self.buffer_auxiliary,
				sum,
			});
		}
		Ok(())
	}

	pub fn cycle_time(&self) -> Duration {
		Duration::from_micros(self.cycle_time)
	}

	/// Create every configured directory if absent, and clear the temp directory.
	/// Called once at boot; failures here are fatal (the process must refuse to
	/// start on a broken filesystem layout).
	pub fn prepare_filesystem(&self) -> Result<(), ConfigError> {
		for dir in [
			&self.base_dir,
			&self.code_dir,
			&self.backup_dir,
			&self.exec_dir,
			&self.tmp_dir,
		] {
			std::fs::create_dir_all(dir).map_err(|error| ConfigError::CreateDir {
				path: dir.clone(),
				error,
			})?;
		}

		if self.tmp_dir.exists() {
			for entry in std::fs::read_dir(&self.tmp_dir).map_err(|error| ConfigError::CreateDir {
				path: self.tmp_dir.clone(),
				error,
			})? {
				let entry = entry.map_err(|error| ConfigError::CreateDir {
					path: self.tmp_dir.clone(),
					error,
				})?;
				let path = entry.path();
				let remove_result = if path.is_dir() {
					std::fs::remove_dir_all(&path)
				} else {
					std::fs::remove_file(&path)
				};
				remove_result.map_err(|error| ConfigError::CreateDir {
					path: path.clone(),
					error,
				})?;
			}
		}

		Ok(())
	}
}
