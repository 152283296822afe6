//! Boot-time filesystem preparation: create the configured directories, clear
//! the temp directory, and populate the [`FileRegistry`] from the source tree.

use crate::config::Config;
use crate::error::CoreError;
use crate::file_registry::FileRegistry;

/// Prepare the on-disk layout and build the initial registry from `config`'s
/// source directory. Any failure here is fatal — the process must refuse to
/// start on a broken filesystem layout.
pub fn boot(config: &Config) -> Result<FileRegistry, CoreError> {
	config.prepare_filesystem()?;
	let registry = FileRegistry::boot_from_disk(&config.code_dir).map_err(|error| {
		CoreError::Config(crate::error::ConfigError::CreateDir {
			path: config.code_dir.clone(),
			error,
		})
	})?;
	Ok(registry)
}
