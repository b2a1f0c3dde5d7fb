//! Init command - write a commented configuration file.

use std::path::Path;

use skyresample::config::{ConfigError, ConfigFile};

use crate::error::CliError;

/// Run the init command.
///
/// An existing file is only rewritten with `force`; its current values are
/// kept either way.
pub fn run(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        println!("Configuration file already exists: {}", path.display());
        println!("Use --force to rewrite it with comments.");
        return Ok(());
    }

    let config = ConfigFile::load_from(path)?;
    write_commented(&config, path)?;

    println!("Configuration file: {}", path.display());
    println!();
    println!("Set output.naxis1 and output.naxis2 before running 'skyresample reproject'.");
    println!("CLI arguments override config file values when specified.");
    Ok(())
}

fn write_commented(config: &ConfigFile, path: &Path) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, config.to_commented_string()).map_err(write_err)
}
