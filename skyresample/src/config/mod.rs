//! INI configuration.
//!
//! The configuration file lives at `~/.skyresample/config.ini` and holds the
//! reprojection settings, the two TAN grid definitions and logging options:
//!
//! ```ini
//! [reproject]
//! parallelism = auto
//! partition_axis = columns
//! footprint = true
//!
//! [input]
//! crpix1 = 50.5
//! crval1 = 83.63
//! cdelt1 = -0.002
//! ...
//!
//! [output]
//! naxis1 = 200
//! naxis2 = 200
//! frame = galactic
//! ...
//!
//! [logging]
//! level = info
//! ```
//!
//! Every value is parsed through [`ConfigKey::set`], so loading a file and
//! `config set` validate identically.

mod keys;

pub use keys::{ConfigKey, GridKey};

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use crate::logging::LoggingConfig;
use crate::partition::PartitionAxis;
use crate::pool::Parallelism;
use crate::reproject::ReprojectOptions;
use crate::sky::{CelestialFrame, TanProjection, DEFAULT_MIN_PIXEL_AREA};

/// Directory under the home directory holding the configuration.
pub const CONFIG_DIR_NAME: &str = ".skyresample";

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors from loading, saving or editing the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: ini::Error },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("Missing required setting {0}")]
    Missing(String),
}

/// Path of the configuration file.
///
/// Falls back to the current directory when no home directory is known.
pub fn config_file_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

/// `[reproject]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ReprojectSettings {
    pub parallelism: Parallelism,
    pub partition_axis: PartitionAxis,
    pub footprint: bool,
    /// Precision warning threshold in deg².
    pub min_pixel_area: f64,
}

impl Default for ReprojectSettings {
    fn default() -> Self {
        Self {
            parallelism: Parallelism::Auto,
            partition_axis: PartitionAxis::Columns,
            footprint: true,
            min_pixel_area: DEFAULT_MIN_PIXEL_AREA,
        }
    }
}

impl ReprojectSettings {
    /// Options for [`ExactReprojector`](crate::ExactReprojector).
    pub fn to_options(&self) -> ReprojectOptions {
        ReprojectOptions {
            parallelism: self.parallelism,
            partition_axis: self.partition_axis,
            want_footprint: self.footprint,
            min_pixel_area: self.min_pixel_area,
        }
    }
}

/// `[input]` / `[output]` section: a TAN grid in FITS terms.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    /// Number of columns.
    pub naxis1: Option<usize>,
    /// Number of rows.
    pub naxis2: Option<usize>,
    /// Reference pixel, 1-based.
    pub crpix1: f64,
    pub crpix2: f64,
    /// Reference sky position in degrees.
    pub crval1: f64,
    pub crval2: f64,
    /// Pixel scale in degrees.
    pub cdelt1: f64,
    pub cdelt2: f64,
    /// Rotation in degrees.
    pub crota2: f64,
    pub frame: CelestialFrame,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            naxis1: None,
            naxis2: None,
            crpix1: 1.0,
            crpix2: 1.0,
            crval1: 0.0,
            crval2: 0.0,
            cdelt1: -0.001,
            cdelt2: 0.001,
            crota2: 0.0,
            frame: CelestialFrame::Icrs,
        }
    }
}

impl GridSpec {
    /// Declared `(ny, nx)`, when both axes are set.
    pub fn shape(&self) -> Option<(usize, usize)> {
        Some((self.naxis2?, self.naxis1?))
    }

    /// Builds the projection. The declared shape is attached when known.
    pub fn projection(&self) -> TanProjection {
        let proj = TanProjection::new(
            (self.crpix1, self.crpix2),
            (self.crval1, self.crval2),
            (self.cdelt1, self.cdelt2),
        )
        .with_rotation(self.crota2)
        .with_frame(self.frame);

        match self.shape() {
            Some((ny, nx)) => proj.with_shape(ny, nx),
            None => proj,
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigFile {
    pub reproject: ReprojectSettings,
    pub input: GridSpec,
    pub output: GridSpec,
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// Loads the file at [`config_file_path`]. A missing file yields the
    /// defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Loads from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    /// Parses INI text.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(contents).map_err(|e| ConfigError::Read {
            path: PathBuf::from("<string>"),
            source: ini::Error::Parse(e),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|props| props.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Converts to INI, skipping unset optional values.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini
    }

    /// Saves to [`config_file_path`].
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Saves to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        self.to_ini().write_to_file(path).map_err(write_err)
    }

    /// Commented INI text with every setting at its current value.
    pub fn to_commented_string(&self) -> String {
        let mut out = String::from(
            "# skyresample configuration\n\
             #\n\
             # Grids are gnomonic (TAN) projections described with FITS keywords.\n\
             # crpix is 1-based, crval and cdelt are in degrees, frame is icrs or galactic.\n",
        );
        let mut section = "";
        for key in ConfigKey::all() {
            if key.section() != section {
                section = key.section();
                out.push('\n');
                out.push_str(&format!("[{}]\n", section));
            }
            let value = key.get(self);
            if value.is_empty() {
                out.push_str(&format!("# {} =\n", key.key_name()));
            } else {
                out.push_str(&format!("{} = {}\n", key.key_name(), value));
            }
        }
        out
    }
}
