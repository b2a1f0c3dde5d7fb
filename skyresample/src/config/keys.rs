//! Configuration keys in `section.key` form.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::{ConfigError, ConfigFile, GridSpec};
use crate::harmonize::GridRole;
use crate::logging::parse_level;
use crate::partition::PartitionAxis;
use crate::pool::Parallelism;
use crate::sky::CelestialFrame;

/// Keys of a grid section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridKey {
    Naxis1,
    Naxis2,
    Crpix1,
    Crpix2,
    Crval1,
    Crval2,
    Cdelt1,
    Cdelt2,
    Crota2,
    Frame,
}

impl GridKey {
    const ALL: [GridKey; 10] = [
        GridKey::Naxis1,
        GridKey::Naxis2,
        GridKey::Crpix1,
        GridKey::Crpix2,
        GridKey::Crval1,
        GridKey::Crval2,
        GridKey::Cdelt1,
        GridKey::Cdelt2,
        GridKey::Crota2,
        GridKey::Frame,
    ];

    fn key_name(&self) -> &'static str {
        match self {
            GridKey::Naxis1 => "naxis1",
            GridKey::Naxis2 => "naxis2",
            GridKey::Crpix1 => "crpix1",
            GridKey::Crpix2 => "crpix2",
            GridKey::Crval1 => "crval1",
            GridKey::Crval2 => "crval2",
            GridKey::Cdelt1 => "cdelt1",
            GridKey::Cdelt2 => "cdelt2",
            GridKey::Crota2 => "crota2",
            GridKey::Frame => "frame",
        }
    }

    fn get(&self, grid: &GridSpec) -> String {
        match self {
            GridKey::Naxis1 => grid.naxis1.map(|n| n.to_string()).unwrap_or_default(),
            GridKey::Naxis2 => grid.naxis2.map(|n| n.to_string()).unwrap_or_default(),
            GridKey::Crpix1 => grid.crpix1.to_string(),
            GridKey::Crpix2 => grid.crpix2.to_string(),
            GridKey::Crval1 => grid.crval1.to_string(),
            GridKey::Crval2 => grid.crval2.to_string(),
            GridKey::Cdelt1 => grid.cdelt1.to_string(),
            GridKey::Cdelt2 => grid.cdelt2.to_string(),
            GridKey::Crota2 => grid.crota2.to_string(),
            GridKey::Frame => grid.frame.to_string(),
        }
    }

    fn set(&self, grid: &mut GridSpec, value: &str) -> Result<(), String> {
        match self {
            GridKey::Naxis1 => grid.naxis1 = parse_axis(value)?,
            GridKey::Naxis2 => grid.naxis2 = parse_axis(value)?,
            GridKey::Crpix1 => grid.crpix1 = parse_finite(value)?,
            GridKey::Crpix2 => grid.crpix2 = parse_finite(value)?,
            GridKey::Crval1 => grid.crval1 = parse_finite(value)?,
            GridKey::Crval2 => {
                let lat = parse_finite(value)?;
                if !(-90.0..=90.0).contains(&lat) {
                    return Err("latitude must be within [-90, 90]".to_string());
                }
                grid.crval2 = lat;
            }
            GridKey::Cdelt1 => grid.cdelt1 = parse_scale(value)?,
            GridKey::Cdelt2 => grid.cdelt2 = parse_scale(value)?,
            GridKey::Crota2 => grid.crota2 = parse_finite(value)?,
            GridKey::Frame => grid.frame = value.parse::<CelestialFrame>()?,
        }
        Ok(())
    }
}

/// A configuration setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    Parallelism,
    PartitionAxis,
    Footprint,
    MinPixelArea,
    Grid(GridRole, GridKey),
    LogLevel,
    LogDirectory,
}

impl ConfigKey {
    /// Every key, grouped by section in file order.
    pub fn all() -> Vec<ConfigKey> {
        let mut keys = vec![
            ConfigKey::Parallelism,
            ConfigKey::PartitionAxis,
            ConfigKey::Footprint,
            ConfigKey::MinPixelArea,
        ];
        for role in [GridRole::Input, GridRole::Output] {
            keys.extend(GridKey::ALL.iter().map(|k| ConfigKey::Grid(role, *k)));
        }
        keys.push(ConfigKey::LogLevel);
        keys.push(ConfigKey::LogDirectory);
        keys
    }

    /// INI section name.
    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::Parallelism
            | ConfigKey::PartitionAxis
            | ConfigKey::Footprint
            | ConfigKey::MinPixelArea => "reproject",
            ConfigKey::Grid(GridRole::Input, _) => "input",
            ConfigKey::Grid(GridRole::Output, _) => "output",
            ConfigKey::LogLevel | ConfigKey::LogDirectory => "logging",
        }
    }

    /// Key name within the section.
    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::Parallelism => "parallelism",
            ConfigKey::PartitionAxis => "partition_axis",
            ConfigKey::Footprint => "footprint",
            ConfigKey::MinPixelArea => "min_pixel_area",
            ConfigKey::Grid(_, key) => key.key_name(),
            ConfigKey::LogLevel => "level",
            ConfigKey::LogDirectory => "directory",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as a string; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::Parallelism => config.reproject.parallelism.to_string(),
            ConfigKey::PartitionAxis => config.reproject.partition_axis.to_string(),
            ConfigKey::Footprint => config.reproject.footprint.to_string(),
            ConfigKey::MinPixelArea => config.reproject.min_pixel_area.to_string(),
            ConfigKey::Grid(GridRole::Input, key) => key.get(&config.input),
            ConfigKey::Grid(GridRole::Output, key) => key.get(&config.output),
            ConfigKey::LogLevel => config.logging.level.clone(),
            ConfigKey::LogDirectory => config
                .logging
                .directory
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Parses and stores `value`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the key when the value
    /// does not parse.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let result = match self {
            ConfigKey::Parallelism => value
                .parse::<Parallelism>()
                .map(|p| config.reproject.parallelism = p)
                .map_err(|e| e.to_string()),
            ConfigKey::PartitionAxis => value
                .parse::<PartitionAxis>()
                .map(|a| config.reproject.partition_axis = a),
            ConfigKey::Footprint => parse_bool(value).map(|b| config.reproject.footprint = b),
            ConfigKey::MinPixelArea => parse_finite(value).and_then(|area| {
                if area < 0.0 {
                    Err("must not be negative".to_string())
                } else {
                    config.reproject.min_pixel_area = area;
                    Ok(())
                }
            }),
            ConfigKey::Grid(GridRole::Input, key) => key.set(&mut config.input, value),
            ConfigKey::Grid(GridRole::Output, key) => key.set(&mut config.output, value),
            ConfigKey::LogLevel => parse_level(value)
                .map(|_| config.logging.level = value.to_ascii_lowercase())
                .map_err(|e| e.to_string()),
            ConfigKey::LogDirectory => {
                config.logging.directory = (!value.is_empty()).then(|| PathBuf::from(value));
                Ok(())
            }
        };

        result.map_err(|reason| ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason,
        })
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ConfigKey::all()
            .into_iter()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

fn parse_finite(value: &str) -> Result<f64, String> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Err("must be a finite number".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_scale(value: &str) -> Result<f64, String> {
    let v = parse_finite(value)?;
    if v == 0.0 {
        return Err("pixel scale must be non-zero".to_string());
    }
    Ok(v)
}

fn parse_axis(value: &str) -> Result<Option<usize>, String> {
    if value.is_empty() {
        return Ok(None);
    }
    match value.parse::<usize>() {
        Ok(0) => Err("axis length must be positive".to_string()),
        Ok(n) => Ok(Some(n)),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err("expected true or false".to_string()),
    }
}
