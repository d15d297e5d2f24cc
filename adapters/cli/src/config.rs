//! `highland.toml` settings. Every field has a default so the file is optional.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use highland_core::GroundType;
use highland_rendering::{RenderingError, TileGridPresentation};
use highland_world::WorldConfig;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    pub(crate) map: MapConfig,
    pub(crate) catalog: CatalogConfig,
    pub(crate) movement: MovementConfig,
    pub(crate) render: RenderConfig,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct MapConfig {
    pub(crate) columns: u32,
    pub(crate) rows: u32,
    pub(crate) default_ground: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            columns: 16,
            rows: 12,
            default_ground: "water".to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct CatalogConfig {
    pub(crate) path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("assets/ground.json"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct MovementConfig {
    pub(crate) transition_ms: u64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self { transition_ms: 250 }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RenderConfig {
    pub(crate) tile_length: f32,
    pub(crate) occupant_radius: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tile_length: 32.0,
            occupant_radius: 10.0,
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("could not read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Config {
    /// Reads the file at `path`, falling back to defaults when it does not exist.
    pub(crate) fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_owned(),
                    source,
                })
            }
        };
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Parameters for a fresh world of the configured size.
    pub(crate) fn world_config(&self) -> WorldConfig {
        WorldConfig {
            columns: self.map.columns,
            rows: self.map.rows,
            default_ground: GroundType::middle(self.map.default_ground.clone()),
            transition: Duration::from_millis(self.movement.transition_ms),
        }
    }

    /// Pixel geometry for a grid of the given size.
    pub(crate) fn grid(
        &self,
        columns: u32,
        rows: u32,
    ) -> Result<TileGridPresentation, RenderingError> {
        TileGridPresentation::new(
            columns,
            rows,
            self.render.tile_length,
            self.render.occupant_radius,
        )
    }
}
