//! Selection tuning options with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors that can occur when loading or saving a tileset configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file from disk.
    #[error("failed to read config: {0}")]
    ReadError(#[source] std::io::Error),

    /// Failed to write the config file to disk.
    #[error("failed to write config: {0}")]
    WriteError(#[source] std::io::Error),

    /// Failed to parse RON content.
    #[error("failed to parse config: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    /// Failed to serialize config to RON.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[source] ron::Error),
}

/// Tuning options for per-frame tile selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TilesetConfig {
    /// Refinement stop criterion: traversal keeps descending while a tile's
    /// screen-space error exceeds this budget.
    pub maximum_screen_space_error: f64,
    /// Error budget separating base-traversal tiles (coarse, always loaded
    /// in order) from skip-eligible tiles.
    pub base_screen_space_error: f64,
    /// Allow rendering a deeper loaded tile even when intermediate levels
    /// are not loaded.
    pub skip_level_of_detail: bool,
    /// Skip-only mode: load desired tiles directly, without the base
    /// traversal safety net. Only meaningful with `skip_level_of_detail`.
    pub immediately_load_desired_level_of_detail: bool,
    /// A tile must beat its loaded ancestor's error by this ratio before a
    /// level may be skipped.
    pub skip_screen_space_error_factor: f64,
    /// Minimum depth gap below the loaded ancestor before a level may be
    /// skipped.
    pub skip_levels: u16,
    /// Load invisible siblings regardless of refine mode.
    pub load_siblings: bool,
    /// Keep last frame's selection and skip traversal entirely.
    pub debug_freeze_frame: bool,
}

impl Default for TilesetConfig {
    fn default() -> Self {
        Self {
            maximum_screen_space_error: 16.0,
            base_screen_space_error: 1024.0,
            skip_level_of_detail: false,
            immediately_load_desired_level_of_detail: false,
            skip_screen_space_error_factor: 16.0,
            skip_levels: 1,
            load_siblings: false,
            debug_freeze_frame: false,
        }
    }
}

impl TilesetConfig {
    /// Load a configuration from a RON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        ron::from_str(&contents).map_err(ConfigError::ParseError)
    }

    /// Save the configuration to a RON file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let pretty = ron::ser::PrettyConfig::default();
        let contents =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;
        std::fs::write(path, contents).map_err(ConfigError::WriteError)
    }
}
