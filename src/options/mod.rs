//! Centralized configuration with TOML file support.
//!
//! Display size, asset and shader locations, bloom allocation, tunable
//! overrides and keybindings are consolidated here. Every section uses
//! `#[serde(default)]`, so a file that only sets `[bloom]` works.

mod assets;
mod bloom;
mod display;
mod keybindings;
/// Runtime tunable registry.
pub mod params;
mod shaders;

use std::collections::BTreeMap;
use std::path::Path;

pub use assets::{AssetOptions, AssetSourceKind};
pub use bloom::BloomOptions;
pub use display::DisplayOptions;
pub use keybindings::KeybindingOptions;
pub use params::{ParamDescriptor, ParamPass, ParamValues, PARAMS};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
pub use shaders::ShaderOptions;

use crate::error::HorizonError;
use crate::renderer::bloom::MAX_LEVELS;

/// Top-level options container.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema,
)]
#[serde(default)]
pub struct Options {
    /// Window and render resolution.
    pub display: DisplayOptions,
    /// Static texture locations.
    pub assets: AssetOptions,
    /// Shader sources and binding diagnostics.
    pub shaders: ShaderOptions,
    /// Bloom pyramid allocation.
    pub bloom: BloomOptions,
    /// Initial values for tunables, by uniform name.
    pub params: BTreeMap<String, f32>,
    /// Keyboard binding options.
    #[schemars(skip)]
    pub keybindings: KeybindingOptions,
}

impl Options {
    /// Generate JSON Schema describing the UI-exposed options.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Options)
    }

    /// Parse and validate TOML text. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// [`HorizonError::OptionsParse`] for malformed TOML or invalid values.
    pub fn from_toml_str(content: &str) -> Result<Self, HorizonError> {
        let mut options: Self = toml::from_str(content)
            .map_err(|e| HorizonError::OptionsParse(e.to_string()))?;
        options.keybindings.rebuild_reverse_map();
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file.
    ///
    /// # Errors
    ///
    /// [`HorizonError::Io`] if the file cannot be read, otherwise as
    /// [`Options::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, HorizonError> {
        let content = std::fs::read_to_string(path).map_err(HorizonError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Save options to a TOML file (pretty-printed).
    ///
    /// # Errors
    ///
    /// [`HorizonError::OptionsParse`] if serialization fails,
    /// [`HorizonError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), HorizonError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| HorizonError::OptionsParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(HorizonError::Io)?;
        }
        std::fs::write(path, content).map_err(HorizonError::Io)
    }

    /// Reject values the pipeline cannot be built with.
    ///
    /// # Errors
    ///
    /// [`HorizonError::OptionsParse`] naming the first bad value.
    pub fn validate(&self) -> Result<(), HorizonError> {
        if self.display.width == 0 || self.display.height == 0 {
            return Err(HorizonError::OptionsParse(format!(
                "display size {}x{} must be positive",
                self.display.width, self.display.height
            )));
        }
        if !(1..=MAX_LEVELS).contains(&self.bloom.max_levels) {
            return Err(HorizonError::OptionsParse(format!(
                "bloom.max_levels = {} is outside 1..={MAX_LEVELS}",
                self.bloom.max_levels
            )));
        }
        let _ = ParamValues::with_overrides(&self.params)?;
        Ok(())
    }

    /// Tunables with the configured overrides applied.
    ///
    /// # Errors
    ///
    /// [`HorizonError::OptionsParse`] for unknown parameter names.
    pub fn param_values(&self) -> Result<ParamValues, HorizonError> {
        ParamValues::with_overrides(&self.params)
    }
}
