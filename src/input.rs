//! Key actions and pointer state.

use serde::{Deserialize, Serialize};

/// Actions that can be bound to keys.
///
/// Serde serializes as `snake_case` strings so TOML stays readable:
/// ```toml
/// [keybindings.bindings]
/// reload_shaders = "KeyR"
/// bloom_up = "BracketRight"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    /// Recompile every cached program from source.
    ReloadShaders,
    /// One more bloom level.
    BloomUp,
    /// One fewer bloom level.
    BloomDown,
    /// Raise the bloom strength.
    BloomStronger,
    /// Lower the bloom strength.
    BloomWeaker,
    /// Toggle tone mapping.
    ToggleToneMapping,
    /// Toggle the accretion disk.
    ToggleDisk,
    /// Toggle gravitational lensing.
    ToggleLensing,
    /// Toggle mouse-driven camera.
    ToggleMouseControl,
    /// Cycle orbit → front → top camera.
    CycleView,
    /// Restore every tunable default.
    ResetParams,
    /// Close the viewer.
    Quit,
}

/// Last known cursor position, in physical pixels from the top-left.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    /// Horizontal position.
    pub x: f32,
    /// Vertical position.
    pub y: f32,
}

impl PointerState {
    /// Record a cursor move, scaled from window to render resolution.
    pub fn moved(&mut self, x: f64, y: f64, scale: [f32; 2]) {
        self.x = x as f32 * scale[0];
        self.y = y as f32 * scale[1];
    }
}
