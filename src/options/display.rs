use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[schemars(title = "Display", inline)]
#[serde(default)]
/// Window and render-resolution settings.
pub struct DisplayOptions {
    /// Render width in pixels. Every full-resolution target uses it.
    #[schemars(title = "Width", range(min = 1))]
    pub width: u32,
    /// Render height in pixels.
    #[schemars(title = "Height", range(min = 1))]
    pub height: u32,
    /// Window title.
    #[schemars(title = "Title")]
    pub title: String,
    /// Frame cap (0 = unlimited).
    #[schemars(title = "Target FPS")]
    pub target_fps: u32,
    /// Present with vsync.
    #[schemars(title = "VSync")]
    pub vsync: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            title: "Black Hole".into(),
            target_fps: 0,
            vsync: true,
        }
    }
}
