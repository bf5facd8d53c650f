use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::assets::{AssetSource, FileAssets, ProceduralAssets};

/// Where static textures come from.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum AssetSourceKind {
    /// Generated color map and star field.
    #[default]
    Procedural,
    /// PNG/JPEG files under `root`.
    Files,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[schemars(title = "Assets", inline)]
#[serde(default)]
/// Static texture locations.
pub struct AssetOptions {
    /// Asset backend.
    #[schemars(title = "Source")]
    pub source: AssetSourceKind,
    /// Directory file paths are resolved against.
    #[schemars(skip)]
    pub root: PathBuf,
    /// Cubemap prefix: a directory holding `right.png` … `back.png`.
    #[schemars(skip)]
    pub galaxy: String,
    /// Accretion-disk color ramp.
    #[schemars(skip)]
    pub color_map: String,
}

impl Default for AssetOptions {
    fn default() -> Self {
        Self {
            source: AssetSourceKind::Procedural,
            root: PathBuf::from("assets"),
            galaxy: "skybox_nebula_dark".into(),
            color_map: "color_map.png".into(),
        }
    }
}

impl AssetOptions {
    /// The asset source these options select.
    #[must_use]
    pub fn source(&self) -> Box<dyn AssetSource> {
        match self.source {
            AssetSourceKind::Procedural => Box::new(ProceduralAssets::default()),
            AssetSourceKind::Files => Box::new(FileAssets::new(&self.root)),
        }
    }
}
