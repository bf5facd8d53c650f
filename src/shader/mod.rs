//! Shader sources, program compilation and uniform reflection.
//!
//! Source text is supplied by a [`ShaderSource`] collaborator addressed by
//! file identity (`"bloom_upsample.wgsl"`). The [`program::ProgramCache`]
//! compiles and links pairs of sources into [`program::Program`]s and keeps
//! them for the life of the process.

use std::fmt;
use std::path::PathBuf;

use crate::error::HorizonError;

/// Program compilation, linking and caching.
pub mod program;
/// Uniform interface reflection from naga IR.
pub mod reflect;

/// Identities of the built-in shaders.
pub mod ids {
    /// Shared full-screen vertex stage used by every pass.
    pub const FULLSCREEN_VERTEX: &str = "fullscreen.wgsl";
    /// Ray-marched black hole and accretion disk.
    pub const BLACKHOLE_MAIN: &str = "blackhole_main.wgsl";
    /// Bright-pixel extraction feeding the bloom pyramid.
    pub const BLOOM_BRIGHTNESS: &str = "bloom_brightness_pass.wgsl";
    /// Bloom downsample filter.
    pub const BLOOM_DOWNSAMPLE: &str = "bloom_downsample.wgsl";
    /// Bloom two-input upsample filter.
    pub const BLOOM_UPSAMPLE: &str = "bloom_upsample.wgsl";
    /// Adds the bloom contribution to the scene.
    pub const BLOOM_COMPOSITE: &str = "bloom_composite.wgsl";
    /// HDR → display tone mapping.
    pub const TONEMAPPING: &str = "tonemapping.wgsl";
    /// Copies a texture to the presentation surface.
    pub const PASSTHROUGH: &str = "passthrough.wgsl";
}

/// A shader pipeline stage, used to tag compile diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Vertex stage.
    Vertex,
    /// Fragment stage.
    Fragment,
    /// A shared `#import` module.
    Module,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => write!(f, "vertex"),
            Self::Fragment => write!(f, "fragment"),
            Self::Module => write!(f, "module"),
        }
    }
}

/// Supplies shader source text by identity.
pub trait ShaderSource {
    /// Return the full WGSL text for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`HorizonError::ShaderRead`] when the source does not exist
    /// or cannot be read.
    fn read(&self, id: &str) -> Result<String, HorizonError>;
}

/// Shaders compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinShaders;

impl BuiltinShaders {
    /// Every identity this source can serve.
    pub const IDS: [&'static str; 8] = [
        ids::FULLSCREEN_VERTEX,
        ids::BLACKHOLE_MAIN,
        ids::BLOOM_BRIGHTNESS,
        ids::BLOOM_DOWNSAMPLE,
        ids::BLOOM_UPSAMPLE,
        ids::BLOOM_COMPOSITE,
        ids::TONEMAPPING,
        ids::PASSTHROUGH,
    ];

    fn lookup(id: &str) -> Option<&'static str> {
        let source = match id {
            ids::FULLSCREEN_VERTEX => {
                include_str!("../../assets/shaders/fullscreen.wgsl")
            }
            ids::BLACKHOLE_MAIN => {
                include_str!("../../assets/shaders/blackhole_main.wgsl")
            }
            ids::BLOOM_BRIGHTNESS => {
                include_str!("../../assets/shaders/bloom_brightness_pass.wgsl")
            }
            ids::BLOOM_DOWNSAMPLE => {
                include_str!("../../assets/shaders/bloom_downsample.wgsl")
            }
            ids::BLOOM_UPSAMPLE => {
                include_str!("../../assets/shaders/bloom_upsample.wgsl")
            }
            ids::BLOOM_COMPOSITE => {
                include_str!("../../assets/shaders/bloom_composite.wgsl")
            }
            ids::TONEMAPPING => {
                include_str!("../../assets/shaders/tonemapping.wgsl")
            }
            ids::PASSTHROUGH => {
                include_str!("../../assets/shaders/passthrough.wgsl")
            }
            _ => return None,
        };
        Some(source)
    }
}

impl ShaderSource for BuiltinShaders {
    fn read(&self, id: &str) -> Result<String, HorizonError> {
        Self::lookup(id)
            .map(str::to_owned)
            .ok_or_else(|| HorizonError::ShaderRead {
                id: id.to_owned(),
                reason: "no built-in shader with this name".into(),
            })
    }
}

/// Reads shaders from a directory on every call, falling back to the
/// built-in copy for files that are not present. Re-reading on each call is
/// what makes hot reload work.
#[derive(Debug, Clone)]
pub struct ShaderDirectory {
    root: PathBuf,
}

impl ShaderDirectory {
    /// Serve shaders from `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ShaderSource for ShaderDirectory {
    fn read(&self, id: &str) -> Result<String, HorizonError> {
        let path = self.root.join(id);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!(
                    "{} not found, using built-in '{id}'",
                    path.display()
                );
                BuiltinShaders.read(id)
            }
            Err(e) => Err(HorizonError::ShaderRead {
                id: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_serves_every_listed_id() {
        for id in BuiltinShaders::IDS {
            assert!(!BuiltinShaders.read(id).unwrap().is_empty(), "{id}");
        }
    }

    #[test]
    fn unknown_builtin_is_a_read_error() {
        let err = BuiltinShaders.read("nope.wgsl").unwrap_err();
        assert!(matches!(err, HorizonError::ShaderRead { .. }));
    }

    #[test]
    fn directory_prefers_files_and_falls_back_to_builtin() {
        let dir = std::env::temp_dir()
            .join(format!("horizon-shader-dir-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(ids::PASSTHROUGH), "// override").unwrap();

        let source = ShaderDirectory::new(&dir);
        assert_eq!(source.read(ids::PASSTHROUGH).unwrap(), "// override");
        assert_eq!(
            source.read(ids::TONEMAPPING).unwrap(),
            BuiltinShaders.read(ids::TONEMAPPING).unwrap()
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
