//! Static image and cubemap loading.
//!
//! Decoding sits behind [`AssetSource`] so the pipeline can be set up from
//! files, from generated data, or from a test double. Any failure is fatal
//! to setup.

use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::HorizonError;

/// Cubemap face file stems, in wgpu layer order (+X, -X, +Y, -Y, +Z, -Z).
pub const CUBE_FACES: [&str; 6] = ["right", "left", "top", "bottom", "front", "back"];

/// A decoded RGBA8 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major RGBA8 pixels.
    pub rgba: Vec<u8>,
}

/// Six decoded, square, equally-sized RGBA8 faces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubemapData {
    /// Edge length of every face.
    pub size: u32,
    /// Faces in [`CUBE_FACES`] order.
    pub faces: [Vec<u8>; 6],
}

/// Supplies decoded static textures.
pub trait AssetSource {
    /// Load one 2D image.
    ///
    /// # Errors
    ///
    /// [`HorizonError::AssetLoad`] when the image is missing or undecodable.
    fn load_texture_2d(&self, path: &str) -> Result<ImageData, HorizonError>;

    /// Load the six faces found under `prefix`.
    ///
    /// # Errors
    ///
    /// [`HorizonError::AssetLoad`] when a face is missing, undecodable, not
    /// square, or sized differently from the others.
    fn load_cubemap(&self, prefix: &str) -> Result<CubemapData, HorizonError>;
}

/// Decodes PNG/JPEG files under a root directory.
#[derive(Debug, Clone)]
pub struct FileAssets {
    root: PathBuf,
}

impl FileAssets {
    /// Resolve asset paths against `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn decode(&self, relative: PathBuf) -> Result<ImageData, HorizonError> {
        let path = self.root.join(relative);
        let image = image::open(&path).map_err(|e| HorizonError::AssetLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let rgba = image.to_rgba8();
        log::debug!(
            "decoded {} ({}x{})",
            path.display(),
            rgba.width(),
            rgba.height()
        );
        Ok(ImageData {
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        })
    }
}

impl AssetSource for FileAssets {
    fn load_texture_2d(&self, path: &str) -> Result<ImageData, HorizonError> {
        self.decode(PathBuf::from(path))
    }

    fn load_cubemap(&self, prefix: &str) -> Result<CubemapData, HorizonError> {
        let mut size = None;
        let mut faces: [Vec<u8>; 6] = Default::default();
        for (slot, face) in faces.iter_mut().zip(CUBE_FACES) {
            let image = self.decode(PathBuf::from(prefix).join(format!("{face}.png")))?;
            let fail = |reason: String| HorizonError::AssetLoad {
                path: format!("{prefix}/{face}.png"),
                reason,
            };
            if image.width != image.height {
                return Err(fail(format!(
                    "face is {}x{}, cubemap faces must be square",
                    image.width, image.height
                )));
            }
            match size {
                None => size = Some(image.width),
                Some(s) if s != image.width => {
                    return Err(fail(format!(
                        "face is {0}x{0}, previous faces are {s}x{s}",
                        image.width
                    )))
                }
                Some(_) => {}
            }
            *slot = image.rgba;
        }
        Ok(CubemapData {
            size: size.unwrap_or(0),
            faces,
        })
    }
}

/// Generated assets: a warm gradient color map and a seeded star field.
/// Needs no files, so the renderer runs out of the box.
#[derive(Debug, Clone, Copy)]
pub struct ProceduralAssets {
    /// Edge length of each star-field face.
    pub face_size: u32,
    /// Seed of the star field.
    pub seed: u64,
}

impl Default for ProceduralAssets {
    fn default() -> Self {
        Self {
            face_size: 512,
            seed: 0x5eed,
        }
    }
}

const COLOR_MAP_WIDTH: u32 = 256;

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

impl AssetSource for ProceduralAssets {
    fn load_texture_2d(&self, _path: &str) -> Result<ImageData, HorizonError> {
        // Deep red → orange → pale yellow, indexed by disk radius.
        let stops = [[0.45, 0.05, 0.0], [1.0, 0.45, 0.1], [1.0, 0.95, 0.8]];
        let mut rgba = Vec::with_capacity(COLOR_MAP_WIDTH as usize * 4);
        for x in 0..COLOR_MAP_WIDTH {
            let t = x as f32 / (COLOR_MAP_WIDTH - 1) as f32 * 2.0;
            let (from, to, f) = if t < 1.0 {
                (stops[0], stops[1], t)
            } else {
                (stops[1], stops[2], t - 1.0)
            };
            for c in 0..3 {
                rgba.push((lerp(from[c], to[c], f) * 255.0).round() as u8);
            }
            rgba.push(255);
        }
        Ok(ImageData {
            width: COLOR_MAP_WIDTH,
            height: 1,
            rgba,
        })
    }

    fn load_cubemap(&self, prefix: &str) -> Result<CubemapData, HorizonError> {
        if self.face_size == 0 {
            return Err(HorizonError::AssetLoad {
                path: prefix.to_owned(),
                reason: "face size must be positive".into(),
            });
        }
        let texels = (self.face_size * self.face_size) as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let faces = std::array::from_fn(|_| {
            let mut face = Vec::with_capacity(texels * 4);
            for _ in 0..texels {
                let star = rng.random::<f32>() < 0.002;
                if star {
                    let v = rng.random_range(140..=255u8);
                    face.extend_from_slice(&[v, v, v.saturating_add(10), 255]);
                } else {
                    face.extend_from_slice(&[2, 3, 8, 255]);
                }
            }
            face
        });
        Ok(CubemapData {
            size: self.face_size,
            faces,
        })
    }
}
