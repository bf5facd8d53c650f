//! Render targets, static textures, and the handle arena that owns them.
//!
//! Passes never hold `wgpu::Texture`s directly. They carry [`TextureId`]
//! handles resolved against a [`TextureArena`] at execution time, which keeps
//! pass descriptors cheap and lets a stale or zero handle disable a pass
//! instead of crashing it.

use wgpu::util::DeviceExt;

use crate::assets::{CubemapData, ImageData};
use crate::error::HorizonError;
use crate::gpu::error_scope::allocation_scope;

/// Color format of every off-screen render target.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Color format of decoded static images.
pub const STATIC_FORMAT: wgpu::TextureFormat =
    wgpu::TextureFormat::Rgba8UnormSrgb;

/// Dimensionality of a sampled texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// A single 2D image.
    D2,
    /// Six square faces sampled by direction.
    Cube,
}

impl TextureKind {
    /// The view dimension used in bind group layouts.
    #[must_use]
    pub fn view_dimension(self) -> wgpu::TextureViewDimension {
        match self {
            Self::D2 => wgpu::TextureViewDimension::D2,
            Self::Cube => wgpu::TextureViewDimension::Cube,
        }
    }
}

/// Handle to a texture stored in a [`TextureArena`].
///
/// [`TextureId::NONE`] is the zero handle; it never resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TextureId(u32);

impl TextureId {
    /// The zero handle.
    pub const NONE: Self = Self(0);

    /// Build a handle from its raw value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw handle value (0 for [`TextureId::NONE`]).
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether this is the zero handle.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// An off-screen color target: one owned texture plus the view passes render
/// into.
///
/// The texture is created with `RENDER_ATTACHMENT | TEXTURE_BINDING |
/// COPY_SRC` usage, so it can be written by one pass, sampled by later
/// passes, and read back. Its dimensions never change; a new resolution
/// needs a new target.
pub struct RenderTarget {
    /// The underlying GPU texture.
    pub texture: wgpu::Texture,
    /// A default full-texture view, used both as attachment and for sampling.
    pub view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl RenderTarget {
    /// Create a new render-target texture with the given dimensions and format.
    ///
    /// # Errors
    ///
    /// Returns [`HorizonError::ResourceAllocation`] for zero or oversized
    /// dimensions, or when the device rejects the allocation.
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Result<Self, HorizonError> {
        let max = device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(HorizonError::ResourceAllocation {
                resource: label.to_owned(),
                reason: format!(
                    "invalid render target size {width}x{height} (limit {max})"
                ),
            });
        }

        let texture = allocation_scope(device, label, || {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        })?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        log::debug!("created render target '{label}' {width}x{height}");
        Ok(Self {
            texture,
            view,
            width,
            height,
        })
    }

    /// Width in texels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in texels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Color format of the attachment.
    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }
}

/// A read-only texture uploaded once from decoded asset data.
pub struct StaticTexture {
    /// The underlying GPU texture.
    pub texture: wgpu::Texture,
    /// Sampling view (2D or cube).
    pub view: wgpu::TextureView,
    /// Dimensionality of the view.
    pub kind: TextureKind,
}

impl StaticTexture {
    /// Upload a decoded RGBA8 image as a 2D texture.
    ///
    /// # Errors
    ///
    /// Returns [`HorizonError::ResourceAllocation`] when the upload fails.
    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        image: &ImageData,
    ) -> Result<Self, HorizonError> {
        let texture = allocation_scope(device, label, || {
            device.create_texture_with_data(
                queue,
                &wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width: image.width,
                        height: image.height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: STATIC_FORMAT,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                &image.rgba,
            )
        })?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Self {
            texture,
            view,
            kind: TextureKind::D2,
        })
    }

    /// Upload six decoded faces as a cubemap.
    ///
    /// # Errors
    ///
    /// Returns [`HorizonError::ResourceAllocation`] when the upload fails.
    pub fn from_cubemap(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        cubemap: &CubemapData,
    ) -> Result<Self, HorizonError> {
        let data = cubemap.faces.concat();
        let texture = allocation_scope(device, label, || {
            device.create_texture_with_data(
                queue,
                &wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width: cubemap.size,
                        height: cubemap.size,
                        depth_or_array_layers: 6,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: STATIC_FORMAT,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                &data,
            )
        })?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        Ok(Self {
            texture,
            view,
            kind: TextureKind::Cube,
        })
    }
}

/// 1×1 transparent-black textures bound to declared samplers that a uniform
/// bag leaves unset.
pub struct FallbackTextures {
    d2: StaticTexture,
    cube: StaticTexture,
}

impl FallbackTextures {
    /// Create both fallbacks.
    ///
    /// # Errors
    ///
    /// Returns [`HorizonError::ResourceAllocation`] when the upload fails.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<Self, HorizonError> {
        let black = ImageData {
            width: 1,
            height: 1,
            rgba: vec![0; 4],
        };
        let cube = CubemapData {
            size: 1,
            faces: std::array::from_fn(|_| vec![0; 4]),
        };
        Ok(Self {
            d2: StaticTexture::from_image(
                device,
                queue,
                "Fallback 2D",
                &black,
            )?,
            cube: StaticTexture::from_cubemap(
                device,
                queue,
                "Fallback Cube",
                &cube,
            )?,
        })
    }

    /// The fallback view for a texture kind.
    #[must_use]
    pub fn view(&self, kind: TextureKind) -> &wgpu::TextureView {
        match kind {
            TextureKind::D2 => &self.d2.view,
            TextureKind::Cube => &self.cube.view,
        }
    }
}

enum Slot {
    Static(StaticTexture),
    Target(RenderTarget),
}

/// Owns every texture the pipeline samples or renders into, addressed by
/// [`TextureId`].
#[derive(Default)]
pub struct TextureArena {
    slots: Vec<Slot>,
}

impl TextureArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a static texture and return its handle.
    pub fn insert_static(&mut self, texture: StaticTexture) -> TextureId {
        self.push(Slot::Static(texture))
    }

    /// Store a render target and return the handle of its color texture.
    pub fn insert_target(&mut self, target: RenderTarget) -> TextureId {
        self.push(Slot::Target(target))
    }

    /// Swap the render target behind `id` for a freshly created one, keeping
    /// the handle. Returns `false` (dropping `target`) if `id` is not a
    /// render target.
    pub fn replace_target(&mut self, id: TextureId, target: RenderTarget) -> bool {
        if id.is_none() {
            return false;
        }
        match self.slots.get_mut(id.0 as usize - 1) {
            Some(slot @ Slot::Target(_)) => {
                *slot = Slot::Target(target);
                true
            }
            _ => false,
        }
    }

    fn push(&mut self, slot: Slot) -> TextureId {
        self.slots.push(slot);
        TextureId(self.slots.len() as u32)
    }

    fn slot(&self, id: TextureId) -> Option<&Slot> {
        if id.is_none() {
            return None;
        }
        self.slots.get(id.0 as usize - 1)
    }

    /// Sampling view and dimensionality for a handle.
    #[must_use]
    pub fn sampled(
        &self,
        id: TextureId,
    ) -> Option<(&wgpu::TextureView, TextureKind)> {
        match self.slot(id)? {
            Slot::Static(t) => Some((&t.view, t.kind)),
            Slot::Target(t) => Some((&t.view, TextureKind::D2)),
        }
    }

    /// The render target behind a handle, if it is one.
    #[must_use]
    pub fn target(&self, id: TextureId) -> Option<&RenderTarget> {
        match self.slot(id)? {
            Slot::Target(t) => Some(t),
            Slot::Static(_) => None,
        }
    }

    /// Number of stored textures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the arena holds no textures.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of stored render targets.
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Target(_)))
            .count()
    }
}
