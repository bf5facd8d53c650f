//! Every handle the frame graph needs, created once at setup.
//!
//! [`PipelineResources`] owns the program cache, the texture arena and the
//! per-frame targets. Setup either produces the whole aggregate or fails;
//! there is no partially initialized pipeline.

use crate::assets::{AssetSource, CubemapData, ImageData};
use crate::error::HorizonError;
use crate::gpu::pipeline_helpers::linear_sampler;
use crate::gpu::screen_quad::ScreenQuad;
use crate::gpu::texture::{
    FallbackTextures, RenderTarget, StaticTexture, TextureArena, TextureId,
    HDR_FORMAT,
};
use crate::options::AssetOptions;
use crate::renderer::bloom::BloomPyramid;
use crate::renderer::pass::{PassContext, SurfaceFrame};
use crate::shader::program::{ProgramCache, ProgramId};
use crate::shader::{ids, ShaderSource};

/// Decoded static textures, loaded before any GPU object exists.
#[derive(Debug, Clone)]
pub struct LoadedAssets {
    /// Background star field.
    pub galaxy: CubemapData,
    /// Accretion disk color ramp.
    pub color_map: ImageData,
}

impl LoadedAssets {
    /// Load the color map, then the galaxy cubemap.
    ///
    /// # Errors
    ///
    /// The first [`HorizonError::AssetLoad`]; later assets are not read.
    pub fn load(
        source: &dyn AssetSource,
        options: &AssetOptions,
    ) -> Result<Self, HorizonError> {
        let color_map = source
            .load_texture_2d(&options.color_map)
            .inspect_err(|e| log::error!("{e}"))?;
        let galaxy = source
            .load_cubemap(&options.galaxy)
            .inspect_err(|e| log::error!("{e}"))?;
        log::info!(
            "loaded assets: color map {}x{}, galaxy {}x{} per face",
            color_map.width,
            color_map.height,
            galaxy.size,
            galaxy.size
        );
        Ok(Self { galaxy, color_map })
    }
}

/// One program per stage of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassPrograms {
    /// Ray-marched scene.
    pub main: ProgramId,
    /// Bright-pixel extraction.
    pub brightness: ProgramId,
    /// Bloom downsample.
    pub downsample: ProgramId,
    /// Bloom upsample.
    pub upsample: ProgramId,
    /// Scene + bloom.
    pub composite: ProgramId,
    /// Tone mapping.
    pub tonemap: ProgramId,
    /// Copy to the surface.
    pub present: ProgramId,
}

impl PassPrograms {
    fn compile(
        programs: &mut ProgramCache,
        device: &wgpu::Device,
    ) -> Result<Self, HorizonError> {
        let mut fragment = |id: &str| {
            programs.compile(device, ids::FULLSCREEN_VERTEX, id)
        };
        Ok(Self {
            main: fragment(ids::BLACKHOLE_MAIN)?,
            brightness: fragment(ids::BLOOM_BRIGHTNESS)?,
            downsample: fragment(ids::BLOOM_DOWNSAMPLE)?,
            upsample: fragment(ids::BLOOM_UPSAMPLE)?,
            composite: fragment(ids::BLOOM_COMPOSITE)?,
            tonemap: fragment(ids::TONEMAPPING)?,
            present: fragment(ids::PASSTHROUGH)?,
        })
    }
}

/// Full-resolution intermediate images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTargets {
    /// Main pass output.
    pub scene: TextureId,
    /// Brightness pass output; the bloom source.
    pub brightness: TextureId,
    /// Scene with bloom added.
    pub composite: TextureId,
    /// Tone-mapped image handed to the present pass.
    pub tonemapped: TextureId,
}

impl FrameTargets {
    const LABELS: [&'static str; 4] =
        ["Scene Target", "Brightness Target", "Composite Target", "Tonemapped Target"];

    fn ids(&self) -> [TextureId; 4] {
        [self.scene, self.brightness, self.composite, self.tonemapped]
    }

    fn allocate(
        device: &wgpu::Device,
        arena: &mut TextureArena,
        width: u32,
        height: u32,
    ) -> Result<Self, HorizonError> {
        let mut next = |label: &str| {
            RenderTarget::new(device, label, width, height, HDR_FORMAT)
                .map(|target| arena.insert_target(target))
        };
        Ok(Self {
            scene: next(Self::LABELS[0])?,
            brightness: next(Self::LABELS[1])?,
            composite: next(Self::LABELS[2])?,
            tonemapped: next(Self::LABELS[3])?,
        })
    }
}

/// Static textures sampled by the main pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneTextures {
    /// Star-field cubemap.
    pub galaxy: TextureId,
    /// Disk color ramp.
    pub color_map: TextureId,
}

/// Sizes and formats to build the pipeline for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSetup {
    /// Render width.
    pub width: u32,
    /// Render height.
    pub height: u32,
    /// Allocated bloom depth.
    pub max_levels: usize,
    /// Report unmatched uniforms at warn level.
    pub strict_uniforms: bool,
    /// Format of the presentation surface, if there is one.
    pub surface_format: Option<wgpu::TextureFormat>,
}

/// The initialized pipeline.
pub struct PipelineResources {
    /// Compiled programs.
    pub programs: ProgramCache,
    /// Textures and render targets.
    pub arena: TextureArena,
    fallbacks: FallbackTextures,
    sampler: wgpu::Sampler,
    quad: ScreenQuad,
    /// Per-stage programs.
    pub passes: PassPrograms,
    /// Per-frame intermediates.
    pub targets: FrameTargets,
    /// Bloom levels.
    pub bloom: BloomPyramid,
    /// Static inputs.
    pub textures: SceneTextures,
    strict_uniforms: bool,
    size: (u32, u32),
}

impl PipelineResources {
    /// Compile every program, upload the static textures and allocate every
    /// target.
    ///
    /// # Errors
    ///
    /// Any read, compile, link or allocation failure. Nothing is returned
    /// on failure.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        assets: &LoadedAssets,
        shaders: Box<dyn ShaderSource>,
        setup: ResourceSetup,
    ) -> Result<Self, HorizonError> {
        let mut formats = vec![HDR_FORMAT];
        formats.extend(setup.surface_format);
        let mut programs = ProgramCache::new(shaders, &formats)?;
        let passes = PassPrograms::compile(&mut programs, device)?;

        let mut arena = TextureArena::new();
        let textures = SceneTextures {
            galaxy: arena.insert_static(StaticTexture::from_cubemap(
                device,
                queue,
                "Galaxy",
                &assets.galaxy,
            )?),
            color_map: arena.insert_static(StaticTexture::from_image(
                device,
                queue,
                "Color Map",
                &assets.color_map,
            )?),
        };
        let targets =
            FrameTargets::allocate(device, &mut arena, setup.width, setup.height)?;
        let bloom = BloomPyramid::new(
            device,
            &mut arena,
            setup.width,
            setup.height,
            setup.max_levels,
        )?;

        log::info!(
            "pipeline ready: {} programs, {} textures at {}x{}",
            programs.len(),
            arena.len(),
            setup.width,
            setup.height
        );
        Ok(Self {
            programs,
            arena,
            fallbacks: FallbackTextures::new(device, queue)?,
            sampler: linear_sampler(device, "Pass Sampler"),
            quad: ScreenQuad::new(device)?,
            passes,
            targets,
            bloom,
            textures,
            strict_uniforms: setup.strict_uniforms,
            size: (setup.width, setup.height),
        })
    }

    /// Render size.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Recreate every size-dependent target. Handles stay valid, so pass
    /// descriptors built afterwards need no other change. Zero sizes are
    /// ignored.
    ///
    /// # Errors
    ///
    /// [`HorizonError::ResourceAllocation`] when a target cannot be created.
    /// Every replacement is allocated before any is swapped in, so a failure
    /// leaves the previous targets and size in place.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> Result<(), HorizonError> {
        if width == 0 || height == 0 || (width, height) == self.size {
            return Ok(());
        }
        let frame = FrameTargets::LABELS
            .iter()
            .map(|label| RenderTarget::new(device, label, width, height, HDR_FORMAT))
            .collect::<Result<Vec<_>, _>>()?;
        let levels = self.bloom.allocate_resized(device, width, height)?;

        for (id, target) in self.targets.ids().into_iter().zip(frame) {
            let _ = self.arena.replace_target(id, target);
        }
        self.bloom.install(&mut self.arena, levels);
        self.size = (width, height);
        log::info!("render targets resized to {width}x{height}");
        Ok(())
    }

    /// Recompile every program from its current source. Returns the number
    /// of programs that failed and kept their previous version.
    pub fn reload_shaders(&mut self, device: &wgpu::Device) -> usize {
        self.programs.reload_all(device)
    }

    /// Execution context for this frame's passes.
    #[must_use]
    pub fn context<'a>(
        &'a self,
        device: &'a wgpu::Device,
        surface: Option<SurfaceFrame<'a>>,
    ) -> PassContext<'a> {
        PassContext {
            device,
            programs: &self.programs,
            arena: &self.arena,
            fallbacks: &self.fallbacks,
            sampler: &self.sampler,
            quad: &self.quad,
            strict_uniforms: self.strict_uniforms,
            surface,
        }
    }
}
