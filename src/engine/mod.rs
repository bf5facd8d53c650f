//! The frame driver.

mod input;

use crate::assets::AssetSource;
use crate::error::HorizonError;
use crate::gpu::readback::read_target;
use crate::gpu::render_context::RenderContext;
use crate::input::PointerState;
use crate::options::{Options, ParamValues};
use crate::renderer::frame_graph::{
    execute_frame, FrameGraph, FrameInput, FrameReport,
};
use crate::renderer::pass::SurfaceFrame;
use crate::renderer::resources::{LoadedAssets, PipelineResources, ResourceSetup};
use crate::shader::ShaderSource;
use crate::util::frame_timing::FrameTiming;

/// Format a headless context reports; no surface pass is ever built for it.
const HEADLESS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Owns the GPU context and the initialized pipeline, and renders frames.
///
/// # Construction
///
/// [`Engine::new`] for a window surface, [`Engine::headless`] for off-screen
/// rendering. Assets are loaded before the GPU is touched, so a missing
/// asset fails construction without creating any GPU object.
///
/// # Frame loop
///
/// Call [`render`](Self::render) each frame and [`resize`](Self::resize)
/// when the window changes. Forward cursor moves to
/// [`handle_cursor`](Self::handle_cursor) and key codes to
/// [`handle_key`](Self::handle_key).
pub struct Engine {
    /// Core wgpu device, queue, and surface.
    pub context: RenderContext,
    resources: PipelineResources,
    params: ParamValues,
    options: Options,
    pointer: PointerState,
    frame_timing: FrameTiming,
}

impl Engine {
    /// Engine rendering into a window surface.
    ///
    /// # Errors
    ///
    /// Returns [`HorizonError`] if asset loading, GPU initialization or
    /// pipeline setup fails.
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        size: (u32, u32),
        options: Options,
    ) -> Result<Self, HorizonError> {
        let assets = LoadedAssets::load(options.assets.source().as_ref(), &options.assets)?;
        let context =
            RenderContext::new(window, size, options.display.vsync).await?;
        let shaders = options.shaders.source();
        Self::from_context(context, &assets, shaders, options)
    }

    /// Engine with no surface, sized from `options.display`.
    ///
    /// # Errors
    ///
    /// As [`Engine::new`].
    pub fn headless(options: Options) -> Result<Self, HorizonError> {
        let assets = options.assets.source();
        let shaders = options.shaders.source();
        Self::headless_with(options, assets.as_ref(), shaders)
    }

    /// Headless engine with explicit collaborators.
    ///
    /// # Errors
    ///
    /// As [`Engine::new`].
    pub fn headless_with(
        options: Options,
        assets: &dyn AssetSource,
        shaders: Box<dyn ShaderSource>,
    ) -> Result<Self, HorizonError> {
        let loaded = LoadedAssets::load(assets, &options.assets)?;
        let context = pollster::block_on(RenderContext::headless(
            HEADLESS_FORMAT,
            options.display.width,
            options.display.height,
        ))?;
        Self::from_context(context, &loaded, shaders, options)
    }

    /// Engine from a pre-built [`RenderContext`].
    ///
    /// # Errors
    ///
    /// Returns [`HorizonError`] if the options are invalid or pipeline setup
    /// fails.
    pub fn from_context(
        context: RenderContext,
        assets: &LoadedAssets,
        shaders: Box<dyn ShaderSource>,
        options: Options,
    ) -> Result<Self, HorizonError> {
        options.validate()?;
        let params = options.param_values()?;
        let (width, height) = if context.has_surface() {
            (context.width(), context.height())
        } else {
            (options.display.width, options.display.height)
        };
        let resources = PipelineResources::new(
            &context.device,
            &context.queue,
            assets,
            shaders,
            ResourceSetup {
                width,
                height,
                max_levels: options.bloom.max_levels,
                strict_uniforms: options.shaders.strict_uniforms,
                surface_format: context.has_surface().then(|| context.format()),
            },
        )
        .inspect_err(|e| log::error!("pipeline setup failed: {e}"))?;

        Ok(Self {
            context,
            resources,
            params,
            pointer: PointerState::default(),
            frame_timing: FrameTiming::new(options.display.target_fps),
            options,
        })
    }

    fn frame_input(&self, surface_size: Option<(u32, u32)>) -> FrameInput {
        FrameInput {
            time: self.frame_timing.seconds(),
            mouse: [self.pointer.x, self.pointer.y],
            surface_size,
        }
    }

    fn encode_frame(
        &self,
        surface: Option<SurfaceFrame<'_>>,
    ) -> (wgpu::CommandEncoder, FrameReport) {
        let input = self.frame_input(surface.map(|s| (s.width, s.height)));
        let passes = FrameGraph::of(&self.resources).passes(&self.params, &input);
        let mut encoder = self.context.create_encoder();
        let report = execute_frame(
            &self.resources.context(&self.context.device, surface),
            &mut encoder,
            &passes,
        );
        (encoder, report)
    }

    /// Render one frame and present it.
    ///
    /// # Errors
    ///
    /// Returns [`wgpu::SurfaceError`] if the swapchain frame cannot be
    /// acquired.
    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        if !self.frame_timing.should_render() {
            return Ok(());
        }

        let frame = self.context.get_next_frame()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let (encoder, _report) = self.encode_frame(Some(SurfaceFrame {
            view: &view,
            format: self.context.format(),
            width: self.context.width(),
            height: self.context.height(),
        }));
        self.context.submit(encoder);
        frame.present();

        self.frame_timing.end_frame();
        Ok(())
    }

    /// Render one frame into the off-screen targets only. The tone-mapped
    /// image can then be read with [`read_output`](Self::read_output).
    pub fn render_offscreen(&mut self) -> FrameReport {
        let (encoder, report) = self.encode_frame(None);
        self.context.submit(encoder);
        self.frame_timing.end_frame();
        report
    }

    /// Copy the last tone-mapped image back to the CPU.
    ///
    /// # Errors
    ///
    /// [`HorizonError::ResourceAllocation`] if the read-back fails.
    pub fn read_output(&self) -> Result<Vec<[f32; 4]>, HorizonError> {
        let id = self.resources.targets.tonemapped;
        let target = self.resources.arena.target(id).ok_or_else(|| {
            HorizonError::ResourceAllocation {
                resource: "tone-mapped target".into(),
                reason: format!("handle {} is not a render target", id.raw()),
            }
        })?;
        read_target(&self.context.device, &self.context.queue, target)
    }

    /// Resize the surface and every render target. Zero sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.context.resize(width, height);
        if let Err(e) = self.resources.resize(&self.context.device, width, height) {
            log::error!("resize to {width}x{height} failed: {e}");
        }
    }

    /// Recompile every program. Returns the number that failed and kept
    /// their previous version.
    pub fn reload_shaders(&mut self) -> usize {
        self.resources.reload_shaders(&self.context.device)
    }

    /// Current tunables.
    pub fn params(&self) -> &ParamValues {
        &self.params
    }

    /// Mutable tunables, read by the next frame.
    pub fn params_mut(&mut self) -> &mut ParamValues {
        &mut self.params
    }

    /// The options the engine was built with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The initialized pipeline.
    pub fn resources(&self) -> &PipelineResources {
        &self.resources
    }

    /// Smoothed frame rate.
    pub fn fps(&self) -> f32 {
        self.frame_timing.fps()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::assets::{CubemapData, ImageData, ProceduralAssets};
    use crate::shader::BuiltinShaders;

    struct MissingColorMap;

    impl AssetSource for MissingColorMap {
        fn load_texture_2d(&self, path: &str) -> Result<ImageData, HorizonError> {
            Err(HorizonError::AssetLoad {
                path: path.to_owned(),
                reason: "no such file".into(),
            })
        }

        fn load_cubemap(&self, prefix: &str) -> Result<CubemapData, HorizonError> {
            ProceduralAssets::default().load_cubemap(prefix)
        }
    }

    /// Counts reads, shared with the test after being boxed.
    struct CountingShaders(Rc<Cell<usize>>);

    impl ShaderSource for CountingShaders {
        fn read(&self, id: &str) -> Result<String, HorizonError> {
            self.0.set(self.0.get() + 1);
            BuiltinShaders.read(id)
        }
    }

    fn small_options() -> Options {
        let mut options = Options::default();
        options.display.width = 64;
        options.display.height = 32;
        options.bloom.max_levels = 3;
        options
    }

    #[test]
    fn missing_asset_prevents_initialization() {
        let reads = Rc::new(Cell::new(0));
        let result = Engine::headless_with(
            small_options(),
            &MissingColorMap,
            Box::new(CountingShaders(Rc::clone(&reads))),
        );
        assert!(matches!(result, Err(HorizonError::AssetLoad { .. })));
        assert_eq!(reads.get(), 0);
    }

    fn engine() -> Option<Engine> {
        let assets = ProceduralAssets {
            face_size: 8,
            seed: 3,
        };
        match Engine::headless_with(small_options(), &assets, Box::new(BuiltinShaders))
        {
            Ok(engine) => Some(engine),
            Err(HorizonError::Gpu(_)) => None,
            Err(e) => panic!("{e}"),
        }
    }

    #[test]
    fn offscreen_frame_runs_every_pass() {
        let Some(mut engine) = engine() else {
            return;
        };
        let report = engine.render_offscreen();
        assert!(report.complete(), "{:?}", report.skipped);
        // main, brightness, 2 x 3 bloom levels, composite, tonemap
        assert_eq!(report.executed, 4 + 2 * 3);

        let pixels = engine.read_output().unwrap();
        assert_eq!(pixels.len(), 64 * 32);
        assert!(pixels.iter().all(|p| p.iter().all(|c| c.is_finite())));
    }

    #[test]
    fn tunable_depth_changes_pass_count() {
        let Some(mut engine) = engine() else {
            return;
        };
        let _ = engine.params_mut().set("bloomIterations", 1.0);
        assert_eq!(engine.render_offscreen().executed, 4 + 2);
    }

    #[test]
    fn resize_is_picked_up_by_the_next_frame() {
        let Some(mut engine) = engine() else {
            return;
        };
        engine.resize(32, 16);
        assert!(engine.render_offscreen().complete());
        assert_eq!(engine.read_output().unwrap().len(), 32 * 16);
    }
}
