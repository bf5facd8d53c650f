//! The per-frame pass chain:
//! main → brightness → bloom down/up sweep → composite → tonemap → present.
//!
//! [`FrameGraph::passes`] builds plain descriptors from handles and tunables
//! without touching the GPU. [`execute_frame`] records them in order into
//! one encoder.

use crate::gpu::texture::TextureId;
use crate::options::{ParamPass, ParamValues};
use crate::renderer::bloom::BloomPyramid;
use crate::renderer::pass::{
    execute_pass, Destination, PassContext, PassDescriptor, PassOutcome,
    SkipReason,
};
use crate::renderer::resources::{
    FrameTargets, PassPrograms, PipelineResources, SceneTextures,
};
use crate::shader::program::ProgramId;
use crate::uniform::{UniformBag, UniformValue};

/// Per-frame values that are not tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInput {
    /// Seconds since start.
    pub time: f32,
    /// Pointer position in render pixels.
    pub mouse: [f32; 2],
    /// Surface size, or `None` when rendering off-screen only.
    pub surface_size: Option<(u32, u32)>,
}

/// Borrowed handles a frame is built from.
#[derive(Debug, Clone, Copy)]
pub struct FrameGraph<'a> {
    /// Per-stage programs.
    pub programs: &'a PassPrograms,
    /// Intermediate images.
    pub targets: &'a FrameTargets,
    /// Static inputs.
    pub textures: &'a SceneTextures,
    /// Bloom levels.
    pub bloom: &'a BloomPyramid,
    /// Render size.
    pub size: (u32, u32),
}

impl<'a> FrameGraph<'a> {
    /// View the handles held by `resources`.
    #[must_use]
    pub fn of(resources: &'a PipelineResources) -> Self {
        Self {
            programs: &resources.passes,
            targets: &resources.targets,
            textures: &resources.textures,
            bloom: &resources.bloom,
            size: resources.size(),
        }
    }

    fn full_screen(
        &self,
        label: &str,
        program: ProgramId,
        uniforms: UniformBag,
        output: TextureId,
    ) -> PassDescriptor {
        PassDescriptor {
            label: label.to_owned(),
            program: Some(program),
            uniforms,
            destination: Destination::Target(output),
            width: self.size.0,
            height: self.size.1,
        }
    }

    /// Every pass of one frame, in execution order.
    #[must_use]
    pub fn passes(
        &self,
        params: &ParamValues,
        input: &FrameInput,
    ) -> Vec<PassDescriptor> {
        let targets = self.targets;
        let mut passes = Vec::new();

        let mut main = UniformBag::new()
            .with("resolution", [self.size.0 as f32, self.size.1 as f32])
            .with("time", input.time)
            .with("mouseX", input.mouse[0])
            .with("mouseY", input.mouse[1])
            .with("galaxy", UniformValue::Cubemap(self.textures.galaxy))
            .with("colorMap", UniformValue::Texture2D(self.textures.color_map));
        params.fill_bag(ParamPass::Main, &mut main);
        passes.push(self.full_screen(
            "Main",
            self.programs.main,
            main,
            targets.scene,
        ));

        passes.push(self.full_screen(
            "Bloom Brightness",
            self.programs.brightness,
            UniformBag::new()
                .with("texture0", UniformValue::Texture2D(targets.scene)),
            targets.brightness,
        ));

        passes.extend(self.bloom.passes(
            targets.brightness,
            params.bloom_iterations(),
            Some(self.programs.downsample),
            Some(self.programs.upsample),
            &UniformBag::new(),
        ));

        let mut composite = UniformBag::new()
            .with("texture0", UniformValue::Texture2D(targets.scene))
            .with("texture1", UniformValue::Texture2D(self.bloom.output()));
        params.fill_bag(ParamPass::Composite, &mut composite);
        passes.push(self.full_screen(
            "Bloom Composite",
            self.programs.composite,
            composite,
            targets.composite,
        ));

        let mut tonemap = UniformBag::new()
            .with("texture0", UniformValue::Texture2D(targets.composite));
        params.fill_bag(ParamPass::Tonemap, &mut tonemap);
        passes.push(self.full_screen(
            "Tone Mapping",
            self.programs.tonemap,
            tonemap,
            targets.tonemapped,
        ));

        if let Some((width, height)) = input.surface_size {
            passes.push(PassDescriptor {
                label: "Present".into(),
                program: Some(self.programs.present),
                uniforms: UniformBag::new()
                    .with("texture0", UniformValue::Texture2D(targets.tonemapped)),
                destination: Destination::Surface,
                width,
                height,
            });
        }
        passes
    }
}

/// What happened to one frame's passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Passes recorded.
    pub executed: usize,
    /// Passes skipped, by label.
    pub skipped: Vec<(String, SkipReason)>,
}

impl FrameReport {
    /// Whether every pass was recorded.
    #[must_use]
    pub fn complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Record `passes` in order into `encoder`. A skipped pass does not stop
/// later ones; they sample whatever their inputs last held.
pub fn execute_frame(
    context: &PassContext<'_>,
    encoder: &mut wgpu::CommandEncoder,
    passes: &[PassDescriptor],
) -> FrameReport {
    let mut report = FrameReport::default();
    for pass in passes {
        match execute_pass(context, encoder, pass) {
            PassOutcome::Executed => report.executed += 1,
            PassOutcome::Skipped(reason) => {
                report.skipped.push((pass.label.clone(), reason));
            }
        }
    }
    report
}
