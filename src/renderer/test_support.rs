//! Headless rig for GPU-backed pass tests.

use crate::error::HorizonError;
use crate::gpu::pipeline_helpers::linear_sampler;
use crate::gpu::readback::read_target;
use crate::gpu::screen_quad::ScreenQuad;
use crate::gpu::test_support::headless_device;
use crate::gpu::texture::{
    FallbackTextures, RenderTarget, TextureArena, TextureId, HDR_FORMAT,
};
use crate::renderer::pass::{
    execute_pass, Destination, PassContext, PassDescriptor, PassOutcome,
};
use crate::shader::program::{ProgramCache, ProgramId};
use crate::shader::{ids, BuiltinShaders, ShaderSource};
use crate::uniform::UniformBag;

/// Fills its viewport with `(rg, ba)`.
pub(crate) const FILL: &str = "test_fill.wgsl";

const FILL_SOURCE: &str = r"
struct Params {
    rg: vec2<f32>,
    ba: vec2<f32>,
}

@group(0) @binding(0) var<uniform> params: Params;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(params.rg, params.ba);
}
";

/// Built-in shaders plus [`FILL`].
pub(crate) struct TestShaders;

impl ShaderSource for TestShaders {
    fn read(&self, id: &str) -> Result<String, HorizonError> {
        if id == FILL {
            return Ok(FILL_SOURCE.to_owned());
        }
        BuiltinShaders.read(id)
    }
}

pub(crate) struct TestRig {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub programs: ProgramCache,
    pub arena: TextureArena,
    fallbacks: FallbackTextures,
    sampler: wgpu::Sampler,
    quad: ScreenQuad,
}

impl TestRig {
    /// `None` when the machine has no usable adapter.
    pub fn new() -> Option<Self> {
        let (device, queue) = headless_device()?;
        let programs =
            ProgramCache::new(Box::new(TestShaders), &[HDR_FORMAT]).unwrap();
        let fallbacks = FallbackTextures::new(&device, &queue).unwrap();
        let sampler = linear_sampler(&device, "Test Sampler");
        let quad = ScreenQuad::new(&device).unwrap();
        Some(Self {
            device,
            queue,
            programs,
            arena: TextureArena::new(),
            fallbacks,
            sampler,
            quad,
        })
    }

    pub fn program(&mut self, fragment: &str) -> ProgramId {
        self.programs
            .compile(&self.device, ids::FULLSCREEN_VERTEX, fragment)
            .unwrap()
    }

    pub fn fill_program(&mut self) -> ProgramId {
        self.program(FILL)
    }

    pub fn target(&mut self, width: u32, height: u32) -> TextureId {
        let target =
            RenderTarget::new(&self.device, "Test Target", width, height, HDR_FORMAT)
                .unwrap();
        self.arena.insert_target(target)
    }

    pub fn encoder(&self) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Test Encoder"),
            })
    }

    pub fn context(&self) -> PassContext<'_> {
        PassContext {
            device: &self.device,
            programs: &self.programs,
            arena: &self.arena,
            fallbacks: &self.fallbacks,
            sampler: &self.sampler,
            quad: &self.quad,
            strict_uniforms: true,
            surface: None,
        }
    }

    pub fn execute(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pass: &PassDescriptor,
    ) -> PassOutcome {
        execute_pass(&self.context(), encoder, pass)
    }

    pub fn read(&self, id: TextureId) -> Vec<[f32; 4]> {
        read_target(&self.device, &self.queue, self.arena.target(id).unwrap())
            .unwrap()
    }
}

/// A square [`FILL`] pass writing `color` into `target`.
pub(crate) fn fill_pass(
    program: ProgramId,
    target: TextureId,
    size: u32,
    color: [f32; 4],
) -> PassDescriptor {
    PassDescriptor {
        label: "Fill".into(),
        program: Some(program),
        uniforms: UniformBag::new()
            .with("rg", [color[0], color[1]])
            .with("ba", [color[2], color[3]]),
        destination: Destination::Target(target),
        width: size,
        height: size,
    }
}
