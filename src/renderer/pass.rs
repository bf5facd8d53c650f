//! Single full-screen pass execution.

use std::fmt;

use crate::gpu::screen_quad::ScreenQuad;
use crate::gpu::texture::{FallbackTextures, TextureArena, TextureId};
use crate::shader::program::{ProgramCache, ProgramId};
use crate::uniform::binder::{self, BindContext, UniformError};
use crate::uniform::UniformBag;

/// Where a pass writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// An off-screen render target in the arena.
    Target(TextureId),
    /// The presentation surface of the current frame.
    Surface,
}

/// Everything one pass needs: program, inputs, destination and viewport.
///
/// Descriptors carry handles only and are rebuilt every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PassDescriptor {
    /// Debug label, also used for the wgpu render pass.
    pub label: String,
    /// Program to draw with. `None` disables the pass.
    pub program: Option<ProgramId>,
    /// Named uniform values.
    pub uniforms: UniformBag,
    /// Output.
    pub destination: Destination,
    /// Viewport width in pixels.
    pub width: u32,
    /// Viewport height in pixels.
    pub height: u32,
}

/// The swapchain view a [`Destination::Surface`] pass renders into.
#[derive(Clone, Copy)]
pub struct SurfaceFrame<'a> {
    /// Current frame's view.
    pub view: &'a wgpu::TextureView,
    /// Surface color format.
    pub format: wgpu::TextureFormat,
    /// Surface width.
    pub width: u32,
    /// Surface height.
    pub height: u32,
}

/// Why a pass did no GPU work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No program, or the program was invalidated.
    NoProgram,
    /// The destination handle is not a render target.
    InvalidDestination(TextureId),
    /// A surface pass ran without a surface frame.
    NoSurface,
    /// The viewport is empty or larger than the destination.
    Viewport {
        /// Requested viewport.
        requested: (u32, u32),
        /// Destination size.
        available: (u32, u32),
    },
    /// A uniform samples the texture the pass writes.
    ReadsDestination(TextureId),
    /// The program has no pipeline for the destination format.
    NoPipeline(wgpu::TextureFormat),
    /// The uniform bag could not be bound.
    Uniform(UniformError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoProgram => write!(f, "no program"),
            Self::InvalidDestination(id) => {
                write!(f, "texture {} is not a render target", id.raw())
            }
            Self::NoSurface => write!(f, "no surface frame"),
            Self::Viewport {
                requested,
                available,
            } => write!(
                f,
                "viewport {}x{} does not fit destination {}x{}",
                requested.0, requested.1, available.0, available.1
            ),
            Self::ReadsDestination(id) => {
                write!(f, "samples its own destination texture {}", id.raw())
            }
            Self::NoPipeline(format) => {
                write!(f, "no pipeline for format {format:?}")
            }
            Self::Uniform(e) => write!(f, "{e}"),
        }
    }
}

/// Result of [`execute_pass`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The draw was recorded.
    Executed,
    /// Nothing was recorded.
    Skipped(SkipReason),
}

impl PassOutcome {
    /// Whether the draw was recorded.
    #[must_use]
    pub fn executed(&self) -> bool {
        matches!(self, Self::Executed)
    }
}

/// Shared state every pass in a frame executes against.
pub struct PassContext<'a> {
    /// Device used for per-pass uniform buffers and bind groups.
    pub device: &'a wgpu::Device,
    /// Compiled programs.
    pub programs: &'a ProgramCache,
    /// Textures and render targets.
    pub arena: &'a TextureArena,
    /// Fallbacks for declared but unset textures.
    pub fallbacks: &'a FallbackTextures,
    /// Sampler bound to every sampler slot.
    pub sampler: &'a wgpu::Sampler,
    /// Shared vertex buffer.
    pub quad: &'a ScreenQuad,
    /// Report unmatched uniforms at warn level.
    pub strict_uniforms: bool,
    /// Swapchain view for surface passes, if this frame has one.
    pub surface: Option<SurfaceFrame<'a>>,
}

struct ResolvedDestination<'a> {
    view: &'a wgpu::TextureView,
    format: wgpu::TextureFormat,
    size: (u32, u32),
}

fn resolve_destination<'a>(
    context: &PassContext<'a>,
    destination: Destination,
) -> Result<ResolvedDestination<'a>, SkipReason> {
    match destination {
        Destination::Target(id) => {
            let target = context
                .arena
                .target(id)
                .ok_or(SkipReason::InvalidDestination(id))?;
            Ok(ResolvedDestination {
                view: &target.view,
                format: target.format(),
                size: (target.width(), target.height()),
            })
        }
        Destination::Surface => {
            let frame = context.surface.ok_or(SkipReason::NoSurface)?;
            Ok(ResolvedDestination {
                view: frame.view,
                format: frame.format,
                size: (frame.width, frame.height),
            })
        }
    }
}

/// Record one pass into `encoder`.
///
/// Binds the destination, clears it to transparent black, sets the
/// viewport, binds the program and the uniform bag, and draws the shared
/// quad. Any unresolved handle skips the pass without recording anything.
pub fn execute_pass(
    context: &PassContext<'_>,
    encoder: &mut wgpu::CommandEncoder,
    pass: &PassDescriptor,
) -> PassOutcome {
    match record(context, encoder, pass) {
        Ok(()) => PassOutcome::Executed,
        Err(reason) => {
            if reason == SkipReason::NoProgram {
                log::debug!("pass '{}' skipped: {reason}", pass.label);
            } else {
                log::warn!("pass '{}' skipped: {reason}", pass.label);
            }
            PassOutcome::Skipped(reason)
        }
    }
}

fn record(
    context: &PassContext<'_>,
    encoder: &mut wgpu::CommandEncoder,
    pass: &PassDescriptor,
) -> Result<(), SkipReason> {
    let program = pass
        .program
        .and_then(|id| context.programs.get(id))
        .ok_or(SkipReason::NoProgram)?;
    let destination = resolve_destination(context, pass.destination)?;

    let (max_w, max_h) = destination.size;
    if pass.width == 0 || pass.height == 0 || pass.width > max_w || pass.height > max_h
    {
        return Err(SkipReason::Viewport {
            requested: (pass.width, pass.height),
            available: destination.size,
        });
    }
    if let Destination::Target(id) = pass.destination {
        if pass.uniforms.textures().any(|t| t == id) {
            return Err(SkipReason::ReadsDestination(id));
        }
    }

    let pipeline = program
        .pipeline(destination.format)
        .ok_or(SkipReason::NoPipeline(destination.format))?;
    let plan = binder::plan(
        program.interface(),
        &pass.uniforms,
        context.strict_uniforms,
    )
    .map_err(SkipReason::Uniform)?;
    let bind_group = binder::apply(
        context.device,
        program,
        &plan,
        &BindContext {
            arena: context.arena,
            fallbacks: context.fallbacks,
            sampler: context.sampler,
        },
    )
    .map_err(SkipReason::Uniform)?;

    let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(&pass.label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: destination.view,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    render_pass.set_viewport(
        0.0,
        0.0,
        pass.width as f32,
        pass.height as f32,
        0.0,
        1.0,
    );
    render_pass.set_pipeline(pipeline);
    render_pass.set_bind_group(0, &bind_group, &[]);
    context.quad.draw(&mut render_pass);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::readback::read_target;
    use crate::gpu::texture::{RenderTarget, HDR_FORMAT};
    use crate::renderer::test_support::{fill_pass, TestRig};

    #[test]
    fn pass_touches_only_its_own_target() {
        let Some(mut rig) = TestRig::new() else {
            return;
        };
        let fill = rig.fill_program();
        let a = rig.target(64, 64);
        let b = rig.target(64, 64);

        let mut encoder = rig.encoder();
        let outcomes = [
            rig.execute(&mut encoder, &fill_pass(fill, b, 64, [0.0, 0.0, 1.0, 1.0])),
            rig.execute(&mut encoder, &fill_pass(fill, a, 64, [1.0, 0.5, 0.25, 1.0])),
        ];
        rig.queue.submit(Some(encoder.finish()));
        assert!(outcomes.iter().all(PassOutcome::executed));

        let a_pixels = rig.read(a);
        let b_pixels = rig.read(b);
        assert_eq!(a_pixels.len(), 64 * 64);
        assert!(a_pixels.iter().all(|p| *p == [1.0, 0.5, 0.25, 1.0]));
        assert!(b_pixels.iter().all(|p| *p == [0.0, 0.0, 1.0, 1.0]));
    }

    #[test]
    fn unresolved_handles_skip_without_gpu_work() {
        let Some(mut rig) = TestRig::new() else {
            return;
        };
        let fill = rig.fill_program();
        let a = rig.target(16, 16);

        let mut encoder = rig.encoder();
        let no_program = PassDescriptor {
            program: None,
            ..fill_pass(fill, a, 16, [1.0; 4])
        };
        assert_eq!(
            rig.execute(&mut encoder, &no_program),
            PassOutcome::Skipped(SkipReason::NoProgram)
        );

        let bad_target = TextureId::from_raw(999);
        assert_eq!(
            rig.execute(&mut encoder, &fill_pass(fill, bad_target, 16, [1.0; 4])),
            PassOutcome::Skipped(SkipReason::InvalidDestination(bad_target))
        );

        let too_big = fill_pass(fill, a, 32, [1.0; 4]);
        assert!(matches!(
            rig.execute(&mut encoder, &too_big),
            PassOutcome::Skipped(SkipReason::Viewport { .. })
        ));

        let mut feedback = fill_pass(fill, a, 16, [1.0; 4]);
        let _ = feedback
            .uniforms
            .insert("texture0", crate::uniform::UniformValue::Texture2D(a));
        assert_eq!(
            rig.execute(&mut encoder, &feedback),
            PassOutcome::Skipped(SkipReason::ReadsDestination(a))
        );

        let surface = PassDescriptor {
            destination: Destination::Surface,
            ..fill_pass(fill, a, 16, [1.0; 4])
        };
        assert_eq!(
            rig.execute(&mut encoder, &surface),
            PassOutcome::Skipped(SkipReason::NoSurface)
        );
        rig.queue.submit(Some(encoder.finish()));

        // Nothing ran, so the target still holds its cleared contents.
        assert!(rig.read(a).iter().all(|p| *p == [0.0; 4]));
    }

    #[test]
    fn readback_rejects_non_hdr_targets() {
        let Some(rig) = TestRig::new() else {
            return;
        };
        let target = RenderTarget::new(
            &rig.device,
            "Srgb",
            4,
            4,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        )
        .unwrap();
        assert!(read_target(&rig.device, &rig.queue, &target).is_err());
        assert_eq!(
            RenderTarget::new(&rig.device, "Hdr", 4, 4, HDR_FORMAT)
                .unwrap()
                .format(),
            HDR_FORMAT
        );
    }
}
