//! Bloom pyramid: a ladder of half-resolution targets swept down, then up.
//!
//! Given the brightness image `B` at `(W, H)` and an active depth `L`:
//!
//! - downsample, level `0..L`: `B` or `downsampled[level-1]` →
//!   `downsampled[level]` at `(W >> (level+1), H >> (level+1))`
//! - upsample, level `L-1..=0`: primary `downsampled[L-1]` (first step) or
//!   `upsampled[level+1]`, secondary `B` (last step) or
//!   `downsampled[level-1]` → `upsampled[level]` at `(W >> level, H >> level)`
//!
//! After the sweep `upsampled[0]` holds the full-resolution bloom.

use crate::error::HorizonError;
use crate::gpu::texture::{RenderTarget, TextureArena, TextureId, HDR_FORMAT};
use crate::renderer::pass::{Destination, PassDescriptor};
use crate::shader::program::ProgramId;
use crate::uniform::{UniformBag, UniformValue};

/// Compile-time ceiling on pyramid depth.
pub const MAX_LEVELS: usize = 8;

/// A pyramid image, named by its role in the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelInput {
    /// The brightness image feeding the pyramid.
    Source,
    /// `downsampled[i]`
    Downsampled(usize),
    /// `upsampled[i]`
    Upsampled(usize),
}

/// Sweep direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    /// High resolution → low.
    Down,
    /// Low resolution → high.
    Up,
}

/// One pass of the sweep, in terms of pyramid roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloomStep {
    /// Direction.
    pub sweep: Sweep,
    /// Pyramid level written.
    pub level: usize,
    /// Bound as `texture0`.
    pub primary: LevelInput,
    /// Bound as `texture1`; upsample steps only.
    pub secondary: Option<LevelInput>,
    /// Image written.
    pub output: LevelInput,
    /// Output size.
    pub size: (u32, u32),
}

/// Level sizes of a pyramid over a `(width, height)` source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyramidLayout {
    width: u32,
    height: u32,
    levels: usize,
}

impl PyramidLayout {
    /// Layout with `levels` clamped into `1..=MAX_LEVELS`.
    #[must_use]
    pub fn new(width: u32, height: u32, levels: usize) -> Self {
        Self {
            width,
            height,
            levels: levels.clamp(1, MAX_LEVELS),
        }
    }

    /// Number of allocated levels.
    #[must_use]
    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Source size.
    #[must_use]
    pub fn source_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Size of `downsampled[level]`, never below one texel per axis.
    #[must_use]
    pub fn downsampled_size(&self, level: usize) -> (u32, u32) {
        let shift = level as u32 + 1;
        ((self.width >> shift).max(1), (self.height >> shift).max(1))
    }

    /// Size of `upsampled[level]`, never below one texel per axis.
    #[must_use]
    pub fn upsampled_size(&self, level: usize) -> (u32, u32) {
        let shift = level as u32;
        ((self.width >> shift).max(1), (self.height >> shift).max(1))
    }

    /// Clamp a requested depth into what this layout can run.
    #[must_use]
    pub fn active_depth(&self, depth: usize) -> usize {
        depth.clamp(1, self.levels)
    }

    /// Full sweep for `depth` (clamped by [`active_depth`](Self::active_depth)).
    #[must_use]
    pub fn steps(&self, depth: usize) -> Vec<BloomStep> {
        let depth = self.active_depth(depth);
        let mut steps = Vec::with_capacity(depth * 2);

        for level in 0..depth {
            steps.push(BloomStep {
                sweep: Sweep::Down,
                level,
                primary: if level == 0 {
                    LevelInput::Source
                } else {
                    LevelInput::Downsampled(level - 1)
                },
                secondary: None,
                output: LevelInput::Downsampled(level),
                size: self.downsampled_size(level),
            });
        }

        for level in (0..depth).rev() {
            steps.push(BloomStep {
                sweep: Sweep::Up,
                level,
                primary: if level == depth - 1 {
                    LevelInput::Downsampled(level)
                } else {
                    LevelInput::Upsampled(level + 1)
                },
                secondary: Some(if level == 0 {
                    LevelInput::Source
                } else {
                    LevelInput::Downsampled(level - 1)
                }),
                output: LevelInput::Upsampled(level),
                size: self.upsampled_size(level),
            });
        }

        steps
    }
}

/// Targets for a resized pyramid, waiting to replace the current levels.
pub struct ResizedLevels {
    layout: PyramidLayout,
    targets: Vec<(RenderTarget, RenderTarget)>,
}

/// Pre-allocated pyramid targets indexed by level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomPyramid {
    layout: PyramidLayout,
    downsampled: Vec<TextureId>,
    upsampled: Vec<TextureId>,
}

impl BloomPyramid {
    /// Allocate every level of a `max_levels`-deep pyramid over a
    /// `(width, height)` source.
    ///
    /// # Errors
    ///
    /// Returns [`HorizonError::ResourceAllocation`] if any level fails.
    pub fn new(
        device: &wgpu::Device,
        arena: &mut TextureArena,
        width: u32,
        height: u32,
        max_levels: usize,
    ) -> Result<Self, HorizonError> {
        let layout = PyramidLayout::new(width, height, max_levels);
        let mut downsampled = Vec::with_capacity(layout.levels());
        let mut upsampled = Vec::with_capacity(layout.levels());
        for level in 0..layout.levels() {
            let (down, up) = Self::level_targets(device, &layout, level)?;
            downsampled.push(arena.insert_target(down));
            upsampled.push(arena.insert_target(up));
        }
        log::info!(
            "bloom pyramid: {} levels over {width}x{height}",
            layout.levels()
        );
        Ok(Self {
            layout,
            downsampled,
            upsampled,
        })
    }

    fn level_targets(
        device: &wgpu::Device,
        layout: &PyramidLayout,
        level: usize,
    ) -> Result<(RenderTarget, RenderTarget), HorizonError> {
        let (w, h) = layout.downsampled_size(level);
        let down = RenderTarget::new(
            device,
            &format!("Bloom Down {level}"),
            w,
            h,
            HDR_FORMAT,
        )?;
        let (w, h) = layout.upsampled_size(level);
        let up =
            RenderTarget::new(device, &format!("Bloom Up {level}"), w, h, HDR_FORMAT)?;
        Ok((down, up))
    }

    /// Allocate every level for a new source size without touching the
    /// current ones.
    ///
    /// # Errors
    ///
    /// Returns [`HorizonError::ResourceAllocation`] if any level fails.
    pub fn allocate_resized(
        &self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> Result<ResizedLevels, HorizonError> {
        let layout = PyramidLayout::new(width, height, self.layout.levels());
        let targets = (0..layout.levels())
            .map(|level| Self::level_targets(device, &layout, level))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ResizedLevels { layout, targets })
    }

    /// Swap levels from [`allocate_resized`](Self::allocate_resized) in
    /// under the existing handles.
    pub fn install(&mut self, arena: &mut TextureArena, resized: ResizedLevels) {
        let ResizedLevels { layout, targets } = resized;
        for (level, (down, up)) in targets.into_iter().enumerate() {
            let _ = arena.replace_target(self.downsampled[level], down);
            let _ = arena.replace_target(self.upsampled[level], up);
        }
        let (width, height) = layout.source_size();
        self.layout = layout;
        log::debug!("bloom pyramid resized to {width}x{height}");
    }

    /// Recreate every level for a new source size. Handles stay the same.
    ///
    /// # Errors
    ///
    /// Returns [`HorizonError::ResourceAllocation`] if any level fails; the
    /// pyramid is then left as it was.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        arena: &mut TextureArena,
        width: u32,
        height: u32,
    ) -> Result<(), HorizonError> {
        let resized = self.allocate_resized(device, width, height)?;
        self.install(arena, resized);
        Ok(())
    }

    /// Wrap already-allocated handles. Both vectors must hold one handle per
    /// layout level.
    #[must_use]
    pub fn from_parts(
        layout: PyramidLayout,
        downsampled: Vec<TextureId>,
        upsampled: Vec<TextureId>,
    ) -> Self {
        Self {
            layout,
            downsampled,
            upsampled,
        }
    }

    /// Level sizes.
    #[must_use]
    pub fn layout(&self) -> &PyramidLayout {
        &self.layout
    }

    /// `upsampled[0]`: the full-resolution result of a sweep.
    #[must_use]
    pub fn output(&self) -> TextureId {
        self.upsampled.first().copied().unwrap_or(TextureId::NONE)
    }

    /// Handle for a pyramid role. Out-of-range levels resolve to
    /// [`TextureId::NONE`], which disables the pass using them.
    #[must_use]
    pub fn resolve(&self, input: LevelInput, source: TextureId) -> TextureId {
        let found = match input {
            LevelInput::Source => Some(source),
            LevelInput::Downsampled(i) => self.downsampled.get(i).copied(),
            LevelInput::Upsampled(i) => self.upsampled.get(i).copied(),
        };
        found.unwrap_or(TextureId::NONE)
    }

    /// Pass descriptors for a full sweep over `source`.
    ///
    /// `base` is copied into every pass before the pyramid textures are
    /// added.
    #[must_use]
    pub fn passes(
        &self,
        source: TextureId,
        depth: usize,
        downsample: Option<ProgramId>,
        upsample: Option<ProgramId>,
        base: &UniformBag,
    ) -> Vec<PassDescriptor> {
        self.layout
            .steps(depth)
            .into_iter()
            .map(|step| {
                let mut uniforms = base.clone();
                let _ = uniforms.insert(
                    "texture0",
                    UniformValue::Texture2D(self.resolve(step.primary, source)),
                );
                if let Some(secondary) = step.secondary {
                    let _ = uniforms.insert(
                        "texture1",
                        UniformValue::Texture2D(self.resolve(secondary, source)),
                    );
                }
                let (label, program) = match step.sweep {
                    Sweep::Down => ("Bloom Downsample", downsample),
                    Sweep::Up => ("Bloom Upsample", upsample),
                };
                PassDescriptor {
                    label: format!("{label} {}", step.level),
                    program,
                    uniforms,
                    destination: Destination::Target(
                        self.resolve(step.output, source),
                    ),
                    width: step.size.0,
                    height: step.size.1,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::pass::PassOutcome;
    use crate::renderer::test_support::{fill_pass, TestRig};
    use crate::shader::ids;

    #[test]
    fn level_sizes_halve_for_every_depth() {
        let (w, h) = (1024, 768);
        for levels in 1..=MAX_LEVELS {
            let layout = PyramidLayout::new(w, h, levels);
            assert_eq!(layout.upsampled_size(0), (w, h));
            for i in 0..levels {
                assert_eq!(layout.downsampled_size(i), (w >> (i + 1), h >> (i + 1)));
                assert_eq!(layout.upsampled_size(i), (w >> i, h >> i));
            }
        }
    }

    #[test]
    fn tiny_sources_never_produce_empty_levels() {
        let layout = PyramidLayout::new(3, 1, MAX_LEVELS);
        for i in 0..layout.levels() {
            let (w, h) = layout.downsampled_size(i);
            assert!(w >= 1 && h >= 1);
        }
    }

    #[test]
    fn depth_is_clamped() {
        assert_eq!(PyramidLayout::new(64, 64, 0).levels(), 1);
        assert_eq!(PyramidLayout::new(64, 64, 99).levels(), MAX_LEVELS);
        let layout = PyramidLayout::new(64, 64, 4);
        assert_eq!(layout.active_depth(0), 1);
        assert_eq!(layout.active_depth(6), 4);
        assert_eq!(layout.steps(6).len(), 8);
    }

    #[test]
    fn sweep_order_and_inputs() {
        use LevelInput::{Downsampled, Source, Upsampled};

        let steps = PyramidLayout::new(256, 128, 8).steps(3);
        let summary: Vec<_> = steps
            .iter()
            .map(|s| (s.sweep, s.level, s.primary, s.secondary, s.output))
            .collect();
        assert_eq!(
            summary,
            [
                (Sweep::Down, 0, Source, None, Downsampled(0)),
                (Sweep::Down, 1, Downsampled(0), None, Downsampled(1)),
                (Sweep::Down, 2, Downsampled(1), None, Downsampled(2)),
                (Sweep::Up, 2, Downsampled(2), Some(Downsampled(1)), Upsampled(2)),
                (Sweep::Up, 1, Upsampled(2), Some(Downsampled(0)), Upsampled(1)),
                (Sweep::Up, 0, Upsampled(1), Some(Source), Upsampled(0)),
            ]
        );
        assert_eq!(steps[5].size, (256, 128));
    }

    #[test]
    fn single_level_uses_both_boundary_inputs() {
        let steps = PyramidLayout::new(64, 64, 1).steps(1);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].primary, LevelInput::Downsampled(0));
        assert_eq!(steps[1].secondary, Some(LevelInput::Source));
    }

    #[test]
    fn every_input_is_written_before_it_is_read() {
        for depth in 1..=MAX_LEVELS {
            let steps = PyramidLayout::new(512, 512, MAX_LEVELS).steps(depth);
            let mut written = vec![LevelInput::Source];
            for step in &steps {
                assert!(written.contains(&step.primary), "{step:?}");
                if let Some(secondary) = step.secondary {
                    assert!(written.contains(&secondary), "{step:?}");
                }
                written.push(step.output);
            }
            assert_eq!(written.last(), Some(&LevelInput::Upsampled(0)));
        }
    }

    #[test]
    fn passes_resolve_handles_and_copy_base_uniforms() {
        let id = TextureId::from_raw;
        let pyramid = BloomPyramid::from_parts(
            PyramidLayout::new(64, 32, 2),
            vec![id(10), id(11)],
            vec![id(20), id(21)],
        );
        let base = UniformBag::new().with("time", 1.0);
        let passes = pyramid.passes(id(1), 2, None, None, &base);
        assert_eq!(passes.len(), 4);

        let last = &passes[3];
        assert_eq!(last.destination, Destination::Target(id(20)));
        assert_eq!((last.width, last.height), (64, 32));
        assert_eq!(
            last.uniforms.get("texture0"),
            Some(UniformValue::Texture2D(id(21)))
        );
        assert_eq!(
            last.uniforms.get("texture1"),
            Some(UniformValue::Texture2D(id(1)))
        );
        assert_eq!(last.uniforms.get("time"), Some(UniformValue::Float(1.0)));
        assert_eq!(pyramid.output(), id(20));
        assert_eq!(pyramid.resolve(LevelInput::Downsampled(5), id(1)), TextureId::NONE);
    }

    #[test]
    fn constant_color_survives_one_level() {
        let Some(mut rig) = TestRig::new() else {
            return;
        };
        let fill = rig.fill_program();
        let down = rig.program(ids::BLOOM_DOWNSAMPLE);
        let up = rig.program(ids::BLOOM_UPSAMPLE);

        let source = rig.target(64, 64);
        let pyramid =
            BloomPyramid::new(&rig.device, &mut rig.arena, 64, 64, 1).unwrap();

        let color = [0.25, 0.5, 0.75, 1.0];
        let mut passes = vec![fill_pass(fill, source, 64, color)];
        passes.extend(pyramid.passes(
            source,
            1,
            Some(down),
            Some(up),
            &UniformBag::new(),
        ));

        let mut encoder = rig.encoder();
        for pass in &passes {
            assert_eq!(rig.execute(&mut encoder, pass), PassOutcome::Executed);
        }
        rig.queue.submit(Some(encoder.finish()));

        let half = rig.read(pyramid.resolve(LevelInput::Downsampled(0), source));
        assert_eq!(half.len(), 32 * 32);
        for p in half {
            for c in 0..4 {
                assert!((p[c] - color[c]).abs() < 1e-2, "{p:?}");
            }
        }

        let pixels = rig.read(pyramid.output());
        assert_eq!(pixels.len(), 64 * 64);
        for p in pixels {
            for c in 0..3 {
                assert!((p[c] - color[c]).abs() < 1e-2, "{p:?}");
            }
        }
    }

    #[test]
    fn resize_keeps_handles_and_halves_new_size() {
        let Some(mut rig) = TestRig::new() else {
            return;
        };
        let mut pyramid =
            BloomPyramid::new(&rig.device, &mut rig.arena, 64, 32, 3).unwrap();
        let before = pyramid.output();
        let count = rig.arena.len();

        pyramid.resize(&rig.device, &mut rig.arena, 128, 64).unwrap();
        assert_eq!(pyramid.output(), before);
        assert_eq!(rig.arena.len(), count);
        assert_eq!(rig.arena.target(before).unwrap().width(), 128);
        let deepest = pyramid.resolve(LevelInput::Downsampled(2), TextureId::NONE);
        assert_eq!(rig.arena.target(deepest).unwrap().height(), 8);
    }

    #[test]
    fn failed_resize_leaves_every_level_untouched() {
        let Some(mut rig) = TestRig::new() else {
            return;
        };
        let mut pyramid =
            BloomPyramid::new(&rig.device, &mut rig.arena, 64, 32, 3).unwrap();
        let layout = *pyramid.layout();

        // downsampled[0] fits, upsampled[0] is one texel over the limit.
        let too_wide = rig.device.limits().max_texture_dimension_2d + 1;
        assert!(pyramid
            .resize(&rig.device, &mut rig.arena, too_wide, 16)
            .is_err());

        assert_eq!(*pyramid.layout(), layout);
        for level in 0..3 {
            for input in [LevelInput::Downsampled(level), LevelInput::Upsampled(level)] {
                let id = pyramid.resolve(input, TextureId::NONE);
                let target = rig.arena.target(id).unwrap();
                let expected = match input {
                    LevelInput::Downsampled(l) => layout.downsampled_size(l),
                    _ => layout.upsampled_size(level),
                };
                assert_eq!((target.width(), target.height()), expected);
            }
        }
    }
}
