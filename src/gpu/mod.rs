//! GPU resource management utilities.
//!
//! Device and surface initialization, render targets and the texture
//! arena, the shared screen quad, pipeline boilerplate, read-back and
//! shader composition.

/// Validation scopes around fallible allocations.
pub(crate) mod error_scope;
/// Shared wgpu boilerplate for full-screen pipelines.
pub mod pipeline_helpers;
/// Copy render targets back to the CPU.
pub mod readback;
/// wgpu device, surface, and queue initialization.
pub mod render_context;
/// The shared full-screen vertex buffer.
pub mod screen_quad;
/// WGSL shader composition with `#import` support via naga-oil.
pub mod shader_composer;
/// Render targets, static textures and the handle arena.
pub mod texture;
#[cfg(test)]
pub(crate) mod test_support;
