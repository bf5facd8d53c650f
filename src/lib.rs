// -- Lint policy ---------------------------------------------------------
// Clippy groups mirror the [workspace.lints] table in Cargo.toml.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Cargo lints (warn, not deny since cargo lints can be noisy)
#![warn(clippy::cargo)]
// Unused / redundant code
#![warn(unused_results)]
#![warn(unused_qualifications)]
// Cast hygiene
#![warn(trivial_casts)]
#![warn(trivial_numeric_casts)]

//! Render-pass orchestration for a real-time black hole renderer, on wgpu.
//!
//! A ray-marched main pass writes an HDR image; a fixed chain of
//! full-screen passes extracts bright pixels, sweeps them through a bloom
//! pyramid, composites, tone maps and presents.
//!
//! # Key entry points
//!
//! - [`Engine`] - owns the GPU context and the pipeline, renders frames
//! - [`shader::program::ProgramCache`] - compiles and caches programs by
//!   source identity
//! - [`uniform::UniformBag`] and [`uniform::binder`] - declarative uniform
//!   binding with sequential texture units
//! - [`renderer::bloom::BloomPyramid`] - the down/up sweep
//! - [`renderer::frame_graph::FrameGraph`] - the per-frame pass chain
//! - [`Options`] - TOML configuration and the tunable registry
//!
//! # Architecture
//!
//! Every GPU object lives in [`renderer::resources::PipelineResources`],
//! built once at setup. Passes refer to programs and textures by handle; a
//! handle that no longer resolves disables its pass instead of failing the
//! frame. Setup failures (missing assets, compile or link errors, failed
//! allocations) are fatal and leave nothing half-built.

pub mod assets;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod input;
pub mod options;
pub mod renderer;
pub mod shader;
pub mod uniform;
pub mod util;
#[cfg(feature = "viewer")]
pub mod viewer;

pub use engine::Engine;
pub use error::HorizonError;
pub use options::Options;
#[cfg(feature = "viewer")]
pub use viewer::{Viewer, ViewerBuilder};
