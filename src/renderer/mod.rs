//! Pass execution, the bloom pyramid and the per-frame pass chain.

pub mod bloom;
pub mod frame_graph;
pub mod pass;
pub mod resources;
#[cfg(test)]
pub(crate) mod test_support;
