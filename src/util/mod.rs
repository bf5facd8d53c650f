//! Shared utilities.

/// Frame clock and frame cap.
pub mod frame_timing;
