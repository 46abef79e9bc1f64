mod ort;

pub use self::ort::OrtEngine;

use opencv::core::Mat;

use crate::types::PoseOutput;

/// Minimum pose-presence score for a frame to count as a detection.
pub const MIN_POSE_PRESENCE: f32 = 0.5;

/// Per-frame pose landmark source. `Ok(None)` means no person was found in
/// the frame; the session treats that as a frame to render without counting.
pub trait PoseEngine: Send + 'static {
    fn detect(&mut self, frame: &Mat) -> anyhow::Result<Option<PoseOutput>>;
}
