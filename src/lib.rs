//! Pose-driven pushup repetition counter.
//!
//! Frames from a video file or webcam are run through a BlazePose landmark
//! model, the left elbow and hip angles are derived per frame, and a small
//! up/down threshold state machine increments the rep count once per full
//! up-to-down transition.
//!
//! The counting core lives in [`geometry`] and [`counter`]; [`session`]
//! drives capture, detection and annotation and reports through sink
//! callbacks; [`detector`] is the seam to the ONNX landmark model.

pub mod counter;
pub mod detector;
pub mod error;
pub mod geometry;
pub mod model_download;
pub mod overlay;
pub mod session;
pub mod types;
