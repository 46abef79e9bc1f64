//! Frame annotation: angle/stage/count readout and the pose skeleton.

use opencv::{
    core::{Mat, Point, Scalar},
    imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_8},
    prelude::*,
};

use crate::{
    counter::Stage,
    types::{POSE_CONNECTIONS, PoseOutput},
};

/// Landmarks below this visibility are not drawn.
const MIN_VISIBILITY: f32 = 0.5;

fn text_color() -> Scalar {
    Scalar::new(255.0, 255.0, 255.0, 0.0)
}

fn stage_color() -> Scalar {
    Scalar::new(0.0, 255.0, 0.0, 0.0)
}

fn count_color() -> Scalar {
    Scalar::new(0.0, 0.0, 255.0, 0.0)
}

fn bone_color() -> Scalar {
    Scalar::new(230.0, 66.0, 245.0, 0.0)
}

fn joint_color() -> Scalar {
    Scalar::new(66.0, 117.0, 245.0, 0.0)
}

/// Measured angles, stage and running count, laid out down the left edge.
pub fn draw_readout(
    frame: &mut Mat,
    elbow_angle: f32,
    hip_angle: f32,
    stage: Option<Stage>,
    count: u32,
) -> opencv::Result<()> {
    let stage_label = stage.map(|s| s.label()).unwrap_or("none");
    put_line(frame, &format!("Elbow Angle: {}", elbow_angle as i32), 50, text_color())?;
    put_line(frame, &format!("Hip Angle: {}", hip_angle as i32), 100, text_color())?;
    put_line(frame, &format!("Stage: {stage_label}"), 150, stage_color())?;
    put_line(frame, &format!("Pushups: {count}"), 200, count_color())?;
    Ok(())
}

/// Progress line near the bottom edge.
pub fn draw_progress(frame: &mut Mat, progress: i32) -> opencv::Result<()> {
    imgproc::put_text(
        frame,
        &format!("Progress: {progress}%"),
        Point::new(50, frame.rows() - 50),
        FONT_HERSHEY_SIMPLEX,
        0.7,
        text_color(),
        2,
        LINE_8,
        false,
    )
}

/// Detected skeleton: a dot per sufficiently visible landmark plus the body
/// connection segments.
pub fn draw_skeleton(frame: &mut Mat, output: &PoseOutput) -> opencv::Result<()> {
    let width = frame.cols() as f32;
    let height = frame.rows() as f32;
    let to_pixel = |index: usize| -> Option<Point> {
        let point = output.landmarks.get(index)?;
        let visible = output.visibility.get(index).copied().unwrap_or(0.0);
        if visible < MIN_VISIBILITY {
            return None;
        }
        Some(Point::new(
            (point.x.clamp(0.0, 1.0) * width) as i32,
            (point.y.clamp(0.0, 1.0) * height) as i32,
        ))
    };

    for &(from, to) in POSE_CONNECTIONS {
        if let (Some(a), Some(b)) = (to_pixel(from as usize), to_pixel(to as usize)) {
            imgproc::line(frame, a, b, bone_color(), 2, LINE_8, 0)?;
        }
    }

    for index in 0..output.landmarks.len() {
        if let Some(center) = to_pixel(index) {
            imgproc::circle(frame, center, 3, joint_color(), -1, LINE_8, 0)?;
        }
    }

    Ok(())
}

fn put_line(frame: &mut Mat, text: &str, y: i32, color: Scalar) -> opencv::Result<()> {
    imgproc::put_text(
        frame,
        text,
        Point::new(50, y),
        FONT_HERSHEY_SIMPLEX,
        1.0,
        color,
        2,
        LINE_8,
        false,
    )
}
