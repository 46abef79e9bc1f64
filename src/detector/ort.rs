use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ndarray::Array4;
use opencv::{
    core::{Mat, Size},
    imgproc,
    prelude::*,
};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use rayon::prelude::*;

use super::{MIN_POSE_PRESENCE, PoseEngine};
use crate::types::{LANDMARK_COUNT, Point2, PoseOutput};

/// Side length of the square BlazePose landmark model input.
pub const INPUT_SIZE: usize = 256;

/// Values per landmark in the model's coordinate output (x, y, z,
/// visibility, presence).
const VALUES_PER_LANDMARK: usize = 5;

/// BlazePose landmark engine backed by ONNX Runtime.
pub struct OrtEngine {
    session: Session,
}

impl OrtEngine {
    pub fn new(model_path: &Path) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| {
                format!("failed to load ORT session from {}", model_path.display())
            })?;

        Ok(Self { session })
    }
}

impl PoseEngine for OrtEngine {
    fn detect(&mut self, frame: &Mat) -> Result<Option<PoseOutput>> {
        let (input, letterbox) = prepare_frame(frame)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run pose landmark model")?;

        if outputs.len() < 2 {
            return Err(anyhow!(
                "pose model returned {} outputs, expected landmarks and presence",
                outputs.len()
            ));
        }

        let score = outputs[1]
            .try_extract_array::<f32>()?
            .iter()
            .next()
            .copied()
            .unwrap_or(0.0);
        if score < MIN_POSE_PRESENCE {
            return Ok(None);
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = coords.iter().copied().collect();
        let (landmarks, visibility) = decode_landmarks(&flattened, &letterbox)?;

        Ok(Some(PoseOutput {
            landmarks,
            visibility,
            score,
        }))
    }
}

/// Maps model-input pixel coordinates back to frame-normalized ones.
struct Letterbox {
    scale: f32,
    x_offset: f32,
    y_offset: f32,
    frame_width: f32,
    frame_height: f32,
}

impl Letterbox {
    fn project(&self, x_px: f32, y_px: f32) -> Point2 {
        Point2::new(
            (x_px - self.x_offset) / (self.frame_width * self.scale),
            (y_px - self.y_offset) / (self.frame_height * self.scale),
        )
    }
}

/// Letterboxes the BGR frame into the square model input and converts it to
/// a normalized RGB NHWC tensor.
fn prepare_frame(frame: &Mat) -> Result<(Array4<f32>, Letterbox)> {
    let width = frame.cols();
    let height = frame.rows();
    if width <= 0 || height <= 0 {
        return Err(anyhow!("empty frame"));
    }

    let scale = (INPUT_SIZE as f32 / width as f32).min(INPUT_SIZE as f32 / height as f32);
    let scaled_width = ((width as f32 * scale) as usize).clamp(1, INPUT_SIZE);
    let scaled_height = ((height as f32 * scale) as usize).clamp(1, INPUT_SIZE);
    let x_offset = (INPUT_SIZE - scaled_width) / 2;
    let y_offset = (INPUT_SIZE - scaled_height) / 2;

    let mut resized = Mat::default();
    imgproc::resize(
        frame,
        &mut resized,
        Size::new(scaled_width as i32, scaled_height as i32),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;
    let src = resized.data_bytes()?;
    let src_row_bytes = scaled_width * 3;

    // BGR u8 rows into the padded RGB f32 canvas.
    let mut pixels = vec![0f32; INPUT_SIZE * INPUT_SIZE * 3];
    pixels
        .par_chunks_mut(INPUT_SIZE * 3)
        .enumerate()
        .for_each(|(row_index, row)| {
            if row_index < y_offset || row_index >= y_offset + scaled_height {
                return;
            }
            let src_row = &src[(row_index - y_offset) * src_row_bytes..][..src_row_bytes];
            let dst_row = &mut row[x_offset * 3..][..src_row_bytes];
            for (dst, bgr) in dst_row.chunks_exact_mut(3).zip(src_row.chunks_exact(3)) {
                dst[0] = f32::from(bgr[2]) / 255.0;
                dst[1] = f32::from(bgr[1]) / 255.0;
                dst[2] = f32::from(bgr[0]) / 255.0;
            }
        });

    let input = Array4::from_shape_vec((1, INPUT_SIZE, INPUT_SIZE, 3), pixels)?;
    let letterbox = Letterbox {
        scale,
        x_offset: x_offset as f32,
        y_offset: y_offset as f32,
        frame_width: width as f32,
        frame_height: height as f32,
    };

    Ok((input, letterbox))
}

/// Decodes the `[1, 195]` landmark tensor: 33 landmarks, each x/y/z in model
/// input pixels followed by visibility and presence logits.
fn decode_landmarks(values: &[f32], letterbox: &Letterbox) -> Result<(Vec<Point2>, Vec<f32>)> {
    if values.len() < LANDMARK_COUNT * VALUES_PER_LANDMARK {
        return Err(anyhow!(
            "landmark output too short: {} values",
            values.len()
        ));
    }

    let mut landmarks = Vec::with_capacity(LANDMARK_COUNT);
    let mut visibility = Vec::with_capacity(LANDMARK_COUNT);
    for chunk in values
        .chunks_exact(VALUES_PER_LANDMARK)
        .take(LANDMARK_COUNT)
    {
        landmarks.push(letterbox.project(chunk[0], chunk[1]));
        visibility.push(sigmoid(chunk[3]));
    }

    Ok((landmarks, visibility))
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
