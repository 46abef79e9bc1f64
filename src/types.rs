//! Core data types shared between the detector, counter and overlay.

/// A detector landmark, normalized to `[0, 1]` in frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// BlazePose landmark indices (33 total).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum PoseLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

/// Number of landmarks produced by the pose model.
pub const LANDMARK_COUNT: usize = 33;

/// Skeleton edges for overlay drawing. The face mesh is skipped, it adds
/// nothing for exercise counting.
pub const POSE_CONNECTIONS: &[(PoseLandmark, PoseLandmark)] = &[
    (PoseLandmark::LeftShoulder, PoseLandmark::RightShoulder),
    (PoseLandmark::LeftShoulder, PoseLandmark::LeftElbow),
    (PoseLandmark::LeftElbow, PoseLandmark::LeftWrist),
    (PoseLandmark::RightShoulder, PoseLandmark::RightElbow),
    (PoseLandmark::RightElbow, PoseLandmark::RightWrist),
    (PoseLandmark::LeftShoulder, PoseLandmark::LeftHip),
    (PoseLandmark::RightShoulder, PoseLandmark::RightHip),
    (PoseLandmark::LeftHip, PoseLandmark::RightHip),
    (PoseLandmark::LeftHip, PoseLandmark::LeftKnee),
    (PoseLandmark::LeftKnee, PoseLandmark::LeftAnkle),
    (PoseLandmark::RightHip, PoseLandmark::RightKnee),
    (PoseLandmark::RightKnee, PoseLandmark::RightAnkle),
    (PoseLandmark::LeftAnkle, PoseLandmark::LeftHeel),
    (PoseLandmark::LeftHeel, PoseLandmark::LeftFootIndex),
    (PoseLandmark::RightAnkle, PoseLandmark::RightHeel),
    (PoseLandmark::RightHeel, PoseLandmark::RightFootIndex),
];

/// Full per-frame output of the pose landmark engine.
#[derive(Clone, Debug)]
pub struct PoseOutput {
    /// One entry per [`PoseLandmark`], normalized to the frame.
    pub landmarks: Vec<Point2>,
    /// Per-landmark visibility in `[0, 1]`.
    pub visibility: Vec<f32>,
    /// Overall pose presence score.
    pub score: f32,
}

impl PoseOutput {
    pub fn landmark(&self, which: PoseLandmark) -> Option<Point2> {
        self.landmarks.get(which as usize).copied()
    }
}

/// The five left-side joints the counter needs, extracted once per frame.
#[derive(Clone, Copy, Debug)]
pub struct PoseSample {
    pub shoulder: Point2,
    pub elbow: Point2,
    pub wrist: Point2,
    pub hip: Point2,
    pub knee: Point2,
}

impl PoseSample {
    /// Extracts the counting joints from a full detector output. `None` when
    /// the output does not carry all 33 landmarks.
    pub fn from_output(output: &PoseOutput) -> Option<Self> {
        Some(Self {
            shoulder: output.landmark(PoseLandmark::LeftShoulder)?,
            elbow: output.landmark(PoseLandmark::LeftElbow)?,
            wrist: output.landmark(PoseLandmark::LeftWrist)?,
            hip: output.landmark(PoseLandmark::LeftHip)?,
            knee: output.landmark(PoseLandmark::LeftKnee)?,
        })
    }
}
