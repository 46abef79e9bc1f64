//! The per-frame driving loop: capture, detect, count, annotate, forward.
//!
//! One session owns one capture handle and one [`RepCounter`]. The camera
//! entry point runs [`run_session`] on the calling thread; the video-file
//! entry point moves the identical loop onto a worker via [`spawn_session`]
//! and observes it through the sink callbacks. Cancellation is cooperative:
//! the stop flag is polled once per frame.

use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use opencv::{
    core::{Mat, Size},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};

use crate::{
    counter::{RepCounter, Thresholds},
    detector::{OrtEngine, PoseEngine},
    error::SessionError,
    geometry::joint_angle,
    overlay,
    types::PoseSample,
};

/// Working resolution every frame is scaled to before detection and overlay.
pub const FRAME_WIDTH: i32 = 800;
pub const FRAME_HEIGHT: i32 = 600;

#[derive(Clone, Debug)]
pub enum VideoSource {
    /// Webcam index.
    Camera(i32),
    /// Video file path.
    File(PathBuf),
}

/// Receives session output. `frame` fires once per processed frame with the
/// annotated image, the running count and progress in `[0, 100]`; `done`
/// fires exactly once with the final count or a terminal error.
pub trait FrameSink {
    fn frame(&mut self, frame: &Mat, count: u32, progress: i32);
    fn done(&mut self, result: Result<u32, SessionError>);
}

/// Sequential frame supplier. Production impl wraps an OpenCV capture;
/// tests substitute scripted frames.
pub trait FrameSource {
    /// `Ok(None)` signals end of stream.
    fn next_frame(&mut self) -> Result<Option<Mat>, SessionError>;

    /// Total frame count when the source knows it (video files).
    fn total_frames(&self) -> Option<u64> {
        None
    }
}

/// Exclusively owned capture handle; released when the source drops, on
/// every exit path.
pub struct CaptureSource {
    capture: VideoCapture,
    total: Option<u64>,
}

impl CaptureSource {
    pub fn open(source: &VideoSource) -> Result<Self, SessionError> {
        match source {
            VideoSource::Camera(index) => {
                log::info!("opening camera {index}");
                let mut capture = VideoCapture::new(*index, videoio::CAP_ANY)?;
                if !capture.is_opened()? {
                    return Err(SessionError::OpenFailed(format!("camera {index}")));
                }
                // Small buffer keeps the live preview close to real time.
                let _ = capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0);
                Ok(Self {
                    capture,
                    total: None,
                })
            }
            VideoSource::File(path) => {
                if !path.exists() {
                    return Err(SessionError::SourceNotFound(path.clone()));
                }
                log::info!("opening video file {}", path.display());
                let capture = VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)?;
                if !capture.is_opened()? {
                    return Err(SessionError::OpenFailed(path.display().to_string()));
                }
                let total = capture.get(videoio::CAP_PROP_FRAME_COUNT).ok();
                let total = total.filter(|count| *count > 0.0).map(|count| count as u64);
                Ok(Self { capture, total })
            }
        }
    }
}

impl FrameSource for CaptureSource {
    fn next_frame(&mut self) -> Result<Option<Mat>, SessionError> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }

    fn total_frames(&self) -> Option<u64> {
        self.total
    }
}

/// Opens the source and drives it to completion. `sink.done` is invoked on
/// every outcome: end of stream, stop request, or open failure.
pub fn run_session<E, S>(
    engine: &mut E,
    source: &VideoSource,
    thresholds: Thresholds,
    sink: &mut S,
    stop: &AtomicBool,
) where
    E: PoseEngine,
    S: FrameSink,
{
    let result = match CaptureSource::open(source) {
        Ok(mut capture) => process_frames(engine, &mut capture, thresholds, sink, stop),
        Err(err) => Err(err),
    };
    match &result {
        Ok(count) => log::info!("session finished with {count} reps"),
        Err(err) => log::error!("session failed: {err}"),
    }
    sink.done(result);
}

/// The loop itself, over an already-open source. Completion is reported by
/// [`run_session`]; this returns the final count so callers own the policy.
pub fn process_frames<E, F, S>(
    engine: &mut E,
    source: &mut F,
    thresholds: Thresholds,
    sink: &mut S,
    stop: &AtomicBool,
) -> Result<u32, SessionError>
where
    E: PoseEngine,
    F: FrameSource,
    S: FrameSink,
{
    let mut counter = RepCounter::new(thresholds);
    let total = source.total_frames();
    let mut frame_index: u64 = 0;

    while !stop.load(Ordering::Relaxed) {
        let frame = match source.next_frame()? {
            Some(frame) => frame,
            None => break,
        };
        frame_index += 1;

        let mut display = resize_frame(&frame)?;

        // A failed inference is treated the same as an undetected pose: the
        // frame is still rendered and counting resumes on the next frame.
        let output = match engine.detect(&display) {
            Ok(output) => output,
            Err(err) => {
                log::warn!("pose inference failed: {err:?}");
                None
            }
        };

        if let Some(output) = &output {
            overlay::draw_skeleton(&mut display, output).map_err(SessionError::Capture)?;
            if let Some(sample) = PoseSample::from_output(output) {
                let elbow_angle = joint_angle(sample.shoulder, sample.elbow, sample.wrist);
                let hip_angle = joint_angle(sample.shoulder, sample.hip, sample.knee);
                if counter.step(elbow_angle, hip_angle) {
                    log::info!("pushup count: {}", counter.count());
                }
                overlay::draw_readout(
                    &mut display,
                    elbow_angle,
                    hip_angle,
                    counter.stage(),
                    counter.count(),
                )
                .map_err(SessionError::Capture)?;
            }
        }

        let progress = progress_percent(frame_index, total);
        overlay::draw_progress(&mut display, progress).map_err(SessionError::Capture)?;
        sink.frame(&display, counter.count(), progress);
    }

    Ok(counter.count())
}

fn resize_frame(frame: &Mat) -> Result<Mat, SessionError> {
    let mut resized = Mat::default();
    imgproc::resize(
        frame,
        &mut resized,
        Size::new(FRAME_WIDTH, FRAME_HEIGHT),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;
    Ok(resized)
}

fn progress_percent(frame_index: u64, total: Option<u64>) -> i32 {
    match total {
        Some(total) if total > 0 => ((frame_index * 100 / total) as i32).clamp(0, 100),
        _ => 0,
    }
}

/// Handle to a background session. Dropping it requests a stop and joins.
pub struct SessionHandle {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SessionHandle {
    /// Asks the worker to stop after the frame it is currently processing.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop(mut self) {
        self.request_stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Runs a session on a single background worker so a foreground thread stays
/// responsive. The engine is built on the worker; a failure to load the
/// model is reported through `sink.done` like any other open failure.
pub fn spawn_session<S>(
    model_path: PathBuf,
    source: VideoSource,
    thresholds: Thresholds,
    mut sink: S,
) -> SessionHandle
where
    S: FrameSink + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        let mut engine = match OrtEngine::new(&model_path) {
            Ok(engine) => engine,
            Err(err) => {
                log::error!("failed to load pose model: {err:?}");
                sink.done(Err(SessionError::Engine(format!("{err:#}"))));
                return;
            }
        };
        run_session(&mut engine, &source, thresholds, &mut sink, &stop_flag);
    });

    SessionHandle {
        stop,
        handle: Some(handle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LANDMARK_COUNT, Point2, PoseLandmark, PoseOutput};
    use opencv::core::CV_8UC3;

    fn blank_frame() -> Mat {
        Mat::zeros(480, 640, CV_8UC3).unwrap().to_mat().unwrap()
    }

    /// A pose with all five counting joints collinear: elbow and hip angles
    /// both read 180 (arms extended, body straight).
    fn extended_pose() -> PoseOutput {
        pose_with(
            Point2::new(0.1, 0.5),
            Point2::new(0.3, 0.5),
            Point2::new(0.5, 0.5),
            Point2::new(0.7, 0.5),
            Point2::new(0.9, 0.5),
        )
    }

    /// Elbow bent to 45 degrees while shoulder-hip-knee stay collinear.
    fn bent_pose() -> PoseOutput {
        pose_with(
            Point2::new(0.3, 0.3),
            Point2::new(0.3, 0.5),
            Point2::new(0.45, 0.35),
            Point2::new(0.5, 0.5),
            Point2::new(0.7, 0.7),
        )
    }

    fn pose_with(
        shoulder: Point2,
        elbow: Point2,
        wrist: Point2,
        hip: Point2,
        knee: Point2,
    ) -> PoseOutput {
        let mut landmarks = vec![Point2::new(0.5, 0.5); LANDMARK_COUNT];
        landmarks[PoseLandmark::LeftShoulder as usize] = shoulder;
        landmarks[PoseLandmark::LeftElbow as usize] = elbow;
        landmarks[PoseLandmark::LeftWrist as usize] = wrist;
        landmarks[PoseLandmark::LeftHip as usize] = hip;
        landmarks[PoseLandmark::LeftKnee as usize] = knee;
        PoseOutput {
            landmarks,
            visibility: vec![0.9; LANDMARK_COUNT],
            score: 0.95,
        }
    }

    struct ScriptedEngine {
        script: Vec<anyhow::Result<Option<PoseOutput>>>,
        cursor: usize,
    }

    impl ScriptedEngine {
        fn new(script: Vec<anyhow::Result<Option<PoseOutput>>>) -> Self {
            Self { script, cursor: 0 }
        }
    }

    impl PoseEngine for ScriptedEngine {
        fn detect(&mut self, _frame: &Mat) -> anyhow::Result<Option<PoseOutput>> {
            let result = match self.script.get_mut(self.cursor) {
                Some(entry) => std::mem::replace(entry, Ok(None)),
                None => Ok(None),
            };
            self.cursor += 1;
            result
        }
    }

    struct ScriptedSource {
        remaining: u64,
        total: Option<u64>,
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<Mat>, SessionError> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            Ok(Some(blank_frame()))
        }

        fn total_frames(&self) -> Option<u64> {
            self.total
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        frames: Vec<(u32, i32)>,
        completions: Vec<Result<u32, SessionError>>,
        stop_after: Option<(usize, Arc<AtomicBool>)>,
    }

    impl FrameSink for RecordingSink {
        fn frame(&mut self, _frame: &Mat, count: u32, progress: i32) {
            self.frames.push((count, progress));
            if let Some((after, stop)) = &self.stop_after {
                if self.frames.len() >= *after {
                    stop.store(true, Ordering::SeqCst);
                }
            }
        }

        fn done(&mut self, result: Result<u32, SessionError>) {
            self.completions.push(result);
        }
    }

    #[test]
    fn counts_one_rep_and_skips_undetected_frames() {
        let mut engine = ScriptedEngine::new(vec![
            Ok(Some(extended_pose())),
            Ok(None),
            Ok(Some(bent_pose())),
            Ok(Some(bent_pose())),
        ]);
        let mut source = ScriptedSource {
            remaining: 4,
            total: Some(4),
        };
        let mut sink = RecordingSink::default();
        let stop = AtomicBool::new(false);

        let count = process_frames(
            &mut engine,
            &mut source,
            Thresholds::default(),
            &mut sink,
            &stop,
        )
        .unwrap();

        assert_eq!(count, 1);
        // Undetected frame leaves the count unchanged, repeated bent frames
        // do not double count.
        assert_eq!(
            sink.frames,
            vec![(0, 25), (0, 50), (1, 75), (1, 100)]
        );
    }

    #[test]
    fn inference_errors_are_tolerated() {
        let mut engine = ScriptedEngine::new(vec![
            Ok(Some(extended_pose())),
            Err(anyhow::anyhow!("backend hiccup")),
            Ok(Some(bent_pose())),
        ]);
        let mut source = ScriptedSource {
            remaining: 3,
            total: Some(3),
        };
        let mut sink = RecordingSink::default();
        let stop = AtomicBool::new(false);

        let count = process_frames(
            &mut engine,
            &mut source,
            Thresholds::default(),
            &mut sink,
            &stop,
        )
        .unwrap();

        assert_eq!(count, 1);
        assert_eq!(sink.frames.len(), 3);
    }

    #[test]
    fn stop_flag_is_observed_between_frames() {
        let stop = Arc::new(AtomicBool::new(false));
        let mut engine = ScriptedEngine::new(Vec::new());
        let mut source = ScriptedSource {
            remaining: 100,
            total: Some(100),
        };
        let mut sink = RecordingSink {
            stop_after: Some((2, stop.clone())),
            ..RecordingSink::default()
        };

        let count = process_frames(
            &mut engine,
            &mut source,
            Thresholds::default(),
            &mut sink,
            &stop,
        )
        .unwrap();

        assert_eq!(count, 0);
        assert_eq!(sink.frames.len(), 2);
    }

    #[test]
    fn unknown_totals_report_zero_progress() {
        let mut engine = ScriptedEngine::new(Vec::new());
        let mut source = ScriptedSource {
            remaining: 2,
            total: None,
        };
        let mut sink = RecordingSink::default();
        let stop = AtomicBool::new(false);

        process_frames(
            &mut engine,
            &mut source,
            Thresholds::default(),
            &mut sink,
            &stop,
        )
        .unwrap();

        assert_eq!(sink.frames, vec![(0, 0), (0, 0)]);
    }

    #[test]
    fn missing_file_reaches_completion_callback() {
        let mut engine = ScriptedEngine::new(Vec::new());
        let mut sink = RecordingSink::default();
        let stop = AtomicBool::new(false);

        run_session(
            &mut engine,
            &VideoSource::File(PathBuf::from("/definitely/not/here.mp4")),
            Thresholds::default(),
            &mut sink,
            &stop,
        );

        assert!(sink.frames.is_empty());
        assert_eq!(sink.completions.len(), 1);
        assert!(matches!(
            sink.completions[0],
            Err(SessionError::SourceNotFound(_))
        ));
    }
}
