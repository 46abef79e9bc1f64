use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::{Result, bail};
use clap::Parser;
use crossbeam_channel::{Receiver, Sender, bounded};
use opencv::{core::Mat, highgui, prelude::*};

use pushup_counter::{
    counter::Thresholds,
    detector::OrtEngine,
    error::SessionError,
    model_download,
    session::{self, FrameSink, VideoSource},
};

const WINDOW_NAME: &str = "Pushup Counter";

#[derive(Parser, Debug)]
#[command(name = "pushup-counter", version, about = "Pose-driven pushup counter for videos and webcams")]
struct Args {
    /// Video file to process
    #[arg(short, long)]
    video: Option<PathBuf>,

    /// Camera index to use when no video file is given
    #[arg(long, default_value_t = 0)]
    cam: i32,

    /// Process without opening a window (video files only)
    #[arg(long)]
    headless: bool,

    /// Path to the pose landmark ONNX model
    #[arg(long)]
    model: Option<PathBuf>,

    /// Elbow angle above which the arms count as extended
    #[arg(long, default_value_t = 160.0)]
    elbow_up: f32,

    /// Elbow angle below which the arms count as bent
    #[arg(long, default_value_t = 90.0)]
    elbow_down: f32,

    /// Hip angle above which the body counts as straight
    #[arg(long, default_value_t = 160.0)]
    hip_straight: f32,
}

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let args = Args::parse();

    let thresholds = Thresholds {
        elbow_up: args.elbow_up,
        elbow_down: args.elbow_down,
        hip_straight: args.hip_straight,
    };

    let model_path = args
        .model
        .unwrap_or_else(model_download::default_model_path);
    model_download::ensure_model_available(&model_path)?;

    match args.video {
        Some(path) => run_video(model_path, path, thresholds, args.headless),
        None => run_camera(model_path, args.cam, thresholds),
    }
}

enum SessionEvent {
    Frame {
        image: Mat,
        count: u32,
        progress: i32,
    },
    Done(Result<u32, SessionError>),
}

/// Worker-side sink that bridges session callbacks onto a channel. Frames
/// are dropped when the UI thread is busy; completion always goes through.
struct ChannelSink {
    tx: Sender<SessionEvent>,
}

impl FrameSink for ChannelSink {
    fn frame(&mut self, frame: &Mat, count: u32, progress: i32) {
        let image = match frame.try_clone() {
            Ok(image) => image,
            Err(err) => {
                log::warn!("failed to clone frame for display: {err}");
                return;
            }
        };
        let _ = self.tx.try_send(SessionEvent::Frame {
            image,
            count,
            progress,
        });
    }

    fn done(&mut self, result: Result<u32, SessionError>) {
        let _ = self.tx.send(SessionEvent::Done(result));
    }
}

fn run_video(
    model_path: PathBuf,
    path: PathBuf,
    thresholds: Thresholds,
    headless: bool,
) -> Result<()> {
    let (tx, rx): (Sender<SessionEvent>, Receiver<SessionEvent>) = bounded(1);
    let handle = session::spawn_session(
        model_path,
        VideoSource::File(path),
        thresholds,
        ChannelSink { tx },
    );

    if !headless {
        highgui::named_window(WINDOW_NAME, highgui::WINDOW_AUTOSIZE)?;
    }

    let mut last_progress = -1;
    let final_count = loop {
        match rx.recv() {
            Ok(SessionEvent::Frame {
                image,
                count,
                progress,
            }) => {
                if headless {
                    if progress != last_progress && progress % 10 == 0 {
                        log::info!("processing... {progress}% ({count} reps)");
                        last_progress = progress;
                    }
                    continue;
                }
                highgui::imshow(WINDOW_NAME, &image)?;
                if quit_requested(highgui::wait_key(1)?) {
                    log::info!("stop requested");
                    handle.request_stop();
                }
            }
            Ok(SessionEvent::Done(Ok(count))) => break count,
            Ok(SessionEvent::Done(Err(err))) => {
                handle.stop();
                bail!(err);
            }
            // Worker gone without a completion event; treat as failure.
            Err(_) => bail!("session worker exited unexpectedly"),
        }
    };

    handle.stop();
    if !headless {
        let _ = highgui::destroy_window(WINDOW_NAME);
    }
    println!("Final pushup count: {final_count}");
    Ok(())
}

/// Live camera loop on the calling thread, window always shown, `q` to quit.
fn run_camera(model_path: PathBuf, index: i32, thresholds: Thresholds) -> Result<()> {
    let mut engine = OrtEngine::new(&model_path)?;
    highgui::named_window(WINDOW_NAME, highgui::WINDOW_AUTOSIZE)?;
    log::info!("position yourself side-on to the camera; press q to quit");

    let stop = Arc::new(AtomicBool::new(false));
    let mut sink = WindowSink {
        stop: stop.clone(),
        result: None,
    };
    session::run_session(
        &mut engine,
        &VideoSource::Camera(index),
        thresholds,
        &mut sink,
        &stop,
    );
    let _ = highgui::destroy_window(WINDOW_NAME);

    match sink.result {
        Some(Ok(count)) => {
            println!("Final pushup count: {count}");
            Ok(())
        }
        Some(Err(err)) => bail!(err),
        None => bail!("camera session ended without a result"),
    }
}

struct WindowSink {
    stop: Arc<AtomicBool>,
    result: Option<Result<u32, SessionError>>,
}

impl FrameSink for WindowSink {
    fn frame(&mut self, frame: &Mat, _count: u32, _progress: i32) {
        if let Err(err) = highgui::imshow(WINDOW_NAME, frame) {
            log::warn!("failed to display frame: {err}");
            return;
        }
        match highgui::wait_key(10) {
            Ok(key) if quit_requested(key) => self.stop.store(true, Ordering::SeqCst),
            Ok(_) => {}
            Err(err) => log::warn!("window polling failed: {err}"),
        }
    }

    fn done(&mut self, result: Result<u32, SessionError>) {
        self.result = Some(result);
    }
}

fn quit_requested(key: i32) -> bool {
    key == i32::from(b'q') || key == 27
}
