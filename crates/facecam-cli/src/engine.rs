use facecam_core::{
    AnalysisListener, AnalysisOutcome, DetectionBox, DetectorOptions, FaceDetector, FrameAnalyzer,
    FrameGeometry, FrameSource, Rotation,
};
use facecam_hw::{Camera, Frame};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] facecam_hw::CameraError),
    #[error("detector error: {0}")]
    Detector(#[from] facecam_core::detector::DetectorError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Everything the preview needs from one analyzed frame.
#[derive(Debug, Default)]
pub struct FrameReport {
    pub sequence: u32,
    /// Packed RGB in raw sensor orientation.
    pub preview: Vec<u8>,
    pub geometry: FrameGeometry,
    pub face_detected: bool,
    pub faces: Vec<DetectionBox>,
    pub analyzed: bool,
}

impl FrameReport {
    /// Replay the analysis callbacks into another listener.
    pub fn apply_to(self, listener: &mut impl AnalysisListener) -> Vec<u8> {
        if self.analyzed {
            listener.on_image_size(self.geometry);
            listener.on_face_detected(self.face_detected);
            listener.on_faces(self.faces);
        }
        self.preview
    }
}

impl AnalysisListener for FrameReport {
    fn on_image_size(&mut self, geometry: FrameGeometry) {
        self.geometry = geometry;
        self.analyzed = true;
    }

    fn on_face_detected(&mut self, detected: bool) {
        self.face_detected = detected;
    }

    fn on_faces(&mut self, faces: Vec<DetectionBox>) {
        self.faces = faces;
    }
}

/// A captured camera frame tagged with its display rotation.
pub struct CapturedFrame {
    pub frame: Frame,
    pub rotation: Rotation,
}

impl FrameSource for CapturedFrame {
    fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.frame.width, self.frame.height, self.rotation)
    }

    fn luma(&self) -> Option<&[u8]> {
        if self.frame.data.is_empty() {
            None
        } else {
            Some(&self.frame.data)
        }
    }
}

pub struct EngineSettings {
    pub camera_device: String,
    pub capture_width: u32,
    pub capture_height: u32,
    pub rotation: Rotation,
    pub warmup_frames: usize,
    pub model_path: PathBuf,
    pub detector: DetectorOptions,
}

/// Spawn capture + detection on a dedicated OS thread.
///
/// The model is loaded and the camera opened synchronously so startup fails
/// fast. Reports arrive on the returned channel until the receiver is dropped
/// or capture fails.
pub fn spawn_engine(
    settings: EngineSettings,
) -> Result<(mpsc::Receiver<FrameReport>, (u32, u32)), EngineError> {
    let detector = FaceDetector::load(&settings.model_path, settings.detector)?;
    tracing::info!(model = %settings.model_path.display(), "detector loaded");

    let camera = Camera::open(
        &settings.camera_device,
        settings.capture_width,
        settings.capture_height,
    )?;
    let frame_size = (camera.width, camera.height);
    tracing::info!(
        device = %settings.camera_device,
        width = camera.width,
        height = camera.height,
        fourcc = ?camera.fourcc,
        rotation = %settings.rotation,
        "camera opened"
    );

    let (tx, rx) = mpsc::channel::<FrameReport>(2);

    std::thread::Builder::new()
        .name("facecam-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            if let Err(e) = run_capture_loop(&camera, detector, &settings, &tx) {
                tracing::error!(error = %e, "capture loop stopped");
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok((rx, frame_size))
}

fn run_capture_loop(
    camera: &Camera,
    detector: FaceDetector,
    settings: &EngineSettings,
    tx: &mpsc::Sender<FrameReport>,
) -> Result<(), EngineError> {
    let mut stream = camera.stream()?;
    stream.warm_up(settings.warmup_frames)?;

    let mut analyzer = FrameAnalyzer::new(detector);
    loop {
        let frame = stream.next_frame()?;
        if frame.is_dark {
            tracing::debug!(seq = frame.sequence, "dark frame");
        }

        let mut report = FrameReport {
            sequence: frame.sequence,
            preview: frame.to_rgb(),
            ..FrameReport::default()
        };
        let outcome = analyzer.analyze(
            CapturedFrame {
                frame,
                rotation: settings.rotation,
            },
            &mut report,
        );
        if let AnalysisOutcome::Detected(n) = outcome {
            tracing::trace!(seq = report.sequence, faces = n, "frame analyzed");
        }

        if tx.blocking_send(report).is_err() {
            // Preview loop is gone.
            return Ok(());
        }
    }
}
