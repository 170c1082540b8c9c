//! Per-frame analysis: orient, detect, notify, release.
//!
//! A frame is consumed by value and dropped before `analyze` returns, so the
//! underlying capture buffer is released on every path, including detector
//! failure and frames that carry no pixel data.

use crate::detector::Detect;
use crate::rotation::rotate_luma;
use crate::types::{DetectionBox, FrameGeometry};

/// A captured frame handed to the analyzer. Dropping it releases the buffer.
pub trait FrameSource {
    /// Raw buffer dimensions and the rotation needed to display it upright.
    fn geometry(&self) -> FrameGeometry;

    /// Grayscale pixels in raw buffer orientation, `None` if the frame carries
    /// no image.
    fn luma(&self) -> Option<&[u8]>;
}

/// Receives the results of each analyzed frame.
pub trait AnalysisListener {
    fn on_image_size(&mut self, geometry: FrameGeometry);
    fn on_face_detected(&mut self, detected: bool);
    fn on_faces(&mut self, faces: Vec<DetectionBox>);
}

/// What happened to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// Detection ran; this many faces were delivered.
    Detected(usize),
    /// Detection failed; an empty list was delivered.
    Failed,
    /// The frame had no pixel data and was released untouched.
    Skipped,
}

pub struct FrameAnalyzer<D> {
    detector: D,
}

impl<D: Detect> FrameAnalyzer<D> {
    pub fn new(detector: D) -> Self {
        Self { detector }
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Analyze one frame and report to `listener`.
    ///
    /// Detection runs on the upright image, so reported boxes live in the
    /// rotation-adjusted frame space.
    pub fn analyze<F, L>(&mut self, frame: F, listener: &mut L) -> AnalysisOutcome
    where
        F: FrameSource,
        L: AnalysisListener + ?Sized,
    {
        let geometry = frame.geometry();
        let Some(luma) = frame.luma() else {
            tracing::trace!("frame without image data, releasing");
            return AnalysisOutcome::Skipped;
        };

        listener.on_image_size(geometry);

        let result = rotate_luma(luma, geometry.width, geometry.height, geometry.rotation)
            .map_err(|e| e.to_string())
            .and_then(|upright| {
                let (w, h) = upright.dimensions();
                self.detector
                    .detect(upright.as_raw(), w, h)
                    .map_err(|e| e.to_string())
            });

        match result {
            Ok(faces) => {
                let count = faces.len();
                listener.on_face_detected(count > 0);
                listener.on_faces(faces);
                AnalysisOutcome::Detected(count)
            }
            Err(error) => {
                tracing::warn!(%error, width = geometry.width, height = geometry.height, "face detection failed");
                listener.on_face_detected(false);
                listener.on_faces(Vec::new());
                AnalysisOutcome::Failed
            }
        }
    }
}

/// A frame backed by an owned grayscale buffer.
#[derive(Debug, Clone)]
pub struct LumaFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub rotation: crate::rotation::Rotation,
}

impl FrameSource for LumaFrame {
    fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.width, self.height, self.rotation)
    }

    fn luma(&self) -> Option<&[u8]> {
        if self.data.is_empty() {
            None
        } else {
            Some(&self.data)
        }
    }
}
