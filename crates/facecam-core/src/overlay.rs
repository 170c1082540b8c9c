//! Overlay state rendered on top of the preview.

use crate::analyzer::AnalysisListener;
use crate::mapper;
use crate::types::{CanvasRect, CanvasSize, DetectionBox, FrameGeometry};

/// Fields the preview redraws from. Everything is replaced on each analyzed
/// frame; nothing carries over from earlier frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayState {
    pub face_detected: bool,
    pub faces: Vec<DetectionBox>,
    pub geometry: FrameGeometry,
    /// Bumped once per analyzed frame.
    pub generation: u64,
}

impl OverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Face boxes mapped onto a canvas of the given size.
    pub fn canvas_rects(&self, canvas: CanvasSize) -> Vec<CanvasRect> {
        mapper::map_boxes(&self.faces, &self.geometry, canvas)
    }
}

impl AnalysisListener for OverlayState {
    fn on_image_size(&mut self, geometry: FrameGeometry) {
        self.geometry = geometry;
        self.generation += 1;
    }

    fn on_face_detected(&mut self, detected: bool) {
        self.face_detected = detected;
    }

    fn on_faces(&mut self, faces: Vec<DetectionBox>) {
        self.faces = faces;
    }
}
