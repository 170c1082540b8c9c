use serde::{Deserialize, Serialize};

use crate::rotation::Rotation;

/// A detected face in source-frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    /// Detector score in [0, 1].
    pub confidence: f32,
}

impl DetectionBox {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
            confidence: 1.0,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    /// Clamp the box to a `width` × `height` frame. Returns `None` if nothing
    /// of the box remains inside the frame.
    pub fn clamped(&self, width: f32, height: f32) -> Option<Self> {
        let left = self.left.clamp(0.0, width);
        let top = self.top.clamp(0.0, height);
        let right = self.right().clamp(0.0, width);
        let bottom = self.bottom().clamp(0.0, height);
        if right <= left || bottom <= top {
            return None;
        }
        Some(Self {
            left,
            top,
            width: right - left,
            height: bottom - top,
            confidence: self.confidence,
        })
    }
}

/// Pixel dimensions and display rotation of the most recently analyzed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
}

impl FrameGeometry {
    /// No frame processed yet.
    pub const EMPTY: FrameGeometry = FrameGeometry {
        width: 0,
        height: 0,
        rotation: Rotation::Deg0,
    };

    pub fn new(width: u32, height: u32, rotation: Rotation) -> Self {
        Self {
            width,
            height,
            rotation,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for FrameGeometry {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Destination drawing surface dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: f32,
    pub height: f32,
}

impl CanvasSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// True when both dimensions are finite and strictly positive.
    pub fn is_drawable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Rectangle in canvas units, ready for drawing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Rectangle expressed as fractions of the (rotation-adjusted) frame size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_inside_is_unchanged() {
        let b = DetectionBox::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(b.clamped(100.0, 100.0), Some(b));
    }

    #[test]
    fn test_clamped_trims_overhang() {
        let b = DetectionBox::new(-10.0, 90.0, 30.0, 40.0);
        let c = b.clamped(100.0, 100.0).unwrap();
        assert_eq!(c.left, 0.0);
        assert_eq!(c.top, 90.0);
        assert_eq!(c.width, 20.0);
        assert_eq!(c.height, 10.0);
    }

    #[test]
    fn test_clamped_fully_outside() {
        let b = DetectionBox::new(200.0, 200.0, 10.0, 10.0);
        assert!(b.clamped(100.0, 100.0).is_none());
    }

    #[test]
    fn test_empty_geometry() {
        assert!(FrameGeometry::EMPTY.is_empty());
        assert!(FrameGeometry::default().is_empty());
        assert!(!FrameGeometry::new(640, 480, Rotation::Deg0).is_empty());
    }

    #[test]
    fn test_canvas_drawable() {
        assert!(CanvasSize::new(1080.0, 1920.0).is_drawable());
        assert!(!CanvasSize::new(0.0, 1920.0).is_drawable());
        assert!(!CanvasSize::new(1080.0, f32::NAN).is_drawable());
        assert!(!CanvasSize::new(-1.0, 10.0).is_drawable());
    }

    #[test]
    fn test_detection_box_json_shape() {
        let b = DetectionBox::new(1.0, 2.0, 3.0, 4.0);
        let json = serde_json::to_value(b).unwrap();
        assert_eq!(json["left"], 1.0);
        assert_eq!(json["height"], 4.0);
        assert_eq!(json["confidence"], 1.0);
    }
}
