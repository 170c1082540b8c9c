//! Detection-space to canvas-space coordinate mapping.
//!
//! Boxes are normalised against the rotation-adjusted frame size (width and
//! height swapped at 90°/270°) and then scaled onto the canvas. A frame with
//! a zero dimension, or an undrawable canvas, maps to nothing.

use crate::types::{CanvasRect, CanvasSize, DetectionBox, FrameGeometry, NormalizedRect};

/// Frame dimensions after applying the display rotation.
pub fn effective_dimensions(frame: &FrameGeometry) -> (u32, u32) {
    if frame.rotation.swaps_axes() {
        (frame.height, frame.width)
    } else {
        (frame.width, frame.height)
    }
}

/// Express a detection as fractions of the effective frame size.
pub fn normalize(detection: &DetectionBox, frame: &FrameGeometry) -> Option<NormalizedRect> {
    let (eff_w, eff_h) = effective_dimensions(frame);
    if eff_w == 0 || eff_h == 0 {
        return None;
    }
    let (eff_w, eff_h) = (eff_w as f32, eff_h as f32);
    Some(NormalizedRect {
        left: detection.left / eff_w,
        top: detection.top / eff_h,
        width: detection.width / eff_w,
        height: detection.height / eff_h,
    })
}

/// Scale a normalised rectangle onto the canvas.
pub fn denormalize(rect: &NormalizedRect, canvas: CanvasSize) -> Option<CanvasRect> {
    if !canvas.is_drawable() {
        return None;
    }
    Some(CanvasRect {
        left: rect.left * canvas.width,
        top: rect.top * canvas.height,
        width: rect.width * canvas.width,
        height: rect.height * canvas.height,
    })
}

/// Map one detection onto the canvas. `None` means nothing should be drawn.
pub fn map_box(
    detection: &DetectionBox,
    frame: &FrameGeometry,
    canvas: CanvasSize,
) -> Option<CanvasRect> {
    let normalized = normalize(detection, frame)?;
    denormalize(&normalized, canvas)
}

/// Map every detection of a frame, skipping anything that cannot be drawn.
pub fn map_boxes(
    detections: &[DetectionBox],
    frame: &FrameGeometry,
    canvas: CanvasSize,
) -> Vec<CanvasRect> {
    detections
        .iter()
        .filter_map(|d| map_box(d, frame, canvas))
        .collect()
}

/// Inverse of [`denormalize`]: canvas rectangle back to frame fractions.
pub fn to_normalized(rect: &CanvasRect, canvas: CanvasSize) -> Option<NormalizedRect> {
    if !canvas.is_drawable() {
        return None;
    }
    Some(NormalizedRect {
        left: rect.left / canvas.width,
        top: rect.top / canvas.height,
        width: rect.width / canvas.width,
        height: rect.height / canvas.height,
    })
}
