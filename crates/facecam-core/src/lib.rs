//! facecam-core — face detection and the live preview overlay.
//!
//! Runs SCRFD face detection via ONNX Runtime on upright grayscale frames,
//! keeps per-frame overlay state, maps detection boxes onto the preview canvas
//! with rotation correction, and draws the result.

pub mod analyzer;
pub mod detector;
pub mod mapper;
pub mod overlay;
pub mod render;
pub mod rotation;
pub mod types;

pub use analyzer::{AnalysisListener, AnalysisOutcome, FrameAnalyzer, FrameSource, LumaFrame};
pub use detector::{Detect, DetectorOptions, FaceDetector, PerformanceMode};
pub use overlay::OverlayState;
pub use render::OverlayStyle;
pub use rotation::{GeometryError, Rotation};
pub use types::{CanvasRect, CanvasSize, DetectionBox, FrameGeometry, NormalizedRect};
