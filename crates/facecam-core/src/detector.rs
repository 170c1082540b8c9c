//! SCRFD face detector via ONNX Runtime.
//!
//! Boxes only: landmark outputs of the model are ignored. The network runs on
//! a letterboxed square input whose side depends on the performance mode.

use crate::types::DetectionBox;
use image::{imageops, GrayImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

const SCRFD_FAST_INPUT_SIZE: u32 = 320;
const SCRFD_ACCURATE_INPUT_SIZE: u32 = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

/// Default model file name inside the model directory.
pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — download det_10g.onnx from insightface and place it in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("frame buffer too short for {width}x{height}: got {actual} bytes")]
    InvalidFrame { width: u32, height: u32, actual: usize },
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Speed/accuracy trade-off for detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceMode {
    #[default]
    Fast,
    Accurate,
}

impl PerformanceMode {
    fn input_size(self) -> u32 {
        match self {
            PerformanceMode::Fast => SCRFD_FAST_INPUT_SIZE,
            PerformanceMode::Accurate => SCRFD_ACCURATE_INPUT_SIZE,
        }
    }
}

impl std::str::FromStr for PerformanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(PerformanceMode::Fast),
            "accurate" => Ok(PerformanceMode::Accurate),
            other => Err(format!("unknown performance mode: {other} (fast|accurate)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorOptions {
    pub performance_mode: PerformanceMode,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            performance_mode: PerformanceMode::Fast,
            confidence_threshold: 0.5,
            nms_threshold: 0.4,
        }
    }
}

/// Anything that can find faces in an upright grayscale frame.
pub trait Detect {
    fn detect(&mut self, luma: &[u8], width: u32, height: u32)
        -> Result<Vec<DetectionBox>, DetectorError>;
}

/// Metadata for coordinate de-mapping after letterbox resize.
struct LetterboxInfo {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// Output tensor indices for one stride: (score_idx, bbox_idx).
type StrideOutputIndices = (usize, usize);

/// SCRFD-based face detector.
pub struct FaceDetector {
    session: Session,
    input_size: u32,
    options: DetectorOptions,
    stride_indices: [StrideOutputIndices; 3],
}

impl FaceDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &Path, options: DetectorOptions) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();

        tracing::info!(
            path = %model_path.display(),
            outputs = ?output_names,
            mode = ?options.performance_mode,
            "loaded SCRFD model"
        );

        // Score and bbox tensors for three strides; kps outputs may follow.
        if output_names.len() < 6 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires at least 6 outputs (3 strides × score/bbox), got {}",
                output_names.len()
            )));
        }

        let stride_indices = discover_output_indices(&output_names);
        tracing::debug!(?stride_indices, "SCRFD output tensor mapping");

        Ok(Self {
            session,
            input_size: options.performance_mode.input_size(),
            options,
            stride_indices,
        })
    }

    /// Resize into the square network input, padding with the mean so the
    /// border normalises to zero.
    fn preprocess(&self, frame: &GrayImage) -> (Array4<f32>, LetterboxInfo) {
        let side = self.input_size;
        let (letterbox, new_w, new_h) = letterbox_for(frame.width(), frame.height(), side);
        let resized = imageops::resize(frame, new_w, new_h, imageops::FilterType::Triangle);

        let side = side as usize;
        let pad_x = letterbox.pad_x.floor() as usize;
        let pad_y = letterbox.pad_y.floor() as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));

        for y in 0..side {
            for x in 0..side {
                let inside = y >= pad_y
                    && y < pad_y + new_h as usize
                    && x >= pad_x
                    && x < pad_x + new_w as usize;
                let pixel = if inside {
                    resized.get_pixel((x - pad_x) as u32, (y - pad_y) as u32)[0] as f32
                } else {
                    SCRFD_MEAN
                };
                let normalized = (pixel - SCRFD_MEAN) / SCRFD_STD;
                for c in 0..3 {
                    tensor[[0, c, y, x]] = normalized;
                }
            }
        }

        (tensor, letterbox)
    }
}

impl Detect for FaceDetector {
    /// Detect faces, returning boxes clamped to the frame and sorted by confidence.
    fn detect(
        &mut self,
        luma: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<DetectionBox>, DetectorError> {
        let expected = width as usize * height as usize;
        if width == 0 || height == 0 || luma.len() < expected {
            return Err(DetectorError::InvalidFrame {
                width,
                height,
                actual: luma.len(),
            });
        }
        let frame = GrayImage::from_raw(width, height, luma[..expected].to_vec()).ok_or(
            DetectorError::InvalidFrame {
                width,
                height,
                actual: luma.len(),
            },
        )?;

        let (input, letterbox) = self.preprocess(&frame);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let side = self.input_size as usize;
        let mut all_detections = Vec::new();
        for (stride_pos, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx) = self.stride_indices[stride_pos];

            let (_, scores) = outputs[score_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, bboxes) = outputs[bbox_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;

            all_detections.extend(decode_stride(
                scores,
                bboxes,
                stride,
                side,
                &letterbox,
                self.options.confidence_threshold,
            ));
        }

        let result: Vec<DetectionBox> = nms(all_detections, self.options.nms_threshold)
            .into_iter()
            .filter_map(|d| d.clamped(width as f32, height as f32))
            .collect();

        tracing::trace!(faces = result.len(), width, height, "detect");
        Ok(result)
    }
}

/// Scale and padding that fit a `width` × `height` frame inside a square.
fn letterbox_for(width: u32, height: u32, side: u32) -> (LetterboxInfo, u32, u32) {
    let scale = (side as f32 / width as f32).min(side as f32 / height as f32);
    let new_w = ((width as f32 * scale).round() as u32).clamp(1, side);
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, side);
    let pad_x = (side - new_w) as f32 / 2.0;
    let pad_y = (side - new_h) as f32 / 2.0;
    (LetterboxInfo { scale, pad_x, pad_y }, new_w, new_h)
}

/// Find score/bbox tensors by name ("score_8", "bbox_16", ...), falling back
/// to the standard positional layout [0-2] scores, [3-5] bboxes.
fn discover_output_indices(names: &[String]) -> [StrideOutputIndices; 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let named: Option<Vec<StrideOutputIndices>> = SCRFD_STRIDES
        .iter()
        .map(|&stride| Some((find("score", stride)?, find("bbox", stride)?)))
        .collect();

    match named.as_deref() {
        Some(&[a, b, c]) => [a, b, c],
        _ => {
            tracing::debug!(?names, "SCRFD: output names not recognized, using positional mapping");
            [(0, 3), (1, 4), (2, 5)]
        }
    }
}

/// Decode detections for a single stride level back into frame space.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    stride: usize,
    side: usize,
    letterbox: &LetterboxInfo,
    threshold: f32,
) -> Vec<DetectionBox> {
    let grid = side / stride;
    let num_anchors = grid * grid * SCRFD_ANCHORS_PER_CELL;
    let s = stride as f32;

    let mut detections = Vec::new();
    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= threshold {
            continue;
        }
        let off = idx * 4;
        let Some(d) = bboxes.get(off..off + 4) else {
            continue;
        };

        let cell = idx / SCRFD_ANCHORS_PER_CELL;
        let anchor_x = (cell % grid) as f32 * s;
        let anchor_y = (cell / grid) as f32 * s;

        let x1 = (anchor_x - d[0] * s - letterbox.pad_x) / letterbox.scale;
        let y1 = (anchor_y - d[1] * s - letterbox.pad_y) / letterbox.scale;
        let x2 = (anchor_x + d[2] * s - letterbox.pad_x) / letterbox.scale;
        let y2 = (anchor_y + d[3] * s - letterbox.pad_y) / letterbox.scale;

        detections.push(DetectionBox {
            left: x1,
            top: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: score,
        });
    }
    detections
}

/// Non-Maximum Suppression; output is sorted by descending confidence.
fn nms(mut detections: Vec<DetectionBox>, iou_threshold: f32) -> Vec<DetectionBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<DetectionBox> = Vec::new();
    for det in detections {
        if keep.iter().all(|k| iou(k, &det) <= iou_threshold) {
            keep.push(det);
        }
    }
    keep
}

fn iou(a: &DetectionBox, b: &DetectionBox) -> f32 {
    let inter_w = (a.right().min(b.right()) - a.left.max(b.left)).max(0.0);
    let inter_h = (a.bottom().min(b.bottom()) - a.top.max(b.top)).max(0.0);
    let inter = inter_w * inter_h;
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(left: f32, top: f32, w: f32, h: f32, confidence: f32) -> DetectionBox {
        DetectionBox {
            left,
            top,
            width: w,
            height: h,
            confidence,
        }
    }

    #[test]
    fn test_iou_identical() {
        let a = det(0.0, 0.0, 100.0, 100.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = det(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = det(20.0, 20.0, 10.0, 10.0, 1.0);
        assert!(iou(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_iou_partial() {
        let a = det(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = det(5.0, 0.0, 10.0, 10.0, 1.0);
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let result = nms(
            vec![
                det(5.0, 5.0, 100.0, 100.0, 0.8),
                det(0.0, 0.0, 100.0, 100.0, 0.9),
                det(200.0, 200.0, 50.0, 50.0, 0.7),
            ],
            0.4,
        );
        assert_eq!(result.len(), 2);
        assert!((result[0].confidence - 0.9).abs() < 1e-6);
        assert!((result[1].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(vec![], 0.4).is_empty());
    }

    #[test]
    fn test_letterbox_landscape() {
        let (lb, new_w, new_h) = letterbox_for(640, 320, 320);
        assert_eq!((new_w, new_h), (320, 160));
        assert!((lb.scale - 0.5).abs() < 1e-6);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 80.0);
    }

    #[test]
    fn test_decode_maps_back_to_frame() {
        // 640x320 frame in a 320 input: scale 0.5, pad_y 80.
        let (lb, _, _) = letterbox_for(640, 320, 320);
        let stride = 32;
        let grid = 320 / stride;
        let anchors = grid * grid * SCRFD_ANCHORS_PER_CELL;
        let mut scores = vec![0.0f32; anchors];
        let mut bboxes = vec![0.0f32; anchors * 4];

        // Cell (x=2, y=3): anchor at (64, 96) in network space.
        let idx = (3 * grid + 2) * SCRFD_ANCHORS_PER_CELL;
        scores[idx] = 0.9;
        bboxes[idx * 4..idx * 4 + 4].copy_from_slice(&[1.0, 0.5, 1.0, 0.5]);

        let dets = decode_stride(&scores, &bboxes, stride, 320, &lb, 0.5);
        assert_eq!(dets.len(), 1);
        let d = dets[0];
        // x1 = (64 - 32) / 0.5 = 64, y1 = (96 - 16 - 80) / 0.5 = 0
        assert!((d.left - 64.0).abs() < 1e-4);
        assert!(d.top.abs() < 1e-4);
        assert!((d.width - 128.0).abs() < 1e-4);
        assert!((d.height - 64.0).abs() < 1e-4);
    }

    #[test]
    fn test_decode_respects_threshold() {
        let (lb, _, _) = letterbox_for(320, 320, 320);
        let grid = 320 / 32;
        let anchors = grid * grid * SCRFD_ANCHORS_PER_CELL;
        let scores = vec![0.3f32; anchors];
        let bboxes = vec![1.0f32; anchors * 4];
        assert!(decode_stride(&scores, &bboxes, 32, 320, &lb, 0.5).is_empty());
    }

    #[test]
    fn test_discover_output_indices_named() {
        let names: Vec<String> = [
            "bbox_8", "kps_8", "score_8", "bbox_16", "kps_16", "score_16", "bbox_32", "kps_32",
            "score_32",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(discover_output_indices(&names), [(2, 0), (5, 3), (8, 6)]);
    }

    #[test]
    fn test_discover_output_indices_positional_fallback() {
        let names: Vec<String> = (0..9).map(|i: usize| i.to_string()).collect();
        assert_eq!(discover_output_indices(&names), [(0, 3), (1, 4), (2, 5)]);
    }

    #[test]
    fn test_performance_mode_parse() {
        assert_eq!("FAST".parse::<PerformanceMode>(), Ok(PerformanceMode::Fast));
        assert_eq!(
            "accurate".parse::<PerformanceMode>(),
            Ok(PerformanceMode::Accurate)
        );
        assert!("turbo".parse::<PerformanceMode>().is_err());
    }

    #[test]
    fn test_load_missing_model() {
        let result = FaceDetector::load(
            Path::new("/nonexistent/det_10g.onnx"),
            DetectorOptions::default(),
        );
        assert!(matches!(result, Err(DetectorError::ModelNotFound(_))));
    }
}
