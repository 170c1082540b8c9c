use anyhow::{Context, Result};
use facecam_core::mapper::effective_dimensions;
use facecam_core::render::{compose_preview, draw_overlay};
use facecam_core::{FrameGeometry, OverlayState};
use facecam_hw::access::{check_access, remediation};
use image::RgbImage;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::engine::{spawn_engine, EngineSettings};

pub struct PreviewArgs {
    pub output: PathBuf,
    /// Stop after this many analyzed frames; `None` runs until Ctrl-C.
    pub max_frames: Option<u64>,
}

/// Live preview: capture, detect, draw, and keep `output` updated with the
/// latest composited canvas.
pub async fn run(config: Config, args: PreviewArgs) -> Result<()> {
    let device = Path::new(&config.camera_device);
    let access = check_access(device);
    if let Some(hint) = remediation(device, access) {
        anyhow::bail!("camera {access}: {hint}");
    }

    let (mut reports, (frame_w, frame_h)) = spawn_engine(EngineSettings {
        camera_device: config.camera_device.clone(),
        capture_width: config.capture_width,
        capture_height: config.capture_height,
        rotation: config.rotation,
        warmup_frames: config.warmup_frames,
        model_path: config.model_path(),
        detector: config.detector,
    })
    .context("starting capture engine")?;

    let (canvas_w, canvas_h) = config.canvas.unwrap_or_else(|| {
        effective_dimensions(&FrameGeometry::new(frame_w, frame_h, config.rotation))
    });
    tracing::info!(
        canvas_width = canvas_w,
        canvas_height = canvas_h,
        output = %args.output.display(),
        "preview running (Ctrl-C to stop)"
    );

    let mut state = OverlayState::new();
    let mut frames = 0u64;
    let mut was_detected = false;

    loop {
        let report = tokio::select! {
            report = reports.recv() => report,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        };
        let Some(report) = report else {
            anyhow::bail!("capture stopped unexpectedly");
        };

        let sequence = report.sequence;
        let rgb = report.apply_to(&mut state);
        let Some(raw) = RgbImage::from_raw(frame_w, frame_h, rgb) else {
            tracing::warn!(seq = sequence, "preview buffer size mismatch, skipping frame");
            continue;
        };

        if state.face_detected != was_detected {
            tracing::info!(
                seq = sequence,
                faces = state.faces.len(),
                "{}",
                if state.face_detected { "face detected" } else { "face lost" }
            );
            was_detected = state.face_detected;
        }

        let mut canvas = compose_preview(&raw, config.rotation, canvas_w, canvas_h)?;
        draw_overlay(&mut canvas, &state, &config.style);
        save_atomically(&canvas, &args.output)?;

        frames += 1;
        if args.max_frames.is_some_and(|max| frames >= max) {
            tracing::info!(frames, "frame budget reached");
            break;
        }
    }

    Ok(())
}

/// Write to a sibling temp file and rename, so viewers never see a partial PNG.
pub fn save_atomically(canvas: &RgbImage, output: &Path) -> Result<()> {
    let mut tmp = output.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    canvas
        .save_with_format(&tmp, image::ImageFormat::Png)
        .with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, output).with_context(|| format!("replacing {}", output.display()))?;
    Ok(())
}
