use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facecam_core::mapper::{effective_dimensions, map_box, normalize};
use facecam_core::render::{compose_preview, draw_overlay};
use facecam_core::{
    AnalysisOutcome, CanvasSize, DetectionBox, FaceDetector, FrameAnalyzer, FrameGeometry,
    LumaFrame, OverlayState, PerformanceMode, Rotation,
};
use facecam_hw::Camera;
use std::path::PathBuf;

mod config;
mod engine;
mod preview;

use config::Config;

#[derive(Parser)]
#[command(name = "facecam", about = "Live camera preview with face-detection overlay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the live preview, writing the latest annotated frame to a PNG
    Preview {
        /// V4L2 device (overrides config)
        #[arg(short, long)]
        device: Option<String>,
        /// Clockwise rotation that makes frames upright: 0, 90, 180 or 270
        #[arg(short, long)]
        rotation: Option<Rotation>,
        /// Canvas size as WIDTHxHEIGHT
        #[arg(short, long, value_parser = parse_size)]
        canvas: Option<(u32, u32)>,
        /// Detector performance mode: fast or accurate
        #[arg(short, long)]
        mode: Option<PerformanceMode>,
        /// Stop after this many analyzed frames
        #[arg(short, long)]
        frames: Option<u64>,
        /// Where to write the composited preview
        #[arg(short, long, default_value = "facecam-preview.png")]
        output: PathBuf,
    },
    /// Detect faces in a still image and draw the overlay
    Detect {
        /// Input image (raw sensor orientation)
        image: PathBuf,
        /// Clockwise rotation that makes the image upright
        #[arg(short, long, default_value = "0")]
        rotation: Rotation,
        /// Canvas size as WIDTHxHEIGHT (default: rotated image size)
        #[arg(short, long, value_parser = parse_size)]
        canvas: Option<(u32, u32)>,
        /// Detector performance mode: fast or accurate
        #[arg(short, long)]
        mode: Option<PerformanceMode>,
        /// Annotated output PNG
        #[arg(short, long, default_value = "facecam-detect.png")]
        output: PathBuf,
    },
    /// Map a detection box from frame space onto a canvas
    Map {
        /// Frame size as WIDTHxHEIGHT
        #[arg(long, value_parser = parse_size)]
        frame: (u32, u32),
        /// Frame rotation in degrees
        #[arg(long, default_value = "0")]
        rotation: Rotation,
        /// Canvas size as WIDTHxHEIGHT
        #[arg(long, value_parser = parse_size)]
        canvas: (u32, u32),
        /// Box as LEFT,TOP,WIDTH,HEIGHT in frame pixels
        #[arg(long = "box", value_parser = parse_box)]
        detection: DetectionBox,
    },
    /// List capture devices and whether this user may open them
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Preview {
            device,
            rotation,
            canvas,
            mode,
            frames,
            output,
        } => {
            let mut config = Config::load()?;
            if let Some(device) = device {
                config.camera_device = device;
            }
            if let Some(rotation) = rotation {
                config.rotation = rotation;
            }
            if canvas.is_some() {
                config.canvas = canvas;
            }
            if let Some(mode) = mode {
                config.detector.performance_mode = mode;
            }
            preview::run(
                config,
                preview::PreviewArgs {
                    output,
                    max_frames: frames,
                },
            )
            .await?;
        }
        Commands::Detect {
            image,
            rotation,
            canvas,
            mode,
            output,
        } => {
            let mut config = Config::load()?;
            if let Some(mode) = mode {
                config.detector.performance_mode = mode;
            }
            run_detect(&config, &image, rotation, canvas, &output)?;
        }
        Commands::Map {
            frame,
            rotation,
            canvas,
            detection,
        } => {
            let geometry = FrameGeometry::new(frame.0, frame.1, rotation);
            let canvas = CanvasSize::new(canvas.0 as f32, canvas.1 as f32);
            let (eff_w, eff_h) = effective_dimensions(&geometry);
            let summary = serde_json::json!({
                "effective_frame": { "width": eff_w, "height": eff_h },
                "normalized": normalize(&detection, &geometry),
                "canvas_rect": map_box(&detection, &geometry, canvas),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for d in devices {
                println!("{}\t{}\t{}\taccess: {}", d.path, d.name, d.driver, d.access);
            }
        }
    }

    Ok(())
}

fn run_detect(
    config: &Config,
    image_path: &std::path::Path,
    rotation: Rotation,
    canvas: Option<(u32, u32)>,
    output: &std::path::Path,
) -> Result<()> {
    let img = image::open(image_path)
        .with_context(|| format!("opening {}", image_path.display()))?;
    let raw_rgb = img.to_rgb8();
    let luma = img.to_luma8();
    let (width, height) = luma.dimensions();

    let model_path = config.model_path();
    let detector = FaceDetector::load(&model_path, config.detector)
        .with_context(|| format!("loading detector from {}", model_path.display()))?;
    let mut analyzer = FrameAnalyzer::new(detector);
    let mut state = OverlayState::new();

    let outcome = analyzer.analyze(
        LumaFrame {
            data: luma.into_raw(),
            width,
            height,
            rotation,
        },
        &mut state,
    );
    if outcome == AnalysisOutcome::Failed {
        tracing::warn!("detection failed; writing preview without boxes");
    }

    let (canvas_w, canvas_h) =
        canvas.unwrap_or_else(|| effective_dimensions(&FrameGeometry::new(width, height, rotation)));
    let mut out = compose_preview(&raw_rgb, rotation, canvas_w, canvas_h)?;
    let drawn = draw_overlay(&mut out, &state, &config.style);
    preview::save_atomically(&out, output)?;

    let summary = serde_json::json!({
        "image": image_path.display().to_string(),
        "frame": state.geometry,
        "face_detected": state.face_detected,
        "faces": state.faces,
        "canvas": { "width": canvas_w, "height": canvas_h },
        "canvas_rects": state.canvas_rects(CanvasSize::new(canvas_w as f32, canvas_h as f32)),
        "boxes_drawn": drawn,
        "output": output.display().to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Parse `WIDTHxHEIGHT` with both parts non-zero.
fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("width: {e}"))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("height: {e}"))?;
    if w == 0 || h == 0 {
        return Err(format!("size must be non-zero, got {w}x{h}"));
    }
    Ok((w, h))
}

/// Parse `LEFT,TOP,WIDTH,HEIGHT`.
fn parse_box(s: &str) -> Result<DetectionBox, String> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        &[left, top, width, height] if width >= 0.0 && height >= 0.0 => {
            Ok(DetectionBox::new(left, top, width, height))
        }
        &[_, _, _, _] => Err("box width and height must be non-negative".to_string()),
        _ => Err(format!("expected LEFT,TOP,WIDTH,HEIGHT, got {s:?}")),
    }
}
