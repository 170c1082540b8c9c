use anyhow::{Context, Result};
use facecam_core::{DetectorOptions, OverlayStyle, PerformanceMode, Rotation};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Optional settings read from `config.toml`. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    camera_device: Option<String>,
    capture_width: Option<u32>,
    capture_height: Option<u32>,
    rotation: Option<Rotation>,
    model_dir: Option<PathBuf>,
    performance_mode: Option<PerformanceMode>,
    confidence_threshold: Option<f32>,
    canvas_width: Option<u32>,
    canvas_height: Option<u32>,
    warmup_frames: Option<usize>,
    overlay: Option<OverlayStyle>,
}

/// Preview configuration: defaults, then the TOML file, then `FACECAM_*`
/// environment variables. Command-line flags are applied by the caller.
#[derive(Debug, Clone)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    pub capture_width: u32,
    pub capture_height: u32,
    /// Clockwise rotation that makes captured frames upright.
    pub rotation: Rotation,
    /// Directory containing the SCRFD model.
    pub model_dir: PathBuf,
    pub detector: DetectorOptions,
    /// Canvas size; `None` uses the rotated frame size.
    pub canvas: Option<(u32, u32)>,
    /// Frames discarded at startup while auto exposure settles.
    pub warmup_frames: usize,
    pub style: OverlayStyle,
}

impl Config {
    /// Load from `FACECAM_CONFIG` or the XDG config dir, then the environment.
    pub fn load() -> Result<Self> {
        let path = std::env::var("FACECAM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| xdg_dir("XDG_CONFIG_HOME", ".config").join("config.toml"));
        let file = read_file_config(&path)?;
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut detector = DetectorOptions::default();
        if let Some(mode) = file.performance_mode {
            detector.performance_mode = mode;
        }
        if let Some(t) = file.confidence_threshold {
            detector.confidence_threshold = t;
        }
        if let Some(mode) = env("FACECAM_PERFORMANCE_MODE") {
            detector.performance_mode = mode
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("FACECAM_PERFORMANCE_MODE")?;
        }
        if let Some(t) = env_parse::<f32>(&env, "FACECAM_CONFIDENCE_THRESHOLD")? {
            detector.confidence_threshold = t;
        }

        let rotation = match env("FACECAM_ROTATION") {
            Some(v) => v.parse().context("FACECAM_ROTATION")?,
            None => file.rotation.unwrap_or_default(),
        };

        let canvas_width = env_parse(&env, "FACECAM_CANVAS_WIDTH")?.or(file.canvas_width);
        let canvas_height = env_parse(&env, "FACECAM_CANVAS_HEIGHT")?.or(file.canvas_height);
        let canvas = match (canvas_width, canvas_height) {
            (Some(w), Some(h)) => Some((w, h)),
            (None, None) => None,
            _ => anyhow::bail!("canvas width and height must be set together"),
        };

        Ok(Self {
            camera_device: env("FACECAM_CAMERA_DEVICE")
                .or(file.camera_device)
                .unwrap_or_else(|| "/dev/video0".to_string()),
            capture_width: env_parse(&env, "FACECAM_CAPTURE_WIDTH")?
                .or(file.capture_width)
                .unwrap_or(640),
            capture_height: env_parse(&env, "FACECAM_CAPTURE_HEIGHT")?
                .or(file.capture_height)
                .unwrap_or(480),
            rotation,
            model_dir: env("FACECAM_MODEL_DIR")
                .map(PathBuf::from)
                .or(file.model_dir)
                .unwrap_or_else(|| xdg_dir("XDG_DATA_HOME", ".local/share").join("models")),
            detector,
            canvas,
            warmup_frames: env_parse(&env, "FACECAM_WARMUP_FRAMES")?
                .or(file.warmup_frames)
                .unwrap_or(4),
            style: file.overlay.unwrap_or_default(),
        })
    }

    /// Path to the SCRFD detection model.
    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(facecam_core::detector::SCRFD_MODEL_FILE)
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            tracing::debug!(path = %path.display(), "loaded config file");
            toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

fn env_parse<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    env(key)
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| anyhow::anyhow!("{key}={v}: {e}"))
        })
        .transpose()
}

/// `$XDG_*/facecam`, falling back to `$HOME/<fallback>/facecam`.
fn xdg_dir(var: &str, fallback: &str) -> PathBuf {
    std::env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(fallback)
        })
        .join("facecam")
}
