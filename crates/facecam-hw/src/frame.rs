//! Frame type and pixel conversion.

/// A captured grayscale camera frame in raw sensor orientation.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Grayscale pixel data (width * height bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
    pub is_dark: bool,
}

impl Frame {
    /// Expand to packed RGB (R=G=B=Y) for preview compositing.
    pub fn to_rgb(&self) -> Vec<u8> {
        self.data.iter().flat_map(|&y| [y, y, y]).collect()
    }
}

/// Convert packed YUYV (4:2:2) to grayscale by extracting the Y channel.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V].
pub fn yuyv_to_grayscale(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = width as usize * height as usize * 2;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }
    Ok(yuyv[..expected].iter().step_by(2).copied().collect())
}

/// Downscale 16-bit little-endian grayscale to 8 bits.
pub fn y16_to_grayscale(y16: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = width as usize * height as usize;
    if y16.len() < pixels * 2 {
        return Err(FrameError::InvalidLength {
            expected: pixels * 2,
            actual: y16.len(),
        });
    }
    // High byte of each little-endian sample.
    Ok(y16[..pixels * 2].chunks_exact(2).map(|px| px[1]).collect())
}

/// True if more than `threshold_pct` of pixels fall in the darkest bucket (0–31).
pub fn is_dark_frame(gray: &[u8], threshold_pct: f32) -> bool {
    if gray.is_empty() {
        return true;
    }
    let dark_count = gray.iter().filter(|&&p| p < 32).count();
    (dark_count as f32 / gray.len() as f32) > threshold_pct
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
