//! Display rotation and buffer re-orientation.
//!
//! Rotation is always clockwise: a frame tagged `Deg90` must be turned 90°
//! clockwise to appear upright on screen.

use image::{imageops, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GeometryError {
    #[error("invalid rotation: {0}° (must be a multiple of 90)")]
    InvalidRotation(i32),
    #[error("unparsable rotation: {0:?}")]
    UnparsableRotation(String),
    #[error("buffer too short for {width}x{height}: expected {expected}, got {actual}")]
    BufferTooShort {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Clockwise rotation needed to display a frame upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Build from a degree value. Multiples of 90 outside [0, 360) are
    /// normalised, so `-90` is `Deg270` and `450` is `Deg90`.
    pub fn from_degrees(degrees: i32) -> Result<Self, GeometryError> {
        if degrees % 90 != 0 {
            return Err(GeometryError::InvalidRotation(degrees));
        }
        Ok(match degrees.rem_euclid(360) {
            0 => Rotation::Deg0,
            90 => Rotation::Deg90,
            180 => Rotation::Deg180,
            _ => Rotation::Deg270,
        })
    }

    pub fn degrees(self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Whether width and height trade places once the rotation is applied.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

impl TryFrom<i32> for Rotation {
    type Error = GeometryError;

    fn try_from(degrees: i32) -> Result<Self, Self::Error> {
        Rotation::from_degrees(degrees)
    }
}

impl From<Rotation> for i32 {
    fn from(rotation: Rotation) -> i32 {
        rotation.degrees()
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

impl std::str::FromStr for Rotation {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches('°');
        let degrees = trimmed
            .parse::<i32>()
            .map_err(|_| GeometryError::UnparsableRotation(s.to_string()))?;
        Rotation::from_degrees(degrees)
    }
}

/// Rotate a grayscale buffer into display orientation.
///
/// The returned image has swapped dimensions for 90°/270°.
pub fn rotate_luma(
    luma: &[u8],
    width: u32,
    height: u32,
    rotation: Rotation,
) -> Result<GrayImage, GeometryError> {
    let expected = width as usize * height as usize;
    if luma.len() < expected {
        return Err(GeometryError::BufferTooShort {
            width,
            height,
            expected,
            actual: luma.len(),
        });
    }
    let upright = GrayImage::from_raw(width, height, luma[..expected].to_vec()).ok_or(
        GeometryError::BufferTooShort {
            width,
            height,
            expected,
            actual: luma.len(),
        },
    )?;
    Ok(match rotation {
        Rotation::Deg0 => upright,
        Rotation::Deg90 => imageops::rotate90(&upright),
        Rotation::Deg180 => imageops::rotate180(&upright),
        Rotation::Deg270 => imageops::rotate270(&upright),
    })
}

/// Rotate an RGB preview frame into display orientation.
pub fn rotate_image(frame: &RgbImage, rotation: Rotation) -> RgbImage {
    match rotation {
        Rotation::Deg0 => frame.clone(),
        Rotation::Deg90 => imageops::rotate90(frame),
        Rotation::Deg180 => imageops::rotate180(frame),
        Rotation::Deg270 => imageops::rotate270(frame),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_degrees_valid() {
        assert_eq!(Rotation::from_degrees(0).unwrap(), Rotation::Deg0);
        assert_eq!(Rotation::from_degrees(90).unwrap(), Rotation::Deg90);
        assert_eq!(Rotation::from_degrees(180).unwrap(), Rotation::Deg180);
        assert_eq!(Rotation::from_degrees(270).unwrap(), Rotation::Deg270);
    }

    #[test]
    fn test_from_degrees_normalises() {
        assert_eq!(Rotation::from_degrees(-90).unwrap(), Rotation::Deg270);
        assert_eq!(Rotation::from_degrees(360).unwrap(), Rotation::Deg0);
        assert_eq!(Rotation::from_degrees(450).unwrap(), Rotation::Deg90);
    }

    #[test]
    fn test_from_degrees_rejects_odd_angles() {
        assert_eq!(
            Rotation::from_degrees(45),
            Err(GeometryError::InvalidRotation(45))
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!("90".parse::<Rotation>().unwrap(), Rotation::Deg90);
        assert_eq!("270°".parse::<Rotation>().unwrap(), Rotation::Deg270);
        assert_eq!(
            "sideways".parse::<Rotation>(),
            Err(GeometryError::UnparsableRotation("sideways".into()))
        );
    }

    #[test]
    fn test_swaps_axes() {
        assert!(!Rotation::Deg0.swaps_axes());
        assert!(Rotation::Deg90.swaps_axes());
        assert!(!Rotation::Deg180.swaps_axes());
        assert!(Rotation::Deg270.swaps_axes());
    }

    #[test]
    fn test_serde_as_degrees() {
        let json = serde_json::to_string(&Rotation::Deg270).unwrap();
        assert_eq!(json, "270");
        let back: Rotation = serde_json::from_str("90").unwrap();
        assert_eq!(back, Rotation::Deg90);
        assert!(serde_json::from_str::<Rotation>("30").is_err());
    }

    #[test]
    fn test_rotate_luma_90_clockwise() {
        // 3x2 source:
        //   1 2 3
        //   4 5 6
        // rotated 90° clockwise (2x3):
        //   4 1
        //   5 2
        //   6 3
        let src = [1, 2, 3, 4, 5, 6];
        let out = rotate_luma(&src, 3, 2, Rotation::Deg90).unwrap();
        assert_eq!(out.dimensions(), (2, 3));
        assert_eq!(out.into_raw(), vec![4, 1, 5, 2, 6, 3]);
    }

    #[test]
    fn test_rotate_luma_180_and_270() {
        let src = [1, 2, 3, 4, 5, 6];
        let r180 = rotate_luma(&src, 3, 2, Rotation::Deg180).unwrap();
        assert_eq!(r180.dimensions(), (3, 2));
        assert_eq!(r180.into_raw(), vec![6, 5, 4, 3, 2, 1]);

        let r270 = rotate_luma(&src, 3, 2, Rotation::Deg270).unwrap();
        assert_eq!(r270.dimensions(), (2, 3));
        assert_eq!(r270.into_raw(), vec![3, 6, 2, 5, 1, 4]);
    }

    #[test]
    fn test_rotate_luma_short_buffer() {
        let result = rotate_luma(&[0u8; 5], 3, 2, Rotation::Deg0);
        assert!(matches!(result, Err(GeometryError::BufferTooShort { .. })));
    }

    #[test]
    fn test_rotate_image_dimensions() {
        let frame = RgbImage::new(40, 30);
        assert_eq!(rotate_image(&frame, Rotation::Deg90).dimensions(), (30, 40));
        assert_eq!(rotate_image(&frame, Rotation::Deg180).dimensions(), (40, 30));
    }
}
