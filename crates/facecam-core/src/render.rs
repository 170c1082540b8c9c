//! Draw the face overlay onto an RGB preview canvas.
//!
//! Boxes are stroked outlines clipped to the canvas. When a face is present a
//! black banner with white text sits centred at the top.

use crate::overlay::OverlayState;
use crate::rotation::{rotate_image, Rotation};
use crate::types::{CanvasRect, CanvasSize};
use image::{imageops, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("canvas must be non-empty, got {0}x{1}")]
    EmptyCanvas(u32, u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    pub box_color: [u8; 3],
    pub stroke_width: u32,
    pub banner_text: String,
    pub banner_top_margin: u32,
    pub banner_padding: u32,
    /// Pixel size of one glyph cell.
    pub text_scale: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            box_color: [0, 255, 0],
            stroke_width: 4,
            banner_text: "FACE DETECTED".to_string(),
            banner_top_margin: 20,
            banner_padding: 10,
            text_scale: 4,
        }
    }
}

/// Rotate a raw frame upright and stretch it onto a `width` × `height` canvas.
pub fn compose_preview(
    frame: &RgbImage,
    rotation: Rotation,
    width: u32,
    height: u32,
) -> Result<RgbImage, RenderError> {
    if width == 0 || height == 0 {
        return Err(RenderError::EmptyCanvas(width, height));
    }
    let upright = rotate_image(frame, rotation);
    if upright.width() == 0 || upright.height() == 0 {
        return Ok(RgbImage::new(width, height));
    }
    Ok(imageops::resize(
        &upright,
        width,
        height,
        imageops::FilterType::Triangle,
    ))
}

/// Draw face boxes and, when a face is present, the banner.
///
/// Returns the number of boxes drawn.
pub fn draw_overlay(canvas: &mut RgbImage, state: &OverlayState, style: &OverlayStyle) -> usize {
    let size = CanvasSize::new(canvas.width() as f32, canvas.height() as f32);
    let rects = state.canvas_rects(size);
    let color = Rgb(style.box_color);
    for rect in &rects {
        stroke_rect(canvas, rect, color, style.stroke_width);
    }
    if state.face_detected {
        draw_banner(canvas, style);
    }
    rects.len()
}

fn stroke_rect(canvas: &mut RgbImage, rect: &CanvasRect, color: Rgb<u8>, thickness: u32) {
    if !(rect.width > 0.0 && rect.height > 0.0) {
        return;
    }
    let x1 = rect.left.round() as i64;
    let y1 = rect.top.round() as i64;
    // Sub-pixel boxes still get a 1 px outline.
    let x2 = ((rect.left + rect.width).round() as i64 - 1).max(x1);
    let y2 = ((rect.top + rect.height).round() as i64 - 1).max(y1);
    let t = thickness.max(1) as i64;

    // Stroke grows inward so the outline never exceeds the mapped box.
    fill_rect(canvas, x1, y1, x2, (y1 + t - 1).min(y2), color);
    fill_rect(canvas, x1, (y2 - t + 1).max(y1), x2, y2, color);
    fill_rect(canvas, x1, y1, (x1 + t - 1).min(x2), y2, color);
    fill_rect(canvas, (x2 - t + 1).max(x1), y1, x2, y2, color);
}

/// Fill an inclusive rectangle, clipped to the canvas.
fn fill_rect(canvas: &mut RgbImage, x1: i64, y1: i64, x2: i64, y2: i64, color: Rgb<u8>) {
    let (w, h) = (canvas.width() as i64, canvas.height() as i64);
    let (x1, y1) = (x1.max(0), y1.max(0));
    let (x2, y2) = (x2.min(w - 1), y2.min(h - 1));
    for y in y1..=y2 {
        for x in x1..=x2 {
            canvas.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// Banner box width, height and glyph advance for `chars` glyphs, or `None`
/// when there is nothing to draw or the layout does not fit in `u32`.
fn banner_layout(chars: usize, style: &OverlayStyle) -> Option<(u32, u32, u32)> {
    let chars = u32::try_from(chars).ok().filter(|&c| c > 0)?;
    let scale = style.text_scale.max(1);
    let text_h = GLYPH_SIZE.checked_mul(scale)?;
    let step = text_h.checked_add(scale)?;
    let text_w = chars.checked_mul(step)? - scale;
    let padding = style.banner_padding.checked_mul(2)?;
    Some((text_w.checked_add(padding)?, text_h.checked_add(padding)?, step))
}

fn draw_banner(canvas: &mut RgbImage, style: &OverlayStyle) {
    let text = style.banner_text.to_uppercase();
    let Some((box_w, box_h, step)) = banner_layout(text.chars().count(), style) else {
        tracing::debug!(
            text_scale = style.text_scale,
            padding = style.banner_padding,
            "banner skipped"
        );
        return;
    };
    let scale = style.text_scale.max(1);

    let x0 = (canvas.width() as i64 - box_w as i64) / 2;
    let y0 = style.banner_top_margin as i64;
    let corner = (style.banner_padding / 2) as i64;

    let black = Rgb([0, 0, 0]);
    // Rounded corners approximated by trimming the corner squares.
    fill_rect(canvas, x0 + corner, y0, x0 + box_w as i64 - 1 - corner, y0 + box_h as i64 - 1, black);
    fill_rect(canvas, x0, y0 + corner, x0 + box_w as i64 - 1, y0 + box_h as i64 - 1 - corner, black);

    let tx = x0 + style.banner_padding as i64;
    let ty = y0 + style.banner_padding as i64;
    for (i, c) in text.chars().enumerate() {
        draw_glyph(canvas, c, tx + i as i64 * step as i64, ty, Rgb([255, 255, 255]), scale);
    }
}

fn draw_glyph(canvas: &mut RgbImage, c: char, px: i64, py: i64, color: Rgb<u8>, scale: u32) {
    let Some(glyph) = glyph_for(c) else {
        return;
    };
    let s = scale as i64;
    for (row, bits) in glyph.iter().enumerate() {
        for bit in 0..GLYPH_SIZE as i64 {
            if (bits >> (GLYPH_SIZE as i64 - 1 - bit)) & 1 == 0 {
                continue;
            }
            let x = px + bit * s;
            let y = py + row as i64 * s;
            fill_rect(canvas, x, y, x + s - 1, y + s - 1, color);
        }
    }
}

const GLYPH_SIZE: u32 = 5;

fn glyph_for(c: char) -> Option<[u8; 5]> {
    match c {
        '0'..='9' => Some(FONT_5X5[(c as u8 - b'0') as usize]),
        'A'..='Z' => Some(FONT_5X5[10 + (c as u8 - b'A') as usize]),
        '!' => Some([0b00100, 0b00100, 0b00100, 0b00000, 0b00100]),
        '.' => Some([0b00000, 0b00000, 0b00000, 0b00000, 0b00100]),
        ':' => Some([0b00000, 0b00100, 0b00000, 0b00100, 0b00000]),
        '-' => Some([0b00000, 0b00000, 0b01110, 0b00000, 0b00000]),
        ' ' => Some([0; 5]),
        _ => None,
    }
}

/// 5×5 bitmap font: digits 0-9, then letters A-Z.
const FONT_5X5: [[u8; 5]; 36] = [
    [0b01110, 0b10001, 0b10001, 0b10001, 0b01110],
    [0b00100, 0b01100, 0b00100, 0b00100, 0b01110],
    [0b01110, 0b10001, 0b00110, 0b01000, 0b11111],
    [0b11110, 0b00001, 0b00110, 0b00001, 0b11110],
    [0b00110, 0b01010, 0b10010, 0b11111, 0b00010],
    [0b11111, 0b10000, 0b11110, 0b00001, 0b11110],
    [0b01110, 0b10000, 0b11110, 0b10001, 0b01110],
    [0b11111, 0b00001, 0b00010, 0b00100, 0b00100],
    [0b01110, 0b10001, 0b01110, 0b10001, 0b01110],
    [0b01110, 0b10001, 0b01111, 0b00001, 0b01110],
    [0b01110, 0b10001, 0b11111, 0b10001, 0b10001],
    [0b11110, 0b10001, 0b11110, 0b10001, 0b11110],
    [0b01110, 0b10000, 0b10000, 0b10000, 0b01110],
    [0b11100, 0b10010, 0b10001, 0b10010, 0b11100],
    [0b11111, 0b10000, 0b11110, 0b10000, 0b11111],
    [0b11111, 0b10000, 0b11110, 0b10000, 0b10000],
    [0b01110, 0b10000, 0b10011, 0b10001, 0b01110],
    [0b10001, 0b10001, 0b11111, 0b10001, 0b10001],
    [0b01110, 0b00100, 0b00100, 0b00100, 0b01110],
    [0b00111, 0b00010, 0b00010, 0b10010, 0b01100],
    [0b10001, 0b10010, 0b11100, 0b10010, 0b10001],
    [0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
    [0b10001, 0b11011, 0b10101, 0b10001, 0b10001],
    [0b10001, 0b11001, 0b10101, 0b10011, 0b10001],
    [0b01110, 0b10001, 0b10001, 0b10001, 0b01110],
    [0b11110, 0b10001, 0b11110, 0b10000, 0b10000],
    [0b01110, 0b10001, 0b10101, 0b10010, 0b01101],
    [0b11110, 0b10001, 0b11110, 0b10010, 0b10001],
    [0b01111, 0b10000, 0b01110, 0b00001, 0b11110],
    [0b11111, 0b00100, 0b00100, 0b00100, 0b00100],
    [0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
    [0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
    [0b10001, 0b10001, 0b10101, 0b11011, 0b10001],
    [0b10001, 0b01010, 0b00100, 0b01010, 0b10001],
    [0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
    [0b11111, 0b00010, 0b00100, 0b01000, 0b11111],
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DetectionBox, FrameGeometry};

    const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
    const GREY: Rgb<u8> = Rgb([50, 50, 50]);

    fn grey_canvas(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, GREY)
    }

    fn state_with(faces: Vec<DetectionBox>, geometry: FrameGeometry) -> OverlayState {
        OverlayState {
            face_detected: !faces.is_empty(),
            faces,
            geometry,
            generation: 1,
        }
    }

    #[test]
    fn test_box_outline_drawn_at_mapped_position() {
        // 100x100 frame onto a 200x200 canvas: box (10,10,20,20) → (20,20,40,40).
        let mut canvas = grey_canvas(200, 200);
        let state = state_with(
            vec![DetectionBox::new(10.0, 10.0, 20.0, 20.0)],
            FrameGeometry::new(100, 100, Rotation::Deg0),
        );
        let style = OverlayStyle {
            banner_text: String::new(),
            ..OverlayStyle::default()
        };
        assert_eq!(draw_overlay(&mut canvas, &state, &style), 1);

        assert_eq!(*canvas.get_pixel(20, 20), GREEN);
        assert_eq!(*canvas.get_pixel(59, 59), GREEN);
        assert_eq!(*canvas.get_pixel(23, 40), GREEN);
        // Interior and exterior untouched.
        assert_eq!(*canvas.get_pixel(40, 40), GREY);
        assert_eq!(*canvas.get_pixel(19, 19), GREY);
        assert_eq!(*canvas.get_pixel(60, 60), GREY);
    }

    #[test]
    fn test_no_frame_draws_nothing() {
        let mut canvas = grey_canvas(50, 50);
        let mut state = state_with(
            vec![DetectionBox::new(0.0, 0.0, 10.0, 10.0)],
            FrameGeometry::EMPTY,
        );
        state.face_detected = false;
        assert_eq!(draw_overlay(&mut canvas, &state, &OverlayStyle::default()), 0);
        assert!(canvas.pixels().all(|p| *p == GREY));
    }

    #[test]
    fn test_banner_only_when_face_detected() {
        let geometry = FrameGeometry::new(100, 100, Rotation::Deg0);
        let style = OverlayStyle::default();

        let mut without = grey_canvas(400, 200);
        draw_overlay(&mut without, &state_with(Vec::new(), geometry), &style);
        assert!(without.pixels().all(|p| *p == GREY));

        let mut with = grey_canvas(400, 200);
        draw_overlay(
            &mut with,
            &state_with(vec![DetectionBox::new(60.0, 60.0, 10.0, 10.0)], geometry),
            &style,
        );
        // Banner background sits just below the top margin, centred.
        let probe_y = style.banner_top_margin + style.banner_padding / 2 + 1;
        assert_eq!(*with.get_pixel(200, probe_y), Rgb([0, 0, 0]));
        assert!(with.pixels().any(|p| *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn test_box_clipped_at_canvas_edge() {
        let mut canvas = grey_canvas(100, 100);
        let state = state_with(
            vec![DetectionBox::new(90.0, 90.0, 20.0, 20.0)],
            FrameGeometry::new(100, 100, Rotation::Deg0),
        );
        let style = OverlayStyle {
            banner_text: String::new(),
            ..OverlayStyle::default()
        };
        draw_overlay(&mut canvas, &state, &style);
        assert_eq!(*canvas.get_pixel(90, 90), GREEN);
        assert_eq!(*canvas.get_pixel(99, 90), GREEN);
    }

    #[test]
    fn test_sub_pixel_box_still_outlined() {
        // 1000x1000 frame onto a 100x100 canvas: box (500,500,3,3) → 0.3 px wide.
        let mut canvas = grey_canvas(100, 100);
        let state = state_with(
            vec![DetectionBox::new(500.0, 500.0, 3.0, 3.0)],
            FrameGeometry::new(1000, 1000, Rotation::Deg0),
        );
        let style = OverlayStyle {
            banner_text: String::new(),
            ..OverlayStyle::default()
        };
        assert_eq!(draw_overlay(&mut canvas, &state, &style), 1);
        assert_eq!(*canvas.get_pixel(50, 50), GREEN);
        assert_eq!(canvas.pixels().filter(|p| **p == GREEN).count(), 1);
    }

    #[test]
    fn test_oversized_banner_is_skipped() {
        let mut canvas = grey_canvas(400, 200);
        let state = state_with(
            vec![DetectionBox::new(60.0, 60.0, 10.0, 10.0)],
            FrameGeometry::new(100, 100, Rotation::Deg0),
        );
        let style = OverlayStyle {
            text_scale: 1_000_000_000,
            banner_padding: u32::MAX,
            ..OverlayStyle::default()
        };
        assert_eq!(draw_overlay(&mut canvas, &state, &style), 1);
        assert!(canvas.pixels().all(|p| *p == GREY || *p == GREEN));
        assert!(banner_layout(13, &style).is_none());
    }

    #[test]
    fn test_banner_sized_from_uppercased_text() {
        // "ß" uppercases to "SS": the box must cover both glyphs.
        let mut canvas = grey_canvas(400, 200);
        let mut state = state_with(Vec::new(), FrameGeometry::new(100, 100, Rotation::Deg0));
        state.face_detected = true;
        let style = OverlayStyle {
            banner_text: "ß".to_string(),
            ..OverlayStyle::default()
        };
        draw_overlay(&mut canvas, &state, &style);

        let columns = |color: Rgb<u8>| {
            let xs: Vec<u32> = canvas
                .enumerate_pixels()
                .filter(|(_, _, p)| **p == color)
                .map(|(x, _, _)| x)
                .collect();
            (xs.iter().min().copied(), xs.iter().max().copied())
        };
        let (black_min, black_max) = columns(Rgb([0, 0, 0]));
        let (white_min, white_max) = columns(Rgb([255, 255, 255]));
        assert!(white_min.is_some());
        assert!(white_min > black_min);
        assert!(white_max < black_max);
    }

    #[test]
    fn test_compose_preview_rotates_and_scales() {
        let frame = RgbImage::from_pixel(40, 20, GREY);
        let out = compose_preview(&frame, Rotation::Deg90, 60, 120).unwrap();
        assert_eq!(out.dimensions(), (60, 120));
        assert_eq!(*out.get_pixel(30, 60), GREY);
    }

    #[test]
    fn test_compose_preview_rejects_empty_canvas() {
        let frame = RgbImage::new(4, 4);
        assert!(matches!(
            compose_preview(&frame, Rotation::Deg0, 0, 10),
            Err(RenderError::EmptyCanvas(0, 10))
        ));
    }

    #[test]
    fn test_glyph_lookup() {
        assert!(glyph_for('F').is_some());
        assert!(glyph_for('7').is_some());
        assert!(glyph_for('~').is_none());
    }
}
