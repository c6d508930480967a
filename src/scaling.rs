//! Per-channel conversion from native sensor units to display-ready buffers
//!
//! Linear transforms are rounded to nearest and saturated into the target
//! range, so out-of-range inputs clamp instead of wrapping.

use crate::display::{DisplayFormat, DisplayFrame};
use crate::sensor::Image;

/// Depth that maps to black, millimetres
pub const DEPTH_DISPLAY_RANGE_MM: f64 = 5000.0;

const DEPTH_ALPHA: f64 = -255.0 / DEPTH_DISPLAY_RANGE_MM;
const DEPTH_BETA: f64 = 255.0;
const INFRARED_ALPHA: f64 = 0.5;

fn saturate_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Near is bright: 0 mm → 255, 5000 mm and beyond → 0
pub fn scale_depth(raw: u16) -> u8 {
    saturate_u8(raw as f64 * DEPTH_ALPHA + DEPTH_BETA)
}

/// Half intensity; 510 and above saturate at 255
pub fn scale_infrared(raw: u16) -> u8 {
    saturate_u8(raw as f64 * INFRARED_ALPHA)
}

fn scale_u16(image: &Image, scale: fn(u16) -> u8) -> DisplayFrame {
    let data: Vec<u8> = image.u16_samples().map(scale).collect();
    DisplayFrame::new(DisplayFormat::Gray8, image.width(), image.height(), data)
}

pub fn depth_to_display(image: &Image) -> DisplayFrame {
    scale_u16(image, scale_depth)
}

pub fn infrared_to_display(image: &Image) -> DisplayFrame {
    scale_u16(image, scale_infrared)
}

/// BGRA is already displayable; the pixel buffer is shared, not copied
pub fn color_to_display(image: &Image) -> DisplayFrame {
    if image.stride() == image.width() * 4 {
        return DisplayFrame::new(
            DisplayFormat::Bgra32,
            image.width(),
            image.height(),
            image.data().slice(..image.pixel_count() * 4),
        );
    }
    let data: Vec<u8> = image.bgra_pixels().flatten().collect();
    DisplayFrame::new(DisplayFormat::Bgra32, image.width(), image.height(), data)
}

/// BGRA byte order to RGB in [0.0, 1.0]; alpha is dropped
pub fn bgra_to_unit_rgb([b, g, r, _a]: [u8; 4]) -> [f32; 3] {
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
}

/// Flatten a BGRA image into row-major unit RGB colors
pub fn point_colors(image: &Image) -> Vec<[f32; 3]> {
    image.bgra_pixels().map(bgra_to_unit_rgb).collect()
}

/// Flatten an XYZ image into row-major points, invalid (0,0,0) points included
pub fn point_positions(image: &Image) -> Vec<[f32; 3]> {
    image
        .xyz_points()
        .map(|[x, y, z]| [x as f32, y as f32, z as f32])
        .collect()
}
