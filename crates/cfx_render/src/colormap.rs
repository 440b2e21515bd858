//! Heat-map rendering for perturbation and difference maps.

use cfx_core::ImageData;
use image::{Rgb, RgbImage};

/// "Hot" colormap: black, red, yellow, white as `t` goes from 0 to 1.
pub fn hot(t: f32) -> Rgb<u8> {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let channel = |offset: f32| ((t * 3.0 - offset).clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgb([channel(0.0), channel(1.0), channel(2.0)])
}

/// Per-pixel magnitude of a map, averaged over channels and scaled so the
/// largest value is 1. An all-zero map stays zero.
pub fn magnitude(map: &ImageData) -> Vec<f32> {
    let shape = map.shape();
    let plane = shape.height() * shape.width();
    let channels = shape.channels().max(1) as f32;

    let mut out = vec![0.0f32; plane];
    for (i, value) in map.values().iter().enumerate() {
        out[i % plane] += value.abs() / channels;
    }

    let max = out.iter().copied().fold(0.0f32, f32::max);
    if max > 0.0 {
        for v in &mut out {
            *v /= max;
        }
    }
    out
}

/// Render a signed or absolute map as a heat map.
pub fn heatmap(map: &ImageData) -> RgbImage {
    let shape = map.shape();
    let width = shape.width() as u32;
    let values = magnitude(map);
    RgbImage::from_fn(width, shape.height() as u32, |x, y| {
        hot(values[(y * width + x) as usize])
    })
}
