//! Conversion between encoded image files and `(C, H, W)` host buffers.

use std::io::Cursor;
use std::path::Path;

use cfx_core::{ImageData, ImageShape};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageOutputFormat, RgbImage};

use crate::error::{RenderError, Result};

/// Decode image bytes and resize them to `shape`.
///
/// One-channel shapes are converted to luma, three-channel shapes to RGB.
/// Values are scaled to `[0, 1]`.
pub fn decode_image(bytes: &[u8], shape: ImageShape) -> Result<ImageData> {
    let img = image::load_from_memory(bytes).map_err(|e| RenderError::Decode(e.to_string()))?;
    from_dynamic(&img, shape)
}

/// Read and decode an image file.
pub fn load_image(path: impl AsRef<Path>, shape: ImageShape) -> Result<ImageData> {
    let bytes = std::fs::read(path)?;
    decode_image(&bytes, shape)
}

/// Resize a decoded image to `shape` and lay it out channel-first.
pub fn from_dynamic(img: &DynamicImage, shape: ImageShape) -> Result<ImageData> {
    let (width, height) = (shape.width() as u32, shape.height() as u32);
    let resized = img.resize_exact(width, height, FilterType::Triangle);

    let values: Vec<f32> = match shape.channels() {
        1 => resized
            .to_luma8()
            .pixels()
            .map(|p| f32::from(p.0[0]) / 255.0)
            .collect(),
        3 => {
            let rgb = resized.to_rgb8();
            let plane = shape.height() * shape.width();
            let mut values = vec![0.0; shape.numel()];
            for (i, p) in rgb.pixels().enumerate() {
                for c in 0..3 {
                    values[c * plane + i] = f32::from(p.0[c]) / 255.0;
                }
            }
            values
        }
        other => return Err(RenderError::UnsupportedChannels(other)),
    };

    Ok(ImageData::new(shape, values)?)
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Convert a `[0, 1]` buffer to an 8-bit image. Out-of-range values are clamped.
pub fn to_dynamic(data: &ImageData) -> Result<DynamicImage> {
    let shape = data.shape();
    let (width, height) = (shape.width() as u32, shape.height() as u32);
    let plane = shape.height() * shape.width();

    match shape.channels() {
        1 => {
            let pixels = data.values().iter().map(|&v| to_byte(v)).collect();
            GrayImage::from_raw(width, height, pixels)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| RenderError::ShapeMismatch(format!("buffer does not match {shape}")))
        }
        3 => {
            let values = data.values();
            let mut pixels = Vec::with_capacity(plane * 3);
            for i in 0..plane {
                for c in 0..3 {
                    pixels.push(to_byte(values[c * plane + i]));
                }
            }
            RgbImage::from_raw(width, height, pixels)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| RenderError::ShapeMismatch(format!("buffer does not match {shape}")))
        }
        other => Err(RenderError::UnsupportedChannels(other)),
    }
}

/// Encode an image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Encode a `[0, 1]` buffer as PNG bytes.
pub fn image_to_png(data: &ImageData) -> Result<Vec<u8>> {
    encode_png(&to_dynamic(data)?)
}
