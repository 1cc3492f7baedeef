//! Tensor-to-PNG encoding of final images.
//!
//! The engine hands back float tensors in `0.0..=1.0`. Size-1 axes are
//! squeezed away, channel-first layouts are transposed, values are
//! scaled to `u8`, and the result is encoded as PNG for the queue
//! upload.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};

use crate::error::EngineError;
use crate::types::ImageTensor;

/// Encode an image tensor as PNG bytes.
///
/// Accepts `H x W` (grayscale) and `H x W x C` / `C x H x W` with 3 or
/// 4 channels, in any combination with leading/trailing size-1 axes
/// (e.g. the usual `1 x H x W x C` batch shape).
pub fn encode_png(tensor: &ImageTensor) -> Result<Vec<u8>, EngineError> {
    let expected: usize = tensor.shape.iter().product();
    if expected != tensor.data.len() {
        return Err(EngineError::Tensor(format!(
            "shape {:?} implies {} values, got {}",
            tensor.shape,
            expected,
            tensor.data.len()
        )));
    }

    // Squeeze size-1 axes; the remaining axes stay contiguous in order.
    let dims: Vec<usize> = tensor.shape.iter().copied().filter(|&d| d != 1).collect();

    let dynamic = match dims.as_slice() {
        [h, w] => gray(&tensor.data, *h, *w),
        [h, w, c] if matches!(c, 3 | 4) => interleaved(&tensor.data, *h, *w, *c),
        [c, h, w] if matches!(c, 3 | 4) => planar(&tensor.data, *c, *h, *w),
        other => {
            return Err(EngineError::Tensor(format!(
                "unsupported image shape {other:?} (from {:?})",
                tensor.shape
            )))
        }
    }?;

    let mut buffer = Cursor::new(Vec::new());
    dynamic.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

// ---- private helpers ----

fn to_u8(v: f32) -> u8 {
    (v * 255.0).clamp(0.0, 255.0) as u8
}

fn gray(data: &[f32], h: usize, w: usize) -> Result<DynamicImage, EngineError> {
    let pixels: Vec<u8> = data.iter().map(|&v| to_u8(v)).collect();
    GrayImage::from_raw(w as u32, h as u32, pixels)
        .map(DynamicImage::ImageLuma8)
        .ok_or_else(|| EngineError::Tensor("grayscale buffer size mismatch".into()))
}

fn interleaved(data: &[f32], h: usize, w: usize, c: usize) -> Result<DynamicImage, EngineError> {
    let pixels: Vec<u8> = data.iter().map(|&v| to_u8(v)).collect();
    match c {
        3 => RgbImage::from_raw(w as u32, h as u32, pixels)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| EngineError::Tensor("rgb buffer size mismatch".into())),
        4 => RgbaImage::from_raw(w as u32, h as u32, pixels)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| EngineError::Tensor("rgba buffer size mismatch".into())),
        _ => unreachable!("caller checked channel count"),
    }
}

fn planar(data: &[f32], c: usize, h: usize, w: usize) -> Result<DynamicImage, EngineError> {
    // C x H x W -> H x W x C
    let plane = h * w;
    let mut pixels = Vec::with_capacity(data.len());
    for y in 0..h {
        for x in 0..w {
            for ch in 0..c {
                pixels.push(to_u8(data[ch * plane + y * w + x]));
            }
        }
    }
    interleaved_from_u8(pixels, h, w, c)
}

fn interleaved_from_u8(
    pixels: Vec<u8>,
    h: usize,
    w: usize,
    c: usize,
) -> Result<DynamicImage, EngineError> {
    match c {
        3 => RgbImage::from_raw(w as u32, h as u32, pixels)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| EngineError::Tensor("rgb buffer size mismatch".into())),
        4 => RgbaImage::from_raw(w as u32, h as u32, pixels)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| EngineError::Tensor("rgba buffer size mismatch".into())),
        _ => unreachable!("caller checked channel count"),
    }
}
