use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use rawloader::{RawImageData, RawLoader};
use std::path::Path;

use crate::shared::error::PrepError;
use crate::utils::logger;

/// Decodes a raw sensor file and writes the post-processed RGB image to
/// `dest` (suffix decides the encoding, normally JPEG).
pub fn convert_raw_to_jpeg(src: &Path, dest: &Path) -> Result<()> {
    let rgb = postprocess(src)?;
    rgb.save(dest)
        .with_context(|| format!("Failed to write {:?}", dest))?;
    logger::debug(&format!("converted raw {:?} -> {:?}", src, dest));
    Ok(())
}

/// Post-processes raw sensor data to 8-bit RGB: black/white-level
/// normalization, as-shot white balance, a 2x2 superpixel demosaic (halves
/// each dimension), and sRGB gamma encoding.
fn postprocess(path: &Path) -> Result<RgbImage> {
    let raw = RawLoader::new().decode_file(path).map_err(|e| {
        anyhow::Error::from(PrepError::UnsupportedRaw {
            path: path.to_path_buf(),
            reason: format!("{:?}", e),
        })
    })?;
    if raw.cpp != 1 {
        return Err(PrepError::UnsupportedRaw {
            path: path.to_path_buf(),
            reason: format!("expected a single-component CFA image, got cpp={}", raw.cpp),
        }
        .into());
    }

    let data: Vec<u16> = match raw.data {
        RawImageData::Integer(values) => values,
        RawImageData::Float(values) => values
            .iter()
            .map(|&v| (v * 65535.0).clamp(0.0, 65535.0) as u16)
            .collect(),
    };
    let (width, height) = (raw.width, raw.height);
    if data.len() < width * height {
        return Err(PrepError::UnsupportedRaw {
            path: path.to_path_buf(),
            reason: format!(
                "sensor data too short: {} values for {}x{}",
                data.len(),
                width,
                height
            ),
        }
        .into());
    }

    // As-shot white balance, normalized so green stays at 1.0. Cameras that
    // report no usable coefficient for a channel fall back to neutral.
    let mut wb = raw.wb_coeffs;
    let g_ref = if wb[1].is_finite() && wb[1] > 0.0 {
        wb[1]
    } else {
        1.0
    };
    for coeff in wb.iter_mut() {
        *coeff = if coeff.is_finite() && *coeff > 0.0 {
            *coeff / g_ref
        } else {
            1.0
        };
    }

    let out_w = width / 2;
    let out_h = height / 2;
    let mut img = RgbImage::new(out_w as u32, out_h as u32);
    for by in 0..out_h {
        for bx in 0..out_w {
            let mut acc = [0f32; 3];
            let mut count = [0f32; 3];
            for dy in 0..2 {
                for dx in 0..2 {
                    let y = by * 2 + dy;
                    let x = bx * 2 + dx;
                    let cfa_index = raw.cfa.color_at(y, x).min(3);
                    // The second green site shares the green output channel.
                    let channel = if cfa_index == 3 { 1 } else { cfa_index };
                    let black = raw.blacklevels[cfa_index] as f32;
                    let white = raw.whitelevels[cfa_index] as f32;
                    let value = ((data[y * width + x] as f32 - black)
                        / (white - black).max(1.0))
                    .clamp(0.0, 1.0);
                    acc[channel] += value * wb[cfa_index];
                    count[channel] += 1.0;
                }
            }
            let pixel = [0, 1, 2].map(|c| {
                let value = if count[c] > 0.0 { acc[c] / count[c] } else { 0.0 };
                (value.clamp(0.0, 1.0).powf(1.0 / 2.2) * 255.0).round() as u8
            });
            img.put_pixel(bx as u32, by as u32, Rgb(pixel));
        }
    }
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_missing_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let result = convert_raw_to_jpeg(
            Path::new("/nonexistent/shot.cr2"),
            &tmp.path().join("frame_00001.jpg"),
        );
        assert!(result.is_err());
    }
}
