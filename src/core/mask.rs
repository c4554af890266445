use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ffmpeg::graph::CropFactor;
use crate::shared::constants;
use crate::shared::error::PrepError;
use crate::utils::{file_utils, logger};

/// Filled-disk vignette mask, 1 inside the circle and 0 outside.
///
/// A radius of 1.0 or more covers the whole frame and is a no-op (`None`);
/// a non-positive radius is fatal. The radius in pixels is the given
/// fraction of half the image diagonal.
pub fn generate_circle_mask(
    height: u32,
    width: u32,
    percent_radius: f64,
) -> Result<Option<GrayImage>, PrepError> {
    if percent_radius <= 0.0 {
        return Err(PrepError::InvalidMaskRadius(percent_radius));
    }
    if percent_radius >= 1.0 {
        return Ok(None);
    }
    let diagonal = ((width as f64).powi(2) + (height as f64).powi(2)).sqrt();
    let radius = (percent_radius * diagonal / 2.0) as i64;
    let (cx, cy) = ((width / 2) as i64, (height / 2) as i64);

    let mut mask = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let dx = x as i64 - cx;
            let dy = y as i64 - cy;
            if dx * dx + dy * dy <= radius * radius {
                mask.put_pixel(x, y, Luma([1]));
            }
        }
    }
    Ok(Some(mask))
}

/// Rectangular mask, 1 inside the retained region and 0 in the cropped
/// border. All-zero fractions are a no-op; out-of-range fractions are fatal.
pub fn generate_crop_mask(
    height: u32,
    width: u32,
    crop_factor: CropFactor,
) -> Result<Option<GrayImage>, PrepError> {
    if crop_factor.is_zero() {
        return Ok(None);
    }
    crop_factor.validate()?;

    let top = (crop_factor.top * height as f64) as u32;
    let bottom = (crop_factor.bottom * height as f64) as u32;
    let left = (crop_factor.left * width as f64) as u32;
    let right = (crop_factor.right * width as f64) as u32;

    let mut mask = GrayImage::new(width, height);
    for y in top..height.saturating_sub(bottom) {
        for x in left..width.saturating_sub(right) {
            mask.put_pixel(x, y, Luma([1]));
        }
    }
    Ok(Some(mask))
}

/// Combined mask: the elementwise product when both the crop and circle
/// masks exist, either one alone otherwise, `None` when neither applies.
/// Values stay in {0, 1} here; scaling to {0, 255} happens only on save.
pub fn generate_mask(
    height: u32,
    width: u32,
    crop_factor: CropFactor,
    percent_radius: f64,
) -> Result<Option<GrayImage>, PrepError> {
    let crop_mask = generate_crop_mask(height, width, crop_factor)?;
    let circle_mask = generate_circle_mask(height, width, percent_radius)?;
    Ok(match (crop_mask, circle_mask) {
        (None, circle) => circle,
        (crop, None) => crop,
        (Some(crop), Some(circle)) => {
            let mut combined = crop;
            for (dst, src) in combined.pixels_mut().zip(circle.pixels()) {
                dst.0[0] *= src.0[0];
            }
            Some(combined)
        }
    })
}

fn representative_image(image_dir: &Path, image_prefix: &str) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(image_dir)
        .with_context(|| format!("Failed to read directory: {:?}", image_dir))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with(image_prefix))
        })
        .collect();
    candidates.sort();
    candidates
        .into_iter()
        .next()
        .with_context(|| format!("No images with prefix '{}' in {:?}", image_prefix, image_dir))
}

/// Generates one mask matching the working images' dimensions and replicates
/// it (nearest-neighbor resized) across every pyramid level, under `masks` /
/// `masks_{factor}` next to the image directory. Returns `None` when neither
/// a crop nor a vignette was requested.
pub fn save_mask(
    image_dir: &Path,
    num_downscales: u32,
    crop_factor: CropFactor,
    percent_radius: f64,
    image_prefix: &str,
) -> Result<Option<PathBuf>> {
    let sample = representative_image(image_dir, image_prefix)?;
    let (width, height) =
        image::image_dimensions(&sample).with_context(|| format!("Failed to read {:?}", sample))?;

    let Some(mask) = generate_mask(height, width, crop_factor, percent_radius)? else {
        return Ok(None);
    };
    let mut mask = mask;
    for pixel in mask.pixels_mut() {
        pixel.0[0] *= 255;
    }

    let parent = image_dir.parent().unwrap_or(Path::new("."));
    let mask_dir = parent.join(constants::MASK_DIR_NAME);
    fs::create_dir_all(&mask_dir)
        .with_context(|| format!("Failed to create directory: {:?}", mask_dir))?;
    let mask_path = mask_dir.join(constants::MASK_FILE_NAME);
    mask.save(&mask_path)
        .with_context(|| format!("Failed to write {:?}", mask_path))?;

    for level in 1..=num_downscales {
        let factor = 1u32 << level;
        let dir = file_utils::downscale_dir(&mask_dir, level);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {:?}", dir))?;
        let resized = imageops::resize(&mask, width / factor, height / factor, FilterType::Nearest);
        resized
            .save(dir.join(constants::MASK_FILE_NAME))
            .with_context(|| format!("Failed to write mask for level {}", level))?;
    }

    logger::info("Generated and saved masks.");
    println!("Generated and saved masks.");
    Ok(Some(mask_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_set(mask: &GrayImage) -> usize {
        mask.pixels().filter(|p| p.0[0] != 0).count()
    }

    #[test]
    fn test_circle_mask_boundary_values() {
        assert!(generate_circle_mask(100, 100, 0.0).is_err());
        assert!(generate_circle_mask(100, 100, -0.5).is_err());
        assert!(generate_circle_mask(100, 100, 1.0).unwrap().is_none());
        assert!(generate_circle_mask(100, 100, 1.5).unwrap().is_none());
        assert!(generate_circle_mask(100, 100, 0.5).unwrap().is_some());
    }

    #[test]
    fn test_circle_mask_monotonic_in_radius() {
        let small = generate_circle_mask(120, 90, 0.3).unwrap().unwrap();
        let medium = generate_circle_mask(120, 90, 0.6).unwrap().unwrap();
        let large = generate_circle_mask(120, 90, 0.9).unwrap().unwrap();
        assert!(count_set(&small) < count_set(&medium));
        assert!(count_set(&medium) < count_set(&large));
    }

    #[test]
    fn test_crop_mask_retained_area() {
        let (h, w) = (200u32, 100u32);
        let factor = CropFactor::new(0.1, 0.2, 0.25, 0.05);
        let mask = generate_crop_mask(h, w, factor).unwrap().unwrap();
        let top = (0.1 * h as f64) as u32;
        let bottom = (0.2 * h as f64) as u32;
        let left = (0.25 * w as f64) as u32;
        let right = (0.05 * w as f64) as u32;
        let expected = ((h - top - bottom) * (w - left - right)) as usize;
        assert_eq!(count_set(&mask), expected);
    }

    #[test]
    fn test_crop_mask_noop_and_fatal_cases() {
        assert!(generate_crop_mask(10, 10, CropFactor::default())
            .unwrap()
            .is_none());
        assert!(generate_crop_mask(10, 10, CropFactor::new(1.2, 0.0, 0.0, 0.0)).is_err());
        assert!(generate_crop_mask(10, 10, CropFactor::new(0.0, -0.1, 0.0, 0.0)).is_err());
    }

    #[test]
    fn test_generate_mask_crop_only_at_radius_one() {
        let factor = CropFactor::new(0.1, 0.1, 0.2, 0.2);
        let combined = generate_mask(50, 80, factor, 1.0).unwrap().unwrap();
        let crop_only = generate_crop_mask(50, 80, factor).unwrap().unwrap();
        assert_eq!(combined.as_raw(), crop_only.as_raw());
    }

    #[test]
    fn test_generate_mask_combines_elementwise() {
        let factor = CropFactor::new(0.0, 0.5, 0.0, 0.0);
        let combined = generate_mask(100, 100, factor, 0.5).unwrap().unwrap();
        let crop = generate_crop_mask(100, 100, factor).unwrap().unwrap();
        let circle = generate_circle_mask(100, 100, 0.5).unwrap().unwrap();
        for ((c, a), b) in combined.pixels().zip(crop.pixels()).zip(circle.pixels()) {
            assert_eq!(c.0[0], a.0[0] * b.0[0]);
        }
        assert!(count_set(&combined) < count_set(&circle));
    }

    #[test]
    fn test_generate_mask_none_when_nothing_requested() {
        assert!(generate_mask(10, 10, CropFactor::default(), 1.0)
            .unwrap()
            .is_none());
    }
}
