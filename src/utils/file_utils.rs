use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::shared::constants;

/// True if the path has a suffix we treat as a raw sensor image.
pub fn is_raw_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => constants::RAW_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    }
}

fn is_supported_image(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(true, |n| n.starts_with('.'));
    if hidden {
        return false;
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => {
            let ext = ext.to_lowercase();
            constants::IMAGE_EXTENSIONS.contains(&ext.as_str())
                || constants::RAW_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// Lists all supported images under a directory, sorted by path.
pub fn list_images(data: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut image_paths: Vec<PathBuf> = WalkDir::new(data)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_supported_image(path))
        .collect();
    image_paths.sort();
    Ok(image_paths)
}

/// Rounds half-way cases to the nearest even integer.
fn round_half_to_even(x: f64) -> f64 {
    let floor = x.floor();
    let diff = x - floor;
    if diff > 0.5 {
        floor + 1.0
    } else if diff < 0.5 {
        floor
    } else if (floor as i64) % 2 == 0 {
        floor
    } else {
        floor + 1.0
    }
}

/// Returns up to `max_num_images` image paths from a directory along with the
/// total number found. When the directory holds more than the limit, the kept
/// paths are evenly spaced across the sorted listing. A limit of -1 keeps all.
pub fn get_image_filenames(directory: &Path, max_num_images: i64) -> Result<(Vec<PathBuf>, usize)> {
    let image_paths = list_images(directory, true)?;
    let num_orig_images = image_paths.len();

    if max_num_images < 0 || num_orig_images <= max_num_images as usize {
        return Ok((image_paths, num_orig_images));
    }

    let keep = max_num_images as usize;
    let mut selected = Vec::with_capacity(keep);
    for j in 0..keep {
        let idx = if keep == 1 {
            0
        } else {
            round_half_to_even((j as f64) * (num_orig_images - 1) as f64 / (keep - 1) as f64)
                as usize
        };
        selected.push(image_paths[idx].clone());
    }
    Ok((selected, num_orig_images))
}

/// Directory holding pyramid level `level`: the base dir itself for level 0,
/// otherwise a sibling with the downscale factor appended (`images_2`, ...).
pub fn downscale_dir(image_dir: &Path, level: u32) -> PathBuf {
    if level == 0 {
        image_dir.to_path_buf()
    } else {
        let mut name = image_dir.as_os_str().to_os_string();
        name.push(format!("_{}", 1u64 << level));
        PathBuf::from(name)
    }
}

/// All pyramid directories for `num_downscales` levels below full resolution.
pub fn pyramid_dirs(image_dir: &Path, num_downscales: u32) -> Vec<PathBuf> {
    (0..=num_downscales)
        .map(|i| downscale_dir(image_dir, i))
        .collect()
}

/// Removes every pyramid directory so a run starts from a clean slate.
/// Missing directories are not an error.
pub fn remove_pyramid_dirs(image_dir: &Path, num_downscales: u32) -> Result<()> {
    for dir in pyramid_dirs(image_dir, num_downscales) {
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to remove directory: {:?}", dir))
            }
        }
    }
    Ok(())
}

/// Creates every pyramid directory, tolerating ones that already exist.
pub fn create_pyramid_dirs(image_dir: &Path, num_downscales: u32) -> Result<()> {
    for dir in pyramid_dirs(image_dir, num_downscales) {
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create directory: {:?}", dir))?;
    }
    Ok(())
}

/// `{prefix}{index:05}` stem used for working images. The index is 1-based;
/// the rest of the pipeline keys off this stable identity.
pub fn frame_stem(prefix: &str, index: usize) -> String {
    format!(
        "{}{:0width$}",
        prefix,
        index,
        width = constants::FRAME_INDEX_WIDTH
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_frame_stem_padding() {
        assert_eq!(frame_stem("frame_", 1), "frame_00001");
        assert_eq!(frame_stem("frame_", 12345), "frame_12345");
        assert_eq!(frame_stem("img", 42), "img00042");
    }

    #[test]
    fn test_downscale_dir_naming() {
        let base = Path::new("/data/images");
        assert_eq!(downscale_dir(base, 0), PathBuf::from("/data/images"));
        assert_eq!(downscale_dir(base, 1), PathBuf::from("/data/images_2"));
        assert_eq!(downscale_dir(base, 3), PathBuf::from("/data/images_8"));
        assert_eq!(pyramid_dirs(base, 2).len(), 3);
    }

    #[test]
    fn test_list_images_filters_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.jpg", "notes.txt", ".hidden.png", "c.CR2"] {
            File::create(tmp.path().join(name)).unwrap();
        }
        let listed = list_images(tmp.path(), true).unwrap();
        let names: Vec<_> = listed
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png", "c.CR2"]);
        assert!(is_raw_image(&listed[2]));
        assert!(!is_raw_image(&listed[0]));
    }

    #[test]
    fn test_get_image_filenames_subsamples_evenly() {
        let tmp = tempfile::tempdir().unwrap();
        for i in 0..10 {
            File::create(tmp.path().join(format!("{:02}.png", i))).unwrap();
        }
        let (all, total) = get_image_filenames(tmp.path(), -1).unwrap();
        assert_eq!(all.len(), 10);
        assert_eq!(total, 10);

        // The middle pick lands on the 4.5 midpoint and rounds to even.
        let (some, total) = get_image_filenames(tmp.path(), 3).unwrap();
        assert_eq!(total, 10);
        let names: Vec<_> = some
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["00.png", "04.png", "09.png"]);
    }

    #[test]
    fn test_round_half_to_even_midpoints() {
        assert_eq!(round_half_to_even(4.5), 4.0);
        assert_eq!(round_half_to_even(5.5), 6.0);
        assert_eq!(round_half_to_even(0.5), 0.0);
        assert_eq!(round_half_to_even(2.3), 2.0);
        assert_eq!(round_half_to_even(2.7), 3.0);
    }

    #[test]
    fn test_remove_pyramid_dirs_tolerates_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("images");
        create_pyramid_dirs(&base, 2).unwrap();
        assert!(downscale_dir(&base, 2).is_dir());
        remove_pyramid_dirs(&base, 2).unwrap();
        assert!(!base.exists());
        // Second removal is a no-op.
        remove_pyramid_dirs(&base, 2).unwrap();
    }
}
