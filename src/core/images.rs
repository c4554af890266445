use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::decoder::raw;
use crate::ffmpeg;
use crate::ffmpeg::graph::{CropFactor, CropStage, FilterGraph};
use crate::shared::constants;
use crate::shared::error::PrepError;
use crate::utils::{file_utils, logger};

/// Options for one copy/convert/downscale run.
#[derive(Debug, Clone)]
pub struct CopySpec {
    pub num_downscales: u32,
    pub image_prefix: String,
    /// Uniform pixel margin to crop off all four edges. Takes precedence
    /// over `crop_factor` when both are set.
    pub crop_border_pixels: Option<u32>,
    pub crop_factor: CropFactor,
    pub verbose: bool,
    pub keep_image_dir: bool,
    /// Nearest-neighbor integer upscale applied before the downscale chain.
    pub upscale_factor: Option<u32>,
    /// Scale with nearest-neighbor sampling (for label/depth-style data).
    pub nearest_neighbor: bool,
    /// When every input shares pixel dimensions the whole sequence is
    /// downscaled in one batched transcoder run; otherwise one run per image.
    pub same_dimensions: bool,
}

impl Default for CopySpec {
    fn default() -> Self {
        Self {
            num_downscales: 0,
            image_prefix: constants::DEFAULT_IMAGE_PREFIX.to_string(),
            crop_border_pixels: None,
            crop_factor: CropFactor::default(),
            verbose: false,
            keep_image_dir: false,
            upscale_factor: None,
            nearest_neighbor: false,
            same_dimensions: true,
        }
    }
}

/// Working path for input `index` (1-based). Raw sources swap their suffix
/// for the converted one; everything else keeps its original suffix.
fn working_path(image_dir: &Path, image_prefix: &str, index: usize, source: &Path) -> PathBuf {
    let stem = file_utils::frame_stem(image_prefix, index);
    let ext = if file_utils::is_raw_image(source) {
        constants::RAW_CONVERTED_EXTENSION.to_string()
    } else {
        source
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default()
    };
    if ext.is_empty() {
        image_dir.join(stem)
    } else {
        image_dir.join(format!("{}.{}", stem, ext))
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Copies a list of images into a sequentially indexed pyramid.
///
/// Per image: raw sources are decoded and re-encoded as JPEG; otherwise a
/// plain byte copy when all inputs share dimensions, or a per-image transcoder
/// pass that bakes in auto-rotation and clears rotation metadata when they do
/// not. A split/scale pass then materializes every pyramid level. Returns the
/// level-0 working paths in input order.
pub fn copy_images_list(
    image_paths: &[PathBuf],
    image_dir: &Path,
    opts: &CopySpec,
) -> Result<Vec<PathBuf>> {
    if image_dir.is_dir() && !image_paths.is_empty() && !opts.keep_image_dir {
        // Never wipe the directory the sources live in.
        if Some(image_dir) != image_paths[0].parent() {
            file_utils::remove_pyramid_dirs(image_dir, opts.num_downscales)?;
        }
    }
    fs::create_dir_all(image_dir)
        .with_context(|| format!("Failed to create directory: {:?}", image_dir))?;

    if image_paths.is_empty() {
        logger::warn("No usable images in the data folder.");
        println!("No usable images in the data folder.");
        return Ok(Vec::new());
    }

    let copied_image_paths = copy_source_images(image_paths, image_dir, opts)?;
    downscale_working_set(image_dir, &copied_image_paths, opts)?;

    let msg = format!("Done copying images with prefix '{}'.", opts.image_prefix);
    println!("{}", msg);
    logger::info(&msg);
    Ok(copied_image_paths)
}

/// Copies or converts each source into its indexed level-0 working path.
/// Images are 1-indexed for the rest of the pipeline.
fn copy_source_images(
    image_paths: &[PathBuf],
    image_dir: &Path,
    opts: &CopySpec,
) -> Result<Vec<PathBuf>> {
    let mut copied_image_paths = Vec::with_capacity(image_paths.len());
    for (idx, image_path) in image_paths.iter().enumerate() {
        if opts.verbose {
            logger::info(&format!(
                "Copying image {} of {}...",
                idx + 1,
                image_paths.len()
            ));
        }
        let copied_image_path = working_path(image_dir, &opts.image_prefix, idx + 1, image_path);

        if file_utils::is_raw_image(image_path) {
            raw::convert_raw_to_jpeg(image_path, &copied_image_path)?;
        } else if is_same_file(image_path, &copied_image_path) {
            // Source already sits at the destination; nothing to do.
        } else if opts.same_dimensions {
            // Fast path; just copy the bytes.
            fs::copy(image_path, &copied_image_path)
                .with_context(|| format!("Failed to copy {:?}", image_path))?;
        } else {
            // Slow path; let the transcoder perform auto-rotation and clear
            // the rotation metadata, since batched filter graphs need
            // uniform dimensions anyway.
            let mut cmd = Command::new("ffmpeg");
            cmd.arg("-y")
                .arg("-i")
                .arg(image_path)
                .args(["-metadata:s:v:0", "rotate=0"])
                .arg(&copied_image_path);
            ffmpeg::run_command(cmd, opts.verbose)?;
        }
        copied_image_paths.push(copied_image_path);
    }
    Ok(copied_image_paths)
}

/// Split/scale graph for one downscale pass. A border-pixel crop takes
/// precedence over a fractional one when both are supplied.
fn build_downscale_graph(opts: &CopySpec) -> FilterGraph {
    let mut graph = FilterGraph::new(opts.num_downscales)
        .input_label("0:v")
        .nearest_neighbor(opts.nearest_neighbor);
    if let Some(factor) = opts.upscale_factor {
        graph = graph.upscale(factor);
    }
    if let Some(px) = opts.crop_border_pixels {
        graph = graph.crop(CropStage::BorderPixels(px));
    } else if !opts.crop_factor.is_zero() {
        graph = graph.crop(CropStage::Factor(opts.crop_factor));
    }
    graph
}

/// Emits every downscale level for an already-copied working set.
fn downscale_working_set(image_dir: &Path, copied: &[PathBuf], opts: &CopySpec) -> Result<()> {
    file_utils::create_pyramid_dirs(image_dir, opts.num_downscales)?;

    let graph = build_downscale_graph(opts);
    let rendered = graph.render()?;

    let suffix = copied[0]
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    // Batched pattern input assumes uniform dimensions; mixed-dimension sets
    // get one transcoder run per image, which is much slower.
    let batches = if opts.same_dimensions { 1 } else { copied.len() };
    for batch in 1..=batches {
        let stem = if opts.same_dimensions {
            format!("{}%05d", opts.image_prefix)
        } else {
            file_utils::frame_stem(&opts.image_prefix, batch)
        };
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y")
            .arg("-noautorotate")
            .arg("-i")
            .arg(image_dir.join(format!("{}{}", stem, suffix)))
            .arg("-filter_complex")
            .arg(&rendered);
        for (level, label) in graph.output_labels().iter().enumerate() {
            let dir = file_utils::downscale_dir(image_dir, level as u32);
            cmd.arg("-map")
                .arg(label)
                .args(["-q:v", "2"])
                .arg(dir.join(format!("{}{}", stem, suffix)));
        }
        ffmpeg::run_command(cmd, opts.verbose)?;
    }
    Ok(())
}

/// Directory-scanning entry point: copies everything `list_images` finds in
/// `data` and returns the ordered mapping from original path to working path.
/// An empty scan is fatal at this level.
pub fn copy_images(
    data: &Path,
    image_dir: &Path,
    opts: &CopySpec,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    let image_paths = file_utils::list_images(data, true)?;
    if image_paths.is_empty() {
        return Err(PrepError::NoImagesFound(data.to_path_buf()).into());
    }
    let copied = copy_images_list(&image_paths, image_dir, opts)?;
    Ok(image_paths.into_iter().zip(copied).collect())
}

/// Depth maps are upsampled (nearest-neighbor) to match the RGB resolution
/// before the usual downscale chain, and never interpolated.
pub fn copy_and_upscale_depth_maps(
    depth_paths: &[PathBuf],
    depth_dir: &Path,
    num_downscales: u32,
    crop_border_pixels: Option<u32>,
    verbose: bool,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(depth_dir)
        .with_context(|| format!("Failed to create directory: {:?}", depth_dir))?;

    let upscale_factor = 1u32 << constants::DEPTH_UPSCALING_TIMES;
    let opts = CopySpec {
        num_downscales,
        crop_border_pixels,
        verbose,
        upscale_factor: Some(upscale_factor),
        nearest_neighbor: true,
        ..CopySpec::default()
    };
    let copied = copy_images_list(depth_paths, depth_dir, &opts)?;
    logger::info("Done upscaling depth maps.");
    Ok(copied)
}
