mod core;
mod decoder;
mod ffmpeg;
mod shared;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::core::matcher::{FeatureType, MatcherType, SfmTool};
use crate::ffmpeg::graph::CropFactor;
use crate::shared::constants;
use crate::shared::error::PrepError;
use crate::utils::file_utils;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract frames from a video into a multi-resolution image pyramid
    Video {
        /// Path to the source video
        #[arg(short, long)]
        input: PathBuf,
        /// Level-0 output directory; downscaled levels get a factor suffix
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Number of frames to aim for
        #[arg(long, default_value_t = 300)]
        num_frames_target: usize,
        /// Number of 2x downscale levels below full resolution
        #[arg(long, default_value_t = 3)]
        num_downscales: u32,
        /// Fraction of each edge to crop off, as top bottom left right
        #[arg(long, num_args = 4, value_names = ["TOP", "BOTTOM", "LEFT", "RIGHT"],
              default_values_t = [0.0, 0.0, 0.0, 0.0])]
        crop_factor: Vec<f64>,
        /// Prefix for the working image filenames
        #[arg(long, default_value = constants::DEFAULT_IMAGE_PREFIX)]
        image_prefix: String,
        /// Don't delete pre-existing output directories first
        #[arg(long, default_value_t = false)]
        keep_image_dir: bool,
        /// Pick frames with a seeded random sample instead of even spacing
        #[arg(long)]
        random_seed: Option<u64>,
        /// Vignette mask radius as a fraction of the image diagonal; 1.0 disables
        #[arg(long, default_value_t = 1.0)]
        percent_radius: f64,
        #[arg(short, long, default_value_t = false)]
        verbose: bool,
    },
    /// Copy a directory of images (including raw) into an indexed pyramid
    Images {
        /// Directory to scan for images
        #[arg(short, long)]
        data: PathBuf,
        /// Level-0 output directory; downscaled levels get a factor suffix
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Number of 2x downscale levels below full resolution
        #[arg(long, default_value_t = 3)]
        num_downscales: u32,
        /// Keep at most this many images, evenly spaced; -1 keeps all
        #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
        max_num_images: i64,
        /// Prefix for the working image filenames
        #[arg(long, default_value = constants::DEFAULT_IMAGE_PREFIX)]
        image_prefix: String,
        /// Don't delete pre-existing output directories first
        #[arg(long, default_value_t = false)]
        keep_image_dir: bool,
        /// Fraction of each edge to mask out, as top bottom left right
        #[arg(long, num_args = 4, value_names = ["TOP", "BOTTOM", "LEFT", "RIGHT"],
              default_values_t = [0.0, 0.0, 0.0, 0.0])]
        crop_factor: Vec<f64>,
        /// Vignette mask radius as a fraction of the image diagonal; 1.0 disables
        #[arg(long, default_value_t = 1.0)]
        percent_radius: f64,
        /// Crop this many pixels off every edge during downscaling
        #[arg(long)]
        crop_border_pixels: Option<u32>,
        /// Inputs have mixed dimensions; transcode one image at a time
        #[arg(long, default_value_t = false)]
        mixed_dimensions: bool,
        /// Optional directory of depth maps to upscale and pyramid alongside
        #[arg(long)]
        depth_data: Option<PathBuf>,
        #[arg(short, long, default_value_t = false)]
        verbose: bool,
    },
    /// Resolve an (sfm tool, feature, matcher) combination
    Matcher {
        #[arg(long, value_enum, default_value_t = SfmTool::Any)]
        sfm_tool: SfmTool,
        #[arg(long, value_enum, default_value_t = FeatureType::Any)]
        feature_type: FeatureType,
        #[arg(long, value_enum, default_value_t = MatcherType::Any)]
        matcher_type: MatcherType,
    },
}

fn crop_from_args(values: &[f64]) -> CropFactor {
    CropFactor::new(values[0], values[1], values[2], values[3])
}

fn main() -> Result<()> {
    crate::utils::logger::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Video {
            input,
            output_dir,
            num_frames_target,
            num_downscales,
            crop_factor,
            image_prefix,
            keep_image_dir,
            random_seed,
            percent_radius,
            verbose,
        } => {
            crate::ffmpeg::check_ffmpeg_installed()?;
            let crop = crop_from_args(crop_factor);
            let (summary, _num_frames) = crate::core::video::convert_video_to_images(
                input,
                output_dir,
                *num_frames_target,
                *num_downscales,
                crop,
                *verbose,
                image_prefix,
                *keep_image_dir,
                *random_seed,
            )?;
            for line in &summary {
                println!("{}", line);
            }
            // Frames were already cropped during extraction, so the mask only
            // carries the vignette.
            if *percent_radius < 1.0 {
                crate::core::mask::save_mask(
                    output_dir,
                    *num_downscales,
                    CropFactor::default(),
                    *percent_radius,
                    image_prefix,
                )?;
            }
        }
        Commands::Images {
            data,
            output_dir,
            num_downscales,
            max_num_images,
            image_prefix,
            keep_image_dir,
            crop_factor,
            percent_radius,
            crop_border_pixels,
            mixed_dimensions,
            depth_data,
            verbose,
        } => {
            crate::ffmpeg::check_ffmpeg_installed()?;
            let crop = crop_from_args(crop_factor);
            let opts = crate::core::images::CopySpec {
                num_downscales: *num_downscales,
                image_prefix: image_prefix.clone(),
                crop_border_pixels: *crop_border_pixels,
                verbose: *verbose,
                keep_image_dir: *keep_image_dir,
                same_dimensions: !*mixed_dimensions,
                ..crate::core::images::CopySpec::default()
            };

            let mapping = if *max_num_images >= 0 {
                let (paths, total) = file_utils::get_image_filenames(data, *max_num_images)?;
                if paths.is_empty() {
                    return Err(PrepError::NoImagesFound(data.clone()).into());
                }
                println!("Found {} images, keeping {}", total, paths.len());
                let copied = crate::core::images::copy_images_list(&paths, output_dir, &opts)?;
                paths.into_iter().zip(copied).collect::<Vec<_>>()
            } else {
                crate::core::images::copy_images(data, output_dir, &opts)?
            };
            println!("Copied {} images", mapping.len());

            if let Some(depth_data) = depth_data {
                let depth_paths = file_utils::list_images(depth_data, true)?;
                let depth_dir = output_dir
                    .parent()
                    .unwrap_or(Path::new("."))
                    .join("depths");
                crate::core::images::copy_and_upscale_depth_maps(
                    &depth_paths,
                    &depth_dir,
                    *num_downscales,
                    *crop_border_pixels,
                    *verbose,
                )?;
            }

            // The copies are left uncropped; cropping is expressed as a mask.
            if !crop.is_zero() || *percent_radius < 1.0 {
                crate::core::mask::save_mask(
                    output_dir,
                    *num_downscales,
                    crop,
                    *percent_radius,
                    image_prefix,
                )?;
            }
        }
        Commands::Matcher {
            sfm_tool,
            feature_type,
            matcher_type,
        } => {
            match crate::core::matcher::find_tool_feature_matcher_combination(
                *sfm_tool,
                *feature_type,
                *matcher_type,
            ) {
                Some(combination) => {
                    println!("{}", serde_json::to_string_pretty(&combination)?);
                }
                None => {
                    anyhow::bail!(
                        "No valid combination found for ({:?}, {:?}, {:?})",
                        sfm_tool,
                        feature_type,
                        matcher_type
                    );
                }
            }
        }
    }

    Ok(())
}
