use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use std::fs;
use std::path::Path;
use std::process::Command;

use crate::ffmpeg;
use crate::ffmpeg::graph::{CropFactor, CropStage, FilterGraph, SelectStage};
use crate::shared::error::PrepError;
use crate::utils::{file_utils, logger};

/// Frame-selection plan for one extraction run.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SelectionPlan {
    /// Exact 0-based indices drawn with a seeded RNG.
    Seeded(Vec<usize>),
    /// Every `spacing`-th frame via the thumbnail filter.
    Interval(usize),
    /// The target cannot be met by spacing; take every frame.
    All,
}

/// Decides how to pick `num_frames_target` frames out of `num_frames`.
/// A seed takes priority and gives a deterministic sorted sample.
fn plan_selection(
    num_frames: usize,
    num_frames_target: usize,
    random_seed: Option<u64>,
) -> Result<SelectionPlan> {
    if let Some(seed) = random_seed {
        if num_frames_target > num_frames {
            bail!(
                "cannot sample {} frames from a video with {} frames",
                num_frames_target,
                num_frames
            );
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut indices = index::sample(&mut rng, num_frames, num_frames_target).into_vec();
        indices.sort_unstable();
        return Ok(SelectionPlan::Seeded(indices));
    }
    let spacing = num_frames / num_frames_target;
    if spacing > 1 {
        Ok(SelectionPlan::Interval(spacing))
    } else {
        Ok(SelectionPlan::All)
    }
}

fn count_pngs(dir: &Path) -> Result<usize> {
    let count = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {:?}", dir))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map_or(false, |ext| ext == "png")
        })
        .count();
    Ok(count)
}

/// Converts a video into a sequence of images, one numbered PNG set per
/// pyramid level. Returns summary lines and the number of extracted frames.
#[allow(clippy::too_many_arguments)]
pub fn convert_video_to_images(
    video_path: &Path,
    image_dir: &Path,
    num_frames_target: usize,
    num_downscales: u32,
    crop_factor: CropFactor,
    verbose: bool,
    image_prefix: &str,
    keep_image_dir: bool,
    random_seed: Option<u64>,
) -> Result<(Vec<String>, usize)> {
    if !keep_image_dir {
        file_utils::remove_pyramid_dirs(image_dir, num_downscales)?;
    }
    fs::create_dir_all(image_dir)
        .with_context(|| format!("Failed to create directory: {:?}", image_dir))?;

    crop_factor.validate()?;

    if video_path.is_dir() {
        return Err(PrepError::VideoIsDirectory(video_path.to_path_buf()).into());
    }
    if !video_path.exists() {
        return Err(PrepError::VideoNotFound(video_path.to_path_buf()).into());
    }

    let num_frames = ffmpeg::get_num_frames_in_video(video_path, verbose)?;
    if num_frames == 0 {
        return Err(PrepError::EmptyVideo(video_path.to_path_buf()).into());
    }
    println!("Number of frames in video: {}", num_frames);

    let plan = plan_selection(num_frames, num_frames_target, random_seed)?;
    match &plan {
        SelectionPlan::Seeded(_) => {
            let msg = format!(
                "Extracting {} frames using seed {} random selection.",
                num_frames_target,
                random_seed.unwrap_or_default()
            );
            println!("{}", msg);
            logger::info(&msg);
        }
        SelectionPlan::Interval(spacing) => {
            let msg = format!(
                "Extracting {} frames in evenly spaced intervals",
                num_frames.div_ceil(*spacing)
            );
            println!("{}", msg);
            logger::info(&msg);
        }
        SelectionPlan::All => {
            let msg = "Can't satisfy requested number of frames. Extracting all frames.";
            println!("{}", msg);
            logger::warn(msg);
        }
    }

    file_utils::create_pyramid_dirs(image_dir, num_downscales)?;

    let take_all = matches!(plan, SelectionPlan::All);
    let mut graph = FilterGraph::new(num_downscales).crop(CropStage::Factor(crop_factor));
    graph = match plan {
        SelectionPlan::Seeded(indices) => graph.select(SelectStage::Frames(indices)),
        SelectionPlan::Interval(spacing) => graph.select(SelectStage::Interval(spacing)),
        SelectionPlan::All => graph,
    };

    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-i").arg(video_path).args(["-vsync", "vfr"]);
    if take_all {
        // Taking every frame; force 8-bit pixel output.
        cmd.args(["-pix_fmt", "bgr8"]);
    }
    cmd.arg("-filter_complex").arg(graph.render()?);
    for (level, label) in graph.output_labels().iter().enumerate() {
        let dir = file_utils::downscale_dir(image_dir, level as u32);
        cmd.arg("-map")
            .arg(label)
            .arg(dir.join(format!("{}%05d.png", image_prefix)));
    }
    ffmpeg::run_command(cmd, verbose)?;

    let num_final_frames = count_pngs(image_dir)?;
    let summary = vec![
        format!("Starting with {} video frames", num_frames),
        format!(
            "We extracted {} images with prefix '{}'",
            num_final_frames, image_prefix
        ),
    ];
    logger::info("Done converting video to images.");
    println!("Done converting video to images.");

    Ok((summary, num_final_frames))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_selection_is_deterministic() {
        let a = plan_selection(1000, 50, Some(42)).unwrap();
        let b = plan_selection(1000, 50, Some(42)).unwrap();
        assert_eq!(a, b);
        match a {
            SelectionPlan::Seeded(indices) => {
                assert_eq!(indices.len(), 50);
                assert!(indices.windows(2).all(|w| w[0] < w[1]));
                assert!(indices.iter().all(|&i| i < 1000));
            }
            other => panic!("expected seeded plan, got {:?}", other),
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = plan_selection(1000, 50, Some(1)).unwrap();
        let b = plan_selection(1000, 50, Some(2)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_seeded_selection_rejects_oversized_target() {
        assert!(plan_selection(10, 11, Some(7)).is_err());
    }

    #[test]
    fn test_interval_selection_when_spacing_allows() {
        assert_eq!(
            plan_selection(100, 10, None).unwrap(),
            SelectionPlan::Interval(10)
        );
        assert_eq!(
            plan_selection(301, 150, None).unwrap(),
            SelectionPlan::Interval(2)
        );
    }

    #[test]
    fn test_all_frames_when_target_unreachable() {
        assert_eq!(plan_selection(10, 7, None).unwrap(), SelectionPlan::All);
        assert_eq!(plan_selection(10, 10, None).unwrap(), SelectionPlan::All);
        assert_eq!(plan_selection(5, 10, None).unwrap(), SelectionPlan::All);
    }
}
