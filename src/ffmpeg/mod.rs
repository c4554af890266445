pub mod graph;

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

use crate::shared::error::PrepError;
use crate::utils::logger;

/// Looks a program up on PATH.
fn find_in_path(program: &str) -> Option<std::path::PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

fn check_program_installed(program: &str, hint: &str) -> Result<(), PrepError> {
    if find_in_path(program).is_none() {
        return Err(PrepError::MissingProgram {
            program: program.to_string(),
            hint: hint.to_string(),
        });
    }
    Ok(())
}

/// Fails fast, before any directories are touched, when the transcoder or
/// the probe tool is not installed.
pub fn check_ffmpeg_installed() -> Result<(), PrepError> {
    let hint = "see https://ffmpeg.org/download.html for installation instructions";
    check_program_installed("ffmpeg", hint)?;
    check_program_installed("ffprobe", hint)?;
    Ok(())
}

/// Runs an external program to completion and returns its stdout. The calling
/// thread blocks until the process exits; a non-zero exit is fatal and carries
/// the process stderr.
pub fn run_command(mut cmd: Command, verbose: bool) -> Result<String> {
    let rendered = format!("{:?}", cmd);
    logger::debug(&format!("running {}", rendered));
    if verbose {
        println!("... {}", rendered);
    }

    let output = cmd
        .output()
        .with_context(|| format!("Failed to spawn {}", rendered))?;
    if !output.status.success() {
        return Err(PrepError::CommandFailed {
            program: cmd.get_program().to_string_lossy().to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn parse_packet_count(output: &str) -> Option<usize> {
    output
        .split(|c: char| !c.is_ascii_digit())
        .find(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
}

/// Number of frames in a video, via a read-only packet-counting probe pass.
pub fn get_num_frames_in_video(video: &Path, verbose: bool) -> Result<usize> {
    let mut cmd = Command::new("ffprobe");
    cmd.args([
        "-v",
        "error",
        "-select_streams",
        "v:0",
        "-count_packets",
        "-show_entries",
        "stream=nb_read_packets",
        "-of",
        "csv=p=0",
    ])
    .arg(video);
    let output = run_command(cmd, verbose)?;
    parse_packet_count(&output)
        .with_context(|| format!("Unexpected ffprobe output: {:?}", output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_in_path_resolves_shell() {
        assert!(find_in_path("sh").is_some());
        assert!(find_in_path("no-such-program-frameprep").is_none());
    }

    #[test]
    fn test_missing_program_is_reported() {
        let err = check_program_installed("no-such-program-frameprep", "install it").unwrap_err();
        assert!(matches!(err, PrepError::MissingProgram { .. }));
        assert!(err.to_string().contains("no-such-program-frameprep"));
    }

    #[test]
    fn test_parse_packet_count() {
        assert_eq!(parse_packet_count("1234\n"), Some(1234));
        assert_eq!(parse_packet_count("stream,987"), Some(987));
        assert_eq!(parse_packet_count(""), None);
        assert_eq!(parse_packet_count("no digits here"), None);
    }
}
