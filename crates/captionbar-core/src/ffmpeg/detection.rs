//! FFmpeg Detection Module
//!
//! Locates FFmpeg/FFprobe binaries, either from explicitly configured paths
//! or from the system installation.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::{FFmpegError, FFmpegResult};

/// Information about detected FFmpeg installation
#[derive(Debug, Clone)]
pub struct FFmpegInfo {
    /// Path to ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Path to ffprobe binary
    pub ffprobe_path: PathBuf,
    /// FFmpeg version string
    pub version: String,
}

/// Detect FFmpeg, preferring explicitly configured binaries.
///
/// Either path may be omitted; the missing one is searched on the system.
pub fn detect_ffmpeg(
    ffmpeg_override: Option<&Path>,
    ffprobe_override: Option<&Path>,
) -> FFmpegResult<FFmpegInfo> {
    let ffmpeg_path = match ffmpeg_override {
        Some(path) if path.exists() => path.to_path_buf(),
        Some(_) => return Err(FFmpegError::NotFound),
        None => find_binary("ffmpeg")?,
    };
    let ffprobe_path = match ffprobe_override {
        Some(path) if path.exists() => path.to_path_buf(),
        Some(_) => return Err(FFmpegError::NotFound),
        None => find_binary("ffprobe")?,
    };

    let version = get_ffmpeg_version(&ffmpeg_path)?;

    Ok(FFmpegInfo {
        ffmpeg_path,
        ffprobe_path,
        version,
    })
}

/// Detect FFmpeg from common install locations and the system PATH
pub fn detect_system_ffmpeg() -> FFmpegResult<FFmpegInfo> {
    detect_ffmpeg(None, None)
}

/// Find a binary in common locations, then in PATH
fn find_binary(name: &str) -> FFmpegResult<PathBuf> {
    let binary_name = if cfg!(target_os = "windows") {
        format!("{}.exe", name)
    } else {
        name.to_string()
    };

    let path_dirs = std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).collect::<Vec<_>>())
        .unwrap_or_default();

    get_common_ffmpeg_paths()
        .into_iter()
        .chain(path_dirs)
        .map(|dir| dir.join(&binary_name))
        .find(|candidate| candidate.is_file())
        .ok_or(FFmpegError::NotFound)
}

/// Get common FFmpeg installation paths for the current platform
fn get_common_ffmpeg_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "windows")]
    {
        paths.push(PathBuf::from(r"C:\ffmpeg\bin"));
        paths.push(PathBuf::from(r"C:\Program Files\ffmpeg\bin"));

        // Chocolatey installation
        if let Ok(programdata) = std::env::var("ProgramData") {
            paths.push(PathBuf::from(programdata).join("chocolatey").join("bin"));
        }

        // Scoop installation
        if let Ok(userprofile) = std::env::var("USERPROFILE") {
            paths.push(PathBuf::from(userprofile).join("scoop").join("shims"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        // Homebrew paths
        paths.push(PathBuf::from("/opt/homebrew/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/opt/local/bin")); // MacPorts
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/snap/bin"));
    }

    paths
}

/// Get FFmpeg version string
fn get_ffmpeg_version(ffmpeg_path: &Path) -> FFmpegResult<String> {
    let output = Command::new(ffmpeg_path)
        .arg("-version")
        .output()
        .map_err(FFmpegError::ProcessError)?;

    if !output.status.success() {
        return Err(FFmpegError::ExecutionFailed(
            "Failed to get FFmpeg version".to_string(),
        ));
    }

    parse_version_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parse version from first line: "ffmpeg version X.X.X ..."
fn parse_version_output(output: &str) -> FFmpegResult<String> {
    let first_line = output
        .lines()
        .next()
        .ok_or_else(|| FFmpegError::ParseError("Could not parse FFmpeg version".to_string()))?;

    Ok(first_line
        .strip_prefix("ffmpeg version ")
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or(first_line)
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_output() {
        let out = "ffmpeg version 6.1.1-3ubuntu5 Copyright (c) 2000-2023\nbuilt with gcc";
        assert_eq!(parse_version_output(out).unwrap(), "6.1.1-3ubuntu5");
        assert_eq!(parse_version_output("custom build").unwrap(), "custom build");
        assert!(parse_version_output("").is_err());
    }

    #[test]
    fn test_missing_override_is_not_found() {
        let result = detect_ffmpeg(Some(Path::new("/nonexistent/ffmpeg")), None);
        assert!(matches!(result, Err(FFmpegError::NotFound)));
    }

    #[test]
    fn test_detect_system_ffmpeg() {
        // Not a hard failure if FFmpeg isn't installed
        match detect_system_ffmpeg() {
            Ok(info) => assert!(!info.version.is_empty()),
            Err(FFmpegError::NotFound) => {
                println!("FFmpeg not found on system (expected in CI without FFmpeg)");
            }
            Err(e) => println!("FFmpeg present but unusable: {}", e),
        }
    }
}
