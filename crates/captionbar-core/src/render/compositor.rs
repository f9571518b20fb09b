//! Caption Compositor
//!
//! Stacks a generated caption bar under the source video and encodes the
//! result with the source audio.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc::Sender;
use tracing::{debug, info, warn};

use super::frames::BarFrameGenerator;
use super::geometry::{CanvasGeometry, DEFAULT_BAR_PERCENT};
use super::timeline::CueTimeline;
use crate::captions::{parse_cue_document, CaptionStyle};
use crate::ffmpeg::{
    calculate_encode_progress, parse_ffmpeg_progress_line, EncodeProgress, FFmpegProgressData,
    FFmpegRunner,
};
use crate::text::CaptionRasterizer;
use crate::{CoreError, CoreResult};

/// Encoder settings for the burned-in output
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EncodeSettings {
    pub video_codec: String,
    /// x264 preset (e.g., "medium", "fast")
    pub preset: String,
    /// Constant rate factor
    pub crf: u8,
    pub pixel_format: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// Encoder threads (None = one per CPU)
    pub threads: Option<usize>,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: 23,
            pixel_format: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            threads: None,
        }
    }
}

impl EncodeSettings {
    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// One burn-in job
#[derive(Clone, Debug)]
pub struct BurnRequest {
    pub video_path: PathBuf,
    pub cues_path: PathBuf,
    pub output_path: PathBuf,
    /// Caption bar height as a percentage of the video height
    pub bar_percent: f64,
    pub style: CaptionStyle,
}

impl BurnRequest {
    pub fn new(
        video_path: impl Into<PathBuf>,
        cues_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            video_path: video_path.into(),
            cues_path: cues_path.into(),
            output_path: output_path.into(),
            bar_percent: DEFAULT_BAR_PERCENT,
            style: CaptionStyle::default(),
        }
    }
}

/// Burn-in result
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnResult {
    pub output_path: PathBuf,
    pub geometry: CanvasGeometry,
    pub duration_sec: f64,
    pub cue_count: usize,
    /// Bar frames accepted by the encoder
    pub frames_written: u64,
    pub file_size: u64,
    pub encoding_time_sec: f64,
}

/// Removes an in-progress output file unless committed.
struct PartialOutput {
    path: PathBuf,
    committed: bool,
}

impl PartialOutput {
    fn for_output(output: &Path) -> Self {
        let mut name = output.file_name().unwrap_or_default().to_os_string();
        name.push(".partial");
        Self {
            path: output.with_file_name(name),
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn commit(mut self, output: &Path) -> std::io::Result<()> {
        if output.exists() {
            std::fs::remove_file(output)?;
        }
        std::fs::rename(&self.path, output)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if !self.committed && self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "Failed to remove partial output");
            }
        }
    }
}

/// Kills the encoder if it is still running when dropped.
struct EncoderProcess {
    child: Child,
    finished: bool,
}

impl EncoderProcess {
    async fn wait(&mut self) -> std::io::Result<std::process::ExitStatus> {
        let status = self.child.wait().await?;
        self.finished = true;
        Ok(status)
    }
}

impl Drop for EncoderProcess {
    fn drop(&mut self) {
        if !self.finished {
            // tokio reaps killed children in the background
            let _ = self.child.start_kill();
        }
    }
}

/// Burns cue documents into videos
#[derive(Clone, Debug)]
pub struct CaptionCompositor {
    ffmpeg: FFmpegRunner,
    encode: EncodeSettings,
}

impl CaptionCompositor {
    pub fn new(ffmpeg: FFmpegRunner, encode: EncodeSettings) -> Self {
        Self { ffmpeg, encode }
    }

    /// Burns `request.cues_path` into `request.video_path`.
    ///
    /// Nothing is written when the cue document yields no cues. The output
    /// is encoded to a `.partial` sibling and renamed on success.
    pub async fn burn(
        &self,
        request: &BurnRequest,
        progress_tx: Option<Sender<EncodeProgress>>,
    ) -> CoreResult<BurnResult> {
        let start_time = Instant::now();

        for (what, path) in [("video", &request.video_path), ("cue document", &request.cues_path)] {
            if !path.is_file() {
                return Err(CoreError::InputMissing(format!(
                    "{} not found: {}",
                    what,
                    path.display()
                )));
            }
        }

        let document = tokio::fs::read_to_string(&request.cues_path)
            .await
            .map_err(|e| {
                CoreError::InputMissing(format!(
                    "cannot read cue document {}: {}",
                    request.cues_path.display(),
                    e
                ))
            })?;

        let outcome = parse_cue_document(&document);
        if !outcome.skipped.is_empty() {
            warn!(
                skipped = outcome.skipped.len(),
                "Cue document contained malformed blocks"
            );
        }
        let cues = outcome.require_cues()?;
        let cue_count = cues.len();

        let media = self.ffmpeg.probe(&request.video_path).await?;
        let video = media.video.as_ref().ok_or_else(|| {
            CoreError::MediaIo(format!(
                "no video stream in {}",
                request.video_path.display()
            ))
        })?;
        if media.duration_sec <= 0.0 {
            return Err(CoreError::MediaIo(format!(
                "cannot determine duration of {}",
                request.video_path.display()
            )));
        }

        let geometry = CanvasGeometry::compute(video.width, video.height, request.bar_percent)?;
        let rasterizer = CaptionRasterizer::from_style(request.style.clone());
        info!(
            width = geometry.original_width,
            height = geometry.original_height,
            bar_height = geometry.bar_height,
            fps = video.fps,
            duration = media.duration_sec,
            cues = cue_count,
            builtin_font = rasterizer.face().is_builtin(),
            "Compositing captions"
        );

        let timeline = CueTimeline::build(cues, media.duration_sec);
        let mut generator = BarFrameGenerator::new(
            timeline,
            rasterizer,
            geometry.encoded_width(),
            geometry.bar_height,
            video.fps,
        );
        let total_frames = generator.frame_count(media.duration_sec);

        let partial = PartialOutput::for_output(&request.output_path);
        let args = build_encode_args(
            &request.video_path,
            partial.path(),
            &geometry,
            &video.frame_rate,
            media.audio.is_some(),
            &self.encode,
            progress_tx.is_some(),
        );
        debug!(?args, "Spawning encoder");

        let mut cmd = self.ffmpeg.ffmpeg_command();
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(if progress_tx.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::piped());

        let child = cmd
            .spawn()
            .map_err(|e| CoreError::MediaIo(format!("Failed to spawn FFmpeg: {}", e)))?;
        let mut encoder = EncoderProcess {
            child,
            finished: false,
        };

        let stderr_handle = encoder.child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut stderr = stderr;
                let _ = stderr.read_to_end(&mut buf).await;
                String::from_utf8_lossy(&buf).to_string()
            })
        });

        if let (Some(tx), Some(stdout)) = (progress_tx, encoder.child.stdout.take()) {
            let duration = media.duration_sec;
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                let mut data = FFmpegProgressData::default();
                while let Ok(Some(line)) = lines.next_line().await {
                    if parse_ffmpeg_progress_line(&line, &mut data) && line.starts_with("progress=") {
                        let progress = calculate_encode_progress(&data, duration, total_frames);
                        if tx.send(progress).await.is_err() {
                            break;
                        }
                    }
                }
            });
        }

        let mut stdin = encoder
            .child
            .stdin
            .take()
            .ok_or_else(|| CoreError::MediaIo("FFmpeg stdin unavailable".to_string()))?;

        let write_task = async {
            let written = generator.write_frames(&mut stdin, total_frames).await;
            drop(stdin);
            written
        };
        let (written, status) = tokio::join!(write_task, encoder.wait());

        let status = status.map_err(|e| CoreError::MediaIo(format!("Failed to wait for FFmpeg: {}", e)))?;
        if !status.success() {
            let stderr_msg = match stderr_handle {
                Some(handle) => handle
                    .await
                    .unwrap_or_else(|_| "Failed to read stderr".to_string()),
                None => String::new(),
            };
            return Err(CoreError::MediaIo(format!(
                "FFmpeg exited with {}: {}",
                status,
                stderr_msg.trim()
            )));
        }
        let frames_written = written
            .map_err(|e| CoreError::MediaIo(format!("Failed to stream caption frames: {}", e)))?;

        let file_size = std::fs::metadata(partial.path()).map(|m| m.len()).unwrap_or(0);
        if file_size == 0 {
            return Err(CoreError::MediaIo(format!(
                "encoder produced no output for {}",
                request.output_path.display()
            )));
        }
        partial.commit(&request.output_path)?;

        let result = BurnResult {
            output_path: request.output_path.clone(),
            geometry,
            duration_sec: media.duration_sec,
            cue_count,
            frames_written,
            file_size,
            encoding_time_sec: start_time.elapsed().as_secs_f64(),
        };
        info!(
            output = %result.output_path.display(),
            frames = result.frames_written,
            bitmaps = generator.rasterized_count(),
            elapsed = result.encoding_time_sec,
            "Captions burned"
        );
        Ok(result)
    }
}

/// Builds the encoder arguments: input 0 is the source, input 1 the raw
/// RGBA bar stream on stdin.
fn build_encode_args(
    video: &Path,
    output: &Path,
    geometry: &CanvasGeometry,
    frame_rate: &str,
    has_audio: bool,
    encode: &EncodeSettings,
    with_progress: bool,
) -> Vec<String> {
    let filter = format!(
        "[0:v]crop={w}:{h}:0:0,setsar=1[top];[1:v]setsar=1[bar];\
         [top][bar]vstack=inputs=2:shortest=1,format={pix}[out]",
        w = geometry.encoded_width(),
        h = geometry.encoded_source_height(),
        pix = encode.pixel_format,
    );

    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-nostats".into(),
        "-y".into(),
        "-i".into(),
        video.to_string_lossy().to_string(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgba".into(),
        "-s".into(),
        format!("{}x{}", geometry.encoded_width(), geometry.bar_height),
        "-framerate".into(),
        frame_rate.to_string(),
        "-i".into(),
        "pipe:0".into(),
        "-filter_complex".into(),
        filter,
        "-map".into(),
        "[out]".into(),
    ];

    if has_audio {
        args.extend([
            "-map".into(),
            "0:a:0?".into(),
            "-c:a".into(),
            encode.audio_codec.clone(),
            "-b:a".into(),
            encode.audio_bitrate.clone(),
        ]);
    }

    args.extend([
        "-c:v".into(),
        encode.video_codec.clone(),
        "-preset".into(),
        encode.preset.clone(),
        "-crf".into(),
        encode.crf.to_string(),
        "-pix_fmt".into(),
        encode.pixel_format.clone(),
        "-threads".into(),
        encode.thread_count().to_string(),
        "-movflags".into(),
        "+faststart".into(),
    ]);

    if with_progress {
        args.extend(["-progress".into(), "pipe:1".into()]);
    }

    args.extend([
        "-f".into(),
        "mp4".into(),
        output.to_string_lossy().to_string(),
    ]);
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffmpeg::{detect_system_ffmpeg, FFmpegInfo};

    fn fake_compositor() -> CaptionCompositor {
        CaptionCompositor::new(
            FFmpegRunner::new(FFmpegInfo {
                ffmpeg_path: PathBuf::from("/nonexistent/ffmpeg"),
                ffprobe_path: PathBuf::from("/nonexistent/ffprobe"),
                version: "test".to_string(),
            }),
            EncodeSettings::default(),
        )
    }

    #[test]
    fn test_encode_args() {
        let geometry = CanvasGeometry::compute(1280, 720, 15.0).unwrap();
        let settings = EncodeSettings {
            threads: Some(4),
            ..Default::default()
        };
        let args = build_encode_args(
            Path::new("in.mp4"),
            Path::new("out.mp4.partial"),
            &geometry,
            "30000/1001",
            true,
            &settings,
            true,
        );
        let joined = args.join(" ");

        assert!(joined.contains("-f rawvideo -pix_fmt rgba -s 1280x108 -framerate 30000/1001 -i pipe:0"));
        assert!(joined.contains("vstack=inputs=2:shortest=1,format=yuv420p"));
        assert!(joined.contains("crop=1280:720:0:0"));
        assert!(joined.contains("-map 0:a:0? -c:a aac -b:a 192k"));
        assert!(joined.contains("-c:v libx264 -preset medium -crf 23"));
        assert!(joined.contains("-threads 4"));
        assert!(joined.contains("-movflags +faststart"));
        assert!(joined.contains("-progress pipe:1"));
        assert_eq!(args.last().unwrap(), "out.mp4.partial");
    }

    #[test]
    fn test_encode_args_without_audio() {
        let geometry = CanvasGeometry::compute(641, 481, 15.0).unwrap();
        let args = build_encode_args(
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            &geometry,
            "25",
            false,
            &EncodeSettings::default(),
            false,
        );
        assert!(!args.iter().any(|a| a == "-c:a"));
        assert!(!args.iter().any(|a| a == "-progress"));
        assert!(args.iter().any(|a| a.contains("crop=640:480:0:0")));
    }

    #[test]
    fn test_partial_output_removed_unless_committed() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("out.mp4");

        let partial = PartialOutput::for_output(&output);
        assert_eq!(partial.path(), dir.path().join("out.mp4.partial"));
        std::fs::write(partial.path(), b"data").unwrap();
        let partial_path = partial.path().to_path_buf();
        drop(partial);
        assert!(!partial_path.exists());

        let partial = PartialOutput::for_output(&output);
        std::fs::write(partial.path(), b"data").unwrap();
        std::fs::write(&output, b"stale").unwrap();
        partial.commit(&output).unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"data");
        assert!(!partial_path.exists());
    }

    #[tokio::test]
    async fn test_missing_inputs() {
        let dir = tempfile::TempDir::new().unwrap();
        let request = BurnRequest::new(
            dir.path().join("missing.mp4"),
            dir.path().join("missing.srt"),
            dir.path().join("out.mp4"),
        );
        let result = fake_compositor().burn(&request, None).await;
        assert!(matches!(result, Err(CoreError::InputMissing(_))));
    }

    #[tokio::test]
    async fn test_empty_cue_document_writes_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let video = dir.path().join("in.mp4");
        let cues = dir.path().join("in.srt");
        let output = dir.path().join("out.mp4");
        std::fs::write(&video, b"not really a video").unwrap();
        std::fs::write(&cues, "garbage\nmore garbage\n").unwrap();

        let request = BurnRequest::new(&video, &cues, &output);
        let result = fake_compositor().burn(&request, None).await;

        assert!(matches!(result, Err(CoreError::EmptyResult(_))));
        assert!(!output.exists());
        assert!(!dir.path().join("out.mp4.partial").exists());
    }

    /// Decodes the frame at `at_sec` as packed RGB24
    async fn grab_rgb_frame(runner: &FFmpegRunner, path: &Path, at_sec: f64) -> Vec<u8> {
        let output = runner
            .ffmpeg_command()
            .args(["-hide_banner", "-loglevel", "error", "-ss"])
            .arg(format!("{}", at_sec))
            .arg("-i")
            .arg(path)
            .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .output()
            .await
            .unwrap();
        assert!(output.status.success());
        output.stdout
    }

    #[tokio::test]
    async fn test_burn_end_to_end() {
        let info = match detect_system_ffmpeg() {
            Ok(info) => info,
            Err(_) => {
                println!("FFmpeg not available, skipping");
                return;
            }
        };
        let runner = FFmpegRunner::new(info);
        let dir = tempfile::TempDir::new().unwrap();
        let video = dir.path().join("source.mp4");

        let generated = runner
            .ffmpeg_command()
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-f",
                "lavfi",
                "-i",
                "testsrc=size=320x240:rate=10:duration=6",
                "-f",
                "lavfi",
                "-i",
                "sine=frequency=440:duration=6",
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
                "-c:a",
                "aac",
                "-shortest",
                "-y",
            ])
            .arg(&video)
            .status()
            .await;
        if !matches!(generated, Ok(status) if status.success()) {
            println!("FFmpeg cannot generate test media, skipping");
            return;
        }
        let source = runner.probe(&video).await.unwrap();

        let cues = dir.path().join("source.srt");
        std::fs::write(&cues, "1\n00:00:02,000 --> 00:00:04,500\nHello bar\n").unwrap();
        let output = dir.path().join("out.mp4");

        let compositor = CaptionCompositor::new(runner.clone(), EncodeSettings::default());
        let (tx, mut rx) = tokio::sync::mpsc::channel(64);
        let result = compositor
            .burn(&BurnRequest::new(&video, &cues, &output), Some(tx))
            .await
            .unwrap();

        assert_eq!(result.cue_count, 1);
        assert_eq!(result.geometry.bar_height, 50);
        assert!(output.exists());
        assert!(!dir.path().join("out.mp4.partial").exists());

        let probed = runner.probe(&output).await.unwrap();
        let out_video = probed.video.clone().unwrap();
        assert_eq!(out_video.width, 320);
        assert_eq!(out_video.height, 290);
        assert!(probed.audio.is_some());

        let frame_period = 1.0 / out_video.fps;
        assert!(
            (probed.duration_sec - source.duration_sec).abs() <= frame_period + 1e-3,
            "source {}s, output {}s",
            source.duration_sec,
            probed.duration_sec
        );

        // skip the rows next to the seam, where deblocking mixes in source pixels
        let bar_rows = |frame: &[u8]| -> Vec<u8> {
            assert_eq!(frame.len(), 320 * 290 * 3);
            frame[320 * 244 * 3..].to_vec()
        };

        let outside = bar_rows(&grab_rgb_frame(&runner, &output, 1.0).await);
        assert!(
            outside.iter().all(|&v| v >= 245),
            "bar should be blank outside the cue"
        );

        let inside = bar_rows(&grab_rgb_frame(&runner, &output, 3.0).await);
        assert!(
            inside.chunks_exact(3).any(|px| px.iter().all(|&v| v < 100)),
            "bar should carry dark text inside the cue"
        );

        let after = bar_rows(&grab_rgb_frame(&runner, &output, 5.0).await);
        assert!(after.iter().all(|&v| v >= 245));

        // the channel closes once the encoder's progress stream ends
        let mut saw_progress = false;
        while let Some(progress) = rx.recv().await {
            assert!(progress.percent <= 100.0);
            saw_progress = true;
        }
        assert!(saw_progress);
    }
}
