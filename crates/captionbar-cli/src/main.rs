//! captionbar CLI
//!
//! Transcribes videos and burns the captions into a bar under the picture.

mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use captionbar_core::captions::TextAlignment;
use captionbar_core::ffmpeg::{detect_ffmpeg, EncodeProgress, FFmpegRunner, MediaInfo};
use captionbar_core::pipeline::{Pipeline, PipelineResult};
use captionbar_core::render::{BurnRequest, CanvasGeometry, CaptionCompositor};
use captionbar_core::settings::{default_settings_path, PipelineSettings};
use captionbar_core::text::CaptionRasterizer;
use captionbar_core::transcription::LazyTranscriber;

#[derive(Parser, Debug)]
#[command(name = "captionbar", version, about = "Burn transcribed captions into a video")]
struct Cli {
    /// Settings file (defaults to the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write daily rolling logs to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transcribe a video and burn the captions in
    Burn(BurnArgs),
    /// Burn an existing cue document into a video
    Render(RenderArgs),
    /// Rasterize caption text into a PNG
    Raster(RasterArgs),
    /// Print media info and caption bar geometry as JSON
    Probe(ProbeArgs),
}

#[derive(Args, Debug)]
struct BurnArgs {
    video: PathBuf,
    /// Prepended to every file name of the run
    #[arg(long, default_value = "processed_")]
    prefix: String,
    /// Spoken language ("auto" to detect)
    #[arg(long)]
    language: Option<String>,
    #[arg(long)]
    work_dir: Option<PathBuf>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Whisper model file
    #[arg(long)]
    model: Option<PathBuf>,
    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct RenderArgs {
    video: PathBuf,
    cues: PathBuf,
    output: PathBuf,
    /// Bar height as a percentage of the video height
    #[arg(long)]
    bar_percent: Option<f64>,
}

#[derive(Args, Debug)]
struct RasterArgs {
    text: String,
    #[arg(long)]
    width: u32,
    #[arg(long)]
    height: u32,
    #[arg(long)]
    out: PathBuf,
    /// Starting font size (defaults to the bar-height policy)
    #[arg(long)]
    font_size: Option<u32>,
    /// Font file
    #[arg(long)]
    font: Option<PathBuf>,
    #[arg(long)]
    align: Option<TextAlignment>,
}

#[derive(Args, Debug)]
struct ProbeArgs {
    video: PathBuf,
    #[arg(long)]
    bar_percent: Option<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProbeReport {
    media: MediaInfo,
    geometry: Option<CanvasGeometry>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.log_dir.as_deref(), cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = load_settings(cli.config.as_deref())?;
    match cli.command {
        Command::Burn(args) => burn(settings, args).await,
        Command::Render(args) => render(settings, args).await,
        Command::Raster(args) => raster(settings, args),
        Command::Probe(args) => probe(settings, args).await,
    }
}

fn load_settings(explicit: Option<&Path>) -> Result<PipelineSettings> {
    match explicit {
        Some(path) => PipelineSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display())),
        None => Ok(PipelineSettings::load_or_default(&default_settings_path())),
    }
}

fn ffmpeg_runner(settings: &PipelineSettings) -> Result<FFmpegRunner> {
    let info = detect_ffmpeg(
        settings.ffmpeg.ffmpeg_path.as_deref(),
        settings.ffmpeg.ffprobe_path.as_deref(),
    )
    .context("locating FFmpeg")?;
    info!(version = %info.version, path = %info.ffmpeg_path.display(), "Using FFmpeg");
    Ok(FFmpegRunner::new(info))
}

fn progress_channel() -> tokio::sync::mpsc::Sender<EncodeProgress> {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<EncodeProgress>(32);
    tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            info!(
                percent = %format!("{:.1}", progress.percent),
                frame = progress.frame,
                eta = progress.eta_seconds,
                "Encoding"
            );
        }
    });
    tx
}

async fn burn(mut settings: PipelineSettings, args: BurnArgs) -> Result<ExitCode> {
    if let Some(dir) = args.work_dir {
        settings.paths.work_dir = dir;
    }
    if let Some(dir) = args.output_dir {
        settings.paths.output_dir = dir;
    }
    if let Some(model) = args.model {
        settings.transcription.model_path = Some(model);
    }
    if let Some(language) = args.language {
        settings.transcription.options.language = Some(language);
    }

    let metadata = tokio::fs::metadata(&args.video)
        .await
        .with_context(|| format!("reading {}", args.video.display()))?;
    if !metadata.is_file() {
        bail!("{} is not a file", args.video.display());
    }
    let name = args
        .video
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload.mp4".to_string());

    let runner = ffmpeg_runner(&settings)?;
    let transcriber = LazyTranscriber::whisper(
        settings.transcription.resolved_model_path(),
        settings.transcription.options.clone(),
    );
    let pipeline = Pipeline::new(settings, runner, transcriber).with_progress(progress_channel());

    let file = tokio::fs::File::open(&args.video).await?;
    let result = pipeline
        .process(file, &name, metadata.len(), &args.prefix)
        .await;

    print_result(&result, args.json)?;
    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_result(result: &PipelineResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    if let Some(path) = &result.output_video_path {
        println!("output: {}", path.display());
    }
    if let Some(text) = &result.transcript_text {
        println!("transcript: {}", text);
    }
    if let Some(error) = &result.error {
        eprintln!("error: {}", error);
    }
    Ok(())
}

async fn render(settings: PipelineSettings, args: RenderArgs) -> Result<ExitCode> {
    let runner = ffmpeg_runner(&settings)?;
    let compositor = CaptionCompositor::new(runner, settings.encode.clone());
    let request = BurnRequest {
        video_path: args.video,
        cues_path: args.cues,
        output_path: args.output,
        bar_percent: args.bar_percent.unwrap_or(settings.caption.bar_percent),
        style: settings.caption.style.clone(),
    };

    let result = compositor.burn(&request, Some(progress_channel())).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(ExitCode::SUCCESS)
}

fn raster(settings: PipelineSettings, args: RasterArgs) -> Result<ExitCode> {
    if args.width == 0 || args.height == 0 {
        bail!("--width and --height must be positive");
    }
    let mut style = settings.caption.style;
    if args.font.is_some() {
        style.font_path = args.font;
    }
    if let Some(align) = args.align {
        style.alignment = align;
    }
    let font_size = args
        .font_size
        .unwrap_or_else(|| style.initial_font_size(args.height));

    let rasterizer = CaptionRasterizer::from_style(style);
    let image = rasterizer.render(&args.text, args.width, args.height, font_size);
    image
        .save(&args.out)
        .with_context(|| format!("writing {}", args.out.display()))?;
    println!("{}", args.out.display());
    Ok(ExitCode::SUCCESS)
}

async fn probe(settings: PipelineSettings, args: ProbeArgs) -> Result<ExitCode> {
    let runner = ffmpeg_runner(&settings)?;
    let media = runner.probe(&args.video).await?;
    let bar_percent = args.bar_percent.unwrap_or(settings.caption.bar_percent);
    let geometry = match &media.video {
        Some(video) => Some(CanvasGeometry::compute(video.width, video.height, bar_percent)?),
        None => None,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&ProbeReport { media, geometry })?
    );
    Ok(ExitCode::SUCCESS)
}
