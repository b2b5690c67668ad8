use std::{io::Write as _, path::PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "vidstyle", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stylize a video (requires `ffmpeg` and `ffprobe` on PATH).
    Render(RenderArgs),
    /// List the selectable styles.
    Styles,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Style id or label, e.g. `oil_painting` or "Oil Painting".
    #[arg(long)]
    style: String,

    /// Effect strength, 0..=100.
    #[arg(long, default_value_t = 50)]
    strength: i64,

    /// Saturation adjustment, -100..=100.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    saturation: i64,

    /// Brightness adjustment, -100..=100.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    brightness: i64,

    /// Output scale factor, 0.25..=1.0.
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Filter backend. Overrides the config file and `VIDSTYLE_BACKEND`.
    #[arg(long, value_enum)]
    backend: Option<BackendChoice>,

    /// Frames per batch.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Worker threads.
    #[arg(long)]
    workers: Option<usize>,

    /// Pipeline config JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug-level logging (unless `RUST_LOG` is set).
    #[arg(long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendChoice {
    Auto,
    Cpu,
    Gpu,
}

impl From<BackendChoice> for vidstyle::BackendPreference {
    fn from(choice: BackendChoice) -> Self {
        match choice {
            BackendChoice::Auto => Self::Auto,
            BackendChoice::Cpu => Self::Cpu,
            BackendChoice::Gpu => Self::Gpu,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Styles => cmd_styles(),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn cmd_styles() -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    for style in vidstyle::StyleSelector::ALL {
        let note = if style.is_active() {
            ""
        } else {
            " (identity)"
        };
        writeln!(out, "{:<16} {}{note}", style.id(), style.label())?;
    }
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    init_tracing(args.verbose);

    let style: vidstyle::StyleSelector = args.style.parse()?;
    let params = vidstyle::ParameterSet::validate(
        args.strength,
        args.saturation,
        args.brightness,
        args.scale,
    )?;

    let mut config = match &args.config {
        Some(path) => vidstyle::PipelineConfig::from_json_file(path)?,
        None => vidstyle::PipelineConfig::default(),
    }
    .with_env_overrides();
    if let Some(choice) = args.backend {
        config.backend = choice.into();
    }
    if let Some(n) = args.batch_size {
        config.batch_size = n;
    }
    if let Some(n) = args.workers {
        config.workers = Some(n);
    }

    let request = vidstyle::RunRequest::new(args.in_path.clone(), args.out.clone(), style, params);

    let mut last_percent = None;
    let outcome = vidstyle::run_with_events(request, config, vidstyle::FfmpegMedia, |event| {
        match event {
            vidstyle::ProgressEvent::Progress(p) if last_percent != Some(p) => {
                last_percent = Some(p);
                eprint!("\rprogress: {p:>3}%");
                if p == 100 {
                    eprintln!();
                }
            }
            vidstyle::ProgressEvent::Failed(_) if last_percent.is_some_and(|p| p < 100) => {
                eprintln!();
            }
            _ => {}
        }
    })
    .with_context(|| format!("stylize '{}'", args.in_path.display()))?;

    match outcome {
        vidstyle::RunOutcome::Done(report) => {
            eprintln!(
                "wrote {} ({} frames, {}, {:?} backend, audio: {:?})",
                report.output.display(),
                report.frames_written,
                report.dimensions,
                report.backend,
                report.audio
            );
        }
        vidstyle::RunOutcome::Cancelled => eprintln!("cancelled"),
    }
    Ok(())
}
