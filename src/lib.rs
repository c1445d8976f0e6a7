//! Smearscope: capture, analysis and inspection client for blood smear
//! diagnostics.
//!
//! Images are acquired either from a file or from a short-polled camera
//! preview served by the backend, submitted for analysis, and the returned
//! detections are drawn onto the image for zoomable inspection.
//!
//! # Modules
//!
//! - [`model`]: Result, detection and geometry types
//! - [`acquisition`]: Upload/camera mode state machine
//! - [`preview`]: Camera preview polling and failure escalation
//! - [`capture`]: Frozen image artifacts
//! - [`submit`]: Serialized analysis submission and confirmation
//! - [`annotate`]: Deterministic overlay rendering
//! - [`viewport`]: Zoom and pan of the annotated result
//! - [`workflow`]: The event loop tying the above together
//! - [`backend`]: The backend service contract and its HTTP client
//! - [`validation`]: Client-side checks and their messages
//! - [`error`]: Error types for smearscope operations

pub mod acquisition;
pub mod annotate;
pub mod backend;
pub mod capture;
pub mod config;
pub mod error;
pub mod model;
pub mod preview;
pub mod submit;
pub mod validation;
pub mod viewport;
pub mod workflow;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use image::RgbImage;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

pub use error::SmearscopeError;

use backend::{HttpBackend, StaticToken};
use capture::CapturedArtifact;
use config::Settings;
use model::{format_percent, ResultId, ResultLabel};
use submit::{AnalysisSubmitter, SubmissionForm};
use viewport::{render_view, ViewportController, ZoomLimits};
use workflow::{Completed, Operator, Workstation};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "SMEARSCOPE_LOG";

/// The smearscope CLI application.
#[derive(Parser)]
#[command(name = "smearscope")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Backend root URL.
    #[arg(long, global = true, env = "SMEARSCOPE_SERVER", default_value = config::DEFAULT_SERVER)]
    server: String,

    /// Bearer token sent with every backend request.
    #[arg(long, global = true, env = "SMEARSCOPE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Camera preview poll interval in milliseconds.
    #[arg(long, global = true, value_name = "MS")]
    poll_interval_ms: Option<u64>,

    /// Per-request timeout in milliseconds.
    #[arg(long, global = true, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Output format for printed results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Submit an image file for analysis.
    Analyze(AnalyzeArgs),
    /// Capture a frame from the camera preview and submit it.
    Capture(CaptureArgs),
    /// Draw detections onto an image without contacting the backend.
    Annotate(AnnotateArgs),
    /// Record a technician's verdict on a stored result.
    Confirm(ConfirmArgs),
}

/// Context sent along with the image.
#[derive(clap::Args)]
struct PatientArgs {
    /// Patient the image belongs to.
    #[arg(long)]
    patient: String,

    /// Clinic id; defaults to the operator's clinic.
    #[arg(long)]
    clinic: Option<String>,

    #[arg(long)]
    symptoms: Option<String>,

    #[arg(long)]
    notes: Option<String>,
}

impl PatientArgs {
    fn form(&self, upload: Option<CapturedArtifact>) -> SubmissionForm {
        SubmissionForm {
            patient_id: self.patient.clone(),
            clinic_id: self.clinic.clone(),
            upload,
            symptoms: self.symptoms.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// Where and how to write the annotated result.
#[derive(clap::Args)]
struct ViewArgs {
    /// Write the annotated image (JPEG) to this file.
    #[arg(long, value_name = "FILE")]
    annotated: Option<PathBuf>,

    /// Zoom steps applied before writing; negative values zoom out.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    zoom: i32,
}

/// Arguments for the analyze subcommand.
#[derive(clap::Args)]
struct AnalyzeArgs {
    #[command(flatten)]
    patient: PatientArgs,

    /// Image file to analyze.
    #[arg(long)]
    image: PathBuf,

    #[command(flatten)]
    view: ViewArgs,
}

/// Arguments for the capture subcommand.
#[derive(clap::Args)]
struct CaptureArgs {
    #[command(flatten)]
    patient: PatientArgs,

    /// Preview frames to wait for before capturing.
    #[arg(long, default_value_t = 1)]
    settle_frames: u32,

    #[command(flatten)]
    view: ViewArgs,
}

/// Arguments for the annotate subcommand.
#[derive(clap::Args)]
struct AnnotateArgs {
    /// Source image.
    #[arg(long)]
    image: PathBuf,

    /// JSON detections: a list, or an analysis response with `detections`.
    #[arg(long)]
    detections: PathBuf,

    /// Output JPEG.
    #[arg(long)]
    out: PathBuf,

    /// Zoom steps applied before writing; negative values zoom out.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    zoom: i32,
}

/// Arguments for the confirm subcommand.
#[derive(clap::Args)]
struct ConfirmArgs {
    /// Result id returned by the analysis.
    #[arg(long)]
    result_id: ResultId,

    /// Confirmed outcome (positive, negative or inconclusive).
    #[arg(long)]
    result: ResultLabel,

    #[arg(long)]
    notes: Option<String>,
}

/// Run the smearscope CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), SmearscopeError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Some(Commands::Analyze(args)) => run_analyze(&cli, args),
        Some(Commands::Capture(args)) => run_capture(&cli, args),
        Some(Commands::Annotate(args)) => run_annotate(&cli, args),
        Some(Commands::Confirm(args)) => run_confirm(&cli, args),
        None => {
            println!("smearscope {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Capture, analysis and inspection client for blood smear diagnostics.");
            println!();
            println!("Run 'smearscope --help' for usage information.");
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "smearscope=debug",
        _ => "smearscope=trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn settings(cli: &Cli) -> Settings {
    let mut settings = Settings::default();
    if let Some(ms) = cli.poll_interval_ms {
        settings = settings.with_poll_interval(Duration::from_millis(ms));
    }
    if let Some(ms) = cli.timeout_ms {
        settings = settings.with_request_timeout(Duration::from_millis(ms));
    }
    settings
}

fn http_backend(cli: &Cli) -> Result<HttpBackend, SmearscopeError> {
    let base = config::parse_server(&cli.server)?;
    Ok(HttpBackend::new(base, StaticToken::new(cli.token.clone()))?)
}

fn runtime() -> Result<tokio::runtime::Runtime, SmearscopeError> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

/// Runs a workstation against the configured backend while `script` drives
/// it; the workstation shuts down once the script returns.
fn run_session<S, F, T>(cli: &Cli, script: S) -> Result<T, SmearscopeError>
where
    S: FnOnce(Operator) -> F,
    F: Future<Output = Result<T, SmearscopeError>>,
{
    let backend = http_backend(cli)?;
    let (mut workstation, events) = Workstation::new(backend, settings(cli));
    let (commands, receiver) = mpsc::channel(16);
    let operator = Operator::new(commands, events);

    runtime()?.block_on(async move {
        let (_, outcome) = tokio::join!(workstation.run(receiver), script(operator));
        outcome
    })
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}

/// Execute the analyze subcommand.
fn run_analyze(cli: &Cli, args: &AnalyzeArgs) -> Result<(), SmearscopeError> {
    let bytes = std::fs::read(&args.image)?;
    let upload = CapturedArtifact::from_upload(bytes, file_name_of(&args.image));
    let form = args.patient.form(Some(upload));

    let completed = run_session(cli, |mut operator| async move {
        operator.analyze_upload(form).await
    })?;
    let written = write_view(&args.view, &completed)?;
    print_completed(cli.output, &completed, written.as_deref())
}

/// Execute the capture subcommand.
fn run_capture(cli: &Cli, args: &CaptureArgs) -> Result<(), SmearscopeError> {
    let form = args.patient.form(None);
    let settle_frames = args.settle_frames;

    let completed = run_session(cli, |mut operator| async move {
        operator.capture_and_analyze(form, settle_frames).await
    })?;
    let written = write_view(&args.view, &completed)?;
    print_completed(cli.output, &completed, written.as_deref())
}

/// Execute the annotate subcommand.
fn run_annotate(cli: &Cli, args: &AnnotateArgs) -> Result<(), SmearscopeError> {
    let source = image::open(&args.image)
        .map_err(|source| SmearscopeError::ImageRead {
            path: args.image.clone(),
            source,
        })?
        .to_rgb8();
    let json = std::fs::read(&args.detections)?;
    let detections =
        annotate::parse_detections(&json).map_err(|source| SmearscopeError::DetectionsParse {
            path: args.detections.clone(),
            source,
        })?;

    let annotated = annotate::annotate(&source, &detections)?;
    let jpeg = zoomed_jpeg(&annotated.raster, &annotated.jpeg, args.zoom)?;
    std::fs::write(&args.out, jpeg)?;

    match cli.output {
        OutputFormat::Json => {
            let boxes: Vec<_> = annotated
                .boxes
                .iter()
                .map(|drawn| {
                    serde_json::json!({
                        "index": drawn.index,
                        "caption": drawn.caption,
                        "x1": drawn.bbox.xmin(),
                        "y1": drawn.bbox.ymin(),
                        "x2": drawn.bbox.xmax(),
                        "y2": drawn.bbox.ymax(),
                    })
                })
                .collect();
            let report = serde_json::json!({
                "output": args.out,
                "detections": detections.len(),
                "drawn": boxes,
            });
            print_json(&report)
        }
        OutputFormat::Text => {
            println!(
                "Annotated {} of {} detection(s) -> {}",
                annotated.boxes.len(),
                detections.len(),
                args.out.display()
            );
            for drawn in &annotated.boxes {
                println!(
                    "  {}. {} at ({:.0}, {:.0})-({:.0}, {:.0})",
                    drawn.index + 1,
                    drawn.caption,
                    drawn.bbox.xmin(),
                    drawn.bbox.ymin(),
                    drawn.bbox.xmax(),
                    drawn.bbox.ymax()
                );
            }
            Ok(())
        }
    }
}

/// Execute the confirm subcommand.
fn run_confirm(cli: &Cli, args: &ConfirmArgs) -> Result<(), SmearscopeError> {
    let settings = settings(cli);
    let backend = http_backend(cli)?;
    let submitter = AnalysisSubmitter::new(settings.request_timeout, settings.max_upload_bytes);
    let pending =
        submitter.prepare_confirmation(Some(args.result_id), Some(args.result), args.notes.clone())?;
    let receipt = runtime()?.block_on(pending.send(&backend))?;

    match cli.output {
        OutputFormat::Json => print_json(&receipt),
        OutputFormat::Text => {
            println!("Confirmed {} as {}", receipt.test_result_id.short(), args.result);
            if !receipt.message.is_empty() {
                println!("{}", receipt.message);
            }
            Ok(())
        }
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<(), SmearscopeError> {
    let text = serde_json::to_string_pretty(value).map_err(SmearscopeError::JsonWrite)?;
    println!("{}", text);
    Ok(())
}

/// The JPEG to write: the annotated image as is, or its zoomed view.
fn zoomed_jpeg(raster: &RgbImage, jpeg: &[u8], steps: i32) -> Result<Vec<u8>, SmearscopeError> {
    if steps == 0 {
        return Ok(jpeg.to_vec());
    }
    let limits = ZoomLimits::default();
    // Steps past the end of the zoom range change nothing.
    let reach = ((limits.max - limits.min) / limits.step).ceil() as u32;
    let mut viewport = ViewportController::new(limits);
    for _ in 0..steps.unsigned_abs().min(reach) {
        if steps > 0 {
            viewport.zoom_in();
        } else {
            viewport.zoom_out();
        }
    }
    let view = render_view(raster, &viewport.state());
    annotate::encode_jpeg(&view).map_err(SmearscopeError::ImageEncode)
}

fn write_view(view: &ViewArgs, completed: &Completed) -> Result<Option<PathBuf>, SmearscopeError> {
    let Some(path) = &view.annotated else {
        return Ok(None);
    };
    let Some(annotated) = &completed.annotated else {
        tracing::warn!(path = %path.display(), "no annotated image to write");
        return Ok(None);
    };
    let jpeg = zoomed_jpeg(&annotated.raster, &annotated.jpeg, view.zoom)?;
    std::fs::write(path, jpeg)?;
    Ok(Some(path.clone()))
}

fn print_completed(
    format: OutputFormat,
    completed: &Completed,
    written: Option<&Path>,
) -> Result<(), SmearscopeError> {
    let result = &completed.result;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "result": result,
            "confidence_level": result.confidence_level().to_string(),
            "annotated": written,
        })),
        OutputFormat::Text => {
            println!("Result:     {}", result.summary());
            println!("Result ID:  {}", result.result_id);
            println!("Processing: {:.0} ms", result.processing_time_ms);
            println!("Detections: {}", result.detections.len());
            for (i, detection) in result.detections.iter().enumerate() {
                println!(
                    "  {}. {} ({})",
                    i + 1,
                    detection.label,
                    format_percent(detection.confidence)
                );
            }
            if let Some(path) = written {
                println!("Annotated:  {}", path.display());
            }
            Ok(())
        }
    }
}
