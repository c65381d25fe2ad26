use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use echo_afc::config::Configuration;
use echo_afc::coordinator::PipelineController;
use echo_afc::error::AppError;
use echo_afc::intake::{ImageSequenceSource, VideoHandle};
use echo_afc::pipeline::{RunOutcome, RunReport};
use echo_afc::presenter::{EjectionFractionDisplay, LoggingPresenter, PresenterEvent};
use echo_afc::segmentation::IntensityThresholdBackend;
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory of decoded frame images, ordered by file name
    frames_dir: PathBuf,

    /// Configuration file (TOML, JSON or YAML), layered under ECHO_AFC_* variables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Frames per second to sample from the sequence
    #[arg(long)]
    sampling_rate_hz: Option<f64>,

    /// Upper bound on segmentation calls in flight
    #[arg(long)]
    max_concurrent_segmentations: Option<usize>,
}

fn init_logging(level: Level) {
    tracing_subscriber::fmt().with_max_level(level).init();
}

async fn run(args: Args, configuration: Configuration) -> Result<RunReport, AppError> {
    let mut builder = PipelineController::builder(configuration.clone())
        .frame_source(Arc::new(ImageSequenceSource::new(configuration.source_fps)))
        .segmentation_backend(Arc::new(IntensityThresholdBackend::new(
            configuration.max_blood_pool_intensity,
        )))
        .presenter(Arc::new(LoggingPresenter));
    if let Some(sampling_rate_hz) = args.sampling_rate_hz {
        builder = builder.sampling_rate_hz(sampling_rate_hz);
    }
    if let Some(max_concurrent_segmentations) = args.max_concurrent_segmentations {
        builder = builder.max_concurrent_segmentations(max_concurrent_segmentations);
    }
    let controller = builder.build()?;

    controller
        .select_video(VideoHandle::new(args.frames_dir))
        .wait()
        .await?
        .ok_or_else(|| AppError::Pipeline("Run was superseded".to_string()))
}

fn panel_for(report: &RunReport, precision: usize) -> EjectionFractionDisplay {
    let event = match &report.outcome {
        RunOutcome::Done { result } => PresenterEvent::Completed {
            epoch: report.epoch,
            result: *result,
        },
        RunOutcome::Failed { error } => PresenterEvent::Failed {
            epoch: report.epoch,
            error: error.clone(),
        },
    };
    let mut panel = EjectionFractionDisplay::new(precision);
    panel.apply(&event);
    panel
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();
    let configuration = Configuration::load(args.config.as_deref())?;
    init_logging(configuration.tracing_level()?);

    let precision = configuration.display_precision;
    let report = run(args, configuration).await?;

    let panel = panel_for(&report, precision);
    let (value, status) = (panel.value_text(), panel.status_text());
    info!("AFC {} ({})", value, status);

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use image::{GrayImage, Luma};
    use std::path::Path;

    /// Writes 16x16 frames, each with the given number of dark blood-pool pixels.
    fn write_frames(dir: &Path, dark_pixels: &[u32]) {
        for (i, &dark) in dark_pixels.iter().enumerate() {
            let image = GrayImage::from_fn(16, 16, |x, y| {
                if y * 16 + x < dark {
                    Luma([10])
                } else {
                    Luma([200])
                }
            });
            image.save(dir.join(format!("frame_{:03}.png", i))).unwrap();
        }
    }

    #[test]
    fn command_line_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_frames_dir_and_overrides() {
        let args = Args::try_parse_from([
            "echo-afc",
            "clip",
            "--config",
            "afc.toml",
            "--sampling-rate-hz",
            "15",
            "--max-concurrent-segmentations",
            "2",
        ])
        .unwrap();
        assert_eq!(args.frames_dir, PathBuf::from("clip"));
        assert_eq!(args.config, Some(PathBuf::from("afc.toml")));
        assert_eq!(args.sampling_rate_hz, Some(15.0));
        assert_eq!(args.max_concurrent_segmentations, Some(2));
    }

    #[test]
    fn help_and_missing_dir_are_usage_errors() {
        let help = Args::try_parse_from(["echo-afc", "--help"]).unwrap_err();
        assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);

        let missing = Args::try_parse_from(["echo-afc"]).unwrap_err();
        assert_eq!(
            missing.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[tokio::test]
    async fn runs_an_image_sequence_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), &[100, 40, 80]);
        let frames_dir = dir.path().to_str().unwrap();
        let args = Args::try_parse_from([
            "echo-afc",
            frames_dir,
            "--max-concurrent-segmentations",
            "2",
        ])
        .unwrap();

        let report = run(args, Configuration::default()).await.unwrap();

        let result = report.result().copied().unwrap();
        assert_eq!((result.ed_area, result.es_area), (100, 40));
        assert_eq!(result.percentage, 60.0);
        assert_eq!(report.frames_total, 3);

        let panel = panel_for(&report, 0);
        assert_eq!(panel.value_text(), "60%");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"]["status"], "done");
    }

    #[tokio::test]
    async fn missing_directory_reports_extraction_failure() {
        let args = Args::try_parse_from(["echo-afc", "/definitely/not/a/clip"]).unwrap();

        let report = run(args, Configuration::default()).await.unwrap();

        assert!(report.result().is_none());
        let panel = panel_for(&report, 0);
        assert_eq!(panel.value_text(), "--%");
        assert!(panel.status_text().starts_with("Could not read the video"));
    }
}
