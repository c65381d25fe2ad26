use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::pipeline::context::{ErrorState, Phase, Stage};
use crate::pipeline::domain::EfResult;
use crate::pipeline::epoch::PipelineEpoch;
use crate::pipeline::orchestration::SegmentationProgress;

pub const PLACEHOLDER_TEXT: &str = "--%";

/// What a pipeline run tells the outside world. Every event carries its epoch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PresenterEvent {
    PhaseChanged { epoch: PipelineEpoch, phase: Phase },
    Progress(SegmentationProgress),
    Completed { epoch: PipelineEpoch, result: EfResult },
    Failed { epoch: PipelineEpoch, error: ErrorState },
}

impl PresenterEvent {
    pub fn epoch(&self) -> PipelineEpoch {
        match self {
            PresenterEvent::PhaseChanged { epoch, .. }
            | PresenterEvent::Completed { epoch, .. }
            | PresenterEvent::Failed { epoch, .. } => *epoch,
            PresenterEvent::Progress(progress) => progress.epoch,
        }
    }
}

/// Sink for pipeline events.
///
/// Called while the controller holds its state lock, so implementations must
/// return quickly and must not call back into the controller.
pub trait Presenter: Send + Sync {
    fn present(&self, event: PresenterEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPresenter;

impl Presenter for LoggingPresenter {
    fn present(&self, event: PresenterEvent) {
        match event {
            PresenterEvent::PhaseChanged { epoch, phase } => {
                info!("[{}] {}", epoch, phase.as_str())
            }
            PresenterEvent::Progress(progress) => info!(
                "[{}] {} of {} frames segmented",
                progress.epoch, progress.segmented, progress.total
            ),
            PresenterEvent::Completed { epoch, result } => {
                if result.is_within_bounds() {
                    info!("[{}] AFC {:.2}%", epoch, result.percentage)
                } else {
                    warn!("[{}] AFC {:.2}% is outside 0-100%", epoch, result.percentage)
                }
            }
            PresenterEvent::Failed { epoch, error } => error!("[{}] {}", epoch, error),
        }
    }
}

/// Publishes events on a broadcast channel for any number of UI subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastPresenter {
    tx: broadcast::Sender<PresenterEvent>,
}

impl BroadcastPresenter {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<PresenterEvent>) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PresenterEvent> {
        self.tx.subscribe()
    }
}

impl Presenter for BroadcastPresenter {
    fn present(&self, event: PresenterEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }
}

/// User-facing text for the ejection fraction panel.
///
/// Shows `--%` until a result exists and ignores events from epochs older
/// than the newest one it has seen.
#[derive(Debug, Clone)]
pub struct EjectionFractionDisplay {
    precision: usize,
    epoch: PipelineEpoch,
    value: String,
    status: String,
}

impl EjectionFractionDisplay {
    pub fn new(precision: usize) -> Self {
        Self {
            precision,
            epoch: PipelineEpoch::default(),
            value: PLACEHOLDER_TEXT.to_string(),
            status: "No video selected".to_string(),
        }
    }

    pub fn value_text(&self) -> &str {
        &self.value
    }

    pub fn status_text(&self) -> &str {
        &self.status
    }

    pub fn apply(&mut self, event: &PresenterEvent) {
        let epoch = event.epoch();
        if epoch < self.epoch {
            return;
        }
        if epoch > self.epoch {
            self.epoch = epoch;
            self.value = PLACEHOLDER_TEXT.to_string();
        }

        match event {
            PresenterEvent::PhaseChanged { phase, .. } => match phase {
                Phase::Idle => self.status = "Waiting".to_string(),
                Phase::Extracting => self.status = "Extracting frames".to_string(),
                Phase::Segmenting => self.status = "Segmenting frames".to_string(),
                Phase::Analyzing => self.status = "Analyzing cardiac cycle".to_string(),
                Phase::Done | Phase::Failed => {}
            },
            PresenterEvent::Progress(progress) => {
                self.status = format!(
                    "{} of {} frames segmented",
                    progress.segmented, progress.total
                );
            }
            PresenterEvent::Completed { result, .. } => {
                self.value = format!("{:.*}%", self.precision, result.percentage);
                self.status = if result.is_within_bounds() {
                    "Done".to_string()
                } else {
                    "Done (value outside 0-100%, check segmentation)".to_string()
                };
            }
            PresenterEvent::Failed { error, .. } => {
                self.value = PLACEHOLDER_TEXT.to_string();
                self.status = Self::failure_text(error);
            }
        }
    }

    fn failure_text(error: &ErrorState) -> String {
        let prefix = match error.stage {
            Stage::Extracting => "Could not read the video",
            Stage::Segmenting => "Segmentation failed",
            Stage::Analyzing => "Cardiac cycle analysis failed",
            Stage::EfEngine => "Ejection fraction could not be computed",
        };
        format!("{}: {}", prefix, error.message)
    }
}
