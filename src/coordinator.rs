use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn, Instrument};

use crate::common::FrameBatch;
use crate::config::Configuration;
use crate::error::{AppError, ExtractionError};
use crate::intake::{FrameSource, VideoHandle};
use crate::pipeline::context::{ErrorKind, ErrorState, Phase, PipelineState, Stage};
use crate::pipeline::domain::{AreaComputer, CardiacCycleAnalyzer, EfEngine};
use crate::pipeline::epoch::{EpochClock, PipelineEpoch};
use crate::pipeline::orchestration::{
    Aggregation, SegmentationEvent, SegmentationOrchestrator, SegmentationProgress,
};
use crate::pipeline::report::{ReportDraft, RunOutcome, RunReport};
use crate::presenter::{LoggingPresenter, Presenter, PresenterEvent};
use crate::segmentation::SegmentationBackend;

/// Drives one video at a time through extraction, segmentation, cycle
/// analysis and the ejection fraction computation.
///
/// Selecting a new video supersedes whatever run is in flight: its state
/// writes and presenter events are dropped from then on.
pub struct PipelineController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    configuration: Configuration,
    clock: EpochClock,
    source: Arc<dyn FrameSource>,
    orchestrator: SegmentationOrchestrator,
    analyzer: CardiacCycleAnalyzer,
    engine: EfEngine,
    presenter: Arc<dyn Presenter>,
    state: Mutex<PipelineState>,
}

impl PipelineController {
    pub fn builder(configuration: Configuration) -> PipelineControllerBuilder {
        PipelineControllerBuilder::new(configuration)
    }

    /// Starts a run for `video` and returns immediately.
    #[instrument(skip(self, video), fields(video = %video))]
    pub fn select_video(&self, video: VideoHandle) -> RunHandle {
        let epoch = self
            .inner
            .begin(&[PipelineState::Idle, PipelineState::Extracting]);
        info!("Selected {} as {}", video.display_name(), epoch);

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move { inner.run(epoch, video).await }.in_current_span());
        RunHandle { epoch, handle }
    }

    pub fn state(&self) -> PipelineState {
        self.inner.lock_state().clone()
    }

    pub fn epoch(&self) -> PipelineEpoch {
        self.inner.clock.current()
    }

    pub fn configuration(&self) -> &Configuration {
        &self.inner.configuration
    }

    /// Abandons the current run, if any, and returns to `Idle`.
    pub fn stop(&self) {
        let epoch = self.inner.begin(&[PipelineState::Idle]);
        debug!("Controller stopped at {}", epoch);
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl ControllerInner {
    fn lock_state(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens a new epoch and walks it through `states` unconditionally.
    fn begin(&self, states: &[PipelineState]) -> PipelineEpoch {
        let mut state = self.lock_state();
        let epoch = self.clock.advance();
        for next in states {
            *state = next.clone();
            self.presenter.present(PresenterEvent::PhaseChanged {
                epoch,
                phase: next.phase(),
            });
        }
        epoch
    }

    /// Moves the active epoch to `next`. Returns false, writing nothing, when
    /// `epoch` has been superseded or the run already reached a terminal state.
    fn transition(&self, epoch: PipelineEpoch, next: PipelineState) -> bool {
        let mut state = self.lock_state();
        if !self.clock.is_current(epoch) {
            debug!("Dropping {} update from superseded {}", next.phase().as_str(), epoch);
            return false;
        }
        if state.is_terminal() {
            warn!(
                "{} is already {}, ignoring {}",
                epoch,
                state.phase().as_str(),
                next.phase().as_str()
            );
            return false;
        }

        let phase_changed = state.phase() != next.phase();
        *state = next.clone();
        if phase_changed {
            self.presenter.present(PresenterEvent::PhaseChanged {
                epoch,
                phase: next.phase(),
            });
        }
        match next {
            PipelineState::Segmenting(progress) => {
                self.presenter.present(PresenterEvent::Progress(progress))
            }
            PipelineState::Done(result) => self
                .presenter
                .present(PresenterEvent::Completed { epoch, result }),
            PipelineState::Failed(error) => self
                .presenter
                .present(PresenterEvent::Failed { epoch, error }),
            PipelineState::Idle | PipelineState::Extracting | PipelineState::Analyzing => {}
        }
        true
    }

    async fn run(self: Arc<Self>, epoch: PipelineEpoch, video: VideoHandle) -> Option<RunReport> {
        let mut watch = self.clock.watch(epoch);
        tokio::select! {
            biased;
            _ = watch.superseded() => {
                info!("{} superseded before it finished", epoch);
                None
            }
            report = self.execute(epoch, video) => report,
        }
    }

    async fn execute(&self, epoch: PipelineEpoch, video: VideoHandle) -> Option<RunReport> {
        let mut draft = ReportDraft::start(epoch, video.clone());

        let frames = match self
            .source
            .extract(&video, self.configuration.sampling_rate_hz)
            .await
        {
            Ok(frames) if frames.is_empty() => {
                let error = ExtractionError::NoFrames;
                return self.fail(epoch, draft, Stage::Extracting, error.kind(), error);
            }
            Ok(frames) => frames,
            Err(e) => return self.fail(epoch, draft, Stage::Extracting, e.kind(), e),
        };
        info!("Extracted {} frames from {}", frames.len(), video.display_name());

        let batch = FrameBatch::new(epoch, frames);
        let total = batch.len();
        draft.frames_total = total;
        if !self.transition(
            epoch,
            PipelineState::Segmenting(SegmentationProgress::started(epoch, total)),
        ) {
            return None;
        }

        let mut run = self.orchestrator.submit(batch);
        debug!("Submitted {} frames for segmentation under {}", run.total(), run.epoch());
        let mut outcome = None;
        while let Some(event) = run.next().await {
            match event {
                SegmentationEvent::Progress(progress) => {
                    if !self.transition(epoch, PipelineState::Segmenting(progress)) {
                        return None;
                    }
                }
                SegmentationEvent::Finished(finished) => {
                    outcome = Some(finished);
                    break;
                }
            }
        }
        // The stream only ends without a result when the epoch moved on.
        let outcome = outcome?;
        let masks = outcome.batch;
        draft.frames_segmented = masks.present_count();
        info!(
            "Segmentation finished with {:?}: {} succeeded, {} timed out, slowest frame {:?}",
            outcome.aggregation,
            outcome.metrics.succeeded(),
            outcome.metrics.timed_out(),
            outcome.metrics.slowest_frame()
        );

        if outcome.aggregation == Aggregation::AllFailed {
            let message = format!("none of the {} frames could be segmented", total);
            return self.fail(epoch, draft, Stage::Segmenting, ErrorKind::NoMasksSegmented, message);
        }
        if draft.frames_segmented < 2 {
            let message = format!(
                "only {} of {} frames were segmented, at least 2 are needed",
                draft.frames_segmented, total
            );
            return self.fail(epoch, draft, Stage::Segmenting, ErrorKind::InsufficientMasks, message);
        }

        if !self.transition(epoch, PipelineState::Analyzing) {
            return None;
        }
        let analysis = match self.analyzer.analyze(&masks) {
            Ok(analysis) => analysis,
            Err(e) => {
                draft.area_trace = self.analyzer.area_samples(&masks);
                return self.fail(epoch, draft, Stage::Analyzing, e.kind(), e);
            }
        };
        draft.cycle = Some(analysis.cycle);
        draft.area_trace = analysis.samples;

        let result = match self.engine.evaluate(&analysis.cycle) {
            Ok(result) => result,
            Err(e) => return self.fail(epoch, draft, Stage::EfEngine, e.kind(), e),
        };
        if !result.is_within_bounds() {
            warn!(
                "AFC {:.2}% is outside 0-100%, segmentation is likely unreliable",
                result.percentage
            );
        }

        if !self.transition(epoch, PipelineState::Done(result)) {
            return None;
        }
        Some(draft.finish(RunOutcome::Done { result }))
    }

    fn fail(
        &self,
        epoch: PipelineEpoch,
        draft: ReportDraft,
        stage: Stage,
        kind: ErrorKind,
        message: impl ToString,
    ) -> Option<RunReport> {
        let error = ErrorState::new(stage, kind, message.to_string());
        warn!("{}: {}", epoch, error);
        if !self.transition(epoch, PipelineState::Failed(error.clone())) {
            return None;
        }
        Some(draft.finish(RunOutcome::Failed { error }))
    }
}

/// Handle to one started run.
#[derive(Debug)]
pub struct RunHandle {
    epoch: PipelineEpoch,
    handle: JoinHandle<Option<RunReport>>,
}

impl RunHandle {
    pub fn epoch(&self) -> PipelineEpoch {
        self.epoch
    }

    /// Waits for the run to settle. `Ok(None)` means it was superseded
    /// before reaching `Done` or `Failed`.
    pub async fn wait(self) -> Result<Option<RunReport>, AppError> {
        let epoch = self.epoch;
        self.handle
            .await
            .map_err(|e| AppError::Pipeline(format!("Pipeline task for {} failed: {}", epoch, e)))
    }
}

pub struct PipelineControllerBuilder {
    configuration: Configuration,
    source: Option<Arc<dyn FrameSource>>,
    backend: Option<Arc<dyn SegmentationBackend>>,
    presenter: Option<Arc<dyn Presenter>>,
}

impl PipelineControllerBuilder {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            source: None,
            backend: None,
            presenter: None,
        }
    }

    // Sets the frame sampling rate, this will override the configuration.
    pub fn sampling_rate_hz(mut self, sampling_rate_hz: f64) -> Self {
        self.configuration.sampling_rate_hz = sampling_rate_hz;
        self
    }

    // Bounds concurrent segmentation calls, this will override the configuration.
    pub fn max_concurrent_segmentations(mut self, max_concurrent_segmentations: usize) -> Self {
        self.configuration.max_concurrent_segmentations = max_concurrent_segmentations;
        self
    }

    // Sets the per-frame deadline, this will override the configuration. `None` disables it.
    pub fn segmentation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.configuration.segmentation_timeout_ms =
            timeout.map_or(0, |timeout| (timeout.as_millis() as u64).max(1));
        self
    }

    // Sets the mask foreground threshold, this will override the configuration.
    pub fn foreground_threshold(mut self, foreground_threshold: u8) -> Self {
        self.configuration.foreground_threshold = foreground_threshold;
        self
    }

    pub fn frame_source(mut self, source: Arc<dyn FrameSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn segmentation_backend(mut self, backend: Arc<dyn SegmentationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    pub fn build(self) -> Result<PipelineController, AppError> {
        self.configuration.validate()?;
        let source = self
            .source
            .ok_or(AppError::Pipeline("Frame source not set".to_string()))?;
        let backend = self
            .backend
            .ok_or(AppError::Pipeline("Segmentation backend not set".to_string()))?;
        let presenter = self
            .presenter
            .unwrap_or_else(|| Arc::new(LoggingPresenter));

        let clock = EpochClock::new();
        let orchestrator = SegmentationOrchestrator::builder(backend, clock.clone())
            .configuration(&self.configuration)
            .build();
        let analyzer =
            CardiacCycleAnalyzer::new(AreaComputer::new(self.configuration.foreground_threshold));

        presenter.present(PresenterEvent::PhaseChanged {
            epoch: clock.current(),
            phase: Phase::Idle,
        });

        Ok(PipelineController {
            inner: Arc::new(ControllerInner {
                configuration: self.configuration,
                clock,
                source,
                orchestrator,
                analyzer,
                engine: EfEngine,
                presenter,
                state: Mutex::new(PipelineState::Idle),
            }),
        })
    }
}
