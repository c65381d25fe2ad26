use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::{FutureExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneService;
use tower::{BoxError, ServiceBuilder, ServiceExt};
use tracing::{debug, error, info, instrument, warn, Instrument};

use crate::common::{Frame, FrameBatch, SegmentationMask};
use crate::config::Configuration;
use crate::error::SegmentationError;
use crate::pipeline::context::{MaskBatch, SegmentationMetrics, SlotWrite};
use crate::pipeline::epoch::{EpochClock, EpochWatch, PipelineEpoch};
use crate::pipeline::orchestration::aggregation::{
    Aggregation, SegmentationEvent, SegmentationOutcome, SegmentationProgress,
};
use crate::pipeline::orchestration::service::instrumented::InstrumentedLayer;
use crate::pipeline::orchestration::service::segmentation_service::{
    classify_failure, SegmentationService,
};
use crate::segmentation::SegmentationBackend;

/// Backend wrapped in its concurrency limit, optional timeout and tracing.
pub type SegmentationStack = BoxCloneService<Frame, SegmentationMask, BoxError>;

pub struct SegmentationOrchestratorBuilder {
    backend: Arc<dyn SegmentationBackend>,
    clock: EpochClock,
    max_concurrency: usize,
    timeout: Option<Duration>,
    progress_buffer: usize,
}

impl SegmentationOrchestratorBuilder {
    pub fn new(backend: Arc<dyn SegmentationBackend>, clock: EpochClock) -> Self {
        let defaults = Configuration::default();
        Self {
            backend,
            clock,
            max_concurrency: defaults.max_concurrent_segmentations,
            timeout: defaults.segmentation_timeout(),
            progress_buffer: defaults.progress_buffer_size,
        }
    }

    pub fn configuration(mut self, configuration: &Configuration) -> Self {
        self.max_concurrency = configuration.max_concurrent_segmentations;
        self.timeout = configuration.segmentation_timeout();
        self.progress_buffer = configuration.progress_buffer_size;
        self
    }

    pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn progress_buffer(mut self, progress_buffer: usize) -> Self {
        self.progress_buffer = progress_buffer;
        self
    }

    pub fn build(self) -> SegmentationOrchestrator {
        // Timeout sits inside the limit so waiting for a worker does not count against a frame.
        let service = ServiceBuilder::new()
            .concurrency_limit(self.max_concurrency.max(1))
            .layer(InstrumentedLayer::new(self.backend.name()))
            .option_layer(self.timeout.map(TimeoutLayer::new))
            .service(SegmentationService::new(self.backend));

        SegmentationOrchestrator {
            service: Mutex::new(BoxCloneService::new(service)),
            clock: self.clock,
            timeout: self.timeout,
            progress_buffer: self.progress_buffer.max(1),
        }
    }
}

/// Fans frames out to the segmentation backend and fans results back into a `MaskBatch`.
pub struct SegmentationOrchestrator {
    // BoxCloneService is Send but not Sync; the lock is only held to clone it.
    service: Mutex<SegmentationStack>,
    clock: EpochClock,
    timeout: Option<Duration>,
    progress_buffer: usize,
}

impl SegmentationOrchestrator {
    pub fn builder(
        backend: Arc<dyn SegmentationBackend>,
        clock: EpochClock,
    ) -> SegmentationOrchestratorBuilder {
        SegmentationOrchestratorBuilder::new(backend, clock)
    }

    /// Starts segmenting `batch` under the epoch it is tagged with and returns
    /// immediately. The returned run yields progress events and, unless the
    /// epoch is superseded first, exactly one `Finished` event.
    #[instrument(skip(self, batch), fields(epoch = %batch.epoch(), frames = batch.len()))]
    pub fn submit(&self, batch: FrameBatch) -> SegmentationRun {
        let epoch = batch.epoch();
        let (tx, rx) = mpsc::channel(self.progress_buffer);
        let run = SegmentationRun {
            epoch,
            total: batch.len(),
            events: ReceiverStream::new(rx),
        };

        let watch = self.clock.watch(epoch);
        if watch.is_stale() {
            warn!("Ignoring submission for superseded {}", epoch);
            return run;
        }

        if batch.is_empty() {
            let mut metrics = SegmentationMetrics::new();
            metrics.finalize();
            let outcome = SegmentationOutcome {
                batch: MaskBatch::new(epoch, 0),
                aggregation: Aggregation::from_counts(0, 0),
                metrics,
            };
            // Fresh channel with capacity >= 1, cannot be full.
            let _ = tx.try_send(SegmentationEvent::Finished(outcome));
            return run;
        }

        let service = self
            .service
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let driver = SubmissionDriver {
            service,
            watch,
            timeout: self.timeout,
            tx,
        };
        tokio::spawn(driver.run(batch).in_current_span());
        run
    }
}

/// Owns the MaskBatch of one submission; the only writer of its slots.
struct SubmissionDriver {
    service: SegmentationStack,
    watch: EpochWatch,
    timeout: Option<Duration>,
    tx: mpsc::Sender<SegmentationEvent>,
}

impl SubmissionDriver {
    async fn run(self, batch: FrameBatch) {
        let epoch = self.watch.epoch();
        let total = batch.len();
        let mut masks = MaskBatch::new(epoch, total);
        let mut metrics = SegmentationMetrics::new();
        let mut progress = SegmentationProgress::started(epoch, total);

        let mut tasks = JoinSet::new();
        for frame in batch.frames().iter().cloned() {
            let service = self.service.clone();
            tasks.spawn(async move {
                let index = frame.index();
                let start = Instant::now();
                let outcome = AssertUnwindSafe(service.oneshot(frame))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err("segmentation task panicked".into()));
                (index, outcome, start.elapsed())
            });
        }
        debug!("Dispatched {} segmentation tasks", total);

        let mut superseded = self.watch.clone();
        loop {
            let joined = tokio::select! {
                biased;
                _ = superseded.superseded() => {
                    info!("{} superseded, discarding {} in-flight frames", epoch, tasks.len());
                    return;
                }
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else {
                break;
            };
            let (index, outcome, elapsed) = match joined {
                Ok(done) => done,
                Err(e) => {
                    error!("Segmentation task lost: {}", e);
                    continue;
                }
            };
            if self.watch.is_stale() {
                return;
            }

            let outcome = outcome.map_err(|e| classify_failure(e, self.timeout));
            if !masks.slot(index).is_some_and(|slot| slot.is_pending()) {
                warn!("Dropping duplicate result for frame {}", index);
                continue;
            }
            metrics.record_frame(&outcome, elapsed);
            match &outcome {
                Ok(_) => progress.segmented += 1,
                Err(e) => {
                    debug!("Frame {} marked absent: {}", index, e);
                    progress.failed += 1;
                }
            }
            if masks.resolve(index, outcome) != SlotWrite::Written {
                continue;
            }

            if self.tx.send(SegmentationEvent::Progress(progress)).await.is_err() {
                debug!("Progress receiver dropped, stopping {}", epoch);
                return;
            }
        }

        let swept = sweep_unresolved(&mut masks, &mut metrics, &mut progress);
        if swept > 0 {
            warn!("{} segmentation tasks were lost, marking their frames absent", swept);
            if self.tx.send(SegmentationEvent::Progress(progress)).await.is_err() {
                return;
            }
        }
        debug_assert!(masks.is_complete());

        metrics.finalize();
        let aggregation = Aggregation::from_counts(masks.present_count(), total);
        info!(
            "Segmented {} of {} frames ({} absent, {} timed out) in {:?}: {:?}",
            metrics.succeeded(),
            total,
            masks.absent_count(),
            metrics.timed_out(),
            metrics.total_duration().unwrap_or_default(),
            aggregation
        );

        let _ = self
            .tx
            .send(SegmentationEvent::Finished(SegmentationOutcome {
                batch: masks,
                aggregation,
                metrics,
            }))
            .await;
    }
}

/// Marks every slot still pending as absent, counting it as a failed frame.
/// Returns how many slots were swept.
fn sweep_unresolved(
    masks: &mut MaskBatch,
    metrics: &mut SegmentationMetrics,
    progress: &mut SegmentationProgress,
) -> usize {
    let pending: Vec<usize> = masks
        .slots()
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.is_pending())
        .map(|(index, _)| index)
        .collect();
    for &index in &pending {
        let outcome: Result<SegmentationMask, SegmentationError> = Err(
            SegmentationError::BackendFailure("segmentation task did not complete".to_string()),
        );
        metrics.record_frame(&outcome, Duration::ZERO);
        masks.resolve(index, outcome);
        progress.failed += 1;
    }
    pending.len()
}

/// Event stream of one submission.
pub struct SegmentationRun {
    epoch: PipelineEpoch,
    total: usize,
    events: ReceiverStream<SegmentationEvent>,
}

impl SegmentationRun {
    pub fn epoch(&self) -> PipelineEpoch {
        self.epoch
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Skips progress and returns the aggregation, or `None` if the run was superseded.
    pub async fn outcome(mut self) -> Option<SegmentationOutcome> {
        while let Some(event) = self.events.next().await {
            if let SegmentationEvent::Finished(outcome) = event {
                return Some(outcome);
            }
        }
        None
    }
}

impl Stream for SegmentationRun {
    type Item = SegmentationEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_next_unpin(cx)
    }
}
