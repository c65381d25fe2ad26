//! Scripted collaborators shared by the unit tests.

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, Luma};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::common::{Frame, SegmentationMask};
use crate::error::{ExtractionError, SegmentationError};
use crate::intake::{FrameSource, VideoHandle};
use crate::pipeline::epoch::PipelineEpoch;
use crate::presenter::{Presenter, PresenterEvent};
use crate::segmentation::SegmentationBackend;

pub(crate) const FRAME_SIDE: u32 = 16;

/// A solid frame whose gray level is `marker`. `ScriptedBackend` segments it
/// into a mask of exactly `marker` foreground pixels.
pub(crate) fn marker_frame(index: usize, marker: u8) -> Frame {
    let image = GrayImage::from_pixel(FRAME_SIDE, FRAME_SIDE, Luma([marker]));
    Frame::new(
        index,
        DynamicImage::ImageLuma8(image),
        Duration::from_millis(33 * index as u64),
    )
}

pub(crate) fn marker_frames(markers: &[u8]) -> Vec<Frame> {
    markers
        .iter()
        .enumerate()
        .map(|(index, &marker)| marker_frame(index, marker))
        .collect()
}

pub(crate) fn marker_of(frame: &Frame) -> u8 {
    frame.image().to_luma8().get_pixel(0, 0).0[0]
}

pub(crate) fn mask_with_area(area: u32) -> SegmentationMask {
    let data = (0..FRAME_SIDE * FRAME_SIDE)
        .map(|i| if i < area { 255 } else { 0 })
        .collect();
    SegmentationMask::from_raw(FRAME_SIDE, FRAME_SIDE, data).unwrap()
}

#[derive(Debug, Clone)]
pub(crate) enum Script {
    Mask,
    Fail,
    Empty,
    Hang,
    Panic,
}

/// Backend whose latency and outcome are scripted per frame marker.
pub(crate) struct ScriptedBackend {
    default_delay: Duration,
    delays: HashMap<u8, Duration>,
    scripts: HashMap<u8, Script>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedBackend {
    pub(crate) fn new(default_delay: Duration) -> Self {
        Self {
            default_delay,
            delays: HashMap::new(),
            scripts: HashMap::new(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_delay(mut self, marker: u8, delay: Duration) -> Self {
        self.delays.insert(marker, delay);
        self
    }

    pub(crate) fn with_script(mut self, marker: u8, script: Script) -> Self {
        self.scripts.insert(marker, script);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SegmentationBackend for ScriptedBackend {
    async fn segment(&self, frame: &Frame) -> Result<Option<SegmentationMask>, SegmentationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let marker = marker_of(frame);
        let delay = self.delays.get(&marker).copied().unwrap_or(self.default_delay);
        tokio::time::sleep(delay).await;

        match self.scripts.get(&marker).cloned().unwrap_or(Script::Mask) {
            Script::Mask => Ok(Some(mask_with_area(marker as u32))),
            Script::Fail => Err(SegmentationError::BackendFailure(format!(
                "model rejected frame {}",
                frame.index()
            ))),
            Script::Empty => Ok(None),
            Script::Hang => futures::future::pending().await,
            Script::Panic => panic!("backend crashed on frame {}", frame.index()),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Frame source serving marker frames per video path.
#[derive(Default)]
pub(crate) struct StaticFrameSource {
    videos: HashMap<VideoHandle, Result<Vec<u8>, ExtractionError>>,
    delay: Duration,
}

impl StaticFrameSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_video(mut self, video: &VideoHandle, markers: &[u8]) -> Self {
        self.videos.insert(video.clone(), Ok(markers.to_vec()));
        self
    }

    pub(crate) fn with_failure(mut self, video: &VideoHandle, error: ExtractionError) -> Self {
        self.videos.insert(video.clone(), Err(error));
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl FrameSource for StaticFrameSource {
    async fn extract(
        &self,
        video: &VideoHandle,
        _sampling_rate_hz: f64,
    ) -> Result<Vec<Frame>, ExtractionError> {
        tokio::time::sleep(self.delay).await;
        match self.videos.get(video) {
            Some(Ok(markers)) => Ok(marker_frames(markers)),
            Some(Err(e)) => Err(e.clone()),
            None => Err(ExtractionError::DecodeFailure(format!("unknown video {}", video))),
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingPresenter {
    events: Mutex<Vec<PresenterEvent>>,
}

impl RecordingPresenter {
    pub(crate) fn events(&self) -> Vec<PresenterEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn events_for(&self, epoch: PipelineEpoch) -> Vec<PresenterEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.epoch() == epoch)
            .collect()
    }
}

impl Presenter for RecordingPresenter {
    fn present(&self, event: PresenterEvent) {
        self.events.lock().unwrap().push(event);
    }
}
