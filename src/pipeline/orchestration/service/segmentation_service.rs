use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::task::Context;
use futures::task::Poll;
use futures::Future;
use tower::timeout::error::Elapsed;
use tower::{BoxError, Service};

use crate::common::{Frame, SegmentationMask};
use crate::error::SegmentationError;
use crate::segmentation::SegmentationBackend;

/// Adapts a `SegmentationBackend` into a tower service so it can be stacked
/// with concurrency, timeout and tracing layers.
#[derive(Clone)]
pub struct SegmentationService {
    inner: Arc<dyn SegmentationBackend>,
}

impl SegmentationService {
    pub fn new(inner: Arc<dyn SegmentationBackend>) -> Self {
        Self { inner }
    }
}

impl Service<Frame> for SegmentationService {
    type Response = SegmentationMask;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, frame: Frame) -> Self::Future {
        let inner = self.inner.clone();

        Box::pin(async move {
            match inner.segment(&frame).await {
                Ok(Some(mask)) => Ok(mask),
                Ok(None) => Err(SegmentationError::UnknownFailure.into()),
                Err(e) => Err(e.into()),
            }
        })
    }
}

/// Maps an error coming out of the service stack back onto the per-frame taxonomy.
pub fn classify_failure(error: BoxError, timeout: Option<Duration>) -> SegmentationError {
    if error.is::<Elapsed>() {
        return SegmentationError::Timeout(timeout.unwrap_or_default());
    }
    match error.downcast::<SegmentationError>() {
        Ok(segmentation_error) => *segmentation_error,
        Err(other) => SegmentationError::BackendFailure(other.to_string()),
    }
}
