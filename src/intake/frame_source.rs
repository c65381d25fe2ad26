use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::common::Frame;
use crate::error::ExtractionError;

/// Identifies the video a pipeline run was started for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoHandle(PathBuf);

impl VideoHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// File name shown to the user, or the full path if there is none.
    pub fn display_name(&self) -> String {
        self.0
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.0.display().to_string())
    }
}

impl fmt::Display for VideoHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Decodes a video into frames sampled at `sampling_rate_hz`, in presentation order.
///
/// An empty `Ok` is allowed; the controller reports it as `NoFrames`.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn extract(
        &self,
        video: &VideoHandle,
        sampling_rate_hz: f64,
    ) -> Result<Vec<Frame>, ExtractionError>;
}
