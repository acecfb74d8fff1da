use crate::surface::SurfaceId;
use pdfcanvas::geom::SingularMatrix;
use std::time::Duration;

/// The render was cancelled by its owner, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, thiserror::Error)]
#[error("rendering cancelled")]
pub struct RenderingCancelled {
    /// Debounce hint passed to `cancel()`.
    pub extra_delay: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Cancelled(#[from] RenderingCancelled),
    #[error("surface {0} is already used by another render")]
    SurfaceInUse(SurfaceId),
    #[error("invalid surface size {width}x{height}")]
    InvalidSurfaceSize { width: u32, height: u32 },
    #[error(transparent)]
    SingularMatrix(#[from] SingularMatrix),
    #[error("object {0} not found")]
    MissingObject(String),
    #[error("dependency {id} failed: {reason}")]
    DependencyFailed { id: String, reason: String },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl RenderError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Integration errors that abort the render instead of being logged.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Cancelled(_) | Self::SurfaceInUse(_) | Self::InvalidSurfaceSize { .. }
        )
    }
}
