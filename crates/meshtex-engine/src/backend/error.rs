use thiserror::Error;

use super::handle::ResourceId;

/// Device-level failure.
///
/// Every variant is recoverable from the mesh texture's point of view: the
/// affected slot stays unset and the next draw is skipped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("device lost")]
    DeviceLost,
    #[error("invalid handle {0}")]
    InvalidHandle(ResourceId),
    #[error("shader rejected: {0}")]
    ShaderRejected(String),
    #[error("pipeline rejected: {0}")]
    PipelineRejected(String),
    #[error("texture rejected: {0}")]
    TextureRejected(String),
    #[error("buffer rejected: {0}")]
    BufferRejected(String),
    #[error("binding set rejected: {0}")]
    BindingRejected(String),
    #[error("draw rejected: {0}")]
    DrawRejected(String),
    #[error("texture readback failed: {0}")]
    Readback(String),
    #[error("texture write to mip level {level} failed: {reason}")]
    TextureWrite { level: u32, reason: String },
}

pub type RenderResult<T> = Result<T, RenderError>;
