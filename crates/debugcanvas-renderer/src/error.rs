use thiserror::Error;

/// Faults inside the render pipeline.
///
/// None of these reach the caller of a render request: the engine logs them
/// and treats the pass as having produced no image.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to allocate a {width}x{height} pixel buffer")]
    BufferAllocation { width: u32, height: u32 },

    #[error("pixel buffer has no prepared pass to publish")]
    NothingToPublish,

    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("world bounds have zero or non-finite extent")]
    DegenerateBounds,

    #[error("font error: {0}")]
    Font(String),

    #[error("render pass cancelled")]
    Cancelled,

    #[error("render pass panicked: {0}")]
    WorkerPanicked(String),

    #[error("render engine is stopped")]
    EngineStopped,

    #[error("failed to spawn render thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("image encoding failed: {0}")]
    Encode(String),
}
