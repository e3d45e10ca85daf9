//! # DebugCanvas Renderer
//!
//! Software rendering for the debug canvas. A [`RenderEngine`] turns render
//! requests into frames on a single background worker: requests that arrive
//! while a pass is running are coalesced, or cancel the pass and retry once
//! it has run too long. Passes rasterize a snapshot of the drawing data with
//! tiny-skia through the world-to-pixel [`Viewport`] transform.
//!
//! [`DebugCanvas`] bundles an engine with drawing data and the pan, zoom,
//! click, and hit-test handling a host control needs.

pub mod buffer;
pub mod canvas;
pub mod config;
pub mod engine;
pub mod error;
pub mod raster;
pub mod resources;
pub mod scheduler;
pub mod surface;
pub mod viewport;

pub use buffer::{Frame, PixelBuffer, PixelFormat};
pub use canvas::DebugCanvas;
pub use config::{CanvasConfig, EngineConfig};
pub use engine::{DisplaySink, RenderEngine};
pub use error::RenderError;
pub use raster::{rasterize, CancelToken, FrameRenderer, PassRequest, PassStats, Rasterizer};
pub use scheduler::{Decision, EngineState, Scheduler};
pub use surface::{DrawingSurface, PixelRect, PixmapSurface};
pub use viewport::Viewport;
