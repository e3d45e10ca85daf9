//! One rasterization pass: walk a [`DrawingData`] snapshot through the
//! [`Viewport`] transform onto a [`DrawingSurface`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use debugcanvas_core::{DrawingData, Point, Vector};

use crate::buffer::{Frame, PixelBuffer};
use crate::config::EngineConfig;
use crate::error::RenderError;
use crate::resources::{ResourceCache, MAX_GLYPH_PX};
use crate::surface::{DrawingSurface, PixelRect, PixmapSurface};
use crate::viewport::Viewport;

/// Cooperative cancellation flag shared between the scheduler and a pass.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Everything a pass needs, captured at dispatch time.
#[derive(Debug, Clone)]
pub struct PassRequest {
    pub width: u32,
    pub height: u32,
    pub data: DrawingData,
}

/// Counters from one pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassStats {
    pub drawn: usize,
    pub culled: usize,
}

/// Produces a frame from a pass request on the render worker.
pub trait FrameRenderer: Send + 'static {
    /// Run one pass. Return [`RenderError::Cancelled`] when the pass stops
    /// early because `cancel` was raised.
    fn render(&mut self, request: &PassRequest, cancel: &CancelToken) -> Result<Frame, RenderError>;

    /// Called after a pass failed or panicked, so any half-written state is dropped.
    fn discard(&mut self) {}
}

/// The default [`FrameRenderer`]: a tiny-skia pixel buffer plus cached paints and glyphs.
pub struct Rasterizer {
    config: EngineConfig,
    buffer: PixelBuffer,
    resources: ResourceCache,
}

impl Rasterizer {
    pub fn new(config: EngineConfig) -> Self {
        let resources = ResourceCache::from_font_path(config.font_path.as_deref());
        Self {
            config,
            buffer: PixelBuffer::new(),
            resources,
        }
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }
}

impl FrameRenderer for Rasterizer {
    fn render(&mut self, request: &PassRequest, cancel: &CancelToken) -> Result<Frame, RenderError> {
        let viewport = Viewport::new(request.data.world_bounds(), request.width, request.height);
        if viewport.is_degenerate() {
            return Err(RenderError::DegenerateBounds);
        }

        let pixmap = self
            .buffer
            .prepare(request.width.max(1), request.height.max(1))?;
        let stats = {
            let mut surface = PixmapSurface::new(pixmap, &mut self.resources);
            surface.clear(self.config.background);
            rasterize(&request.data, &viewport, &mut surface, &self.config, cancel)?
        };
        log::trace!(
            "pass {}x{}: {} drawn, {} culled",
            request.width,
            request.height,
            stats.drawn,
            stats.culled
        );
        self.buffer.publish()
    }

    fn discard(&mut self) {
        self.buffer.invalidate();
    }
}

/// Draw the origin cross, then every visible box, cross, line, and text
/// command, in that bucket order and insertion order within a bucket.
///
/// Text whose glyph height would exceed the buffer height (or
/// [`MAX_GLYPH_PX`]) is counted as culled instead of drawn.
pub fn rasterize(
    data: &DrawingData,
    viewport: &Viewport,
    surface: &mut dyn DrawingSurface,
    config: &EngineConfig,
    cancel: &CancelToken,
) -> Result<PassStats, RenderError> {
    if viewport.is_degenerate() {
        return Err(RenderError::DegenerateBounds);
    }

    let mut stats = PassStats::default();
    let width = config.line_width;
    let max_font_px = viewport.height().min(MAX_GLYPH_PX as f64);
    let px = |p: Point| viewport.to_pixel(p);
    let check = || {
        if cancel.is_cancelled() {
            Err(RenderError::Cancelled)
        } else {
            Ok(())
        }
    };

    let e = config.origin_cross_extent;
    let origin_color = config.origin_cross_color;
    surface.draw_line(px(Point::new(-e, 0.0)), px(Point::new(e, 0.0)), origin_color, width);
    surface.draw_line(px(Point::new(0.0, -e)), px(Point::new(0.0, e)), origin_color, width);

    for b in data.boxes() {
        check()?;
        if !viewport.is_visible(b.center, b.size) {
            stats.culled += 1;
            continue;
        }
        let half = b.size.half();
        let rect = PixelRect::from_corners(px(b.center - half), px(b.center + half))
            .padded(config.box_padding);
        if b.filled {
            surface.fill_rect(rect, b.color);
        } else {
            surface.stroke_rect(rect, b.color, width);
        }
        stats.drawn += 1;
    }

    for c in data.crosses() {
        check()?;
        if !viewport.is_visible(c.center, c.size) {
            stats.culled += 1;
            continue;
        }
        let half = c.size.half();
        let flipped = Vector::new(-half.x, half.y);
        surface.draw_line(px(c.center - half), px(c.center + half), c.color, width);
        surface.draw_line(px(c.center - flipped), px(c.center + flipped), c.color, width);
        stats.drawn += 1;
    }

    for l in data.lines() {
        check()?;
        if !viewport.is_visible(l.center(), l.size()) {
            stats.culled += 1;
            continue;
        }
        surface.draw_line(px(l.a), px(l.b), l.color, width);
        stats.drawn += 1;
    }

    for t in data.texts() {
        check()?;
        if !viewport.is_visible(t.center, t.size) {
            stats.culled += 1;
            continue;
        }
        let font_px = viewport.pixel_size(Vector::new(0.0, t.font_height)).y;
        let size = viewport.pixel_size(t.size);
        if font_px <= 0.0 || size.x <= 0.0 || size.y <= 0.0 {
            stats.culled += 1;
            continue;
        }
        if font_px > max_font_px {
            log::trace!("text {:?} at {:.0}px exceeds the buffer, skipped", t.text, font_px);
            stats.culled += 1;
            continue;
        }
        let top_left = px(t.top_left());
        if let Some(shadow) = t.shadow {
            let rect = PixelRect::new(top_left.x + 1.0, top_left.y + 1.0, size.x, size.y);
            surface.draw_text(&t.text, font_px as f32, shadow, rect);
        }
        let rect = PixelRect::new(top_left.x, top_left.y, size.x, size.y);
        surface.draw_text(&t.text, font_px as f32, t.color, rect);
        stats.drawn += 1;
    }

    Ok(stats)
}
