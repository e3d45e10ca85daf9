//! The embeddable surface: shared drawing data, a render engine, and the
//! pointer logic a host control forwards its input to.

use std::time::Instant;

use debugcanvas_core::{CommandRef, Point, SharedDrawingData, WorldRect};

use crate::config::CanvasConfig;
use crate::engine::{DisplaySink, RenderEngine};
use crate::error::RenderError;
use crate::scheduler::EngineState;
use crate::viewport::Viewport;

type BoundsListener = Box<dyn FnMut(WorldRect) + Send>;
type ClickListener = Box<dyn FnMut(Point) + Send>;

struct Press {
    /// World point under the pointer when pressed; panning keeps it there.
    grab: Point,
    at: Instant,
}

pub struct DebugCanvas {
    config: CanvasConfig,
    data: SharedDrawingData,
    engine: RenderEngine,
    width: f64,
    height: f64,
    press: Option<Press>,
    bounds_listener: Option<BoundsListener>,
    click_listener: Option<ClickListener>,
}

impl DebugCanvas {
    /// A canvas with empty drawing data and a 1x1 viewport. Call
    /// [`resize`](Self::resize) once the host knows its size.
    pub fn new<S: DisplaySink>(config: CanvasConfig, sink: S) -> Result<Self, RenderError> {
        let engine = RenderEngine::spawn(config.engine.clone(), sink)?;
        Ok(Self {
            config,
            data: SharedDrawingData::default(),
            engine,
            width: 1.0,
            height: 1.0,
            press: None,
            bounds_listener: None,
            click_listener: None,
        })
    }

    /// Handle for appending draw commands from any thread.
    pub fn drawing_data(&self) -> &SharedDrawingData {
        &self.data
    }

    pub fn engine(&self) -> &RenderEngine {
        &self.engine
    }

    pub fn state(&self) -> EngineState {
        self.engine.state()
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn render(&self) {
        self.engine
            .request_render(self.width, self.height, &self.data);
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
        self.render();
    }

    /// Drop every drawing and log entry, then render the empty scene.
    pub fn clear(&self) {
        {
            let mut data = self.data.write();
            data.clear_drawings();
            data.clear_log();
        }
        self.render();
    }

    pub fn world_bounds(&self) -> WorldRect {
        self.data.read().world_bounds()
    }

    /// Store new bounds (normalized) and notify the bounds listener. Does not render.
    pub fn set_world_bounds(&mut self, bounds: WorldRect) {
        self.data.write().set_world_bounds(bounds);
        self.notify_bounds();
    }

    pub fn on_world_bounds_changed(&mut self, listener: impl FnMut(WorldRect) + Send + 'static) {
        self.bounds_listener = Some(Box::new(listener));
    }

    pub fn on_click(&mut self, listener: impl FnMut(Point) + Send + 'static) {
        self.click_listener = Some(Box::new(listener));
    }

    /// Fit the bounds to the recorded shapes and render. Returns `false`,
    /// leaving everything untouched, when there is nothing to fit.
    pub fn fit_to_contents(&mut self) -> bool {
        let fitted = self.data.write().fit_bounds_to_contents();
        if fitted {
            self.notify_bounds();
            self.render();
        }
        fitted
    }

    /// The transform the next pass will use.
    pub fn viewport(&self) -> Viewport {
        Viewport::for_size(self.world_bounds(), self.width, self.height)
    }

    pub fn to_world(&self, pixel: Point) -> Point {
        self.viewport().to_world(pixel)
    }

    pub fn pointer_down(&mut self, pixel: Point) {
        self.press_at(pixel, Instant::now());
    }

    /// Pan while `dragging` so the world point grabbed at
    /// [`pointer_down`](Self::pointer_down) stays under the pointer.
    /// Returns the world position of the pointer.
    pub fn pointer_move(&mut self, pixel: Point, dragging: bool) -> Point {
        let world = self.to_world(pixel);
        if !dragging {
            return world;
        }
        let Some(grab) = self.press.as_ref().map(|p| p.grab) else {
            self.press_at(pixel, Instant::now());
            return world;
        };

        let delta = world - grab;
        let bounds = self.world_bounds().offset(-delta);
        self.set_world_bounds(bounds);
        self.render();
        grab
    }

    /// Ends a press. A short press is a click: the click listener gets the
    /// world position, which is also returned.
    pub fn pointer_up(&mut self, pixel: Point) -> Option<Point> {
        self.release_at(pixel, Instant::now())
    }

    /// Zoom about the pointer, in when `delta > 0`.
    pub fn wheel(&mut self, pixel: Point, delta: f64) {
        if delta == 0.0 || !delta.is_finite() {
            return;
        }
        let anchor = self.to_world(pixel);
        let factor = if delta > 0.0 {
            1.0 / self.config.zoom_step
        } else {
            self.config.zoom_step
        };

        let bounds = self.world_bounds().scale_about(anchor, factor);
        let usable = |v: f64| v.is_finite() && v > 0.0;
        if !usable(bounds.width) || !usable(bounds.height) {
            log::debug!("zoom limit reached at {:?}", self.world_bounds());
            return;
        }
        self.set_world_bounds(bounds);
        self.render();
    }

    /// Shapes whose bounding box contains the world point under `pixel`.
    pub fn hit_test(&self, pixel: Point) -> Vec<CommandRef> {
        let world = self.to_world(pixel);
        self.data.read().hit_test(&world)
    }

    fn press_at(&mut self, pixel: Point, at: Instant) {
        self.press = Some(Press {
            grab: self.to_world(pixel),
            at,
        });
    }

    fn release_at(&mut self, pixel: Point, now: Instant) -> Option<Point> {
        let press = self.press.take()?;
        if now.saturating_duration_since(press.at) > self.config.click_max_duration() {
            return None;
        }
        let world = self.to_world(pixel);
        if let Some(listener) = self.click_listener.as_mut() {
            listener(world);
        }
        Some(world)
    }

    fn notify_bounds(&mut self) {
        let bounds = self.world_bounds();
        if let Some(listener) = self.bounds_listener.as_mut() {
            listener(bounds);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{self, Receiver};
    use std::sync::Arc;
    use std::time::Duration;

    use debugcanvas_core::{CommandKind, Rgba, Vector};
    use parking_lot::Mutex;

    use crate::buffer::Frame;

    const WAIT: Duration = Duration::from_secs(5);

    fn canvas() -> (DebugCanvas, Receiver<Frame>) {
        let (tx, rx) = mpsc::channel();
        let sink = move |frame: Frame| {
            let _ = tx.send(frame);
        };
        let canvas = DebugCanvas::new(CanvasConfig::default(), sink).unwrap();
        (canvas, rx)
    }

    fn assert_point_close(a: Point, b: Point) {
        assert!(
            (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9,
            "{:?} != {:?}",
            a,
            b
        );
    }

    #[test]
    fn test_resize_renders_at_new_size() {
        let (mut canvas, frames) = canvas();
        canvas.resize(800.0, 450.0);
        let frame = frames.recv_timeout(WAIT).unwrap();
        assert_eq!((frame.width(), frame.height()), (800, 450));
    }

    #[test]
    fn test_bounds_listener_sees_normalized_bounds() {
        let (mut canvas, _frames) = canvas();
        let seen = Arc::new(Mutex::new(Vec::new()));
        canvas.on_world_bounds_changed({
            let seen = Arc::clone(&seen);
            move |b| seen.lock().push(b)
        });
        canvas.set_world_bounds(WorldRect::new(0.0, 10.0, 20.0, -10.0));
        assert_eq!(*seen.lock(), vec![WorldRect::new(0.0, 0.0, 20.0, 10.0)]);
    }

    #[test]
    fn test_drag_keeps_grabbed_point_under_pointer() {
        let (mut canvas, _frames) = canvas();
        canvas.resize(800.0, 450.0);

        canvas.pointer_down(Point::new(400.0, 225.0));
        assert_point_close(canvas.to_world(Point::new(400.0, 225.0)), Point::new(40.0, 22.5));

        canvas.pointer_move(Point::new(500.0, 175.0), true);
        let bounds = canvas.world_bounds();
        assert!((bounds.x - -10.0).abs() < 1e-9);
        assert!((bounds.y - -5.0).abs() < 1e-9);
        assert_point_close(canvas.to_world(Point::new(500.0, 175.0)), Point::new(40.0, 22.5));
    }

    #[test]
    fn test_move_without_drag_does_not_pan() {
        let (mut canvas, _frames) = canvas();
        canvas.resize(800.0, 450.0);
        canvas.pointer_down(Point::new(0.0, 0.0));
        let world = canvas.pointer_move(Point::new(100.0, 450.0), false);
        assert_point_close(world, Point::new(10.0, 0.0));
        assert_eq!(canvas.world_bounds(), WorldRect::default());
    }

    #[test]
    fn test_wheel_zooms_about_pointer() {
        let (mut canvas, _frames) = canvas();
        canvas.resize(800.0, 450.0);
        let pixel = Point::new(200.0, 100.0);
        let anchor = canvas.to_world(pixel);

        canvas.wheel(pixel, 120.0);
        let bounds = canvas.world_bounds();
        assert!((bounds.width - 80.0 / 1.1).abs() < 1e-9);
        assert_point_close(canvas.to_world(pixel), anchor);

        canvas.wheel(pixel, -120.0);
        assert!((canvas.world_bounds().width - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_press_is_a_click() {
        let (mut canvas, _frames) = canvas();
        canvas.resize(800.0, 450.0);
        let clicks = Arc::new(Mutex::new(Vec::new()));
        canvas.on_click({
            let clicks = Arc::clone(&clicks);
            move |p| clicks.lock().push(p)
        });

        let t0 = Instant::now();
        canvas.press_at(Point::new(100.0, 450.0), t0);
        let click = canvas.release_at(Point::new(100.0, 450.0), t0 + Duration::from_millis(100));
        assert_point_close(click.unwrap(), Point::new(10.0, 0.0));
        assert_eq!(clicks.lock().len(), 1);

        canvas.press_at(Point::new(100.0, 450.0), t0);
        assert!(canvas
            .release_at(Point::new(100.0, 450.0), t0 + Duration::from_millis(300))
            .is_none());
        assert_eq!(clicks.lock().len(), 1);

        // No press, no click.
        assert!(canvas.pointer_up(Point::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn test_hit_test_through_pixels() {
        let (mut canvas, _frames) = canvas();
        canvas.resize(800.0, 450.0);
        canvas
            .drawing_data()
            .write()
            .draw_box_sized(Point::new(10.0, 10.0), Rgba::RED, Vector::new(4.0, 4.0), true);

        let pixel = canvas.viewport().to_pixel(Point::new(10.5, 9.5));
        let hits = canvas.hit_test(pixel);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, CommandKind::Box);
        assert!(canvas.hit_test(Point::new(700.0, 50.0)).is_empty());
    }

    #[test]
    fn test_clear_empties_drawings_and_log() {
        let (canvas, frames) = canvas();
        {
            let mut data = canvas.drawing_data().write();
            data.draw_cross(Point::ORIGIN, Rgba::GREEN, 1.0);
            data.log("hello", Vec::new());
        }
        canvas.clear();
        let data = canvas.drawing_data().read();
        assert_eq!(data.shape_count(), 0);
        assert!(data.log_entries().is_empty());
        drop(data);
        assert!(frames.recv_timeout(WAIT).is_ok());
    }

    #[test]
    fn test_fit_to_contents() {
        let (mut canvas, _frames) = canvas();
        let notified = Arc::new(Mutex::new(0));
        canvas.on_world_bounds_changed({
            let notified = Arc::clone(&notified);
            move |_| *notified.lock() += 1
        });

        assert!(!canvas.fit_to_contents());
        assert_eq!(*notified.lock(), 0);

        canvas
            .drawing_data()
            .write()
            .draw_box(Point::new(5.0, 5.0), Rgba::RED, 2.0, true);
        assert!(canvas.fit_to_contents());
        assert_eq!(*notified.lock(), 1);
        assert_eq!(canvas.world_bounds(), WorldRect::new(3.0, 3.0, 4.0, 4.0));
    }
}
