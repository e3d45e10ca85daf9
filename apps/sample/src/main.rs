//! Draws a small scene, then adds a cross every 10ms while requesting a
//! render after each one, and writes the last delivered frame as a PNG.
//!
//! Usage: `debugcanvas-sample [output.png] [font.ttf]`. Without a font
//! argument the renderer's bundled font is used.

use std::error::Error;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use debugcanvas_core::{Point, Rgba, Vector};
use debugcanvas_renderer::{CanvasConfig, DebugCanvas, EngineState, Frame};

const TICKS: usize = 200;
const TICK: Duration = Duration::from_millis(10);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("debugcanvas.png"));
    let mut config = CanvasConfig::default();
    config.engine.font_path = args.next().map(PathBuf::from);

    let (tx, frames) = mpsc::channel();
    let mut canvas = DebugCanvas::new(config, move |frame: Frame| {
        let _ = tx.send(frame);
    })?;
    canvas.on_world_bounds_changed(|b| {
        log::info!("world bounds now ({}, {}) {}x{}", b.x, b.y, b.width, b.height)
    });

    {
        let mut d = canvas.drawing_data().write();
        d.draw_box_sized(Point::new(10.0, 10.0), Rgba::RED, Vector::new(100.0, 50.0), false);
        d.draw_line(Point::new(10.0, 10.0), Point::new(1000.0, 1000.0), Rgba::BLUE);
        d.draw_text(
            "Hello World!",
            Point::new(20.0, 20.0),
            Rgba::YELLOW,
            Vector::new(200.0, 20.0),
            16.0,
            Some(Rgba::BLUE),
        );
        d.log("sample scene ready", Vec::new());
    }
    canvas.resize(800.0, 450.0);

    let mut last = None;
    let mut delivered = 0usize;
    for _ in 0..TICKS {
        {
            let mut d = canvas.drawing_data().write();
            let n = d.crosses().len();
            let at = Point::new((n % 100) as f64, (n / 100) as f64);
            d.draw_cross_sized(at, Rgba::BLUE, Vector::splat(1.0));
        }
        canvas.render();
        thread::sleep(TICK);
        for frame in frames.try_iter() {
            delivered += 1;
            last = Some(frame);
        }
    }

    // One more pass once the engine is idle, so the saved frame has every cross.
    let deadline = Instant::now() + SETTLE_TIMEOUT;
    while canvas.state() != EngineState::Idle && Instant::now() < deadline {
        thread::sleep(TICK);
    }
    canvas.render();
    if let Ok(frame) = frames.recv_timeout(SETTLE_TIMEOUT) {
        delivered += 1;
        last = Some(frame);
    }

    let frame = last.ok_or("no frame was delivered")?;
    frame.save_png(&output)?;
    log::info!(
        "{} render requests, {} frames delivered; wrote {}x{} frame to {}",
        TICKS + 2,
        delivered,
        frame.width(),
        frame.height(),
        output.display()
    );
    Ok(())
}
