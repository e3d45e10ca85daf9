use debugcanvas_core::{Point, Rgba};
use tiny_skia::{Color, PathBuilder, Pixmap, Rect, Stroke, Transform};

use crate::resources::{Glyph, ResourceCache};

/// A rectangle in pixel space (origin top-left, +y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanning two corners given in any order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self::new(
            a.x.min(b.x),
            a.y.min(b.y),
            (b.x - a.x).abs(),
            (b.y - a.y).abs(),
        )
    }

    /// Grow by `pad` on every side.
    pub fn padded(&self, pad: f64) -> Self {
        Self::new(
            self.x - pad,
            self.y - pad,
            self.width + pad * 2.0,
            self.height + pad * 2.0,
        )
    }

    /// `None` for empty, negative, or non-finite rectangles.
    fn to_skia(self) -> Option<Rect> {
        if !(self.width > 0.0 && self.height > 0.0) {
            return None;
        }
        Rect::from_xywh(
            self.x as f32,
            self.y as f32,
            self.width as f32,
            self.height as f32,
        )
    }
}

/// The primitives a rasterization pass needs from a pixel surface.
///
/// All coordinates are in pixel space.
pub trait DrawingSurface {
    fn clear(&mut self, color: Rgba);
    fn draw_line(&mut self, a: Point, b: Point, color: Rgba, width: f32);
    fn fill_rect(&mut self, rect: PixelRect, color: Rgba);
    fn stroke_rect(&mut self, rect: PixelRect, color: Rgba, width: f32);
    /// Lay `text` out from the top-left of `rect` at `font_px` glyph height,
    /// wrapping at the right edge and clipping to the rectangle.
    fn draw_text(&mut self, text: &str, font_px: f32, color: Rgba, rect: PixelRect);
}

/// [`DrawingSurface`] over a tiny-skia pixmap, using the worker's resource cache.
///
/// Borrows the pixmap mutably, so it must be dropped before the pixel buffer
/// can be published or released.
pub struct PixmapSurface<'a> {
    pixmap: &'a mut Pixmap,
    resources: &'a mut ResourceCache,
}

impl<'a> PixmapSurface<'a> {
    pub fn new(pixmap: &'a mut Pixmap, resources: &'a mut ResourceCache) -> Self {
        Self { pixmap, resources }
    }
}

impl DrawingSurface for PixmapSurface<'_> {
    fn clear(&mut self, color: Rgba) {
        self.pixmap
            .fill(Color::from_rgba8(color.r, color.g, color.b, color.a));
    }

    fn draw_line(&mut self, a: Point, b: Point, color: Rgba, width: f32) {
        let mut pb = PathBuilder::new();
        pb.move_to(a.x as f32, a.y as f32);
        pb.line_to(b.x as f32, b.y as f32);
        let Some(path) = pb.finish() else {
            return;
        };
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        let paint = self.resources.paint(color);
        self.pixmap
            .stroke_path(&path, paint, &stroke, Transform::identity(), None);
    }

    fn fill_rect(&mut self, rect: PixelRect, color: Rgba) {
        let Some(rect) = rect.to_skia() else {
            return;
        };
        let paint = self.resources.paint(color);
        self.pixmap
            .fill_rect(rect, paint, Transform::identity(), None);
    }

    fn stroke_rect(&mut self, rect: PixelRect, color: Rgba, width: f32) {
        let rounded = PixelRect::new(
            rect.x.round(),
            rect.y.round(),
            rect.width.round(),
            rect.height.round(),
        );
        let Some(rect) = rounded.to_skia() else {
            return;
        };
        let path = PathBuilder::from_rect(rect);
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        let paint = self.resources.paint(color);
        self.pixmap
            .stroke_path(&path, paint, &stroke, Transform::identity(), None);
    }

    fn draw_text(&mut self, text: &str, font_px: f32, color: Rgba, rect: PixelRect) {
        if !self.resources.glyphs.has_font() {
            if !self.resources.text_skip_logged {
                log::debug!("no font available; text commands are skipped");
                self.resources.text_skip_logged = true;
            }
            return;
        }

        let glyphs = &mut self.resources.glyphs;
        let ascent = glyphs.ascent(font_px) as f64;
        let line_height = glyphs.line_height(font_px) as f64;
        let clip = Clip::new(rect, self.pixmap.width(), self.pixmap.height());
        let right = rect.x + rect.width;
        let bottom = rect.y + rect.height;

        let mut pen_x = rect.x;
        let mut baseline = rect.y + ascent;
        for ch in text.chars() {
            if ch == '\n' {
                pen_x = rect.x;
                baseline += line_height;
                continue;
            }
            let Some(glyph) = glyphs.glyph(ch, font_px) else {
                continue;
            };
            let advance = glyph.metrics.advance_width as f64;
            if pen_x + advance > right && pen_x > rect.x {
                pen_x = rect.x;
                baseline += line_height;
            }
            if baseline - ascent >= bottom {
                break;
            }
            let origin_x = (pen_x + glyph.metrics.xmin as f64).round() as i64;
            let origin_y =
                (baseline - glyph.metrics.height as f64 - glyph.metrics.ymin as f64).round() as i64;
            blend_glyph(self.pixmap, glyph, origin_x, origin_y, &clip, color);
            pen_x += advance;
        }
    }
}

/// Integer clip window, already intersected with the pixmap.
struct Clip {
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
}

impl Clip {
    fn new(rect: PixelRect, width: u32, height: u32) -> Self {
        Self {
            x0: (rect.x.floor() as i64).max(0),
            y0: (rect.y.floor() as i64).max(0),
            x1: ((rect.x + rect.width).ceil() as i64).min(width as i64),
            y1: ((rect.y + rect.height).ceil() as i64).min(height as i64),
        }
    }
}

/// Source-over blend of a coverage bitmap into premultiplied RGBA.
fn blend_glyph(pixmap: &mut Pixmap, glyph: &Glyph, ox: i64, oy: i64, clip: &Clip, color: Rgba) {
    let gw = glyph.metrics.width;
    let stride = pixmap.width() as i64;
    let data = pixmap.data_mut();
    for (row, coverage_row) in glyph.coverage.chunks(gw.max(1)).enumerate() {
        let y = oy + row as i64;
        if y < clip.y0 || y >= clip.y1 {
            continue;
        }
        for (col, &coverage) in coverage_row.iter().enumerate() {
            let x = ox + col as i64;
            if x < clip.x0 || x >= clip.x1 || coverage == 0 {
                continue;
            }
            let sa = color.a as u32 * coverage as u32 / 255;
            let inv = 255 - sa;
            let idx = ((y * stride + x) * 4) as usize;
            let px = &mut data[idx..idx + 4];
            px[0] = (color.r as u32 * sa / 255 + px[0] as u32 * inv / 255) as u8;
            px[1] = (color.g as u32 * sa / 255 + px[1] as u32 * inv / 255) as u8;
            px[2] = (color.b as u32 * sa / 255 + px[2] as u32 * inv / 255) as u8;
            px[3] = (sa + px[3] as u32 * inv / 255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::GlyphCache;

    fn pixel(pixmap: &Pixmap, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * pixmap.width() + x) * 4) as usize;
        let d = pixmap.data();
        [d[idx], d[idx + 1], d[idx + 2], d[idx + 3]]
    }

    #[test]
    fn test_pixel_rect_from_corners() {
        let r = PixelRect::from_corners(Point::new(10.0, 50.0), Point::new(4.0, 20.0));
        assert_eq!(r, PixelRect::new(4.0, 20.0, 6.0, 30.0));
        assert_eq!(r.padded(0.5), PixelRect::new(3.5, 19.5, 7.0, 31.0));
    }

    #[test]
    fn test_fill_rect_and_clear() {
        let mut pixmap = Pixmap::new(10, 10).unwrap();
        let mut resources = ResourceCache::default();
        let mut surface = PixmapSurface::new(&mut pixmap, &mut resources);
        surface.clear(Rgba::BLACK);
        surface.fill_rect(PixelRect::new(2.0, 2.0, 4.0, 4.0), Rgba::RED);
        drop(surface);

        assert_eq!(pixel(&pixmap, 3, 3), [255, 0, 0, 255]);
        assert_eq!(pixel(&pixmap, 8, 8), [0, 0, 0, 255]);
    }

    #[test]
    fn test_draw_line_touches_pixels() {
        let mut pixmap = Pixmap::new(10, 10).unwrap();
        let mut resources = ResourceCache::default();
        let mut surface = PixmapSurface::new(&mut pixmap, &mut resources);
        surface.draw_line(Point::new(0.0, 5.5), Point::new(10.0, 5.5), Rgba::BLUE, 1.0);
        drop(surface);

        assert_eq!(pixel(&pixmap, 5, 5), [0, 0, 255, 255]);
        assert_eq!(pixel(&pixmap, 5, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn test_degenerate_rect_is_ignored() {
        let mut pixmap = Pixmap::new(4, 4).unwrap();
        let mut resources = ResourceCache::default();
        let mut surface = PixmapSurface::new(&mut pixmap, &mut resources);
        surface.fill_rect(PixelRect::new(1.0, 1.0, 0.0, 0.0), Rgba::RED);
        drop(surface);
        assert!(pixmap.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_degenerate_rect_is_not_stroked() {
        let mut pixmap = Pixmap::new(4, 4).unwrap();
        let mut resources = ResourceCache::default();
        let mut surface = PixmapSurface::new(&mut pixmap, &mut resources);
        surface.stroke_rect(PixelRect::new(1.0, 1.0, 2.0, 0.0), Rgba::RED, 1.0);
        surface.fill_rect(PixelRect::new(1.0, 1.0, -2.0, 2.0), Rgba::RED);
        drop(surface);
        assert!(pixmap.data().iter().all(|&b| b == 0));
    }

    /// Bounding box `(x0, y0, x1, y1)` of every pixel with a non-zero alpha.
    fn lit_bounds(pixmap: &Pixmap) -> Option<(u32, u32, u32, u32)> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for y in 0..pixmap.height() {
            for x in 0..pixmap.width() {
                if pixel(pixmap, x, y)[3] == 0 {
                    continue;
                }
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
        bounds
    }

    fn text_pixmap(text: &str, font_px: f32, rect: PixelRect) -> Pixmap {
        let mut pixmap = Pixmap::new(64, 40).unwrap();
        let mut resources = ResourceCache::default();
        let mut surface = PixmapSurface::new(&mut pixmap, &mut resources);
        surface.draw_text(text, font_px, Rgba::WHITE, rect);
        drop(surface);
        pixmap
    }

    #[test]
    fn test_text_lays_out_glyphs_with_default_font() {
        let pixmap = text_pixmap("W", 16.0, PixelRect::new(4.0, 4.0, 40.0, 20.0));
        let (x0, y0, x1, y1) = lit_bounds(&pixmap).unwrap();
        assert!(x0 >= 4 && y0 >= 4);
        assert!(x1 < 44 && y1 < 24);
        // A 16px capital is well over half the requested height.
        assert!(y1 - y0 >= 8);
        assert!(pixmap.data().chunks(4).any(|p| p[3] > 128));
    }

    #[test]
    fn test_text_moves_with_its_rect() {
        let a = text_pixmap("Hi", 16.0, PixelRect::new(4.0, 4.0, 40.0, 20.0));
        let b = text_pixmap("Hi", 16.0, PixelRect::new(5.0, 5.0, 40.0, 20.0));
        let (ax0, ay0, ax1, ay1) = lit_bounds(&a).unwrap();
        assert_eq!(lit_bounds(&b), Some((ax0 + 1, ay0 + 1, ax1 + 1, ay1 + 1)));
        for y in ay0..=ay1 {
            for x in ax0..=ax1 {
                assert_eq!(pixel(&a, x, y), pixel(&b, x + 1, y + 1));
            }
        }
    }

    #[test]
    fn test_text_is_clipped_to_its_rect() {
        let rect = PixelRect::new(6.0, 3.0, 10.0, 9.0);
        let pixmap = text_pixmap("WWWW\nWWWW", 16.0, rect);
        let (x0, y0, x1, y1) = lit_bounds(&pixmap).unwrap();
        assert!(x0 >= 6 && y0 >= 3);
        assert!(x1 < 16 && y1 < 12);
    }

    #[test]
    fn test_text_without_font_is_skipped() {
        let mut pixmap = Pixmap::new(20, 20).unwrap();
        let mut resources = ResourceCache::new(GlyphCache::new(None));
        let mut surface = PixmapSurface::new(&mut pixmap, &mut resources);
        surface.draw_text("hello", 12.0, Rgba::WHITE, PixelRect::new(0.0, 0.0, 20.0, 20.0));
        drop(surface);
        assert!(pixmap.data().iter().all(|&b| b == 0));
        assert!(resources.text_skip_logged);
    }

    #[test]
    fn test_blend_glyph_clips() {
        let mut pixmap = Pixmap::new(4, 4).unwrap();
        let glyph = Glyph {
            metrics: fontdue::Metrics {
                width: 3,
                height: 3,
                ..Default::default()
            },
            coverage: vec![255; 9],
        };
        let clip = Clip::new(PixelRect::new(0.0, 0.0, 2.0, 2.0), 4, 4);
        blend_glyph(&mut pixmap, &glyph, 1, 1, &clip, Rgba::WHITE);

        assert_eq!(pixel(&pixmap, 1, 1), [255, 255, 255, 255]);
        assert_eq!(pixel(&pixmap, 2, 2), [0, 0, 0, 0]);
        assert_eq!(pixel(&pixmap, 0, 0), [0, 0, 0, 0]);
    }
}
