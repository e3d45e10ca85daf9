use std::collections::HashMap;
use std::path::Path;

use debugcanvas_core::Rgba;
use fontdue::{Font, FontSettings, Metrics};
use tiny_skia::Paint;

use crate::error::RenderError;

/// DejaVu Sans, used when no font is configured or the configured one fails
/// to load. License in `assets/DejaVuSans-LICENSE.txt`.
const BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Largest glyph height rasterized. Bigger requests would allocate a
/// coverage bitmap of roughly `px * px` bytes per glyph.
pub const MAX_GLYPH_PX: f32 = 1024.0;

/// A rasterized glyph: fontdue metrics plus an 8-bit coverage bitmap.
#[derive(Debug, Clone)]
pub struct Glyph {
    pub metrics: Metrics,
    pub coverage: Vec<u8>,
}

/// Glyph bitmaps memoized by character and pixel height.
pub struct GlyphCache {
    font: Option<Font>,
    glyphs: HashMap<(char, u32), Glyph>,
}

impl GlyphCache {
    pub fn new(font: Option<Font>) -> Self {
        Self {
            font,
            glyphs: HashMap::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let bytes = std::fs::read(path)
            .map_err(|e| RenderError::Font(format!("{}: {}", path.display(), e)))?;
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| RenderError::Font(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(Some(font)))
    }

    /// Cache over the font compiled into the crate.
    pub fn bundled() -> Result<Self, RenderError> {
        let font = Font::from_bytes(BUNDLED_FONT, FontSettings::default())
            .map_err(|e| RenderError::Font(format!("bundled font: {}", e)))?;
        Ok(Self::new(Some(font)))
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Distance from the top of a line to its baseline.
    pub fn ascent(&self, px: f32) -> f32 {
        self.font
            .as_ref()
            .and_then(|f| f.horizontal_line_metrics(px))
            .map(|m| m.ascent)
            .unwrap_or(px * 0.8)
    }

    pub fn line_height(&self, px: f32) -> f32 {
        self.font
            .as_ref()
            .and_then(|f| f.horizontal_line_metrics(px))
            .map(|m| m.new_line_size)
            .unwrap_or(px * 1.2)
    }

    /// `None` without a font, or when `px` is not in `(0, MAX_GLYPH_PX]`.
    pub fn glyph(&mut self, ch: char, px: f32) -> Option<&Glyph> {
        let font = self.font.as_ref()?;
        if !(px > 0.0 && px <= MAX_GLYPH_PX) {
            return None;
        }
        // Quarter-pixel buckets keep zooming from filling the cache.
        let key = (ch, (px * 4.0).round() as u32);
        Some(self.glyphs.entry(key).or_insert_with(|| {
            let (metrics, coverage) = font.rasterize(ch, key.1 as f32 / 4.0);
            Glyph { metrics, coverage }
        }))
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

/// Per-engine drawing resources, touched only by the render worker.
pub struct ResourceCache {
    paints: HashMap<Rgba, Paint<'static>>,
    pub glyphs: GlyphCache,
    pub(crate) text_skip_logged: bool,
}

impl ResourceCache {
    pub fn new(glyphs: GlyphCache) -> Self {
        Self {
            paints: HashMap::new(),
            glyphs,
            text_skip_logged: false,
        }
    }

    /// Load the font at `font_path` if given, else the bundled font. A
    /// broken font file is logged and replaced by the bundled font.
    pub fn from_font_path(font_path: Option<&Path>) -> Self {
        let loaded = match font_path {
            Some(path) => GlyphCache::load(path).or_else(|e| {
                log::warn!("{}; using the bundled font", e);
                GlyphCache::bundled()
            }),
            None => GlyphCache::bundled(),
        };
        let glyphs = loaded.unwrap_or_else(|e| {
            log::warn!("text rendering disabled: {}", e);
            GlyphCache::new(None)
        });
        Self::new(glyphs)
    }

    /// Solid, non-antialiased paint for `color`.
    pub fn paint(&mut self, color: Rgba) -> &Paint<'static> {
        self.paints.entry(color).or_insert_with(|| {
            let mut paint = Paint::default();
            paint.set_color_rgba8(color.r, color.g, color.b, color.a);
            paint.anti_alias = false;
            paint
        })
    }

    pub fn paint_count(&self) -> usize {
        self.paints.len()
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::from_font_path(None)
    }
}
