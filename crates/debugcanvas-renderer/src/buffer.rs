use std::path::Path;
use std::sync::Arc;

use tiny_skia::{IntSize, Pixmap, PixmapRef};

use crate::error::RenderError;

pub const BYTES_PER_PIXEL: usize = 4;

/// Memory layout of [`Frame`] pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit RGBA, color channels premultiplied by alpha, rows top to bottom.
    Rgba8Premultiplied,
}

/// A finished, immutable image. Clones share the same pixel storage.
#[derive(Debug, Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Arc<Vec<u8>>,
}

impl Frame {
    /// Wrap `pixels` as a frame; the length must be `width * height * 4`.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, RenderError> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            pixels: Arc::new(pixels),
        })
    }

    /// A fully transparent frame.
    pub fn blank(width: u32, height: u32) -> Result<Self, RenderError> {
        Self::new(
            width,
            height,
            vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
        )
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        PixelFormat::Rgba8Premultiplied
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let p = &self.pixels[idx..idx + BYTES_PER_PIXEL];
        Some([p[0], p[1], p[2], p[3]])
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        let pixmap = PixmapRef::from_bytes(&self.pixels, self.width, self.height).ok_or(
            RenderError::InvalidDimensions {
                width: self.width,
                height: self.height,
            },
        )?;
        pixmap
            .encode_png()
            .map_err(|e| RenderError::Encode(e.to_string()))
    }

    pub fn save_png(&self, path: &Path) -> Result<(), RenderError> {
        let png = self.encode_png()?;
        std::fs::write(path, png).map_err(|e| RenderError::Encode(e.to_string()))
    }
}

enum Storage {
    /// Nothing allocated.
    Released,
    /// Owned and writable by the current pass.
    Ready(Pixmap),
    /// Frozen into a frame handed to the display sink. Reclaimable once the
    /// sink drops every clone.
    Published(Frame),
}

/// The render target of the worker: allocated lazily, frozen into a
/// [`Frame`] at the end of each pass, and reallocated (never resized) when
/// the requested dimensions change.
pub struct PixelBuffer {
    storage: Storage,
    invalid: bool,
    allocations: u64,
}

impl PixelBuffer {
    pub fn new() -> Self {
        Self {
            storage: Storage::Released,
            invalid: false,
            allocations: 0,
        }
    }

    /// Number of fresh allocations so far.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    pub fn is_allocated(&self) -> bool {
        !matches!(self.storage, Storage::Released)
    }

    /// Force the next [`prepare`](Self::prepare) to reallocate.
    pub fn invalidate(&mut self) {
        self.invalid = true;
    }

    /// A writable pixmap of exactly `width x height`, reusing the current
    /// storage when possible.
    pub fn prepare(&mut self, width: u32, height: u32) -> Result<&mut Pixmap, RenderError> {
        let reusable = match std::mem::replace(&mut self.storage, Storage::Released) {
            Storage::Ready(pixmap) if !self.invalid && same_size(&pixmap, width, height) => {
                Some(pixmap)
            }
            Storage::Published(frame)
                if !self.invalid && frame.width == width && frame.height == height =>
            {
                reclaim(frame)
            }
            Storage::Released => None,
            Storage::Ready(_) | Storage::Published(_) => {
                log::trace!("replacing stale pixel buffer for a {}x{} pass", width, height);
                None
            }
        };

        let pixmap = match reusable {
            Some(pixmap) => pixmap,
            None => {
                log::debug!("allocating {}x{} pixel buffer", width, height);
                let pixmap = Pixmap::new(width, height)
                    .ok_or(RenderError::BufferAllocation { width, height })?;
                self.allocations += 1;
                pixmap
            }
        };

        self.invalid = false;
        self.storage = Storage::Ready(pixmap);
        match &mut self.storage {
            Storage::Ready(pixmap) => Ok(pixmap),
            _ => Err(RenderError::BufferAllocation { width, height }),
        }
    }

    /// Freeze the pixmap written by the current pass into a [`Frame`].
    pub fn publish(&mut self) -> Result<Frame, RenderError> {
        match std::mem::replace(&mut self.storage, Storage::Released) {
            Storage::Ready(pixmap) => {
                let (width, height) = (pixmap.width(), pixmap.height());
                let frame = Frame::new(width, height, pixmap.take())?;
                self.storage = Storage::Published(frame.clone());
                Ok(frame)
            }
            other => {
                self.storage = other;
                Err(RenderError::NothingToPublish)
            }
        }
    }

    /// Drop the storage. Releasing twice is tolerated and returns `false`.
    pub fn release(&mut self) -> bool {
        match std::mem::replace(&mut self.storage, Storage::Released) {
            Storage::Released => {
                log::trace!("pixel buffer already released");
                false
            }
            _ => true,
        }
    }
}

impl Default for PixelBuffer {
    fn default() -> Self {
        Self::new()
    }
}

fn same_size(pixmap: &Pixmap, width: u32, height: u32) -> bool {
    pixmap.width() == width && pixmap.height() == height
}

/// Take back the storage of a published frame if nobody else holds it.
fn reclaim(frame: Frame) -> Option<Pixmap> {
    let size = IntSize::from_wh(frame.width, frame.height)?;
    let pixels = Arc::try_unwrap(frame.pixels).ok()?;
    Pixmap::from_vec(pixels, size)
}
