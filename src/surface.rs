//! Pixel surfaces the player composites into.

/// A rectangle in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The part of `self` that lies inside a `width` x `height` surface.
    fn clip(&self, width: u32, height: u32) -> Option<Rect> {
        let right = self.x.saturating_add(self.width).min(width);
        let bottom = self.y.saturating_add(self.height).min(height);
        (self.x < right && self.y < bottom).then(|| Rect {
            x: self.x,
            y: self.y,
            width: right - self.x,
            height: bottom - self.y,
        })
    }
}

/// Raw RGBA pixels read back from a surface.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ImageData {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.data
            .get(i..i + 4)
            .map(|px| [px[0], px[1], px[2], px[3]])
    }
}

/// The drawing capability the player needs from a host.
///
/// Every operation clips to the surface bounds.
pub trait Surface {
    fn allocate(width: u32, height: u32) -> Self
    where
        Self: Sized;

    fn size(&self) -> (u32, u32);

    /// Resize to `width` x `height`; the contents become transparent.
    fn resize(&mut self, width: u32, height: u32);

    /// Overwrite the surface with raw RGBA rows, starting at the origin.
    fn put_pixels(&mut self, pixels: &[u8]);

    fn clear_rect(&mut self, rect: Rect);

    /// Draw `src` on top of `self` at (`left`, `top`) with source-over blending.
    fn draw_surface(&mut self, src: &Self, left: u32, top: u32);

    fn read_pixels(&self, rect: Rect) -> ImageData;
}

/// An in-memory RGBA surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl Surface for Canvas {
    fn allocate(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize(width as usize * height as usize * 4, 0);
    }

    fn put_pixels(&mut self, pixels: &[u8]) {
        let n = pixels.len().min(self.pixels.len());
        self.pixels[..n].copy_from_slice(&pixels[..n]);
    }

    fn clear_rect(&mut self, rect: Rect) {
        let Some(rect) = rect.clip(self.width, self.height) else {
            return;
        };
        for y in rect.y..rect.y + rect.height {
            let start = self.offset(rect.x, y);
            let end = start + rect.width as usize * 4;
            self.pixels[start..end].fill(0);
        }
    }

    fn draw_surface(&mut self, src: &Self, left: u32, top: u32) {
        let target = Rect::new(left, top, src.width, src.height);
        let Some(rect) = target.clip(self.width, self.height) else {
            return;
        };
        for row in 0..rect.height {
            for col in 0..rect.width {
                let s = src.offset(col, row);
                let d = self.offset(rect.x + col, rect.y + row);
                let mut px = [0u8; 4];
                px.copy_from_slice(&self.pixels[d..d + 4]);
                let blended = source_over(&src.pixels[s..s + 4], px);
                self.pixels[d..d + 4].copy_from_slice(&blended);
            }
        }
    }

    fn read_pixels(&self, rect: Rect) -> ImageData {
        let Some(rect) = rect.clip(self.width, self.height) else {
            return ImageData::default();
        };
        let mut data = Vec::with_capacity(rect.width as usize * rect.height as usize * 4);
        for y in rect.y..rect.y + rect.height {
            let start = self.offset(rect.x, y);
            data.extend_from_slice(&self.pixels[start..start + rect.width as usize * 4]);
        }
        ImageData {
            width: rect.width,
            height: rect.height,
            data,
        }
    }
}

/// Straight-alpha source-over of `src` onto `dst`.
fn source_over(src: &[u8], dst: [u8; 4]) -> [u8; 4] {
    let sa = src[3] as u32;
    match sa {
        255 => [src[0], src[1], src[2], 255],
        0 => dst,
        _ => {
            let da = dst[3] as u32 * (255 - sa) / 255;
            let out_a = sa + da;
            let mut out = [0u8; 4];
            for c in 0..3 {
                out[c] = ((src[c] as u32 * sa + dst[c] as u32 * da) / out_a) as u8;
            }
            out[3] = out_a as u8;
            out
        }
    }
}
