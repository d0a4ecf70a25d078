/// Vertical font metrics at the rasterized pixel height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontMetrics {
    /// Requested pixel height (em size)
    pub pixel_height: u32,
    /// Distance from the top of a line to the baseline, in whole pixels
    pub ascent: u32,
}

/// An 8-bit coverage bitmap of one glyph plus its placement metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterizedGlyph {
    /// Bitmap width in pixels
    pub width: u32,
    /// Bitmap height in pixels
    pub height: u32,
    /// Left and top offset of the bitmap relative to the pen position on the baseline
    pub bearing: (i32, i32),
    /// Horizontal pen advance in 1/64 pixel units
    pub advance: u32,
    /// Row-major coverage values, `width * height` bytes
    pub bitmap: Vec<u8>,
}

impl RasterizedGlyph {
    /// A glyph that advances the pen but draws nothing, such as a space.
    pub fn empty(advance: u32) -> Self {
        Self {
            width: 0,
            height: 0,
            bearing: (0, 0),
            advance,
            bitmap: Vec::new(),
        }
    }
}

/// Turns character codes into coverage bitmaps for one font at one pixel height.
pub trait GlyphRasterizer {
    /// Metrics shared by every glyph this rasterizer produces.
    fn metrics(&self) -> FontMetrics;

    /// Rasterizes `code`, or returns `None` when the font has no glyph for it.
    fn rasterize(&mut self, code: u8) -> Option<RasterizedGlyph>;
}
