use glyphscroll_data::{FontMetrics, GlyphRasterizer, RasterizedGlyph};
use swash::{
    scale::{Render, ScaleContext, Source},
    zeno::Format,
};
use tracing::{debug, trace};

use crate::{
    error::Error,
    font::{FontSource, LoadedFont},
};

/// Rasterizes glyphs of one font at a fixed pixel height into 8-bit coverage bitmaps.
pub struct SwashRasterizer {
    font: LoadedFont,
    context: ScaleContext,
    pixel_height: u32,
}

impl SwashRasterizer {
    /// Loads the font behind `source` and prepares it for `pixel_height`.
    pub fn open(source: &FontSource, pixel_height: u32) -> Result<Self, Error> {
        Self::new(source.load()?, pixel_height)
    }

    /// Prepares an already loaded font for `pixel_height`.
    pub fn new(font: LoadedFont, pixel_height: u32) -> Result<Self, Error> {
        if pixel_height == 0 {
            return Err(Error::InvalidPixelHeight(pixel_height));
        }

        debug!(font = font.name(), pixel_height, "Created glyph rasterizer");

        Ok(Self {
            font,
            context: ScaleContext::new(),
            pixel_height,
        })
    }

    /// The font glyphs are rendered from.
    pub fn font(&self) -> &LoadedFont {
        &self.font
    }
}

impl std::fmt::Debug for SwashRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwashRasterizer")
            .field("font", &self.font)
            .field("pixel_height", &self.pixel_height)
            .finish()
    }
}

impl GlyphRasterizer for SwashRasterizer {
    fn metrics(&self) -> FontMetrics {
        let metrics = self
            .font
            .font_ref()
            .metrics(&[])
            .scale(self.pixel_height as f32);

        FontMetrics {
            pixel_height: self.pixel_height,
            ascent: metrics.ascent.round().max(0.0) as u32,
        }
    }

    fn rasterize(&mut self, code: u8) -> Option<RasterizedGlyph> {
        let font = self.font.font_ref();
        let glyph_id = font.charmap().map(code as char);
        if glyph_id == 0 {
            trace!(code, "No glyph in font");
            return None;
        }

        let size = self.pixel_height as f32;
        let advance = font
            .glyph_metrics(&[])
            .scale(size)
            .advance_width(glyph_id);
        // stored in 1/64 pixel units
        let advance = (advance * 64.0).round().max(0.0) as u32;

        let mut scaler = self
            .context
            .builder(font)
            .size(size)
            .hint(true)
            .build();

        let image = Render::new(&[Source::Outline])
            .format(Format::Alpha)
            .render(&mut scaler, glyph_id);

        let Some(image) = image else {
            return Some(RasterizedGlyph::empty(advance));
        };

        let placement = image.placement;
        if placement.width == 0 || placement.height == 0 {
            return Some(RasterizedGlyph::empty(advance));
        }

        Some(RasterizedGlyph {
            width: placement.width,
            height: placement.height,
            bearing: (placement.left, placement.top),
            advance,
            bitmap: image.data,
        })
    }
}
