use std::{
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use glyphscroll_data::{AtlasLayout, FontMetrics, GlyphRasterizer, GlyphTable, RasterizedGlyph};

use crate::atlas::AtlasBuild;

pub(crate) fn write_lines(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// Fixed-metric rasterizer: every known code is a solid `size` box filled
/// with its own code value.
pub(crate) struct StubRasterizer {
    pub codes: Vec<u8>,
    pub pixel_height: u32,
    pub ascent: u32,
    pub size: (u32, u32),
    pub advance_px: u32,
    pub space: bool,
}

impl StubRasterizer {
    pub fn new(codes: &[u8]) -> Self {
        Self {
            codes: codes.to_vec(),
            pixel_height: 10,
            ascent: 8,
            size: (6, 8),
            advance_px: 8,
            space: true,
        }
    }

    pub fn without_space(mut self) -> Self {
        self.space = false;
        self
    }

    pub fn table(mut self) -> Rc<GlyphTable> {
        let build = AtlasBuild::rasterize(&mut self, AtlasLayout::DEFAULT_ROW_LIMIT);
        Rc::new(build.into_pixels().0)
    }
}

impl GlyphRasterizer for StubRasterizer {
    fn metrics(&self) -> FontMetrics {
        FontMetrics { pixel_height: self.pixel_height, ascent: self.ascent }
    }

    fn rasterize(&mut self, code: u8) -> Option<RasterizedGlyph> {
        let advance = self.advance_px << 6;
        if code == b' ' && self.space {
            return Some(RasterizedGlyph::empty(advance));
        }
        if !self.codes.contains(&code) {
            return None;
        }

        let (width, height) = self.size;
        Some(RasterizedGlyph {
            width,
            height,
            bearing: (1, height as i32),
            advance,
            bitmap: vec![code; (width * height) as usize],
        })
    }
}
