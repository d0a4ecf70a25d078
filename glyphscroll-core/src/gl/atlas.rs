use std::rc::Rc;

use glyphscroll_data::{AtlasLayout, GlyphRasterizer, GlyphTable};
use glyphscroll_rasterizer::{FontSource, SwashRasterizer};
use tracing::info;

use crate::{atlas::AtlasBuild, error::Error, gl::texture::AtlasTexture};

/// Glyph table for one font and pixel height, backed by its atlas texture.
///
/// The table is shared with the viewport grid laying out text against it.
#[derive(Debug)]
#[must_use = "call `delete(gl)` before dropping to avoid GPU resource leaks"]
pub struct GlyphAtlas {
    table: Rc<GlyphTable>,
    texture: AtlasTexture,
}

impl GlyphAtlas {
    /// Loads the font behind `source` and rasterizes the ASCII charset at
    /// `pixel_height` into a new texture.
    pub fn rasterize(
        gl: &glow::Context,
        source: &FontSource,
        pixel_height: u32,
    ) -> Result<Self, Error> {
        let mut rasterizer = SwashRasterizer::open(source, pixel_height)?;
        let atlas = Self::from_rasterizer(gl, &mut rasterizer)?;

        info!(
            font = rasterizer.font().name(),
            pixel_height,
            glyphs = atlas.table.len(),
            width = atlas.texture.size().0,
            height = atlas.texture.size().1,
            "Rasterized glyph atlas"
        );
        Ok(atlas)
    }

    /// Builds the atlas from any glyph source.
    pub fn from_rasterizer(
        gl: &glow::Context,
        rasterizer: &mut impl GlyphRasterizer,
    ) -> Result<Self, Error> {
        let build = AtlasBuild::rasterize(rasterizer, AtlasLayout::DEFAULT_ROW_LIMIT);
        let texture = AtlasTexture::allocate(gl, build.dimensions())?;

        match build.upload(|placement, bitmap| texture.upload(gl, placement, bitmap)) {
            Ok(table) => Ok(Self { table: Rc::new(table), texture }),
            Err(e) => {
                texture.delete(gl);
                Err(e)
            },
        }
    }

    /// Metrics and UVs of the glyphs in the texture.
    pub fn table(&self) -> &Rc<GlyphTable> {
        &self.table
    }

    /// The uploaded atlas texture.
    pub fn texture(&self) -> &AtlasTexture {
        &self.texture
    }

    /// Binds the atlas texture to the active texture unit.
    pub fn bind(&self, gl: &glow::Context) {
        self.texture.bind(gl);
    }

    /// Deletes the atlas texture.
    pub fn delete(self, gl: &glow::Context) {
        self.texture.delete(gl);
    }
}
