use glow::HasContext;
use glyphscroll_data::Placement;

use crate::error::Error;

/// Single-channel 8-bit texture holding the glyph atlas.
#[derive(Debug)]
pub struct AtlasTexture {
    gl_texture: glow::Texture,
    size: (u32, u32),
}

impl AtlasTexture {
    /// Allocates a `size` texture cleared to zero coverage.
    pub fn allocate(gl: &glow::Context, size: (u32, u32)) -> Result<Self, Error> {
        let (width, height) = (size.0 as i32, size.1 as i32);
        let gl_texture = unsafe { gl.create_texture() }.map_err(Error::texture_creation_failed)?;

        // gaps between glyphs are never sampled, but keep them defined
        let empty = vec![0u8; size.0 as usize * size.1 as usize];

        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(gl_texture));
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0, // level
                glow::R8 as i32,
                width,
                height,
                0, // border
                glow::RED,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(&empty)),
            );
        }

        Self::setup_sampling(gl);

        Ok(Self { gl_texture, size })
    }

    /// Writes one glyph bitmap into its packed rectangle.
    pub fn upload(&self, gl: &glow::Context, placement: &Placement, bitmap: &[u8]) -> Result<(), Error> {
        let fits = placement.x + placement.width <= self.size.0
            && placement.y + placement.height <= self.size.1
            && bitmap.len() == placement.width as usize * placement.height as usize;
        if !fits {
            return Err(Error::glyph_out_of_bounds(placement.code, self.size));
        }

        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(self.gl_texture));
            gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0, // level
                placement.x as i32,
                placement.y as i32,
                placement.width as i32,
                placement.height as i32,
                glow::RED,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(bitmap)),
            );
        }

        Ok(())
    }

    /// Returns the texture dimensions (width, height)
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Binds to `TEXTURE_2D` on the active unit.
    pub fn bind(&self, gl: &glow::Context) {
        unsafe { gl.bind_texture(glow::TEXTURE_2D, Some(self.gl_texture)) };
    }

    /// Releases the GL texture.
    pub fn delete(&self, gl: &glow::Context) {
        unsafe { gl.delete_texture(self.gl_texture) };
    }

    fn setup_sampling(gl: &glow::Context) {
        // exact texel lookups: glyphs are drawn at their rasterized size
        unsafe {
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::NEAREST as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::NEAREST as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
        }
    }
}
