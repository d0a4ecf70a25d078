//! GPU text viewing: a line-indexed file source, a glyph atlas and a
//! ring-buffered viewport grid drawn through `glow`.

/// Errors returned by the core.
pub mod error;
/// GL resources and drawing.
pub mod gl;

mod atlas;
mod ring;
mod text_source;
mod viewport;

#[cfg(test)]
mod test_support;

pub use ::glyphscroll_data::{Glyph, GlyphRasterizer, GlyphTable, Placement, UvRect};
pub use ::glyphscroll_rasterizer::{FontSource, SwashRasterizer};
pub use atlas::AtlasBuild;
pub use error::Error;
pub use gl::{Drawable, GlState, GlyphAtlas, RenderContext, TextView};
pub use ring::RowRing;
pub use text_source::{LineIndex, TextSource};
pub use viewport::{
    CellQuad, DirtyArrays, GridConfig, GridState, PendingUpload, REBASE_DISTANCE, SyncKind, ViewportGrid,
};

/// GL shader language target for version injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlslVersion {
    /// OpenGL 3.3 Core: `#version 330 core`
    Gl330,
}

impl GlslVersion {
    /// Header prepended to vertex shader bodies.
    pub fn vertex_preamble(&self) -> &'static str {
        match self {
            Self::Gl330 => "#version 330 core\n",
        }
    }

    /// Header prepended to fragment shader bodies.
    pub fn fragment_preamble(&self) -> &'static str {
        match self {
            Self::Gl330 => "#version 330 core\n",
        }
    }
}
