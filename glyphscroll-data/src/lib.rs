//! Plain data shared by the glyphscroll crates: glyph metrics, the row-packed
//! atlas layout, and the interface a font rasterizer has to provide.

mod glyph;
mod layout;
mod raster;

pub use glyph::{CHARSET_LEN, Glyph, GlyphTable, UvRect};
pub use layout::{AtlasLayout, Placement};
pub use raster::{FontMetrics, GlyphRasterizer, RasterizedGlyph};
