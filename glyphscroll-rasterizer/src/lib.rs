//! Font loading and glyph rasterization backed by `swash`, with installed
//! font lookup through `fontdb`.

mod error;
mod font;
mod rasterizer;

pub use error::Error;
pub use font::{FontSource, LoadedFont};
pub use rasterizer::SwashRasterizer;
