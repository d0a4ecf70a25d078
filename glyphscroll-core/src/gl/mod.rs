mod atlas;
mod buffer;
mod context;
mod program;
mod renderer;
mod text_view;
mod texture;

pub use atlas::GlyphAtlas;
use buffer::*;
pub use context::GlState;
pub(crate) use program::*;
pub use renderer::{Drawable, RenderContext};
pub use text_view::TextView;
pub use texture::AtlasTexture;
