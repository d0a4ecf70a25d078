use crate::{error::Error, gl::context::GlState};

/// The GL context together with its cached state, handed to each render phase.
pub struct RenderContext<'a> {
    /// The current GL context
    pub gl: &'a glow::Context,
    /// Cached state for `gl`
    pub state: &'a mut GlState,
}

/// Something that draws itself in three phases.
///
/// Callers run `prepare`, `draw` and `cleanup` in that order within one frame;
/// `cleanup` leaves bindings as `prepare` found them so drawables can be mixed.
pub trait Drawable {
    /// Binds program, vertex array and textures, and sets uniforms.
    fn prepare(&self, context: &mut RenderContext) -> Result<(), Error>;

    /// Issues the draw calls.
    fn draw(&self, context: &mut RenderContext);

    fn cleanup(&self, context: &mut RenderContext);
}
