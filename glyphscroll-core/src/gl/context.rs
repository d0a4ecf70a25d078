use glow::HasContext;

/// Shadow copy of the GL state touched while drawing text.
///
/// Setters only reach GL when the value differs from the cached one. A field
/// starts out unknown, so the first call always goes through.
#[derive(Debug, Default)]
pub struct GlState {
    viewport: Option<[i32; 4]>,
    clear_color: Option<[f32; 4]>,
    blend: Option<bool>,
    blend_func: Option<(u32, u32)>,
    active_texture: Option<u32>,
}

/// Stores `value` in `slot` and reports whether it changed.
fn update<T: PartialEq>(slot: &mut Option<T>, value: T) -> bool {
    if slot.as_ref() == Some(&value) {
        return false;
    }
    *slot = Some(value);
    true
}

impl GlState {
    /// Creates a cache where every value is unknown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the GL viewport rectangle.
    pub fn viewport(
        &mut self,
        gl: &glow::Context,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> &mut Self {
        if update(&mut self.viewport, [x, y, width, height]) {
            unsafe { gl.viewport(x, y, width, height) };
        }
        self
    }

    /// Sets the color `glClear` fills with.
    pub fn clear_color(&mut self, gl: &glow::Context, r: f32, g: f32, b: f32, a: f32) -> &mut Self {
        if update(&mut self.clear_color, [r, g, b, a]) {
            unsafe { gl.clear_color(r, g, b, a) };
        }
        self
    }

    /// Enables or disables `GL_BLEND`.
    pub fn blend(&mut self, gl: &glow::Context, enable: bool) -> &mut Self {
        if update(&mut self.blend, enable) {
            unsafe {
                if enable { gl.enable(glow::BLEND) } else { gl.disable(glow::BLEND) }
            };
        }
        self
    }

    /// Sets the source and destination blend factors.
    pub fn blend_func(&mut self, gl: &glow::Context, src: u32, dst: u32) -> &mut Self {
        if update(&mut self.blend_func, (src, dst)) {
            unsafe { gl.blend_func(src, dst) };
        }
        self
    }

    /// Selects the texture unit later binds apply to.
    pub fn active_texture(&mut self, gl: &glow::Context, texture_unit: u32) -> &mut Self {
        if update(&mut self.active_texture, texture_unit) {
            unsafe { gl.active_texture(texture_unit) };
        }
        self
    }

    /// Forgets every cached value, for when other code has touched the context.
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }
}
