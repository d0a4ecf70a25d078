use glow::HasContext;
use glyphscroll_rasterizer::FontSource;
use tracing::debug;

use crate::{
    GlslVersion,
    error::Error,
    gl::{
        Drawable, GlState, RenderContext, ShaderProgram, atlas::GlyphAtlas, buffer_update_array,
        buffer_upload_array,
    },
    text_source::TextSource,
    viewport::{DirtyArrays, GridConfig, GridState, PendingUpload, SyncKind, ViewportGrid},
};

/// A scrollable view of a text file drawn as textured quads.
///
/// Owns the host-side [`ViewportGrid`], the [`GlyphAtlas`] it lays text out
/// against, and the GL buffers mirroring the grid's attribute arrays. Scroll
/// requests are applied by [`sync`](Self::sync), which uploads only the rows
/// that changed.
#[derive(Debug)]
#[must_use = "call `delete(gl)` before dropping to avoid GPU resource leaks"]
pub struct TextView {
    /// Shader program, buffers and uniform locations
    gpu: GpuResources,
    /// Host-side layout of the visible rows
    grid: ViewportGrid,
    /// Glyph table and texture of the current font, if one is loaded
    atlas: Option<GlyphAtlas>,
}

#[derive(Debug)]
struct GpuResources {
    shader: ShaderProgram,
    buffers: GridBuffers,
    sampler_loc: glow::UniformLocation,
    row_offset_loc: glow::UniformLocation,
}

impl GpuResources {
    const FRAGMENT_GLSL: &'static str = include_str!("../shaders/text.frag");
    const VERTEX_GLSL: &'static str = include_str!("../shaders/text.vert");

    fn new(
        gl: &glow::Context,
        grid: &ViewportGrid,
        glsl_version: &GlslVersion,
    ) -> Result<Self, Error> {
        let shader =
            ShaderProgram::create(gl, glsl_version, Self::VERTEX_GLSL, Self::FRAGMENT_GLSL)?;

        let locations = shader.uniform_location(gl, "u_sampler").and_then(|sampler| {
            shader
                .uniform_location(gl, "u_row_offset")
                .map(|row_offset| (sampler, row_offset))
        });
        let (sampler_loc, row_offset_loc) = match locations {
            Ok(locations) => locations,
            Err(e) => {
                shader.delete(gl);
                return Err(e);
            },
        };

        let buffers = match GridBuffers::new(gl, grid) {
            Ok(buffers) => buffers,
            Err(e) => {
                shader.delete(gl);
                return Err(e);
            },
        };

        Ok(Self { shader, buffers, sampler_loc, row_offset_loc })
    }

    fn delete(&self, gl: &glow::Context) {
        self.shader.delete(gl);
        self.buffers.delete(gl);
    }
}

mod attrib {
    pub const POS: u32 = 0;
    pub const UV: u32 = 1;
    pub const COLOR: u32 = 2;
}

/// One VBO per attribute array plus the face index buffer, recorded in a VAO.
#[derive(Debug)]
struct GridBuffers {
    vao: glow::VertexArray,
    vertices: glow::Buffer,
    uvs: glow::Buffer,
    colors: glow::Buffer,
    faces: glow::Buffer,
}

impl GridBuffers {
    fn new(gl: &glow::Context, grid: &ViewportGrid) -> Result<Self, Error> {
        let vao =
            unsafe { gl.create_vertex_array() }.map_err(Error::vertex_array_creation_failed)?;
        unsafe { gl.bind_vertex_array(Some(vao)) };

        let vertices = create_buffer(gl, "vertex")?;
        let uvs = create_buffer(gl, "uv")?;
        let colors = create_buffer(gl, "color")?;
        let faces = create_buffer(gl, "face")?;

        unsafe {
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vertices));
            enable_vertex_attrib(gl, attrib::POS, 2);
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(uvs));
            enable_vertex_attrib(gl, attrib::UV, 2);
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(colors));
            enable_vertex_attrib(gl, attrib::COLOR, 4);

            // the element buffer binding is VAO state
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(faces));
        }

        let buffers = Self { vao, vertices, uvs, colors, faces };
        buffers.respecify(gl, grid);

        // Unbind VAO to prevent accidental modification
        unsafe { gl.bind_vertex_array(None) };

        Ok(buffers)
    }

    fn delete(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_vertex_array(self.vao);
            gl.delete_buffer(self.vertices);
            gl.delete_buffer(self.uvs);
            gl.delete_buffer(self.colors);
            gl.delete_buffer(self.faces);
        }
    }

    /// Reallocates every buffer with the grid's current arrays.
    fn respecify(&self, gl: &glow::Context, grid: &ViewportGrid) {
        unsafe {
            gl.bind_vertex_array(Some(self.vao));

            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vertices));
            buffer_upload_array(gl, glow::ARRAY_BUFFER, grid.vertices(), glow::DYNAMIC_DRAW);
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.uvs));
            buffer_upload_array(gl, glow::ARRAY_BUFFER, grid.uvs(), glow::DYNAMIC_DRAW);
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.colors));
            buffer_upload_array(gl, glow::ARRAY_BUFFER, grid.colors(), glow::DYNAMIC_DRAW);
            buffer_upload_array(gl, glow::ELEMENT_ARRAY_BUFFER, grid.faces(), glow::STATIC_DRAW);

            gl.bind_vertex_array(None);
        }
    }

    /// Uploads the vertices of the given row slots for each flagged array.
    fn update_rows(&self, gl: &glow::Context, grid: &ViewportGrid, pending: &PendingUpload) {
        let vertices_per_row = grid.dimensions().0 * 4;

        if pending.arrays.contains(DirtyArrays::VERTICES) {
            upload_rows(gl, self.vertices, grid.vertices(), &pending.rows, vertices_per_row);
        }
        if pending.arrays.contains(DirtyArrays::UVS) {
            upload_rows(gl, self.uvs, grid.uvs(), &pending.rows, vertices_per_row);
        }
        if pending.arrays.contains(DirtyArrays::COLORS) {
            upload_rows(gl, self.colors, grid.colors(), &pending.rows, vertices_per_row);
        }

        unsafe { gl.bind_buffer(glow::ARRAY_BUFFER, None) };
    }
}

fn upload_rows<T: Copy>(
    gl: &glow::Context,
    buffer: glow::Buffer,
    data: &[T],
    rows: &[usize],
    per_row: usize,
) {
    unsafe { gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer)) };
    for &slot in rows {
        let first = slot * per_row;
        unsafe { buffer_update_array(gl, glow::ARRAY_BUFFER, first, &data[first..first + per_row]) };
    }
}

impl TextView {
    /// Creates a view of `source` covering a `viewport` of pixels. Nothing is
    /// drawn until a font is set.
    pub fn new(
        gl: &glow::Context,
        source: TextSource,
        viewport: (u32, u32),
        config: GridConfig,
        glsl_version: &GlslVersion,
    ) -> Result<Self, Error> {
        let grid = ViewportGrid::new(source, viewport, config);
        let gpu = GpuResources::new(gl, &grid, glsl_version)?;

        Ok(Self { gpu, grid, atlas: None })
    }

    /// Deletes all GPU resources owned by this view, including the atlas.
    pub fn delete(mut self, gl: &glow::Context) {
        self.clear_font(gl);
        self.gpu.delete(gl);
    }

    /// Replaces the font, rasterizing `source` at `pixel_height`.
    ///
    /// The previous atlas is released first; if the new font fails to load
    /// the view is left without one and draws nothing.
    pub fn set_font(
        &mut self,
        gl: &glow::Context,
        source: &FontSource,
        pixel_height: u32,
    ) -> Result<(), Error> {
        self.clear_font(gl);
        let atlas = GlyphAtlas::rasterize(gl, source, pixel_height)?;
        self.set_atlas(gl, atlas)
    }

    /// Switches to an already built atlas, releasing the previous one.
    pub fn set_atlas(&mut self, gl: &glow::Context, atlas: GlyphAtlas) -> Result<(), Error> {
        self.clear_font(gl);

        if let Err(e) = self.grid.set_font(atlas.table().clone()) {
            atlas.delete(gl);
            return Err(e);
        }

        self.atlas = Some(atlas);
        Ok(())
    }

    /// Releases the atlas and returns the view to its uninitialized state.
    pub fn clear_font(&mut self, gl: &glow::Context) {
        if let Some(atlas) = self.atlas.take() {
            atlas.delete(gl);
        }
        if self.grid.state() != GridState::Uninitialized {
            self.grid.clear_font();
        }
    }

    /// Updates the viewport size in pixels.
    pub fn resize(&mut self, viewport: (u32, u32)) -> Result<(), Error> {
        self.grid.resize(viewport)
    }

    /// Requests a new first visible line; see [`ViewportGrid::set_start_line`].
    pub fn set_start_line(&mut self, line: usize) {
        self.grid.set_start_line(line);
    }

    /// Moves the requested start line by `delta` lines.
    pub fn scroll_by(&mut self, delta: isize) {
        self.grid.scroll_by(delta);
    }

    /// Appends to the end of the text.
    pub fn append_text(&mut self, text: &str) -> Result<(), Error> {
        self.grid.append_text(text)
    }

    /// Inserts at the insertion point; see [`ViewportGrid::insert_text`].
    pub fn insert_text(&mut self, text: &str) -> Result<(), Error> {
        self.grid.insert_text(text)
    }

    /// Applies pending scroll requests and uploads the rows that changed.
    pub fn sync(&mut self, gl: &glow::Context) -> SyncKind {
        let kind = self.grid.sync();
        self.flush(gl);
        kind
    }

    /// Uploads attribute changes to the GPU buffers.
    pub fn flush(&mut self, gl: &glow::Context) {
        let pending = self.grid.take_pending_upload();
        if pending.is_empty() {
            return;
        }

        if pending.is_reallocation() {
            debug!(vertices = self.grid.vertices().len(), "Respecifying grid buffers");
            self.gpu.buffers.respecify(gl, &self.grid);
        } else {
            self.gpu
                .buffers
                .update_rows(gl, &self.grid, &pending);
        }
    }

    /// Renders the view in a single call.
    ///
    /// This is a convenience method that constructs a [`RenderContext`] and
    /// executes the full [`Drawable`] lifecycle (`prepare` → `draw` → `cleanup`).
    pub fn render(&self, gl: &glow::Context, state: &mut GlState) -> Result<(), Error> {
        let mut ctx = RenderContext { gl, state };
        self.prepare(&mut ctx)?;
        self.draw(&mut ctx);
        self.cleanup(&mut ctx);
        Ok(())
    }

    /// The CPU side of the view.
    pub fn grid(&self) -> &ViewportGrid {
        &self.grid
    }

    /// The glyph atlas, if a font is set.
    pub fn atlas(&self) -> Option<&GlyphAtlas> {
        self.atlas.as_ref()
    }
}

impl Drawable for TextView {
    fn prepare(&self, context: &mut RenderContext) -> Result<(), Error> {
        let gl = context.gl;

        self.gpu.shader.use_program(gl);
        unsafe { gl.bind_vertex_array(Some(self.gpu.buffers.vao)) };

        context
            .state
            .active_texture(gl, glow::TEXTURE0)
            .blend(gl, true)
            .blend_func(gl, glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);

        if let Some(atlas) = &self.atlas {
            atlas.bind(gl);
        }

        unsafe {
            gl.uniform_1_i32(Some(&self.gpu.sampler_loc), 0);
            gl.uniform_1_f32(Some(&self.gpu.row_offset_loc), self.grid.row_offset());
        }

        Ok(())
    }

    fn draw(&self, context: &mut RenderContext) {
        if self.atlas.is_none() || self.grid.state() != GridState::Synced {
            return;
        }

        let index_count = self.grid.faces().len() as i32;
        unsafe {
            context
                .gl
                .draw_elements(glow::TRIANGLES, index_count, glow::UNSIGNED_INT, 0);
        }
    }

    fn cleanup(&self, context: &mut RenderContext) {
        let gl = context.gl;
        unsafe {
            gl.bind_vertex_array(None);
            gl.bind_texture(glow::TEXTURE_2D, None);
            gl.use_program(None);
        }

        context.state.blend(gl, false);
    }
}

fn create_buffer(gl: &glow::Context, buffer_type: &str) -> Result<glow::Buffer, Error> {
    unsafe { gl.create_buffer() }.map_err(|e| Error::buffer_creation_failed(buffer_type, e))
}

fn enable_vertex_attrib(gl: &glow::Context, index: u32, size: i32) {
    let stride = size * size_of::<f32>() as i32;
    unsafe {
        gl.enable_vertex_attrib_array(index);
        gl.vertex_attrib_pointer_f32(index, size, glow::FLOAT, false, stride, 0);
    }
}
