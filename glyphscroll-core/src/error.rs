use std::io;

/// Error categories for the text viewer core.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Opening, reading or writing the text source failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The font could not be opened or rasterized.
    #[error("Font error: {0}")]
    Font(#[from] glyphscroll_rasterizer::Error),

    /// Shader compilation, linking, or program creation errors.
    #[error("Shader error: {0}")]
    Shader(String),

    /// GL resource creation or host-side buffer allocation errors.
    #[error("Resource error: {0}")]
    Resource(String),
}

impl Error {
    // I/O errors
    pub(crate) fn source_not_loaded() -> Self {
        Self::Io(io::Error::new(io::ErrorKind::NotFound, "no text file loaded"))
    }

    pub(crate) fn source_read_only() -> Self {
        Self::Io(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "text source was opened read-only; open a swap copy to edit",
        ))
    }

    // Shader errors
    pub(crate) fn shader_creation_failed(detail: &str) -> Self {
        Self::Shader(format!("Shader creation failed: {detail}"))
    }

    pub(crate) fn shader_compile_failed(log: String) -> Self {
        Self::Shader(format!("Shader compilation failed: {log}"))
    }

    pub(crate) fn shader_program_creation_failed(detail: String) -> Self {
        Self::Shader(format!("Shader program creation failed: {detail}"))
    }

    pub(crate) fn shader_link_failed(log: String) -> Self {
        Self::Shader(format!("Shader linking failed: {log}"))
    }

    // Resource errors
    pub(crate) fn buffer_creation_failed(buffer_type: &str, detail: String) -> Self {
        Self::Resource(format!("Failed to create {buffer_type} buffer: {detail}"))
    }

    pub(crate) fn vertex_array_creation_failed(detail: String) -> Self {
        Self::Resource(format!("Failed to create vertex array object: {detail}"))
    }

    pub(crate) fn texture_creation_failed(detail: String) -> Self {
        Self::Resource(format!("Failed to create texture: {detail}"))
    }

    pub(crate) fn glyph_out_of_bounds(code: u8, atlas_size: (u32, u32)) -> Self {
        Self::Resource(format!(
            "Glyph {code} does not fit the {}x{} atlas texture",
            atlas_size.0, atlas_size.1
        ))
    }

    pub(crate) fn uniform_location_failed(name: &str) -> Self {
        Self::Resource(format!("Failed to get uniform location: {name}"))
    }

    pub(crate) fn grid_allocation_failed(columns: usize, rows: usize) -> Self {
        Self::Resource(format!(
            "Failed to allocate attribute arrays for a {columns}x{rows} grid"
        ))
    }
}
