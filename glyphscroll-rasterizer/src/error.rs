use std::path::PathBuf;

/// Errors raised while opening a font or preparing it for rasterization.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No font path was configured.
    #[error("Font path is unset")]
    FontPathUnset,

    /// The font file could not be read.
    #[error("Failed to read font {path}: {source}")]
    Io {
        /// File that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file was read but does not contain a usable font face.
    #[error("Failed to load font: {0}")]
    InvalidFont(String),

    /// No installed font matches the requested family.
    #[error("Font family not found: {0}")]
    FamilyNotFound(String),

    /// The requested pixel height is zero.
    #[error("Invalid pixel height: {0}")]
    InvalidPixelHeight(u32),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn invalid_font(origin: &str) -> Self {
        Self::InvalidFont(format!("{origin} has no readable font face"))
    }
}
