use std::{
    fmt,
    path::{Path, PathBuf},
};

use swash::{CacheKey, FontRef};
use tracing::{debug, warn};

use crate::error::Error;

/// Where to load a font from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSource {
    /// A TTF/OTF file on disk
    Path(PathBuf),
    /// An installed font family, resolved through the system font database
    Family(String),
}

impl FontSource {
    /// Reads the font data this source points at.
    pub fn load(&self) -> Result<LoadedFont, Error> {
        match self {
            FontSource::Path(path) => LoadedFont::from_path(path),
            FontSource::Family(name) => LoadedFont::from_family(name),
        }
    }
}

/// Font file contents together with the location of the face inside them.
pub struct LoadedFont {
    data: Vec<u8>,
    offset: u32,
    key: CacheKey,
    name: String,
}

impl LoadedFont {
    /// Loads the first face of the font file at `path`.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        if path.as_os_str().is_empty() {
            return Err(Error::FontPathUnset);
        }

        let data = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        Self::from_bytes(data, 0, path.display().to_string())
    }

    /// Resolves `family` against the installed fonts, falling back to any
    /// monospace face when the family itself is not installed.
    pub fn from_family(family: &str) -> Result<Self, Error> {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        debug!(faces = db.len(), family, "Loaded system font database");

        let families = [fontdb::Family::Name(family), fontdb::Family::Monospace];
        let query = fontdb::Query { families: &families, ..Default::default() };
        let id = db
            .query(&query)
            .ok_or_else(|| Error::FamilyNotFound(family.to_string()))?;

        let resolved = db
            .face(id)
            .and_then(|face| face.families.first())
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| family.to_string());

        if !resolved.eq_ignore_ascii_case(family) {
            warn!(requested = family, resolved = %resolved, "Font family not installed, using fallback");
        }

        let (data, index) = db
            .with_face_data(id, |data, index| (data.to_vec(), index))
            .ok_or_else(|| Error::FamilyNotFound(family.to_string()))?;

        Self::from_bytes(data, index as usize, resolved)
    }

    /// Wraps raw font file bytes, selecting face `index` in collections.
    pub fn from_bytes(data: Vec<u8>, index: usize, name: String) -> Result<Self, Error> {
        let font = FontRef::from_index(&data, index).ok_or_else(|| Error::invalid_font(&name))?;
        let (offset, key) = (font.offset, font.key);

        Ok(Self { data, offset, key, name })
    }

    /// Borrows the face for use with the swash APIs.
    pub fn font_ref(&self) -> FontRef<'_> {
        FontRef { data: &self.data, offset: self.offset, key: self.key }
    }

    /// Family name or file path the font was loaded from.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for LoadedFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedFont")
            .field("name", &self.name)
            .field("offset", &self.offset)
            .field("data_kb", &(self.data.len() / 1024))
            .finish()
    }
}
