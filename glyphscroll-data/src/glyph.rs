/// Number of character codes covered by a glyph table (7-bit ASCII).
pub const CHARSET_LEN: usize = 128;

/// Normalized texture rectangle of a glyph inside the atlas.
///
/// `start` is the top-left corner and `stop` the bottom-right corner, both in
/// the `0.0..=1.0` range. The v axis grows downwards, matching the row order
/// in which glyph bitmaps are uploaded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UvRect {
    /// Top-left corner
    pub start: [f32; 2],
    /// Bottom-right corner
    pub stop: [f32; 2],
}

impl UvRect {
    /// Maps a pixel rectangle in an atlas of `atlas_size` to normalized coordinates.
    pub fn from_pixels(x: u32, y: u32, width: u32, height: u32, atlas_size: (u32, u32)) -> Self {
        let (aw, ah) = (atlas_size.0 as f32, atlas_size.1 as f32);
        Self {
            start: [x as f32 / aw, y as f32 / ah],
            stop: [(x + width) as f32 / aw, (y + height) as f32 / ah],
        }
    }

    /// Recovers the packed pixel rectangle as `(x, y, width, height)`.
    pub fn to_pixels(&self, atlas_size: (u32, u32)) -> (u32, u32, u32, u32) {
        let (aw, ah) = (atlas_size.0 as f32, atlas_size.1 as f32);
        let x0 = (self.start[0] * aw).round() as u32;
        let y0 = (self.start[1] * ah).round() as u32;
        let x1 = (self.stop[0] * aw).round() as u32;
        let y1 = (self.stop[1] * ah).round() as u32;

        (x0, y0, x1 - x0, y1 - y0)
    }
}

/// Metrics and atlas location of a single character at one font/pixel height.
///
/// Identity is the character code. A glyph never owns its bitmap; the
/// bitmap only lives until it has been written into the atlas texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    /// The 7-bit character code
    pub code: u8,
    /// Bitmap width and height in pixels
    pub size: (u32, u32),
    /// Offset from the pen position to the left edge, and from the baseline
    /// up to the top edge of the bitmap
    pub bearing: (i32, i32),
    /// Horizontal pen advance in 1/64 pixel units
    pub advance: u32,
    /// Location in the atlas texture; zero for glyphs without a bitmap
    pub uv: UvRect,
}

impl Glyph {
    /// A zero-size stand-in for non-printing or missing characters.
    pub const fn placeholder(code: u8) -> Self {
        Self {
            code,
            size: (0, 0),
            bearing: (0, 0),
            advance: 0,
            uv: UvRect { start: [0.0, 0.0], stop: [0.0, 0.0] },
        }
    }

    /// Returns true if this is the zero-size placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.advance == 0 && self.size == (0, 0)
    }

    /// Returns true if the glyph covers any pixels and needs a quad.
    pub fn has_bitmap(&self) -> bool {
        self.size.0 > 0 && self.size.1 > 0
    }

    /// Horizontal advance in whole pixels.
    pub fn advance_px(&self) -> u32 {
        self.advance >> 6
    }
}

/// Lookup from character code to [`Glyph`] for the currently loaded font.
///
/// The table always holds one entry per code in `0..128`; codes the font could
/// not provide are filled with [`Glyph::placeholder`].
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphTable {
    glyphs: Vec<Glyph>,
    pixel_height: u32,
    ascent: u32,
    atlas_size: (u32, u32),
}

impl GlyphTable {
    /// Creates a table where every code maps to its placeholder.
    pub fn new(pixel_height: u32, ascent: u32) -> Self {
        Self {
            glyphs: (0..CHARSET_LEN as u8)
                .map(Glyph::placeholder)
                .collect(),
            pixel_height,
            ascent,
            atlas_size: (0, 0),
        }
    }

    /// Stores a glyph under its character code.
    pub fn insert(&mut self, glyph: Glyph) {
        if let Some(slot) = self.glyphs.get_mut(glyph.code as usize) {
            *slot = glyph;
        }
    }

    /// Returns the glyph for `ch`, or `None` if it is outside the charset or missing.
    pub fn get(&self, ch: char) -> Option<&Glyph> {
        if !ch.is_ascii() {
            return None;
        }

        self.glyphs
            .get(ch as usize)
            .filter(|g| !g.is_placeholder())
    }

    /// Returns the glyph for `ch`, substituting the zero-size placeholder when
    /// the character has no glyph.
    pub fn lookup(&self, ch: char) -> Glyph {
        match self.get(ch) {
            Some(glyph) => *glyph,
            None => Glyph::placeholder(if ch.is_ascii() { ch as u8 } else { 0 }),
        }
    }

    /// Advance of the space glyph in whole pixels, if the font has one.
    pub fn space_advance_px(&self) -> Option<u32> {
        self.get(' ')
            .map(Glyph::advance_px)
            .filter(|&advance| advance > 0)
    }

    /// The font height in pixels; also the distance between two text rows.
    pub fn pixel_height(&self) -> u32 {
        self.pixel_height
    }

    /// Distance from the top of a text row down to its baseline, in pixels.
    pub fn ascent(&self) -> u32 {
        self.ascent
    }

    /// Dimensions of the atlas texture the UV rectangles refer to.
    pub fn atlas_size(&self) -> (u32, u32) {
        self.atlas_size
    }

    /// Records the dimensions of the texture the UVs refer to.
    pub fn set_atlas_size(&mut self, atlas_size: (u32, u32)) {
        self.atlas_size = atlas_size;
    }

    /// Iterates over all glyphs that are not placeholders.
    pub fn iter(&self) -> impl Iterator<Item = &Glyph> {
        self.glyphs
            .iter()
            .filter(|g| !g.is_placeholder())
    }

    /// Number of characters with a real glyph.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether no character has a real glyph.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
