use crate::UvRect;

/// Pixel rectangle assigned to one glyph bitmap inside the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Character code of the glyph
    pub code: u8,
    /// Left edge, in pixels
    pub x: u32,
    /// Top edge, in pixels
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// Row-based packing of glyph bitmaps into a single texture.
///
/// Glyphs are laid out left to right along a row; once the next glyph would
/// run past `row_limit`, packing continues at the left edge of a new row
/// stacked below the previous one. Every row is `row_height` pixels tall, so
/// glyphs can never overlap as long as no bitmap is taller than a row.
///
/// The atlas starts out with one row; its width is the widest extent any row
/// reached.
#[derive(Debug, Clone)]
pub struct AtlasLayout {
    row_limit: u32,
    row_height: u32,
    cursor: (u32, u32),
    width: u32,
    height: u32,
    placements: Vec<Placement>,
}

impl AtlasLayout {
    /// Default maximum width of an atlas row, in pixels.
    pub const DEFAULT_ROW_LIMIT: u32 = 512;

    /// Starts an empty layout whose rows are at most `row_limit` pixels wide.
    pub fn new(row_limit: u32, row_height: u32) -> Self {
        Self {
            row_limit: row_limit.max(1),
            row_height,
            cursor: (0, 0),
            width: 0,
            height: row_height,
            placements: Vec::new(),
        }
    }

    /// Reserves a `width` x `height` region for `code` and returns it.
    ///
    /// A glyph wider than the row limit gets a row of its own.
    pub fn place(&mut self, code: u8, width: u32, height: u32) -> Placement {
        debug_assert!(
            height <= self.row_height,
            "glyph {code} is {height}px tall, row is {}px",
            self.row_height
        );

        if self.cursor.0 > 0 && self.cursor.0 + width > self.row_limit {
            self.cursor = (0, self.cursor.1 + self.row_height);
            self.height += self.row_height;
        }

        let placement = Placement {
            code,
            x: self.cursor.0,
            y: self.cursor.1,
            width,
            height,
        };

        self.cursor.0 += width;
        self.width = self.width.max(self.cursor.0);
        self.placements.push(placement);

        placement
    }

    /// Texture dimensions required to hold every placed glyph.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width.max(1), self.height.max(1))
    }

    /// Height of every row, in pixels.
    pub fn row_height(&self) -> u32 {
        self.row_height
    }

    /// Number of rows used so far.
    pub fn row_count(&self) -> u32 {
        if self.row_height == 0 { 1 } else { self.height / self.row_height }
    }

    /// Placements in the order they were made.
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Normalized texture rectangle of `placement` within the final atlas.
    pub fn uv(&self, placement: &Placement) -> UvRect {
        UvRect::from_pixels(
            placement.x,
            placement.y,
            placement.width,
            placement.height,
            self.dimensions(),
        )
    }
}
