use std::{ops::Range, rc::Rc};

use bitflags::bitflags;
use glyphscroll_data::{Glyph, GlyphTable};
use tracing::{debug, trace};

use crate::{error::Error, ring::RowRing, text_source::TextSource};

/// Grid size used when the font has no usable space glyph to measure columns by.
const FALLBACK_DIMENSIONS: (usize, usize) = (80, 24);

/// Distance in lines between the applied start line and the layout origin
/// past which the next sync rebuilds everything, keeping vertex positions
/// small enough for f32 to place them exactly.
pub const REBASE_DISTANCE: usize = 1024;

/// Presentation settings for the text grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridConfig {
    /// Left inset of every row, in pixels
    pub left_margin: f32,
    /// Top inset of the first row, in pixels
    pub top_margin: f32,
    /// RGBA text color
    pub foreground: [f32; 4],
    /// Width of a tab, in spaces
    pub tab_width: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            left_margin: 0.0,
            top_margin: 0.0,
            foreground: [0.85, 0.85, 0.85, 1.0],
            tab_width: 4,
        }
    }
}

/// Lifecycle of a [`ViewportGrid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridState {
    /// No font; nothing can be laid out.
    Uninitialized,
    /// Arrays sized for the current font and viewport, contents stale.
    Dimensioned,
    /// Arrays reflect the applied start line.
    Synced,
}

/// What a call to [`ViewportGrid::sync`] rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    /// Already showing the requested start line.
    Unchanged,
    /// Only the rows that scrolled into view were rebuilt.
    Partial {
        /// How many rows scrolled in
        rows: usize,
    },
    /// Every row was rebuilt.
    Full,
}

bitflags! {
    /// Attribute arrays modified since the last upload.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct DirtyArrays: u8 {
        /// Cell positions
        const VERTICES = 1 << 0;
        /// Atlas texture coordinates
        const UVS = 1 << 1;
        /// Per-vertex colors
        const COLORS = 1 << 2;
        /// The arrays were reallocated; GPU buffers must be respecified
        const FACES = 1 << 3;
    }
}

/// Changes the GPU copy of the grid is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingUpload {
    /// Which attribute arrays changed
    pub arrays: DirtyArrays,
    /// Physical row slots to upload, in ascending order
    pub rows: Vec<usize>,
}

impl PendingUpload {
    /// Whether the GPU copy is already current.
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Whether whole buffers have to be reallocated rather than updated.
    pub fn is_reallocation(&self) -> bool {
        self.arrays.contains(DirtyArrays::FACES)
    }
}

/// The four vertices of one cell with their texture and color attributes.
///
/// Vertex order is top-left, bottom-left, bottom-right, top-right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellQuad {
    /// NDC corner positions, relative to the layout origin
    pub positions: [[f32; 2]; 4],
    /// Atlas texture coordinates
    pub uvs: [[f32; 2]; 4],
    /// RGBA per corner
    pub colors: [[f32; 4]; 4],
}

impl CellQuad {
    /// A degenerate quad that draws nothing.
    pub const CLEARED: Self = Self {
        positions: [[0.0; 2]; 4],
        uvs: [[0.0; 2]; 4],
        colors: [[0.0; 4]; 4],
    };
}

#[derive(Debug, Default)]
struct AttributeArrays {
    vertices: Vec<[f32; 2]>,
    uvs: Vec<[f32; 2]>,
    colors: Vec<[f32; 4]>,
    faces: Vec<u32>,
}

impl AttributeArrays {
    fn allocate(columns: usize, rows: usize) -> Result<Self, Error> {
        let fail = || Error::grid_allocation_failed(columns, rows);

        let cells = columns.checked_mul(rows).ok_or_else(fail)?;
        let vertex_count = cells.checked_mul(4).ok_or_else(fail)?;
        if u32::try_from(vertex_count).is_err() {
            return Err(fail());
        }

        let mut faces = zeroed::<u32>(cells.checked_mul(6).ok_or_else(fail)?, fail)?;
        for (cell, indices) in faces.chunks_exact_mut(6).enumerate() {
            let base = (cell * 4) as u32;
            indices.copy_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Ok(Self {
            vertices: zeroed(vertex_count, fail)?,
            uvs: zeroed(vertex_count, fail)?,
            colors: zeroed(vertex_count, fail)?,
            faces,
        })
    }

    fn write(&mut self, cell: usize, quad: &CellQuad) {
        let range = cell * 4..cell * 4 + 4;
        self.vertices[range.clone()].copy_from_slice(&quad.positions);
        self.uvs[range.clone()].copy_from_slice(&quad.uvs);
        self.colors[range].copy_from_slice(&quad.colors);
    }

    fn read(&self, cell: usize) -> CellQuad {
        let at = cell * 4;
        let mut quad = CellQuad::CLEARED;
        quad.positions.copy_from_slice(&self.vertices[at..at + 4]);
        quad.uvs.copy_from_slice(&self.uvs[at..at + 4]);
        quad.colors.copy_from_slice(&self.colors[at..at + 4]);
        quad
    }
}

fn zeroed<T: Copy + Default>(len: usize, fail: impl Fn() -> Error) -> Result<Vec<T>, Error> {
    let mut values = Vec::new();
    values.try_reserve_exact(len).map_err(|_| fail())?;
    values.resize(len, T::default());
    Ok(values)
}

/// Host-side model of the visible window onto a [`TextSource`].
///
/// The viewport holds `rows` text rows of `columns` cells each. Every cell
/// owns four vertices and six face indices, whether it draws a glyph or not.
/// Rows live in a [`RowRing`], so scrolling by fewer than `rows` lines only
/// rebuilds the rows that entered the viewport. Vertex positions are laid
/// out relative to `origin_line`; [`row_offset`](Self::row_offset) carries
/// the translation to the applied start line.
#[derive(Debug)]
pub struct ViewportGrid {
    source: TextSource,
    glyphs: Option<Rc<GlyphTable>>,
    config: GridConfig,
    viewport: (u32, u32),
    columns: usize,
    rows: usize,
    attributes: AttributeArrays,
    row_text: Vec<String>,
    ring: RowRing,
    requested_start_line: usize,
    applied_start_line: usize,
    origin_line: usize,
    caret: Option<(usize, usize)>,
    state: GridState,
    dirty: DirtyArrays,
    dirty_rows: Vec<bool>,
}

impl ViewportGrid {
    /// Creates a grid over `source` with no font; nothing is laid out until
    /// [`set_font`](Self::set_font).
    pub fn new(source: TextSource, viewport: (u32, u32), config: GridConfig) -> Self {
        Self {
            source,
            glyphs: None,
            config,
            viewport,
            columns: 0,
            rows: 0,
            attributes: AttributeArrays::default(),
            row_text: Vec::new(),
            ring: RowRing::new(0),
            requested_start_line: 0,
            applied_start_line: 0,
            origin_line: 0,
            caret: None,
            state: GridState::Uninitialized,
            dirty: DirtyArrays::empty(),
            dirty_rows: Vec::new(),
        }
    }

    /// Switches to a new glyph table and resizes the grid for it.
    ///
    /// The next [`sync`](Self::sync) rebuilds every row.
    pub fn set_font(&mut self, glyphs: Rc<GlyphTable>) -> Result<(), Error> {
        let (columns, rows) = grid_dimensions(&glyphs, self.viewport);
        self.glyphs = Some(glyphs);
        self.reallocate(columns, rows)
    }

    /// Drops the glyph table and every attribute array.
    pub fn clear_font(&mut self) {
        self.glyphs = None;
        self.attributes = AttributeArrays::default();
        self.row_text.clear();
        self.dirty_rows.clear();
        self.columns = 0;
        self.rows = 0;
        self.ring = RowRing::new(0);
        self.dirty = DirtyArrays::empty();
        self.state = GridState::Uninitialized;
    }

    /// Updates the viewport size in pixels. The next sync rebuilds every row.
    pub fn resize(&mut self, viewport: (u32, u32)) -> Result<(), Error> {
        self.viewport = viewport;

        match self.glyphs.as_deref() {
            Some(glyphs) => {
                let (columns, rows) = grid_dimensions(glyphs, viewport);
                self.reallocate(columns, rows)
            },
            None => Ok(()),
        }
    }

    /// Sole point where the attribute arrays change size.
    fn reallocate(&mut self, columns: usize, rows: usize) -> Result<(), Error> {
        if (columns, rows) == (self.columns, self.rows) && self.state != GridState::Uninitialized {
            self.state = GridState::Dimensioned;
            return Ok(());
        }

        let attributes = match AttributeArrays::allocate(columns, rows) {
            Ok(attributes) => attributes,
            Err(e) => {
                self.clear_font();
                return Err(e);
            },
        };

        self.attributes = attributes;
        self.row_text = vec![String::new(); rows];
        self.dirty_rows = vec![false; rows];
        self.columns = columns;
        self.rows = rows;
        self.ring = RowRing::new(rows);
        self.dirty |= DirtyArrays::all();
        self.state = GridState::Dimensioned;

        debug!(columns, rows, viewport = ?self.viewport, "Allocated viewport grid");
        Ok(())
    }

    /// Requests a new first visible line. Takes effect on the next sync;
    /// repeated requests in between collapse into the last one.
    pub fn set_start_line(&mut self, line: usize) {
        if line != self.requested_start_line {
            self.caret = None;
        }
        self.requested_start_line = line;
    }

    /// Moves the requested start line by `delta`, stopping at line 0.
    pub fn scroll_by(&mut self, delta: isize) {
        self.set_start_line(self.requested_start_line.saturating_add_signed(delta));
    }

    /// The start line the next sync will show.
    pub fn requested_start_line(&self) -> usize {
        self.requested_start_line
    }

    /// The start line the attribute arrays currently show.
    pub fn applied_start_line(&self) -> usize {
        self.applied_start_line
    }

    /// Appends to the underlying text and rebuilds the view on the next sync.
    pub fn append_text(&mut self, text: &str) -> Result<(), Error> {
        self.source.append_text(text)?;
        self.invalidate();
        Ok(())
    }

    /// Inserts at the insertion point and moves it past the new text.
    ///
    /// The insertion point starts at the beginning of the first visible line
    /// and goes back there whenever the start line changes.
    pub fn insert_text(&mut self, text: &str) -> Result<(), Error> {
        let (line, column) = self.caret.unwrap_or((self.applied_start_line, 0));
        let column = self.source.insert_at(line, column, text)?;
        self.caret = Some(caret_after(line, column, text));
        self.invalidate();
        Ok(())
    }

    /// Line and byte column the next [`insert_text`](Self::insert_text) writes at.
    pub fn insertion_point(&self) -> (usize, usize) {
        self.caret.unwrap_or((self.applied_start_line, 0))
    }

    fn invalidate(&mut self) {
        if self.state == GridState::Synced {
            self.state = GridState::Dimensioned;
        }
    }

    /// Brings the attribute arrays in line with the requested start line.
    ///
    /// A scroll by fewer lines than the viewport holds only rebuilds the rows
    /// that scrolled into view; anything else rebuilds the whole grid.
    pub fn sync(&mut self) -> SyncKind {
        let Some(glyphs) = self.glyphs.clone() else {
            trace!("Skipping sync without a font");
            return SyncKind::Unchanged;
        };

        let requested = self.requested_start_line;
        let applied = self.applied_start_line;
        let rows = self.rows;

        let full = self.state == GridState::Dimensioned
            || requested.abs_diff(applied) >= rows
            || requested.abs_diff(self.origin_line) >= REBASE_DISTANCE;

        let kind = if full {
            self.ring.reset();
            self.origin_line = requested;
            self.refresh_rows(&glyphs, 0..rows);
            SyncKind::Full
        } else if requested > applied {
            let delta = requested - applied;
            for _ in 0..delta {
                self.ring.advance();
            }
            self.refresh_rows(&glyphs, rows - delta..rows);
            SyncKind::Partial { rows: delta }
        } else if requested < applied {
            let delta = applied - requested;
            for _ in 0..delta {
                self.ring.retreat();
            }
            self.refresh_rows(&glyphs, 0..delta);
            SyncKind::Partial { rows: delta }
        } else {
            SyncKind::Unchanged
        };

        self.applied_start_line = requested;
        self.state = GridState::Synced;

        if kind != SyncKind::Unchanged {
            trace!(start_line = requested, ?kind, "Synced viewport grid");
        }
        kind
    }

    /// Rebuilds the logical rows in `rows` from the requested start line on.
    fn refresh_rows(&mut self, glyphs: &GlyphTable, rows: Range<usize>) {
        // start lines near usize::MAX are past any file; saturate rather than wrap
        let first_line = self.requested_start_line.saturating_add(rows.start);
        self.source.seek_line(first_line);

        for (i, row) in rows.enumerate() {
            let text = self.source.read_next_line();
            let slot = self.ring.slot(row);
            self.layout_row(glyphs, slot, first_line.saturating_add(i), text.unwrap_or_default());
        }
    }

    fn layout_row(&mut self, glyphs: &GlyphTable, slot: usize, line: usize, text: String) {
        let line_offset = line as f32 - self.origin_line as f32;
        let row_top = self.config.top_margin + line_offset * glyphs.pixel_height() as f32;
        let baseline = row_top + glyphs.ascent() as f32;

        let space = space_advance(glyphs);
        let tab = space * self.config.tab_width as f32;
        let mut pen_x = self.config.left_margin;

        let first_cell = slot * self.columns;
        let mut column = 0;
        for ch in text.chars().take(self.columns) {
            let quad = match ch {
                '\r' => {
                    pen_x = self.config.left_margin;
                    None
                },
                '\t' => {
                    pen_x += tab;
                    None
                },
                ' ' => {
                    pen_x += space;
                    None
                },
                _ => {
                    let glyph = glyphs.lookup(ch);
                    let quad = glyph
                        .has_bitmap()
                        .then(|| self.glyph_quad(&glyph, pen_x, baseline));
                    pen_x += glyph.advance_px() as f32;
                    quad
                },
            };

            self.attributes
                .write(first_cell + column, quad.as_ref().unwrap_or(&CellQuad::CLEARED));
            column += 1;
        }

        // cells past the end of the line may hold a longer previous line
        for cell in first_cell + column..first_cell + self.columns {
            self.attributes.write(cell, &CellQuad::CLEARED);
        }

        self.row_text[slot] = text;
        self.dirty_rows[slot] = true;
        self.dirty |= DirtyArrays::VERTICES | DirtyArrays::UVS | DirtyArrays::COLORS;
    }

    fn glyph_quad(&self, glyph: &Glyph, pen_x: f32, baseline: f32) -> CellQuad {
        let (vw, vh) = (self.viewport.0.max(1) as f32, self.viewport.1.max(1) as f32);
        let ndc = |x: f32, y: f32| [x / vw * 2.0 - 1.0, 1.0 - y / vh * 2.0];

        let x0 = pen_x + glyph.bearing.0 as f32;
        let y0 = baseline - glyph.bearing.1 as f32;
        let x1 = x0 + glyph.size.0 as f32;
        let y1 = y0 + glyph.size.1 as f32;

        let [u0, v0] = glyph.uv.start;
        let [u1, v1] = glyph.uv.stop;

        CellQuad {
            positions: [ndc(x0, y0), ndc(x0, y1), ndc(x1, y1), ndc(x1, y0)],
            uvs: [[u0, v0], [u0, v1], [u1, v1], [u1, v0]],
            colors: [self.config.foreground; 4],
        }
    }

    /// Takes the record of what changed since the previous call.
    pub fn take_pending_upload(&mut self) -> PendingUpload {
        let arrays = std::mem::replace(&mut self.dirty, DirtyArrays::empty());
        let rows = self
            .dirty_rows
            .iter_mut()
            .enumerate()
            .filter_map(|(slot, dirty)| std::mem::take(dirty).then_some(slot))
            .collect();

        PendingUpload { arrays, rows }
    }

    /// Vertical NDC translation from `origin_line` to the applied start line.
    pub fn row_offset(&self) -> f32 {
        let Some(glyphs) = self.glyphs.as_deref() else {
            return 0.0;
        };

        let lines = self.applied_start_line as f32 - self.origin_line as f32;
        lines * glyphs.pixel_height() as f32 * 2.0 / self.viewport.1.max(1) as f32
    }

    /// Text of the visible rows, top to bottom. Rows past the end of the file are empty.
    pub fn visible_lines(&self) -> Vec<&str> {
        (0..self.rows)
            .map(|row| self.row_text[self.ring.slot(row)].as_str())
            .collect()
    }

    /// Attributes of the cell at `column` in visible row `row`.
    pub fn cell(&self, row: usize, column: usize) -> Option<CellQuad> {
        (row < self.rows && column < self.columns)
            .then(|| self.attributes.read(self.ring.slot(row) * self.columns + column))
    }

    /// Grid size as `(columns, rows)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.columns, self.rows)
    }

    /// Viewport size in pixels.
    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Where the grid is in its lifecycle.
    pub fn state(&self) -> GridState {
        self.state
    }

    /// Mapping from visible rows to physical slots.
    pub fn ring(&self) -> &RowRing {
        &self.ring
    }

    /// Presentation settings the grid lays out with.
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// The current glyph table, if a font is set.
    pub fn glyphs(&self) -> Option<&GlyphTable> {
        self.glyphs.as_deref()
    }

    /// The text the grid reads from.
    pub fn source(&self) -> &TextSource {
        &self.source
    }

    /// Cell corner positions in NDC, four per cell, slot-major.
    pub fn vertices(&self) -> &[[f32; 2]] {
        &self.attributes.vertices
    }

    /// Atlas texture coordinates, parallel to [`vertices`](Self::vertices).
    pub fn uvs(&self) -> &[[f32; 2]] {
        &self.attributes.uvs
    }

    /// Per-vertex RGBA, parallel to [`vertices`](Self::vertices).
    pub fn colors(&self) -> &[[f32; 4]] {
        &self.attributes.colors
    }

    /// Two triangles per cell, indexing [`vertices`](Self::vertices).
    pub fn faces(&self) -> &[u32] {
        &self.attributes.faces
    }
}

/// Where the insertion point lands after `text` is inserted at `line`, `column`.
fn caret_after(line: usize, column: usize, text: &str) -> (usize, usize) {
    match text.rfind('\n') {
        Some(last) => (line.saturating_add(text.matches('\n').count()), text.len() - last - 1),
        None => (line, column + text.len()),
    }
}

/// Columns and rows needed to cover `viewport` with cells of one space
/// advance by one font height.
fn grid_dimensions(glyphs: &GlyphTable, viewport: (u32, u32)) -> (usize, usize) {
    let font_height = glyphs.pixel_height();
    match glyphs.space_advance_px() {
        Some(advance) if font_height > 0 => (
            viewport.0.div_ceil(advance).max(1) as usize,
            viewport.1.div_ceil(font_height).max(1) as usize,
        ),
        _ => {
            debug!("No space glyph to measure the grid by, using fallback dimensions");
            FALLBACK_DIMENSIONS
        },
    }
}

fn space_advance(glyphs: &GlyphTable) -> f32 {
    glyphs
        .space_advance_px()
        .unwrap_or(glyphs.pixel_height() / 2) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StubRasterizer, write_lines};

    /// 8px wide cells and 10px rows: a 32x30 viewport is 4 columns by 3 rows.
    const VIEWPORT: (u32, u32) = (32, 30);

    fn grid(dir: &tempfile::TempDir, contents: &str) -> ViewportGrid {
        let path = write_lines(dir.path(), "doc.txt", contents);
        let source = TextSource::open(path).unwrap();
        let mut grid = ViewportGrid::new(source, VIEWPORT, GridConfig::default());
        grid.set_font(StubRasterizer::new(b"ABCDEFGHIJ").table()).unwrap();
        grid
    }

    fn numbered(lines: usize) -> String {
        (0..lines)
            .map(|i| {
                let ch = (b'A' + (i % 10) as u8) as char;
                format!("{ch}{i}\n")
            })
            .collect()
    }

    #[test]
    fn dimensions_follow_font_and_viewport() {
        let dir = tempfile::tempdir().unwrap();
        let mut grid = grid(&dir, "");

        assert_eq!(grid.dimensions(), (4, 3));
        assert_eq!(grid.state(), GridState::Dimensioned);
        assert_eq!(grid.vertices().len(), 4 * 3 * 4);
        assert_eq!(grid.faces().len(), 4 * 3 * 6);
        assert_eq!(&grid.faces()[6..12], &[4, 5, 6, 4, 6, 7]);

        grid.resize((33, 31)).unwrap();
        assert_eq!(grid.dimensions(), (5, 4));
    }

    #[test]
    fn font_without_space_uses_fallback_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lines(dir.path(), "doc.txt", "A\n");
        let source = TextSource::open(path).unwrap();
        let mut grid = ViewportGrid::new(source, VIEWPORT, GridConfig::default());
        grid.set_font(StubRasterizer::new(b"A").without_space().table()).unwrap();

        assert_eq!(grid.dimensions(), (80, 24));
    }

    #[test]
    fn sync_without_font_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lines(dir.path(), "doc.txt", "A\n");
        let source = TextSource::open(path).unwrap();
        let mut grid = ViewportGrid::new(source, VIEWPORT, GridConfig::default());

        grid.set_start_line(3);
        assert_eq!(grid.sync(), SyncKind::Unchanged);
        assert_eq!(grid.state(), GridState::Uninitialized);
        assert!(grid.visible_lines().is_empty());
        assert!(grid.take_pending_upload().is_empty());
    }

    #[test]
    fn scrolling_one_line_rebuilds_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut grid = grid(&dir, "AAAA\nBBBB\nCCCC\nDDDD\nEEEE\n");

        assert_eq!(grid.sync(), SyncKind::Full);
        assert_eq!(grid.visible_lines(), vec!["AAAA", "BBBB", "CCCC"]);
        assert_eq!(grid.ring().top(), 0);
        grid.take_pending_upload();

        grid.set_start_line(1);
        assert_eq!(grid.sync(), SyncKind::Partial { rows: 1 });
        assert_eq!(grid.visible_lines(), vec!["BBBB", "CCCC", "DDDD"]);
        assert_eq!(grid.ring().top(), 1);

        // only the recycled slot that now holds DDDD changed
        let pending = grid.take_pending_upload();
        assert_eq!(pending.rows, vec![0]);
        assert!(!pending.is_reallocation());
    }

    #[test]
    fn scrolling_back_restores_identical_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let mut grid = grid(&dir, &numbered(20));

        grid.set_start_line(3);
        grid.sync();
        let snapshot = (
            grid.vertices().to_vec(),
            grid.uvs().to_vec(),
            grid.colors().to_vec(),
            grid.row_offset(),
        );

        grid.scroll_by(2);
        assert_eq!(grid.sync(), SyncKind::Partial { rows: 2 });
        assert_eq!(grid.visible_lines(), vec!["F5", "G6", "H7"]);

        grid.scroll_by(-2);
        assert_eq!(grid.sync(), SyncKind::Partial { rows: 2 });
        assert_eq!(grid.visible_lines(), vec!["D3", "E4", "F5"]);

        let restored = (
            grid.vertices().to_vec(),
            grid.uvs().to_vec(),
            grid.colors().to_vec(),
            grid.row_offset(),
        );
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn scrolling_a_full_screen_rebuilds_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut grid = grid(&dir, &numbered(20));
        grid.sync();

        grid.scroll_by(3);
        assert_eq!(grid.sync(), SyncKind::Full);
        assert_eq!(grid.visible_lines(), vec!["D3", "E4", "F5"]);
        assert_eq!(grid.ring().top(), 0);
        assert_eq!(grid.row_offset(), 0.0);

        grid.set_start_line(0);
        assert_eq!(grid.sync(), SyncKind::Full);
        assert_eq!(grid.visible_lines(), vec!["A0", "B1", "C2"]);
    }

    #[test]
    fn partial_scroll_matches_full_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let mut scrolled = grid(&dir, &numbered(20));
        scrolled.sync();
        scrolled.scroll_by(1);
        scrolled.sync();
        scrolled.scroll_by(1);
        scrolled.sync();

        let mut direct = grid(&dir, &numbered(20));
        direct.set_start_line(2);
        direct.sync();

        assert_eq!(scrolled.visible_lines(), direct.visible_lines());
        for row in 0..3 {
            for column in 0..4 {
                let a = scrolled.cell(row, column).unwrap();
                let b = direct.cell(row, column).unwrap();
                assert_eq!(a.uvs, b.uvs);
                // the scrolled grid is laid out relative to line 0 and
                // shifted by the row offset
                for (pa, pb) in a.positions.iter().zip(b.positions.iter()) {
                    if a != CellQuad::CLEARED {
                        assert!((pa[1] + scrolled.row_offset() - pb[1]).abs() < 1e-5);
                    }
                }
            }
        }
    }

    #[test]
    fn requests_between_syncs_coalesce() {
        let dir = tempfile::tempdir().unwrap();
        let mut grid = grid(&dir, &numbered(20));
        grid.sync();

        grid.set_start_line(10);
        grid.set_start_line(5);
        grid.set_start_line(1);
        assert_eq!(grid.applied_start_line(), 0);

        assert_eq!(grid.sync(), SyncKind::Partial { rows: 1 });
        assert_eq!(grid.applied_start_line(), 1);
        assert_eq!(grid.sync(), SyncKind::Unchanged);
    }

    #[test]
    fn scroll_stops_at_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut grid = grid(&dir, &numbered(5));
        grid.sync();

        grid.scroll_by(-4);
        assert_eq!(grid.requested_start_line(), 0);
        assert_eq!(grid.sync(), SyncKind::Unchanged);
    }

    #[test]
    fn short_line_clears_stale_cells() {
        let dir = tempfile::tempdir().unwrap();
        let mut grid = grid(&dir, "AAAA\nBBBB\nCCCC\nAB\n");
        grid.sync();
        assert_ne!(grid.cell(0, 3), Some(CellQuad::CLEARED));

        grid.set_start_line(1);
        grid.sync();

        // slot 0 held AAAA and now shows AB as the bottom row
        assert_eq!(grid.ring().slot(2), 0);
        assert_ne!(grid.cell(2, 1), Some(CellQuad::CLEARED));
        assert_eq!(grid.cell(2, 2), Some(CellQuad::CLEARED));
        assert_eq!(grid.cell(2, 3), Some(CellQuad::CLEARED));
    }

    #[test]
    fn rows_past_end_of_file_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut grid = grid(&dir, "AAAA\n");
        grid.sync();

        assert_eq!(grid.visible_lines(), vec!["AAAA", "", ""]);
        for column in 0..4 {
            assert_eq!(grid.cell(1, column), Some(CellQuad::CLEARED));
        }
    }

    #[test]
    fn long_lines_are_truncated_to_the_grid() {
        let dir = tempfile::tempdir().unwrap();
        let mut grid = grid(&dir, "ABCDEFGHIJ\n");
        grid.sync();

        let last = grid.cell(0, 3).unwrap();
        let d = grid.glyphs().unwrap().get('D').unwrap();
        assert_eq!(last.uvs[0], d.uv.start);
    }

    #[test]
    fn glyph_quads_sit_on_the_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let mut grid = grid(&dir, "A\n");
        grid.sync();

        let a = grid.cell(0, 0).unwrap();
        let glyph = *grid.glyphs().unwrap().get('A').unwrap();

        // pen at x=0, bearing (1, 8), ascent 8: the 6x8 box spans x 1..7, y 0..8
        assert_eq!(a.positions[0], [1.0 / 32.0 * 2.0 - 1.0, 1.0]);
        assert_eq!(a.positions[2], [7.0 / 32.0 * 2.0 - 1.0, 1.0 - 8.0 / 30.0 * 2.0]);
        assert_eq!(a.uvs, [
            glyph.uv.start,
            [glyph.uv.start[0], glyph.uv.stop[1]],
            glyph.uv.stop,
            [glyph.uv.stop[0], glyph.uv.start[1]],
        ]);
        assert_eq!(a.colors, [GridConfig::default().foreground; 4]);
    }

    #[test]
    fn tabs_and_carriage_returns_move_the_pen() {
        let dir = tempfile::tempdir().unwrap();
        let mut grid = grid(&dir, "\tA\nAB\rC\n");
        grid.resize((160, 30)).unwrap();
        grid.sync();

        let ndc_x = |px: f32| px / 160.0 * 2.0 - 1.0;

        // tab: four 8px spaces, then bearing 1
        assert_eq!(grid.cell(0, 0), Some(CellQuad::CLEARED));
        assert_eq!(grid.cell(0, 1).unwrap().positions[0][0], ndc_x(33.0));

        // \r takes a cell and returns the pen to the margin
        assert_eq!(grid.cell(1, 2), Some(CellQuad::CLEARED));
        assert_eq!(grid.cell(1, 3).unwrap().positions[0][0], ndc_x(1.0));
    }

    #[test]
    fn unknown_characters_take_a_cell_but_no_space() {
        let dir = tempfile::tempdir().unwrap();
        let mut grid = grid(&dir, "AéA\n");
        grid.sync();

        assert_eq!(grid.cell(0, 1), Some(CellQuad::CLEARED));
        let first = grid.cell(0, 0).unwrap();
        let second = grid.cell(0, 2).unwrap();
        assert!((second.positions[0][0] - first.positions[0][0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn font_change_and_resize_force_full_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let mut grid = grid(&dir, &numbered(10));
        grid.sync();
        grid.take_pending_upload();

        grid.resize(VIEWPORT).unwrap();
        assert_eq!(grid.state(), GridState::Dimensioned);
        assert_eq!(grid.sync(), SyncKind::Full);

        grid.set_font(StubRasterizer::new(b"AB").table()).unwrap();
        assert_eq!(grid.sync(), SyncKind::Full);
        assert_eq!(grid.take_pending_upload().rows, vec![0, 1, 2]);

        grid.clear_font();
        assert_eq!(grid.state(), GridState::Uninitialized);
        assert!(grid.vertices().is_empty());
    }

    #[test]
    fn reallocation_marks_every_array() {
        let dir = tempfile::tempdir().unwrap();
        let mut grid = grid(&dir, "A\n");
        grid.sync();

        let pending = grid.take_pending_upload();
        assert!(pending.is_reallocation());
        assert_eq!(pending.arrays, DirtyArrays::all());

        grid.resize((64, 30)).unwrap();
        grid.sync();
        assert!(grid.take_pending_upload().is_reallocation());
    }

    #[test]
    fn appended_text_shows_after_sync() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lines(dir.path(), "doc.txt", "AAAA\n");
        let source = TextSource::open_swap(&path).unwrap();
        let mut grid = ViewportGrid::new(source, VIEWPORT, GridConfig::default());
        grid.set_font(StubRasterizer::new(b"AB").table()).unwrap();
        grid.sync();

        grid.append_text("BB\n").unwrap();
        assert_eq!(grid.sync(), SyncKind::Full);
        assert_eq!(grid.visible_lines(), vec!["AAAA", "BB", ""]);

        grid.insert_text("A\n").unwrap();
        grid.sync();
        assert_eq!(grid.visible_lines(), vec!["A", "AAAA", "BB"]);
    }

    #[test]
    fn start_line_past_any_file_shows_empty_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut grid = grid(&dir, &numbered(5));
        grid.sync();

        grid.set_start_line(usize::MAX);
        assert_eq!(grid.sync(), SyncKind::Full);
        assert_eq!(grid.visible_lines(), vec!["", "", ""]);
        for row in 0..3 {
            for column in 0..4 {
                assert_eq!(grid.cell(row, column), Some(CellQuad::CLEARED));
            }
        }

        grid.scroll_by(-1);
        assert_eq!(grid.sync(), SyncKind::Partial { rows: 1 });
        grid.scroll_by(isize::MAX);
        assert_eq!(grid.sync(), SyncKind::Partial { rows: 1 });
        assert_eq!(grid.applied_start_line(), usize::MAX);
        assert_eq!(grid.visible_lines(), vec!["", "", ""]);
    }

    #[test]
    fn long_partial_scrolls_rebase_the_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut scrolled = grid(&dir, &numbered(3000));
        scrolled.sync();

        let mut rebuilds = 0;
        for _ in 0..1250 {
            scrolled.scroll_by(2);
            if scrolled.sync() == SyncKind::Full {
                rebuilds += 1;
            }
            assert!(scrolled.applied_start_line - scrolled.origin_line < REBASE_DISTANCE);
        }
        assert_eq!(rebuilds, 2);
        assert_eq!(scrolled.applied_start_line(), 2500);

        let mut direct = grid(&dir, &numbered(3000));
        direct.set_start_line(2500);
        direct.sync();

        assert_eq!(scrolled.visible_lines(), direct.visible_lines());
        for row in 0..3 {
            for column in 0..4 {
                let a = scrolled.cell(row, column).unwrap();
                let b = direct.cell(row, column).unwrap();
                assert_eq!(a.uvs, b.uvs);
                if a != CellQuad::CLEARED {
                    for (pa, pb) in a.positions.iter().zip(b.positions.iter()) {
                        assert!((pa[1] + scrolled.row_offset() - pb[1]).abs() < 1e-3);
                    }
                }
            }
        }
    }

    #[test]
    fn typed_text_keeps_its_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lines(dir.path(), "doc.txt", "AAAA\nBBBB\n");
        let source = TextSource::open_swap(&path).unwrap();
        let mut grid = ViewportGrid::new(source, VIEWPORT, GridConfig::default());
        grid.set_font(StubRasterizer::new(b"ABCD").table()).unwrap();
        grid.sync();

        grid.insert_text("A").unwrap();
        grid.insert_text("B").unwrap();
        assert_eq!(grid.insertion_point(), (0, 2));
        grid.insert_text("\n").unwrap();
        grid.insert_text("C").unwrap();
        assert_eq!(grid.insertion_point(), (1, 1));

        grid.sync();
        assert_eq!(grid.visible_lines(), vec!["AB", "CAAAA", "BBBB"]);

        // scrolling moves the insertion point to the new first line
        grid.scroll_by(1);
        grid.sync();
        assert_eq!(grid.insertion_point(), (1, 0));
        grid.insert_text("D").unwrap();
        grid.sync();
        assert_eq!(grid.visible_lines(), vec!["DCAAAA", "BBBB", ""]);
    }

    #[test]
    fn caret_follows_inserted_newlines() {
        assert_eq!(caret_after(4, 2, "ab"), (4, 4));
        assert_eq!(caret_after(4, 2, "a\nbc\nd"), (6, 1));
        assert_eq!(caret_after(4, 2, "\n"), (5, 0));
    }
}
