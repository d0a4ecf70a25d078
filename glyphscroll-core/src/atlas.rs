use glyphscroll_data::{
    AtlasLayout, CHARSET_LEN, Glyph, GlyphRasterizer, GlyphTable, Placement, UvRect,
};
use tracing::{debug, trace};

/// A rasterized charset packed into an atlas layout, with the bitmaps still
/// held on the host until they are uploaded.
///
/// Built in one pass over the 7-bit charset: each printable code is
/// rasterized, measured and placed on the spot, so the upload order is the
/// placement order. Non-printing codes and characters the font lacks map to
/// [`Glyph::placeholder`].
#[derive(Debug)]
pub struct AtlasBuild {
    table: GlyphTable,
    layout: AtlasLayout,
    pending: Vec<(Placement, Vec<u8>)>,
}

impl AtlasBuild {
    /// Rasterizes every printable ASCII character with rows at most
    /// `row_limit` pixels wide.
    pub fn rasterize(rasterizer: &mut impl GlyphRasterizer, row_limit: u32) -> Self {
        let metrics = rasterizer.metrics();

        let mut measured = Vec::with_capacity(CHARSET_LEN);
        let mut missing = 0usize;
        for code in 0..CHARSET_LEN as u8 {
            if !is_printable(code) {
                continue;
            }

            match rasterizer.rasterize(code) {
                Some(glyph) => measured.push((code, glyph)),
                None => {
                    trace!(code, "Glyph missing, using placeholder");
                    missing += 1;
                },
            }
        }

        // a bitmap taller than the font height (deep descenders, accents)
        // grows every atlas row so placements cannot overlap
        let tallest = measured
            .iter()
            .map(|(_, glyph)| glyph.height)
            .max()
            .unwrap_or(0);
        let mut layout = AtlasLayout::new(row_limit, tallest.max(metrics.pixel_height));

        let mut glyphs = Vec::with_capacity(measured.len());
        let mut pending = Vec::with_capacity(measured.len());
        for (code, raster) in measured {
            let placement = (raster.width > 0 && raster.height > 0)
                .then(|| layout.place(code, raster.width, raster.height));

            glyphs.push((
                Glyph {
                    code,
                    size: (raster.width, raster.height),
                    bearing: raster.bearing,
                    advance: raster.advance,
                    uv: UvRect::default(),
                },
                placement,
            ));

            if let Some(placement) = placement {
                pending.push((placement, raster.bitmap));
            }
        }

        // UVs are relative to the final dimensions, known only once every
        // glyph has been placed
        let mut table = GlyphTable::new(metrics.pixel_height, metrics.ascent);
        table.set_atlas_size(layout.dimensions());
        for (mut glyph, placement) in glyphs {
            if let Some(placement) = placement {
                glyph.uv = layout.uv(&placement);
            }
            table.insert(glyph);
        }

        debug!(
            glyphs = table.len(),
            missing,
            atlas_width = layout.dimensions().0,
            atlas_height = layout.dimensions().1,
            rows = layout.row_count(),
            "Packed glyph atlas"
        );

        Self { table, layout, pending }
    }

    /// Glyph metrics with UVs normalized to the packed atlas.
    pub fn table(&self) -> &GlyphTable {
        &self.table
    }

    /// Where each glyph bitmap was placed.
    pub fn layout(&self) -> &AtlasLayout {
        &self.layout
    }

    /// Width and height of the texture needed to hold every glyph.
    pub fn dimensions(&self) -> (u32, u32) {
        self.layout.dimensions()
    }

    /// Hands each bitmap to `sink` in placement order and returns the finished
    /// glyph table. A bitmap is released as soon as the sink returns.
    pub fn upload<E>(
        self,
        mut sink: impl FnMut(&Placement, &[u8]) -> Result<(), E>,
    ) -> Result<GlyphTable, E> {
        for (placement, bitmap) in self.pending {
            sink(&placement, &bitmap)?;
        }

        Ok(self.table)
    }

    /// Blits every bitmap into a single row-major 8-bit image of
    /// [`dimensions`](Self::dimensions).
    pub fn into_pixels(self) -> (GlyphTable, Vec<u8>) {
        let (width, height) = self.dimensions();
        let mut pixels = vec![0u8; width as usize * height as usize];

        let table = self.upload(|placement, bitmap| {
            let row_len = placement.width as usize;
            for (row, src) in bitmap.chunks_exact(row_len).enumerate() {
                let start = (placement.y as usize + row) * width as usize + placement.x as usize;
                pixels[start..start + row_len].copy_from_slice(src);
            }
            Ok::<_, std::convert::Infallible>(())
        });

        match table {
            Ok(table) => (table, pixels),
            Err(never) => match never {},
        }
    }
}

/// Printable 7-bit codes; everything else is a placeholder.
fn is_printable(code: u8) -> bool {
    (b' '..0x7f).contains(&code)
}
