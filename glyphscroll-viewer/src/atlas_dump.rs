use std::{fs::File, io::BufWriter, path::Path};

use color_eyre::eyre::{Context, Result};
use glyphscroll_core::{AtlasBuild, FontSource, SwashRasterizer};
use glyphscroll_data::AtlasLayout;

/// Summary of a written atlas image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasDump {
    pub width: u32,
    pub height: u32,
    pub glyphs: usize,
}

/// Rasterizes the printable ASCII set of `font` and writes the packed
/// coverage atlas to `output` as an 8-bit grayscale PNG.
pub fn dump_atlas(font: &FontSource, pixel_height: u32, output: &Path) -> Result<AtlasDump> {
    let mut rasterizer = SwashRasterizer::open(font, pixel_height)
        .wrap_err_with(|| format!("Failed to load font {font:?}"))?;

    let build = AtlasBuild::rasterize(&mut rasterizer, AtlasLayout::DEFAULT_ROW_LIMIT);
    let (width, height) = build.dimensions();
    let (table, pixels) = build.into_pixels();

    write_grayscale_png(output, width, height, &pixels)?;

    tracing::info!(
        font = rasterizer.font().name(),
        width,
        height,
        glyphs = table.len(),
        path = %output.display(),
        "Glyph atlas dumped to file"
    );

    Ok(AtlasDump { width, height, glyphs: table.len() })
}

fn write_grayscale_png(path: &Path, width: u32, height: u32, pixels: &[u8]) -> Result<()> {
    let file = File::create(path)
        .wrap_err_with(|| format!("Failed to create file {}", path.display()))?;

    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder
        .write_header()
        .wrap_err("PNG header error")?;
    writer
        .write_image_data(pixels)
        .wrap_err("PNG write error")?;
    writer.finish().wrap_err("PNG write error")?;

    Ok(())
}
