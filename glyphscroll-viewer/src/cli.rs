use std::path::PathBuf;

use clap::Parser;
use color_eyre::{Report, eyre::eyre};
use glyphscroll_core::GridConfig;
use glyphscroll_rasterizer::FontSource;

/// Family tried when neither `--font` nor `--font-path` is given; any
/// installed monospace face is used if it is missing.
const DEFAULT_FONT_FAMILY: &str = "DejaVu Sans Mono";

#[derive(Parser, Debug)]
#[command(
    name = "glyphscroll",
    about = "Scroll through large text files rendered with OpenGL",
    long_about = "Opens a text file of any size and renders the visible lines through a glyph atlas, \
                  reading only the lines that scroll into view"
)]
pub struct Cli {
    /// Text file to view
    #[arg(value_name = "FILE", required_unless_present = "dump_atlas", value_parser = validate_file_exists)]
    pub file: Option<PathBuf>,

    /// Font family name, resolved against the installed fonts
    #[arg(short = 'f', long, value_name = "FAMILY", conflicts_with = "font_path")]
    pub font: Option<String>,

    /// TTF/OTF font file to use instead of an installed family
    #[arg(long, value_name = "PATH", value_parser = validate_file_exists)]
    pub font_path: Option<PathBuf>,

    /// Font height in pixels
    #[arg(short = 's', long, default_value_t = 16, value_name = "PIXELS")]
    pub font_size: u32,

    /// Initial window width in logical pixels
    #[arg(long, default_value_t = 960)]
    pub width: u32,

    /// Initial window height in logical pixels
    #[arg(long, default_value_t = 600)]
    pub height: u32,

    /// Text color as RRGGBB or RRGGBBAA hex
    #[arg(long, default_value = "d9d9d9", value_parser = parse_color)]
    pub fg: [f32; 4],

    /// Left margin in pixels
    #[arg(long, default_value_t = 4.0, value_name = "PIXELS")]
    pub margin: f32,

    /// Tab width in spaces
    #[arg(long, default_value_t = 4)]
    pub tab_width: u32,

    /// First line to show
    #[arg(long, default_value_t = 0, value_name = "LINE")]
    pub start_line: usize,

    /// Lines moved per arrow key press or wheel notch
    #[arg(long, default_value_t = 3, value_name = "LINES")]
    pub scroll_step: usize,

    /// Work on a swap copy (FILE.swap) that accepts edits and is removed on exit
    #[arg(long)]
    pub swap: bool,

    /// Write the packed glyph atlas to a grayscale PNG and exit
    #[arg(long, value_name = "PATH")]
    pub dump_atlas: Option<PathBuf>,
}

/// What the viewer was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// Open a window onto `file`
    View { file: PathBuf, swap: bool, start_line: usize },
    /// Write the glyph atlas to `output` without opening a window
    DumpAtlas { output: PathBuf },
}

/// Validated viewer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub mode: Mode,
    pub font: FontSource,
    pub pixel_height: u32,
    pub window_size: (u32, u32),
    pub grid: GridConfig,
    pub scroll_step: usize,
}

fn validate_file_exists(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    if path.is_file() { Ok(path) } else { Err(format!("File '{s}' does not exist")) }
}

fn parse_color(s: &str) -> Result<[f32; 4], String> {
    let hex = s.trim_start_matches('#');
    let invalid = || format!("Invalid color '{s}'. Use RRGGBB or RRGGBBAA hex");

    let value = u32::from_str_radix(hex, 16).map_err(|_| invalid())?;
    let rgba = match hex.len() {
        6 => (value << 8) | 0xff,
        8 => value,
        _ => return Err(invalid()),
    };

    Ok(rgba
        .to_be_bytes()
        .map(|channel| channel as f32 / 255.0))
}

impl Cli {
    /// Validates the CLI arguments
    pub fn validate(&self) -> Result<(), Report> {
        if self.font_size == 0 {
            return Err(eyre!("Font size must be positive"));
        }

        if self.width == 0 || self.height == 0 {
            return Err(eyre!("Window size must be positive"));
        }

        if self.scroll_step == 0 {
            return Err(eyre!("Scroll step must be at least one line"));
        }

        if self.margin < 0.0 {
            return Err(eyre!("Margin must not be negative"));
        }

        Ok(())
    }

    /// Validates the arguments and turns them into a [`ViewerConfig`].
    pub fn into_config(self) -> Result<ViewerConfig, Report> {
        self.validate()?;

        let font = match (self.font_path, self.font) {
            (Some(path), _) => FontSource::Path(path),
            (None, Some(family)) => FontSource::Family(family),
            (None, None) => FontSource::Family(DEFAULT_FONT_FAMILY.to_string()),
        };

        let mode = match (self.dump_atlas, self.file) {
            (Some(output), _) => Mode::DumpAtlas { output },
            (None, Some(file)) => Mode::View { file, swap: self.swap, start_line: self.start_line },
            (None, None) => return Err(eyre!("A text file is required")),
        };

        let grid = GridConfig {
            left_margin: self.margin,
            foreground: self.fg,
            tab_width: self.tab_width,
            ..GridConfig::default()
        };

        Ok(ViewerConfig {
            mode,
            font,
            pixel_height: self.font_size,
            window_size: (self.width, self.height),
            grid,
            scroll_step: self.scroll_step,
        })
    }

    /// Prints a summary of the configuration
    pub fn print_summary(config: &ViewerConfig) {
        let font = match &config.font {
            FontSource::Path(path) => path.display().to_string(),
            FontSource::Family(family) => family.clone(),
        };

        println!("glyphscroll:");
        println!("  Font: {font} @ {}px", config.pixel_height);
        match &config.mode {
            Mode::View { file, swap, start_line } => {
                println!("  File: {}", file.display());
                println!("  Start line: {start_line}");
                if *swap {
                    println!("  Editing swap copy");
                }
            },
            Mode::DumpAtlas { output } => println!("  Atlas output: {}", output.display()),
        }
    }
}
