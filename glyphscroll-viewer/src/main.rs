mod app;
mod atlas_dump;
mod cli;
mod logging;

use clap::Parser;
use color_eyre::eyre::{Context, Result};

use crate::{
    cli::{Cli, Mode},
    logging::{LoggingConfig, init_logging},
};

fn main() -> Result<()> {
    // panic hook
    color_eyre::install()?;

    let _guard = init_logging(LoggingConfig::from_env()).wrap_err("Failed to initialize logging")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "glyphscroll starting up"
    );

    let config = Cli::parse().into_config()?;
    Cli::print_summary(&config);

    match config.mode.clone() {
        Mode::DumpAtlas { output } => {
            let dump = atlas_dump::dump_atlas(&config.font, config.pixel_height, &output)?;
            println!(
                "Wrote {}x{} atlas with {} glyphs to {}",
                dump.width,
                dump.height,
                dump.glyphs,
                output.display()
            );
            Ok(())
        },
        Mode::View { file, swap, start_line } => app::run(config, &file, swap, start_line),
    }
}
