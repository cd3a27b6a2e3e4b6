//! Renders Tiled JSON maps to PNG snapshots.

use anyhow::Context as _;
use clap::Parser;
use std::path::{Path, PathBuf};
use tiled_snapshot::{FileAssetSource, Map, MapError, PngFileSink, RenderOptions};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "tiled_snapshot", version, about)]
struct Cli {
    /// Map documents (JSON) to render.
    #[arg(required = true)]
    maps: Vec<PathBuf>,

    /// Directory receiving one `<map stem>.png` per map.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Load tileset images one at a time.
    #[arg(long, default_value_t = false)]
    sequential: bool,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let options = RenderOptions {
        parallel_loading: !cli.sequential,
    };
    let source = FileAssetSource::new();

    let mut failed = 0usize;
    for path in &cli.maps {
        if let Err(err) = snapshot(path, &cli.out_dir, &source, &options) {
            failed += 1;
            match err.downcast_ref::<MapError>() {
                Some(e) if e.is_recoverable() => {
                    tracing::warn!(map = %path.display(), "skipped: {err:#}")
                }
                _ => tracing::error!(map = %path.display(), "failed: {err:#}"),
            }
        }
    }

    if failed == cli.maps.len() {
        anyhow::bail!("none of the {} map(s) could be rendered", failed);
    }
    if failed > 0 {
        tracing::info!(failed, total = cli.maps.len(), "finished with failures");
    }
    Ok(())
}

fn snapshot(
    path: &Path,
    out_dir: &Path,
    source: &FileAssetSource,
    options: &RenderOptions,
) -> anyhow::Result<()> {
    let stem = path
        .file_stem()
        .with_context(|| format!("no file name in '{}'", path.display()))?;
    let mut sink = PngFileSink::new(out_dir.join(format!("{}.png", stem.to_string_lossy())));

    let map = Map::load(path, source)?;
    map.render_to(source, options, &mut sink)
}
