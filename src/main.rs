mod shared;
mod audio_api;
mod audio;
mod generator;
mod pipeline;
mod sequencer;

use std::path::PathBuf;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use generator::Generator;
use pipeline::persistence;

fn main() {
    // stdout may be carrying the audio, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("funkgen=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let project_dir: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    // a config that fails to parse stops the run instead of being replaced
    let loaded = persistence::load_config(&project_dir)?;
    let fresh = loaded.is_none();
    let config = loaded.unwrap_or_default();
    info!(
        dir = %project_dir.display(),
        grammar = ?config.grammar,
        sink = ?config.sink,
        "funkgen starting"
    );

    let mut generator = Generator::new(&config)?;
    let mut sink = audio::open_sink(&config, &project_dir)?;
    let summary = generator.run(sink.as_mut(), config.max_ticks)?;
    info!(
        slices = summary.slices,
        closed = summary.closed,
        regenerations = generator.sequencer().state().regenerations,
        "done"
    );

    // leave a config behind to tweak next time
    if fresh {
        if let Err(e) = persistence::save_config(&project_dir, &config) {
            warn!("could not save config: {e:#}");
        }
    }
    Ok(())
}
