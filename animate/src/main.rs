mod options;
mod progress;

use anyhow::Result;
use clap::Parser;
use indicatif::{MultiProgress, ProgressDrawTarget};
use log::info;
use options::Cli;
use trackmap::{
    read_contours, read_terrain, read_track, FrameSink, GifSink, Renderer, Sequencer,
    SpatialLayerSet, Track,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::init();

    let config = cli.animation_config()?;

    let raw = read_track(&cli.track)?;
    let track = Track::normalize(&raw, config.stride)?;
    info!(
        "track: {} of {} fixes, {} s",
        track.len(),
        raw.len(),
        track.duration_seconds()
    );

    let terrain = read_terrain(&cli.dem, cli.tile_mode())?;
    let minor = read_contours(&cli.minor, cli.minor_interval)?;
    let major = read_contours(&cli.major, cli.major_interval)?;
    let layers = SpatialLayerSet::new(&terrain, &minor, &major, config.crs)?;

    let renderer = Renderer::new(config.render.clone());
    let sequencer = Sequencer::new(&track, &layers, &renderer);
    let progress_group = MultiProgress::with_draw_target(ProgressDrawTarget::stderr_with_hz(4));
    let pb = progress_group.add(progress::bar(
        format!("Render {}", cli.out.display()),
        track.len() as u64,
    ));
    let sink = GifSink::create(&cli.out, renderer.size(), config.fps)?.inspect(|_| pb.inc(1));
    let summary = match config.parallel {
        Some(batch) => sequencer.run_parallel(sink, batch)?,
        None => sequencer.run(sink)?,
    };
    pb.finish();

    let frames = u32::try_from(summary.frames).unwrap_or(u32::MAX);
    info!(
        "wrote {:?}; preview length at {:?} per frame: {:?}",
        cli.out,
        config.preview_interval(),
        config.preview_interval() * frames
    );
    Ok(())
}
