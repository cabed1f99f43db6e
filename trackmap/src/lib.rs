mod colormap;
mod config;
mod crs;
mod error;
mod frame;
mod input;
mod layers;
mod raster;
mod render;
mod sequencer;
mod track;

pub use crate::{
    config::{AnimationConfig, LineStyle, MarkerStyle, RenderConfig, Rgb},
    crs::{Crs, Reprojection},
    error::TrackError,
    frame::{FrameAccumulator, FrameState, Phase},
    input::{read_contours, read_terrain, read_track, TileMode},
    layers::{ContourLayer, SpatialLayerSet},
    raster::TerrainRaster,
    render::{Frame, Renderer},
    sequencer::{FrameSink, GifSink, Inspect, RunSummary, Sequencer},
    track::{RawFix, Track, TrackPoint},
};
pub use geo;
