use anyhow::Error as AnyError;
use clap::Parser;
use std::{
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
};
use trackmap::{AnimationConfig, Crs, TileMode};

/// Animate a recorded GPS track over terrain, next to its elevation
/// profile.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// GeoJSON track: points with "time" and "ele" properties, in
    /// recorded order.
    #[arg(long)]
    pub track: PathBuf,

    /// SRTM elevation (.hgt) tile under the track.
    #[arg(long)]
    pub dem: PathBuf,

    /// GeoJSON minor contour lines.
    #[arg(long)]
    pub minor: PathBuf,

    /// Elevation interval of the minor contours, in meters.
    #[arg(long, default_value_t = 50.0)]
    pub minor_interval: f64,

    /// GeoJSON major contour lines.
    #[arg(long)]
    pub major: PathBuf,

    /// Elevation interval of the major contours, in meters.
    #[arg(long, default_value_t = 100.0)]
    pub major_interval: f64,

    /// JSON animation config. Flags below override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Keep one of every `stride` track fixes.
    #[arg(short, long)]
    pub stride: Option<NonZeroUsize>,

    /// CRS to draw the map in, e.g. "EPSG:3857".
    #[arg(long)]
    pub crs: Option<Crs>,

    /// Frames per second of the output.
    #[arg(long)]
    pub fps: Option<NonZeroU32>,

    /// Render this many frames at a time in parallel.
    #[arg(short, long)]
    pub parallel: Option<NonZeroUsize>,

    /// Title drawn on the map.
    #[arg(long)]
    pub title: Option<String>,

    /// Memory map the elevation tile instead of loading it.
    #[arg(long, default_value_t = false)]
    pub mmap: bool,

    /// Output GIF.
    #[arg(short, long)]
    pub out: PathBuf,
}

impl Cli {
    /// The config file, if any, with command line overrides applied.
    pub fn animation_config(&self) -> Result<AnimationConfig, AnyError> {
        let mut config = match &self.config {
            Some(path) => AnimationConfig::load(path)?,
            None => AnimationConfig::default(),
        };
        if let Some(stride) = self.stride {
            config.stride = stride;
        }
        if let Some(crs) = self.crs {
            config.crs = crs;
        }
        if let Some(fps) = self.fps {
            config.fps = fps;
        }
        if self.parallel.is_some() {
            config.parallel = self.parallel;
        }
        if self.title.is_some() {
            config.render.title = self.title.clone();
        }
        Ok(config)
    }

    pub fn tile_mode(&self) -> TileMode {
        if self.mmap {
            TileMode::MemMap
        } else {
            TileMode::InMem
        }
    }
}
