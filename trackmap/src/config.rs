use crate::{Crs, TrackError};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs::File,
    io::BufReader,
    num::{NonZeroU32, NonZeroUsize},
    path::Path,
    str::FromStr,
    time::Duration,
};

const DEFAULT_STRIDE: NonZeroUsize = match NonZeroUsize::new(100) {
    Some(stride) => stride,
    None => panic!("stride must be non-zero"),
};

const DEFAULT_FPS: NonZeroU32 = match NonZeroU32::new(10) {
    Some(fps) => fps,
    None => panic!("fps must be non-zero"),
};

/// Everything a run needs besides its input files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Keep one raw fix out of every `stride`.
    pub stride: NonZeroUsize,

    /// CRS every layer is drawn in.
    pub crs: Crs,

    /// Frame rate of the written animation.
    pub fps: NonZeroU32,

    /// Per-frame display interval for previews, in milliseconds. Does
    /// not affect the written animation.
    pub interval_ms: u64,

    /// Render this many frames concurrently, or one at a time when
    /// `None`.
    pub parallel: Option<NonZeroUsize>,

    pub render: RenderConfig,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            stride: DEFAULT_STRIDE,
            crs: Crs::WGS84,
            fps: DEFAULT_FPS,
            interval_ms: 125,
            parallel: None,
            render: RenderConfig::default(),
        }
    }
}

impl AnimationConfig {
    /// Reads a JSON config file; missing fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TrackError> {
        let rdr = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(rdr)?)
    }

    /// Delay between frames of the written animation.
    pub fn frame_delay_ms(&self) -> u32 {
        1000 / self.fps.get()
    }

    pub fn preview_interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// An opaque sRGB color, written as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Self = Self(0xff, 0xff, 0xff);
}

impl FromStr for Rgb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        let hex = s
            .strip_prefix('#')
            .filter(|hex| hex.len() == 6 && hex.is_ascii())
            .ok_or_else(|| format!("not a #rrggbb color: {s:?}"))?;
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|e| format!("{s:?}: {e}"))
        };
        Ok(Self(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(s: String) -> Result<Self, String> {
        s.parse()
    }
}

impl From<Rgb> for String {
    fn from(rgb: Rgb) -> String {
        rgb.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    pub color: Rgb,
    /// Opacity in `0.0..=1.0`.
    pub alpha: f64,
    /// Stroke width in pixels.
    pub width: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerStyle {
    pub fill: Rgb,
    pub edge: Rgb,
    /// Radius in pixels.
    pub radius: u32,
    pub edge_width: u32,
}

/// Styling and layout of every frame.
///
/// Fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Frame size in pixels.
    pub width: u32,
    pub height: u32,

    /// Share of the frame width given to the map panel.
    pub map_fraction: f64,

    pub background: Rgb,
    pub foreground: Rgb,

    pub minor_contour: LineStyle,
    pub major_contour: LineStyle,

    /// Wide stroke under the route.
    pub route_outline: LineStyle,
    pub route: LineStyle,

    /// Marker on the current point of both panels.
    pub marker: MarkerStyle,

    /// Color of the elevation axis.
    pub axis: Rgb,

    /// Draw tick labels on the elevation axis.
    pub elevation_labels: bool,

    /// Suffix of elevation tick labels.
    pub unit: String,

    /// Vertical caption left of the elevation panel.
    pub caption: Option<String>,
    pub caption_color: Rgb,

    /// Title in the top left corner of the map.
    pub title: Option<String>,
    pub title_color: Rgb,

    pub north_arrow: bool,

    /// Font family for all text.
    pub font: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 960,
            height: 720,
            map_fraction: 0.62,
            background: Rgb(0x01, 0x24, 0x54),
            foreground: Rgb::WHITE,
            minor_contour: LineStyle {
                color: Rgb(0xa0, 0xa0, 0xa0),
                alpha: 0.2,
                width: 1,
            },
            major_contour: LineStyle {
                color: Rgb::WHITE,
                alpha: 0.5,
                width: 1,
            },
            route_outline: LineStyle {
                color: Rgb::WHITE,
                alpha: 1.0,
                width: 6,
            },
            route: LineStyle {
                color: Rgb(0xa3, 0x5e, 0x85),
                alpha: 1.0,
                width: 3,
            },
            marker: MarkerStyle {
                fill: Rgb(0xd8, 0x2f, 0x90),
                edge: Rgb::WHITE,
                radius: 7,
                edge_width: 2,
            },
            axis: Rgb(0xa0, 0xa0, 0xa0),
            elevation_labels: true,
            unit: "m".to_owned(),
            caption: Some("ELEVATION".to_owned()),
            caption_color: Rgb(0xd8, 0x2f, 0x90),
            title: None,
            title_color: Rgb(0xfd, 0xe4, 0x34),
            north_arrow: true,
            font: "sans-serif".to_owned(),
        }
    }
}

impl RenderConfig {
    /// This config with every text element turned off.
    #[must_use]
    pub fn without_text(mut self) -> Self {
        self.elevation_labels = false;
        self.caption = None;
        self.title = None;
        self
    }
}
