use nasadem::NasademError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackError {
    #[error("malformed timestamp {value:?} at fix {index}")]
    MalformedTimestamp { index: usize, value: String },

    #[error("fix {index} at {elapsed}s precedes the previous fix at {previous}s")]
    Unordered {
        index: usize,
        elapsed: i64,
        previous: i64,
    },

    #[error("first track point is at {0}s, expected 0s")]
    NotZeroed(u64),

    #[error("no track points remain after downsampling")]
    EmptyTrack,

    #[error("unsupported CRS {0:?}")]
    UnsupportedCrs(String),

    #[error("raster of {dimensions:?} cells cannot hold {len} samples")]
    RasterShape {
        dimensions: (usize, usize),
        len: usize,
    },

    #[error("cannot reproject {layer}: {reason}")]
    ReprojectionError { layer: &'static str, reason: String },

    #[error("frame index {index} out of range for track of len {len}")]
    OutOfRange { index: usize, len: usize },

    #[error("frame is {actual:?}, expected {expected:?}")]
    FrameSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("feature {index} missing or invalid '{name}'")]
    Attribute { index: usize, name: &'static str },

    #[error("draw: {0}")]
    Draw(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    GeoJson(#[from] geojson::Error),

    #[error("config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("{0}")]
    Nasadem(#[from] NasademError),
}
