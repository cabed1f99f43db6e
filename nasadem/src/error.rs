use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NasademError {
    #[error("{0}")]
    Io(#[from] io::Error),

    /// File stem is not of the form `N56W006`.
    #[error("{0:?} is not named after its SW corner, e.g. N56W006.hgt")]
    HgtName(PathBuf),

    /// File size matches neither 1 nor 3 arc-second tiles.
    #[error("{1:?} is {0} bytes, not a 1 or 3 arc-second HGT tile")]
    HgtLen(u64, PathBuf),
}
