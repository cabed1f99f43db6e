//! Terrain elevation grid drawn beneath the route.

use crate::{Crs, Reprojection, TrackError};
use geo::geometry::{Coord, Rect};
use log::{debug, warn};
use nasadem::{Tile, VOID};

/// Number of samples taken along each edge of an extent when
/// reprojecting it.
const EDGE_SAMPLES: usize = 32;

/// A north-up elevation grid.
///
/// Void samples are stored as `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainRaster {
    crs: Option<Crs>,

    /// Outer edges of the grid's cells.
    extent: Rect<f64>,

    /// Number of (columns, rows).
    dimensions: (usize, usize),

    /// Row-major samples, north row first.
    samples: Box<[f32]>,

    /// Lowest and highest non-void sample.
    range: Option<(f32, f32)>,
}

impl TerrainRaster {
    /// Fails unless the grid has at least one cell and `samples`
    /// holds exactly `cols * rows` values.
    pub fn new(
        crs: Option<Crs>,
        extent: Rect<f64>,
        dimensions: (usize, usize),
        samples: Vec<f32>,
    ) -> Result<Self, TrackError> {
        let range = sample_range(&samples);
        Self::with_range(crs, extent, dimensions, samples, range)
    }

    fn with_range(
        crs: Option<Crs>,
        extent: Rect<f64>,
        dimensions: (usize, usize),
        samples: Vec<f32>,
        range: Option<(f32, f32)>,
    ) -> Result<Self, TrackError> {
        let (cols, rows) = dimensions;
        if cols == 0 || rows == 0 || Some(samples.len()) != cols.checked_mul(rows) {
            return Err(TrackError::RasterShape {
                dimensions,
                len: samples.len(),
            });
        }
        Ok(Self {
            crs,
            extent,
            dimensions,
            samples: samples.into_boxed_slice(),
            range,
        })
    }

    /// Copies an `.hgt` tile, which is always geographic (EPSG:4326).
    pub fn from_tile(tile: &Tile) -> Result<Self, TrackError> {
        let (cols, rows) = tile.dimensions();
        let mut samples = Vec::with_capacity(cols * rows);
        for y in (0..rows).rev() {
            for x in 0..cols {
                let sample = tile.get_xy((x, y));
                samples.push(if sample == VOID {
                    f32::NAN
                } else {
                    f32::from(sample)
                });
            }
        }
        let range = tile
            .min_elevation()
            .zip(tile.max_elevation())
            .map(|(lo, hi)| (f32::from(lo), f32::from(hi)));
        match range {
            Some((lo, hi)) => debug!(
                "{}\" tile {cols}x{rows}, elevation {lo}..{hi} m",
                tile.resolution()
            ),
            None => warn!("{}\" tile has only void samples", tile.resolution()),
        }
        Self::with_range(
            Some(Crs::WGS84),
            tile.extent(),
            (cols, rows),
            samples,
            range,
        )
    }

    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    pub fn extent(&self) -> Rect<f64> {
        self.extent
    }

    pub fn dimensions(&self) -> (usize, usize) {
        self.dimensions
    }

    /// Width and height of one cell in CRS units.
    #[allow(clippy::cast_precision_loss)]
    pub fn cell_size(&self) -> (f64, f64) {
        (
            self.extent.width() / self.dimensions.0 as f64,
            self.extent.height() / self.dimensions.1 as f64,
        )
    }

    /// Elevation of the cell containing `coord`, if any.
    pub fn sample(&self, coord: Coord<f64>) -> Option<f32> {
        let (w, h) = self.cell_size();
        let col = ((coord.x - self.extent.min().x) / w).floor();
        let row = ((self.extent.max().y - coord.y) / h).floor();
        #[allow(clippy::cast_precision_loss)]
        if col < 0.0
            || row < 0.0
            || col >= self.dimensions.0 as f64
            || row >= self.dimensions.1 as f64
        {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let sample = self.samples[row as usize * self.dimensions.0 + col as usize];
        (!sample.is_nan()).then_some(sample)
    }

    /// Lowest and highest non-void sample.
    pub fn elevation_range(&self) -> Option<(f32, f32)> {
        self.range
    }

    /// Resamples this raster into `target` with nearest-neighbour
    /// lookup, keeping the grid dimensions.
    pub fn reproject(&self, target: Crs) -> Result<Self, TrackError> {
        let source = self.crs.ok_or_else(|| TrackError::ReprojectionError {
            layer: "terrain",
            reason: "raster has no CRS".to_owned(),
        })?;
        if source == target {
            return Ok(self.clone());
        }

        let now = std::time::Instant::now();
        let forward = Reprojection::new(source, target)?;
        let inverse = Reprojection::new(target, source)?;
        let extent = reproject_extent(self.extent, &forward)?;

        let (cols, rows) = self.dimensions;
        #[allow(clippy::cast_precision_loss)]
        let (w, h) = (extent.width() / cols as f64, extent.height() / rows as f64);
        let mut samples = Vec::with_capacity(cols * rows);
        let mut voided = 0_usize;
        for row in 0..rows {
            for col in 0..cols {
                #[allow(clippy::cast_precision_loss)]
                let center = Coord {
                    x: extent.min().x + (col as f64 + 0.5) * w,
                    y: extent.max().y - (row as f64 + 0.5) * h,
                };
                let sample = inverse
                    .transform(center)
                    .and_then(|coord| self.sample(coord));
                if sample.is_none() {
                    voided += 1;
                }
                samples.push(sample.unwrap_or(f32::NAN));
            }
        }

        if voided == samples.len() {
            warn!("reprojected terrain into {target} has no elevation samples");
        }
        debug!(
            "reprojected terrain {source} -> {target}; void: {voided}/{}, exec: {:?}",
            samples.len(),
            now.elapsed()
        );

        Self::new(Some(target), extent, self.dimensions, samples)
    }
}

fn sample_range(samples: &[f32]) -> Option<(f32, f32)> {
    samples
        .iter()
        .filter(|s| !s.is_nan())
        .fold(None, |acc, &s| match acc {
            None => Some((s, s)),
            Some((lo, hi)) => Some((lo.min(s), hi.max(s))),
        })
}

/// Bounding box of `extent`'s edges after reprojection.
fn reproject_extent(extent: Rect<f64>, forward: &Reprojection) -> Result<Rect<f64>, TrackError> {
    let (min, max) = (extent.min(), extent.max());
    let mut lo = Coord {
        x: f64::INFINITY,
        y: f64::INFINITY,
    };
    let mut hi = Coord {
        x: f64::NEG_INFINITY,
        y: f64::NEG_INFINITY,
    };
    for i in 0..=EDGE_SAMPLES {
        #[allow(clippy::cast_precision_loss)]
        let t = i as f64 / EDGE_SAMPLES as f64;
        let x = min.x + t * extent.width();
        let y = min.y + t * extent.height();
        for coord in [
            Coord { x, y: min.y },
            Coord { x, y: max.y },
            Coord { x: min.x, y },
            Coord { x: max.x, y },
        ] {
            let c = forward.transform_layer("terrain", coord)?;
            lo = Coord {
                x: lo.x.min(c.x),
                y: lo.y.min(c.y),
            };
            hi = Coord {
                x: hi.x.max(c.x),
                y: hi.y.max(c.y),
            };
        }
    }
    Ok(Rect::new(lo, hi))
}

#[cfg(test)]
mod tests {
    use super::{Coord, Crs, Rect, Reprojection, TerrainRaster, TrackError};
    use approx::assert_relative_eq;

    /// 4x3 grid over (-6, 56)..(-4, 57.5), elevation = 10 * row + col.
    fn grid(crs: Option<Crs>) -> TerrainRaster {
        let mut samples: Vec<f32> = (0..12_u8)
            .map(|i| f32::from(10 * (i / 4) + i % 4))
            .collect();
        samples[5] = f32::NAN;
        TerrainRaster::new(
            crs,
            Rect::new(Coord { x: -6.0, y: 56.0 }, Coord { x: -4.0, y: 57.5 }),
            (4, 3),
            samples,
        )
        .unwrap()
    }

    #[test]
    fn test_sample() {
        let raster = grid(Some(Crs::WGS84));
        assert_eq!(raster.cell_size(), (0.5, 0.5));
        // North west corner cell.
        assert_eq!(raster.sample(Coord { x: -5.9, y: 57.4 }), Some(0.0));
        // South east corner cell.
        assert_eq!(raster.sample(Coord { x: -4.1, y: 56.1 }), Some(23.0));
        // Void.
        assert_eq!(raster.sample(Coord { x: -5.4, y: 56.9 }), None);
        // Outside.
        assert_eq!(raster.sample(Coord { x: -3.9, y: 56.5 }), None);
        assert_eq!(raster.elevation_range(), Some((0.0, 23.0)));
    }

    #[test]
    fn test_reproject_into_own_crs_is_identity() {
        let raster = grid(Some(Crs::WGS84));
        let same = raster.reproject(Crs::WGS84).unwrap();
        assert_eq!(raster.extent(), same.extent());
        assert_eq!(raster.dimensions(), same.dimensions());
        for (a, b) in raster.samples.iter().zip(same.samples.iter()) {
            assert!(a == b || (a.is_nan() && b.is_nan()));
        }
    }

    #[test]
    fn test_reproject_to_mercator() {
        let raster = grid(Some(Crs::WGS84));
        let merc = raster.reproject(Crs::WEB_MERCATOR).unwrap();
        assert_eq!(merc.crs(), Some(Crs::WEB_MERCATOR));
        let forward = Reprojection::new(Crs::WGS84, Crs::WEB_MERCATOR).unwrap();
        let sw = forward.transform(Coord { x: -6.0, y: 56.0 }).unwrap();
        assert_relative_eq!(merc.extent().min().x, sw.x, epsilon = 1e-6);
        assert_relative_eq!(merc.extent().min().y, sw.y, epsilon = 1e-6);
        // Cell centers near the corners keep their elevation.
        let ne = forward.transform(Coord { x: -4.1, y: 57.4 }).unwrap();
        assert_eq!(merc.sample(ne), Some(3.0));
    }

    #[test]
    fn test_reproject_without_crs() {
        assert!(matches!(
            grid(None).reproject(Crs::WEB_MERCATOR),
            Err(TrackError::ReprojectionError {
                layer: "terrain",
                ..
            })
        ));
    }

    #[test]
    fn test_shape_is_checked() {
        let extent = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 });
        assert!(matches!(
            TerrainRaster::new(None, extent, (4, 3), vec![0.0; 11]),
            Err(TrackError::RasterShape {
                dimensions: (4, 3),
                len: 11
            })
        ));
        assert!(matches!(
            TerrainRaster::new(None, extent, (0, 3), Vec::new()),
            Err(TrackError::RasterShape { .. })
        ));
        assert!(matches!(
            TerrainRaster::new(None, extent, (3, 0), Vec::new()),
            Err(TrackError::RasterShape { .. })
        ));
        assert!(matches!(
            TerrainRaster::new(None, extent, (usize::MAX, 2), Vec::new()),
            Err(TrackError::RasterShape { .. })
        ));
        let single = TerrainRaster::new(None, extent, (1, 1), vec![7.0]).unwrap();
        assert_eq!(single.sample(Coord { x: 0.5, y: 0.5 }), Some(7.0));
    }

    #[test]
    fn test_reproject_to_national_grid() {
        let raster = grid(Some(Crs::WGS84));
        let bng = raster.reproject(Crs::BRITISH_NATIONAL_GRID).unwrap();
        assert_eq!(bng.crs(), Some(Crs::BRITISH_NATIONAL_GRID));
        assert_eq!(bng.dimensions(), (4, 3));
        // Easting and northing in meters, west of the false origin.
        assert!(bng.extent().min().x > 0.0 && bng.extent().max().x < 400_000.0);
        assert!(bng.extent().min().y > 700_000.0);
        let (lo, hi) = bng.elevation_range().unwrap();
        assert!((0.0..=23.0).contains(&lo) && lo <= hi && hi <= 23.0);
    }

    #[test]
    fn test_from_tile() {
        use byteorder::{WriteBytesExt, BE};
        use nasadem::{Tile, VOID};
        use std::io::{BufWriter, Write};

        const DIM: usize = 1201;
        let dir = std::env::temp_dir().join(format!("trackmap-tile-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("N56W006.hgt");
        let mut wtr = BufWriter::new(std::fs::File::create(&path).unwrap());
        for row in 0..DIM {
            for col in 0..DIM {
                let elevation = if (col, row) == (1, 0) {
                    VOID
                } else {
                    i16::try_from(col + (DIM - 1 - row)).unwrap()
                };
                wtr.write_i16::<BE>(elevation).unwrap();
            }
        }
        wtr.flush().unwrap();
        drop(wtr);

        let raster = TerrainRaster::from_tile(&Tile::load(&path).unwrap()).unwrap();
        assert_eq!(raster.crs(), Some(Crs::WGS84));
        assert_eq!(raster.dimensions(), (DIM, DIM));
        assert_eq!(raster.elevation_range(), Some((0.0, 2400.0)));
        // First file row is the northern edge.
        assert_eq!(raster.sample(Coord { x: -5.9999, y: 56.9999 }), Some(1200.0));
        assert_eq!(raster.sample(Coord { x: -5.9991, y: 56.9999 }), None);
        assert_eq!(raster.sample(Coord { x: -4.9999, y: 56.0001 }), Some(1200.0));
    }
}
