use crate::{Crs, Reprojection, TerrainRaster, TrackError};
use geo::{
    geometry::{Coord, MultiLineString, Rect},
    BoundingRect, MapCoords,
};
use log::debug;

/// Contour lines at a fixed elevation interval.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourLayer {
    crs: Option<Crs>,

    /// Elevation interval between adjacent lines (e.g. 50 or 100).
    interval: f64,

    lines: MultiLineString<f64>,
}

impl ContourLayer {
    pub fn new(crs: Option<Crs>, interval: f64, lines: MultiLineString<f64>) -> Self {
        Self {
            crs,
            interval,
            lines,
        }
    }

    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn lines(&self) -> &MultiLineString<f64> {
        &self.lines
    }

    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.lines.bounding_rect()
    }

    /// Maps every vertex into `target`.
    pub fn reproject(&self, layer: &'static str, target: Crs) -> Result<Self, TrackError> {
        let source = self.crs.ok_or_else(|| TrackError::ReprojectionError {
            layer,
            reason: "contours have no CRS".to_owned(),
        })?;
        if source == target {
            return Ok(self.clone());
        }
        let reprojection = Reprojection::new(source, target)?;
        let lines = self
            .lines
            .try_map_coords(|coord: Coord<f64>| reprojection.transform_layer(layer, coord))?;
        Ok(Self {
            crs: Some(target),
            interval: self.interval,
            lines,
        })
    }
}

/// Terrain and contours, all in one CRS.
///
/// Built once per run and shared read-only by every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialLayerSet {
    crs: Crs,

    /// Track positions (always WGS84) into `crs`.
    track: Reprojection,

    terrain: TerrainRaster,
    minor: ContourLayer,
    major: ContourLayer,
}

impl SpatialLayerSet {
    pub fn new(
        terrain: &TerrainRaster,
        minor: &ContourLayer,
        major: &ContourLayer,
        crs: Crs,
    ) -> Result<Self, TrackError> {
        let now = std::time::Instant::now();
        let terrain = terrain.reproject(crs)?;
        let minor = minor.reproject("minor contours", crs)?;
        let major = major.reproject("major contours", crs)?;
        let track = Reprojection::new(Crs::WGS84, crs)?;
        debug!(
            "layers in {crs}; minor lines: {}, major lines: {}, exec: {:?}",
            minor.lines().0.len(),
            major.lines().0.len(),
            now.elapsed()
        );
        Ok(Self {
            crs,
            track,
            terrain,
            minor,
            major,
        })
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// A WGS84 track position in this set's CRS, or `None` where it
    /// has no image.
    pub fn project(&self, (x, y): (f64, f64)) -> Option<(f64, f64)> {
        self.track.transform(Coord { x, y }).map(|c| (c.x, c.y))
    }

    pub fn terrain(&self) -> &TerrainRaster {
        &self.terrain
    }

    pub fn minor(&self) -> &ContourLayer {
        &self.minor
    }

    pub fn major(&self) -> &ContourLayer {
        &self.major
    }

    /// Union of the terrain extent and both contour layers' bounds.
    pub fn bounds(&self) -> Rect<f64> {
        [self.minor.bounds(), self.major.bounds()]
            .into_iter()
            .flatten()
            .fold(self.terrain.extent(), |acc, rect| {
                Rect::new(
                    Coord {
                        x: acc.min().x.min(rect.min().x),
                        y: acc.min().y.min(rect.min().y),
                    },
                    Coord {
                        x: acc.max().x.max(rect.max().x),
                        y: acc.max().y.max(rect.max().y),
                    },
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{ContourLayer, Coord, Crs, MultiLineString, Rect, SpatialLayerSet, TrackError};
    use crate::TerrainRaster;
    use approx::assert_relative_eq;
    use geo::line_string;

    fn contours(crs: Option<Crs>, interval: f64) -> ContourLayer {
        ContourLayer::new(
            crs,
            interval,
            MultiLineString::new(vec![
                line_string![(x: -5.5, y: 56.5), (x: -5.0, y: 56.9), (x: -4.5, y: 56.6)],
                line_string![(x: -6.5, y: 57.0), (x: -6.0, y: 57.2)],
            ]),
        )
    }

    fn terrain() -> TerrainRaster {
        TerrainRaster::new(
            Some(Crs::WGS84),
            Rect::new(Coord { x: -6.0, y: 56.0 }, Coord { x: -4.0, y: 58.0 }),
            (2, 2),
            vec![100.0, 200.0, 300.0, 400.0],
        )
        .unwrap()
    }

    #[test]
    fn test_reproject_into_own_crs_is_identity() {
        let layer = contours(Some(Crs::WGS84), 50.0);
        assert_eq!(layer.reproject("minor", Crs::WGS84).unwrap(), layer);
    }

    #[test]
    fn test_round_trip_through_mercator() {
        let layer = contours(Some(Crs::WGS84), 50.0);
        let merc = layer.reproject("minor", Crs::WEB_MERCATOR).unwrap();
        assert_eq!(merc.crs(), Some(Crs::WEB_MERCATOR));
        let back = merc.reproject("minor", Crs::WGS84).unwrap();
        for (a, b) in layer
            .lines()
            .0
            .iter()
            .flat_map(|l| l.0.iter())
            .zip(back.lines().0.iter().flat_map(|l| l.0.iter()))
        {
            assert_relative_eq!(a.x, b.x, epsilon = 1e-8);
            assert_relative_eq!(a.y, b.y, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_missing_crs() {
        let res = SpatialLayerSet::new(
            &terrain(),
            &contours(Some(Crs::WGS84), 50.0),
            &contours(None, 100.0),
            Crs::WGS84,
        );
        assert!(matches!(
            res,
            Err(TrackError::ReprojectionError {
                layer: "major contours",
                ..
            })
        ));
    }

    #[test]
    fn test_bounds_union() {
        let layers = SpatialLayerSet::new(
            &terrain(),
            &contours(Some(Crs::WGS84), 50.0),
            &contours(Some(Crs::WGS84), 100.0),
            Crs::WGS84,
        )
        .unwrap();
        let bounds = layers.bounds();
        assert_eq!(bounds.min(), Coord { x: -6.5, y: 56.0 });
        assert_eq!(bounds.max(), Coord { x: -4.0, y: 58.0 });
        assert_eq!(layers.minor().interval(), 50.0);
    }

    #[test]
    fn test_project_track_positions() {
        let layers = SpatialLayerSet::new(
            &terrain(),
            &contours(Some(Crs::WGS84), 50.0),
            &contours(Some(Crs::WGS84), 100.0),
            Crs::WEB_MERCATOR,
        )
        .unwrap();
        let (x, _) = layers.project((-5.003_5, 56.796_9)).unwrap();
        assert_relative_eq!(x, -556_987.07, epsilon = 0.01);
        assert_eq!(layers.project((0.0, 90.0)), None);
    }
}
