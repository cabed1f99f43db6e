//! Readers for the files a run starts from.
//!
//! Vector inputs are GeoJSON. The track is a `FeatureCollection` of
//! points in recorded order, each with a `time` and an `ele`
//! property. Contours are `LineString`/`MultiLineString` features. A
//! legacy top-level `crs` member names a file's CRS; files without one
//! are WGS84 per RFC 7946.

use crate::{ContourLayer, Crs, RawFix, TerrainRaster, TrackError};
use geo::geometry::{Coord, LineString, MultiLineString, Point};
use geojson::{Feature, GeoJson, JsonObject, Position, Value};
use log::debug;
use nasadem::Tile;
use std::{fs::File, io::BufReader, path::Path};

/// How to read an elevation tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileMode {
    /// Parse tile and load into memory.
    #[default]
    InMem,

    /// Memory map file contents.
    MemMap,
}

/// Reads an `.hgt` elevation tile.
pub fn read_terrain<P: AsRef<Path>>(path: P, mode: TileMode) -> Result<TerrainRaster, TrackError> {
    debug!("loading {:?}", path.as_ref());
    let tile = match mode {
        TileMode::InMem => Tile::load(path)?,
        TileMode::MemMap => Tile::memmap(path)?,
    };
    TerrainRaster::from_tile(&tile)
}

/// Reads track fixes in file order.
pub fn read_track<P: AsRef<Path>>(path: P) -> Result<Vec<RawFix>, TrackError> {
    let (features, _) = read_features(path)?;
    features
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            let position = match feature.geometry.as_ref().map(|g| &g.value) {
                Some(Value::Point(position)) => to_coord(index, position)?,
                _ => return Err(attribute(index, "geometry")),
            };
            let time = feature
                .property("time")
                .and_then(geojson::JsonValue::as_str)
                .ok_or_else(|| attribute(index, "time"))?;
            let elevation = feature
                .property("ele")
                .and_then(geojson::JsonValue::as_f64)
                .ok_or_else(|| attribute(index, "ele"))?;
            Ok(RawFix {
                time: time.to_owned(),
                position: Point::from(position),
                elevation,
            })
        })
        .collect()
}

/// Reads every contour line in the file as one layer.
pub fn read_contours<P: AsRef<Path>>(path: P, interval: f64) -> Result<ContourLayer, TrackError> {
    let (features, foreign_members) = read_features(path)?;
    let crs = named_crs(foreign_members.as_ref())?;
    let mut lines = Vec::new();
    for (index, feature) in features.iter().enumerate() {
        match feature.geometry.as_ref().map(|g| &g.value) {
            None => (),
            Some(Value::LineString(positions)) => lines.push(to_line(index, positions)?),
            Some(Value::MultiLineString(parts)) => {
                for positions in parts {
                    lines.push(to_line(index, positions)?);
                }
            }
            Some(_) => return Err(attribute(index, "geometry")),
        }
    }
    debug!("read {} contour lines in {crs}", lines.len());
    Ok(ContourLayer::new(
        Some(crs),
        interval,
        MultiLineString::new(lines),
    ))
}

fn read_features<P: AsRef<Path>>(
    path: P,
) -> Result<(Vec<Feature>, Option<JsonObject>), TrackError> {
    let rdr = BufReader::new(File::open(path)?);
    Ok(match GeoJson::from_reader(rdr)? {
        GeoJson::FeatureCollection(collection) => {
            (collection.features, collection.foreign_members)
        }
        GeoJson::Feature(feature) => (vec![feature], None),
        GeoJson::Geometry(geometry) => (
            vec![Feature {
                bbox: None,
                geometry: Some(geometry),
                id: None,
                properties: None,
                foreign_members: None,
            }],
            None,
        ),
    })
}

/// CRS from a legacy `"crs": {"type": "name", "properties": {"name": ..}}`
/// member.
fn named_crs(foreign_members: Option<&JsonObject>) -> Result<Crs, TrackError> {
    let name = foreign_members
        .and_then(|members| members.get("crs"))
        .and_then(|crs| crs.get("properties"))
        .and_then(|properties| properties.get("name"))
        .and_then(geojson::JsonValue::as_str);
    name.map_or(Ok(Crs::WGS84), str::parse::<Crs>)
}

fn to_coord(index: usize, position: &Position) -> Result<Coord<f64>, TrackError> {
    match position.as_slice() {
        [x, y, ..] => Ok(Coord { x: *x, y: *y }),
        _ => Err(attribute(index, "geometry")),
    }
}

fn to_line(index: usize, positions: &[Position]) -> Result<LineString<f64>, TrackError> {
    positions
        .iter()
        .map(|position| to_coord(index, position))
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

fn attribute(index: usize, name: &'static str) -> TrackError {
    TrackError::Attribute { index, name }
}
