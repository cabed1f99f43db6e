use crate::TrackError;
use chrono::NaiveDateTime;
use geo::{
    geometry::{Coord, Point, Rect},
    BoundingRect, MultiPoint,
};
use log::debug;
use std::num::NonZeroUsize;

/// Timestamp layout of a fix, excluding its trailing suffix.
const TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Number of trailing characters (fractional seconds or zone) dropped
/// from every timestamp before parsing.
const TIME_SUFFIX_LEN: usize = 4;

/// A fix as recorded, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFix {
    /// Absolute timestamp, e.g. `2023/05/01 09:00:00.000`.
    pub time: String,
    pub position: Point<f64>,
    pub elevation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub longitude: f64,
    pub latitude: f64,
    pub elevation: f64,
    /// Whole seconds since the first point of the track.
    pub elapsed_seconds: u64,

    /// Position in its track, assigned by [`Track::from_points`].
    index: usize,
}

impl TrackPoint {
    pub fn new(longitude: f64, latitude: f64, elevation: f64, elapsed_seconds: u64) -> Self {
        Self {
            longitude,
            latitude,
            elevation,
            elapsed_seconds,
            index: 0,
        }
    }

    /// Track index shared by both panels.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn position(&self) -> (f64, f64) {
        (self.longitude, self.latitude)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn profile(&self) -> (f64, f64) {
        (self.elapsed_seconds as f64, self.elevation)
    }
}

/// Ordered, time-zeroed and downsampled points.
///
/// A track always has at least one point and its `elapsed_seconds`
/// never decrease.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    points: Vec<TrackPoint>,
}

impl Track {
    /// Keeps every `stride`-th fix of `raw`, starting with the first,
    /// and zeroes their timestamps on the first kept fix.
    ///
    /// Unordered input is rejected rather than sorted.
    pub fn normalize(raw: &[RawFix], stride: NonZeroUsize) -> Result<Self, TrackError> {
        let mut points = Vec::with_capacity(raw.len().div_ceil(stride.get()));
        let mut start: Option<NaiveDateTime> = None;
        let mut previous = 0_i64;

        for (index, fix) in raw.iter().enumerate().step_by(stride.get()) {
            let instant = parse_time(index, &fix.time)?;
            let start = *start.get_or_insert(instant);
            let elapsed = (instant - start).num_seconds();
            if elapsed < previous {
                return Err(TrackError::Unordered {
                    index,
                    elapsed,
                    previous,
                });
            }
            previous = elapsed;
            #[allow(clippy::cast_sign_loss)]
            points.push(TrackPoint::new(
                fix.position.x(),
                fix.position.y(),
                fix.elevation,
                elapsed as u64,
            ));
        }

        debug!(
            "normalized track; raw: {}, stride: {stride}, kept: {}",
            raw.len(),
            points.len()
        );
        Self::from_points(points)
    }

    /// Wraps already normalized points, numbering them in order.
    ///
    /// The first point must be at zero elapsed seconds and none may
    /// precede the one before it.
    pub fn from_points(mut points: Vec<TrackPoint>) -> Result<Self, TrackError> {
        let first = points.first().ok_or(TrackError::EmptyTrack)?;
        if first.elapsed_seconds != 0 {
            return Err(TrackError::NotZeroed(first.elapsed_seconds));
        }
        if let Some(index) = points
            .windows(2)
            .position(|pair| pair[1].elapsed_seconds < pair[0].elapsed_seconds)
        {
            #[allow(clippy::cast_possible_wrap)]
            return Err(TrackError::Unordered {
                index: index + 1,
                elapsed: points[index + 1].elapsed_seconds as i64,
                previous: points[index].elapsed_seconds as i64,
            });
        }
        for (index, point) in points.iter_mut().enumerate() {
            point.index = index;
        }
        Ok(Self { points })
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn get(&self, index: usize) -> Result<&TrackPoint, TrackError> {
        self.points.get(index).ok_or(TrackError::OutOfRange {
            index,
            len: self.points.len(),
        })
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &TrackPoint> + '_ {
        self.points.iter()
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    /// Seconds between the first and last points.
    pub fn duration_seconds(&self) -> u64 {
        self.points.last().map_or(0, |p| p.elapsed_seconds)
    }

    /// Bounding box of every position.
    pub fn bounds(&self) -> Rect<f64> {
        let positions: MultiPoint<f64> = self
            .points
            .iter()
            .map(|p| Point::new(p.longitude, p.latitude))
            .collect();
        // A track is never empty, so neither is its bounding box.
        positions.bounding_rect().unwrap_or_else(|| {
            let first = self.points[0];
            let c = Coord {
                x: first.longitude,
                y: first.latitude,
            };
            Rect::new(c, c)
        })
    }

    /// Lowest and highest elevation.
    pub fn elevation_range(&self) -> (f64, f64) {
        self.points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.elevation), hi.max(p.elevation))
            })
    }
}

fn parse_time(index: usize, value: &str) -> Result<NaiveDateTime, TrackError> {
    let malformed = || TrackError::MalformedTimestamp {
        index,
        value: value.to_owned(),
    };
    let cut = value
        .char_indices()
        .rev()
        .nth(TIME_SUFFIX_LEN - 1)
        .map(|(idx, _)| idx)
        .ok_or_else(malformed)?;
    NaiveDateTime::parse_from_str(&value[..cut], TIME_FORMAT).map_err(|_| malformed())
}

#[cfg(test)]
mod tests {
    use super::{parse_time, RawFix, Track, TrackError, TrackPoint};
    use geo::point;
    use std::num::NonZeroUsize;

    fn fix(time: &str, x: f64, y: f64, elevation: f64) -> RawFix {
        RawFix {
            time: time.to_owned(),
            position: point!(x: x, y: y),
            elevation,
        }
    }

    fn stride(k: usize) -> NonZeroUsize {
        NonZeroUsize::new(k).unwrap()
    }

    /// One fix every 10 seconds starting at 09:00:00.
    fn raw_fixes(n: usize) -> Vec<RawFix> {
        (0..n)
            .map(|i| {
                let secs = i * 10;
                let time = format!(
                    "2023/05/01 {:02}:{:02}:{:02}.000",
                    9 + secs / 3600,
                    (secs / 60) % 60,
                    secs % 60
                );
                #[allow(clippy::cast_precision_loss)]
                let i = i as f64;
                fix(&time, -5.0 - i * 1e-4, 56.8, 100.0 + i)
            })
            .collect()
    }

    #[test]
    fn test_elapsed_seconds() {
        let raw = vec![
            fix("2023/05/01 09:00:00.000", -5.0, 56.8, 500.0),
            fix("2023/05/01 09:01:30.000", -5.01, 56.81, 600.0),
        ];
        let track = Track::normalize(&raw, stride(1)).unwrap();
        assert_eq!(track.get(0).unwrap().elapsed_seconds, 0);
        assert_eq!(track.get(1).unwrap().elapsed_seconds, 90);
        assert_eq!(track.duration_seconds(), 90);
    }

    #[test]
    fn test_suffix_is_discarded() {
        let a = parse_time(0, "2023/05/01 09:00:00+000").unwrap();
        let b = parse_time(0, "2023/05/01 09:00:00.999").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_malformed_timestamp() {
        let raw = vec![
            fix("2023/05/01 09:00:00.000", -5.0, 56.8, 500.0),
            fix("01-05-2023 09:00:10.000", -5.0, 56.8, 500.0),
        ];
        match Track::normalize(&raw, stride(1)) {
            Err(TrackError::MalformedTimestamp { index, value }) => {
                assert_eq!(index, 1);
                assert_eq!(value, "01-05-2023 09:00:10.000");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            parse_time(3, "abc"),
            Err(TrackError::MalformedTimestamp { index: 3, .. })
        ));
    }

    #[test]
    fn test_downsample_count() {
        for (m, k) in [(1, 1), (1, 100), (250, 100), (300, 100), (301, 100), (17, 4)] {
            let raw = raw_fixes(m);
            let track = Track::normalize(&raw, stride(k)).unwrap();
            assert_eq!(track.len(), m.div_ceil(k), "m: {m}, k: {k}");
            assert_eq!(track.get(0).unwrap().longitude, raw[0].position.x());
        }
    }

    #[test]
    fn test_downsample_keeps_every_kth() {
        let raw = raw_fixes(10);
        let track = Track::normalize(&raw, stride(3)).unwrap();
        let elapsed: Vec<u64> = track.iter().map(|p| p.elapsed_seconds).collect();
        assert_eq!(elapsed, vec![0, 30, 60, 90]);
    }

    #[test]
    fn test_elapsed_is_non_decreasing() {
        let track = Track::normalize(&raw_fixes(500), stride(7)).unwrap();
        assert_eq!(track.get(0).unwrap().elapsed_seconds, 0);
        assert!(track
            .points()
            .windows(2)
            .all(|w| w[0].elapsed_seconds <= w[1].elapsed_seconds));
    }

    #[test]
    fn test_unordered_is_rejected() {
        let raw = vec![
            fix("2023/05/01 09:00:00.000", -5.0, 56.8, 500.0),
            fix("2023/05/01 09:00:30.000", -5.0, 56.8, 500.0),
            fix("2023/05/01 09:00:20.000", -5.0, 56.8, 500.0),
        ];
        assert!(matches!(
            Track::normalize(&raw, stride(1)),
            Err(TrackError::Unordered {
                index: 2,
                elapsed: 20,
                previous: 30
            })
        ));
    }

    #[test]
    fn test_empty_track() {
        assert!(matches!(
            Track::normalize(&[], stride(100)),
            Err(TrackError::EmptyTrack)
        ));
        assert!(matches!(
            Track::from_points(vec![]),
            Err(TrackError::EmptyTrack)
        ));
    }

    #[test]
    fn test_summaries() {
        let track = Track::from_points(vec![
            TrackPoint::new(-5.0, 56.8, 500.0, 0),
            TrackPoint::new(-5.02, 56.82, 700.0, 130),
        ])
        .unwrap();
        let bounds = track.bounds();
        assert_eq!(bounds.min().x, -5.02);
        assert_eq!(bounds.max().y, 56.82);
        assert_eq!(track.elevation_range(), (500.0, 700.0));
        assert!(matches!(
            track.get(2),
            Err(TrackError::OutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_first_point_must_be_zeroed() {
        assert!(matches!(
            Track::from_points(vec![
                TrackPoint::new(-5.0, 56.8, 500.0, 15),
                TrackPoint::new(-5.02, 56.82, 700.0, 130),
            ]),
            Err(TrackError::NotZeroed(15))
        ));
    }

    #[test]
    fn test_points_are_numbered() {
        let point = TrackPoint::new(-5.0, 56.8, 500.0, 0);
        let track = Track::from_points(vec![point; 3]).unwrap();
        assert_eq!(
            track.iter().map(TrackPoint::index).collect::<Vec<_>>(),
            [0, 1, 2]
        );
    }
}
