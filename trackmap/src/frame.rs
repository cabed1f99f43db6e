//! Cumulative per-frame state.
//!
//! Both panels of a frame are drawn from one [`FrameState`], so the
//! route on the map and the elevation profile always hold the same
//! number of points and share one index.

use crate::{Track, TrackError, TrackPoint};

/// The prefix of the track absorbed so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameState {
    /// `(longitude, latitude)` of every absorbed point.
    positions: Vec<(f64, f64)>,

    /// `(elapsed_seconds, elevation)` of every absorbed point.
    profile: Vec<(f64, f64)>,
}

impl FrameState {
    /// Builds the state of step `index` directly from `track`.
    pub fn prefix(track: &Track, index: usize) -> Result<Self, TrackError> {
        if index >= track.len() {
            return Err(TrackError::OutOfRange {
                index,
                len: track.len(),
            });
        }
        let points = &track.points()[..=index];
        Ok(Self {
            positions: points.iter().map(TrackPoint::position).collect(),
            profile: points.iter().map(TrackPoint::profile).collect(),
        })
    }

    pub fn positions(&self) -> &[(f64, f64)] {
        &self.positions
    }

    pub fn profile(&self) -> &[(f64, f64)] {
        &self.profile
    }

    /// Number of absorbed points.
    pub fn len(&self) -> usize {
        debug_assert_eq!(self.positions.len(), self.profile.len());
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn push(&mut self, point: &TrackPoint) {
        self.positions.push(point.position());
        self.profile.push(point.profile());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing absorbed yet.
    Empty,

    /// Points `0..=i` absorbed, more remain.
    Partial(usize),

    /// Every point absorbed.
    Complete,
}

/// Grows a [`FrameState`] one track point at a time.
pub struct FrameAccumulator<'a> {
    track: &'a Track,
    state: FrameState,
}

impl<'a> FrameAccumulator<'a> {
    pub fn new(track: &'a Track) -> Self {
        Self {
            track,
            state: FrameState {
                positions: Vec::with_capacity(track.len()),
                profile: Vec::with_capacity(track.len()),
            },
        }
    }

    pub fn phase(&self) -> Phase {
        match self.state.len() {
            0 => Phase::Empty,
            n if n == self.track.len() => Phase::Complete,
            n => Phase::Partial(n - 1),
        }
    }

    pub fn state(&self) -> &FrameState {
        &self.state
    }

    /// Absorbs the next track point and returns it.
    pub fn advance(&mut self) -> Result<&'a TrackPoint, TrackError> {
        let point = self.track.get(self.state.len())?;
        self.state.push(point);
        Ok(point)
    }
}
