use crate::{
    Frame, FrameAccumulator, FrameState, Phase, Renderer, SpatialLayerSet, Track, TrackError,
};
use log::{debug, info, warn};
use plotters::prelude::*;
use rayon::prelude::*;
use std::{
    fs,
    num::{NonZeroU32, NonZeroUsize},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

/// Consumer of rendered frames, in track order.
pub trait FrameSink {
    fn append(&mut self, frame: &Frame) -> Result<(), TrackError>;

    /// Called once after the last frame.
    fn finish(self) -> Result<(), TrackError>
    where
        Self: Sized;

    /// Calls `f` with every frame after it was appended.
    fn inspect<F: FnMut(&Frame)>(self, f: F) -> Inspect<Self, F>
    where
        Self: Sized,
    {
        Inspect { sink: self, f }
    }
}

/// See [`FrameSink::inspect`].
pub struct Inspect<S, F> {
    sink: S,
    f: F,
}

impl<S: FrameSink, F: FnMut(&Frame)> FrameSink for Inspect<S, F> {
    fn append(&mut self, frame: &Frame) -> Result<(), TrackError> {
        self.sink.append(frame)?;
        (self.f)(frame);
        Ok(())
    }

    fn finish(self) -> Result<(), TrackError> {
        self.sink.finish()
    }
}

/// Writes frames to an animated GIF.
///
/// Frames go to a `.tmp` file next to the destination, which is
/// renamed into place by [`FrameSink::finish`]. A sink dropped before
/// that removes its temp file.
pub struct GifSink {
    backend: Option<BitMapBackend<'static>>,
    size: (u32, u32),
    frames: usize,
    path: PathBuf,
    tmp_path: PathBuf,
    done: bool,
}

impl GifSink {
    pub fn create<P: AsRef<Path>>(
        path: P,
        size: (u32, u32),
        fps: NonZeroU32,
    ) -> Result<Self, TrackError> {
        let path = path.as_ref().to_path_buf();
        let tmp_path = {
            let mut p = path.clone();
            p.set_extension("tmp");
            p
        };
        let delay = 1000 / fps.get();
        debug!("writing {tmp_path:?}, {size:?} at {delay} ms per frame");
        let backend = BitMapBackend::gif(tmp_path.clone(), size, delay)
            .map_err(|e| TrackError::Draw(e.to_string()))?;
        Ok(Self {
            backend: Some(backend),
            size,
            frames: 0,
            path,
            tmp_path,
            done: false,
        })
    }

    /// Frames appended so far.
    pub fn frames(&self) -> usize {
        self.frames
    }
}

impl FrameSink for GifSink {
    fn append(&mut self, frame: &Frame) -> Result<(), TrackError> {
        if frame.size() != self.size {
            return Err(TrackError::FrameSize {
                expected: self.size,
                actual: frame.size(),
            });
        }
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| TrackError::Draw("gif already closed".to_owned()))?;
        let draw_error = |e: &dyn std::fmt::Display| TrackError::Draw(e.to_string());
        backend.ensure_prepared().map_err(|e| draw_error(&e))?;
        backend
            .blit_bitmap((0, 0), frame.size(), frame.pixels())
            .map_err(|e| draw_error(&e))?;
        backend.present().map_err(|e| draw_error(&e))?;
        self.frames += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<(), TrackError> {
        // Dropping the backend writes the GIF trailer.
        self.backend = None;
        fs::rename(&self.tmp_path, &self.path)?;
        self.done = true;
        debug!("wrote {} frames to {:?}", self.frames, self.path);
        Ok(())
    }
}

impl Drop for GifSink {
    fn drop(&mut self) {
        if !self.done {
            self.backend = None;
            if let Err(e) = fs::remove_file(&self.tmp_path) {
                warn!("removing {:?}: {e}", self.tmp_path);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: usize,
    pub elapsed: Duration,
}

/// Renders one frame per track point and hands them to a sink.
pub struct Sequencer<'a> {
    track: &'a Track,
    layers: &'a SpatialLayerSet,
    renderer: &'a Renderer,
}

impl<'a> Sequencer<'a> {
    pub fn new(track: &'a Track, layers: &'a SpatialLayerSet, renderer: &'a Renderer) -> Self {
        Self {
            track,
            layers,
            renderer,
        }
    }

    /// Renders frames one at a time, each from the accumulated state.
    pub fn run<S: FrameSink>(&self, mut sink: S) -> Result<RunSummary, TrackError> {
        let now = Instant::now();
        let mut acc = FrameAccumulator::new(self.track);
        while acc.phase() != Phase::Complete {
            let point = acc.advance()?;
            let frame = self.renderer.render(acc.state(), self.layers, point)?;
            sink.append(&frame)?;
            debug!("frame {}/{}", frame.index() + 1, self.track.len());
        }
        sink.finish()?;
        Ok(self.summary(now))
    }

    /// Renders up to `batch` frames at a time on the rayon pool.
    ///
    /// Frames within a batch are rendered independently but appended
    /// in index order, so the sink sees the same sequence as [`run`].
    ///
    /// [`run`]: Self::run
    pub fn run_parallel<S: FrameSink>(
        &self,
        mut sink: S,
        batch: NonZeroUsize,
    ) -> Result<RunSummary, TrackError> {
        let now = Instant::now();
        let len = self.track.len();
        for start in (0..len).step_by(batch.get()) {
            let end = (start + batch.get()).min(len);
            let frames = (start..end)
                .into_par_iter()
                .map(|index| {
                    let state = FrameState::prefix(self.track, index)?;
                    self.renderer
                        .render(&state, self.layers, self.track.get(index)?)
                })
                .collect::<Result<Vec<Frame>, TrackError>>()?;
            for frame in &frames {
                sink.append(frame)?;
            }
            debug!("frames {}..{end} of {len}", start + 1);
        }
        sink.finish()?;
        Ok(self.summary(now))
    }

    /// Renders the whole track into a GIF at `path`.
    ///
    /// Nothing is left at `path` if any frame fails.
    pub fn write_gif<P: AsRef<Path>>(
        &self,
        path: P,
        fps: NonZeroU32,
    ) -> Result<RunSummary, TrackError> {
        let sink = GifSink::create(path, self.renderer.size(), fps)?;
        self.run(sink)
    }

    fn summary(&self, start: Instant) -> RunSummary {
        let summary = RunSummary {
            frames: self.track.len(),
            elapsed: start.elapsed(),
        };
        info!(
            "rendered {} frames, exec: {:?}",
            summary.frames, summary.elapsed
        );
        summary
    }
}
