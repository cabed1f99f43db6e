//! Two-panel frame drawing.
//!
//! The left panel is the map: terrain, minor and major contours, the
//! route so far and a marker on the current point. The right panel is
//! the elevation profile so far with the same marker.

use crate::{
    colormap::cividis,
    config::{LineStyle, RenderConfig, Rgb},
    Crs, FrameState, SpatialLayerSet, TerrainRaster, TrackError, TrackPoint,
};
use geo::geometry::{Coord, Rect};
use plotters::{
    coord::{types::RangedCoordf64, ReverseCoordTranslate, Shift},
    drawing::DrawingAreaErrorKind,
    prelude::*,
    style::{FontDesc, FontFamily, FontStyle, FontTransform},
};
use std::{iter, ops::Range};

type Chart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;
type DrawResult<DB> = Result<(), DrawingAreaErrorKind<<DB as DrawingBackend>::ErrorType>>;

/// Smallest extent a viewport axis is given, in layer units.
const MIN_SPAN: f64 = 1e-9;

/// One rendered RGB frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    index: usize,
    width: u32,
    height: u32,
    /// Row-major, 3 bytes per pixel.
    pixels: Vec<u8>,
}

impl Frame {
    /// Index of the track point this frame ends at.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = 3 * (y as usize * self.width as usize + x as usize);
        let px = &self.pixels[offset..offset + 3];
        Some([px[0], px[1], px[2]])
    }
}

/// Draws frames with a fixed [`RenderConfig`].
#[derive(Debug, Clone)]
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Renders the frame for `state`, whose last point is `point`, into
    /// a fresh buffer.
    pub fn render(
        &self,
        state: &FrameState,
        layers: &SpatialLayerSet,
        point: &TrackPoint,
    ) -> Result<Frame, TrackError> {
        let (width, height) = self.size();
        let mut pixels = vec![0; 3 * width as usize * height as usize];
        {
            let area = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
            self.draw(&area, state, layers, point)?;
            area.present().map_err(draw_error)?;
        }
        Ok(Frame {
            index: point.index(),
            width,
            height,
            pixels,
        })
    }

    /// Draws the frame for `state` onto any plotters surface.
    ///
    /// The whole area is cleared first, so nothing from an earlier
    /// frame survives.
    pub fn draw<DB: DrawingBackend>(
        &self,
        area: &DrawingArea<DB, Shift>,
        state: &FrameState,
        layers: &SpatialLayerSet,
        point: &TrackPoint,
    ) -> Result<(), TrackError> {
        // `point` must be the last point absorbed into `state`.
        if point.index() + 1 != state.len()
            || state.positions().last() != Some(&point.position())
            || state.profile().last() != Some(&point.profile())
        {
            return Err(TrackError::OutOfRange {
                index: point.index(),
                len: state.len(),
            });
        }
        self.draw_panels(area, state, layers, point)
            .map_err(draw_error)
    }

    fn draw_panels<DB: DrawingBackend>(
        &self,
        area: &DrawingArea<DB, Shift>,
        state: &FrameState,
        layers: &SpatialLayerSet,
        point: &TrackPoint,
    ) -> DrawResult<DB> {
        area.fill(&color(self.config.background))?;
        let (width, _) = area.dim_in_pixel();
        #[allow(clippy::cast_possible_truncation)]
        let split = (f64::from(width) * self.config.map_fraction.clamp(0.0, 1.0)).round() as i32;
        let (map, elevation) = area.split_horizontally(split);
        self.draw_map(&map, state, layers, point)?;
        self.draw_elevation(&elevation, state, point)
    }

    fn draw_map<DB: DrawingBackend>(
        &self,
        area: &DrawingArea<DB, Shift>,
        state: &FrameState,
        layers: &SpatialLayerSet,
        point: &TrackPoint,
    ) -> DrawResult<DB> {
        let crs = layers.crs();
        let (x_range, y_range) = fit(layers.bounds(), area.dim_in_pixel(), crs);
        let mut chart = ChartBuilder::on(area).build_cartesian_2d(x_range, y_range)?;

        draw_terrain(&chart, layers.terrain())?;
        for (layer, style) in [
            (layers.minor(), &self.config.minor_contour),
            (layers.major(), &self.config.major_contour),
        ] {
            let style = line_style(style);
            chart.draw_series(layer.lines().0.iter().map(|line| {
                PathElement::new(
                    line.0.iter().map(|c| (c.x, c.y)).collect::<Vec<_>>(),
                    style,
                )
            }))?;
        }

        // Track positions are WGS84 and drawn in the layers' CRS.
        let route: Vec<(f64, f64)> = state
            .positions()
            .iter()
            .filter_map(|&position| layers.project(position))
            .collect();
        for style in [&self.config.route_outline, &self.config.route] {
            chart.draw_series(iter::once(PathElement::new(
                route.clone(),
                line_style(style),
            )))?;
        }
        if let Some(current) = layers.project(point.position()) {
            self.draw_marker(&mut chart, current)?;
        }

        if self.config.north_arrow {
            self.draw_north_arrow(area)?;
        }
        if let Some(title) = &self.config.title {
            let style = self.font(36.0).color(&color(self.config.title_color));
            area.draw_text(title, &style, (16, 12))?;
        }
        Ok(())
    }

    fn draw_elevation<DB: DrawingBackend>(
        &self,
        area: &DrawingArea<DB, Shift>,
        state: &FrameState,
        point: &TrackPoint,
    ) -> DrawResult<DB> {
        let profile = state.profile();
        let (x_range, y_range) = profile_ranges(profile);
        let mut builder = ChartBuilder::on(area);
        builder
            .margin(12)
            .margin_left(if self.config.caption.is_some() { 40 } else { 12 });
        if self.config.elevation_labels {
            builder.right_y_label_area_size(56);
        }
        let mut chart = builder.build_cartesian_2d(x_range.clone(), y_range.clone())?;

        let axis = color(self.config.axis);
        if self.config.elevation_labels {
            let unit = self.config.unit.as_str();
            let label = |v: &f64| format!("{v:.0}{unit}");
            chart
                .configure_mesh()
                .disable_mesh()
                .disable_x_axis()
                .x_labels(0)
                .y_labels(6)
                .axis_style(axis.stroke_width(1))
                .label_style(self.font(14.0).color(&color(self.config.foreground)))
                .y_label_formatter(&label)
                .draw()?;
        } else {
            chart.draw_series(iter::once(PathElement::new(
                vec![(x_range.end, y_range.start), (x_range.end, y_range.end)],
                axis.stroke_width(1),
            )))?;
        }

        for style in [&self.config.route_outline, &self.config.route] {
            chart.draw_series(iter::once(PathElement::new(
                profile.to_vec(),
                line_style(style),
            )))?;
        }
        self.draw_marker(&mut chart, point.profile())?;

        if let Some(caption) = &self.config.caption {
            let (_, height) = area.dim_in_pixel();
            let style = self
                .font(18.0)
                .transform(FontTransform::Rotate270)
                .color(&color(self.config.caption_color));
            #[allow(clippy::cast_possible_wrap)]
            area.draw_text(caption, &style, (10, height as i32 / 2 + 48))?;
        }
        Ok(())
    }

    fn draw_marker<DB: DrawingBackend>(
        &self,
        chart: &mut Chart<'_, DB>,
        at: (f64, f64),
    ) -> DrawResult<DB> {
        let marker = &self.config.marker;
        chart.draw_series(iter::once(Circle::new(
            at,
            marker.radius,
            color(marker.fill).filled(),
        )))?;
        if marker.edge_width > 0 {
            chart.draw_series(iter::once(Circle::new(
                at,
                marker.radius,
                color(marker.edge).stroke_width(marker.edge_width),
            )))?;
        }
        Ok(())
    }

    fn draw_north_arrow<DB: DrawingBackend>(&self, area: &DrawingArea<DB, Shift>) -> DrawResult<DB> {
        let (width, _) = area.dim_in_pixel();
        #[allow(clippy::cast_possible_wrap)]
        let x = width as i32 - 28;
        let fg = color(self.config.foreground);
        area.draw(&Polygon::new(
            vec![(x, 14), (x - 9, 32), (x + 9, 32)],
            fg.filled(),
        ))?;
        area.draw(&PathElement::new(vec![(x, 32), (x, 54)], fg.stroke_width(4)))?;
        Ok(())
    }

    fn font(&self, size: f64) -> FontDesc<'_> {
        FontDesc::new(
            FontFamily::from(self.config.font.as_str()),
            size,
            FontStyle::Normal,
        )
    }
}

/// Colors every visible pixel of the plotting area that falls on the
/// terrain grid.
fn draw_terrain<DB: DrawingBackend>(
    chart: &Chart<'_, DB>,
    terrain: &TerrainRaster,
) -> DrawResult<DB> {
    let Some((lo, hi)) = terrain.elevation_range() else {
        return Ok(());
    };
    let plotting_area = chart.plotting_area();
    let (xs, ys) = plotting_area.get_pixel_range();
    let coord_spec = plotting_area.as_coord_spec();
    let canvas = plotting_area.strip_coord_spec();
    for py in ys.clone() {
        for px in xs.clone() {
            let Some((x, y)) = coord_spec.reverse_translate((px, py)) else {
                continue;
            };
            if let Some(elevation) = terrain.sample(Coord { x, y }) {
                let c = cividis(f64::from(elevation), f64::from(lo), f64::from(hi));
                canvas.draw_pixel((px - xs.start, py - ys.start), &c)?;
            }
        }
    }
    Ok(())
}

/// Axis ranges of the elevation panel: elapsed time of the points so
/// far, and zero up to a little above the highest point.
fn profile_ranges(profile: &[(f64, f64)]) -> (Range<f64>, Range<f64>) {
    let start = profile.first().map_or(0.0, |p| p.0);
    let end = profile.last().map_or(0.0, |p| p.0);
    let end = if end > start { end } else { start + 1.0 };
    let top = profile.iter().map(|p| p.1).fold(0.0, f64::max) * 1.1;
    let top = if top > 0.0 { top } else { 1.0 };
    (start..end, 0.0..top)
}

/// Grows `bounds` along one axis so it fills a `width` x `height` panel
/// without distortion.
///
/// Geographic degrees of longitude shrink by `cos(latitude)`, so they
/// are scaled down before comparing aspects.
fn fit(bounds: Rect<f64>, (width, height): (u32, u32), crs: Crs) -> (Range<f64>, Range<f64>) {
    let center = bounds.center();
    let x_scale = if crs.is_geographic() {
        center.y.to_radians().cos().max(MIN_SPAN)
    } else {
        1.0
    };
    let span_x = (bounds.width() * x_scale).max(MIN_SPAN);
    let span_y = bounds.height().max(MIN_SPAN);
    let aspect = f64::from(width.max(1)) / f64::from(height.max(1));
    let (span_x, span_y) = if span_x / span_y > aspect {
        (span_x, span_x / aspect)
    } else {
        (span_y * aspect, span_y)
    };
    let half_x = span_x / x_scale / 2.0;
    let half_y = span_y / 2.0;
    (
        center.x - half_x..center.x + half_x,
        center.y - half_y..center.y + half_y,
    )
}

fn color(rgb: Rgb) -> RGBColor {
    RGBColor(rgb.0, rgb.1, rgb.2)
}

fn line_style(style: &LineStyle) -> ShapeStyle {
    ShapeStyle {
        color: color(style.color).mix(style.alpha.clamp(0.0, 1.0)),
        filled: false,
        stroke_width: style.width,
    }
}

fn draw_error<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> TrackError {
    TrackError::Draw(e.to_string())
}
