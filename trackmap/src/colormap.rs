//! Elevation to color mapping for the terrain layer.

use plotters::style::RGBColor;

/// Stops of a cividis-like ramp, from low to high.
const CIVIDIS: [(f64, [u8; 3]); 5] = [
    (0.00, [0, 34, 78]),
    (0.25, [64, 77, 108]),
    (0.50, [124, 123, 120]),
    (0.75, [188, 175, 111]),
    (1.00, [254, 232, 56]),
];

/// Color of `value` within `lo..=hi`.
///
/// Values outside the range are clamped; an empty range maps
/// everything to the low end.
pub fn cividis(value: f64, lo: f64, hi: f64) -> RGBColor {
    let t = if hi > lo {
        ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let upper = CIVIDIS
        .iter()
        .position(|(stop, _)| *stop >= t)
        .unwrap_or(CIVIDIS.len() - 1)
        .max(1);
    let (t0, c0) = CIVIDIS[upper - 1];
    let (t1, c1) = CIVIDIS[upper];
    let f = (t - t0) / (t1 - t0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lerp = |a: u8, b: u8| (f64::from(a) + f * (f64::from(b) - f64::from(a))).round() as u8;
    RGBColor(lerp(c0[0], c1[0]), lerp(c0[1], c1[1]), lerp(c0[2], c1[2]))
}

#[cfg(test)]
mod tests {
    use super::cividis;
    use plotters::style::RGBColor;

    #[test]
    fn test_ends_and_clamping() {
        assert_eq!(cividis(0.0, 0.0, 100.0), RGBColor(0, 34, 78));
        assert_eq!(cividis(100.0, 0.0, 100.0), RGBColor(254, 232, 56));
        assert_eq!(cividis(-5.0, 0.0, 100.0), RGBColor(0, 34, 78));
        assert_eq!(cividis(500.0, 0.0, 100.0), RGBColor(254, 232, 56));
        assert_eq!(cividis(7.0, 7.0, 7.0), RGBColor(0, 34, 78));
    }

    #[test]
    fn test_interpolates_between_stops() {
        assert_eq!(cividis(50.0, 0.0, 100.0), RGBColor(124, 123, 120));
        assert_eq!(cividis(12.5, 0.0, 100.0), RGBColor(32, 56, 93));
    }
}
