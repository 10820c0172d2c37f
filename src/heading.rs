use crate::geodesy::{normalize_degrees, signed_angle_diff};

/// Exponential smoothing for compass headings with wrap-around correction.
///
/// The error between a new sample and the current estimate is always taken
/// the short way round the circle, so 359° → 1° moves through 0° instead of
/// sweeping back through 180°.
#[derive(Clone, Debug)]
pub struct HeadingFilter {
    smoothing_factor: f64,
    smoothed: Option<f64>,
    sample_count: u64,
}

impl HeadingFilter {
    /// Create a filter. `smoothing_factor` in (0, 1); smaller = smoother and slower.
    ///
    /// Factors outside the open interval are clamped to its nearest edge and
    /// NaN falls to the low edge. [`NavConfig::validate`](crate::NavConfig::validate)
    /// rejects such factors before they get here; callers building a filter
    /// directly get the clamp.
    pub fn new(smoothing_factor: f64) -> Self {
        let clamped = smoothing_factor.max(f64::EPSILON).min(1.0 - f64::EPSILON);
        if clamped != smoothing_factor {
            log::warn!("Heading smoothing factor {} clamped to {}", smoothing_factor, clamped);
        }
        HeadingFilter {
            smoothing_factor: clamped,
            smoothed: None,
            sample_count: 0,
        }
    }

    /// Feed one raw heading (degrees) and return the smoothed value.
    ///
    /// Non-finite samples are ignored; the previous estimate (if any) is returned.
    pub fn update(&mut self, raw_degrees: f64) -> Option<f64> {
        if !raw_degrees.is_finite() {
            log::debug!("Ignoring non-finite heading sample");
            return self.smoothed;
        }
        let raw = normalize_degrees(raw_degrees);

        let next = match self.smoothed {
            None => raw,
            Some(current) => {
                let diff = signed_angle_diff(current, raw);
                normalize_degrees(current + diff * self.smoothing_factor)
            }
        };

        self.smoothed = Some(next);
        self.sample_count += 1;
        self.smoothed
    }

    /// Current estimate, `None` until the first valid sample.
    pub fn heading(&self) -> Option<f64> {
        self.smoothed
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn reset(&mut self) {
        self.smoothed = None;
        self.sample_count = 0;
    }
}
