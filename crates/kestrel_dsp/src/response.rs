//! Response Curve and Display Mapping
//!
//! Evaluates the filter chain's magnitude response straight from its
//! coefficients (no FFT involved) and maps both that curve and analyzer
//! spectra into display coordinates: log-frequency on x, linear dB on y.

use biquad::Coefficients;
use rustfft::num_complex::Complex;

use crate::chain::ChannelChain;
use crate::settings::{MAX_FREQUENCY, MIN_FREQUENCY};

/// Vertical range of the response overlay (dB)
pub const RESPONSE_DB_RANGE: DbRange = DbRange { min: -24.0, max: 24.0 };

/// Linear magnitude of one biquad section at `frequency`
///
/// Evaluates H(z) = (b0 + b1·z⁻¹ + b2·z⁻²) / (1 + a1·z⁻¹ + a2·z⁻²)
/// at z = e^(jω), ω = 2πf/fs, in double precision.
pub fn magnitude_for_frequency(coefficients: &Coefficients<f32>, frequency: f64, sample_rate: f64) -> f64 {
    let omega = 2.0 * std::f64::consts::PI * frequency / sample_rate;
    let z1 = Complex::from_polar(1.0, -omega);
    let z2 = z1 * z1;

    let numerator = z1 * coefficients.b1 as f64 + z2 * coefficients.b2 as f64 + coefficients.b0 as f64;
    let denominator = z1 * coefficients.a1 as f64 + z2 * coefficients.a2 as f64 + 1.0;

    numerator.norm() / denominator.norm()
}

/// `20·log10(gain)`, floored at `minus_infinity_db`
#[inline]
pub fn gain_to_db(gain: f64, minus_infinity_db: f64) -> f64 {
    if gain > 0.0 {
        (20.0 * gain.log10()).max(minus_infinity_db)
    } else {
        minus_infinity_db
    }
}

/// Map a proportion in [0, 1] onto a logarithmic range
#[inline]
pub fn map_to_log10(proportion: f64, min: f64, max: f64) -> f64 {
    min * (max / min).powf(proportion)
}

/// Inverse of [`map_to_log10`]
#[inline]
pub fn map_from_log10(value: f64, min: f64, max: f64) -> f64 {
    (value / min).ln() / (max / min).ln()
}

/// Linear remap of `value` from one range to another
#[inline]
pub fn remap(value: f64, source_min: f64, source_max: f64, target_min: f64, target_max: f64) -> f64 {
    target_min + (value - source_min) * (target_max - target_min) / (source_max - source_min)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Display rectangle; y grows downwards as in screen space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DbRange {
    pub min: f64,
    pub max: f64,
}

impl DbRange {
    /// y coordinate for `db`: `min` at the bottom edge, `max` at the top
    pub fn to_y(&self, db: f64, bounds: &Bounds) -> f32 {
        remap(db, self.min, self.max, bounds.bottom() as f64, bounds.y as f64) as f32
    }
}

/// Magnitude response of a chain sampled once per pixel column
#[derive(Debug, Clone, Default)]
pub struct ResponseCurve {
    magnitudes_db: Vec<f64>,
}

impl ResponseCurve {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column `i` of `width` evaluates at `map_to_log10(i / width, 20, 20000)`
    pub fn column_frequency(column: usize, width: usize) -> f64 {
        map_to_log10(
            column as f64 / width as f64,
            MIN_FREQUENCY as f64,
            MAX_FREQUENCY as f64,
        )
    }

    /// Re-evaluate the curve for `chain`, reusing the existing buffer
    pub fn compute(&mut self, chain: &ChannelChain, sample_rate: f32, width: usize) {
        self.magnitudes_db.clear();
        self.magnitudes_db.extend((0..width).map(|column| {
            let freq = Self::column_frequency(column, width);
            gain_to_db(chain.magnitude_for_frequency(freq, sample_rate as f64), -200.0)
        }));
    }

    pub fn magnitudes_db(&self) -> &[f64] {
        &self.magnitudes_db
    }

    pub fn width(&self) -> usize {
        self.magnitudes_db.len()
    }

    /// One point per column, stretched across `bounds`
    pub fn to_path(&self, bounds: &Bounds, range: DbRange) -> Vec<Point> {
        let width = self.magnitudes_db.len().max(1) as f32;
        self.magnitudes_db
            .iter()
            .enumerate()
            .map(|(i, &db)| Point {
                x: bounds.x + bounds.width * i as f32 / width,
                y: range.to_y(db, bounds),
            })
            .collect()
    }
}

/// Turn one analyzer magnitude vector into display points
///
/// `magnitudes_db[bin]` is the level of bin `bin`, `bin_width` Hz apart.
/// Bins outside [20, 20000] Hz and non-finite levels are skipped. The y
/// axis spans [`floor_db`, 0].
pub fn spectrum_path(magnitudes_db: &[f32], bin_width: f32, bounds: &Bounds, floor_db: f32) -> Vec<Point> {
    let range = DbRange {
        min: floor_db as f64,
        max: 0.0,
    };

    magnitudes_db
        .iter()
        .enumerate()
        .skip(1)
        .filter_map(|(bin, &db)| {
            let freq = bin as f32 * bin_width;
            if !db.is_finite() || !(MIN_FREQUENCY..=MAX_FREQUENCY).contains(&freq) {
                return None;
            }
            let normalized_x = map_from_log10(freq as f64, MIN_FREQUENCY as f64, MAX_FREQUENCY as f64);
            Some(Point {
                x: bounds.x + (normalized_x as f32 * bounds.width).floor(),
                y: range.to_y(db as f64, bounds),
            })
        })
        .collect()
}
