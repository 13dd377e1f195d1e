//! Coefficient Factory
//!
//! Turns a [`ChainSettings`] snapshot and a sample rate into biquad
//! coefficients for every band. Based on the RBJ (Robert Bristow-Johnson)
//! Audio EQ Cookbook; the cut filters are Butterworth designs factored into
//! cascaded 2nd-order sections.
//!
//! Every function here is pure: identical inputs give bit-identical output.
//! Inputs are assumed to be inside the parameter ranges and are not clamped.

use biquad::{Coefficients, ToHertz, Type};

use crate::error::DspError;
use crate::settings::{ChainSettings, Slope, MAX_CUT_STAGES};

/// Pass-through section (b0 = 1, everything else 0)
pub const UNITY_COEFFICIENTS: Coefficients<f32> = Coefficients {
    a1: 0.0,
    a2: 0.0,
    b0: 1.0,
    b1: 0.0,
    b2: 0.0,
};

/// Up to [`MAX_CUT_STAGES`] coefficient sets, stored inline
///
/// Used for the section list of a Butterworth cascade and for handing the
/// active coefficients of any chain position to a reader. Never allocates.
#[derive(Clone, Copy)]
pub struct Cascade {
    sections: [Coefficients<f32>; MAX_CUT_STAGES],
    len: usize,
}

impl Cascade {
    pub const fn empty() -> Self {
        Self {
            sections: [UNITY_COEFFICIENTS; MAX_CUT_STAGES],
            len: 0,
        }
    }

    pub fn single(coefficients: Coefficients<f32>) -> Self {
        let mut cascade = Self::empty();
        cascade.push(coefficients);
        cascade
    }

    /// Append a section; extra sections beyond capacity are ignored
    pub(crate) fn push(&mut self, coefficients: Coefficients<f32>) {
        debug_assert!(self.len < MAX_CUT_STAGES, "Cascade holds at most {MAX_CUT_STAGES} sections");
        if self.len < MAX_CUT_STAGES {
            self.sections[self.len] = coefficients;
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[Coefficients<f32>] {
        &self.sections[..self.len]
    }

    pub fn get(&self, index: usize) -> Option<&Coefficients<f32>> {
        self.as_slice().get(index)
    }

    /// Linear magnitude of all sections in series at `frequency`
    ///
    /// An empty cascade is a pass-through and reports unity gain.
    pub fn magnitude_for_frequency(&self, frequency: f64, sample_rate: f64) -> f64 {
        self.as_slice()
            .iter()
            .map(|c| crate::response::magnitude_for_frequency(c, frequency, sample_rate))
            .product()
    }
}

impl Default for Cascade {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for Cascade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

/// Q of one 2nd-order section of an even-order Butterworth filter
///
/// Section `k` of an order-`n` design sits on the pole pair at angle
/// `π(2k+1)/(2n)` from the negative real axis, giving `Q = 1 / (2 cos θ)`.
/// For `n = 2` this is the familiar 0.7071.
pub fn butterworth_q(order: usize, section: usize) -> f32 {
    debug_assert!(order >= 2 && order % 2 == 0, "Butterworth cascade needs an even order");
    let angle = std::f64::consts::PI * (2 * section + 1) as f64 / (2 * order) as f64;
    (1.0 / (2.0 * angle.cos())) as f32
}

fn check_sample_rate(sample_rate: f32) -> Result<(), DspError> {
    if sample_rate > 0.0 && sample_rate.is_finite() {
        Ok(())
    } else {
        Err(DspError::InvalidSampleRate(sample_rate))
    }
}

/// Peak (bell) filter for the mid band
pub fn make_peak_filter(
    settings: &ChainSettings,
    sample_rate: f32,
) -> Result<Coefficients<f32>, DspError> {
    check_sample_rate(sample_rate)?;

    // The crate derives the linear gain itself (A = 10^(dB/40), i.e. the
    // square root of 10^(dB/20)), so it is handed the dB value.
    Coefficients::<f32>::from_params(
        Type::PeakingEQ(settings.peak_gain_db),
        sample_rate.hz(),
        settings.peak_freq.hz(),
        settings.peak_quality,
    )
    .map_err(|_| DspError::InvalidCoefficients {
        frequency: settings.peak_freq,
        sample_rate,
    })
}

#[derive(Clone, Copy)]
enum CutKind {
    HighPass,
    LowPass,
}

fn butterworth_cascade(
    kind: CutKind,
    frequency: f32,
    sample_rate: f32,
    slope: Slope,
) -> Result<Cascade, DspError> {
    check_sample_rate(sample_rate)?;

    let order = slope.order();
    let mut cascade = Cascade::empty();

    for section in 0..slope.stages() {
        let filter_type = match kind {
            CutKind::HighPass => Type::HighPass,
            CutKind::LowPass => Type::LowPass,
        };
        let coeffs = Coefficients::<f32>::from_params(
            filter_type,
            sample_rate.hz(),
            frequency.hz(),
            butterworth_q(order, section),
        )
        .map_err(|_| DspError::InvalidCoefficients {
            frequency,
            sample_rate,
        })?;
        cascade.push(coeffs);
    }

    Ok(cascade)
}

/// Butterworth highpass at `low_cut_freq`, one section per active stage
pub fn make_low_cut_filter(settings: &ChainSettings, sample_rate: f32) -> Result<Cascade, DspError> {
    butterworth_cascade(
        CutKind::HighPass,
        settings.low_cut_freq,
        sample_rate,
        settings.low_cut_slope,
    )
}

/// Butterworth lowpass at `high_cut_freq`, one section per active stage
pub fn make_high_cut_filter(settings: &ChainSettings, sample_rate: f32) -> Result<Cascade, DspError> {
    butterworth_cascade(
        CutKind::LowPass,
        settings.high_cut_freq,
        sample_rate,
        settings.high_cut_slope,
    )
}
