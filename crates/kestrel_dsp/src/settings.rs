//! Settings Snapshot
//!
//! The flat, immutable view of the EQ parameters that the coefficient
//! factory consumes. A snapshot is taken once per audio block (and once per
//! UI refresh tick) and replaced wholesale, never edited.

use serde::{Deserialize, Serialize};

/// Lowest frequency any band can be tuned to (Hz)
pub const MIN_FREQUENCY: f32 = 20.0;

/// Highest frequency any band can be tuned to (Hz)
pub const MAX_FREQUENCY: f32 = 20000.0;

/// Number of cascaded 2nd-order sections in a cut filter bank
pub const MAX_CUT_STAGES: usize = 4;

/// Steepness of a cut filter
///
/// Each step adds one 2nd-order Butterworth section (12 dB/octave).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Slope {
    #[default]
    Slope12,
    Slope24,
    Slope36,
    Slope48,
}

impl Slope {
    pub const ALL: [Slope; 4] = [Slope::Slope12, Slope::Slope24, Slope::Slope36, Slope::Slope48];

    /// Choice index as stored by the parameter layer (0..=3)
    pub fn index(self) -> usize {
        match self {
            Slope::Slope12 => 0,
            Slope::Slope24 => 1,
            Slope::Slope36 => 2,
            Slope::Slope48 => 3,
        }
    }

    /// Build from a choice index, saturating at the steepest slope
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Slope::Slope12,
            1 => Slope::Slope24,
            2 => Slope::Slope36,
            _ => Slope::Slope48,
        }
    }

    /// Build from the raw float a choice parameter stores
    ///
    /// Rounds to the nearest choice so that a value like `0.9999` read back
    /// from automation still selects 24 dB/oct.
    pub fn from_raw(value: f32) -> Self {
        if value.is_nan() || value <= 0.0 {
            return Slope::Slope12;
        }
        Self::from_index(value.round() as usize)
    }

    /// Number of active cascaded sections for this slope
    #[inline]
    pub fn stages(self) -> usize {
        self.index() + 1
    }

    /// Butterworth order realised by this slope
    #[inline]
    pub fn order(self) -> usize {
        2 * self.stages()
    }

    pub fn db_per_octave(self) -> u32 {
        12 * self.stages() as u32
    }

    /// Display label, e.g. "24 dB/Oct"
    pub fn label(self) -> &'static str {
        match self {
            Slope::Slope12 => "12 dB/Oct",
            Slope::Slope24 => "24 dB/Oct",
            Slope::Slope36 => "36 dB/Oct",
            Slope::Slope48 => "48 dB/Oct",
        }
    }
}

/// One snapshot of every EQ parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainSettings {
    pub low_cut_freq: f32,
    pub high_cut_freq: f32,
    pub peak_freq: f32,
    pub peak_gain_db: f32,
    pub peak_quality: f32,
    pub low_cut_slope: Slope,
    pub high_cut_slope: Slope,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            low_cut_freq: MIN_FREQUENCY,
            high_cut_freq: MAX_FREQUENCY,
            peak_freq: 750.0,
            peak_gain_db: 0.0,
            peak_quality: 1.0,
            low_cut_slope: Slope::Slope12,
            high_cut_slope: Slope::Slope12,
        }
    }
}

impl ChainSettings {
    /// Check the declared parameter ranges
    ///
    /// The audio path never calls this; it trusts the parameter storage.
    /// Useful for debug assertions and for validating restored state.
    pub fn is_within_ranges(&self) -> bool {
        let freq_ok = |f: f32| (MIN_FREQUENCY..=MAX_FREQUENCY).contains(&f);
        freq_ok(self.low_cut_freq)
            && freq_ok(self.high_cut_freq)
            && freq_ok(self.peak_freq)
            && (-24.0..=24.0).contains(&self.peak_gain_db)
            && (0.1..=10.0).contains(&self.peak_quality)
    }
}
