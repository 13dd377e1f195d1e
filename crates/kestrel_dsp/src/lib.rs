//! Kestrel DSP - Digital Signal Processing Module
//!
//! This crate provides the filter math of the Kestrel parametric EQ:
//! - Coefficient factory: peak bell plus Butterworth low/high cut cascades
//! - Filter stages with bypass, grouped into 4-stage cut banks
//! - Per-channel filter chain (LowCut → Peak → HighCut)
//! - FFT magnitude spectra and coefficient-based response curves for display
//!
//! # Architecture
//!
//! The filter chain follows a strict "no allocation in audio callback" rule.
//! Coefficients are plain `Copy` values swapped in between blocks; the only
//! heap buffers (FFT scratch, curve storage) belong to the analysis side.

mod chain;
mod coefficients;
mod cut;
mod error;
mod fft;
mod filter;
mod response;
mod settings;

pub use biquad::Coefficients;
pub use chain::{ChainPosition, ChannelChain};
pub use coefficients::{
    butterworth_q, make_high_cut_filter, make_low_cut_filter, make_peak_filter, Cascade, UNITY_COEFFICIENTS,
};
pub use cut::CutFilter;
pub use error::DspError;
pub use fft::{FftDataGenerator, FftOrder, DEFAULT_FLOOR_DB};
pub use filter::FilterStage;
pub use response::{
    gain_to_db, magnitude_for_frequency, map_from_log10, map_to_log10, remap, spectrum_path, Bounds, DbRange,
    Point, ResponseCurve, RESPONSE_DB_RANGE,
};
pub use settings::{ChainSettings, Slope, MAX_CUT_STAGES, MAX_FREQUENCY, MIN_FREQUENCY};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        // Verify all public types are accessible
        let _settings = ChainSettings::default();
        let _chain = ChannelChain::new();
        let _generator = FftDataGenerator::new(FftOrder::default());
    }
}
