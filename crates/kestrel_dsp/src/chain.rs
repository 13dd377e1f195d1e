//! Channel Chain
//!
//! The full per-channel pipeline: LowCut bank → Peak stage → HighCut bank.
//! Topology is fixed; only coefficients and bypass flags change at runtime.

use biquad::Coefficients;
use serde::{Deserialize, Serialize};

use crate::coefficients::{make_high_cut_filter, make_low_cut_filter, make_peak_filter, Cascade};
use crate::cut::CutFilter;
use crate::error::DspError;
use crate::filter::FilterStage;
use crate::settings::{ChainSettings, Slope};

/// Position of a band within a [`ChannelChain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainPosition {
    LowCut,
    Peak,
    HighCut,
}

impl ChainPosition {
    pub const ALL: [ChainPosition; 3] = [ChainPosition::LowCut, ChainPosition::Peak, ChainPosition::HighCut];

    /// Position in processing order, matching [`ChainPosition::ALL`]
    pub const fn index(self) -> usize {
        match self {
            ChainPosition::LowCut => 0,
            ChainPosition::Peak => 1,
            ChainPosition::HighCut => 2,
        }
    }
}

/// One channel's filter pipeline
///
/// The audio thread owns one of these per channel. A display copy can be
/// kept on the UI side and configured from the same snapshot; the factory is
/// deterministic, so it ends up with bit-identical coefficients.
pub struct ChannelChain {
    low_cut: CutFilter,
    peak: FilterStage,
    high_cut: CutFilter,
    sample_rate: f32,
    max_block_size: usize,
}

impl ChannelChain {
    pub fn new() -> Self {
        Self {
            low_cut: CutFilter::new(),
            peak: FilterStage::passthrough(),
            high_cut: CutFilter::new(),
            sample_rate: 0.0,
            max_block_size: 0,
        }
    }

    /// Size the chain for a stream and clear all filter state
    ///
    /// Biquads carry no per-block buffers, so nothing is allocated here; the
    /// block size is recorded so oversize blocks trip a debug assertion.
    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize) {
        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;
        self.reset();
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    #[inline]
    pub fn update_peak(&mut self, coefficients: Coefficients<f32>) {
        self.peak.set_coefficients(coefficients);
        self.peak.set_bypassed(false);
    }

    #[inline]
    pub fn update_low_cut(&mut self, cascade: &Cascade, slope: Slope) {
        self.low_cut.update(cascade, slope);
    }

    #[inline]
    pub fn update_high_cut(&mut self, cascade: &Cascade, slope: Slope) {
        self.high_cut.update(cascade, slope);
    }

    /// Run the coefficient factory and load every band
    ///
    /// Bands are independent: one that cannot be designed (e.g. a cutoff
    /// above Nyquist at a low host rate) keeps its previous coefficients
    /// while the others are still updated. The first failure is returned.
    pub fn configure(&mut self, settings: &ChainSettings, sample_rate: f32) -> Result<(), DspError> {
        let mut first_error = None;

        match make_low_cut_filter(settings, sample_rate) {
            Ok(cascade) => self.update_low_cut(&cascade, settings.low_cut_slope),
            Err(e) => first_error = first_error.or(Some(e)),
        }
        match make_peak_filter(settings, sample_rate) {
            Ok(coefficients) => self.update_peak(coefficients),
            Err(e) => first_error = first_error.or(Some(e)),
        }
        match make_high_cut_filter(settings, sample_rate) {
            Ok(cascade) => self.update_high_cut(&cascade, settings.high_cut_slope),
            Err(e) => first_error = first_error.or(Some(e)),
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Filter one block in place
    ///
    /// # Real-time Safety
    /// No allocations. O(block length × active stages); bypassed stages
    /// cost a single flag check.
    #[inline]
    pub fn process(&mut self, block: &mut [f32]) {
        debug_assert!(
            self.max_block_size == 0 || block.len() <= self.max_block_size,
            "Block of {} samples exceeds prepared maximum {}",
            block.len(),
            self.max_block_size
        );

        self.low_cut.process_block(block);
        self.peak.process_block(block);
        self.high_cut.process_block(block);
    }

    /// Clear every delay line
    pub fn reset(&mut self) {
        self.low_cut.reset();
        self.peak.reset();
        self.high_cut.reset();
    }

    pub fn low_cut(&self) -> &CutFilter {
        &self.low_cut
    }

    pub fn peak(&self) -> &FilterStage {
        &self.peak
    }

    pub fn high_cut(&self) -> &CutFilter {
        &self.high_cut
    }

    pub fn is_bypassed(&self, position: ChainPosition) -> bool {
        match position {
            ChainPosition::LowCut => self.low_cut.active_stages() == 0,
            ChainPosition::Peak => self.peak.is_bypassed(),
            ChainPosition::HighCut => self.high_cut.active_stages() == 0,
        }
    }

    /// Active coefficients at `position`, empty when fully bypassed
    pub fn coefficients(&self, position: ChainPosition) -> Cascade {
        match position {
            ChainPosition::LowCut => self.low_cut.active_coefficients(),
            ChainPosition::Peak if self.peak.is_bypassed() => Cascade::empty(),
            ChainPosition::Peak => Cascade::single(*self.peak.coefficients()),
            ChainPosition::HighCut => self.high_cut.active_coefficients(),
        }
    }

    /// Linear magnitude of the whole chain at `frequency`
    ///
    /// Magnitudes multiply; convert to dB only after the product.
    pub fn magnitude_for_frequency(&self, frequency: f64, sample_rate: f64) -> f64 {
        let mut magnitude = 1.0;
        if !self.peak.is_bypassed() {
            magnitude *= self.peak.magnitude_for_frequency(frequency, sample_rate);
        }
        magnitude *= self.low_cut.magnitude_for_frequency(frequency, sample_rate);
        magnitude *= self.high_cut.magnitude_for_frequency(frequency, sample_rate);
        magnitude
    }
}

impl Default for ChannelChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_db(linear: f64) -> f64 {
        20.0 * linear.log10()
    }

    fn configured(settings: &ChainSettings, sample_rate: f32) -> ChannelChain {
        let mut chain = ChannelChain::new();
        chain.prepare(sample_rate, 512);
        chain.configure(settings, sample_rate).unwrap();
        chain
    }

    #[test]
    fn test_position_index_follows_processing_order() {
        for (i, position) in ChainPosition::ALL.into_iter().enumerate() {
            assert_eq!(position.index(), i);
        }
    }

    #[test]
    fn test_new_chain_is_passthrough() {
        let mut chain = ChannelChain::new();
        chain.prepare(48000.0, 4);
        for position in ChainPosition::ALL {
            assert!(chain.is_bypassed(position));
            assert!(chain.coefficients(position).is_empty());
        }

        let mut block = vec![0.1, 0.2, -0.3, 0.4];
        chain.process(&mut block);
        assert_eq!(block, vec![0.1, 0.2, -0.3, 0.4]);
    }

    #[test]
    fn test_silence_for_every_slope_combination() {
        for low in Slope::ALL {
            for high in Slope::ALL {
                let settings = ChainSettings {
                    low_cut_freq: 60.0,
                    high_cut_freq: 12000.0,
                    peak_gain_db: 18.0,
                    peak_quality: 4.0,
                    low_cut_slope: low,
                    high_cut_slope: high,
                    ..Default::default()
                };
                let mut chain = configured(&settings, 48000.0);
                let mut block = vec![0.0_f32; 512];
                chain.process(&mut block);
                assert!(block.iter().all(|&s| s == 0.0), "{low:?}/{high:?} injected energy");
            }
        }
    }

    #[test]
    fn test_end_to_end_response_scenario() {
        let settings = ChainSettings {
            low_cut_freq: 20.0,
            high_cut_freq: 20000.0,
            peak_freq: 1000.0,
            peak_gain_db: 6.0,
            peak_quality: 1.0,
            low_cut_slope: Slope::Slope12,
            high_cut_slope: Slope::Slope12,
        };
        let chain = configured(&settings, 48000.0);

        let at_peak = to_db(chain.magnitude_for_frequency(1000.0, 48000.0));
        assert!((at_peak - 6.0).abs() < 0.2, "1 kHz should read +6 dB, got {at_peak}");

        // Each cut sits on its own corner: the Butterworth half-power point,
        // and nothing steeper than that
        let at_low = to_db(chain.magnitude_for_frequency(20.0, 48000.0));
        let at_high = to_db(chain.magnitude_for_frequency(20000.0, 48000.0));
        assert!(at_low > -3.5 && at_low < 0.5, "20 Hz read {at_low}");
        assert!(at_high > -3.5 && at_high < 0.5, "20 kHz read {at_high}");
    }

    #[test]
    fn test_flat_settings_are_flat_in_the_passband() {
        let chain = configured(&ChainSettings::default(), 48000.0);
        for freq in [100.0, 500.0, 1000.0, 4000.0, 8000.0] {
            let db = to_db(chain.magnitude_for_frequency(freq, 48000.0));
            assert!(db.abs() < 0.1, "{freq} Hz read {db}");
        }
    }

    #[test]
    fn test_configure_keeps_good_bands_on_failure() {
        // At 32 kHz the 20 kHz high cut cannot be designed
        let settings = ChainSettings {
            peak_freq: 1000.0,
            peak_gain_db: 6.0,
            ..Default::default()
        };
        let mut chain = ChannelChain::new();
        chain.prepare(32000.0, 512);
        let result = chain.configure(&settings, 32000.0);

        assert!(matches!(result, Err(DspError::InvalidCoefficients { .. })));
        assert!(!chain.is_bypassed(ChainPosition::Peak));
        assert!(!chain.is_bypassed(ChainPosition::LowCut));
        assert!(chain.is_bypassed(ChainPosition::HighCut));
    }

    #[test]
    fn test_coefficients_accessor() {
        let settings = ChainSettings {
            low_cut_slope: Slope::Slope24,
            high_cut_slope: Slope::Slope48,
            ..Default::default()
        };
        let chain = configured(&settings, 44100.0);
        assert_eq!(chain.coefficients(ChainPosition::LowCut).len(), 2);
        assert_eq!(chain.coefficients(ChainPosition::Peak).len(), 1);
        assert_eq!(chain.coefficients(ChainPosition::HighCut).len(), 4);
    }

    #[test]
    fn test_boost_increases_amplitude() {
        let settings = ChainSettings {
            peak_freq: 1000.0,
            peak_gain_db: 12.0,
            ..Default::default()
        };
        let mut chain = configured(&settings, 48000.0);

        // 480 samples is exactly 10 cycles, so consecutive blocks join seamlessly
        let source: Vec<f32> = (0..480)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / 48000.0).sin() * 0.25)
            .collect();
        let max_input = source.iter().fold(0.0_f32, |m, s| m.max(s.abs()));

        let mut block = source.clone();
        for _ in 0..5 {
            block.copy_from_slice(&source);
            chain.process(&mut block);
        }
        let max_output = block.iter().fold(0.0_f32, |m, s| m.max(s.abs()));

        assert!(max_output > max_input * 2.0, "Boost should increase amplitude");
    }

    #[test]
    fn test_prepare_resets_state() {
        let settings = ChainSettings {
            peak_gain_db: 12.0,
            ..Default::default()
        };
        let mut chain = configured(&settings, 48000.0);
        let mut block = vec![1.0_f32; 64];
        chain.process(&mut block);

        chain.prepare(48000.0, 512);
        let mut silent = vec![0.0_f32; 64];
        chain.process(&mut silent);
        assert!(silent.iter().all(|&s| s == 0.0));
    }
}
