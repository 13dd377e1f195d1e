//! EQ Processor
//!
//! The audio-thread entry point. Owns one [`ChannelChain`] per channel and
//! the producer side of each channel's analyzer FIFO.
//!
//! Every block, `process` snapshots the parameters, runs the coefficient
//! factory once and copies the results into both chains, then filters. The
//! unfiltered input is tapped into the FIFOs first so the spectrum display
//! shows what the EQ receives.

use std::sync::Arc;

use kestrel_dsp::{
    make_high_cut_filter, make_low_cut_filter, make_peak_filter, Cascade, ChainPosition, ChannelChain,
};
use tracing::{debug, info};

use crate::config::{ProcessorConfig, StreamConfig};
use crate::error::EngineResult;
use crate::fifo::{BlockFifo, FifoConsumer, SampleTap};
use crate::message::Channel;
use crate::params::EqParameters;

/// Consumer halves handed to the analysis side by [`EqProcessor::prepare`]
pub struct AnalyzerTaps {
    pub left: FifoConsumer,
    pub right: FifoConsumer,
}

/// Stereo parametric EQ
///
/// # Real-time Safety
/// `process` never allocates, locks or logs. Everything it touches is sized
/// in `prepare`.
pub struct EqProcessor {
    params: Arc<EqParameters>,
    config: ProcessorConfig,
    left: ChannelChain,
    right: ChannelChain,
    taps: Option<[SampleTap; 2]>,
    stream: Option<StreamConfig>,
}

impl EqProcessor {
    pub fn new(params: Arc<EqParameters>) -> Self {
        Self::with_config(params, ProcessorConfig::default())
    }

    pub fn with_config(params: Arc<EqParameters>, config: ProcessorConfig) -> Self {
        Self {
            params,
            config,
            left: ChannelChain::new(),
            right: ChannelChain::new(),
            taps: None,
            stream: None,
        }
    }

    /// Size everything for a stream and return the analyzer taps
    ///
    /// Each FIFO entry is exactly `max_block_size` samples. Calling again
    /// replaces the FIFOs, so consumers from an earlier call go quiet.
    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize) -> EngineResult<AnalyzerTaps> {
        let stream = StreamConfig {
            sample_rate,
            max_block_size,
        };
        stream.validate()?;
        self.config.validate()?;

        self.left.prepare(sample_rate, max_block_size);
        self.right.prepare(sample_rate, max_block_size);

        let (left_producer, left_consumer) = BlockFifo::new(self.config.fifo_capacity, max_block_size);
        let (right_producer, right_consumer) = BlockFifo::new(self.config.fifo_capacity, max_block_size);
        self.taps = Some([SampleTap::new(left_producer), SampleTap::new(right_producer)]);
        self.stream = Some(stream);

        self.update_filters();

        info!(
            "EQ prepared: {} Hz, {} samples/block ({:.1} ms), FIFO capacity {}",
            sample_rate,
            max_block_size,
            stream.latency_ms(),
            self.config.fifo_capacity
        );

        Ok(AnalyzerTaps {
            left: left_consumer,
            right: right_consumer,
        })
    }

    /// Filter one stereo block in place
    ///
    /// Must follow a successful `prepare`; otherwise a debug build asserts
    /// and a release build leaves the audio untouched.
    ///
    /// # Real-time Safety
    /// Atomic loads, coefficient math on the stack and sample copies only.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        debug_assert!(self.is_prepared(), "EqProcessor::process called before prepare");
        if !self.is_prepared() {
            return;
        }

        self.update_filters();

        if let Some([left_tap, right_tap]) = self.taps.as_mut() {
            left_tap.push_samples(left);
            right_tap.push_samples(right);
        }

        self.left.process(left);
        self.right.process(right);
    }

    /// Load the current parameters into both chains
    ///
    /// A band that cannot be designed at this sample rate keeps its previous
    /// coefficients.
    fn update_filters(&mut self) {
        let settings = self.params.chain_settings();
        let sample_rate = self.sample_rate();

        if let Ok(cascade) = make_low_cut_filter(&settings, sample_rate) {
            for chain in [&mut self.left, &mut self.right] {
                chain.update_low_cut(&cascade, settings.low_cut_slope);
            }
        }
        if let Ok(peak) = make_peak_filter(&settings, sample_rate) {
            for chain in [&mut self.left, &mut self.right] {
                chain.update_peak(peak);
            }
        }
        if let Ok(cascade) = make_high_cut_filter(&settings, sample_rate) {
            for chain in [&mut self.left, &mut self.right] {
                chain.update_high_cut(&cascade, settings.high_cut_slope);
            }
        }
    }

    /// Coefficients currently loaded at `position`
    ///
    /// Both chains always hold the same values; the left one is reported.
    pub fn filtered_coefficients(&self, position: ChainPosition) -> Cascade {
        self.left.coefficients(position)
    }

    pub fn chain(&self, channel: Channel) -> &ChannelChain {
        match channel {
            Channel::Left => &self.left,
            Channel::Right => &self.right,
        }
    }

    /// Prepared sample rate, 0 before `prepare`
    pub fn sample_rate(&self) -> f32 {
        self.stream.map_or(0.0, |s| s.sample_rate)
    }

    pub fn stream_config(&self) -> Option<StreamConfig> {
        self.stream
    }

    pub fn is_prepared(&self) -> bool {
        self.stream.is_some()
    }

    pub fn parameters(&self) -> &Arc<EqParameters> {
        &self.params
    }

    /// Clear filter state and any partially filled analyzer block
    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
        if let Some(taps) = self.taps.as_mut() {
            for tap in taps {
                tap.clear();
            }
        }
    }

    /// Drop the stream resources; `prepare` must be called again
    pub fn release(&mut self) {
        self.left.reset();
        self.right.reset();
        self.taps = None;
        self.stream = None;
        debug!("EQ released");
    }

    pub fn save_state(&self) -> EngineResult<Vec<u8>> {
        self.params.save_state()
    }

    pub fn restore_state(&self, data: &[u8]) -> EngineResult<()> {
        self.params.restore_state(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::params::ParameterId;
    use kestrel_dsp::Slope;

    const SAMPLE_RATE: f32 = 48000.0;
    const BLOCK: usize = 512;

    fn sine(freq: f32, len: usize, offset: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * (i + offset) as f32 / SAMPLE_RATE).sin())
            .collect()
    }

    /// Run a sine through both channels and return the steady-state peak
    fn measure_peak(processor: &mut EqProcessor, freq: f32) -> f32 {
        let mut peak = 0.0_f32;
        for block in 0..40 {
            let mut left = sine(freq, BLOCK, block * BLOCK);
            let mut right = left.clone();
            processor.process(&mut left, &mut right);
            if block >= 20 {
                peak = left.iter().fold(peak, |p, s| p.max(s.abs()));
            }
        }
        peak
    }

    fn prepared(params: Arc<EqParameters>) -> (EqProcessor, AnalyzerTaps) {
        let mut processor = EqProcessor::new(params);
        let taps = processor.prepare(SAMPLE_RATE, BLOCK).unwrap();
        (processor, taps)
    }

    #[test]
    fn test_prepare_rejects_bad_stream() {
        let mut processor = EqProcessor::new(Arc::new(EqParameters::new()));
        assert!(matches!(processor.prepare(0.0, BLOCK), Err(EngineError::InvalidConfig(_))));
        assert!(matches!(processor.prepare(SAMPLE_RATE, 0), Err(EngineError::InvalidConfig(_))));
        assert!(!processor.is_prepared());
    }

    #[test]
    fn test_prepare_rejects_zero_fifo_capacity() {
        let params = Arc::new(EqParameters::new());
        let mut processor = EqProcessor::with_config(params, ProcessorConfig { fifo_capacity: 0 });
        assert!(processor.prepare(SAMPLE_RATE, BLOCK).is_err());
    }

    #[test]
    fn test_default_settings_are_near_unity() {
        let (mut processor, _taps) = prepared(Arc::new(EqParameters::new()));
        let peak = measure_peak(&mut processor, 1000.0);
        assert!((peak - 1.0).abs() < 0.02, "Expected ~unity at 1kHz, got {}", peak);
    }

    #[test]
    fn test_peak_boost_applies_to_both_channels() {
        let params = Arc::new(EqParameters::new());
        params.set(ParameterId::PeakFreq, 1000.0);
        params.set(ParameterId::PeakGain, 12.0);
        let (mut processor, _taps) = prepared(params);

        let mut left_peak = 0.0_f32;
        let mut right_peak = 0.0_f32;
        for block in 0..40 {
            let mut left = sine(1000.0, BLOCK, block * BLOCK);
            let mut right = left.clone();
            processor.process(&mut left, &mut right);
            if block >= 20 {
                left_peak = left.iter().fold(left_peak, |p, s| p.max(s.abs()));
                right_peak = right.iter().fold(right_peak, |p, s| p.max(s.abs()));
            }
        }

        // +12 dB is ~3.98x
        assert!((left_peak - 3.98).abs() < 0.1, "left peak {}", left_peak);
        assert!((right_peak - left_peak).abs() < 1e-4);
    }

    #[test]
    fn test_parameter_change_reaches_next_block() {
        let (mut processor, _taps) = prepared(Arc::new(EqParameters::new()));
        let before = processor.filtered_coefficients(ChainPosition::Peak);

        processor.parameters().set(ParameterId::PeakGain, 6.0);
        let mut left = vec![0.0; BLOCK];
        let mut right = vec![0.0; BLOCK];
        processor.process(&mut left, &mut right);

        let after = processor.filtered_coefficients(ChainPosition::Peak);
        assert_ne!(before.as_slice()[0].b0, after.as_slice()[0].b0);
    }

    #[test]
    fn test_slope_change_reaches_next_block() {
        let (mut processor, _taps) = prepared(Arc::new(EqParameters::new()));
        assert_eq!(processor.filtered_coefficients(ChainPosition::LowCut).len(), 1);

        processor
            .parameters()
            .set(ParameterId::LowCutSlope, Slope::Slope48.index() as f32);
        let mut left = vec![0.0; BLOCK];
        let mut right = vec![0.0; BLOCK];
        processor.process(&mut left, &mut right);

        assert_eq!(processor.filtered_coefficients(ChainPosition::LowCut).len(), 4);
        assert_eq!(processor.chain(Channel::Right).low_cut().active_stages(), 4);
    }

    #[test]
    fn test_taps_receive_unfiltered_input() {
        let params = Arc::new(EqParameters::new());
        params.set(ParameterId::PeakGain, 24.0);
        let (mut processor, mut taps) = prepared(params);

        let input = sine(750.0, BLOCK, 0);
        let mut left = input.clone();
        let mut right = vec![0.0; BLOCK];
        processor.process(&mut left, &mut right);

        let mut out = vec![0.0; BLOCK];
        assert!(taps.left.pull(&mut out));
        assert_eq!(out, input);
        assert!(taps.right.pull(&mut out));
        assert!(out.iter().all(|&s| s == 0.0));
        assert!(!taps.left.pull(&mut out));
    }

    #[test]
    fn test_short_blocks_accumulate_in_taps() {
        let (mut processor, mut taps) = prepared(Arc::new(EqParameters::new()));

        for _ in 0..3 {
            let mut left = vec![0.5; BLOCK / 2];
            let mut right = vec![0.5; BLOCK / 2];
            processor.process(&mut left, &mut right);
        }

        assert_eq!(taps.left.num_available_for_reading(), 1);
        let mut out = vec![0.0; BLOCK];
        assert!(taps.left.pull(&mut out));
        assert!(out.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_silent_blocks_fill_fifo() {
        let (mut processor, mut taps) = prepared(Arc::new(EqParameters::new()));
        for _ in 0..3 {
            let mut left = vec![0.0; BLOCK];
            let mut right = vec![0.0; BLOCK];
            processor.process(&mut left, &mut right);
            assert!(left.iter().all(|&s| s == 0.0));
        }

        let mut out = vec![1.0; BLOCK];
        for _ in 0..3 {
            assert!(taps.right.pull(&mut out));
            assert!(out.iter().all(|&s| s == 0.0));
        }
        assert!(!taps.right.pull(&mut out));
    }

    #[test]
    fn test_channels_keep_independent_state() {
        let (mut processor, _taps) = prepared(Arc::new(EqParameters::new()));
        let mut left = sine(200.0, BLOCK, 0);
        let mut right = vec![0.0; BLOCK];
        processor.process(&mut left, &mut right);
        assert!(right.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_low_sample_rate_keeps_output_finite() {
        let params = Arc::new(EqParameters::new());
        let mut processor = EqProcessor::new(params);
        // 20 kHz high cut cannot be designed at 32 kHz
        processor.prepare(32000.0, 256).unwrap();

        let mut left = vec![0.25; 256];
        let mut right = vec![-0.25; 256];
        processor.process(&mut left, &mut right);
        assert!(left.iter().chain(&right).all(|s| s.is_finite()));
        assert_eq!(processor.filtered_coefficients(ChainPosition::Peak).len(), 1);
    }

    #[test]
    fn test_release_requires_prepare_again() {
        let (mut processor, _taps) = prepared(Arc::new(EqParameters::new()));
        processor.release();
        assert!(!processor.is_prepared());
        assert_eq!(processor.sample_rate(), 0.0);
        assert!(processor.prepare(SAMPLE_RATE, BLOCK).is_ok());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "before prepare")]
    fn test_process_before_prepare_asserts() {
        let mut processor = EqProcessor::new(Arc::new(EqParameters::new()));
        let mut left = vec![0.0; 16];
        let mut right = vec![0.0; 16];
        processor.process(&mut left, &mut right);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_process_before_prepare_passes_through() {
        let mut processor = EqProcessor::new(Arc::new(EqParameters::new()));
        let mut left = vec![0.3; 16];
        let mut right = vec![-0.3; 16];
        processor.process(&mut left, &mut right);
        assert!(left.iter().all(|&s| s == 0.3));
        assert!(right.iter().all(|&s| s == -0.3));
    }

    #[test]
    fn test_state_roundtrip_through_processor() {
        let params = Arc::new(EqParameters::new());
        params.set(ParameterId::HighCutFreq, 8000.0);
        let processor = EqProcessor::new(Arc::clone(&params));
        let blob = processor.save_state().unwrap();

        params.reset_to_defaults();
        processor.restore_state(&blob).unwrap();
        assert_eq!(params.get(ParameterId::HighCutFreq), 8000.0);
    }
}
