//! Parameter Storage
//!
//! The live EQ parameters, shared between the UI thread (writer) and the
//! audio and analysis threads (readers) without locks. Each value is an f32
//! stored as bits in its own `AtomicU32`; there is no cross-parameter
//! atomicity, so a reader may see a mix of old and new values for one block
//! and picks up the rest on the next.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use kestrel_dsp::{ChainSettings, Slope, MAX_FREQUENCY, MIN_FREQUENCY};
use serde::{Deserialize, Serialize};

pub const PARAMETER_COUNT: usize = 7;

/// Identifies one automatable parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterId {
    LowCutFreq,
    HighCutFreq,
    PeakFreq,
    PeakGain,
    PeakQuality,
    LowCutSlope,
    HighCutSlope,
}

impl ParameterId {
    pub const ALL: [ParameterId; PARAMETER_COUNT] = [
        ParameterId::LowCutFreq,
        ParameterId::HighCutFreq,
        ParameterId::PeakFreq,
        ParameterId::PeakGain,
        ParameterId::PeakQuality,
        ParameterId::LowCutSlope,
        ParameterId::HighCutSlope,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Stable string id, also the key in saved state
    pub fn id(self) -> &'static str {
        match self {
            ParameterId::LowCutFreq => "LowCut Freq",
            ParameterId::HighCutFreq => "HighCut Freq",
            ParameterId::PeakFreq => "Peak Freq",
            ParameterId::PeakGain => "Peak Gain",
            ParameterId::PeakQuality => "Peak Quality",
            ParameterId::LowCutSlope => "LowCut Slope",
            ParameterId::HighCutSlope => "HighCut Slope",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.id() == id)
    }

    /// Declared range of the parameter
    pub fn range(self) -> ParameterRange {
        match self {
            // Skew 0.25 spreads the knob travel evenly over the octaves
            ParameterId::LowCutFreq => ParameterRange::new(MIN_FREQUENCY, MAX_FREQUENCY, 1.0, 0.25, MIN_FREQUENCY),
            ParameterId::HighCutFreq => ParameterRange::new(MIN_FREQUENCY, MAX_FREQUENCY, 1.0, 0.25, MAX_FREQUENCY),
            ParameterId::PeakFreq => ParameterRange::new(MIN_FREQUENCY, MAX_FREQUENCY, 1.0, 0.25, 750.0),
            ParameterId::PeakGain => ParameterRange::new(-24.0, 24.0, 0.5, 1.0, 0.0),
            ParameterId::PeakQuality => ParameterRange::new(0.1, 10.0, 0.05, 1.0, 1.0),
            ParameterId::LowCutSlope | ParameterId::HighCutSlope => ParameterRange::new(0.0, 3.0, 1.0, 1.0, 0.0),
        }
    }

    /// Choice labels for the slope parameters, `None` for continuous ones
    pub fn choices(self) -> Option<[&'static str; 4]> {
        match self {
            ParameterId::LowCutSlope | ParameterId::HighCutSlope => Some(Slope::ALL.map(Slope::label)),
            _ => None,
        }
    }
}

/// Range, step and skew of a parameter
///
/// Normalized values in [0, 1] map onto `start..=end` through
/// `start + (end - start) * p^(1/skew)`, then snap to `interval`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterRange {
    pub start: f32,
    pub end: f32,
    pub interval: f32,
    pub skew: f32,
    pub default: f32,
}

impl ParameterRange {
    pub const fn new(start: f32, end: f32, interval: f32, skew: f32, default: f32) -> Self {
        Self {
            start,
            end,
            interval,
            skew,
            default,
        }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.start, self.end)
    }

    /// Nearest legal value on the interval grid
    pub fn snap(&self, value: f32) -> f32 {
        if self.interval > 0.0 {
            let steps = ((value - self.start) / self.interval).round();
            self.clamp(self.start + steps * self.interval)
        } else {
            self.clamp(value)
        }
    }

    pub fn to_normalized(&self, value: f32) -> f32 {
        let proportion = (self.clamp(value) - self.start) / (self.end - self.start);
        if self.skew == 1.0 {
            proportion
        } else {
            proportion.powf(self.skew)
        }
    }

    pub fn from_normalized(&self, normalized: f32) -> f32 {
        let mut proportion = normalized.clamp(0.0, 1.0);
        if self.skew != 1.0 && proportion > 0.0 {
            proportion = (proportion.ln() / self.skew).exp();
        }
        self.snap(self.start + (self.end - self.start) * proportion)
    }
}

/// Single-writer/single-reader "something changed" flag
///
/// Parameter writes only ever set it; the refresh tick test-and-clears it
/// with a compare-and-swap. Any number of writes between two ticks collapse
/// into one redraw.
#[derive(Debug, Default)]
pub struct ChangeLatch {
    flag: AtomicBool,
}

impl ChangeLatch {
    pub fn new(marked: bool) -> Self {
        Self {
            flag: AtomicBool::new(marked),
        }
    }

    #[inline]
    pub fn mark(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Clear the flag, returning whether it was set
    #[inline]
    pub fn consume(&self) -> bool {
        self.flag
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    pub fn is_marked(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Lock-free storage for every EQ parameter
pub struct EqParameters {
    values: [AtomicU32; PARAMETER_COUNT],
    changed: ChangeLatch,
}

impl EqParameters {
    /// All parameters at their defaults, latch set so the first tick draws
    pub fn new() -> Self {
        Self {
            values: core::array::from_fn(|i| AtomicU32::new(ParameterId::ALL[i].range().default.to_bits())),
            changed: ChangeLatch::new(true),
        }
    }

    /// Raw value in the parameter's own units
    ///
    /// # Real-time Safety
    /// A single relaxed atomic load.
    #[inline]
    pub fn get(&self, id: ParameterId) -> f32 {
        f32::from_bits(self.values[id.index()].load(Ordering::Relaxed))
    }

    /// Store a raw value, clamped to the declared range
    ///
    /// Non-finite values are ignored.
    pub fn set(&self, id: ParameterId, value: f32) {
        if !value.is_finite() {
            return;
        }
        let value = id.range().clamp(value);
        self.values[id.index()].store(value.to_bits(), Ordering::Relaxed);
        self.changed.mark();
    }

    /// Store from a host-normalized value in [0, 1]
    pub fn set_normalized(&self, id: ParameterId, normalized: f32) {
        if normalized.is_nan() {
            return;
        }
        self.set(id, id.range().from_normalized(normalized));
    }

    pub fn normalized(&self, id: ParameterId) -> f32 {
        id.range().to_normalized(self.get(id))
    }

    /// Sample every parameter into an immutable snapshot
    #[inline]
    pub fn chain_settings(&self) -> ChainSettings {
        ChainSettings {
            low_cut_freq: self.get(ParameterId::LowCutFreq),
            high_cut_freq: self.get(ParameterId::HighCutFreq),
            peak_freq: self.get(ParameterId::PeakFreq),
            peak_gain_db: self.get(ParameterId::PeakGain),
            peak_quality: self.get(ParameterId::PeakQuality),
            low_cut_slope: Slope::from_raw(self.get(ParameterId::LowCutSlope)),
            high_cut_slope: Slope::from_raw(self.get(ParameterId::HighCutSlope)),
        }
    }

    /// Write a whole snapshot back (e.g. from a preset)
    pub fn apply_settings(&self, settings: &ChainSettings) {
        self.set(ParameterId::LowCutFreq, settings.low_cut_freq);
        self.set(ParameterId::HighCutFreq, settings.high_cut_freq);
        self.set(ParameterId::PeakFreq, settings.peak_freq);
        self.set(ParameterId::PeakGain, settings.peak_gain_db);
        self.set(ParameterId::PeakQuality, settings.peak_quality);
        self.set(ParameterId::LowCutSlope, settings.low_cut_slope.index() as f32);
        self.set(ParameterId::HighCutSlope, settings.high_cut_slope.index() as f32);
    }

    pub fn reset_to_defaults(&self) {
        for id in ParameterId::ALL {
            self.set(id, id.range().default);
        }
    }

    pub fn change_latch(&self) -> &ChangeLatch {
        &self.changed
    }
}

impl Default for EqParameters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_layout() {
        let params = EqParameters::new();
        assert_eq!(params.chain_settings(), ChainSettings::default());
    }

    #[test]
    fn test_ids_roundtrip() {
        for id in ParameterId::ALL {
            assert_eq!(ParameterId::from_id(id.id()), Some(id));
        }
        assert_eq!(ParameterId::from_id("Master Gain"), None);
        assert_eq!(ParameterId::PeakGain.id(), "Peak Gain");
    }

    #[test]
    fn test_set_clamps_to_range() {
        let params = EqParameters::new();
        params.set(ParameterId::PeakGain, 100.0);
        assert_eq!(params.get(ParameterId::PeakGain), 24.0);

        params.set(ParameterId::PeakQuality, 0.0);
        assert_eq!(params.get(ParameterId::PeakQuality), 0.1);

        params.set(ParameterId::LowCutFreq, 5.0);
        assert_eq!(params.get(ParameterId::LowCutFreq), 20.0);
    }

    #[test]
    fn test_non_finite_ignored() {
        let params = EqParameters::new();
        params.set(ParameterId::PeakFreq, f32::NAN);
        params.set(ParameterId::PeakFreq, f32::INFINITY);
        assert_eq!(params.get(ParameterId::PeakFreq), 750.0);
    }

    #[test]
    fn test_normalized_endpoints() {
        for id in ParameterId::ALL {
            let range = id.range();
            assert!((range.from_normalized(0.0) - range.start).abs() < 1e-4, "{id:?}");
            assert!((range.from_normalized(1.0) - range.end).abs() < 1e-4, "{id:?}");
            assert!(range.to_normalized(range.start).abs() < 1e-6);
            assert!((range.to_normalized(range.end) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_frequency_skew() {
        // With skew 0.25 the knob midpoint sits far below the linear midpoint
        let range = ParameterId::PeakFreq.range();
        let mid = range.from_normalized(0.5);
        assert!(mid < 2000.0, "skewed midpoint {mid}");
        assert!((range.to_normalized(mid) - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_snap_to_interval() {
        let gain = ParameterId::PeakGain.range();
        assert_eq!(gain.snap(3.3), 3.5);
        assert_eq!(gain.snap(-30.0), -24.0);

        let quality = ParameterId::PeakQuality.range();
        assert!((quality.snap(1.02) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_set_normalized_slope_choice() {
        let params = EqParameters::new();
        params.set_normalized(ParameterId::LowCutSlope, 1.0);
        assert_eq!(params.chain_settings().low_cut_slope, Slope::Slope48);

        params.set_normalized(ParameterId::LowCutSlope, 0.4);
        assert_eq!(params.chain_settings().low_cut_slope, Slope::Slope24);
    }

    #[test]
    fn test_apply_settings_roundtrip() {
        let params = EqParameters::new();
        let settings = ChainSettings {
            low_cut_freq: 80.0,
            high_cut_freq: 9000.0,
            peak_freq: 2500.0,
            peak_gain_db: -4.5,
            peak_quality: 3.0,
            low_cut_slope: Slope::Slope36,
            high_cut_slope: Slope::Slope24,
        };
        params.apply_settings(&settings);
        assert_eq!(params.chain_settings(), settings);

        params.reset_to_defaults();
        assert_eq!(params.chain_settings(), ChainSettings::default());
    }

    #[test]
    fn test_slope_choices() {
        assert_eq!(
            ParameterId::HighCutSlope.choices(),
            Some(["12 dB/Oct", "24 dB/Oct", "36 dB/Oct", "48 dB/Oct"])
        );
        assert_eq!(ParameterId::PeakGain.choices(), None);
    }

    #[test]
    fn test_latch_test_and_clear() {
        let latch = ChangeLatch::new(false);
        assert!(!latch.consume());

        latch.mark();
        latch.mark();
        assert!(latch.is_marked());
        assert!(latch.consume());
        assert!(!latch.consume(), "Second consume should see a cleared latch");
    }

    #[test]
    fn test_writes_mark_latch() {
        let params = EqParameters::new();
        assert!(params.change_latch().consume(), "Fresh storage starts marked");
        assert!(!params.change_latch().consume());

        params.set(ParameterId::PeakGain, 3.0);
        assert!(params.change_latch().consume());
    }

    #[test]
    fn test_concurrent_writer_and_reader() {
        use std::sync::Arc;

        let params = Arc::new(EqParameters::new());
        let writer = {
            let params = Arc::clone(&params);
            std::thread::spawn(move || {
                for i in 0..10_000 {
                    params.set(ParameterId::PeakFreq, 20.0 + (i % 1000) as f32);
                }
            })
        };

        for _ in 0..10_000 {
            let settings = params.chain_settings();
            assert!(settings.is_within_ranges());
        }
        writer.join().unwrap();
    }
}
