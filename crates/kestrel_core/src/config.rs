//! Stream, Processor and Analyzer Configuration

use kestrel_dsp::{FftOrder, DEFAULT_FLOOR_DB};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// What the host hands to `prepare`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Sample rate in Hz (e.g., 44100, 48000, 96000)
    pub sample_rate: f32,

    /// Largest block the host will pass to `process`, in samples per channel
    pub max_block_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            max_block_size: 512,
        }
    }
}

impl StreamConfig {
    /// Calculate latency in milliseconds of one full block
    pub fn latency_ms(&self) -> f32 {
        (self.max_block_size as f32 / self.sample_rate) * 1000.0
    }

    /// Validate configuration
    pub fn validate(&self) -> EngineResult<()> {
        if !(8000.0..=384000.0).contains(&self.sample_rate) {
            return Err(EngineError::InvalidConfig(format!(
                "Invalid sample rate: {}",
                self.sample_rate
            )));
        }
        if self.max_block_size == 0 || self.max_block_size > 16384 {
            return Err(EngineError::InvalidConfig(format!(
                "Invalid block size: {}",
                self.max_block_size
            )));
        }
        Ok(())
    }
}

/// Audio-side sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Blocks each Sample FIFO holds before the oldest is dropped
    pub fifo_capacity: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self { fifo_capacity: 30 }
    }
}

impl ProcessorConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.fifo_capacity == 0 {
            return Err(EngineError::InvalidConfig("FIFO capacity must be at least 1".into()));
        }
        Ok(())
    }
}

/// Analysis/UI-side settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// FFT length used by both channel analyzers
    #[serde(default)]
    pub fft_order: FftOrder,

    /// Tick rate of the analysis thread (Hz)
    pub refresh_rate_hz: u32,

    /// Pixel columns of the response curve
    pub response_width: usize,

    /// Level reported for silent FFT bins (dB)
    pub floor_db: f32,

    /// Magnitude vectors buffered per channel for the renderer
    pub spectrum_fifo_capacity: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_order: FftOrder::Order2048,
            refresh_rate_hz: 60,
            response_width: 600,
            floor_db: DEFAULT_FLOOR_DB,
            spectrum_fifo_capacity: 30,
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.refresh_rate_hz == 0 || self.refresh_rate_hz > 1000 {
            return Err(EngineError::InvalidConfig(format!(
                "Invalid refresh rate: {}",
                self.refresh_rate_hz
            )));
        }
        if self.response_width == 0 {
            return Err(EngineError::InvalidConfig("Response width must be at least 1".into()));
        }
        if self.spectrum_fifo_capacity == 0 {
            return Err(EngineError::InvalidConfig("Spectrum FIFO capacity must be at least 1".into()));
        }
        if !self.floor_db.is_finite() || self.floor_db >= 0.0 {
            return Err(EngineError::InvalidConfig(format!("Invalid floor: {} dB", self.floor_db)));
        }
        Ok(())
    }

    /// Interval between analysis ticks
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.refresh_rate_hz.max(1) as f64)
    }
}
