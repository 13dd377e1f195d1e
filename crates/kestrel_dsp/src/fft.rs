//! FFT Data Generator
//!
//! Turns one window of mono audio into a magnitude spectrum in dB for the
//! analyzer display. Runs on the analysis thread, never the audio thread.
//!
//! # Pipeline
//!
//! Blackman-Harris window → forward FFT → |X[k]| / num_bins → dB with a
//! negative-infinity floor. Only the first `fft_size / 2` bins are kept.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::error::DspError;

/// Level reported for silent bins (dB)
pub const DEFAULT_FLOOR_DB: f32 = -48.0;

/// Analyzer FFT length, chosen when the stream is prepared
///
/// 2048 samples at 48kHz = ~42ms window, ~23Hz resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FftOrder {
    #[default]
    Order2048,
    Order4096,
    Order8192,
}

impl FftOrder {
    pub fn size(self) -> usize {
        match self {
            FftOrder::Order2048 => 2048,
            FftOrder::Order4096 => 4096,
            FftOrder::Order8192 => 8192,
        }
    }

    /// Number of magnitude values produced per transform
    pub fn num_bins(self) -> usize {
        self.size() / 2
    }

    /// Frequency spacing between bins (Hz)
    pub fn bin_width(self, sample_rate: f32) -> f32 {
        sample_rate / self.size() as f32
    }
}

/// 4-term Blackman-Harris window value for sample `n` of `size`
fn blackman_harris(n: usize, size: usize) -> f32 {
    let phase = 2.0 * std::f64::consts::PI * n as f64 / (size - 1) as f64;
    (0.35875 - 0.48829 * phase.cos() + 0.14128 * (2.0 * phase).cos() - 0.01168 * (3.0 * phase).cos()) as f32
}

/// Pre-computed window lookup table
struct BlackmanHarrisWindow {
    coeffs: Vec<f32>,
}

impl BlackmanHarrisWindow {
    fn new(size: usize) -> Self {
        Self {
            coeffs: (0..size).map(|i| blackman_harris(i, size)).collect(),
        }
    }

    #[inline]
    fn apply(&self, sample: f32, index: usize) -> f32 {
        sample * self.coeffs[index]
    }
}

/// Reusable FFT stage for one analyzer channel
///
/// All buffers are allocated in `new`; `produce` only overwrites them.
pub struct FftDataGenerator {
    order: FftOrder,
    window: BlackmanHarrisWindow,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl FftDataGenerator {
    pub fn new(order: FftOrder) -> Self {
        let size = order.size();
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let scratch_len = fft.get_inplace_scratch_len();

        Self {
            order,
            window: BlackmanHarrisWindow::new(size),
            fft,
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            magnitudes: vec![0.0; order.num_bins()],
        }
    }

    pub fn order(&self) -> FftOrder {
        self.order
    }

    /// Compute the dB spectrum of exactly `order.size()` samples
    ///
    /// Returns the `order.num_bins()` levels; bins at or below `floor_db`
    /// read back as `floor_db`.
    pub fn produce(&mut self, audio: &[f32], floor_db: f32) -> Result<&[f32], DspError> {
        let size = self.order.size();
        if audio.len() != size {
            return Err(DspError::BufferSizeMismatch {
                expected: size,
                got: audio.len(),
            });
        }

        for (i, (slot, &sample)) in self.buffer.iter_mut().zip(audio).enumerate() {
            *slot = Complex::new(self.window.apply(sample, i), 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let num_bins = self.order.num_bins() as f32;
        for (magnitude, bin) in self.magnitudes.iter_mut().zip(&self.buffer) {
            let normalized = bin.norm() / num_bins;
            *magnitude = if normalized > 0.0 {
                (20.0 * normalized.log10()).max(floor_db)
            } else {
                floor_db
            };
        }

        Ok(&self.magnitudes)
    }
}
