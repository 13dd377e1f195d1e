//! Filter Stage
//!
//! One biquad section with its own delay line and a bypass flag.

use biquad::{Biquad, Coefficients, DirectForm2Transposed};

use crate::coefficients::UNITY_COEFFICIENTS;

/// A single 2nd-order IIR section
///
/// Each channel owns its own stages; only the coefficient *values* are
/// shared between channels. Bypassing keeps both the coefficients and the
/// delay-line state untouched.
pub struct FilterStage {
    // DirectForm2Transposed: better numerical stability than DF1
    filter: DirectForm2Transposed<f32>,
    // The biquad crate keeps its copy private, so we mirror it for readers
    coefficients: Coefficients<f32>,
    bypassed: bool,
}

impl FilterStage {
    pub fn new(coefficients: Coefficients<f32>) -> Self {
        Self {
            filter: DirectForm2Transposed::<f32>::new(coefficients),
            coefficients,
            bypassed: false,
        }
    }

    /// A bypassed stage with pass-through coefficients
    pub fn passthrough() -> Self {
        let mut stage = Self::new(UNITY_COEFFICIENTS);
        stage.bypassed = true;
        stage
    }

    /// Overwrite the section's coefficients, keeping the delay line
    ///
    /// # Real-time Safety
    /// Plain value copy, safe between blocks on the audio thread.
    #[inline]
    pub fn set_coefficients(&mut self, coefficients: Coefficients<f32>) {
        self.filter.update_coefficients(coefficients);
        self.coefficients = coefficients;
    }

    pub fn coefficients(&self) -> &Coefficients<f32> {
        &self.coefficients
    }

    #[inline]
    pub fn set_bypassed(&mut self, bypassed: bool) {
        self.bypassed = bypassed;
    }

    #[inline]
    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    /// Run one sample through the section (ignores the bypass flag)
    #[inline]
    pub fn process_sample(&mut self, sample: f32) -> f32 {
        self.filter.run(sample)
    }

    /// Filter a block in place; a bypassed stage leaves it untouched
    #[inline]
    pub fn process_block(&mut self, block: &mut [f32]) {
        if self.bypassed {
            return;
        }
        for sample in block.iter_mut() {
            *sample = self.filter.run(*sample);
        }
    }

    /// Clear the delay line
    pub fn reset(&mut self) {
        self.filter.reset_state();
    }

    /// Linear magnitude of this section at `frequency`
    pub fn magnitude_for_frequency(&self, frequency: f64, sample_rate: f64) -> f64 {
        crate::response::magnitude_for_frequency(&self.coefficients, frequency, sample_rate)
    }
}

impl Default for FilterStage {
    fn default() -> Self {
        Self::passthrough()
    }
}
