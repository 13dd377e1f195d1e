//! Cut Filter Bank
//!
//! Four cascaded [`FilterStage`]s realising a Butterworth highpass or
//! lowpass of up to 8th order. The slope decides how many of them run;
//! the rest stay in place, bypassed, so switching slope never reallocates.

use crate::coefficients::Cascade;
use crate::filter::FilterStage;
use crate::settings::{Slope, MAX_CUT_STAGES};

pub struct CutFilter {
    stages: [FilterStage; MAX_CUT_STAGES],
}

impl CutFilter {
    /// All four stages bypassed
    pub fn new() -> Self {
        Self {
            stages: core::array::from_fn(|_| FilterStage::passthrough()),
        }
    }

    /// Load a new Butterworth cascade
    ///
    /// Bypasses every stage, then assigns coefficients to and enables
    /// exactly the first `slope.stages()` of them. Stages beyond that keep
    /// whatever coefficients they had; they are bypassed so it is irrelevant.
    ///
    /// # Real-time Safety
    /// No allocation, no locks. Safe right before processing a block.
    pub fn update(&mut self, cascade: &Cascade, slope: Slope) {
        for stage in self.stages.iter_mut() {
            stage.set_bypassed(true);
        }

        let active = slope.stages().min(cascade.len());
        for (stage, coefficients) in self.stages.iter_mut().zip(cascade.as_slice()).take(active) {
            stage.set_coefficients(*coefficients);
            stage.set_bypassed(false);
        }
    }

    /// Number of un-bypassed stages
    pub fn active_stages(&self) -> usize {
        self.stages.iter().filter(|s| !s.is_bypassed()).count()
    }

    pub fn stage(&self, index: usize) -> Option<&FilterStage> {
        self.stages.get(index)
    }

    pub fn is_stage_bypassed(&self, index: usize) -> bool {
        self.stages.get(index).map_or(true, FilterStage::is_bypassed)
    }

    /// Coefficients of the un-bypassed stages, in processing order
    pub fn active_coefficients(&self) -> Cascade {
        let mut cascade = Cascade::empty();
        for stage in self.stages.iter().filter(|s| !s.is_bypassed()) {
            cascade.push(*stage.coefficients());
        }
        cascade
    }

    #[inline]
    pub fn process_block(&mut self, block: &mut [f32]) {
        for stage in self.stages.iter_mut() {
            stage.process_block(block);
        }
    }

    pub fn reset(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.reset();
        }
    }

    /// Product of the active stages' magnitudes
    pub fn magnitude_for_frequency(&self, frequency: f64, sample_rate: f64) -> f64 {
        self.stages
            .iter()
            .filter(|s| !s.is_bypassed())
            .map(|s| s.magnitude_for_frequency(frequency, sample_rate))
            .product()
    }
}

impl Default for CutFilter {
    fn default() -> Self {
        Self::new()
    }
}
