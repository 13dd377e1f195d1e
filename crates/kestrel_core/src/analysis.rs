//! Spectrum and Response Analysis
//!
//! UI-side consumers of the audio thread's output. Nothing here runs on the
//! audio thread.
//!
//! - [`ChannelAnalyzer`] drains one channel's sample FIFO into a rolling
//!   window and pushes one magnitude spectrum per consumed block into a
//!   second FIFO for the renderer.
//! - The response curve is recomputed from a display copy of the chain only
//!   when the parameter change latch fires, and published behind a
//!   `parking_lot::RwLock`.

use std::sync::Arc;

use kestrel_dsp::{
    Bounds, Cascade, ChainPosition, ChainSettings, ChannelChain, DbRange, DspError, FftDataGenerator, FftOrder, Point,
    ResponseCurve,
};
use parking_lot::RwLock;
use tracing::warn;

use crate::config::{AnalyzerConfig, StreamConfig};
use crate::error::EngineResult;
use crate::fifo::{BlockFifo, FifoConsumer, FifoProducer};
use crate::message::Channel;
use crate::params::EqParameters;
use crate::processor::AnalyzerTaps;

/// Renderer-side ends of the per-channel spectrum FIFOs
///
/// Each entry is one magnitude vector of `fft_order.num_bins()` dB values.
pub struct SpectrumOutputs {
    pub left: FifoConsumer,
    pub right: FifoConsumer,
}

/// Turns one channel's sample blocks into magnitude spectra
pub struct ChannelAnalyzer {
    channel: Channel,
    samples: FifoConsumer,
    incoming: Vec<f32>,
    window: Vec<f32>,
    generator: FftDataGenerator,
    spectrum: FifoProducer,
    floor_db: f32,
}

impl ChannelAnalyzer {
    /// Returns the analyzer and the consumer half of its spectrum FIFO
    pub fn new(
        channel: Channel,
        samples: FifoConsumer,
        order: FftOrder,
        floor_db: f32,
        spectrum_capacity: usize,
    ) -> (Self, FifoConsumer) {
        let (spectrum, spectrum_consumer) = BlockFifo::new(spectrum_capacity, order.num_bins());
        let incoming = vec![0.0; samples.block_len()];

        let analyzer = Self {
            channel,
            samples,
            incoming,
            window: vec![0.0; order.size()],
            generator: FftDataGenerator::new(order),
            spectrum,
            floor_db,
        };
        (analyzer, spectrum_consumer)
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Drain every pending sample block; returns the spectra produced
    pub fn process_pending(&mut self) -> usize {
        let mut produced = 0;
        while self.samples.pull(&mut self.incoming) {
            self.shift_in();

            match self.generator.produce(&self.window, self.floor_db) {
                Ok(magnitudes) => {
                    self.spectrum.push(magnitudes);
                    produced += 1;
                }
                Err(e) => warn!("{:?} spectrum skipped: {}", self.channel, e),
            }
        }
        produced
    }

    /// Slide the newest block into the end of the rolling window
    fn shift_in(&mut self) {
        let size = self.window.len();
        let block = &self.incoming;

        if block.len() >= size {
            self.window.copy_from_slice(&block[block.len() - size..]);
        } else {
            self.window.copy_within(block.len().., 0);
            self.window[size - block.len()..].copy_from_slice(block);
        }
    }
}

/// One published response curve
#[derive(Debug, Clone, Default)]
pub struct ResponseSnapshot {
    pub curve: ResponseCurve,
    pub settings: ChainSettings,
    /// Display chain coefficients, indexed by [`ChainPosition::index`]
    pub coefficients: [Cascade; 3],
    pub sample_rate: f32,
    /// Increments on every publish; 0 means nothing published yet
    pub generation: u64,
}

/// Shared read access to the latest response curve
#[derive(Clone, Default)]
pub struct ResponseHandle {
    inner: Arc<RwLock<ResponseSnapshot>>,
}

impl ResponseHandle {
    pub fn snapshot(&self) -> ResponseSnapshot {
        self.inner.read().clone()
    }

    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Published coefficients at `position`
    ///
    /// Bit-identical to what the audio thread loaded from the same settings.
    pub fn coefficients(&self, position: ChainPosition) -> Cascade {
        self.inner.read().coefficients[position.index()]
    }

    /// Screen-space polyline of the current curve
    pub fn path(&self, bounds: &Bounds, range: DbRange) -> Vec<Point> {
        self.inner.read().curve.to_path(bounds, range)
    }

    /// Run `f` against the snapshot without cloning it
    pub fn read<R>(&self, f: impl FnOnce(&ResponseSnapshot) -> R) -> R {
        let snapshot = self.inner.read();
        f(&*snapshot)
    }
}

/// What one [`AnalysisState::tick`] did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Spectra produced per channel, indexed like [`Channel::ALL`]
    pub spectrum_frames: [usize; 2],
    /// Set when a new response curve was published
    pub response_generation: Option<u64>,
    /// First band the display chain could not design on that publish
    pub response_error: Option<String>,
}

/// Everything the analysis thread owns
///
/// `tick` is idempotent: skipping one only delays the work to the next.
pub struct AnalysisState {
    params: Arc<EqParameters>,
    config: AnalyzerConfig,
    sample_rate: f32,
    analyzers: [ChannelAnalyzer; 2],
    display_chain: ChannelChain,
    response: ResponseHandle,
    force_refresh: bool,
}

impl AnalysisState {
    pub fn new(
        params: Arc<EqParameters>,
        taps: AnalyzerTaps,
        sample_rate: f32,
        config: AnalyzerConfig,
    ) -> EngineResult<(Self, SpectrumOutputs)> {
        config.validate()?;
        StreamConfig {
            sample_rate,
            max_block_size: taps.left.block_len(),
        }
        .validate()?;

        let (left, left_spectrum) = ChannelAnalyzer::new(
            Channel::Left,
            taps.left,
            config.fft_order,
            config.floor_db,
            config.spectrum_fifo_capacity,
        );
        let (right, right_spectrum) = ChannelAnalyzer::new(
            Channel::Right,
            taps.right,
            config.fft_order,
            config.floor_db,
            config.spectrum_fifo_capacity,
        );

        let state = Self {
            params,
            config,
            sample_rate,
            analyzers: [left, right],
            display_chain: ChannelChain::new(),
            response: ResponseHandle::default(),
            force_refresh: false,
        };
        let outputs = SpectrumOutputs {
            left: left_spectrum,
            right: right_spectrum,
        };
        Ok((state, outputs))
    }

    /// Run one refresh: drain both FFT paths, then redraw the response if
    /// a parameter changed since the last tick
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        for (frames, analyzer) in report.spectrum_frames.iter_mut().zip(&mut self.analyzers) {
            *frames = analyzer.process_pending();
        }

        let changed = self.params.change_latch().consume();
        if changed || std::mem::take(&mut self.force_refresh) {
            let (generation, error) = self.publish_response();
            report.response_generation = Some(generation);
            report.response_error = error.map(|e| e.to_string());
        }
        report
    }

    /// A band that fails to design keeps its previous coefficients; the
    /// curve is still published and the failure is returned.
    fn publish_response(&mut self) -> (u64, Option<DspError>) {
        let settings = self.params.chain_settings();
        let error = self.display_chain.configure(&settings, self.sample_rate).err();
        if let Some(e) = &error {
            warn!("Response curve keeps a stale band: {}", e);
        }

        let mut snapshot = self.response.inner.write();
        snapshot
            .curve
            .compute(&self.display_chain, self.sample_rate, self.config.response_width);
        snapshot.settings = settings;
        snapshot.coefficients = ChainPosition::ALL.map(|position| self.display_chain.coefficients(position));
        snapshot.sample_rate = self.sample_rate;
        snapshot.generation += 1;
        (snapshot.generation, error)
    }

    /// Change the curve resolution; takes effect on the next tick
    pub fn set_response_width(&mut self, width: usize) {
        if width == 0 {
            warn!("Ignoring zero response width");
            return;
        }
        if width != self.config.response_width {
            self.config.response_width = width;
            self.force_refresh = true;
        }
    }

    pub fn request_refresh(&mut self) {
        self.force_refresh = true;
    }

    pub fn response_handle(&self) -> ResponseHandle {
        self.response.clone()
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn display_chain(&self) -> &ChannelChain {
        &self.display_chain
    }
}
