//! Kestrel Core - EQ Engine
//!
//! This crate wires the `kestrel_dsp` filter chain into a real-time stereo
//! processor and bridges it to a UI-side analyzer:
//! - Lock-free parameter storage shared by host, audio and analysis threads
//! - The audio-thread `EqProcessor` (prepare/process)
//! - Drop-oldest SPSC sample FIFOs from the audio thread to the analyzer
//! - A tick-driven analysis thread producing spectra and the response curve
//! - Versioned parameter state for host save/restore
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    Host / UI Thread                      │
//! │  EqParameters::set      ResponseHandle   SpectrumOutputs │
//! └──────┬─────────────────────────▲────────────────▲────────┘
//!        │ atomics                 │ RwLock         │ BlockFifo
//!        ▼                         │                │
//! ┌───────────────────┐  ┌─────────┴────────────────┴────────┐
//! │   Audio Thread    │  │      Analysis Thread (tick)       │
//! │ factory ─▶ L/R EQ │  │ change latch ─▶ display chain     │
//! │ input ─▶ tap (L/R)│─▶│ ChannelAnalyzer ─▶ FFT            │
//! └───────────────────┘  └───────────────────────────────────┘
//!      BlockFifo, drop-oldest (zero allocation on audio side)
//! ```

mod analysis;
mod config;
mod engine;
mod error;
mod fifo;
mod message;
mod params;
mod processor;
mod state;

pub use analysis::{AnalysisState, ChannelAnalyzer, ResponseHandle, ResponseSnapshot, SpectrumOutputs, TickReport};
pub use config::{AnalyzerConfig, ProcessorConfig, StreamConfig};
pub use engine::AnalysisEngine;
pub use error::{EngineError, EngineResult};
pub use fifo::{BlockFifo, FifoConsumer, FifoProducer, SampleTap};
pub use message::{Channel, Command, Event};
pub use params::{ChangeLatch, EqParameters, ParameterId, ParameterRange, PARAMETER_COUNT};
pub use processor::{AnalyzerTaps, EqProcessor};
pub use state::{ParameterState, STATE_VERSION};

// Re-export DSP types for convenience
pub use kestrel_dsp::{ChainPosition, ChainSettings, ChannelChain, DspError, FftOrder, Slope};
