//! Analysis Engine
//!
//! Owns the analysis thread: a named worker driven by a
//! `crossbeam_channel::tick` at the configured refresh rate that drains the
//! FFT paths and republishes the response curve when parameters change.
//!
//! ```text
//!  Audio thread                      Analysis thread               Owner
//!  EqProcessor ──BlockFifo (L/R)──▶ AnalysisState::tick ──▶ SpectrumOutputs
//!       ▲                                   │                 ResponseHandle
//!       └──── EqParameters (atomics) ───────┘ ──events──▶ poll_event()
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Receiver, Sender, TrySendError};
use tracing::{debug, info};

use crate::analysis::{AnalysisState, ResponseHandle, SpectrumOutputs};
use crate::config::AnalyzerConfig;
use crate::error::{EngineError, EngineResult};
use crate::message::{Channel, Command, Event};
use crate::params::EqParameters;
use crate::processor::AnalyzerTaps;

/// Undelivered events held before new ones are discarded
const EVENT_CAPACITY: usize = 256;

/// Commands queued before `send_command` reports the worker as stalled
const COMMAND_CAPACITY: usize = 32;

/// Handle to the running analysis thread
///
/// Lives on the owner's thread. Dropping it stops and joins the worker.
pub struct AnalysisEngine {
    /// Channel for sending commands to the analysis thread
    command_sender: Sender<Command>,

    /// Channel for receiving events from the analysis thread
    event_receiver: Receiver<Event>,

    analysis_thread: Option<JoinHandle<()>>,

    /// Flag to signal shutdown
    shutdown_flag: Arc<AtomicBool>,

    response: ResponseHandle,

    config: AnalyzerConfig,
}

impl AnalysisEngine {
    /// Start analysing the taps of a prepared processor
    ///
    /// Returns the engine and the renderer-side spectrum FIFOs.
    pub fn spawn(
        params: Arc<EqParameters>,
        taps: AnalyzerTaps,
        sample_rate: f32,
        config: AnalyzerConfig,
    ) -> EngineResult<(Self, SpectrumOutputs)> {
        let (state, outputs) = AnalysisState::new(params, taps, sample_rate, config.clone())?;
        let response = state.response_handle();

        let (command_sender, command_receiver) = bounded::<Command>(COMMAND_CAPACITY);
        let (event_sender, event_receiver) = bounded::<Event>(EVENT_CAPACITY);

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown_flag);
        let interval = config.tick_interval();

        let analysis_thread = thread::Builder::new()
            .name("kestrel-analysis".into())
            .spawn(move || {
                Self::analysis_thread_main(state, command_receiver, event_sender, shutdown_clone, interval);
            })
            .map_err(|e| EngineError::ThreadSpawn(e.to_string()))?;

        info!(
            "Analysis engine started: {} Hz refresh, FFT size {}",
            config.refresh_rate_hz,
            config.fft_order.size()
        );

        let engine = Self {
            command_sender,
            event_receiver,
            analysis_thread: Some(analysis_thread),
            shutdown_flag,
            response,
            config,
        };
        Ok((engine, outputs))
    }

    /// Resize the response curve
    pub fn set_response_width(&self, width: usize) -> EngineResult<()> {
        self.send_command(Command::SetResponseWidth(width))
    }

    /// Force a response redraw on the next tick
    pub fn refresh(&self) -> EngineResult<()> {
        self.send_command(Command::Refresh)
    }

    /// Latest published response curve
    pub fn response(&self) -> &ResponseHandle {
        &self.response
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Whether the worker is still running
    pub fn is_running(&self) -> bool {
        !self.shutdown_flag.load(Ordering::SeqCst)
            && self
                .analysis_thread
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// Get next event (non-blocking)
    pub fn poll_event(&self) -> Option<Event> {
        self.event_receiver.try_recv().ok()
    }

    /// Get next event, waiting at most `timeout`
    pub fn wait_event(&self, timeout: Duration) -> Option<Event> {
        self.event_receiver.recv_timeout(timeout).ok()
    }

    /// Stop the worker and wait for it to exit
    pub fn shutdown(&mut self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
        let _ = self.command_sender.try_send(Command::Shutdown);

        if let Some(handle) = self.analysis_thread.take() {
            let _ = handle.join();
        }
    }

    /// Never blocks the owner's thread
    fn send_command(&self, command: Command) -> EngineResult<()> {
        self.command_sender.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => EngineError::CommandQueueFull,
            TrySendError::Disconnected(_) => EngineError::ChannelSendError,
        })
    }

    /// Analysis thread main loop
    fn analysis_thread_main(
        mut state: AnalysisState,
        command_receiver: Receiver<Command>,
        event_sender: Sender<Event>,
        shutdown_flag: Arc<AtomicBool>,
        interval: Duration,
    ) {
        info!("Analysis thread started");
        let ticker = tick(interval);

        while !shutdown_flag.load(Ordering::SeqCst) {
            select! {
                recv(command_receiver) -> command => match command {
                    Ok(Command::SetResponseWidth(width)) => {
                        debug!("Response width set to {}", width);
                        state.set_response_width(width);
                    }
                    Ok(Command::Refresh) => state.request_refresh(),
                    Ok(Command::Shutdown) => {
                        info!("Shutdown command received");
                        shutdown_flag.store(true, Ordering::SeqCst);
                    }
                    Err(_) => {
                        debug!("Command channel closed");
                        shutdown_flag.store(true, Ordering::SeqCst);
                    }
                },
                recv(ticker) -> _ => {
                    let report = state.tick();

                    // Nobody polling is not an error; stale events are dropped
                    for (channel, frames) in Channel::ALL.into_iter().zip(report.spectrum_frames) {
                        if frames > 0 {
                            let _ = event_sender.try_send(Event::SpectrumReady { channel, frames });
                        }
                    }
                    if let Some(generation) = report.response_generation {
                        let _ = event_sender.try_send(Event::ResponseUpdated { generation });
                    }
                    if let Some(message) = report.response_error {
                        let _ = event_sender.try_send(Event::error(message));
                    }
                }
            }
        }

        info!("Analysis thread stopped");
    }
}

impl Drop for AnalysisEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
