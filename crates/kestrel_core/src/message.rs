//! Message Types for Thread Communication
//!
//! Commands flow from the owner -> Analysis thread
//! Events flow from the Analysis thread -> owner

use serde::{Deserialize, Serialize};

/// One side of the stereo pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Left, Channel::Right];
}

/// Commands sent to the analysis thread
#[derive(Debug, Clone)]
pub enum Command {
    /// Resize the response curve (pixel columns)
    SetResponseWidth(usize),

    /// Recompute the response curve on the next tick even if nothing changed
    Refresh,

    /// Stop the analysis thread
    Shutdown,
}

/// Events sent from the analysis thread
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    /// A new response curve has been published
    ResponseUpdated { generation: u64 },

    /// Magnitude vectors were pushed to a channel's spectrum FIFO this tick
    SpectrumReady { channel: Channel, frames: usize },

    /// Error occurred
    Error { message: String },
}

impl Event {
    /// Create an error event
    pub fn error(msg: impl Into<String>) -> Self {
        Event::Error {
            message: msg.into(),
        }
    }
}
