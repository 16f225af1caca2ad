//! Prebuilt simulation setups for testing, benchmarking, and examples.
//!
//! Every simulation builds its own [`Fabric`](switchyard_core::Fabric) from
//! the configuration it is given, runs it until no deliveries are left, and
//! checks what arrived.

use std::{
    fmt::{self, Display, Formatter},
    time::Duration,
};
use switchyard_core::{config::ConfigError, message::FrameError, network::StartError};
use thiserror::Error as ThisError;
use tokio::sync::oneshot::error::RecvError;

mod ping_pong;
pub use ping_pong::ping_pong;

mod fan_in;
pub use fan_in::fan_in;

mod loopback;
pub use loopback::loopback;

mod framing;
pub use framing::framing;

/// What a finished simulation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub name: &'static str,
    /// The number of messages delivered or framed
    pub deliveries: usize,
    /// The virtual time when the last delivery ran
    pub virtual_time: Duration,
}

impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} deliveries in {:?} of virtual time",
            self.name, self.deliveries, self.virtual_time
        )
    }
}

#[derive(Debug, ThisError)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Start(#[from] StartError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("A reply was never delivered")]
    Dropped(#[from] RecvError),
    #[error("Expected {expected} deliveries but {actual} ran")]
    Incomplete { expected: usize, actual: usize },
    #[error("Message {id} arrived with the wrong body")]
    Corrupted { id: u64 },
    #[error("Loopback traffic took {0:?} of virtual time")]
    Delayed(Duration),
    #[error("An oversized body was accepted")]
    OversizedAccepted,
}
