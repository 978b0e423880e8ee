//! Transports for exchanging UI frames with the APRS network.
//!
//! Two variants exist: a KISS TNC reached over TCP for RF operation, and the
//! internet APRS-IS tier for receive-only monitoring. Callers hold either
//! one behind the [`Connection`] trait (usually as a [`GenericConnection`])
//! and never need to know which they have.

use std::time::Duration;

use thiserror::Error;

use crate::callsign::Callsign;
use crate::decode::DecodeError;
use crate::encode::EncodeError;

pub mod aprs_is;
pub mod generic;
pub mod tnc;

pub use aprs_is::AprsIsConnection;
pub use generic::GenericConnection;
pub use tnc::TncConnection;

/// A UI frame received from the APRS network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    pub source: Callsign,
    pub destination: Callsign,
    pub digipeaters: Vec<Callsign>,
    pub information: Vec<u8>,
}

/// Represents an open connection to the APRS network.
#[allow(async_fn_in_trait)]
pub trait Connection {
    /// Sends one UI frame.
    ///
    /// Transports that stamp their own destination identity on the air may
    /// ignore `destination`.
    async fn send_frame(
        &mut self,
        information: &[u8],
        source: &Callsign,
        destination: &Callsign,
        digipeaters: &[Callsign],
    ) -> Result<(), ConnectionError>;

    /// Receives one UI frame.
    ///
    /// Returns `None` when the timeout elapses or when a malformed frame was
    /// dropped; callers retry. A zero timeout waits indefinitely. Transport
    /// failures are fatal and surface as errors.
    async fn receive_frame(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<ReceivedFrame>, ConnectionError>;
}

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Frame encoding error: {0}")]
    EncodeError(#[from] EncodeError),
    #[error("Frame decoding error: {0}")]
    DecodeError(#[from] DecodeError),
    #[error("The connection was closed by the remote end")]
    Disconnected,
    #[error("Sending frames over APRS-IS is not supported")]
    SendUnsupported,
    #[error("APRS-IS line exceeded {0} bytes without a terminator")]
    LineTooLong(usize),
    #[error("Unexpected APRS-IS handshake line: {0}")]
    Handshake(String),
}
