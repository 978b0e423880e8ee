//! Implements the KISS TNC transport: AX.25 UI frames wrapped in KISS data
//! frames over a TCP connection to the modem.

use std::time::Duration;

use log::{debug, trace, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use super::{Connection, ConnectionError, ReceivedFrame};
use crate::ax25::UiFrame;
use crate::callsign::Callsign;
use crate::decode::Decode;
use crate::encode::Encode;
use crate::kiss::{self, KissDeframer};

/// The callsign of this app, stamped as the AX.25 destination of every
/// transmitted frame.
pub const APP_CALLSIGN: &str = "APZ200";

/// An open connection to a KISS TNC.
#[derive(Debug)]
pub struct TncConnection {
    stream: BufReader<TcpStream>,
    deframer: KissDeframer,
}

impl TncConnection {
    /// Opens a TCP connection to the TNC.
    pub async fn open(hostname: &str, port: u16) -> Result<Self, ConnectionError> {
        let stream = TcpStream::connect((hostname, port)).await?;
        debug!("connected to TNC at {hostname}:{port}");
        Ok(Self {
            stream: BufReader::new(stream),
            deframer: KissDeframer::new(),
        })
    }

    /// Reads from the socket until the deframer yields one frame body.
    async fn receive_kiss_frame(&mut self) -> Result<Vec<u8>, ConnectionError> {
        loop {
            let byte = self.stream.read_u8().await?;
            if let Some(frame) = self.deframer.push(byte) {
                return Ok(frame);
            }
        }
    }
}

impl Connection for TncConnection {
    async fn send_frame(
        &mut self,
        information: &[u8],
        source: &Callsign,
        _destination: &Callsign,
        digipeaters: &[Callsign],
    ) -> Result<(), ConnectionError> {
        let frame = UiFrame {
            destination: Callsign {
                call: APP_CALLSIGN.to_string(),
                ssid: 0,
            },
            source: source.clone(),
            digipeaters: digipeaters.to_vec(),
            information: information.to_vec(),
        };

        let encoded = kiss::encode_frame(&frame.encode()?);
        trace!("sent frame: {:x?}", encoded);

        self.stream.get_mut().write_all(&encoded).await?;
        self.stream.get_mut().flush().await?;
        Ok(())
    }

    async fn receive_frame(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<ReceivedFrame>, ConnectionError> {
        let body = if timeout.is_zero() {
            self.receive_kiss_frame().await?
        } else {
            match tokio::time::timeout(timeout, self.receive_kiss_frame()).await {
                Ok(body) => body?,
                Err(_) => return Ok(None),
            }
        };

        trace!("received frame: {:x?}", body);
        let frame = match UiFrame::decode(body) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("dropping frame: {e}");
                return Ok(None);
            }
        };

        debug!("destination {}", frame.destination);
        debug!("source {}", frame.source);
        for (i, digipeater) in frame.digipeaters.iter().enumerate() {
            debug!("digipeater {i} {digipeater}");
        }

        Ok(Some(ReceivedFrame {
            source: frame.source,
            destination: frame.destination,
            digipeaters: frame.digipeaters,
            information: frame.information,
        }))
    }
}
