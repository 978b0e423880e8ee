//! Implements the APRS-IS transport: a receive-only client for the internet
//! tier's CRLF line protocol.

use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use super::{Connection, ConnectionError, ReceivedFrame};
use crate::callsign::Callsign;

/// APRS-IS lines are short; anything longer than this without a terminator
/// means the stream is corrupt.
const MAX_LINE_LENGTH: usize = 1024;

/// A logged-in connection to an APRS-IS server.
#[derive(Debug)]
pub struct AprsIsConnection {
    stream: BufReader<TcpStream>,
}

impl AprsIsConnection {
    /// Connects to the server and logs in read-only.
    ///
    /// Passcode `-1` is the documented receive-only login, which is why
    /// [`Connection::send_frame`] is unsupported on this transport.
    pub async fn connect(
        hostname: &str,
        port: u16,
        callsign: &Callsign,
    ) -> Result<Self, ConnectionError> {
        let stream = TcpStream::connect((hostname, port)).await?;
        debug!("connected to APRS-IS at {hostname}:{port}");
        let mut connection = Self {
            stream: BufReader::new(stream),
        };

        let banner = connection.read_line().await?;
        if !banner.starts_with(b"# ") {
            return Err(ConnectionError::Handshake(
                String::from_utf8_lossy(&banner).into_owned(),
            ));
        }
        info!("server banner: {}", String::from_utf8_lossy(&banner[2..]));

        let login = format!("user {} pass -1 vers watch 0.0.1\r\n", callsign);
        connection.stream.get_mut().write_all(login.as_bytes()).await?;
        connection.stream.get_mut().flush().await?;

        let response = connection.read_line().await?;
        info!("server response: {}", String::from_utf8_lossy(&response));

        Ok(connection)
    }

    /// Reads one CRLF-terminated line, without the terminator.
    async fn read_line(&mut self) -> Result<Vec<u8>, ConnectionError> {
        let mut line = Vec::new();
        loop {
            line.push(self.stream.read_u8().await?);
            if line.ends_with(b"\r\n") {
                line.truncate(line.len() - 2);
                return Ok(line);
            }
            if line.len() >= MAX_LINE_LENGTH {
                return Err(ConnectionError::LineTooLong(MAX_LINE_LENGTH));
            }
        }
    }

    /// Reads one line and parses it, skipping server keepalives.
    async fn receive_one(&mut self) -> Result<Option<ReceivedFrame>, ConnectionError> {
        let line = self.read_line().await?;
        if line.first() == Some(&b'#') {
            debug!("server: {}", String::from_utf8_lossy(&line));
            return Ok(None);
        }

        match parse_monitor_line(&line) {
            Some(frame) => Ok(Some(frame)),
            None => {
                warn!(
                    "dropping malformed APRS-IS line: {}",
                    String::from_utf8_lossy(&line)
                );
                Ok(None)
            }
        }
    }
}

/// Parses one `SRC>DEST[,DIGI…]:INFO` monitor line.
///
/// The entries between the destination and the information field are left
/// unparsed: APRS-IS paths mix digipeater callsigns with q-constructs and
/// used-path flags that are not plain callsigns.
fn parse_monitor_line(line: &[u8]) -> Option<ReceivedFrame> {
    let gt = line.iter().position(|&b| b == b'>')?;
    let source = std::str::from_utf8(&line[..gt]).ok()?;

    let rest = &line[gt + 1..];
    let colon = rest.iter().position(|&b| b == b':')?;
    let header = &rest[..colon];
    let dest_end = header
        .iter()
        .position(|&b| b == b',')
        .unwrap_or(header.len());
    let destination = std::str::from_utf8(&header[..dest_end]).ok()?;

    Some(ReceivedFrame {
        source: source.parse().ok()?,
        destination: destination.parse().ok()?,
        digipeaters: Vec::new(),
        information: rest[colon + 1..].to_vec(),
    })
}

impl Connection for AprsIsConnection {
    async fn send_frame(
        &mut self,
        _information: &[u8],
        _source: &Callsign,
        _destination: &Callsign,
        _digipeaters: &[Callsign],
    ) -> Result<(), ConnectionError> {
        Err(ConnectionError::SendUnsupported)
    }

    async fn receive_frame(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<ReceivedFrame>, ConnectionError> {
        if timeout.is_zero() {
            self.receive_one().await
        } else {
            match tokio::time::timeout(timeout, self.receive_one()).await {
                Ok(result) => result,
                Err(_) => Ok(None),
            }
        }
    }
}
