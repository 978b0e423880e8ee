use std::time::Duration;

use crate::callsign::Callsign;
use crate::connection::{
    aprs_is::AprsIsConnection, tnc::TncConnection, Connection, ConnectionError, ReceivedFrame,
};

/// Either of the two APRS transports, chosen at startup.
#[derive(Debug)]
pub enum GenericConnection {
    Tnc(TncConnection),
    AprsIs(AprsIsConnection),
}

impl Connection for GenericConnection {
    async fn send_frame(
        &mut self,
        information: &[u8],
        source: &Callsign,
        destination: &Callsign,
        digipeaters: &[Callsign],
    ) -> Result<(), ConnectionError> {
        match self {
            GenericConnection::Tnc(c) => {
                c.send_frame(information, source, destination, digipeaters)
                    .await
            }
            GenericConnection::AprsIs(c) => {
                c.send_frame(information, source, destination, digipeaters)
                    .await
            }
        }
    }

    async fn receive_frame(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<ReceivedFrame>, ConnectionError> {
        match self {
            GenericConnection::Tnc(c) => c.receive_frame(timeout).await,
            GenericConnection::AprsIs(c) => c.receive_frame(timeout).await,
        }
    }
}

impl From<TncConnection> for GenericConnection {
    fn from(c: TncConnection) -> Self {
        GenericConnection::Tnc(c)
    }
}

impl From<AprsIsConnection> for GenericConnection {
    fn from(c: AprsIsConnection) -> Self {
        GenericConnection::AprsIs(c)
    }
}
