//! AX.25 UI frame codec.
//!
//! APRS uses a single frame type: unnumbered information with no layer 3
//! protocol. A frame is the address list (destination, source, digipeater
//! path), the control and PID bytes, and the information field.

use crate::callsign::Callsign;
use crate::decode::{Decode, DecodeError, DecodeErrorKind};
use crate::encode::{Encode, EncodeError};

/// Control byte for an unnumbered information (UI) frame.
pub const CONTROL_UI: u8 = 0x03;

/// PID byte indicating no layer 3 protocol.
pub const PID_NO_LAYER3: u8 = 0xF0;

/// AX.25 limits the digipeater path to 8 entries.
pub const MAX_DIGIPEATERS: usize = 8;

/// One 7-octet entry in an AX.25 address list.
///
/// Each callsign character is shifted left one bit; the 7th octet carries
/// the SSID and the flag that marks the final address in the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ax25Address {
    pub callsign: Callsign,
    pub last: bool,
}

impl Encode for Ax25Address {
    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        if self.callsign.ssid > 15 {
            return Err(EncodeError::SsidOutOfRange(self.callsign.ssid));
        }
        let call = self.callsign.call.as_bytes();
        if call.len() > 6 {
            return Err(EncodeError::CallsignTooLong(self.callsign.call.clone()));
        }

        let mut address = Vec::with_capacity(7);
        for i in 0..6 {
            let byte = call.get(i).copied().unwrap_or(b' ');
            address.push(byte << 1);
        }
        address.push(0x60 | (self.callsign.ssid << 1) | u8::from(self.last));
        Ok(address)
    }
}

impl Decode for Ax25Address {
    fn decode(data: impl IntoIterator<Item = u8>) -> Result<Self, DecodeError> {
        let octets: [u8; 7] = Decode::decode(data)
            .map_err(|_| DecodeError::new::<Self>(DecodeErrorKind::OutOfBytes))?;

        // The two reserved SSID bits are always set on the air.
        if octets[6] & 0x60 != 0x60 {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::InvalidSsidMask));
        }

        let mut call = String::with_capacity(6);
        for &octet in &octets[..6] {
            let c = (octet >> 1) as char;
            if c == ' ' {
                break;
            }
            call.push(c);
        }

        Ok(Self {
            callsign: Callsign {
                call,
                ssid: (octets[6] & 0x1E) >> 1,
            },
            last: octets[6] & 0x01 != 0,
        })
    }
}

/// An AX.25 UI frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiFrame {
    pub destination: Callsign,
    pub source: Callsign,
    pub digipeaters: Vec<Callsign>,
    pub information: Vec<u8>,
}

impl Encode for UiFrame {
    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        if self.digipeaters.len() > MAX_DIGIPEATERS {
            return Err(EncodeError::TooManyDigipeaters(self.digipeaters.len()));
        }

        let mut frame = Ax25Address {
            callsign: self.destination.clone(),
            last: false,
        }
        .encode()?;
        frame.extend(
            Ax25Address {
                callsign: self.source.clone(),
                last: self.digipeaters.is_empty(),
            }
            .encode()?,
        );
        for (i, digipeater) in self.digipeaters.iter().enumerate() {
            frame.extend(
                Ax25Address {
                    callsign: digipeater.clone(),
                    last: i == self.digipeaters.len() - 1,
                }
                .encode()?,
            );
        }

        frame.push(CONTROL_UI);
        frame.push(PID_NO_LAYER3);
        frame.extend_from_slice(&self.information);
        Ok(frame)
    }
}

impl Decode for UiFrame {
    fn decode(data: impl IntoIterator<Item = u8>) -> Result<Self, DecodeError> {
        let mut data = data.into_iter();
        let destination = Ax25Address::decode(&mut data)?;
        let source = Ax25Address::decode(&mut data)?;

        let mut digipeaters = Vec::new();
        let mut last = source.last;
        while !last {
            if digipeaters.len() == MAX_DIGIPEATERS {
                return Err(DecodeError::new::<Self>(DecodeErrorKind::TooManyAddresses));
            }
            let digipeater = Ax25Address::decode(&mut data)?;
            last = digipeater.last;
            digipeaters.push(digipeater.callsign);
        }

        let control = u8::decode(&mut data)?;
        if control != CONTROL_UI {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedValue {
                value: control,
                expected: &[CONTROL_UI],
            }));
        }
        let pid = u8::decode(&mut data)?;
        if pid != PID_NO_LAYER3 {
            return Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedValue {
                value: pid,
                expected: &[PID_NO_LAYER3],
            }));
        }

        Ok(Self {
            destination: destination.callsign,
            source: source.callsign,
            digipeaters,
            information: data.collect(),
        })
    }
}
