//! Station callsign handling.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The destination callsign used for ACKless broadcast payloads.
///
/// This is an experimental APRS tocall; any station listening for it will
/// reassemble the payloads addressed to it.
pub const BROADCAST_CALLSIGN: &str = "APZ222";

/// A station callsign with its secondary station identifier.
///
/// An empty `call` means "unspecified"; the file transfer commands treat an
/// unspecified peer as broadcast mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Callsign {
    pub call: String,
    pub ssid: u8,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallsignError {
    #[error("'{0}' does not contain an SSID between 0 and 15")]
    InvalidSsid(String),
}

impl Callsign {
    /// The well-known broadcast destination.
    pub fn broadcast() -> Self {
        Self {
            call: BROADCAST_CALLSIGN.to_string(),
            ssid: 0,
        }
    }

    /// Returns true if no callsign has been specified.
    pub fn is_empty(&self) -> bool {
        self.call.is_empty()
    }
}

impl FromStr for Callsign {
    type Err = CallsignError;

    /// Parses `CALL` or `CALL-SSID`. A missing SSID means 0 and an empty
    /// string is the unspecified callsign.
    fn from_str(s: &str) -> Result<Self, CallsignError> {
        let Some((call, ssid)) = s.split_once('-') else {
            return Ok(Self {
                call: s.to_string(),
                ssid: 0,
            });
        };

        let ssid: u8 = ssid
            .parse()
            .map_err(|_| CallsignError::InvalidSsid(s.to_string()))?;
        if ssid > 15 {
            return Err(CallsignError::InvalidSsid(s.to_string()));
        }

        Ok(Self {
            call: call.to_string(),
            ssid,
        })
    }
}

impl fmt::Display for Callsign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ssid > 0 {
            write!(f, "{}-{}", self.call, self.ssid)
        } else {
            write!(f, "{}", self.call)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_without_ssid() {
        let callsign: Callsign = "KN6FVU".parse().unwrap();
        assert_eq!(callsign.call, "KN6FVU");
        assert_eq!(callsign.ssid, 0);
    }

    #[test]
    fn parse_with_ssid() {
        let callsign: Callsign = "KN6FVU-7".parse().unwrap();
        assert_eq!(callsign.call, "KN6FVU");
        assert_eq!(callsign.ssid, 7);
    }

    #[test]
    fn parse_empty_is_unspecified() {
        let callsign: Callsign = "".parse().unwrap();
        assert!(callsign.is_empty());
        assert_eq!(callsign.ssid, 0);
    }

    #[test]
    fn parse_rejects_bad_ssid() {
        assert!("KN6FVU-16".parse::<Callsign>().is_err());
        assert!("KN6FVU-x".parse::<Callsign>().is_err());
        assert!("KN6FVU--1".parse::<Callsign>().is_err());
    }

    #[test]
    fn format_round_trips() {
        for s in ["KN6FVU", "KN6FVU-7", "APZ222"] {
            let callsign: Callsign = s.parse().unwrap();
            assert_eq!(callsign.to_string(), s);
        }
    }

    #[test]
    fn ssid_zero_formats_without_suffix() {
        let callsign: Callsign = "W1AW-0".parse().unwrap();
        assert_eq!(callsign.to_string(), "W1AW");
    }
}
