//! KISS framing for the byte stream between this host and a TNC.
//!
//! https://en.wikipedia.org/wiki/KISS_(amateur_radio_protocol)

use log::warn;

pub const KISS_FEND: u8 = 0xC0;
pub const KISS_FESC: u8 = 0xDB;
pub const KISS_TFEND: u8 = 0xDC;
pub const KISS_TFESC: u8 = 0xDD;

/// Command byte for a data frame on TNC port 0.
const KISS_CMD_DATA: u8 = 0x00;

/// Wraps an AX.25 frame in a delimited, byte-stuffed KISS data frame.
#[must_use]
pub fn encode_frame(body: &[u8]) -> Vec<u8> {
    // Add 10% capacity to leave room for escaped bytes.
    let mut frame = Vec::with_capacity((3 + body.len()) * 110 / 100);
    frame.push(KISS_FEND);
    frame.push(KISS_CMD_DATA);
    for &byte in body {
        match byte {
            KISS_FEND => frame.extend([KISS_FESC, KISS_TFEND]),
            KISS_FESC => frame.extend([KISS_FESC, KISS_TFESC]),
            byte => frame.push(byte),
        }
    }
    frame.push(KISS_FEND);
    frame
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum State {
    #[default]
    Idle,
    ExpectCommand,
    InFrame,
    InEscape,
}

/// Incremental decoder for a KISS byte stream.
///
/// Bytes are pushed in one at a time as they arrive from the socket; a
/// complete frame body is returned when its closing delimiter is seen.
/// Framing errors are logged and the decoder resynchronizes on the next
/// delimiter, so a corrupt frame never takes down the receive loop.
#[derive(Debug, Default)]
pub struct KissDeframer {
    state: State,
    frame: Vec<u8>,
}

impl KissDeframer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, byte: u8) -> Option<Vec<u8>> {
        match self.state {
            State::Idle => {
                if byte == KISS_FEND {
                    self.frame.clear();
                    self.state = State::ExpectCommand;
                } else {
                    warn!("KISS byte {byte:#04x} received out of frame");
                }
            }
            State::ExpectCommand => {
                if byte == KISS_FEND {
                    // Stray or repeated delimiter, keep waiting for a command.
                } else if byte & 0x0F == KISS_CMD_DATA {
                    self.state = State::InFrame;
                } else {
                    warn!("invalid KISS command: {byte:#04x}");
                    self.state = State::Idle;
                }
            }
            State::InFrame => match byte {
                KISS_FEND => {
                    if self.frame.is_empty() {
                        self.state = State::ExpectCommand;
                    } else {
                        self.state = State::Idle;
                        return Some(std::mem::take(&mut self.frame));
                    }
                }
                KISS_FESC => self.state = State::InEscape,
                byte => self.frame.push(byte),
            },
            State::InEscape => match byte {
                KISS_TFEND => {
                    self.frame.push(KISS_FEND);
                    self.state = State::InFrame;
                }
                KISS_TFESC => {
                    self.frame.push(KISS_FESC);
                    self.state = State::InFrame;
                }
                byte => {
                    warn!("invalid KISS escape sequence: {byte:#04x}");
                    self.frame.clear();
                    self.state = State::Idle;
                }
            },
        }

        None
    }
}
