use std::str::Utf8Error;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub decoded_type: &'static str,
}

impl DecodeError {
    pub fn new<T>(kind: DecodeErrorKind) -> Self {
        Self {
            kind,
            decoded_type: std::any::type_name::<T>(),
        }
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DecodeError: {}: {}", self.decoded_type, self.kind)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeErrorKind {
    #[error("Ran out of bytes while decoding")]
    OutOfBytes,
    #[error("Could not decode byte with unexpected value. Found {value:#04x}, expected one of: {expected:#04x?}")]
    UnexpectedValue { value: u8, expected: &'static [u8] },
    #[error("Address octet did not carry the AX.25 reserved SSID bits")]
    InvalidSsidMask,
    #[error("Address list ran past the AX.25 limit of 8 digipeaters")]
    TooManyAddresses,
    #[error("String contained invalid UTF-8: {0}")]
    InvalidStringContents(#[from] Utf8Error),
}

/// Decodes a value from a stream of received bytes.
///
/// Implementations pull exactly the bytes they need, so messages compose by
/// handing the same iterator from field to field. Variable-length trailing
/// fields drain whatever remains.
pub trait Decode {
    fn decode(data: impl IntoIterator<Item = u8>) -> Result<Self, DecodeError>
    where
        Self: Sized;
}

impl Decode for u8 {
    fn decode(data: impl IntoIterator<Item = u8>) -> Result<Self, DecodeError> {
        let mut data = data.into_iter();
        data.next()
            .ok_or(DecodeError::new::<u8>(DecodeErrorKind::OutOfBytes))
    }
}

impl Decode for u16 {
    fn decode(data: impl IntoIterator<Item = u8>) -> Result<Self, DecodeError> {
        let mut data = data.into_iter();
        Ok(u16::from_le_bytes(Decode::decode(&mut data)?))
    }
}

impl Decode for u32 {
    fn decode(data: impl IntoIterator<Item = u8>) -> Result<Self, DecodeError> {
        let mut data = data.into_iter();
        Ok(u32::from_le_bytes(Decode::decode(&mut data)?))
    }
}

impl Decode for u64 {
    fn decode(data: impl IntoIterator<Item = u8>) -> Result<Self, DecodeError> {
        let mut data = data.into_iter();
        Ok(u64::from_le_bytes(Decode::decode(&mut data)?))
    }
}

impl<const N: usize> Decode for [u8; N] {
    fn decode(data: impl IntoIterator<Item = u8>) -> Result<Self, DecodeError> {
        let mut data = data.into_iter();
        let mut bytes = [0u8; N];
        for byte in &mut bytes {
            *byte = data
                .next()
                .ok_or(DecodeError::new::<[u8; N]>(DecodeErrorKind::OutOfBytes))?;
        }
        Ok(bytes)
    }
}
