use thiserror::Error;

/// Errors raised while encoding a frame or packet for transmission.
///
/// These indicate invalid caller input rather than a transient condition;
/// they propagate all the way out instead of being retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("callsign '{0}' is longer than 6 characters")]
    CallsignTooLong(String),
    #[error("SSID {0} is outside of the range 0-15")]
    SsidOutOfRange(u8),
    #[error("{0} digipeaters specified, but AX.25 addresses at most 8")]
    TooManyDigipeaters(usize),
}

pub trait Encode {
    /// Encodes this value into bytes for transmission.
    fn encode(&self) -> Result<Vec<u8>, EncodeError>;
}

macro_rules! impl_encode_for_primitive {
    ($($t:ty),*) => {
        $(
            impl Encode for $t {
                fn encode(&self) -> Result<Vec<u8>, EncodeError> {
                    Ok(self.to_le_bytes().to_vec())
                }
            }
        )*
    };
}

impl_encode_for_primitive!(u8, u16, u32, u64);

impl Encode for &[u8] {
    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        Ok(self.to_vec())
    }
}

impl Encode for Vec<u8> {
    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        Ok(self.clone())
    }
}
