//! Wire messages exchanged between stations.
//!
//! A [`Packet`] is the unit of application traffic. It is serialized with
//! [`Encode`], cut into [`PacketChunk`]s that each fit one APRS information
//! field, and reassembled on the far side before being decoded again.

pub mod chunk;
pub mod file;

pub use chunk::PacketChunk;
pub use file::{FileTransferChunk, FileTransferHeader};

use crate::decode::{Decode, DecodeError, DecodeErrorKind};
use crate::encode::{Encode, EncodeError};

const TAG_FILE_TRANSFER_HEADER: u8 = 0x01;
const TAG_FILE_TRANSFER_CHUNK: u8 = 0x02;

/// An application message, discriminated by a leading tag byte.
///
/// Unknown tags fail to decode; receivers log and drop them rather than
/// guessing at the contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    FileTransferHeader(FileTransferHeader),
    FileTransferChunk(FileTransferChunk),
}

impl Encode for Packet {
    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let (tag, body) = match self {
            Packet::FileTransferHeader(header) => (TAG_FILE_TRANSFER_HEADER, header.encode()?),
            Packet::FileTransferChunk(chunk) => (TAG_FILE_TRANSFER_CHUNK, chunk.encode()?),
        };

        let mut data = vec![tag];
        data.extend(body);
        Ok(data)
    }
}

impl Decode for Packet {
    fn decode(data: impl IntoIterator<Item = u8>) -> Result<Self, DecodeError> {
        let mut data = data.into_iter();
        let tag = u8::decode(&mut data)?;
        match tag {
            TAG_FILE_TRANSFER_HEADER => {
                Ok(Packet::FileTransferHeader(FileTransferHeader::decode(data)?))
            }
            TAG_FILE_TRANSFER_CHUNK => {
                Ok(Packet::FileTransferChunk(FileTransferChunk::decode(data)?))
            }
            value => Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedValue {
                value,
                expected: &[TAG_FILE_TRANSFER_HEADER, TAG_FILE_TRANSFER_CHUNK],
            })),
        }
    }
}
