//! Fragments of a serialized packet, sized to fit an APRS information field.

use bitflags::bitflags;

use crate::decode::{Decode, DecodeError};
use crate::encode::{Encode, EncodeError};

bitflags! {
    /// Marks which optional fields are present in an encoded chunk.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct ChunkFlags: u8 {
        const RETRANSMIT_ID = 1 << 0;
        const TOTAL_PAYLOAD_SIZE = 1 << 1;
    }
}

/// One fragment of a payload in flight.
///
/// A payload too large for a single APRS information field is cut into
/// numbered chunks that share a `payload_id`. The receiver puts them back
/// together once the declared total size has arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketChunk {
    /// Identifies the payload this chunk belongs to.
    pub payload_id: u32,

    /// 1-based position of this chunk within its payload.
    pub chunk_id: u32,

    /// Which retransmission pass produced this chunk. Informational only;
    /// duplicate suppression is keyed on `chunk_id` alone.
    pub retransmit_id: Option<u32>,

    /// Total size of the assembled payload, sent on the first chunk.
    pub total_payload_size: Option<u32>,

    /// The bytes of this chunk.
    pub payload: Vec<u8>,
}

impl Encode for PacketChunk {
    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut flags = ChunkFlags::empty();
        flags.set(ChunkFlags::RETRANSMIT_ID, self.retransmit_id.is_some());
        flags.set(
            ChunkFlags::TOTAL_PAYLOAD_SIZE,
            self.total_payload_size.is_some(),
        );

        let mut data = vec![flags.bits()];
        data.extend(self.payload_id.encode()?);
        data.extend(self.chunk_id.encode()?);
        if let Some(retransmit_id) = self.retransmit_id {
            data.extend(retransmit_id.encode()?);
        }
        if let Some(total_payload_size) = self.total_payload_size {
            data.extend(total_payload_size.encode()?);
        }
        data.extend_from_slice(&self.payload);
        Ok(data)
    }
}

impl Decode for PacketChunk {
    fn decode(data: impl IntoIterator<Item = u8>) -> Result<Self, DecodeError> {
        let mut data = data.into_iter();
        // Unknown flag bits are tolerated so that newer senders can add
        // fields without breaking older receivers.
        let flags = ChunkFlags::from_bits_truncate(u8::decode(&mut data)?);
        let payload_id = u32::decode(&mut data)?;
        let chunk_id = u32::decode(&mut data)?;
        let retransmit_id = if flags.contains(ChunkFlags::RETRANSMIT_ID) {
            Some(u32::decode(&mut data)?)
        } else {
            None
        };
        let total_payload_size = if flags.contains(ChunkFlags::TOTAL_PAYLOAD_SIZE) {
            Some(u32::decode(&mut data)?)
        } else {
            None
        };

        Ok(Self {
            payload_id,
            chunk_id,
            retransmit_id,
            total_payload_size,
            payload: data.collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DecodeErrorKind;

    #[test]
    fn round_trip_with_all_fields() {
        let chunk = PacketChunk {
            payload_id: 0xDEADBEEF,
            chunk_id: 1,
            retransmit_id: Some(2),
            total_payload_size: Some(300),
            payload: b"abcdef".to_vec(),
        };
        let decoded = PacketChunk::decode(chunk.encode().unwrap()).unwrap();
        assert_eq!(decoded, chunk);
    }

    #[test]
    fn round_trip_without_optional_fields() {
        let chunk = PacketChunk {
            payload_id: 7,
            chunk_id: 3,
            retransmit_id: None,
            total_payload_size: None,
            payload: vec![0x00, 0xFF, 0xC0],
        };
        let encoded = chunk.encode().unwrap();
        // flags + payload_id + chunk_id + payload
        assert_eq!(encoded.len(), 1 + 4 + 4 + 3);
        assert_eq!(PacketChunk::decode(encoded).unwrap(), chunk);
    }

    #[test]
    fn empty_payload_is_allowed() {
        let chunk = PacketChunk {
            payload_id: 1,
            chunk_id: 1,
            retransmit_id: None,
            total_payload_size: Some(0),
            payload: vec![],
        };
        assert_eq!(
            PacketChunk::decode(chunk.encode().unwrap()).unwrap(),
            chunk
        );
    }

    #[test]
    fn truncated_chunk_fails() {
        let encoded = PacketChunk {
            payload_id: 1,
            chunk_id: 2,
            retransmit_id: Some(1),
            total_payload_size: None,
            payload: vec![],
        }
        .encode()
        .unwrap();
        let result = PacketChunk::decode(encoded[..encoded.len() - 1].to_vec());
        assert_eq!(result.unwrap_err().kind, DecodeErrorKind::OutOfBytes);
    }
}
