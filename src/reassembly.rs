//! Handles incoming packet chunks and forms complete packets.

use std::collections::VecDeque;
use std::time::Duration;

use log::{info, warn};
use tokio::time::Instant;

use crate::decode::{Decode, DecodeError};
use crate::packets::{Packet, PacketChunk};

/// Partial payloads idle longer than this are dropped. Generous because a
/// large payload legitimately takes many minutes at the default 20 second
/// transmit interval.
pub const STALE_PAYLOAD_AGE: Duration = Duration::from_secs(60 * 60);

/// How many delivered payload ids are remembered for duplicate suppression.
const COMPLETED_CAPACITY: usize = 64;

/// Collects [`PacketChunk`]s and yields each completed [`Packet`] exactly
/// once, regardless of chunk ordering or duplication on the air.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    pending: Vec<PendingPayload>,
    completed: VecDeque<u32>,
}

/// Incoming chunks for a given payload.
#[derive(Debug)]
struct PendingPayload {
    payload_id: u32,
    /// When the last chunk for this payload arrived.
    last_fragment_time: Instant,
    chunks: Vec<PacketChunk>,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes one received chunk, returning the completed packet if this
    /// chunk finished its payload.
    ///
    /// Invalid and duplicate chunks are logged and swallowed. The only error
    /// is a payload that reaches its declared size but fails to parse, which
    /// means the stations disagree on the packet format and nothing further
    /// can be salvaged from this stream.
    pub fn push(&mut self, chunk: PacketChunk) -> Result<Option<Packet>, DecodeError> {
        if chunk.chunk_id == 0 {
            warn!("received packet chunk with invalid chunk id 0");
            return Ok(None);
        }
        if chunk.chunk_id == 1 && chunk.total_payload_size.is_none() {
            warn!("received first packet chunk with missing total payload size");
            return Ok(None);
        }

        if self.completed.contains(&chunk.payload_id) {
            info!(
                "received packet chunk for completed payload {}",
                chunk.payload_id
            );
            return Ok(None);
        }

        let Some(index) = self
            .pending
            .iter()
            .position(|payload| payload.payload_id == chunk.payload_id)
        else {
            info!("receiving new payload with id {}", chunk.payload_id);
            let mut payload = PendingPayload {
                payload_id: chunk.payload_id,
                last_fragment_time: Instant::now(),
                chunks: vec![chunk],
            };
            return match payload.try_complete()? {
                Some(packet) => {
                    self.mark_completed(payload.payload_id);
                    Ok(Some(packet))
                }
                None => {
                    self.pending.push(payload);
                    Ok(None)
                }
            };
        };

        let payload = &mut self.pending[index];
        payload.last_fragment_time = Instant::now();

        if payload
            .chunks
            .iter()
            .any(|existing| existing.chunk_id == chunk.chunk_id)
        {
            info!(
                "ignoring packet chunk with id {} that has already been received",
                chunk.chunk_id
            );
            return Ok(None);
        }

        payload.chunks.push(chunk);
        match payload.try_complete()? {
            Some(packet) => {
                let payload_id = payload.payload_id;
                self.pending.remove(index);
                self.mark_completed(payload_id);
                Ok(Some(packet))
            }
            None => Ok(None),
        }
    }

    /// Drops partial payloads that have not seen a chunk within `max_age`.
    pub fn evict_stale(&mut self, max_age: Duration) {
        let now = Instant::now();
        self.pending.retain(|payload| {
            let stale = now.duration_since(payload.last_fragment_time) > max_age;
            if stale {
                warn!("dropping stale partial payload {}", payload.payload_id);
            }
            !stale
        });
    }

    fn mark_completed(&mut self, payload_id: u32) {
        self.completed.push_back(payload_id);
        if self.completed.len() > COMPLETED_CAPACITY {
            self.completed.pop_front();
        }
    }
}

impl PendingPayload {
    /// Concatenates the chunks in order and parses the packet once the
    /// declared total size has arrived.
    fn try_complete(&mut self) -> Result<Option<Packet>, DecodeError> {
        self.chunks.sort_by_key(|chunk| chunk.chunk_id);

        let Some(total_payload_size) = self.chunks.first().and_then(|c| c.total_payload_size)
        else {
            info!("payload {} is still missing its first chunk", self.payload_id);
            return Ok(None);
        };

        let payload: Vec<u8> = self
            .chunks
            .iter()
            .flat_map(|chunk| chunk.payload.iter().copied())
            .collect();
        if payload.len() != total_payload_size as usize {
            info!(
                "payload {} received {}/{} bytes",
                self.payload_id,
                payload.len(),
                total_payload_size
            );
            return Ok(None);
        }

        // A payload of the declared size that does not parse violates the
        // packet contract; this is not recoverable by waiting for more
        // chunks.
        let packet = Packet::decode(payload)?;
        info!(
            "complete payload {} received {}/{} bytes",
            self.payload_id, total_payload_size, total_payload_size
        );
        Ok(Some(packet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::Encode;
    use crate::packets::FileTransferChunk;

    fn test_packet() -> Packet {
        Packet::FileTransferChunk(FileTransferChunk {
            id: 9,
            chunk_id: 1,
            chunk: b"The quick brown fox jumps over the lazy dog".to_vec(),
        })
    }

    /// Splits a serialized packet the way the sending side does.
    fn chunks_of(packet: &Packet, payload_id: u32, chunk_size: usize) -> Vec<PacketChunk> {
        let serialized = packet.encode().unwrap();
        serialized
            .chunks(chunk_size)
            .enumerate()
            .map(|(i, window)| PacketChunk {
                payload_id,
                chunk_id: i as u32 + 1,
                retransmit_id: Some(1),
                total_payload_size: (i == 0).then(|| serialized.len() as u32),
                payload: window.to_vec(),
            })
            .collect()
    }

    #[test]
    fn single_chunk_payload_completes() {
        let packet = test_packet();
        let mut assembler = ChunkAssembler::new();
        let chunks = chunks_of(&packet, 1, 1000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(assembler.push(chunks[0].clone()).unwrap(), Some(packet));
    }

    #[test]
    fn in_order_chunks_complete() {
        let packet = test_packet();
        let mut assembler = ChunkAssembler::new();
        let chunks = chunks_of(&packet, 1, 10);
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.into_iter().enumerate() {
            let delivered = assembler.push(chunk).unwrap();
            if i == last {
                assert_eq!(delivered, Some(packet.clone()));
            } else {
                assert_eq!(delivered, None);
            }
        }
    }

    #[test]
    fn out_of_order_chunks_complete_identically() {
        let packet = test_packet();
        // Try a handful of fixed permutations, including fully reversed.
        let mut chunks = chunks_of(&packet, 1, 7);
        for rotation in 0..chunks.len() {
            chunks.rotate_left(1);
            chunks.reverse();
            let mut assembler = ChunkAssembler::new();
            let mut delivered = Vec::new();
            for chunk in chunks.clone() {
                delivered.extend(assembler.push(chunk).unwrap());
            }
            assert_eq!(delivered, [packet.clone()], "rotation {rotation}");
        }
    }

    #[test]
    fn duplicate_chunk_is_ignored() {
        let packet = test_packet();
        let mut assembler = ChunkAssembler::new();
        let chunks = chunks_of(&packet, 1, 10);
        assert!(assembler.push(chunks[0].clone()).unwrap().is_none());
        assert!(assembler.push(chunks[0].clone()).unwrap().is_none());
        for chunk in &chunks[1..chunks.len() - 1] {
            assert!(assembler.push(chunk.clone()).unwrap().is_none());
        }
        assert_eq!(
            assembler.push(chunks[chunks.len() - 1].clone()).unwrap(),
            Some(packet)
        );
    }

    #[test]
    fn duplicate_suppression_ignores_retransmit_id() {
        // Same chunk id from a different retransmission pass is still a
        // duplicate.
        let packet = test_packet();
        let mut assembler = ChunkAssembler::new();
        let chunks = chunks_of(&packet, 1, 10);
        assert!(assembler.push(chunks[0].clone()).unwrap().is_none());
        let mut retransmitted = chunks[0].clone();
        retransmitted.retransmit_id = Some(2);
        assert!(assembler.push(retransmitted).unwrap().is_none());
    }

    #[test]
    fn completed_payload_is_delivered_only_once() {
        let packet = test_packet();
        let mut assembler = ChunkAssembler::new();
        let chunks = chunks_of(&packet, 1, 10);
        for chunk in chunks.clone() {
            assembler.push(chunk).unwrap();
        }
        for chunk in chunks {
            assert_eq!(assembler.push(chunk).unwrap(), None);
        }
    }

    #[test]
    fn interleaved_payloads_complete_independently() {
        let packet_a = test_packet();
        let packet_b = Packet::FileTransferChunk(FileTransferChunk {
            id: 10,
            chunk_id: 2,
            chunk: b"second payload contents".to_vec(),
        });
        let chunks_a = chunks_of(&packet_a, 1, 10);
        let chunks_b = chunks_of(&packet_b, 2, 10);

        let mut assembler = ChunkAssembler::new();
        let mut delivered = Vec::new();
        for (a, b) in chunks_a.iter().zip(chunks_b.iter()) {
            delivered.extend(assembler.push(a.clone()).unwrap());
            delivered.extend(assembler.push(b.clone()).unwrap());
        }
        for chunk in chunks_a.iter().skip(chunks_b.len()) {
            delivered.extend(assembler.push(chunk.clone()).unwrap());
        }
        assert!(delivered.contains(&packet_a));
        assert!(delivered.contains(&packet_b));
        assert_eq!(delivered.len(), 2);
    }

    #[test]
    fn first_chunk_without_total_size_is_dropped() {
        let mut chunk = chunks_of(&test_packet(), 1, 1000).remove(0);
        chunk.total_payload_size = None;
        let mut assembler = ChunkAssembler::new();
        assert_eq!(assembler.push(chunk).unwrap(), None);
    }

    #[test]
    fn chunk_id_zero_is_dropped() {
        let mut chunk = chunks_of(&test_packet(), 1, 1000).remove(0);
        chunk.chunk_id = 0;
        let mut assembler = ChunkAssembler::new();
        assert_eq!(assembler.push(chunk).unwrap(), None);
    }

    #[test]
    fn declared_size_with_unparseable_contents_is_an_error() {
        let chunk = PacketChunk {
            payload_id: 1,
            chunk_id: 1,
            retransmit_id: None,
            total_payload_size: Some(3),
            payload: vec![0x7F, 0x00, 0x00],
        };
        let mut assembler = ChunkAssembler::new();
        assert!(assembler.push(chunk).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_payloads_are_evicted() {
        let packet = test_packet();
        let chunks = chunks_of(&packet, 1, 10);
        let mut assembler = ChunkAssembler::new();
        assert!(assembler.push(chunks[0].clone()).unwrap().is_none());

        tokio::time::advance(STALE_PAYLOAD_AGE + Duration::from_secs(1)).await;
        assembler.evict_stale(STALE_PAYLOAD_AGE);

        // The evicted payload is gone: replaying everything but the first
        // chunk no longer completes it.
        for chunk in &chunks[1..] {
            assert!(assembler.push(chunk.clone()).unwrap().is_none());
        }
        // Replaying the first chunk again completes the fresh entry.
        assert_eq!(
            assembler.push(chunks[0].clone()).unwrap(),
            Some(packet)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_payloads_survive_eviction() {
        let packet = test_packet();
        let chunks = chunks_of(&packet, 1, 10);
        let mut assembler = ChunkAssembler::new();
        assert!(assembler.push(chunks[0].clone()).unwrap().is_none());

        tokio::time::advance(Duration::from_secs(60)).await;
        assembler.evict_stale(STALE_PAYLOAD_AGE);

        let mut delivered = Vec::new();
        for chunk in &chunks[1..] {
            delivered.extend(assembler.push(chunk.clone()).unwrap());
        }
        assert_eq!(delivered, [packet]);
    }
}
