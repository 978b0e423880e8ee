//! The chunked packet transport over an APRS connection.
//!
//! A [`Packet`] rarely fits the information field of a single APRS frame, so
//! it is serialized, cut into [`PacketChunk`]s, and each chunk is sent as a
//! base64 user-defined information field. Transmissions are paced at a fixed
//! cadence so the RF channel sees predictable occupancy. The receive side
//! reassembles chunks that may arrive out of order, duplicated, or never.

use std::time::Duration;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use log::{info, warn};
use tokio::time::{sleep_until, Instant};

use crate::callsign::Callsign;
use crate::connection::{Connection, ConnectionError};
use crate::decode::Decode;
use crate::encode::Encode;
use crate::packets::{Packet, PacketChunk};
use crate::reassembly::{ChunkAssembler, STALE_PAYLOAD_AGE};

/// The APRS type identifier for user-defined information fields.
const USER_DEFINED_PREFIX: u8 = b'{';

/// Tuning for the chunked broadcast transport.
#[derive(Debug, Clone)]
pub struct AprsConfig {
    /// Largest chunk payload carried in one frame, in bytes.
    pub max_packet_size: usize,
    /// Fixed pause between transmitted frames.
    pub transmit_interval: Duration,
    /// How many times each payload is transmitted in full.
    pub retransmit_count: u32,
}

impl Default for AprsConfig {
    fn default() -> Self {
        Self {
            max_packet_size: 100,
            transmit_interval: Duration::from_secs(20),
            retransmit_count: 1,
        }
    }
}

/// Sends and receives whole packets over an APRS [`Connection`].
pub struct AprsInterface<C: Connection> {
    connection: C,
    config: AprsConfig,
    next_payload_id: u32,
    assembler: ChunkAssembler,
}

impl<C: Connection> AprsInterface<C> {
    pub fn new(connection: C, config: AprsConfig) -> Self {
        Self {
            connection,
            config,
            // Seed from the clock so payload ids do not collide with a
            // previous run of this program in a receiver's duplicate set.
            next_payload_id: initial_payload_id(),
            assembler: ChunkAssembler::new(),
        }
    }

    /// Sends one packet to all listening stations, fragmented and paced.
    pub async fn send_broadcast_packet(
        &mut self,
        packet: &Packet,
        source: &Callsign,
        digipeaters: &[Callsign],
    ) -> Result<(), ConnectionError> {
        let serialized = packet.encode()?;
        let payload_id = self.next_payload_id();
        info!("sending payload_id {payload_id}");

        let broadcast = Callsign::broadcast();
        let max_packet_size = self.config.max_packet_size.max(1);
        let mut next_frame_time = Instant::now();
        for retransmit_id in 1..=self.config.retransmit_count {
            let mut chunk_id = 1u32;
            let mut offset = 0usize;
            while offset < serialized.len() {
                let chunk_size = max_packet_size.min(serialized.len() - offset);
                let chunk = PacketChunk {
                    payload_id,
                    chunk_id,
                    retransmit_id: Some(retransmit_id),
                    total_payload_size: (offset == 0).then(|| serialized.len() as u32),
                    payload: serialized[offset..offset + chunk_size].to_vec(),
                };
                self.send_packet_chunk(&chunk, source, &broadcast, digipeaters)
                    .await?;
                info!(
                    "sent broadcast chunk_id={chunk_id}, offset={offset}, chunk_size={chunk_size}, \
                     total_size={}, retransmit={retransmit_id}",
                    serialized.len()
                );

                chunk_id += 1;
                offset += chunk_size;

                // Pause for the next transmission. The deadline advances by
                // the configured interval from the previous deadline, not
                // from now, so the cadence holds even when sending itself
                // takes measurable time.
                next_frame_time += self.config.transmit_interval;
                sleep_until(next_frame_time).await;
            }
        }

        Ok(())
    }

    /// The underlying connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Receives the next complete broadcast packet, blocking until one
    /// arrives. Returns the packet with the source station and digipeater
    /// path it arrived through.
    pub async fn receive_broadcast_packet(
        &mut self,
    ) -> Result<(Packet, Callsign, Vec<Callsign>), ConnectionError> {
        let broadcast = Callsign::broadcast();
        loop {
            self.assembler.evict_stale(STALE_PAYLOAD_AGE);

            let Some(frame) = self.connection.receive_frame(Duration::ZERO).await? else {
                continue;
            };
            if frame.destination != broadcast {
                continue;
            }

            if frame.information.first() != Some(&USER_DEFINED_PREFIX) {
                warn!("invalid payload");
                continue;
            }
            let serialized = match BASE64_STANDARD.decode(&frame.information[1..]) {
                Ok(serialized) => serialized,
                Err(e) => {
                    warn!("received chunk with invalid base64: {e}");
                    continue;
                }
            };
            let chunk = match PacketChunk::decode(serialized) {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!("received malformed packet chunk: {e}");
                    continue;
                }
            };

            if let Some(packet) = self.assembler.push(chunk)? {
                return Ok((packet, frame.source, frame.digipeaters));
            }
        }
    }

    async fn send_packet_chunk(
        &mut self,
        chunk: &PacketChunk,
        source: &Callsign,
        destination: &Callsign,
        digipeaters: &[Callsign],
    ) -> Result<(), ConnectionError> {
        let mut information = vec![USER_DEFINED_PREFIX];
        information.extend(BASE64_STANDARD.encode(chunk.encode()?).into_bytes());
        self.connection
            .send_frame(&information, source, destination, digipeaters)
            .await
    }

    fn next_payload_id(&mut self) -> u32 {
        let mut payload_id = self.next_payload_id;
        self.next_payload_id = self.next_payload_id.wrapping_add(1);
        if payload_id == 0 {
            payload_id = self.next_payload_id;
            self.next_payload_id = self.next_payload_id.wrapping_add(1);
        }
        payload_id
    }
}

fn initial_payload_id() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u32
}


#[cfg(test)]
mod tests {
    use super::testing::LoopbackConnection;
    use super::*;
    use crate::packets::FileTransferChunk;

    fn callsign(s: &str) -> Callsign {
        s.parse().unwrap()
    }

    fn test_packet(size: usize) -> Packet {
        Packet::FileTransferChunk(FileTransferChunk {
            id: 1,
            chunk_id: 1,
            chunk: (0..size).map(|i| i as u8).collect(),
        })
    }

    fn test_config(max_packet_size: usize) -> AprsConfig {
        AprsConfig {
            max_packet_size,
            transmit_interval: Duration::from_millis(10),
            retransmit_count: 1,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_round_trip_single_chunk() {
        let packet = test_packet(20);
        let mut interface = AprsInterface::new(LoopbackConnection::default(), test_config(100));
        interface
            .send_broadcast_packet(&packet, &callsign("KN6FVU-1"), &[])
            .await
            .unwrap();

        let (received, source, digipeaters) =
            interface.receive_broadcast_packet().await.unwrap();
        assert_eq!(received, packet);
        assert_eq!(source, callsign("KN6FVU-1"));
        assert!(digipeaters.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_round_trip_fragmented() {
        let packet = test_packet(250);
        let mut interface = AprsInterface::new(LoopbackConnection::default(), test_config(40));
        interface
            .send_broadcast_packet(&packet, &callsign("KN6FVU-1"), &[callsign("WIDE1-1")])
            .await
            .unwrap();
        assert!(interface.connection.frames.len() > 1);

        let (received, _, digipeaters) = interface.receive_broadcast_packet().await.unwrap();
        assert_eq!(received, packet);
        assert_eq!(digipeaters, vec![callsign("WIDE1-1")]);
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_round_trip_with_reordered_frames() {
        let packet = test_packet(250);
        let mut interface = AprsInterface::new(LoopbackConnection::default(), test_config(40));
        interface
            .send_broadcast_packet(&packet, &callsign("KN6FVU-1"), &[])
            .await
            .unwrap();

        interface.connection.frames.make_contiguous().reverse();
        let (received, _, _) = interface.receive_broadcast_packet().await.unwrap();
        assert_eq!(received, packet);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicated_frames_deliver_once() {
        let packet = test_packet(100);
        let mut interface = AprsInterface::new(LoopbackConnection::default(), test_config(40));
        interface
            .send_broadcast_packet(&packet, &callsign("KN6FVU-1"), &[])
            .await
            .unwrap();

        // Duplicate every frame, then follow with a sentinel payload so the
        // receive loop has somewhere to stop if duplicates were redelivered.
        let frames: Vec<_> = interface.connection.frames.iter().cloned().collect();
        for frame in frames {
            interface.connection.frames.push_back(frame);
        }
        let sentinel = test_packet(5);
        interface
            .send_broadcast_packet(&sentinel, &callsign("KN6FVU-1"), &[])
            .await
            .unwrap();

        let (first, _, _) = interface.receive_broadcast_packet().await.unwrap();
        assert_eq!(first, packet);
        let (second, _, _) = interface.receive_broadcast_packet().await.unwrap();
        assert_eq!(second, sentinel);
    }

    #[tokio::test(start_paused = true)]
    async fn retransmission_passes_resend_every_chunk() {
        let packet = test_packet(100);
        let mut config = test_config(40);
        config.retransmit_count = 3;
        let mut interface = AprsInterface::new(LoopbackConnection::default(), config);
        interface
            .send_broadcast_packet(&packet, &callsign("KN6FVU-1"), &[])
            .await
            .unwrap();

        let frames = interface.connection.frames.len();
        assert_eq!(frames % 3, 0);

        // A receiver that saw only the final pass still completes.
        for _ in 0..(frames / 3 * 2) {
            interface.connection.frames.pop_front();
        }
        let (received, _, _) = interface.receive_broadcast_packet().await.unwrap();
        assert_eq!(received, packet);
    }

    #[tokio::test(start_paused = true)]
    async fn transmissions_hold_the_configured_cadence() {
        let packet = test_packet(250);
        let interval = Duration::from_secs(20);
        let config = AprsConfig {
            max_packet_size: 40,
            transmit_interval: interval,
            retransmit_count: 1,
        };
        let mut interface = AprsInterface::new(LoopbackConnection::default(), config);

        let started = Instant::now();
        interface
            .send_broadcast_packet(&packet, &callsign("KN6FVU-1"), &[])
            .await
            .unwrap();
        let elapsed = started.elapsed();

        let frames = interface.connection.frames.len() as u32;
        assert!(frames > 1);
        assert!(elapsed >= interval * (frames - 1));
    }

    #[tokio::test(start_paused = true)]
    async fn frames_for_other_destinations_are_ignored() {
        let packet = test_packet(20);
        let mut interface = AprsInterface::new(LoopbackConnection::default(), test_config(100));

        // A frame addressed elsewhere, even with a plausible payload, is
        // skipped by the broadcast receiver.
        interface
            .connection
            .send_frame(b"{junk", &callsign("W1AW"), &callsign("APX216"), &[])
            .await
            .unwrap();
        interface
            .send_broadcast_packet(&packet, &callsign("KN6FVU-1"), &[])
            .await
            .unwrap();

        let (received, source, _) = interface.receive_broadcast_packet().await.unwrap();
        assert_eq!(received, packet);
        assert_eq!(source, callsign("KN6FVU-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_information_fields_are_skipped() {
        let packet = test_packet(20);
        let mut interface = AprsInterface::new(LoopbackConnection::default(), test_config(100));

        let broadcast = Callsign::broadcast();
        let source = callsign("W1AW");
        // Missing the `{` prefix.
        interface
            .connection
            .send_frame(b"no prefix", &source, &broadcast, &[])
            .await
            .unwrap();
        // Invalid base64 after the prefix.
        interface
            .connection
            .send_frame(b"{not-base64!", &source, &broadcast, &[])
            .await
            .unwrap();
        // Valid base64 of a truncated chunk.
        let bad = format!("{{{}", BASE64_STANDARD.encode([0x00, 0x01]));
        interface
            .connection
            .send_frame(bad.as_bytes(), &source, &broadcast, &[])
            .await
            .unwrap();

        interface
            .send_broadcast_packet(&packet, &callsign("KN6FVU-1"), &[])
            .await
            .unwrap();
        let (received, _, _) = interface.receive_broadcast_packet().await.unwrap();
        assert_eq!(received, packet);
    }

    #[test]
    fn payload_ids_skip_zero() {
        let mut interface = AprsInterface::new(LoopbackConnection::default(), test_config(100));
        interface.next_payload_id = u32::MAX;
        assert_eq!(interface.next_payload_id(), u32::MAX);
        // The counter wraps through zero and skips it.
        assert_eq!(interface.next_payload_id(), 1);
        assert_eq!(interface.next_payload_id(), 2);
    }
}
