//! A library for copying files between amateur radio stations over APRS.
//!
//! This crate is structured around two key traits: [`Encode`](encode::Encode) and [`Decode`](decode::Decode).
//! These traits are used to encode packets for transmission over the air and to decode the frames received
//! from other stations. All frame and packet types in this library have [`Encode`](encode::Encode) and/or
//! [`Decode`](decode::Decode) implementations.
//!
//! Frames reach the network through a [`Connection`](connection::Connection): either a KISS TNC attached to
//! an RF modem over TCP, or the internet APRS-IS tier (receive only). A single APRS frame carries well under
//! 256 bytes of information and delivery is best effort, so whole packets travel through the chunked
//! [`AprsInterface`](aprs::AprsInterface), which fragments, paces, retransmits, and reassembles them.
//!
//! Because manually exchanging packets is a chore, this library also provides high level
//! [`Command`](commands::Command)s. These drive whole operations, such as broadcasting a file to every
//! listening station.

pub mod aprs;
pub mod ax25;
pub mod callsign;
pub mod commands;
pub mod connection;
pub mod decode;
pub mod encode;
pub mod kiss;
pub mod packets;
pub mod reassembly;
