//! File transfer commands.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{error, info, warn};
use tokio::time::Instant;

use super::{Command, CommandError};
use crate::aprs::AprsInterface;
use crate::callsign::Callsign;
use crate::connection::Connection;
use crate::packets::{FileTransferChunk, FileTransferHeader, Packet};

/// Partial transfers idle longer than this are dropped.
const STALE_TRANSFER_AGE: Duration = Duration::from_secs(60 * 60);

/// Sends one file to all listening stations.
pub struct SendFile {
    pub filename: PathBuf,
    /// Largest file slice carried in one packet. Zero sends the whole file
    /// as a single chunk.
    pub max_chunk_size: usize,
    pub callsign: Callsign,
    /// An empty peer selects broadcast mode. Directed transfers are not
    /// implemented.
    pub peer_callsign: Callsign,
    pub digipeaters: Vec<Callsign>,
    next_transfer_id: u32,
}

impl SendFile {
    pub fn new(
        filename: PathBuf,
        max_chunk_size: usize,
        callsign: Callsign,
        peer_callsign: Callsign,
        digipeaters: Vec<Callsign>,
    ) -> Self {
        Self {
            filename,
            max_chunk_size,
            callsign,
            peer_callsign,
            digipeaters,
            next_transfer_id: 0,
        }
    }

    fn next_transfer_id(&mut self) -> u32 {
        let mut transfer_id = self.next_transfer_id;
        self.next_transfer_id = self.next_transfer_id.wrapping_add(1);
        if transfer_id == 0 {
            transfer_id = self.next_transfer_id;
            self.next_transfer_id = self.next_transfer_id.wrapping_add(1);
        }
        transfer_id
    }

    async fn send_broadcast<C: Connection>(
        &self,
        interface: &mut AprsInterface<C>,
        header: &FileTransferHeader,
        chunks: &[FileTransferChunk],
    ) -> Result<(), CommandError> {
        interface
            .send_broadcast_packet(
                &Packet::FileTransferHeader(header.clone()),
                &self.callsign,
                &self.digipeaters,
            )
            .await?;
        for chunk in chunks {
            interface
                .send_broadcast_packet(
                    &Packet::FileTransferChunk(chunk.clone()),
                    &self.callsign,
                    &self.digipeaters,
                )
                .await?;
        }
        Ok(())
    }
}

impl Command for SendFile {
    type Output = ();

    async fn execute<C: Connection>(
        &mut self,
        interface: &mut AprsInterface<C>,
    ) -> Result<(), CommandError> {
        let transfer_filename = self
            .filename
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| CommandError::InvalidFilename(self.filename.clone()))?
            .to_string();
        let contents = match tokio::fs::read(&self.filename).await {
            Ok(contents) => contents,
            Err(e) => {
                error!("failed to read file '{}': {e}", self.filename.display());
                return Err(e.into());
            }
        };

        let header = FileTransferHeader {
            id: self.next_transfer_id(),
            size: contents.len() as u64,
            filename: transfer_filename,
        };
        info!("sending file '{}'", self.filename.display());
        info!("name='{}', size={}", header.filename, header.size);

        let max_chunk_size = if self.max_chunk_size == 0 {
            contents.len()
        } else {
            self.max_chunk_size
        };
        let chunks: Vec<FileTransferChunk> = contents
            .chunks(max_chunk_size.max(1))
            .enumerate()
            .map(|(i, chunk)| FileTransferChunk {
                id: header.id,
                chunk_id: i as u32 + 1,
                chunk: chunk.to_vec(),
            })
            .collect();

        if self.peer_callsign.is_empty() {
            self.send_broadcast(interface, &header, &chunks).await
        } else {
            error!("directed mode is not supported yet");
            Err(CommandError::DirectedModeUnsupported)
        }
    }
}

/// Receives files broadcast by other stations and writes them into
/// `output_dir` as their contiguous leading bytes arrive.
pub struct ReceiveFile {
    pub callsign: Callsign,
    pub peer_callsign: Callsign,
    /// Directory received files are written into.
    pub output_dir: PathBuf,
    transfers: Vec<FileTransfer>,
}

/// Reassembly state for one transfer id.
struct FileTransfer {
    id: u32,
    /// When the last header or chunk for this transfer arrived.
    last_time: Instant,
    header: Option<FileTransferHeader>,
    /// Received chunks, kept sorted ascending by chunk id.
    chunks: Vec<FileTransferChunk>,
}

/// A pending write of the received prefix of a transfer.
#[derive(Debug, PartialEq, Eq)]
struct FileWrite {
    filename: String,
    contents: Vec<u8>,
    complete: bool,
}

impl ReceiveFile {
    pub fn new(callsign: Callsign, peer_callsign: Callsign) -> Self {
        Self {
            callsign,
            peer_callsign,
            output_dir: PathBuf::from("."),
            transfers: Vec::new(),
        }
    }

    fn handle_header(&mut self, header: FileTransferHeader) {
        match self.transfers.iter().position(|t| t.id == header.id) {
            Some(index) => {
                let transfer = &mut self.transfers[index];
                transfer.last_time = Instant::now();
                transfer.header = Some(header);
            }
            None => self.transfers.push(FileTransfer {
                id: header.id,
                last_time: Instant::now(),
                header: Some(header),
                chunks: Vec::new(),
            }),
        }
    }

    fn handle_chunk(&mut self, chunk: FileTransferChunk) -> Option<FileWrite> {
        let Some(index) = self.transfers.iter().position(|t| t.id == chunk.id) else {
            self.transfers.push(FileTransfer {
                id: chunk.id,
                last_time: Instant::now(),
                header: None,
                chunks: vec![chunk],
            });
            return None;
        };
        let transfer = &mut self.transfers[index];
        transfer.last_time = Instant::now();

        if transfer
            .chunks
            .iter()
            .any(|existing| existing.chunk_id == chunk.chunk_id)
        {
            match &transfer.header {
                Some(header) => info!(
                    "ignoring chunk id {} that '{}' has already received",
                    chunk.chunk_id, header.filename
                ),
                None => info!(
                    "ignoring chunk id {} that transfer {} has already received",
                    chunk.chunk_id, transfer.id
                ),
            }
            return None;
        }

        transfer.chunks.push(chunk);
        transfer.chunks.sort_by_key(|chunk| chunk.chunk_id);
        if let Some(missing) = transfer.first_missing_chunk() {
            warn!("transfer {} is missing chunk {}", transfer.id, missing);
        }

        let contents = transfer.contiguous_prefix();
        if contents.is_empty() {
            return None;
        }
        let Some(header) = &transfer.header else {
            info!("header unavailable to write file contents");
            return None;
        };

        Some(FileWrite {
            filename: header.filename.clone(),
            complete: contents.len() as u64 == header.size,
            contents,
        })
    }

    async fn persist(&self, write: &FileWrite) -> Result<(), CommandError> {
        let Some(filename) = sanitized_filename(&write.filename) else {
            warn!(
                "refusing to write file with unusable name '{}'",
                write.filename.escape_default()
            );
            return Ok(());
        };

        let path = self.output_dir.join(filename);
        info!("writing file '{}' to disk", path.display());
        tokio::fs::write(&path, &write.contents).await?;

        if write.complete {
            info!("file transfer '{}' complete", filename);
        }
        Ok(())
    }

    fn evict_stale(&mut self) {
        let now = Instant::now();
        self.transfers.retain(|transfer| {
            let stale = now.duration_since(transfer.last_time) > STALE_TRANSFER_AGE;
            if stale {
                warn!("dropping stale file transfer {}", transfer.id);
            }
            !stale
        });
    }
}

impl Command for ReceiveFile {
    type Output = ();

    async fn execute<C: Connection>(
        &mut self,
        interface: &mut AprsInterface<C>,
    ) -> Result<(), CommandError> {
        loop {
            let (packet, source, _digipeaters) = interface.receive_broadcast_packet().await?;
            self.evict_stale();

            match packet {
                Packet::FileTransferHeader(header) => {
                    info!(
                        "received transfer request with id {} for file '{}' from {}",
                        header.id,
                        header.filename.escape_default(),
                        source
                    );
                    self.handle_header(header);
                }
                Packet::FileTransferChunk(chunk) => {
                    info!(
                        "received transfer chunk id {} for transfer {} from {}",
                        chunk.chunk_id, chunk.id, source
                    );
                    if let Some(write) = self.handle_chunk(chunk) {
                        self.persist(&write).await?;
                    }
                }
            }
        }
    }
}

impl FileTransfer {
    /// The lowest chunk id missing below the highest received chunk, if any.
    fn first_missing_chunk(&self) -> Option<u32> {
        let mut expected = 1;
        for chunk in &self.chunks {
            if chunk.chunk_id != expected {
                return Some(expected);
            }
            expected += 1;
        }
        None
    }

    /// Concatenates the contiguous run of chunks starting at chunk id 1.
    fn contiguous_prefix(&self) -> Vec<u8> {
        let mut contents = Vec::new();
        let mut expected = 1;
        for chunk in &self.chunks {
            if chunk.chunk_id != expected {
                break;
            }
            contents.extend_from_slice(&chunk.chunk);
            expected += 1;
        }
        contents
    }
}

/// Reduces a transfer's declared filename to a bare file name so a hostile
/// sender cannot write outside the output directory.
fn sanitized_filename(filename: &str) -> Option<&str> {
    Path::new(filename).file_name()?.to_str()
}
