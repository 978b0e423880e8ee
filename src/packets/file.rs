//! File transfer messages.

use crate::decode::{Decode, DecodeError, DecodeErrorKind};
use crate::encode::{Encode, EncodeError};

/// Announces a file transfer to listening stations.
///
/// The `id` links this header with the [`FileTransferChunk`]s of the same
/// transfer; a receiver knows the transfer is done once it has `size`
/// contiguous bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransferHeader {
    pub id: u32,
    /// Total size of the file in bytes.
    pub size: u64,
    /// Basename of the file being transferred.
    pub filename: String,
}

impl Encode for FileTransferHeader {
    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut data = self.id.encode()?;
        data.extend(self.size.encode()?);
        data.extend_from_slice(self.filename.as_bytes());
        Ok(data)
    }
}

impl Decode for FileTransferHeader {
    fn decode(data: impl IntoIterator<Item = u8>) -> Result<Self, DecodeError> {
        let mut data = data.into_iter();
        let id = u32::decode(&mut data)?;
        let size = u64::decode(&mut data)?;
        let filename = String::from_utf8(data.collect()).map_err(|e| {
            DecodeError::new::<Self>(DecodeErrorKind::InvalidStringContents(e.utf8_error()))
        })?;

        Ok(Self { id, size, filename })
    }
}

/// One slice of file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransferChunk {
    /// The transfer this chunk belongs to.
    pub id: u32,
    /// 1-based position of this chunk within the file.
    pub chunk_id: u32,
    pub chunk: Vec<u8>,
}

impl Encode for FileTransferChunk {
    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut data = self.id.encode()?;
        data.extend(self.chunk_id.encode()?);
        data.extend_from_slice(&self.chunk);
        Ok(data)
    }
}

impl Decode for FileTransferChunk {
    fn decode(data: impl IntoIterator<Item = u8>) -> Result<Self, DecodeError> {
        let mut data = data.into_iter();
        let id = u32::decode(&mut data)?;
        let chunk_id = u32::decode(&mut data)?;

        Ok(Self {
            id,
            chunk_id,
            chunk: data.collect(),
        })
    }
}
