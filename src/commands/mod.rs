//! High level operations driven over an [`AprsInterface`].

use std::future::Future;
use std::path::PathBuf;

use thiserror::Error;

use crate::aprs::AprsInterface;
use crate::connection::{Connection, ConnectionError};

pub mod file;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directed transfers are not supported yet")]
    DirectedModeUnsupported,
    #[error("'{}' cannot be used as a transfer name", .0.display())]
    InvalidFilename(PathBuf),
}

/// An operation composed of packet exchanges.
pub trait Command {
    type Output;

    /// Executes this command on the supplied interface.
    fn execute<C: Connection>(
        &mut self,
        interface: &mut AprsInterface<C>,
    ) -> impl Future<Output = Result<Self::Output, CommandError>>;
}
