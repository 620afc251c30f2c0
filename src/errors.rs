//! Typed error definitions for albumsafe.
//! Provides a small set of well-known failure modes for better logs and tests.
//!
//! Journal-consistency variants are invariant violations: callers must not
//! retry them. Per-item I/O failures travel as plain `anyhow` errors and are
//! collected by the importers instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlbumError {
    #[error("a transaction is already open")]
    TransactionOpen,

    #[error("no transaction is open; call new_transaction first")]
    NoTransaction,

    #[error("redo history is not empty; discard it before starting new work")]
    RedoHistory,

    #[error("undo/redo is not available while a transaction is open")]
    UndoDuringTransaction,

    #[error("this storage provider does not support undo/redo")]
    UndoUnsupported,

    #[error("album root is not an existing directory: {0}")]
    RootInvalid(PathBuf),

    #[error("path is outside the album root: {0}")]
    OutsideAlbum(PathBuf),

    #[error("destination already exists and overwrite was not requested: {0}")]
    DestinationExists(PathBuf),

    #[error("destination name template is malformed: {0}")]
    MalformedTemplate(String),
}

impl AlbumError {
    /// Stable machine-readable code for structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            AlbumError::TransactionOpen => "transaction_open",
            AlbumError::NoTransaction => "no_transaction",
            AlbumError::RedoHistory => "redo_history",
            AlbumError::UndoDuringTransaction => "undo_during_transaction",
            AlbumError::UndoUnsupported => "undo_unsupported",
            AlbumError::RootInvalid(_) => "root_invalid",
            AlbumError::OutsideAlbum(_) => "outside_album",
            AlbumError::DestinationExists(_) => "destination_exists",
            AlbumError::MalformedTemplate(_) => "malformed_template",
        }
    }
}
