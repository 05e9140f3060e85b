//! Docshelf - a small self-hosted document store.
//!
//! Uploaded files live on disk under one base directory; their metadata lives
//! in a record store (SQLite, YAML files or memory). The [`lifecycle`] module
//! keeps the two consistent across create, download, update and delete.

// ============================================================================
// Always Available
// ============================================================================

pub mod blob;
pub mod config;
pub mod document;
pub mod error;
pub mod lifecycle;
pub mod naming;
pub mod record;
pub mod report;

pub use document::{Document, DocumentId, Download, NewDocument, Upload};
pub use error::DocumentError;
pub use lifecycle::DocumentManager;

// ============================================================================
// Server-only (behind `server` feature)
// ============================================================================

#[cfg(feature = "server")]
pub mod auth;
#[cfg(feature = "server")]
pub mod handlers;
#[cfg(feature = "server")]
pub mod response;
#[cfg(feature = "server")]
pub mod server;
