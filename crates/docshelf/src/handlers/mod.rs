//! HTTP request handlers.

mod documents;
mod health;

pub use documents::{create_document, delete_document, download_document, update_document};
pub use health::{livez, readyz};
