//! File-backed JSON document storage.

mod document;
mod json;
mod location;

pub use document::Document;
pub use json::JsonDocumentStore;
pub use location::DocumentLocation;
