//! Write path: file enumeration, chunking, embedding, storage.

pub mod engine;
pub mod source;

pub use engine::{CancelHandle, DocumentFailure, IngestEngine, IngestReport};
pub use source::{FileSource, LocalFileSource};
