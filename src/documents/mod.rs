//! Document preparation for the retrieval pipeline.
//!
//! This module provides:
//! - Sliding-window chunking with overlap
//! - Text extraction from txt/md, pdf and docx files
//! - Per-document bookkeeping used for exact deletion

pub mod chunker;
pub mod config;
pub mod extract;
pub mod types;

pub use chunker::{
    Chunker, ChunkingError, RawChunk, SlidingWindowChunker, normalize, split_into_chunks,
};
pub use config::ChunkingConfig;
pub use extract::{ExtractError, ExtractResult, extract_text};
pub use types::{DocumentState, record_id};
