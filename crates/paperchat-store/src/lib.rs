//! paperchat-store — Per-paper vector indices.
//!
//! Owns the `PaperId → VectorIndex` mapping: builds indices once, coalesces
//! concurrent builds, serves similarity queries, and evicts under memory
//! pressure with transparent rebuild-on-miss.

pub mod index;
pub mod manager;

pub use index::{RetrievedChunk, VectorIndex};
pub use manager::{StoreConfig, StoreError, VectorStoreManager};
