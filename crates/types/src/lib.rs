#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]

//! # dep2p Types
//!
//! Core data structures and error types shared by every dep2p crate:
//! node identifiers, the key-algorithm tag, configuration structures,
//! and the canonical error taxonomy.

pub mod config;
pub mod error;
pub mod keys;
pub mod node_id;

pub use keys::KeyType;
pub use node_id::NodeId;

/// Convenience alias used throughout the workspace.
pub type Result<T, E = error::TransportError> = std::result::Result<T, E>;
