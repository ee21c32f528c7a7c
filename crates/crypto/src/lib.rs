#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]

//! # dep2p Cryptography
//!
//! Key primitives, self-certifying identifier derivation, identities,
//! device-delegation certificates, the X.509 certificate manager, the
//! identity-binding verifier, and key-file persistence.

pub mod atomic;
pub mod binding;
pub mod device;
pub mod error;
pub mod identity;
pub mod key_store;
pub mod keys;
pub mod node_id;
pub mod x509;

pub use identity::Identity;
pub use keys::{PrivateKey, PublicKey};
