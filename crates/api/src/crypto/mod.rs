//! Traits for signing keys, verification keys, and their serialized forms.
//!
//! Each key algorithm implements these independently; there is no
//! cross-algorithm inheritance. Equality of serialized keys is canonical
//! byte equality.

use crate::error::CryptoError;

/// Marker trait for signature objects.
pub trait Signature {}

/// A key object with a canonical byte encoding.
pub trait SerializableKey: Sized {
    /// Serializes the object into its canonical byte form.
    fn to_bytes(&self) -> Vec<u8>;

    /// Parses the object from its canonical byte form.
    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError>;
}

/// A private key capable of producing signatures.
pub trait SigningKey {
    /// The signature type this key produces.
    type Signature: Signature;

    /// Signs a message. Never fails for a structurally valid key.
    fn sign(&self, message: &[u8]) -> Result<Self::Signature, CryptoError>;
}

/// A public key capable of verifying signatures.
pub trait VerifyingKey {
    /// The signature type this key verifies.
    type Signature: Signature;

    /// Verifies a signature over a message.
    ///
    /// Returns `Err` only when the key itself is structurally unusable;
    /// a malformed or non-matching signature is a clean `Ok(false)` at
    /// the dispatching layer above.
    fn verify(&self, message: &[u8], signature: &Self::Signature) -> Result<(), CryptoError>;
}

/// A generated keypair: private and public halves plus signing.
pub trait SigningKeyPair {
    /// The public-key type.
    type PublicKey: VerifyingKey + SerializableKey;
    /// The private-key type.
    type PrivateKey: SigningKey + SerializableKey;
    /// The signature type.
    type Signature: Signature;

    /// The public half.
    fn public_key(&self) -> Self::PublicKey;

    /// The private half.
    fn private_key(&self) -> Self::PrivateKey;

    /// Signs with the private half.
    fn sign(&self, message: &[u8]) -> Result<Self::Signature, CryptoError>;
}
