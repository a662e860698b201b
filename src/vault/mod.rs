//! Encrypted secrets vault.
//!
//! Two layers:
//! - [`codec`]: password-based encryption of an opaque payload into a
//!   self-describing hex blob.
//! - [`store`]: the on-disk secret set built on the codec, with first-run
//!   initialization and generator-based reconciliation.

pub mod codec;
mod store;

pub use codec::CodecError;
pub use store::{SecretDefinition, SecretSet, SecretsStore, StoreError};
