//! Shared building blocks: encoding helpers, errors and the in-memory nonce
//! store.

pub mod codec;
pub mod errors;
#[cfg(feature = "memory-store")]
pub mod store;
