//! # Publicly Verifiable Tokens
//!
//! Token type `0x0002` of RFC 9578: RSA blind signatures with a 2048-bit
//! modulus, SHA-384, PSS padding and a 48 byte salt.

use blind_rsa_signatures::Options;

pub mod keys;
pub mod registry;
pub mod request;
pub mod response;
pub mod server;
mod spki;

pub use keys::{PrivateKey, PublicKey};
pub use registry::{TieredIssuers, TieredVerifiers};
pub use request::{PreparedRequest, TokenRequest};
pub use response::TokenResponse;
pub use server::{Issuer, Verifier};

/// Size of the authenticator, the blinded message and the blind signature
pub const NK: usize = 256;

/// Size of the RSA modulus in bits
pub const KEYSIZE_IN_BITS: usize = 2048;

/// Length of the PSS salt
pub const SALT_LEN: usize = 48;

/// Publicly Verifiable Token alias
pub type PublicToken = crate::auth::authorize::Token;

/// RSABSSA-SHA384-PSS parameters shared by every operation.
fn options() -> Options {
    // SHA-384 with a 48 byte PSS salt. Callers never randomize the message.
    Options::default()
}
