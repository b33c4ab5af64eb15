//! # Privacy Pass with RSA blind signatures
//!
//! A Rust implementation of the publicly verifiable token type of the Privacy
//! Pass issuance protocol as specified in
//! [RFC 9578](https://www.rfc-editor.org/rfc/rfc9578), built on RSA blind
//! signatures (RSABSSA-SHA384-PSS-Deterministic).
//!
//! The library implements both the issuer side and the client side components
//! together with redemption:
//!
//!  - key handling and the RFC-mandated SPKI encoding
//!  - the wire structures (`TokenChallenge`, `TokenRequest`, `TokenResponse`,
//!    `Token`)
//!  - issuance, client-side blinding and finalization
//!  - verification with double-spend protection
//!  - the issuer directory and a tiered issuer registry

#![warn(missing_docs)]
#![deny(unreachable_pub)]
#![deny(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod auth;
pub mod common;
pub mod directory;
pub mod public_tokens;
#[cfg(feature = "test-utils")]
pub mod test_utils;

use async_trait::async_trait;
use std::sync::Arc;

pub use common::errors::PrivacyPassError;
pub use tls_codec::{Deserialize, Serialize};

/// Token type
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TokenType {
    /// Publicly verifiable token (Blind RSA, 2048-bit)
    BlindRsa = 2,
}

impl From<TokenType> for u16 {
    fn from(token_type: TokenType) -> Self {
        token_type as u16
    }
}

impl TryFrom<u16> for TokenType {
    type Error = PrivacyPassError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            TOKEN_TYPE_BLIND_RSA => Ok(TokenType::BlindRsa),
            _ => Err(PrivacyPassError::InvalidTokenType),
        }
    }
}

/// Wire value of [`TokenType::BlindRsa`].
pub const TOKEN_TYPE_BLIND_RSA: u16 = TokenType::BlindRsa as u16;

/// Token key ID
pub type TruncatedTokenKeyId = u8;
/// Key ID
pub type TokenKeyId = [u8; 32];
/// Nonce
pub type Nonce = [u8; 32];
/// Challenge digest
pub type ChallengeDigest = [u8; 32];

pub(crate) fn truncate_token_key_id(token_key_id: &TokenKeyId) -> TruncatedTokenKeyId {
    *token_key_id.iter().last().unwrap_or(&0)
}

/// Nonce store for tracking redeemed tokens and preventing double spending.
///
/// A nonce moves through three states: **absent → reserved → stored**, with
/// **reserved → absent** via [`release`](NonceStore::release).
///
/// # Security contract
///
/// - [`reserve`](NonceStore::reserve) is atomic per nonce: exactly one
///   concurrent caller wins, so two verifications of the same token cannot
///   both observe the nonce as unspent.
/// - [`store`](NonceStore::store) marks a nonce as spent after the
///   authenticator has been verified.
/// - [`release`](NonceStore::release) drops a reservation when verification
///   fails, so a forged token cannot burn the nonce of a genuine one.
/// - [`contains`](NonceStore::contains) reports reserved and stored nonces.
///
/// Retention is a deployment decision. Nonces are random, so an
/// implementation backed by persistent storage should expire entries only
/// once the corresponding issuer key is retired.
///
/// Implementations that talk to remote storage should report an unreachable
/// backend as "not reservable" so that verification fails closed.
///
/// The store requires interior mutability.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Returns `true` if the nonce is reserved or has been stored.
    async fn contains(&self, nonce: &Nonce) -> bool;

    /// Marks a nonce as spent.
    ///
    /// A reserved nonce becomes stored; an absent nonce is stored directly.
    async fn store(&self, nonce: &Nonce);

    /// Atomically transitions a nonce from absent to reserved.
    ///
    /// Returns `true` if newly reserved, `false` if already reserved
    /// or stored (replay / concurrent duplicate).
    async fn reserve(&self, nonce: &Nonce) -> bool;

    /// Transitions a nonce from reserved back to absent.
    ///
    /// Stored or absent nonces are left untouched.
    async fn release(&self, nonce: &Nonce);
}

#[async_trait]
impl<T: NonceStore + ?Sized> NonceStore for Arc<T> {
    async fn contains(&self, nonce: &Nonce) -> bool {
        (**self).contains(nonce).await
    }

    async fn store(&self, nonce: &Nonce) {
        (**self).store(nonce).await
    }

    async fn reserve(&self, nonce: &Nonce) -> bool {
        (**self).reserve(nonce).await
    }

    async fn release(&self, nonce: &Nonce) {
        (**self).release(nonce).await
    }
}

/// The message that is blindly signed at issuance and verified at
/// redemption.
#[derive(Debug)]
pub(crate) struct TokenInput {
    token_type: u16,
    nonce: Nonce,
    challenge_digest: ChallengeDigest,
    token_key_id: TokenKeyId,
}

impl TokenInput {
    pub(crate) const fn new(
        token_type: u16,
        nonce: Nonce,
        challenge_digest: ChallengeDigest,
        token_key_id: TokenKeyId,
    ) -> Self {
        Self {
            token_type,
            nonce,
            challenge_digest,
            token_key_id,
        }
    }

    pub(crate) fn serialize(&self) -> Vec<u8> {
        // token_input = concat(0x0002, nonce, challenge_digest, token_key_id)
        let mut token_input: Vec<u8> = Vec::with_capacity(2 + 32 + 32 + 32);
        token_input.extend_from_slice(self.token_type.to_be_bytes().as_slice());
        token_input.extend_from_slice(self.nonce.as_slice());
        token_input.extend_from_slice(self.challenge_digest.as_slice());
        token_input.extend_from_slice(self.token_key_id.as_slice());
        token_input
    }
}

/// Upper bound on key regenerations when looking for an unused truncated
/// token key ID.
pub const COLLISION_AVOIDANCE_ATTEMPTS: usize = 100;

#[test]
fn token_input_layout() {
    let input = TokenInput::new(TOKEN_TYPE_BLIND_RSA, [1u8; 32], [2u8; 32], [3u8; 32]);
    let bytes = input.serialize();

    assert_eq!(bytes.len(), 98);
    assert_eq!(&bytes[..2], &[0x00, 0x02]);
    assert_eq!(&bytes[2..34], &[1u8; 32]);
    assert_eq!(&bytes[34..66], &[2u8; 32]);
    assert_eq!(&bytes[66..], &[3u8; 32]);
}

#[test]
fn token_type_conversion() {
    assert_eq!(u16::from(TokenType::BlindRsa), 2);
    assert_eq!(TokenType::try_from(2), Ok(TokenType::BlindRsa));
    assert_eq!(
        TokenType::try_from(1),
        Err(PrivacyPassError::InvalidTokenType)
    );
    assert_eq!(truncate_token_key_id(&[7u8; 32]), 7);
}
