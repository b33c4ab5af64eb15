//! Request implementation of the Publicly Verifiable Token protocol.

use std::fmt;

use blind_rsa_signatures::Secret;
use log::warn;
use rand::{CryptoRng, RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use tls_codec::Deserialize;
use tls_codec_derive::{TlsDeserialize, TlsSerialize, TlsSize};
use zeroize::Zeroize;

use crate::{
    ChallengeDigest, Nonce, PrivacyPassError, TOKEN_TYPE_BLIND_RSA, TokenInput,
    TruncatedTokenKeyId,
};

use super::{NK, PublicKey, options};

/// Token request as specified in RFC 9578:
///
/// ```c
/// struct {
///     uint16_t token_type = 0x0002;
///     uint8_t truncated_token_key_id;
///     uint8_t blinded_msg[Nk];
///  } TokenRequest;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, TlsDeserialize, TlsSerialize, TlsSize)]
pub struct TokenRequest {
    token_type: u16,
    truncated_token_key_id: TruncatedTokenKeyId,
    blinded_msg: [u8; NK],
}

impl TokenRequest {
    /// Size of a serialized token request.
    pub const SIZE: usize = 2 + 1 + NK;

    /// Assembles a token request from its fields.
    ///
    /// # Errors
    /// Returns [`PrivacyPassError::InvalidTokenRequestBlindedMessageSize`] if
    /// the blinded message is not `Nk` bytes long.
    pub fn new(
        token_type: u16,
        truncated_token_key_id: TruncatedTokenKeyId,
        blinded_msg: &[u8],
    ) -> Result<Self, PrivacyPassError> {
        let blinded_msg = <[u8; NK]>::try_from(blinded_msg)
            .map_err(|_| PrivacyPassError::InvalidTokenRequestBlindedMessageSize)?;
        Ok(Self {
            token_type,
            truncated_token_key_id,
            blinded_msg,
        })
    }

    /// Parses a token request.
    ///
    /// # Errors
    /// Returns [`PrivacyPassError::InvalidTokenRequestSize`] unless the
    /// buffer is exactly [`TokenRequest::SIZE`] bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrivacyPassError> {
        if bytes.len() != Self::SIZE {
            return Err(PrivacyPassError::InvalidTokenRequestSize);
        }
        Self::tls_deserialize(&mut &bytes[..])
            .map_err(|_| PrivacyPassError::InvalidTokenRequestSize)
    }

    /// Serializes the token request.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::SIZE);
        bytes.extend_from_slice(&self.token_type.to_be_bytes());
        bytes.push(self.truncated_token_key_id);
        bytes.extend_from_slice(&self.blinded_msg);
        bytes
    }

    /// Returns the token type.
    #[must_use]
    pub const fn token_type(&self) -> u16 {
        self.token_type
    }

    /// Returns the truncated token key ID.
    #[must_use]
    pub const fn truncated_token_key_id(&self) -> TruncatedTokenKeyId {
        self.truncated_token_key_id
    }

    /// Returns the blinded message.
    #[must_use]
    pub const fn blinded_msg(&self) -> &[u8; NK] {
        &self.blinded_msg
    }
}

/// Client state that is kept between the token request and the token
/// response.
///
/// The blinding inverse is wiped when the value is dropped, and
/// [`finalize`](PreparedRequest::finalize) consumes it, so a prepared request
/// yields at most one token.
pub struct PreparedRequest {
    pub(crate) public_key: PublicKey,
    pub(crate) nonce: Nonce,
    pub(crate) challenge_digest: ChallengeDigest,
    pub(crate) blinded_msg: [u8; NK],
    pub(crate) secret: Secret,
}

impl PreparedRequest {
    /// Returns the token request to send to the issuer.
    #[must_use]
    pub fn token_request(&self) -> TokenRequest {
        TokenRequest {
            token_type: TOKEN_TYPE_BLIND_RSA,
            truncated_token_key_id: self.public_key.truncated_token_key_id(),
            blinded_msg: self.blinded_msg,
        }
    }

    /// Returns the nonce of the token being requested.
    #[must_use]
    pub const fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// Returns the digest of the challenge the token is bound to.
    #[must_use]
    pub const fn challenge_digest(&self) -> &ChallengeDigest {
        &self.challenge_digest
    }

    /// Returns the issuer key the request was blinded for.
    #[must_use]
    pub const fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

impl Drop for PreparedRequest {
    fn drop(&mut self) {
        self.secret.0.zeroize();
    }
}

impl fmt::Debug for PreparedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedRequest")
            .field("public_key", &self.public_key)
            .field("challenge_digest", &self.challenge_digest)
            .finish_non_exhaustive()
    }
}

impl PublicKey {
    /// Prepares a token request for the given serialized challenge, drawing
    /// the nonce and blinding randomness from the operating system RNG.
    ///
    /// # Errors
    /// Returns an error if the token input cannot be blinded.
    pub fn request(&self, challenge: &[u8]) -> Result<PreparedRequest, PrivacyPassError> {
        self.request_with_rng(&mut OsRng, challenge)
    }

    /// Prepares a token request for the given serialized challenge.
    ///
    /// The RNG is first asked for the 32 byte nonce, then by the signing
    /// library for the PSS salt and the blind.
    ///
    /// # Errors
    /// Returns an error if the token input cannot be blinded or the key is
    /// not a 2048-bit key.
    pub fn request_with_rng<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        challenge: &[u8],
    ) -> Result<PreparedRequest, PrivacyPassError> {
        // nonce = random(32)
        // challenge_digest = SHA256(challenge)
        // token_input = concat(0x0002, nonce, challenge_digest, token_key_id)
        // blinded_msg, blind_inv = rsabssa_blind(pkI, PrepareIdentity(token_input))
        let mut nonce: Nonce = [0u8; 32];
        rng.fill_bytes(&mut nonce);

        let challenge_digest: ChallengeDigest = Sha256::digest(challenge).into();

        let token_input = TokenInput::new(
            TOKEN_TYPE_BLIND_RSA,
            nonce,
            challenge_digest,
            *self.token_key_id(),
        );

        let blinding_result = self
            .native()
            .blind(rng, token_input.serialize(), false, &options())
            .inspect_err(|e| warn!(error:% = e; "Failed to blind token input"))
            .map_err(|_| PrivacyPassError::BlindingFailed)?;

        let mut secret = blinding_result.secret;
        let Ok(blinded_msg) = <[u8; NK]>::try_from(blinding_result.blind_msg.0.as_slice()) else {
            secret.0.zeroize();
            return Err(PrivacyPassError::InvalidKeySize);
        };

        Ok(PreparedRequest {
            public_key: self.clone(),
            nonce,
            challenge_digest,
            blinded_msg,
            secret,
        })
    }
}

#[test]
fn token_request_size_is_exact() {
    let request = TokenRequest::new(TOKEN_TYPE_BLIND_RSA, 0x2a, &[0xffu8; NK]).unwrap();
    let bytes = request.to_bytes();

    assert_eq!(bytes.len(), TokenRequest::SIZE);
    assert_eq!(&bytes[..3], &[0x00, 0x02, 0x2a]);
    assert_eq!(TokenRequest::from_bytes(&bytes).unwrap(), request);

    assert_eq!(
        TokenRequest::from_bytes(&bytes[..TokenRequest::SIZE - 1]),
        Err(PrivacyPassError::InvalidTokenRequestSize)
    );
    let mut long = bytes;
    long.push(0);
    assert_eq!(
        TokenRequest::from_bytes(&long),
        Err(PrivacyPassError::InvalidTokenRequestSize)
    );
    assert_eq!(
        TokenRequest::new(TOKEN_TYPE_BLIND_RSA, 0x2a, &[0u8; NK - 1]),
        Err(PrivacyPassError::InvalidTokenRequestBlindedMessageSize)
    );
}
