//! Response implementation of the Publicly Verifiable Token protocol.

use blind_rsa_signatures::BlindSignature;
use log::warn;
use tls_codec::Deserialize;
use tls_codec_derive::{TlsDeserialize, TlsSerialize, TlsSize};

use crate::{PrivacyPassError, TOKEN_TYPE_BLIND_RSA, TokenInput, auth::authorize::Token};

use super::{NK, PreparedRequest, options};

/// Token response as specified in RFC 9578:
///
/// ```c
/// struct {
///     uint8_t blind_sig[Nk];
///  } TokenResponse;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, TlsDeserialize, TlsSerialize, TlsSize)]
pub struct TokenResponse {
    blind_sig: [u8; NK],
}

impl TokenResponse {
    /// Size of a serialized token response.
    pub const SIZE: usize = NK;

    pub(crate) const fn new(blind_sig: [u8; NK]) -> Self {
        Self { blind_sig }
    }

    /// Parses a token response.
    ///
    /// # Errors
    /// Returns [`PrivacyPassError::InvalidTokenResponseSize`] unless the
    /// buffer is exactly [`TokenResponse::SIZE`] bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrivacyPassError> {
        if bytes.len() != Self::SIZE {
            return Err(PrivacyPassError::InvalidTokenResponseSize);
        }
        Self::tls_deserialize(&mut &bytes[..])
            .map_err(|_| PrivacyPassError::InvalidTokenResponseSize)
    }

    /// Serializes the token response.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.blind_sig.to_vec()
    }

    /// Returns the blind signature.
    #[must_use]
    pub const fn blind_sig(&self) -> &[u8; NK] {
        &self.blind_sig
    }
}

impl PreparedRequest {
    /// Turns the issuer's response into a token.
    ///
    /// The prepared request is consumed and its blinding inverse wiped, so it
    /// cannot be finalized twice.
    ///
    /// # Errors
    /// Returns [`PrivacyPassError::FinalizationFailed`] if the unblinded
    /// signature does not verify under the issuer key.
    pub fn finalize(self, token_response: TokenResponse) -> Result<Token, PrivacyPassError> {
        // token_input = concat(0x0002, nonce, challenge_digest, token_key_id)
        // authenticator = rsabssa_finalize(pkI, token_input, blind_sig, blind_inv)
        let token_key_id = *self.public_key.token_key_id();
        let token_input = TokenInput::new(
            TOKEN_TYPE_BLIND_RSA,
            self.nonce,
            self.challenge_digest,
            token_key_id,
        );
        let blind_sig = BlindSignature(token_response.blind_sig.to_vec());
        let signature = self
            .public_key
            .native()
            .finalize(
                &blind_sig,
                &self.secret,
                None,
                token_input.serialize(),
                &options(),
            )
            .inspect_err(|e| warn!(error:% = e; "Failed to finalize blind signature"))
            .map_err(|_| PrivacyPassError::FinalizationFailed)?;
        let authenticator = <[u8; NK]>::try_from(signature.0.as_slice())
            .map_err(|_| PrivacyPassError::FinalizationFailed)?;

        Ok(Token::new(
            TOKEN_TYPE_BLIND_RSA,
            self.nonce,
            self.challenge_digest,
            token_key_id,
            authenticator,
        ))
    }
}

#[test]
fn token_response_size_is_exact() {
    let response = TokenResponse::new([7u8; NK]);
    let bytes = response.to_bytes();

    assert_eq!(bytes.len(), TokenResponse::SIZE);
    assert_eq!(TokenResponse::from_bytes(&bytes).unwrap(), response);
    assert_eq!(
        TokenResponse::from_bytes(&bytes[1..]),
        Err(PrivacyPassError::InvalidTokenResponseSize)
    );
    assert_eq!(
        TokenResponse::from_bytes(&[0u8; NK + 1]),
        Err(PrivacyPassError::InvalidTokenResponseSize)
    );
}
