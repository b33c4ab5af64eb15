//! Server-side implementation of the Publicly Verifiable Token protocol.

use log::{debug, warn};

use crate::{
    ChallengeDigest, NonceStore, PrivacyPassError, TOKEN_TYPE_BLIND_RSA, TruncatedTokenKeyId,
    auth::authorize::Token,
};

use super::{KEYSIZE_IN_BITS, PrivateKey, PublicKey, TokenRequest, TokenResponse};

/// Issues token responses for a single 2048-bit key.
///
/// The issuer is stateless beyond its key, so it can be shared freely across
/// requests.
#[derive(Debug, Clone)]
pub struct Issuer {
    private_key: PrivateKey,
    truncated_token_key_id: TruncatedTokenKeyId,
}

impl Issuer {
    /// Creates an issuer for the given key.
    ///
    /// # Errors
    /// Returns [`PrivacyPassError::InvalidKeySize`] if the key is not a
    /// 2048-bit key.
    pub fn new(private_key: PrivateKey) -> Result<Self, PrivacyPassError> {
        if private_key.key_size_in_bits() != KEYSIZE_IN_BITS {
            warn!(bits = private_key.key_size_in_bits(); "Rejecting issuer key with unsupported size");
            return Err(PrivacyPassError::InvalidKeySize);
        }
        let truncated_token_key_id = private_key.public_key().truncated_token_key_id();
        Ok(Self {
            private_key,
            truncated_token_key_id,
        })
    }

    /// Creates an issuer with a freshly generated key.
    ///
    /// # Errors
    /// Returns an error if key generation fails.
    pub fn generate() -> Result<Self, PrivacyPassError> {
        Self::new(PrivateKey::generate()?)
    }

    /// Returns the issuer's private key.
    #[must_use]
    pub const fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Returns the issuer's public key.
    #[must_use]
    pub const fn public_key(&self) -> &PublicKey {
        self.private_key.public_key()
    }

    /// Returns the truncated token key ID of the issuer's public key.
    #[must_use]
    pub const fn truncated_token_key_id(&self) -> TruncatedTokenKeyId {
        self.truncated_token_key_id
    }

    /// Issues a token response.
    ///
    /// # Errors
    /// Returns [`PrivacyPassError::InvalidTokenType`] or
    /// [`PrivacyPassError::InvalidTokenKeyId`] if the request is not meant
    /// for this issuer,
    /// [`PrivacyPassError::InvalidTokenRequestBlindedMessage`] if the blinded
    /// message is not smaller than the issuer's modulus, and
    /// [`PrivacyPassError::BlindSigningFailed`] if signing fails on the
    /// issuer side.
    pub fn issue(&self, token_request: &TokenRequest) -> Result<TokenResponse, PrivacyPassError> {
        if token_request.token_type() != TOKEN_TYPE_BLIND_RSA {
            return Err(PrivacyPassError::InvalidTokenType);
        }
        if token_request.truncated_token_key_id() != self.truncated_token_key_id {
            return Err(PrivacyPassError::InvalidTokenKeyId);
        }

        // blind_sig = rsabssa_blind_sign(skI, TokenRequest.blinded_msg)
        let blind_sig = self.private_key.blind_sign(token_request.blinded_msg())?;
        Ok(TokenResponse::new(blind_sig))
    }
}

/// Redeems tokens issued under a single public key.
///
/// Every nonce is accepted at most once: the verifier reserves the nonce
/// before checking the authenticator, stores it if the token is valid and
/// releases it otherwise.
#[derive(Debug)]
pub struct Verifier<NS> {
    public_key: PublicKey,
    nonce_store: NS,
    challenge_digest: Option<ChallengeDigest>,
}

impl<NS: NonceStore> Verifier<NS> {
    /// Creates a verifier that accepts tokens for any challenge.
    pub const fn new(public_key: PublicKey, nonce_store: NS) -> Self {
        Self {
            public_key,
            nonce_store,
            challenge_digest: None,
        }
    }

    /// Only accept tokens bound to the challenge with the given digest.
    #[must_use]
    pub fn with_challenge_digest(mut self, challenge_digest: ChallengeDigest) -> Self {
        self.challenge_digest = Some(challenge_digest);
        self
    }

    /// Returns the public key tokens are verified against.
    pub const fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Returns the nonce store.
    pub const fn nonce_store(&self) -> &NS {
        &self.nonce_store
    }

    /// Redeems a token.
    ///
    /// Returns `false` if the token was issued for another token type, key
    /// or challenge, if it has already been redeemed, or if the
    /// authenticator is invalid. A token that is rejected for an invalid
    /// authenticator does not consume its nonce.
    ///
    /// # Cancellation
    /// The nonce is reserved before the authenticator is checked. If the
    /// returned future is dropped while the store or release call is still
    /// pending, the nonce stays reserved and the token keeps being rejected.
    /// Callers that cancel redemptions (timeouts, `select!`) and want the
    /// token to stay redeemable have to call
    /// [`NonceStore::release`] for [`Token::nonce`] themselves; a stored
    /// nonce is not affected by that.
    pub async fn verify(&self, token: &Token) -> bool {
        if token.token_type() != TOKEN_TYPE_BLIND_RSA {
            debug!(token_type = token.token_type(); "Rejecting token with unexpected token type");
            return false;
        }
        if token.token_key_id() != self.public_key.token_key_id() {
            debug!("Rejecting token for another issuer key");
            return false;
        }
        if let Some(challenge_digest) = &self.challenge_digest
            && token.challenge_digest() != challenge_digest
        {
            debug!("Rejecting token for another challenge");
            return false;
        }

        if !self.nonce_store.reserve(token.nonce()).await {
            debug!("Rejecting token with a spent nonce");
            return false;
        }

        if self.public_key.authenticator_is_valid(token) {
            self.nonce_store.store(token.nonce()).await;
            true
        } else {
            debug!("Rejecting token with an invalid authenticator");
            self.nonce_store.release(token.nonce()).await;
            false
        }
    }
}
