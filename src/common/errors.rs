//! Common error types

use http::StatusCode;
use thiserror::Error;

/// Errors raised by key handling, the wire structures and issuance.
///
/// Verification never produces these: an invalid token is reported as
/// `false` by [`Verifier::verify`](crate::public_tokens::Verifier::verify).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrivacyPassError {
    #[error("Invalid issuer")]
    /// The issuer name of a token challenge is empty, too long or not UTF-8.
    InvalidIssuer,
    #[error("Invalid key size")]
    /// The RSA key is not 2048 bits.
    InvalidKeySize,
    #[error("Invalid origin info")]
    /// The origin info of a token challenge is malformed.
    InvalidOriginInfo,
    #[error("Invalid redemption context")]
    /// The redemption context is neither empty nor 32 bytes.
    InvalidRedemptionContext,
    #[error("Invalid SPKI format")]
    /// The SPKI encoding is malformed or carries unexpected parameters.
    InvalidSpkiFormat,
    #[error("Invalid token challenge")]
    /// The token challenge cannot be encoded.
    InvalidTokenChallenge,
    #[error("Invalid token challenge size")]
    /// The token challenge buffer is truncated or has trailing bytes.
    InvalidTokenChallengeSize,
    #[error("Invalid token key ID")]
    /// The truncated token key ID does not match the issuer key.
    InvalidTokenKeyId,
    #[error("Invalid token request blinded message size")]
    /// The blinded message is not `Nk` bytes.
    InvalidTokenRequestBlindedMessageSize,
    #[error("Invalid token request blinded message")]
    /// The blinded message is not smaller than the issuer's RSA modulus.
    InvalidTokenRequestBlindedMessage,
    #[error("Invalid token request size")]
    /// The token request buffer is not exactly 259 bytes.
    InvalidTokenRequestSize,
    #[error("Invalid token response size")]
    /// The token response buffer is not exactly 256 bytes.
    InvalidTokenResponseSize,
    #[error("Invalid token size")]
    /// The token buffer is not exactly 354 bytes.
    InvalidTokenSize,
    #[error("Invalid token type")]
    /// The token type is not the Blind RSA token type.
    InvalidTokenType,
    #[error("Key generation failed")]
    /// The signing library failed to generate a key pair.
    KeyGenerationFailed,
    #[error("Invalid key encoding")]
    /// A PEM or DER key could not be imported or exported.
    InvalidKeyEncoding,
    #[error("Token blinding failed")]
    /// The token input could not be blinded.
    BlindingFailed,
    #[error("Blind signing failed")]
    /// The issuer could not sign the blinded message.
    BlindSigningFailed,
    #[error("Signature finalization failed")]
    /// The blind signature could not be turned into a valid authenticator.
    FinalizationFailed,
    #[error("Truncated token key ID collision")]
    /// Two issuers share a truncated token key ID.
    TruncatedTokenKeyIdCollision,
}

impl PrivacyPassError {
    /// HTTP status an issuance endpoint answers with for this error.
    ///
    /// RFC 9578 requires `422 Unprocessable Content` when the token type,
    /// the truncated token key ID or the blinded message length of a token
    /// request does not fit the issuer. A blinded message outside the
    /// issuer's modulus is answered the same way. Only faults on the issuer
    /// side map to `500`.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidTokenType
            | Self::InvalidTokenKeyId
            | Self::InvalidTokenRequestBlindedMessageSize
            | Self::InvalidTokenRequestBlindedMessage => StatusCode::UNPROCESSABLE_ENTITY,
            Self::KeyGenerationFailed
            | Self::BlindSigningFailed
            | Self::TruncatedTokenKeyIdCollision => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Errors that can occur when decoding a token issuer directory.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Malformed directory: {0}")]
    /// The JSON document does not have the directory shape.
    Malformed(#[from] serde_json::Error),
    #[error("Invalid issuer request URI: {0}")]
    /// The `issuer-request-uri` is not a valid URI.
    InvalidIssuerRequestUri(String),
}

#[test]
fn issuance_errors_map_to_unprocessable_content() {
    assert_eq!(
        PrivacyPassError::InvalidTokenKeyId.status_code(),
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
        PrivacyPassError::InvalidTokenType.status_code(),
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
        PrivacyPassError::InvalidTokenRequestBlindedMessage.status_code(),
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
        PrivacyPassError::InvalidTokenRequestSize.status_code(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        PrivacyPassError::BlindSigningFailed.status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
