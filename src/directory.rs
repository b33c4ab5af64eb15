//! Token issuer directory as described in RFC 9578, section 4.
//!
//! ```json
//! {
//!   "issuer-request-uri": "https://issuer.example.net/request",
//!   "token-keys": [
//!     { "token-type": 2, "token-key": "MI...AB", "not-before": 1686913811 }
//!   ]
//! }
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use http::Uri;
use serde::{Deserialize, Serialize};

use crate::{
    TOKEN_TYPE_BLIND_RSA,
    common::{
        codec::{base64url_decode, base64url_encode},
        errors::DirectoryError,
    },
    public_tokens::PublicKey,
};

/// The list of keys an issuer currently supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenIssuerDirectory {
    /// URI that accepts token requests, absolute or relative to the issuer.
    #[serde(rename = "issuer-request-uri")]
    pub issuer_request_uri: String,
    /// Keys available on the issuer.
    #[serde(rename = "token-keys")]
    pub token_keys: Vec<TokenKey>,
}

/// A single key of the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenKey {
    /// Token type of the key.
    #[serde(rename = "token-type")]
    pub token_type: u16,
    /// Base64url encoded SPKI of the key.
    #[serde(rename = "token-key")]
    pub token_key: String,
    /// UNIX timestamp in seconds from which on the key may be used.
    #[serde(rename = "not-before", default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<u64>,
}

impl TokenKey {
    /// Creates a directory entry for a Blind RSA issuer key.
    #[must_use]
    pub fn from_public_key(public_key: &PublicKey, not_before: Option<u64>) -> Self {
        Self {
            token_type: TOKEN_TYPE_BLIND_RSA,
            token_key: base64url_encode(public_key.spki()),
            not_before,
        }
    }

    /// Decodes the key bytes, or `None` if the entry is not valid base64url.
    #[must_use]
    pub fn token_key_bytes(&self) -> Option<Vec<u8>> {
        base64url_decode(&self.token_key)
    }

    /// Decodes the entry as an issuer public key.
    ///
    /// Returns `None` for other token types and keys that do not decode.
    #[must_use]
    pub fn public_key(&self) -> Option<PublicKey> {
        if self.token_type != TOKEN_TYPE_BLIND_RSA {
            return None;
        }
        PublicKey::from_spki(&self.token_key_bytes()?).ok()
    }
}

impl TokenIssuerDirectory {
    /// Creates a directory.
    ///
    /// # Errors
    /// Returns [`DirectoryError::InvalidIssuerRequestUri`] if the issuer
    /// request URI does not parse.
    pub fn new(
        issuer_request_uri: impl Into<String>,
        token_keys: Vec<TokenKey>,
    ) -> Result<Self, DirectoryError> {
        let directory = Self {
            issuer_request_uri: issuer_request_uri.into(),
            token_keys,
        };
        directory.check_issuer_request_uri()?;
        Ok(directory)
    }

    /// Parses a directory from its JSON form.
    ///
    /// # Errors
    /// Returns an error if the document does not have the directory shape or
    /// the issuer request URI does not parse.
    pub fn from_json(json: &str) -> Result<Self, DirectoryError> {
        let directory: Self = serde_json::from_str(json)?;
        directory.check_issuer_request_uri()?;
        Ok(directory)
    }

    /// Serializes the directory to JSON.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, DirectoryError> {
        Ok(serde_json::to_string(self)?)
    }

    fn check_issuer_request_uri(&self) -> Result<(), DirectoryError> {
        self.issuer_request_uri
            .parse::<Uri>()
            .map(|_| ())
            .map_err(|_| DirectoryError::InvalidIssuerRequestUri(self.issuer_request_uri.clone()))
    }

    /// Returns the issuer request URI.
    ///
    /// # Errors
    /// Returns an error if the stored URI does not parse.
    pub fn issuer_request_uri(&self) -> Result<Uri, DirectoryError> {
        self.issuer_request_uri
            .parse()
            .map_err(|_| DirectoryError::InvalidIssuerRequestUri(self.issuer_request_uri.clone()))
    }

    /// Checks that `token_key` is listed as a Blind RSA key that is usable at
    /// `now` (UNIX seconds).
    #[must_use]
    pub fn is_valid(&self, token_key: &[u8], now: u64) -> bool {
        self.token_keys.iter().any(|key| {
            key.token_type == TOKEN_TYPE_BLIND_RSA
                && key.token_key_bytes().as_deref() == Some(token_key)
                && key.not_before.is_none_or(|not_before| now >= not_before)
        })
    }

    /// Like [`is_valid`](Self::is_valid), using the system clock.
    #[must_use]
    pub fn is_valid_now(&self, token_key: &[u8]) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        self.is_valid(token_key, now)
    }

    /// Returns the Blind RSA public keys that are usable at `now`.
    #[must_use]
    pub fn public_keys(&self, now: u64) -> Vec<PublicKey> {
        self.token_keys
            .iter()
            .filter(|key| key.not_before.is_none_or(|not_before| now >= not_before))
            .filter_map(TokenKey::public_key)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &str = r#"{"issuer-request-uri":"https://issuer.example/request","token-keys":[{"token-type":2,"token-key":"AQID","not-before":100},{"token-type":2,"token-key":"BAUG"},{"token-type":1,"token-key":"BwgJ"}]}"#;

    #[test]
    fn json_shape() {
        let directory = TokenIssuerDirectory::from_json(JSON).unwrap();

        assert_eq!(directory.issuer_request_uri, "https://issuer.example/request");
        assert_eq!(directory.token_keys.len(), 3);
        assert_eq!(directory.token_keys[0].not_before, Some(100));
        assert_eq!(directory.token_keys[1].not_before, None);
        assert_eq!(directory.token_keys[1].token_key_bytes(), Some(vec![4, 5, 6]));
        assert_eq!(directory.to_json().unwrap(), JSON);
        assert_eq!(
            directory.issuer_request_uri().unwrap().host(),
            Some("issuer.example")
        );
    }

    #[test]
    fn key_validity() {
        let directory = TokenIssuerDirectory::from_json(JSON).unwrap();

        assert!(!directory.is_valid(&[1, 2, 3], 99));
        assert!(directory.is_valid(&[1, 2, 3], 100));
        assert!(directory.is_valid(&[4, 5, 6], 0));
        assert!(directory.is_valid_now(&[4, 5, 6]));
        // listed, but for another token type
        assert!(!directory.is_valid(&[7, 8, 9], 1000));
        assert!(!directory.is_valid(&[0], 1000));
    }

    #[test]
    fn malformed_directories() {
        assert!(matches!(
            TokenIssuerDirectory::from_json("{}"),
            Err(DirectoryError::Malformed(_))
        ));
        assert!(matches!(
            TokenIssuerDirectory::from_json(
                r#"{"issuer-request-uri":"not a uri","token-keys":[]}"#
            ),
            Err(DirectoryError::InvalidIssuerRequestUri(_))
        ));
        assert!(TokenIssuerDirectory::new("/request", vec![]).is_ok());
    }
}
