//! This module contains the authentication logic for the challenge phase of the
//! protocol.

use http::{HeaderValue, header::HeaderName};
use nom::{
    IResult, Parser,
    bytes::complete::{tag, tag_no_case},
    error::{ErrorKind, make_error},
    multi::{many1, separated_list1},
};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tls_codec::{Deserialize, TlsByteVecU8, TlsByteVecU16};
use tls_codec_derive::{TlsDeserialize, TlsSerialize, TlsSize};

use crate::{
    ChallengeDigest, PrivacyPassError, TokenType,
    common::codec::{base64url_decode, base64url_encode},
    public_tokens::PublicKey,
};

use super::{base64_value, key_name, number_value, opt_spaces, space};

/// Redemption context field of a `TokenChallenge`
pub type RedemptionContext = [u8; 32];

/// Separator between the origin names of the origin info field.
pub const ORIGIN_INFO_SEPARATOR: char = ' ';

/// A `TokenChallenge`, as defined in The Privacy Pass HTTP Authentication Scheme:
///
/// ```text
/// struct {
///     uint16_t token_type;
///     opaque issuer_name<1..2^16-1>;
///     opaque redemption_context<0..32>;
///     opaque origin_info<0..2^16-1>;
/// } TokenChallenge;
/// ```
#[derive(Clone, Debug, PartialEq, Eq, TlsSize, TlsDeserialize, TlsSerialize)]
pub struct TokenChallenge {
    token_type: u16,
    issuer_name: TlsByteVecU16,
    redemption_context: TlsByteVecU8,
    origin_info: TlsByteVecU16,
}

impl TokenChallenge {
    /// Creates a new `TokenChallenge`.
    ///
    /// # Errors
    /// Returns [`PrivacyPassError::InvalidIssuer`] if the issuer name is empty
    /// or too long, and [`PrivacyPassError::InvalidOriginInfo`] if an origin
    /// name is empty, contains a space, or the names do not fit the field.
    pub fn new(
        token_type: TokenType,
        issuer_name: &str,
        redemption_context: Option<RedemptionContext>,
        origin_info: &[impl AsRef<str>],
    ) -> Result<Self, PrivacyPassError> {
        if issuer_name.is_empty() || issuer_name.len() > usize::from(u16::MAX) {
            return Err(PrivacyPassError::InvalidIssuer);
        }
        if origin_info
            .iter()
            .any(|origin| origin.as_ref().is_empty() || origin.as_ref().contains(ORIGIN_INFO_SEPARATOR))
        {
            return Err(PrivacyPassError::InvalidOriginInfo);
        }
        let origin_info = origin_info
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<&str>>()
            .join(&ORIGIN_INFO_SEPARATOR.to_string());
        if origin_info.len() > usize::from(u16::MAX) {
            return Err(PrivacyPassError::InvalidOriginInfo);
        }

        Ok(Self {
            token_type: token_type.into(),
            issuer_name: issuer_name.as_bytes().into(),
            redemption_context: TlsByteVecU8::new(
                redemption_context.map(|rc| rc.to_vec()).unwrap_or_default(),
            ),
            origin_info: origin_info.as_bytes().into(),
        })
    }

    /// Parses a `TokenChallenge`.
    ///
    /// # Errors
    /// Returns [`PrivacyPassError::InvalidTokenChallengeSize`] if the buffer
    /// is truncated or has trailing bytes, and the matching field error if
    /// the issuer name, redemption context or origin info is malformed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrivacyPassError> {
        let mut reader = bytes;
        let challenge = Self::tls_deserialize(&mut reader)
            .map_err(|_| PrivacyPassError::InvalidTokenChallengeSize)?;
        if !reader.is_empty() {
            return Err(PrivacyPassError::InvalidTokenChallengeSize);
        }
        challenge.validate()?;
        Ok(challenge)
    }

    fn validate(&self) -> Result<(), PrivacyPassError> {
        let issuer_name = self.issuer_name.as_slice();
        if issuer_name.is_empty() || std::str::from_utf8(issuer_name).is_err() {
            return Err(PrivacyPassError::InvalidIssuer);
        }
        if !matches!(self.redemption_context.as_slice().len(), 0 | 32) {
            return Err(PrivacyPassError::InvalidRedemptionContext);
        }
        let origin_info = std::str::from_utf8(self.origin_info.as_slice())
            .map_err(|_| PrivacyPassError::InvalidOriginInfo)?;
        if !origin_info.is_empty() && origin_info.split(ORIGIN_INFO_SEPARATOR).any(str::is_empty) {
            return Err(PrivacyPassError::InvalidOriginInfo);
        }
        Ok(())
    }

    /// Serializes the `TokenChallenge`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let issuer_name = self.issuer_name.as_slice();
        let redemption_context = self.redemption_context.as_slice();
        let origin_info = self.origin_info.as_slice();

        let mut bytes = Vec::with_capacity(
            2 + 2 + issuer_name.len() + 1 + redemption_context.len() + 2 + origin_info.len(),
        );
        bytes.extend_from_slice(&self.token_type.to_be_bytes());
        bytes.extend_from_slice(&(issuer_name.len() as u16).to_be_bytes());
        bytes.extend_from_slice(issuer_name);
        bytes.push(redemption_context.len() as u8);
        bytes.extend_from_slice(redemption_context);
        bytes.extend_from_slice(&(origin_info.len() as u16).to_be_bytes());
        bytes.extend_from_slice(origin_info);
        bytes
    }

    /// Serializes the `TokenChallenge` as a base64url encoded string.
    #[must_use]
    pub fn to_base64url(&self) -> String {
        base64url_encode(self.to_bytes())
    }

    /// Deserializes a `TokenChallenge` from a base64url encoded string.
    ///
    /// # Errors
    /// Returns [`PrivacyPassError::InvalidTokenChallenge`] if the string is
    /// not base64url, or any error of [`TokenChallenge::from_bytes`].
    pub fn from_base64url(s: &str) -> Result<Self, PrivacyPassError> {
        let bytes = base64url_decode(s).ok_or(PrivacyPassError::InvalidTokenChallenge)?;
        Self::from_bytes(&bytes)
    }

    /// Serializes and hashes the `TokenChallenge` with SHA256.
    #[must_use]
    pub fn digest(&self) -> ChallengeDigest {
        Sha256::digest(self.to_bytes()).into()
    }

    /// Returns the token type.
    #[must_use]
    pub const fn token_type(&self) -> u16 {
        self.token_type
    }

    /// Returns the issuer name.
    #[must_use]
    pub fn issuer_name(&self) -> &str {
        std::str::from_utf8(self.issuer_name.as_slice()).unwrap_or_default()
    }

    /// Returns the redemption context, if any.
    #[must_use]
    pub fn redemption_context(&self) -> Option<&RedemptionContext> {
        self.redemption_context.as_slice().try_into().ok()
    }

    /// Returns the origin names the challenge is bound to.
    #[must_use]
    pub fn origin_info(&self) -> Vec<&str> {
        std::str::from_utf8(self.origin_info.as_slice())
            .unwrap_or_default()
            .split(ORIGIN_INFO_SEPARATOR)
            .filter(|origin| !origin.is_empty())
            .collect()
    }
}

/// Builds a `WWW-Authenticate` header according to the following scheme:
///
/// `PrivateToken challenge="...", token-key="..."[, max-age=...]`
///
/// # Errors
/// Returns an error if the header value cannot be built.
pub fn build_www_authenticate_header(
    token_challenge: &TokenChallenge,
    token_key: &PublicKey,
    max_age: Option<usize>,
) -> Result<(HeaderName, HeaderValue), BuildError> {
    let challenge_value = token_challenge.to_base64url();
    let token_key_value = base64url_encode(token_key.spki());
    let max_age_string = max_age.map_or_else(String::new, |max_age| format!(", max-age={max_age}"));

    let value = format!(
        "PrivateToken challenge=\"{challenge_value}\", token-key=\"{token_key_value}\"{max_age_string}"
    );
    let header_name = http::header::WWW_AUTHENTICATE;
    let header_value =
        HeaderValue::from_str(&value).map_err(|_| BuildError::InvalidTokenChallenge)?;
    Ok((header_name, header_value))
}

/// Building error for the `WWW-Authenticate` header values
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BuildError {
    #[error("Invalid TokenChallenge")]
    /// Invalid TokenChallenge
    InvalidTokenChallenge,
}

/// Parses a `WWW-Authenticate` header according to the following scheme:
///
/// `PrivateToken challenge=..., token-key=...[, max-age=...]`
///
/// Several challenges can be listed in one header value.
///
/// # Errors
/// Returns an error if the `WWW-Authenticate` header cannot be parsed.
pub fn parse_www_authenticate_header(value: &HeaderValue) -> Result<Vec<Challenge>, ParseError> {
    let s = value.to_str().map_err(|_| ParseError::InvalidInput)?;
    let (rest, challenges) = separated_list1(tag(","), parse_private_token)
        .parse(s)
        .map_err(|_| ParseError::InvalidInput)?;
    if !rest.trim().is_empty() {
        return Err(ParseError::InvalidInput);
    }

    challenges
        .into_iter()
        .map(|(challenge, token_key, max_age)| {
            Ok(Challenge {
                challenge: TokenChallenge::from_base64url(challenge)
                    .map_err(|_| ParseError::InvalidChallenge)?,
                token_key: base64url_decode(token_key).ok_or(ParseError::InvalidTokenKey)?,
                max_age: max_age
                    .map(|max_age| max_age.parse::<usize>())
                    .transpose()
                    .map_err(|_| ParseError::InvalidMaxAge)?,
            })
        })
        .collect()
}

type RawChallenge<'a> = (&'a str, &'a str, Option<&'a str>);

fn parse_key_value(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, _) = opt_spaces(input)?;
    let (input, key) = key_name(input)?;
    let (input, _) = opt_spaces(input)?;
    let (input, _) = tag("=").parse(input)?;
    let (input, _) = opt_spaces(input)?;
    let (input, value) = match key.to_ascii_lowercase().as_str() {
        "challenge" | "token-key" => base64_value(input)?,
        "max-age" => number_value(input)?,
        _ => return Err(nom::Err::Failure(make_error(input, ErrorKind::Tag))),
    };
    let (input, _) = opt_spaces(input)?;
    Ok((input, (key, value)))
}

fn parse_private_token(input: &str) -> IResult<&str, RawChallenge<'_>> {
    let (input, _) = opt_spaces(input)?;
    let (input, _) = tag_no_case("PrivateToken").parse(input)?;
    let (input, _) = many1(space).parse(input)?;
    let (input, key_values) = separated_list1(tag(","), parse_key_value).parse(input)?;

    let mut challenge = None;
    let mut token_key = None;
    let mut max_age = None;
    let err = || nom::Err::Failure(make_error(input, ErrorKind::Tag));

    for (key, value) in key_values {
        let slot = match key.to_ascii_lowercase().as_str() {
            "challenge" => &mut challenge,
            "token-key" => &mut token_key,
            "max-age" => &mut max_age,
            _ => return Err(err()),
        };
        if slot.replace(value).is_some() {
            return Err(err());
        }
    }

    let challenge = challenge.ok_or_else(err)?;
    let token_key = token_key.ok_or_else(err)?;
    Ok((input, (challenge, token_key, max_age)))
}

/// Decoded challenge from a `WWW-Authenticate` header
#[derive(Debug, PartialEq, Eq)]
pub struct Challenge {
    challenge: TokenChallenge,
    token_key: Vec<u8>,
    max_age: Option<usize>,
}

impl Challenge {
    /// Returns the token challenge
    #[must_use]
    pub const fn token_challenge(&self) -> &TokenChallenge {
        &self.challenge
    }

    /// Returns the token key as bytes
    #[must_use]
    pub fn token_key(&self) -> &[u8] {
        &self.token_key
    }

    /// Decodes the token key as an issuer public key.
    ///
    /// # Errors
    /// Returns [`PrivacyPassError::InvalidSpkiFormat`] if the token key is
    /// not an RSASSA-PSS public key.
    pub fn public_key(&self) -> Result<PublicKey, PrivacyPassError> {
        PublicKey::from_spki(&self.token_key)
    }

    /// Returns the optional max-age
    #[must_use]
    pub const fn max_age(&self) -> Option<usize> {
        self.max_age
    }
}

/// Parsing error for the `WWW-Authenticate` header values
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid challenge")]
    /// Invalid challenge
    InvalidChallenge,
    #[error("Invalid token key")]
    /// Invalid token key
    InvalidTokenKey,
    #[error("Invalid max age")]
    /// Invalid max-age
    InvalidMaxAge,
    #[error("Invalid input string")]
    /// Invalid input string
    InvalidInput,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(issuer: &str, origins: &[&str]) -> TokenChallenge {
        TokenChallenge::new(TokenType::BlindRsa, issuer, None, origins).unwrap()
    }

    #[test]
    fn challenge_layout() {
        let token_challenge = TokenChallenge::new(
            TokenType::BlindRsa,
            "issuer.example",
            Some([9u8; 32]),
            &["a.example", "b.example"],
        )
        .unwrap();
        let bytes = token_challenge.to_bytes();

        assert_eq!(&bytes[..4], &[0x00, 0x02, 0x00, 14]);
        assert_eq!(&bytes[4..18], b"issuer.example");
        assert_eq!(bytes[18], 32);
        assert_eq!(&bytes[19..51], &[9u8; 32]);
        assert_eq!(&bytes[51..53], &[0x00, 19]);
        assert_eq!(&bytes[53..], b"a.example b.example");

        let parsed = TokenChallenge::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, token_challenge);
        assert_eq!(parsed.issuer_name(), "issuer.example");
        assert_eq!(parsed.redemption_context(), Some(&[9u8; 32]));
        assert_eq!(parsed.origin_info(), vec!["a.example", "b.example"]);
        assert_eq!(
            parsed.digest(),
            <[u8; 32]>::from(Sha256::digest(&bytes))
        );
        assert_eq!(
            TokenChallenge::from_base64url(&parsed.to_base64url()).unwrap(),
            parsed
        );
    }

    #[test]
    fn challenge_validation() {
        assert_eq!(
            TokenChallenge::new(TokenType::BlindRsa, "", None, &["origin"]),
            Err(PrivacyPassError::InvalidIssuer)
        );
        assert_eq!(
            TokenChallenge::new(TokenType::BlindRsa, "issuer", None, &["two words"]),
            Err(PrivacyPassError::InvalidOriginInfo)
        );
        assert_eq!(
            TokenChallenge::new(TokenType::BlindRsa, "issuer", None, &[""]),
            Err(PrivacyPassError::InvalidOriginInfo)
        );

        let no_origin = TokenChallenge::new(TokenType::BlindRsa, "issuer", None, &[] as &[&str])
            .unwrap();
        assert!(no_origin.origin_info().is_empty());
        assert_eq!(no_origin.redemption_context(), None);

        let bytes = challenge("issuer", &["origin"]).to_bytes();

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert_eq!(
            TokenChallenge::from_bytes(&trailing),
            Err(PrivacyPassError::InvalidTokenChallengeSize)
        );
        assert_eq!(
            TokenChallenge::from_bytes(&bytes[..bytes.len() - 1]),
            Err(PrivacyPassError::InvalidTokenChallengeSize)
        );

        // redemption context of 16 bytes
        let mut context = vec![0x00, 0x02, 0x00, 0x01, b'i', 16];
        context.extend_from_slice(&[0u8; 16]);
        context.extend_from_slice(&[0x00, 0x00]);
        assert_eq!(
            TokenChallenge::from_bytes(&context),
            Err(PrivacyPassError::InvalidRedemptionContext)
        );

        // empty issuer name
        assert_eq!(
            TokenChallenge::from_bytes(&[0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00]),
            Err(PrivacyPassError::InvalidIssuer)
        );

        // origin info with a doubled separator
        assert_eq!(
            TokenChallenge::from_bytes(&[
                0x00, 0x02, 0x00, 0x01, b'i', 0x00, 0x00, 0x03, b'a', b' ', b' '
            ]),
            Err(PrivacyPassError::InvalidOriginInfo)
        );

        assert_eq!(
            TokenChallenge::from_base64url("*"),
            Err(PrivacyPassError::InvalidTokenChallenge)
        );
    }

    #[test]
    fn parser_test() {
        let challenge1 = challenge("issuer1", &["origin1"]);
        let challenge2 = challenge("issuer2", &["origin2"]);
        let token_key1 = b"sample token key 1".to_vec();
        let token_key2 = b"sample token key 2".to_vec();

        let input = HeaderValue::from_str(&format!(
            "PrivateToken challenge=\"{}\", token-key=\"{}\", max-age=10, PrivateToken challenge={}, token-key={}",
            challenge1.to_base64url(),
            base64url_encode(&token_key1),
            challenge2.to_base64url(),
            base64url_encode(&token_key2)
        ))
        .unwrap();

        let challenge_list = parse_www_authenticate_header(&input).unwrap();

        assert_eq!(
            challenge_list,
            vec![
                Challenge {
                    challenge: challenge1,
                    token_key: token_key1,
                    max_age: Some(10),
                },
                Challenge {
                    challenge: challenge2,
                    token_key: token_key2,
                    max_age: None,
                }
            ]
        );
    }

    #[test]
    fn parser_rejects_malformed_values() {
        let token_challenge = challenge("issuer", &["origin"]).to_base64url();

        for value in [
            String::new(),
            "Basic realm=x".to_string(),
            format!("PrivateToken challenge={token_challenge}"),
            format!("PrivateToken challenge={token_challenge}, token-key=AA, token-key=AA"),
            format!("PrivateToken challenge={token_challenge}, token-key=AA, realm=x"),
        ] {
            let value = HeaderValue::from_str(&value).unwrap();
            assert_eq!(
                parse_www_authenticate_header(&value),
                Err(ParseError::InvalidInput)
            );
        }

        let value =
            HeaderValue::from_str("PrivateToken challenge=AAAA, token-key=AA").unwrap();
        assert_eq!(
            parse_www_authenticate_header(&value),
            Err(ParseError::InvalidChallenge)
        );
    }
}
