//! This module contains the authorization logic for redemption phase of the
//! protocol.

use http::{HeaderValue, header::HeaderName};
use nom::{
    IResult, Parser,
    bytes::complete::{tag, tag_no_case},
    error::{ErrorKind, make_error},
    multi::{many1, separated_list1},
};
use thiserror::Error;
use tls_codec::Deserialize;
use tls_codec_derive::{TlsDeserialize, TlsSerialize, TlsSize};

use crate::{
    ChallengeDigest, Nonce, PrivacyPassError, TokenKeyId,
    common::codec::{base64url_decode, base64url_encode},
    public_tokens::NK,
};

use super::{base64_value, key_name, opt_spaces, space};

/// A Token as defined in The Privacy Pass HTTP Authentication Scheme:
///
/// ```text
/// struct {
///     uint16_t token_type = 0x0002
///     uint8_t nonce[32];
///     uint8_t challenge_digest[32];
///     uint8_t token_key_id[32];
///     uint8_t authenticator[Nk];
/// } Token;
/// ```
#[derive(Clone, Debug, PartialEq, Eq, TlsSize, TlsSerialize, TlsDeserialize)]
pub struct Token {
    token_type: u16,
    nonce: Nonce,
    challenge_digest: ChallengeDigest,
    token_key_id: TokenKeyId,
    authenticator: [u8; NK],
}

impl Token {
    /// Size of a serialized token.
    pub const SIZE: usize = 2 + 32 + 32 + 32 + NK;

    /// Creates a new Token.
    #[must_use]
    pub const fn new(
        token_type: u16,
        nonce: Nonce,
        challenge_digest: ChallengeDigest,
        token_key_id: TokenKeyId,
        authenticator: [u8; NK],
    ) -> Self {
        Self {
            token_type,
            nonce,
            challenge_digest,
            token_key_id,
            authenticator,
        }
    }

    /// Parses a token.
    ///
    /// # Errors
    /// Returns [`PrivacyPassError::InvalidTokenSize`] unless the buffer is
    /// exactly [`Token::SIZE`] bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrivacyPassError> {
        if bytes.len() != Self::SIZE {
            return Err(PrivacyPassError::InvalidTokenSize);
        }
        Self::tls_deserialize(&mut &bytes[..]).map_err(|_| PrivacyPassError::InvalidTokenSize)
    }

    /// Serializes the token.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::SIZE);
        bytes.extend_from_slice(&self.token_type.to_be_bytes());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.challenge_digest);
        bytes.extend_from_slice(&self.token_key_id);
        bytes.extend_from_slice(&self.authenticator);
        bytes
    }

    /// Returns the token type.
    #[must_use]
    pub const fn token_type(&self) -> u16 {
        self.token_type
    }

    /// Returns the nonce.
    #[must_use]
    pub const fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// Returns the challenge digest.
    #[must_use]
    pub const fn challenge_digest(&self) -> &ChallengeDigest {
        &self.challenge_digest
    }

    /// Returns the token key ID.
    #[must_use]
    pub const fn token_key_id(&self) -> &TokenKeyId {
        &self.token_key_id
    }

    /// Returns the authenticator.
    #[must_use]
    pub const fn authenticator(&self) -> &[u8; NK] {
        &self.authenticator
    }
}

/// Builds a `Authorization` header according to the following scheme:
///
/// `PrivateToken token="..."`
///
/// # Errors
/// Returns an error if the header value cannot be built.
pub fn build_authorization_header(token: &Token) -> Result<(HeaderName, HeaderValue), BuildError> {
    let value = format!("PrivateToken token=\"{}\"", base64url_encode(token.to_bytes()));
    let header_name = http::header::AUTHORIZATION;
    let header_value = HeaderValue::from_str(&value).map_err(|_| BuildError::InvalidToken)?;
    Ok((header_name, header_value))
}

/// Building error for the `Authorization` header values
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BuildError {
    #[error("Invalid token")]
    /// Invalid token
    InvalidToken,
}

/// Parses an `Authorization` header according to the following scheme:
///
/// `PrivateToken token=...`
///
/// If the header lists several tokens, the first one is returned.
///
/// # Errors
/// Returns an error if the header value is not valid.
pub fn parse_authorization_header(value: &HeaderValue) -> Result<Token, ParseError> {
    let s = value.to_str().map_err(|_| ParseError::InvalidInput)?;
    parse_header_value(s)?
        .into_iter()
        .next()
        .ok_or(ParseError::InvalidInput)
}

/// Parsing error for the `Authorization` header values
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid token")]
    /// Invalid token
    InvalidToken,
    #[error("Invalid input string")]
    /// Invalid input string
    InvalidInput,
}

fn parse_key_value(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, _) = opt_spaces(input)?;
    let (input, key) = key_name(input)?;
    let (input, _) = opt_spaces(input)?;
    let (input, _) = tag("=").parse(input)?;
    let (input, _) = opt_spaces(input)?;
    let (input, value) = match key.to_ascii_lowercase().as_str() {
        "token" => base64_value(input)?,
        _ => return Err(nom::Err::Failure(make_error(input, ErrorKind::Tag))),
    };
    let (input, _) = opt_spaces(input)?;
    Ok((input, (key, value)))
}

fn parse_private_token(input: &str) -> IResult<&str, &str> {
    let (input, _) = opt_spaces(input)?;
    let (input, _) = tag_no_case("PrivateToken").parse(input)?;
    let (input, _) = many1(space).parse(input)?;
    let (input, key_values) = separated_list1(tag(","), parse_key_value).parse(input)?;

    let mut token = None;
    let err = nom::Err::Failure(make_error(input, ErrorKind::Tag));

    for (key, value) in key_values {
        match key.to_ascii_lowercase().as_str() {
            "token" => {
                if token.is_some() {
                    return Err(err);
                }
                token = Some(value);
            }
            _ => return Err(err),
        }
    }
    let token = token.ok_or(err)?;

    Ok((input, token))
}

fn parse_private_tokens(input: &str) -> IResult<&str, Vec<&str>> {
    separated_list1(tag(","), parse_private_token).parse(input)
}

fn parse_header_value(input: &str) -> Result<Vec<Token>, ParseError> {
    let (output, tokens) = parse_private_tokens(input).map_err(|_| ParseError::InvalidInput)?;
    if !output.trim().is_empty() {
        return Err(ParseError::InvalidInput);
    }
    tokens
        .into_iter()
        .map(|token_value| {
            let bytes = base64url_decode(token_value).ok_or(ParseError::InvalidToken)?;
            Token::from_bytes(&bytes).map_err(|_| ParseError::InvalidToken)
        })
        .collect()
}
