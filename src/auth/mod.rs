//! Payloads of the `PrivateToken` HTTP authentication scheme (RFC 9577).
//!
//! Only the header values and media types are provided; transport is left to
//! the caller.

pub mod authenticate;
pub mod authorize;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    sequence::delimited,
};

/// Media type of a serialized `TokenRequest`.
pub const PRIVATE_TOKEN_REQUEST_CONTENT_TYPE: &str = "application/private-token-request";

/// Media type of a serialized `TokenResponse`.
pub const PRIVATE_TOKEN_RESPONSE_CONTENT_TYPE: &str = "application/private-token-response";

/// Media type of the token issuer directory.
pub const PRIVATE_TOKEN_ISSUER_DIRECTORY_CONTENT_TYPE: &str =
    "application/private-token-issuer-directory";

fn opt_spaces(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| c == ' ' || c == '\t').parse(input)
}

fn space(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c == ' ').parse(input)
}

fn key_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '-').parse(input)
}

fn base64_char(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '/' | '='))
        .parse(input)
}

/// A base64 value, optionally wrapped in double quotes.
fn base64_value(input: &str) -> IResult<&str, &str> {
    alt((delimited(tag("\""), base64_char, tag("\"")), base64_char)).parse(input)
}

fn number_value(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(tag("\""), take_while1(|c: char| c.is_ascii_digit()), tag("\"")),
        take_while1(|c: char| c.is_ascii_digit()),
    ))
    .parse(input)
}

#[test]
fn value_parsers() {
    assert_eq!(base64_value("\"AbC-_=\", x"), Ok((", x", "AbC-_=")));
    assert_eq!(base64_value("AbC-_="), Ok(("", "AbC-_=")));
    assert_eq!(number_value("\"10\""), Ok(("", "10")));
    assert!(number_value("ten").is_err());
    assert_eq!(key_name("token-key=abc"), Ok(("=abc", "token-key")));
    assert_eq!(opt_spaces("  x"), Ok(("x", "  ")));
    assert!(space("x").is_err());
}
