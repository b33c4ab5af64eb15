//! Encoding helpers.
//!
//! Fixed-width integers on the wire are big-endian and handled by
//! `tls_codec`; this module covers the base64url forms used in the issuer
//! directory and the HTTP authentication scheme.

use base64::{
    Engine as _,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};

/// base64url with padding on output, padding optional on input.
const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encodes bytes as base64url.
#[must_use]
pub fn base64url_encode(bytes: impl AsRef<[u8]>) -> String {
    BASE64_URL.encode(bytes)
}

/// Decodes a base64url string, with or without padding.
///
/// Returns `None` if the input is not valid base64url.
#[must_use]
pub fn base64url_decode(encoded: &str) -> Option<Vec<u8>> {
    BASE64_URL.decode(encoded).ok()
}

#[test]
fn base64url_padding_is_optional() {
    let bytes = [0xfbu8, 0xff, 0x01, 0x02];
    let encoded = base64url_encode(bytes);

    assert_eq!(encoded, "-_8BAg==");
    assert_eq!(base64url_decode(&encoded).as_deref(), Some(&bytes[..]));
    assert_eq!(base64url_decode("-_8BAg").as_deref(), Some(&bytes[..]));
    assert_eq!(base64url_decode("+/8BAg=="), None);
}
