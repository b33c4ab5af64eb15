//! Conversion between the signing library's key encoding and the
//! `SubjectPublicKeyInfo` mandated by RFC 9578.
//!
//! The signing library emits and accepts keys tagged `rsaEncryption`. Issuer
//! keys on the wire are tagged `id-RSASSA-PSS` with explicit parameters
//! (SHA-384, MGF1 with SHA-384, 48 byte salt, default trailer field). Both
//! directions keep the key bits and only swap the algorithm identifier.

use blind_rsa_signatures::reexports::rsa::{
    pkcs1::RsaPublicKey,
    pkcs8::{
        der::{AnyRef, Decode, Encode},
        spki::{AlgorithmIdentifier, ObjectIdentifier, SubjectPublicKeyInfo},
    },
};

use crate::PrivacyPassError;

const ID_RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const ID_RSASSA_PSS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.10");

/// DER of the only `AlgorithmIdentifier` accepted for issuer keys.
///
/// ```text
/// SEQUENCE {
///   OBJECT IDENTIFIER id-RSASSA-PSS
///   SEQUENCE {
///     [0] { SEQUENCE { OBJECT IDENTIFIER sha384 } }
///     [1] { SEQUENCE { OBJECT IDENTIFIER mgf1
///                      SEQUENCE { OBJECT IDENTIFIER sha384 } } }
///     [2] { INTEGER 48 }
///   }
/// }
/// ```
///
/// The trailer field equals its DEFAULT of 1 and is therefore omitted.
const RSASSA_PSS_ALGORITHM_IDENTIFIER: [u8; 63] = [
    0x30, 0x3d, // AlgorithmIdentifier
    0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x0a, // id-RSASSA-PSS
    0x30, 0x30, // RSASSA-PSS-params
    0xa0, 0x0d, 0x30, 0x0b, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02,
    0x02, // hashAlgorithm: sha384
    0xa1, 0x1a, 0x30, 0x18, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01,
    0x08, // maskGenAlgorithm: mgf1
    0x30, 0x0b, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02,
    0x02, // mgf1 hash: sha384
    0xa2, 0x03, 0x02, 0x01, 0x30, // saltLength: 48
];

/// Offset of `RSASSA-PSS-params` inside the algorithm identifier.
const PARAMETERS_OFFSET: usize = 13;

/// Re-tags a native `rsaEncryption` SPKI as an RFC 9578 `id-RSASSA-PSS` SPKI.
pub(crate) fn native_to_rfc(native_der: &[u8]) -> Result<Vec<u8>, PrivacyPassError> {
    let native = SubjectPublicKeyInfo::from_der(native_der)
        .map_err(|_| PrivacyPassError::InvalidSpkiFormat)?;
    if native.algorithm.oid != ID_RSA_ENCRYPTION {
        return Err(PrivacyPassError::InvalidSpkiFormat);
    }

    let parameters = AnyRef::from_der(&RSASSA_PSS_ALGORITHM_IDENTIFIER[PARAMETERS_OFFSET..])
        .map_err(|_| PrivacyPassError::InvalidSpkiFormat)?;
    let rfc = SubjectPublicKeyInfo {
        algorithm: AlgorithmIdentifier {
            oid: ID_RSASSA_PSS,
            parameters: Some(parameters),
        },
        subject_public_key: native.subject_public_key,
    };
    rfc.to_vec().map_err(|_| PrivacyPassError::InvalidSpkiFormat)
}

/// Validates an RFC 9578 SPKI and re-tags it as a native `rsaEncryption`
/// SPKI.
///
/// The algorithm identifier has to match the fixed parameter set byte for
/// byte.
pub(crate) fn rfc_to_native(rfc_der: &[u8]) -> Result<Vec<u8>, PrivacyPassError> {
    let rfc = SubjectPublicKeyInfo::from_der(rfc_der)
        .map_err(|_| PrivacyPassError::InvalidSpkiFormat)?;
    let algorithm = rfc
        .algorithm
        .to_vec()
        .map_err(|_| PrivacyPassError::InvalidSpkiFormat)?;
    if algorithm != RSASSA_PSS_ALGORITHM_IDENTIFIER {
        return Err(PrivacyPassError::InvalidSpkiFormat);
    }

    let native = SubjectPublicKeyInfo {
        algorithm: AlgorithmIdentifier {
            oid: ID_RSA_ENCRYPTION,
            parameters: Some(AnyRef::NULL),
        },
        subject_public_key: rfc.subject_public_key,
    };
    native
        .to_vec()
        .map_err(|_| PrivacyPassError::InvalidSpkiFormat)
}

/// Bit length of the modulus of a native SPKI.
pub(crate) fn modulus_bits(native_der: &[u8]) -> Result<usize, PrivacyPassError> {
    let native = SubjectPublicKeyInfo::from_der(native_der)
        .map_err(|_| PrivacyPassError::InvalidSpkiFormat)?;
    let key = RsaPublicKey::from_der(native.subject_public_key)
        .map_err(|_| PrivacyPassError::InvalidSpkiFormat)?;
    // the integer encoding strips leading zero bytes
    let modulus = key.modulus.as_bytes();
    Ok(match modulus.first() {
        Some(first) => modulus.len() * 8 - first.leading_zeros() as usize,
        None => 0,
    })
}
