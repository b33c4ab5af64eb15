//! Issuer key material.

use std::fmt;

use blind_rsa_signatures::{
    KeyPair, SecretKey, Signature,
    reexports::rsa::{BigUint, PublicKeyParts},
};
use log::{debug, warn};
use rand::{CryptoRng, RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

use crate::{
    PrivacyPassError, TOKEN_TYPE_BLIND_RSA, TokenInput, TokenKeyId, TruncatedTokenKeyId,
    auth::authorize::Token, truncate_token_key_id,
};

use super::{KEYSIZE_IN_BITS, NK, options, spki};

/// The issuer's RSA private key.
#[derive(Clone)]
pub struct PrivateKey {
    inner: SecretKey,
    public_key: PublicKey,
}

impl PrivateKey {
    /// Generates a fresh 2048-bit key from the operating system RNG.
    ///
    /// # Errors
    /// Returns an error if the signing library fails to generate a key.
    pub fn generate() -> Result<Self, PrivacyPassError> {
        Self::generate_with_rng(&mut OsRng)
    }

    /// Generates a fresh 2048-bit key from the given RNG.
    ///
    /// # Errors
    /// Returns an error if the signing library fails to generate a key.
    pub fn generate_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, PrivacyPassError> {
        let key_pair = KeyPair::generate(rng, KEYSIZE_IN_BITS)
            .inspect_err(|e| warn!(error:% = e; "Failed to generate key pair"))
            .map_err(|_| PrivacyPassError::KeyGenerationFailed)?;
        Ok(Self {
            public_key: PublicKey::from_native(key_pair.pk)?,
            inner: key_pair.sk,
        })
    }

    /// Imports a PKCS#8 or PKCS#1 PEM private key.
    ///
    /// # Errors
    /// Returns an error if the PEM document is not a valid RSA key.
    pub fn from_pem(pem: &str) -> Result<Self, PrivacyPassError> {
        let inner = SecretKey::from_pem(pem)
            .inspect_err(|e| warn!(error:% = e; "Failed to import PEM private key"))
            .map_err(|_| PrivacyPassError::InvalidKeyEncoding)?;
        Self::from_secret_key(inner)
    }

    /// Imports a PKCS#8 or PKCS#1 DER private key.
    ///
    /// # Errors
    /// Returns an error if the DER document is not a valid RSA key.
    pub fn from_der(der: &[u8]) -> Result<Self, PrivacyPassError> {
        let inner = SecretKey::from_der(der)
            .inspect_err(|e| warn!(error:% = e; "Failed to import DER private key"))
            .map_err(|_| PrivacyPassError::InvalidKeyEncoding)?;
        Self::from_secret_key(inner)
    }

    fn from_secret_key(inner: SecretKey) -> Result<Self, PrivacyPassError> {
        let public_key = inner
            .public_key()
            .map_err(|_| PrivacyPassError::InvalidKeyEncoding)?;
        Ok(Self {
            public_key: PublicKey::from_native(public_key)?,
            inner,
        })
    }

    /// Exports the key as a PKCS#8 PEM document.
    ///
    /// # Errors
    /// Returns an error if the key cannot be encoded.
    pub fn to_pem(&self) -> Result<String, PrivacyPassError> {
        self.inner
            .to_pem()
            .map_err(|_| PrivacyPassError::InvalidKeyEncoding)
    }

    /// Exports the key as a PKCS#8 DER document.
    ///
    /// # Errors
    /// Returns an error if the key cannot be encoded.
    pub fn to_der(&self) -> Result<Vec<u8>, PrivacyPassError> {
        self.inner
            .to_der()
            .map_err(|_| PrivacyPassError::InvalidKeyEncoding)
    }

    /// Returns the public half of the key.
    #[must_use]
    pub const fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Returns the size of the modulus in bits.
    #[must_use]
    pub const fn key_size_in_bits(&self) -> usize {
        self.public_key.key_size_in_bits
    }

    /// blind_sig = rsabssa_blind_sign(skI, blinded_msg)
    ///
    /// A blinded message that is not smaller than the modulus comes from the
    /// client and is rejected with
    /// [`PrivacyPassError::InvalidTokenRequestBlindedMessage`].
    pub(crate) fn blind_sign(&self, blinded_msg: &[u8; NK]) -> Result<[u8; NK], PrivacyPassError> {
        if &BigUint::from_bytes_be(blinded_msg) >= self.inner.n() {
            debug!("Blinded message is out of range");
            return Err(PrivacyPassError::InvalidTokenRequestBlindedMessage);
        }

        let blind_sig = self
            .inner
            .blind_sign(&mut OsRng, blinded_msg, &options())
            .inspect_err(|e| warn!(error:% = e; "Failed to blind sign"))
            .map_err(|_| PrivacyPassError::BlindSigningFailed)?;
        blind_sig
            .0
            .as_slice()
            .try_into()
            .map_err(|_| PrivacyPassError::BlindSigningFailed)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// The issuer's RSA public key.
///
/// Keys compare equal when their token key IDs are equal.
#[derive(Clone)]
pub struct PublicKey {
    inner: blind_rsa_signatures::PublicKey,
    spki: Vec<u8>,
    token_key_id: TokenKeyId,
    key_size_in_bits: usize,
}

impl PublicKey {
    fn from_native(inner: blind_rsa_signatures::PublicKey) -> Result<Self, PrivacyPassError> {
        let native = inner
            .to_der()
            .map_err(|_| PrivacyPassError::InvalidKeyEncoding)?;
        let key_size_in_bits = spki::modulus_bits(&native)?;
        let spki = spki::native_to_rfc(&native)?;
        // token_key_id = SHA256(SerializedPublicKey)
        let token_key_id = Sha256::digest(&spki).into();
        Ok(Self {
            inner,
            spki,
            token_key_id,
            key_size_in_bits,
        })
    }

    /// Decodes a public key from its RFC 9578 `SubjectPublicKeyInfo`
    /// encoding.
    ///
    /// # Errors
    /// Returns [`PrivacyPassError::InvalidSpkiFormat`] if the encoding is
    /// malformed, the algorithm parameters differ from RSASSA-PSS with
    /// SHA-384 and a 48 byte salt, or the key is unsupported.
    pub fn from_spki(spki: &[u8]) -> Result<Self, PrivacyPassError> {
        let native = spki::rfc_to_native(spki)?;
        let inner = blind_rsa_signatures::PublicKey::from_der(&native)
            .inspect_err(|e| warn!(error:% = e; "Failed to import public key"))
            .map_err(|_| PrivacyPassError::InvalidSpkiFormat)?;
        Self::from_native(inner)
    }

    /// Returns the RFC 9578 `SubjectPublicKeyInfo` encoding.
    #[must_use]
    pub fn spki(&self) -> &[u8] {
        &self.spki
    }

    /// Returns the SHA-256 digest of the SPKI encoding.
    #[must_use]
    pub const fn token_key_id(&self) -> &TokenKeyId {
        &self.token_key_id
    }

    /// Returns the last byte of the token key ID.
    #[must_use]
    pub fn truncated_token_key_id(&self) -> TruncatedTokenKeyId {
        truncate_token_key_id(&self.token_key_id)
    }

    /// Returns the size of the modulus in bits.
    #[must_use]
    pub const fn key_size_in_bits(&self) -> usize {
        self.key_size_in_bits
    }

    pub(crate) const fn native(&self) -> &blind_rsa_signatures::PublicKey {
        &self.inner
    }

    /// Checks the token type, the token key ID and the authenticator of a
    /// token.
    ///
    /// This does not consult a nonce store, so the same token passes any
    /// number of times. Use [`Verifier`](super::Verifier) to redeem tokens.
    #[must_use]
    pub fn verify_token_signature(&self, token: &Token) -> bool {
        token.token_type() == TOKEN_TYPE_BLIND_RSA
            && token.token_key_id() == &self.token_key_id
            && self.authenticator_is_valid(token)
    }

    pub(crate) fn authenticator_is_valid(&self, token: &Token) -> bool {
        let token_input = TokenInput::new(
            token.token_type(),
            *token.nonce(),
            *token.challenge_digest(),
            *token.token_key_id(),
        );
        let signature = Signature(token.authenticator().to_vec());
        self.inner
            .verify(&signature, None, token_input.serialize(), &options())
            .is_ok()
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.token_key_id == other.token_key_id
    }
}

impl Eq for PublicKey {}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("token_key_id", &self.token_key_id)
            .field("key_size_in_bits", &self.key_size_in_bits)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_encodings() {
        let private_key = PrivateKey::generate().unwrap();
        let public_key = private_key.public_key();

        assert_eq!(private_key.key_size_in_bits(), KEYSIZE_IN_BITS);

        // 2048-bit keys always encode to 342 bytes
        let spki = public_key.spki();
        assert_eq!(spki.len(), 342);
        assert_eq!(&spki[..6], &[0x30, 0x82, 0x01, 0x52, 0x30, 0x3d]);

        let decoded = PublicKey::from_spki(spki).unwrap();
        assert_eq!(&decoded, public_key);
        assert_eq!(decoded.spki(), spki);
        assert_eq!(
            decoded.token_key_id(),
            &<[u8; 32]>::from(Sha256::digest(spki))
        );

        let pem = private_key.to_pem().unwrap();
        let imported = PrivateKey::from_pem(&pem).unwrap();
        assert_eq!(imported.public_key(), public_key);

        let der = private_key.to_der().unwrap();
        let imported = PrivateKey::from_der(&der).unwrap();
        assert_eq!(imported.public_key(), public_key);
    }

    #[test]
    fn reject_garbage() {
        assert_eq!(
            PrivateKey::from_pem("not a key").unwrap_err(),
            PrivacyPassError::InvalidKeyEncoding
        );
        assert_eq!(
            PublicKey::from_spki(&[0x30, 0x00]).unwrap_err(),
            PrivacyPassError::InvalidSpkiFormat
        );
    }

    #[test]
    fn blinded_message_must_be_below_modulus() {
        let private_key = PrivateKey::generate().unwrap();
        let modulus = private_key.inner.n().to_bytes_be();
        assert_eq!(modulus.len(), NK);

        // The modulus itself and anything above it are not residues
        let modulus: [u8; NK] = modulus.try_into().unwrap();
        for blinded_msg in [modulus, [0xff; NK]] {
            assert_eq!(
                private_key.blind_sign(&blinded_msg).unwrap_err(),
                PrivacyPassError::InvalidTokenRequestBlindedMessage
            );
        }

        // RSA moduli are odd, so this is one below the modulus
        let mut below = modulus;
        below[NK - 1] -= 1;
        assert!(private_key.blind_sign(&below).is_ok());
    }
}
