//! Helper RNG that returns a fixed sequence of values for each call to
//! (try_)fill_bytes.

use rand::{CryptoRng, Error, RngCore, rngs::OsRng};

/// This RNG step is used to generate deterministic values for the nonce, salt,
/// and blind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RngStep {
    /// The nonce is the first value to be generated.
    Nonce,
    /// The PSS salt is the second value to be generated.
    Salt,
    /// The blind is the third value to be generated.
    Blind,
    /// Further blinds are drawn from the operating system RNG when the
    /// given blind is not invertible.
    AdditionalBlind,
}

/// A deterministic RNG that replays the nonce, the PSS salt and the blind of
/// a token request, in the order [`PublicKey::request_with_rng`] consumes
/// them.
///
/// [`PublicKey::request_with_rng`]: crate::public_tokens::PublicKey::request_with_rng
#[derive(Debug)]
pub struct DeterministicRng {
    nonce: Vec<u8>,
    salt: Vec<u8>,
    blind: Vec<u8>,
    additional_blind: Option<Vec<u8>>,
    step: RngStep,
}

impl DeterministicRng {
    /// Creates a new `DeterministicRng` with the given nonce, salt, and blind.
    ///
    /// The blind is handed out byte for byte, so it has to be given in the
    /// order the big integer sampling of the signing library reads it.
    #[must_use]
    pub const fn new(nonce: Vec<u8>, salt: Vec<u8>, blind: Vec<u8>) -> Self {
        Self {
            nonce,
            salt,
            blind,
            additional_blind: None,
            step: RngStep::Nonce,
        }
    }

    /// Returns the last blind drawn after the given one was rejected.
    #[must_use]
    pub fn additional_blind(&self) -> Option<&[u8]> {
        self.additional_blind.as_deref()
    }

    /// Returns the value the next call will produce.
    #[must_use]
    pub const fn step(&self) -> RngStep {
        self.step
    }

    fn fill_with_data(&mut self, dest: &mut [u8]) {
        match self.step {
            RngStep::Nonce => {
                dest.copy_from_slice(&self.nonce);
                self.step = RngStep::Salt;
            }
            RngStep::Salt => {
                dest.copy_from_slice(&self.salt);
                self.step = RngStep::Blind;
            }
            RngStep::Blind => {
                dest.copy_from_slice(&self.blind);
                self.step = RngStep::AdditionalBlind;
            }
            RngStep::AdditionalBlind => {
                OsRng.fill_bytes(dest);
                self.additional_blind = Some(dest.to_vec());
            }
        }
    }
}

impl RngCore for DeterministicRng {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.fill_with_data(&mut buf);
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.fill_with_data(&mut buf);
        u64::from_le_bytes(buf)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.fill_with_data(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_with_data(dest);
        Ok(())
    }
}

impl CryptoRng for DeterministicRng {}

#[test]
fn replays_in_order() {
    let mut rng = DeterministicRng::new(vec![1u8; 32], vec![2u8; 48], vec![3u8; 256]);

    let mut nonce = [0u8; 32];
    rng.fill_bytes(&mut nonce);
    assert_eq!(nonce, [1u8; 32]);

    let mut salt = [0u8; 48];
    rng.fill_bytes(&mut salt);
    assert_eq!(salt, [2u8; 48]);

    let mut blind = [0u8; 256];
    rng.fill_bytes(&mut blind);
    assert_eq!(blind, [3u8; 256]);
    assert_eq!(rng.step(), RngStep::AdditionalBlind);
    assert!(rng.additional_blind().is_none());

    rng.fill_bytes(&mut blind);
    assert_eq!(rng.additional_blind(), Some(&blind[..]));
}
