//! Tiered issuers and verifiers.
//!
//! A deployment that hands out tokens for several tiers of callers runs one
//! issuer key per tier. The truncated token key IDs of those keys are kept
//! pairwise distinct, so the single byte in a token request or token is enough
//! to pick the tier. The full token key ID is still compared during
//! verification.

use std::collections::HashMap;
use std::hash::Hash;

use log::debug;

use crate::{
    COLLISION_AVOIDANCE_ATTEMPTS, NonceStore, PrivacyPassError, TruncatedTokenKeyId,
    auth::authorize::Token,
    common::errors::DirectoryError,
    directory::{TokenIssuerDirectory, TokenKey},
    truncate_token_key_id,
};

use super::{Issuer, TokenRequest, TokenResponse, Verifier};

/// One issuer per tier, with pairwise distinct truncated token key IDs.
#[derive(Debug, Clone)]
pub struct TieredIssuers<T> {
    issuers: HashMap<T, Issuer>,
    tiers: HashMap<TruncatedTokenKeyId, T>,
}

impl<T: Clone + Eq + Hash> TieredIssuers<T> {
    /// Generates a key for every tier, regenerating on truncated token key ID
    /// collisions up to [`COLLISION_AVOIDANCE_ATTEMPTS`] times per tier.
    ///
    /// # Errors
    /// Returns an error if key generation fails or no distinct truncated
    /// token key ID was found.
    pub fn generate(tiers: impl IntoIterator<Item = T>) -> Result<Self, PrivacyPassError> {
        Self::generate_with_attempts(tiers, COLLISION_AVOIDANCE_ATTEMPTS)
    }

    /// Like [`generate`](Self::generate) with a custom retry cap.
    ///
    /// Repeated tiers are only generated once.
    ///
    /// # Errors
    /// Returns [`PrivacyPassError::TruncatedTokenKeyIdCollision`] if a tier
    /// exhausts its attempts, or the error of the key generation.
    pub fn generate_with_attempts(
        tiers: impl IntoIterator<Item = T>,
        attempts: usize,
    ) -> Result<Self, PrivacyPassError> {
        let mut registry = Self {
            issuers: HashMap::new(),
            tiers: HashMap::new(),
        };

        'tiers: for tier in tiers {
            if registry.issuers.contains_key(&tier) {
                continue;
            }
            for attempt in 1..=attempts {
                let issuer = Issuer::generate()?;
                let truncated_token_key_id = issuer.truncated_token_key_id();
                if registry.tiers.contains_key(&truncated_token_key_id) {
                    debug!(attempt = attempt, truncated_token_key_id = truncated_token_key_id; "Regenerating key after truncated token key ID collision");
                    continue;
                }
                registry.tiers.insert(truncated_token_key_id, tier.clone());
                registry.issuers.insert(tier, issuer);
                continue 'tiers;
            }
            return Err(PrivacyPassError::TruncatedTokenKeyIdCollision);
        }

        Ok(registry)
    }

    /// Builds the registry from existing issuers, e.g. keys loaded from
    /// storage.
    ///
    /// A repeated tier replaces the issuer listed before it.
    ///
    /// # Errors
    /// Returns [`PrivacyPassError::TruncatedTokenKeyIdCollision`] if two
    /// tiers share a truncated token key ID.
    pub fn from_issuers(
        issuers: impl IntoIterator<Item = (T, Issuer)>,
    ) -> Result<Self, PrivacyPassError> {
        let mut registry = Self {
            issuers: HashMap::new(),
            tiers: HashMap::new(),
        };

        for (tier, issuer) in issuers {
            if let Some(previous) = registry.issuers.remove(&tier) {
                registry.tiers.remove(&previous.truncated_token_key_id());
            }
            let truncated_token_key_id = issuer.truncated_token_key_id();
            if registry.tiers.contains_key(&truncated_token_key_id) {
                return Err(PrivacyPassError::TruncatedTokenKeyIdCollision);
            }
            registry.tiers.insert(truncated_token_key_id, tier.clone());
            registry.issuers.insert(tier, issuer);
        }

        Ok(registry)
    }

    /// Returns the issuer of a tier.
    #[must_use]
    pub fn issuer(&self, tier: &T) -> Option<&Issuer> {
        self.issuers.get(tier)
    }

    /// Returns the tier whose key has the given truncated token key ID.
    #[must_use]
    pub fn tier_for(&self, truncated_token_key_id: TruncatedTokenKeyId) -> Option<&T> {
        self.tiers.get(&truncated_token_key_id)
    }

    /// Iterates over the tiers and their issuers.
    pub fn iter(&self) -> impl Iterator<Item = (&T, &Issuer)> {
        self.issuers.iter()
    }

    /// Returns the number of tiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.issuers.len()
    }

    /// Returns `true` if there are no tiers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issuers.is_empty()
    }

    /// Issues a token response with the issuer the request is addressed to.
    ///
    /// # Errors
    /// Returns [`PrivacyPassError::InvalidTokenKeyId`] if no tier matches the
    /// truncated token key ID, or any error of [`Issuer::issue`].
    pub fn issue(&self, token_request: &TokenRequest) -> Result<TokenResponse, PrivacyPassError> {
        self.tier_for(token_request.truncated_token_key_id())
            .and_then(|tier| self.issuer(tier))
            .ok_or(PrivacyPassError::InvalidTokenKeyId)?
            .issue(token_request)
    }

    /// Lists the keys of all tiers in a token issuer directory.
    ///
    /// # Errors
    /// Returns an error if the issuer request URI does not parse.
    pub fn directory(
        &self,
        issuer_request_uri: impl Into<String>,
    ) -> Result<TokenIssuerDirectory, DirectoryError> {
        let mut issuers = self.issuers.values().collect::<Vec<_>>();
        issuers.sort_by_key(|issuer| issuer.truncated_token_key_id());
        let token_keys = issuers
            .into_iter()
            .map(|issuer| TokenKey::from_public_key(issuer.public_key(), None))
            .collect();
        TokenIssuerDirectory::new(issuer_request_uri, token_keys)
    }

    /// Creates one verifier per tier, with the nonce store returned by
    /// `nonce_store` for that tier.
    pub fn verifiers<NS: NonceStore>(
        &self,
        mut nonce_store: impl FnMut(&T) -> NS,
    ) -> TieredVerifiers<T, NS> {
        let verifiers = self
            .issuers
            .iter()
            .map(|(tier, issuer)| {
                let verifier = Verifier::new(issuer.public_key().clone(), nonce_store(tier));
                (issuer.truncated_token_key_id(), (tier.clone(), verifier))
            })
            .collect();
        TieredVerifiers { verifiers }
    }
}

/// One verifier per tier, routed by truncated token key ID.
#[derive(Debug)]
pub struct TieredVerifiers<T, NS> {
    verifiers: HashMap<TruncatedTokenKeyId, (T, Verifier<NS>)>,
}

impl<T: Clone, NS: NonceStore> TieredVerifiers<T, NS> {
    /// Builds the router from existing verifiers, e.g. for keys read from an
    /// issuer directory.
    ///
    /// # Errors
    /// Returns [`PrivacyPassError::TruncatedTokenKeyIdCollision`] if two
    /// verifiers share a truncated token key ID.
    pub fn new(
        verifiers: impl IntoIterator<Item = (T, Verifier<NS>)>,
    ) -> Result<Self, PrivacyPassError> {
        let mut routed = HashMap::new();
        for (tier, verifier) in verifiers {
            let truncated_token_key_id = verifier.public_key().truncated_token_key_id();
            if routed.insert(truncated_token_key_id, (tier, verifier)).is_some() {
                return Err(PrivacyPassError::TruncatedTokenKeyIdCollision);
            }
        }
        Ok(Self { verifiers: routed })
    }

    /// Returns the verifier for a truncated token key ID.
    #[must_use]
    pub fn verifier(
        &self,
        truncated_token_key_id: TruncatedTokenKeyId,
    ) -> Option<(&T, &Verifier<NS>)> {
        self.verifiers
            .get(&truncated_token_key_id)
            .map(|(tier, verifier)| (tier, verifier))
    }

    /// Redeems a token with the verifier of its tier.
    ///
    /// Returns the tier if the token is valid, `None` if no tier matches or
    /// the verifier rejects it.
    pub async fn verify(&self, token: &Token) -> Option<T> {
        let truncated_token_key_id = truncate_token_key_id(token.token_key_id());
        let Some((tier, verifier)) = self.verifier(truncated_token_key_id) else {
            debug!(truncated_token_key_id = truncated_token_key_id; "Rejecting token for an unknown tier");
            return None;
        };
        verifier.verify(token).await.then(|| tier.clone())
    }
}
