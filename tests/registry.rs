use std::collections::HashSet;

use privacypass_blindrsa::{
    PrivacyPassError,
    common::store::InMemoryNonceStore,
    directory::TokenIssuerDirectory,
    public_tokens::{Issuer, TieredIssuers, TieredVerifiers, Verifier},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Tier {
    Free,
    Basic,
    Premium,
}

#[tokio::test]
async fn tiered_cycle() {
    // Server: Create one key per tier
    let issuers = TieredIssuers::generate([Tier::Free, Tier::Basic, Tier::Premium]).unwrap();
    assert_eq!(issuers.len(), 3);

    let truncated_token_key_ids = issuers
        .iter()
        .map(|(_, issuer)| issuer.truncated_token_key_id())
        .collect::<HashSet<_>>();
    assert_eq!(truncated_token_key_ids.len(), 3);

    // Origin: Create one verifier per tier
    let verifiers = issuers.verifiers(|_| InMemoryNonceStore::new());

    for tier in [Tier::Free, Tier::Basic, Tier::Premium] {
        let issuer = issuers.issuer(&tier).unwrap();
        assert_eq!(
            issuers.tier_for(issuer.truncated_token_key_id()),
            Some(&tier)
        );

        // Client: Request a token from the tier's key
        let prepared = issuer.public_key().request(&[1, 2, 3]).unwrap();

        // Server: The request is routed by its truncated token key ID
        let token_response = issuers.issue(&prepared.token_request()).unwrap();
        let token = prepared.finalize(token_response).unwrap();

        // Origin: The token is redeemed once, for its tier
        assert_eq!(verifiers.verify(&token).await, Some(tier));
        assert_eq!(verifiers.verify(&token).await, None);
    }
}

#[tokio::test]
async fn unknown_tier_is_rejected() {
    let issuers = TieredIssuers::generate([Tier::Free]).unwrap();
    let verifiers = issuers.verifiers(|_| InMemoryNonceStore::new());

    let mut outsider = Issuer::generate().unwrap();
    while issuers.tier_for(outsider.truncated_token_key_id()).is_some() {
        outsider = Issuer::generate().unwrap();
    }

    let prepared = outsider.public_key().request(&[1, 2, 3]).unwrap();
    assert_eq!(
        issuers.issue(&prepared.token_request()).unwrap_err(),
        PrivacyPassError::InvalidTokenKeyId
    );

    let token_response = outsider.issue(&prepared.token_request()).unwrap();
    let token = prepared.finalize(token_response).unwrap();
    assert_eq!(verifiers.verify(&token).await, None);
}

#[test]
fn repeated_tiers_are_generated_once() {
    let issuers = TieredIssuers::generate([Tier::Free, Tier::Free]).unwrap();
    assert_eq!(issuers.len(), 1);
    assert!(issuers.issuer(&Tier::Basic).is_none());
    assert!(!issuers.is_empty());
}

#[test]
fn exhausted_attempts() {
    assert_eq!(
        TieredIssuers::generate_with_attempts([Tier::Free], 0).unwrap_err(),
        PrivacyPassError::TruncatedTokenKeyIdCollision
    );
    assert!(
        TieredIssuers::<Tier>::generate_with_attempts([], 0)
            .unwrap()
            .is_empty()
    );
}

#[test]
fn from_issuers() {
    let issuer = Issuer::generate().unwrap();

    // Two tiers can't share a truncated token key ID
    assert_eq!(
        TieredIssuers::from_issuers([(Tier::Free, issuer.clone()), (Tier::Basic, issuer.clone())])
            .unwrap_err(),
        PrivacyPassError::TruncatedTokenKeyIdCollision
    );

    // A repeated tier replaces the earlier issuer
    let mut other = Issuer::generate().unwrap();
    while other.truncated_token_key_id() == issuer.truncated_token_key_id() {
        other = Issuer::generate().unwrap();
    }
    let issuers =
        TieredIssuers::from_issuers([(Tier::Free, issuer.clone()), (Tier::Free, other.clone())])
            .unwrap();
    assert_eq!(issuers.len(), 1);
    assert_eq!(
        issuers.issuer(&Tier::Free).unwrap().public_key(),
        other.public_key()
    );
    assert!(issuers.tier_for(issuer.truncated_token_key_id()).is_none());
}

#[test]
fn tiered_verifiers_reject_collisions() {
    let issuer = Issuer::generate().unwrap();
    let verifiers = [Tier::Free, Tier::Basic].map(|tier| {
        (
            tier,
            Verifier::new(issuer.public_key().clone(), InMemoryNonceStore::new()),
        )
    });

    assert!(matches!(
        TieredVerifiers::new(verifiers),
        Err(PrivacyPassError::TruncatedTokenKeyIdCollision)
    ));

    let verifiers = TieredVerifiers::new([(
        Tier::Premium,
        Verifier::new(issuer.public_key().clone(), InMemoryNonceStore::new()),
    )])
    .unwrap();
    let (tier, verifier) = verifiers
        .verifier(issuer.truncated_token_key_id())
        .unwrap();
    assert_eq!(tier, &Tier::Premium);
    assert_eq!(verifier.public_key(), issuer.public_key());
}

#[test]
fn directory_lists_every_tier() {
    let issuers = TieredIssuers::generate([Tier::Free, Tier::Basic]).unwrap();
    let directory = issuers.directory("https://issuer.example/request").unwrap();
    assert_eq!(directory.token_keys.len(), 2);

    let json = directory.to_json().unwrap();
    let parsed = TokenIssuerDirectory::from_json(&json).unwrap();
    assert_eq!(parsed, directory);

    let public_keys = parsed.public_keys(0);
    assert_eq!(public_keys.len(), 2);
    for (_, issuer) in issuers.iter() {
        assert!(public_keys.contains(issuer.public_key()));
        assert!(parsed.is_valid(issuer.public_key().spki(), 0));
    }

    assert!(issuers.directory("not a uri").is_err());
}
