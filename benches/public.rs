use criterion::{Criterion, async_executor::FuturesExecutor, criterion_group, criterion_main};

use privacypass_blindrsa::{
    TokenType,
    auth::{authenticate::TokenChallenge, authorize::Token},
    common::store::InMemoryNonceStore,
    public_tokens::{Issuer, PrivateKey, Verifier},
};

fn challenge() -> Vec<u8> {
    TokenChallenge::new(TokenType::BlindRsa, "example.com", None, &["example.com"])
        .unwrap()
        .to_bytes()
}

async fn redeem_public_token(verifier: Verifier<InMemoryNonceStore>, token: Token) {
    assert!(verifier.verify(&token).await);
}

fn criterion_public_benchmark(c: &mut Criterion) {
    let issuer = Issuer::generate().unwrap();
    let challenge = challenge();

    // Key pair generation
    c.bench_function("PUBLIC SERVER: Generate key pair", move |b| {
        b.iter(|| PrivateKey::generate().unwrap());
    });

    // Issue token request
    let public_key = issuer.public_key().clone();
    let request_challenge = challenge.clone();
    c.bench_function("PUBLIC CLIENT: Issue token request", move |b| {
        b.iter(|| public_key.request(&request_challenge).unwrap());
    });

    // Issue token response
    let response_issuer = issuer.clone();
    let response_challenge = challenge.clone();
    c.bench_function("PUBLIC SERVER: Issue token response", move |b| {
        b.iter_with_setup(
            || {
                response_issuer
                    .public_key()
                    .request(&response_challenge)
                    .unwrap()
                    .token_request()
            },
            |token_request| response_issuer.issue(&token_request).unwrap(),
        );
    });

    // Issue token
    let token_issuer = issuer.clone();
    let token_challenge = challenge.clone();
    c.bench_function("PUBLIC CLIENT: Issue token", move |b| {
        b.iter_with_setup(
            || {
                let prepared = token_issuer
                    .public_key()
                    .request(&token_challenge)
                    .unwrap();
                let token_response = token_issuer.issue(&prepared.token_request()).unwrap();
                (prepared, token_response)
            },
            |(prepared, token_response)| prepared.finalize(token_response).unwrap(),
        );
    });

    // Redeem token
    c.bench_function("PUBLIC SERVER: Redeem token", move |b| {
        b.to_async(FuturesExecutor).iter_with_setup(
            || {
                let verifier =
                    Verifier::new(issuer.public_key().clone(), InMemoryNonceStore::new());
                let prepared = issuer.public_key().request(&challenge).unwrap();
                let token_response = issuer.issue(&prepared.token_request()).unwrap();
                let token = prepared.finalize(token_response).unwrap();
                (verifier, token)
            },
            |(verifier, token)| redeem_public_token(verifier, token),
        );
    });
}

criterion_group!(benches, criterion_public_benchmark);
criterion_main!(benches);
