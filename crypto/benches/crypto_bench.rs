use criterion::{black_box, criterion_group, criterion_main, Criterion};
use linkid_crypto::{identifier_hash, sign_request, verify_request, SigningIdentity};
use linkid_types::{IdentifierKind, PrivateKey};

fn identity() -> SigningIdentity {
    SigningIdentity::from_private(&PrivateKey([0x42; 32])).expect("valid key")
}

fn identifier_hash_bench(c: &mut Criterion) {
    c.bench_function("identifier_hash_phone", |b| {
        b.iter(|| identifier_hash(IdentifierKind::Phone, black_box("08201012341234")))
    });
}

fn sign_request_bench(c: &mut Criterion) {
    let id = identity();
    let hash = identifier_hash(IdentifierKind::Email, "a@example.com");

    c.bench_function("sign_request", |b| {
        b.iter(|| sign_request(&id, black_box(&hash), 0))
    });
}

fn verify_request_bench(c: &mut Criterion) {
    let id = identity();
    let hash = identifier_hash(IdentifierKind::Email, "a@example.com");
    let sig = sign_request(&id, &hash, 0).expect("sign");

    c.bench_function("verify_request", |b| {
        b.iter(|| verify_request(&id.address(), black_box(&hash), 0, &sig))
    });
}

criterion_group!(
    benches,
    identifier_hash_bench,
    sign_request_bench,
    verify_request_bench
);
criterion_main!(benches);
