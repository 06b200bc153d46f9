//! Primitive benchmarks: AEAD, HMAC and HKDF at several payload sizes.
//!
//! Run with: `cargo bench --bench primitives`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use tessera_crypto::{generate_key, CipherSuite, CryptoManager, HashAlgorithm};

const PAYLOAD_SIZES: &[usize] = &[64, 1024, 65_536];

fn bench_aead(c: &mut Criterion) {
    let mut group = c.benchmark_group("aead");
    for suite in [CipherSuite::Aes256Gcm, CipherSuite::ChaCha20Poly1305] {
        let crypto = CryptoManager::new(suite, HashAlgorithm::Sha256);
        let Ok(key) = generate_key(crypto.key_size()) else {
            return;
        };
        for &size in PAYLOAD_SIZES {
            let plaintext = vec![0x42u8; size];
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(BenchmarkId::new(suite.as_str(), size), &plaintext, |b, pt| {
                b.iter(|| crypto.encrypt(&key, black_box(pt)));
            });
        }
    }
    group.finish();
}

fn bench_sign(c: &mut Criterion) {
    let mut group = c.benchmark_group("hmac");
    for hash in [HashAlgorithm::Sha256, HashAlgorithm::Sha512] {
        let crypto = CryptoManager::new(CipherSuite::Aes256Gcm, hash);
        for &size in PAYLOAD_SIZES {
            let message = vec![0x42u8; size];
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(BenchmarkId::new(hash.as_str(), size), &message, |b, m| {
                b.iter(|| crypto.sign(b"signing-key", black_box(m)));
            });
        }
    }
    group.finish();
}

fn bench_sek_derivation(c: &mut Criterion) {
    let crypto = CryptoManager::default();
    let prk = [7u8; 32];
    c.bench_function("hkdf_expand_sek", |b| {
        b.iter(|| crypto.expand(black_box(&prk), b"compute.a,compute.b,1700000000", 64));
    });
}

criterion_group!(benches, bench_aead, bench_sign, bench_sek_derivation);
criterion_main!(benches);
