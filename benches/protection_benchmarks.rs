//! Protection benchmarks

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use webforms_viewstate::protection::{protection_hash, DataProtectionProvider, DataProtector};

fn bench_protect(c: &mut Criterion) {
    let protector = DataProtectionProvider::from_key("/bench", &[8u8; 32])
        .unwrap()
        .protector("ObjectStateFormatter.Serialize");

    let mut group = c.benchmark_group("protect");
    for size in [64usize, 1024, 16 * 1024] {
        let plaintext = vec![0x5Au8; size];
        let payload = protector.protect(&plaintext).unwrap();
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("protect", size), &plaintext, |b, data| {
            b.iter(|| black_box(protector.protect(data).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("unprotect", size), &payload, |b, data| {
            b.iter(|| black_box(protector.unprotect(data).unwrap()))
        });
    }
    group.finish();
}

fn bench_key_derivation(c: &mut Criterion) {
    let provider = DataProtectionProvider::from_key("/bench", &[8u8; 32]).unwrap();

    c.bench_function("derive_purpose_chain", |b| {
        b.iter(|| {
            black_box(provider.protector_for([
                "HiddenFieldPageStatePersister.ViewState",
                "/Default.aspx",
                "user-key",
            ]))
        })
    });
}

fn bench_hashing(c: &mut Criterion) {
    let data = vec![0u8; 1024];

    c.bench_function("sha256_1kb", |b| {
        b.iter(|| black_box(protection_hash::sha256(&data)))
    });
    c.bench_function("hmac_sha256_1kb", |b| {
        b.iter(|| black_box(protection_hash::hmac_sha256(&[1u8; 32], &[data.as_slice()])))
    });
}

criterion_group!(benches, bench_protect, bench_key_derivation, bench_hashing);
criterion_main!(benches);
