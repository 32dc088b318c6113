// Copyright 2019 TiKV Project Authors. Licensed under MIT or Apache-2.0.

use crc::{Crc, CRC_32_ISCSI, CRC_64_XZ};
use crcfold::{Digest, Fallback, Tier};
use criterion::*;
use rand::{thread_rng, RngCore};

fn bench_crc64(c: &mut Criterion) {
    let mut group = c.benchmark_group("CRC64");
    let mut rng = thread_rng();
    let reference = Crc::<u64>::new(&CRC_64_XZ);

    for &size in &[8, 12, 16] {
        let mut buf = vec![0u8; 3 << size];
        rng.fill_bytes(&mut buf);

        group.throughput(Throughput::Bytes(3 << size));
        group.bench_with_input(BenchmarkId::new("crc::crc64", size), &buf, |b, buf| {
            b.iter(|| {
                let mut digest = reference.digest();
                digest.update(&buf[..(1 << size)]);
                digest.update(&buf[(1 << size)..(2 << size)]);
                digest.update(&buf[(2 << size)..]);
                digest.finalize()
            })
        });
        group.bench_with_input(BenchmarkId::new("crcfold::simd", size), &buf, |b, buf| {
            b.iter(|| {
                let mut digest = Digest::new(&crcfold::CRC_64_XZ);
                digest.write(&buf[..(1 << size)]);
                digest.write(&buf[(1 << size)..(2 << size)]);
                digest.write(&buf[(2 << size)..]);
                digest.sum()
            })
        });
        group.bench_with_input(BenchmarkId::new("crcfold::table", size), &buf, |b, buf| {
            b.iter(|| {
                let mut digest = Digest::new_table(&crcfold::CRC_64_XZ);
                digest.write(&buf[..(1 << size)]);
                digest.write(&buf[(1 << size)..(2 << size)]);
                digest.write(&buf[(2 << size)..]);
                digest.sum()
            })
        });
    }
}

fn bench_tiers(c: &mut Criterion) {
    let mut group = c.benchmark_group("CRC32C");
    let mut rng = thread_rng();
    let reference = Crc::<u32>::new(&CRC_32_ISCSI);
    let algorithm = &crcfold::CRC_32_ISCSI;

    for &size in &[16, 64, 256, 4096, 65536] {
        let mut buf = vec![0u8; size];
        rng.fill_bytes(&mut buf);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("crc", size), &buf, |b, buf| {
            b.iter(|| reference.checksum(buf))
        });
        for fallback in [Fallback::Bytewise, Fallback::Sliced] {
            let name = format!("{fallback:?}").to_lowercase();
            group.bench_with_input(BenchmarkId::new(name, size), &buf, |b, buf| {
                b.iter(|| algorithm.update_portable(!0, buf, fallback))
            });
        }
        for tier in Tier::ALL.into_iter().filter(|tier| tier.is_supported()) {
            group.bench_with_input(BenchmarkId::new(tier.name(), size), &buf, |b, buf| {
                b.iter(|| algorithm.update_with_tier(tier, !0, buf))
            });
        }
    }
}

criterion_group!(benches, bench_crc64, bench_tiers);
criterion_main!(benches);
