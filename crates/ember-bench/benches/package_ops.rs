//! Criterion micro-benchmarks for package save, mount and load.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use ember_bench::{actor_chain, bench_context, chain_package, chain_len};
use ember_package::PackageLinker;

const CHAIN: usize = 256;

/// Benchmark: save a package of 256 linked actors.
fn bench_save_chain(c: &mut Criterion) {
    let mut linker = PackageLinker::new(bench_context(CHAIN as u32 + 16));
    linker.create_package("chain").unwrap();
    let chain = actor_chain(linker.context(), CHAIN);
    for (i, actor) in chain.into_iter().enumerate() {
        linker.add_export("chain", &format!("actor_{i}"), actor).unwrap();
    }
    c.bench_function("package_save_chain_256", |b| {
        b.iter(|| black_box(linker.save_package("chain").unwrap()));
    });
}

/// Benchmark: mount a package without loading anything.
fn bench_mount_chain(c: &mut Criterion) {
    let bytes = chain_package(CHAIN).unwrap();
    let cx = bench_context(16);
    c.bench_function("package_mount_chain_256", |b| {
        b.iter(|| {
            let mut linker = PackageLinker::new(cx.clone());
            linker.mount_package("chain", bytes.clone()).unwrap();
            black_box(linker.is_mounted("chain"));
        });
    });
}

/// Benchmark: mount and load the head of the chain, pulling in every link.
fn bench_load_chain(c: &mut Criterion) {
    let bytes = chain_package(CHAIN).unwrap();
    let cx = bench_context(CHAIN as u32 + 16);
    let head = format!("actor_{}", CHAIN - 1);
    c.bench_function("package_load_chain_256", |b| {
        b.iter(|| {
            let mut linker = PackageLinker::new(cx.clone());
            linker.mount_package("chain", bytes.clone()).unwrap();
            let head = linker.load_object("chain", &head).unwrap();
            black_box(chain_len(&head));
        });
    });
}

criterion_group!(benches, bench_save_chain, bench_mount_chain, bench_load_chain);
criterion_main!(benches);
