use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::path::Path;

use hashit::hasher::{self, HashOptions, DEFAULT_STREAM_SIZE};
use hashit::registry::{self, AlgorithmId, EnabledSet};

fn make_test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

fn bench_hash_slice(c: &mut Criterion) {
    let sizes = [1024, 64 * 1024, 1024 * 1024, 10 * 1024 * 1024];

    let mut group = c.benchmark_group("hash_slice");
    for &size in &sizes {
        let data = make_test_data(size);
        let label = if size >= 1024 * 1024 {
            format!("{}MB", size / (1024 * 1024))
        } else {
            format!("{}KB", size / 1024)
        };

        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("sha256", &label), &data, |b, data| {
            b.iter(|| registry::hash_slice(AlgorithmId::Sha256, data));
        });
        group.bench_with_input(BenchmarkId::new("md5", &label), &data, |b, data| {
            b.iter(|| registry::hash_slice(AlgorithmId::Md5, data));
        });
        group.bench_with_input(BenchmarkId::new("blake3", &label), &data, |b, data| {
            b.iter(|| registry::hash_slice(AlgorithmId::Blake3, data));
        });
    }
    group.finish();
}

fn bench_hash_file(c: &mut Criterion) {
    let test_files: Vec<(&str, &str)> = vec![
        ("10MB", "/tmp/bench-data/file_1.bin"),
        ("100MB", "/tmp/bench-data/large_1.bin"),
    ];

    let mut group = c.benchmark_group("hash_file");
    group.sample_size(10);

    let single_md5 = EnabledSet::normalize(&["md5".to_string()]);

    for (label, path) in &test_files {
        let file_path = Path::new(path);
        if !file_path.exists() {
            continue;
        }
        let size = std::fs::metadata(file_path).unwrap().len();
        group.throughput(Throughput::Bytes(size));

        group.bench_with_input(BenchmarkId::new("md5", label), file_path, |b, path| {
            b.iter(|| {
                hasher::hash_path(
                    path,
                    &single_md5,
                    HashOptions {
                        capture_mtime: false,
                    },
                    DEFAULT_STREAM_SIZE,
                )
                .unwrap()
            });
        });
    }
    group.finish();
}

/// Compares the in-memory strategy's sequential vs. rayon-fanned-out path
/// by varying the enabled digest count across the 200,000-byte threshold.
fn bench_multi_digest_fanout(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let small_path = dir.path().join("small.bin");
    let large_path = dir.path().join("large.bin");
    std::fs::write(&small_path, make_test_data(100_000)).unwrap();
    std::fs::write(&large_path, make_test_data(1_000_000)).unwrap();

    let all = EnabledSet::normalize(&["all".to_string()]);
    let many = EnabledSet::normalize(&[
        "md5".to_string(),
        "sha1".to_string(),
        "sha256".to_string(),
        "sha512".to_string(),
        "blake3".to_string(),
    ]);

    let mut group = c.benchmark_group("multi_digest_fanout");
    group.bench_function("below_threshold_sequential", |b| {
        b.iter(|| {
            hasher::hash_path(
                &small_path,
                &many,
                HashOptions {
                    capture_mtime: false,
                },
                DEFAULT_STREAM_SIZE,
            )
            .unwrap()
        });
    });
    group.bench_function("above_threshold_parallel", |b| {
        b.iter(|| {
            hasher::hash_path(
                &large_path,
                &many,
                HashOptions {
                    capture_mtime: false,
                },
                DEFAULT_STREAM_SIZE,
            )
            .unwrap()
        });
    });
    group.bench_function("above_threshold_all_selected_sequential", |b| {
        b.iter(|| {
            hasher::hash_path(
                &large_path,
                &all,
                HashOptions {
                    capture_mtime: false,
                },
                DEFAULT_STREAM_SIZE,
            )
            .unwrap()
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_hash_slice,
    bench_hash_file,
    bench_multi_digest_fanout
);
criterion_main!(benches);
