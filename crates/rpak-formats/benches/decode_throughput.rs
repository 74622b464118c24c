//! Decoder throughput benchmarks.
//!
//! Measures payload bytes per second for whole-buffer decoding and for the
//! chunked, resumable path the loader uses.
//!
//! Run with:
//! ```bash
//! cargo bench --bench decode_throughput
//! ```

#![allow(clippy::expect_used)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rpak_formats::body::PakBody;
use rpak_formats::decode::{DecodeContext, InputRing};
use rpak_formats::{PakHeader, decompress_to_vec, pak_guid};
use std::hint::black_box;

const LONGRUN: &[u8] = include_bytes!("../test_fixtures/decode/longrun.bin");
const MULTIBLOCK: &[u8] = include_bytes!("../test_fixtures/decode/multiblock.bin");
const SAMPLE: &[u8] = include_bytes!("../test_fixtures/decode/sample.rpak");
const STREAM_HEADER: u64 = 0x80;

fn decode_all(input: &[u8], chunk: usize) -> u64 {
    let (mut context, _) = DecodeContext::new(input, STREAM_HEADER).expect("Stream should open");
    let mut buffer = vec![0u8; chunk];
    while !context.is_finished() {
        let written = context
            .decompress_chunk(input, &mut buffer)
            .expect("Chunk should decode");
        black_box(&buffer[..written]);
    }
    context.total_out()
}

/// Benchmark decoding with varying output chunk sizes.
fn bench_chunked_decode(c: &mut Criterion) {
    let (_, payload) = DecodeContext::new(LONGRUN, STREAM_HEADER).expect("Stream should open");

    let mut group = c.benchmark_group("chunked_decode");
    group.throughput(Throughput::Bytes(payload));

    for chunk in [4096usize, 65536, 1 << 20] {
        group.bench_with_input(BenchmarkId::new("longrun", chunk), &chunk, |b, &chunk| {
            b.iter(|| decode_all(black_box(LONGRUN), chunk));
        });
    }

    let (_, payload) = DecodeContext::new(MULTIBLOCK, STREAM_HEADER).expect("Stream should open");
    group.throughput(Throughput::Bytes(payload));
    group.bench_function(BenchmarkId::new("multiblock", 4096), |b| {
        b.iter(|| decode_all(black_box(MULTIBLOCK), 4096));
    });

    group.finish();
}

/// Benchmark decoding through a small input ring that is refilled as the
/// decoder advances, as the loader does for large files.
fn bench_ring_decode(c: &mut Criterion) {
    const RING: usize = 8192;
    let (_, payload) = DecodeContext::new(LONGRUN, STREAM_HEADER).expect("Stream should open");

    let mut group = c.benchmark_group("ring_decode");
    group.throughput(Throughput::Bytes(payload));

    group.bench_function("longrun_8k_ring", |b| {
        b.iter(|| {
            let mut ring = vec![0u8; RING];
            let mut streamed = 0usize;
            let fill = |ring: &mut [u8], streamed: &mut usize, upto: usize| {
                while *streamed < upto.min(LONGRUN.len()) {
                    ring[*streamed % RING] = LONGRUN[*streamed];
                    *streamed += 1;
                }
            };

            fill(&mut ring, &mut streamed, RING);
            let view = InputRing::ring(&ring, streamed as u64).expect("Ring should be valid");
            let (mut context, _) =
                DecodeContext::with_window(&view, STREAM_HEADER, LONGRUN.len() as u64, 1 << 23)
                    .expect("Stream should open");

            let mut buffer = vec![0u8; 8192];
            while !context.is_finished() {
                let upto = context.retain_from() as usize + RING;
                fill(&mut ring, &mut streamed, upto);
                let view = InputRing::ring(&ring, streamed as u64).expect("Ring should be valid");
                match context.decompress_chunk_ring(&view, &mut buffer) {
                    Ok(written) => {
                        black_box(&buffer[..written]);
                    }
                    Err(e) if e.is_resumable() && streamed < LONGRUN.len() => {}
                    Err(e) => panic!("ring decode failed: {e}"),
                }
            }
            black_box(context.total_out())
        });
    });

    group.finish();
}

/// Benchmark whole-container decompression and table parsing.
fn bench_container(c: &mut Criterion) {
    let mut group = c.benchmark_group("container");

    group.bench_function("decompress_sample", |b| {
        b.iter(|| decompress_to_vec(black_box(SAMPLE)).expect("Container should decompress"));
    });

    let raw = decompress_to_vec(SAMPLE).expect("Container should decompress");
    group.bench_function("parse_sample", |b| {
        b.iter(|| {
            let (header, _) = PakHeader::parse(black_box(&raw), 0).expect("Header should parse");
            PakBody::parse(&raw, &header).expect("Body should parse")
        });
    });

    group.bench_function("guid", |b| {
        b.iter(|| pak_guid(black_box("material/models/weapons/r97")));
    });

    group.finish();
}

criterion_group!(benches, bench_chunked_decode, bench_ring_decode, bench_container);
criterion_main!(benches);
