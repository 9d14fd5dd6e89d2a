use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use diode_core::scanner::{scan_capture, scan_capture_with_stats, ResyncScanner};
use diode_core::FrameCodec;

fn make_capture(codec: &FrameCodec, num_frames: u32, payload_len: usize) -> Vec<u8> {
    let mut stream = Vec::new();
    for seq in 0..num_frames {
        let frame = codec.encode(0, seq, &vec![b'x'; payload_len]).unwrap();
        stream.extend_from_slice(&frame);
        if seq % 10 == 0 {
            // inject a bit of garbage periodically
            stream.extend_from_slice(b"GARBAGE");
        }
    }
    stream
}

fn bench_scanner(c: &mut Criterion) {
    let mut group = c.benchmark_group("scanner");

    for &payload_len in &[16usize, 256, 4096] {
        let codec = FrameCodec::new(payload_len).unwrap();
        let stream = make_capture(&codec, 500, payload_len);
        group.throughput(Throughput::Bytes(stream.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("scan_capture", payload_len),
            &stream,
            |b, data| {
                b.iter(|| {
                    let res = scan_capture(&codec, data);
                    criterion::black_box(res);
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("scan_capture_with_stats", payload_len),
            &stream,
            |b, data| {
                b.iter(|| {
                    let res = scan_capture_with_stats(&codec, data);
                    criterion::black_box(res);
                });
            },
        );

        // Worst case for resync: noise with no magic at all
        let noise = vec![0x55u8; stream.len()];
        let scanner = ResyncScanner::new(codec, usize::MAX);
        group.bench_with_input(BenchmarkId::new("resync_noise", payload_len), &noise, |b, data| {
            b.iter(|| criterion::black_box(scanner.scan(data, 1, 0)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_scanner);
criterion_main!(benches);
