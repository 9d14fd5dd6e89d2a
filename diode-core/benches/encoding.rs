use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use diode_core::{split_stream, ChannelMux, ChecksumKind, FrameCodec, MuxConfig};

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for checksum in [ChecksumKind::Crc32c, ChecksumKind::Blake3] {
        for size in [256, 1024, 4096, 16384] {
            let codec = FrameCodec::with_checksum(size, checksum).unwrap();
            let payload = vec![0x42u8; size];

            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", checksum), size),
                &payload,
                |b, payload| {
                    b.iter(|| codec.encode(1, 7, black_box(payload)).unwrap());
                },
            );
        }
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for size in [256, 1024, 4096, 16384] {
        let codec = FrameCodec::new(size).unwrap();
        let encoded = codec.encode(1, 7, &vec![0x42u8; size]).unwrap();

        group.throughput(Throughput::Bytes(encoded.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, data| {
            b.iter(|| codec.decode(black_box(data)).unwrap());
        });
    }

    group.finish();
}

fn bench_demux_mux(c: &mut Criterion) {
    let mut group = c.benchmark_group("demux_mux");
    let data: Vec<u8> = (0..1_000_000u32).map(|i| (i % 251) as u8).collect();
    let codec = FrameCodec::new(1024).unwrap();

    for channels in [1usize, 2, 8] {
        group.throughput(Throughput::Bytes(data.len() as u64));

        group.bench_with_input(BenchmarkId::new("split", channels), &data, |b, data| {
            b.iter(|| split_stream(black_box(data), codec, channels, 1024).unwrap());
        });

        let lanes = split_stream(&data, codec, channels, 1024).unwrap();
        group.bench_with_input(BenchmarkId::new("reassemble", channels), &lanes, |b, lanes| {
            b.iter(|| {
                let mut mux = ChannelMux::new(MuxConfig::new(codec, channels, 1024)).unwrap();
                for (channel, lane) in lanes.iter().enumerate() {
                    mux.push(channel, lane);
                }
                let mut out = Vec::with_capacity(data.len());
                mux.drain_to(&mut out).unwrap();
                out
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_demux_mux);
criterion_main!(benches);
