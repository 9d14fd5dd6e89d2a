//! Property-based tests using proptest

use diode_core::{
    scanner::estimate_loss, split_stream, ChannelMux, DecodeError, FrameCodec, MuxConfig,
    ResyncScanner, ScanResult,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_round_trip_encode_decode(
        channel in any::<u8>(),
        sequence in any::<u32>(),
        payload in prop::collection::vec(any::<u8>(), 1..1024)
    ) {
        let codec = FrameCodec::new(1024).unwrap();
        let encoded = codec.encode(channel, sequence, &payload).unwrap();
        let decoded = codec.decode(&encoded).unwrap();

        prop_assert_eq!(decoded.channel_id(), channel);
        prop_assert_eq!(decoded.sequence(), sequence);
        prop_assert_eq!(decoded.payload.as_ref(), payload.as_slice());
    }

    #[test]
    fn prop_decode_never_panics(
        data in prop::collection::vec(any::<u8>(), 0..4096)
    ) {
        let codec = FrameCodec::new(1024).unwrap();
        let _ = codec.decode(&data);
    }

    #[test]
    fn prop_scan_never_panics(
        data in prop::collection::vec(any::<u8>(), 0..8192),
        from in 0usize..64,
        skipped in 0usize..512
    ) {
        let codec = FrameCodec::new(256).unwrap();
        let _ = ResyncScanner::new(codec, 1024).scan(&data, from, skipped);
        let _ = diode_core::scan_capture(&codec, &data);
    }

    #[test]
    fn prop_payload_bit_flip_detected(
        payload in prop::collection::vec(any::<u8>(), 1..256),
        bit in any::<usize>()
    ) {
        let codec = FrameCodec::new(256).unwrap();
        let mut encoded = codec.encode(1, 2, &payload).unwrap().to_vec();
        let bit = bit % (payload.len() * 8);
        encoded[codec.header_len() + bit / 8] ^= 1 << (bit % 8);

        let is_checksum_mismatch = matches!(
            codec.decode(&encoded),
            Err(DecodeError::ChecksumMismatch { .. })
        );
        prop_assert!(is_checksum_mismatch);
    }

    #[test]
    fn prop_mux_of_demux_is_identity(
        data in prop::collection::vec(any::<u8>(), 0..4096),
        channels in 1usize..8,
        chunk_size in 1usize..64
    ) {
        let codec = FrameCodec::new(64).unwrap();
        let lanes = split_stream(&data, codec, channels, chunk_size).unwrap();

        let mut mux = ChannelMux::new(MuxConfig::new(codec, channels, chunk_size)).unwrap();
        for (channel, lane) in lanes.iter().enumerate() {
            mux.push(channel, lane);
        }
        let mut out = Vec::new();
        mux.drain_to(&mut out).unwrap();

        prop_assert_eq!(out, data);
        prop_assert!(mux.is_finished());
        prop_assert!(mux.report().is_clean());
    }

    #[test]
    fn prop_splice_loss_estimate_is_exact(
        frames in 3u32..10,
        victim in 0u32..2,
        start in 1usize..40,
        len in 1usize..30
    ) {
        let codec = FrameCodec::new(48).unwrap();
        let frame_len = codec.encoded_len(48);
        let mut stream = Vec::new();
        for seq in 0..frames {
            stream.extend_from_slice(&codec.encode(0, seq, &[seq as u8; 48]).unwrap());
        }

        // Splice `len` bytes out of frame `victim`, leaving its magic intact
        let at = victim as usize * frame_len + start;
        let len = len.min(frame_len - start);
        stream.drain(at..at + len);

        let broken = &stream[victim as usize * frame_len..];
        let scanner = ResyncScanner::new(codec, 4 * frame_len);
        match scanner.scan(broken, 1, 0) {
            ScanResult::Found { offset, frame, .. } => {
                prop_assert_eq!(frame.sequence(), victim + 1);
                prop_assert_eq!(estimate_loss(victim, frame.sequence(), offset, frame_len), len);
            }
            other => prop_assert!(false, "unexpected scan result: {:?}", other),
        }
    }

    #[test]
    fn prop_oversized_payload_rejected(
        max in 1usize..512,
        extra in 1usize..64
    ) {
        let codec = FrameCodec::new(max).unwrap();
        prop_assert!(codec.encode(0, 0, &vec![0u8; max + extra]).is_err());
    }
}
