//! Fuzzing entry points for diode-core
//!
//! To use with cargo-fuzz:
//! 1. Install cargo-fuzz: cargo install cargo-fuzz
//! 2. Run fuzzer: cargo fuzz run fuzz_mux

use diode_core::{ChannelMux, FrameCodec, MuxConfig};

const MAX_PAYLOAD: usize = 64;

pub fn fuzz_decode(data: &[u8]) {
    let Ok(codec) = FrameCodec::new(MAX_PAYLOAD) else {
        return;
    };
    // Try to decode - should never panic
    let _ = codec.decode(data);
}

pub fn fuzz_scan(data: &[u8]) {
    let Ok(codec) = FrameCodec::new(MAX_PAYLOAD) else {
        return;
    };
    // Try to scan - should never panic
    let _ = diode_core::scan_capture(&codec, data);
}

/// First byte picks the channel count, the rest is dealt to the channels in
/// uneven pieces; reassembly must neither panic nor emit more than it was fed
pub fn fuzz_mux(data: &[u8]) {
    let Some((&first, rest)) = data.split_first() else {
        return;
    };
    let channels = usize::from(first % 4) + 1;
    let Ok(codec) = FrameCodec::new(MAX_PAYLOAD) else {
        return;
    };
    let Ok(mut mux) = ChannelMux::new(MuxConfig::new(codec, channels, MAX_PAYLOAD)) else {
        return;
    };

    for (i, piece) in rest.chunks(17).enumerate() {
        mux.push(i % channels, piece);
    }
    mux.close_all();

    let mut out = Vec::new();
    if mux.drain_to(&mut out).is_ok() {
        let report = mux.report();
        assert_eq!(report.bytes_out, out.len() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diode_core::split_stream;

    #[test]
    fn test_fuzz_decode_empty() {
        fuzz_decode(&[]);
    }

    #[test]
    fn test_fuzz_decode_random() {
        fuzz_decode(&[0xCA, 0xDE, 0x56, 0x78]);
    }

    #[test]
    fn test_fuzz_scan_empty() {
        fuzz_scan(&[]);
    }

    #[test]
    fn test_fuzz_scan_random() {
        fuzz_scan(&[0xFF; 1024]);
    }

    #[test]
    fn test_fuzz_mux_noise() {
        fuzz_mux(&[]);
        fuzz_mux(&[3]);
        fuzz_mux(&[0xCA; 700]);
    }

    #[test]
    fn test_fuzz_mux_valid_lanes() {
        let codec = FrameCodec::new(MAX_PAYLOAD).unwrap();
        let lanes = split_stream(&[7u8; 300], codec, 1, MAX_PAYLOAD).unwrap();
        let mut data = vec![0u8];
        data.extend_from_slice(&lanes[0]);
        fuzz_mux(&data);
    }
}
