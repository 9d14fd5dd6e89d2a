//! Corruption vectors for the channel wire format
//!
//! Each vector damages channel 1 of a two-channel transfer in one specific way
//! and states what the receiver must make of it.

use diode_core::{split_stream, ChannelMux, FrameCodec, LossReport, MuxConfig};

const CHUNK: usize = 8;
const FRAMES_PER_CHANNEL: usize = 6;

fn codec() -> FrameCodec {
    FrameCodec::new(CHUNK).unwrap()
}

fn frame_len() -> usize {
    codec().encoded_len(CHUNK)
}

fn input() -> Vec<u8> {
    (0..2 * CHUNK * FRAMES_PER_CHANNEL).map(|i| i as u8).collect()
}

/// Transfer `input()` with `damage` applied to channel 1
fn transfer(damage: impl FnOnce(&mut Vec<u8>)) -> (Vec<u8>, LossReport) {
    let lanes = split_stream(&input(), codec(), 2, CHUNK).unwrap();
    let mut lane1 = lanes[1].to_vec();
    damage(&mut lane1);

    let mut mux = ChannelMux::new(MuxConfig::new(codec(), 2, CHUNK)).unwrap();
    mux.push(0, &lanes[0]);
    mux.push(1, &lane1);
    mux.close_all();

    let mut out = Vec::new();
    mux.drain_to(&mut out).unwrap();
    (out, mux.into_report())
}

/// Expected output with the given channel 1 sequences blanked
fn expected_with_gaps(sequences: &[usize]) -> Vec<u8> {
    let mut out = input();
    for &seq in sequences {
        let slot = seq * 2 + 1;
        out[slot * CHUNK..(slot + 1) * CHUNK].fill(0);
    }
    out
}

fn gap_sequences(report: &LossReport) -> Vec<u32> {
    report.gaps.iter().map(|g| g.sequence).collect()
}

#[test]
fn vector_frame_layout() {
    let frame = codec().encode(1, 2, b"hi").unwrap();
    assert_eq!(hex::encode(&frame[..11]), "cade010000000200026869");
    let checksum = u32::from_be_bytes(frame[11..15].try_into().unwrap());
    assert_eq!(checksum, crc32c::crc32c(&frame[2..11]));
    assert_eq!(frame.len(), 15);

    let end = codec().encode_end(1, 6);
    assert_eq!(hex::encode(&end[..9]), "cade01000000060000");
}

#[test]
fn vector_clean() {
    let (out, report) = transfer(|_| {});
    assert_eq!(out, input());
    assert!(report.is_clean());
    assert!(report.end_confirmed);
}

#[test]
fn vector_bit_flip() {
    let (out, report) = transfer(|lane| lane[2 * frame_len() + 12] ^= 0x01);
    assert_eq!(out, expected_with_gaps(&[2]));
    assert_eq!(gap_sequences(&report), vec![2]);
    assert_eq!(report.resyncs.len(), 1);
}

#[test]
fn vector_burst_error() {
    // Burst spanning the end of frame 1 and the start of frame 2
    let (out, report) = transfer(|lane| {
        let start = 2 * frame_len() - 5;
        lane[start..start + 10].fill(0xFF);
    });
    assert_eq!(out, expected_with_gaps(&[1, 2]));
    assert_eq!(gap_sequences(&report), vec![1, 2]);
}

#[test]
fn vector_inserted_garbage() {
    let (out, report) = transfer(|lane| {
        let at = 3 * frame_len();
        lane.splice(at..at, b"GARBAGE".iter().copied());
    });
    assert_eq!(out, input());
    assert!(report.gaps.is_empty());
    assert_eq!(report.resyncs.len(), 1);
    assert_eq!(report.resyncs[0].skipped, 7);
    assert_eq!(report.resyncs[0].estimated_lost, 0);
}

#[test]
fn vector_deleted_bytes() {
    let (out, report) = transfer(|lane| {
        let at = frame_len() + 4;
        lane.drain(at..at + 6);
    });
    assert_eq!(out, expected_with_gaps(&[1]));
    assert_eq!(report.resyncs[0].estimated_lost, 6);
}

#[test]
fn vector_wrong_checksum() {
    let (out, report) = transfer(|lane| {
        let at = 4 * frame_len() - 1;
        lane[at] = lane[at].wrapping_add(1);
    });
    assert_eq!(out, expected_with_gaps(&[3]));
    assert_eq!(report.gaps.len(), 1);
}

#[test]
fn vector_duplicate_frames() {
    let (out, report) = transfer(|lane| {
        let second = lane[frame_len()..2 * frame_len()].to_vec();
        lane.splice(2 * frame_len()..2 * frame_len(), second);
    });
    assert_eq!(out, input());
    assert_eq!(report.channels[1].duplicate_frames, 1);
}

#[test]
fn vector_swapped_frames() {
    // Frames 2 and 3 arrive in the wrong order; the late one is given up
    let (out, report) = transfer(|lane| {
        let f = frame_len();
        let two = lane[2 * f..3 * f].to_vec();
        let three = lane[3 * f..4 * f].to_vec();
        lane[2 * f..3 * f].copy_from_slice(&three);
        lane[3 * f..4 * f].copy_from_slice(&two);
    });
    assert_eq!(out, expected_with_gaps(&[2]));
    assert_eq!(report.channels[1].duplicate_frames, 1);
}

#[test]
fn vector_truncated_channel() {
    // Channel 1 ends inside frame 4 and its end-of-stream frame never arrives.
    // Frame 4 is lost for sure since channel 0 delivered past it; frame 5 may
    // or may not have existed, so output stops before it.
    let (out, report) = transfer(|lane| lane.truncate(4 * frame_len() + 5));
    let expected = expected_with_gaps(&[4]);
    assert_eq!(out, &expected[..11 * CHUNK]);
    assert_eq!(gap_sequences(&report), vec![4]);
    assert!(!report.end_confirmed);
}
