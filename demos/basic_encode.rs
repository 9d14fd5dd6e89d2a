//! Basic demultiplexing example

use diode_core::{ChannelDemux, FrameCodec};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Diode Basic Demux Example\n");

    let codec = FrameCodec::new(64)?;
    let mut demux = ChannelDemux::new(codec, 2, 64)?;

    let message = "The quick brown fox jumps over the lazy dog. ".repeat(8);
    let mut lanes = vec![Vec::<u8>::new(); demux.channels()];

    // Feed in two pieces to show chunks spanning pushes
    let (head, tail) = message.as_bytes().split_at(100);
    let mut frames = demux.push(head)?;
    frames.extend(demux.push(tail)?);
    frames.extend(demux.finish()?);

    for out in frames {
        println!(
            "ch{} seq {:>2}: {} bytes",
            out.channel,
            out.sequence,
            out.bytes.len()
        );
        lanes[out.channel].extend_from_slice(&out.bytes);
    }

    for (channel, lane) in lanes.iter().enumerate() {
        let path = format!("example_channel{}.dio", channel);
        std::fs::write(&path, lane)?;
        println!("\nWrote {} bytes to {}", lane.len(), path);
    }
    println!("Use 'diode unframe --tag example_channel -o out.txt' to read them back");

    Ok(())
}
