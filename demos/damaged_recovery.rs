//! Example demonstrating recovery from damaged channels

use diode_core::{split_stream, ChannelMux, FrameCodec, MuxConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Diode Damaged Channel Recovery Example\n");

    // Step 1: Split a stream over three channels
    println!("Step 1: Framing 3000 bytes over 3 channels...");
    let input: Vec<u8> = (0..3000u32).map(|i| b'a' + (i % 26) as u8).collect();
    let codec = FrameCodec::new(100)?;
    let lanes = split_stream(&input, codec, 3, 100)?;
    let mut lanes: Vec<Vec<u8>> = lanes.into_iter().map(|l| l.to_vec()).collect();
    for (channel, lane) in lanes.iter().enumerate() {
        println!("Channel {}: {} bytes", channel, lane.len());
    }

    // Step 2: Simulate what a struggling modem does to its channel
    println!("\nStep 2: Simulating damage...");

    lanes[0][300..320].fill(0xFF);
    println!("Channel 0: overwrote bytes 300-320");

    lanes[1].drain(500..540);
    println!("Channel 1: dropped bytes 500-540");

    let dup = lanes[2][113..226].to_vec();
    lanes[2].splice(226..226, dup);
    println!("Channel 2: repeated its second frame");

    // Step 3: Reassemble
    println!("\nStep 3: Reassembling...");
    let mut mux = ChannelMux::new(MuxConfig::new(codec, 3, 100))?;
    for (channel, lane) in lanes.iter().enumerate() {
        mux.push(channel, lane);
        mux.close(channel);
    }
    let mut output = Vec::new();
    mux.drain_to(&mut output)?;
    let report = mux.into_report();

    // Step 4: Results
    println!("\n=== Recovery Results ===");
    println!("Output: {} of {} bytes", output.len(), input.len());
    println!("Gap markers: {}", report.gap_markers);
    println!("End of stream confirmed: {}", report.end_confirmed);

    for resync in &report.resyncs {
        println!(
            "ch{}: resynced at offset {} after skipping {} bytes (~{} lost), seq {} -> {}",
            resync.channel,
            resync.offset,
            resync.skipped,
            resync.estimated_lost,
            resync.expected_sequence,
            resync.resumed_sequence
        );
    }
    for run in report.runs() {
        println!("{}", run);
    }

    let intact = output
        .iter()
        .zip(&input)
        .filter(|(a, b)| a == b)
        .count();
    println!(
        "\nBytes matching the original: {} ({:.1}%)",
        intact,
        intact as f64 / input.len() as f64 * 100.0
    );

    Ok(())
}
