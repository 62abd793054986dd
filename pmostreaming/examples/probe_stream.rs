//! Example: probe a radio stream or a local file
//!
//! Run with: cargo run -p pmostreaming --example probe_stream -- http://radio.example/live.ogg
//! Optional second argument: listening time in seconds (default 10)
//!
//! Set RUST_LOG=pmostreaming=debug to see the session events.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use pmostreaming::{
    AudioEntryProvider, AudioStreamSourceDelegate, EntryEvent, EntryEventRelay, StreamingSettings,
};
use pmoutils::{Broadcaster, BufferingPolicy};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG prime sur le niveau configuré
    let config = pmoconfig::get_config();
    let level = config.get_log_min_level()?.to_lowercase();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    if config.get_log_enable_console()? {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }

    let mut args = env::args().skip(1);
    let Some(address) = args.next() else {
        eprintln!("Usage: probe_stream <url-or-path> [seconds]");
        std::process::exit(1);
    };
    let seconds: u64 = args.next().map(|s| s.parse::<u64>()).transpose()?.unwrap_or(10);

    let provider = AudioEntryProvider::from_settings(StreamingSettings::from_config(&config)?)?;
    let entry = provider.provide(&address).await?;

    let events = Broadcaster::new();
    let mut subscription = events.values_with(BufferingPolicy::Unbounded);
    let relay = EntryEventRelay::new(entry.id().clone(), events);
    let delegate: Arc<dyn AudioStreamSourceDelegate> = relay.clone();
    entry.set_delegate(Arc::downgrade(&delegate));

    println!("Probing {} for {}s...\n", address, seconds);
    entry.open();

    let mut received = 0usize;
    let listening = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(listening);

    loop {
        tokio::select! {
            _ = &mut listening => break,
            event = subscription.next() => match event {
                Some(EntryEvent::DataReceived { bytes, .. }) => received += bytes,
                Some(EntryEvent::Metadata { tags, .. }) => {
                    println!("Metadata:");
                    let mut tags: Vec<_> = tags.into_iter().collect();
                    tags.sort();
                    for (key, value) in tags {
                        println!("  {}: {}", key, value);
                    }
                }
                Some(EntryEvent::EndOfFile { .. }) => {
                    println!("End of stream");
                    break;
                }
                Some(EntryEvent::Failed { error, .. }) => {
                    println!("Error: {}", error);
                    break;
                }
                None => break,
            },
        }
    }
    entry.close();

    let source = entry.source();
    println!("---");
    println!("Type: {}", source.audio_file_type());
    println!("Received: {} bytes (position {})", received, source.position());
    println!("Length: {} bytes, seekable: {}", source.length(), source.supports_seek());

    if let Some(info) = entry.ogg_info() {
        println!(
            "Ogg Vorbis: {} Hz, {} channel(s), nominal {} kbps, {} pages scanned",
            info.sample_rate, info.channels, info.nominal_bitrate, info.page_count
        );
    }
    let bitrate = entry.calculated_bitrate();
    if bitrate > 0.0 {
        println!("Estimated bitrate: {:.0} bit/s", bitrate);
    }
    let duration = entry.duration();
    if duration > 0.0 {
        println!("Estimated duration: {:.1}s", duration);
    }

    Ok(())
}
