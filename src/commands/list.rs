//! List commands implementation

use envme_channel::available_channels;

/// List all channels compiled into this build
pub fn list_channels() {
    let channels = available_channels();

    println!("Available channels:");
    println!();
    if channels.is_empty() {
        println!("  none (recompile with backend features)");
        return;
    }
    for channel in channels {
        println!("  {:<8} - {}", channel.name, channel.description);
    }
}
