//! Progress lines shown while a generation is in flight.

use rand::seq::SliceRandom;

use muse_core::Track;

const IMAGE_MESSAGES: &[&str] = &[
    "Painting pixels...",
    "Talking to the muse...",
    "Polishing details...",
    "Finalizing masterpiece...",
];

const OBJECT_MESSAGES: &[&str] = &[
    "Crafting geometry...",
    "Shaping vertices...",
    "Building meshes...",
    "Rendering object...",
];

pub fn messages(track: Track) -> &'static [&'static str] {
    match track {
        Track::Image => IMAGE_MESSAGES,
        Track::Object => OBJECT_MESSAGES,
    }
}

/// A random progress line for `track`.
pub fn loading_message(track: Track) -> &'static str {
    messages(track)
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Working...")
}

/// Full status line, e.g. `Generating image (1-2 min)... Painting pixels...`.
pub fn status_line(track: Track) -> String {
    format!(
        "Generating {} (1-2 min)... {}",
        track.noun(),
        loading_message(track)
    )
}
