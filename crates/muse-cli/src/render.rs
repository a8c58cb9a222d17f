//! Terminal rendering of notices and session state.

use colored::Colorize;

use muse_application::{Outcome, Phase, SessionState};
use muse_core::Track;
use muse_core::config::Sample;
use muse_core::context::{ImageSource, ReferenceState};
use muse_core::models::ModelOption;
use muse_core::notice::{Notice, NoticeLevel};

const PREVIEW_CHARS: usize = 60;

/// Shortens long values (data URLs, code) for one-line display.
pub fn preview(value: &str) -> String {
    let flat = value.replace('\n', " ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let head: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{head}... ({} chars)", value.len())
}

pub fn notice(notice: &Notice) {
    let line = format!("[{}] {}", notice.title, notice.body);
    let colored = match notice.level {
        NoticeLevel::Success => line.bright_green(),
        NoticeLevel::Info => line.bright_blue(),
        NoticeLevel::Warning => line.yellow(),
        NoticeLevel::Danger => line.red(),
    };
    println!("{colored}");
}

fn reference(state: &ReferenceState) -> String {
    match state {
        ReferenceState::Empty => "none".to_string(),
        ReferenceState::Image(ImageSource::Upload(path)) => format!("upload {path}"),
        ReferenceState::Image(ImageSource::Url(url)) => format!("url {}", preview(url)),
        ReferenceState::Image(ImageSource::Generated(url)) => {
            format!("latest image {}", preview(url))
        }
        ReferenceState::Object {
            source_code,
            screenshot,
        } => format!(
            "latest code ({} lines){}",
            source_code.lines().count(),
            if screenshot.is_some() {
                ", screenshot captured"
            } else {
                ""
            }
        ),
    }
}

fn outcome(outcome: Option<&Outcome>) -> String {
    match outcome {
        None => "-".to_string(),
        Some(Outcome::Committed { index }) => format!("committed #{index}"),
        Some(Outcome::RolledBack { reason }) => format!("rolled back: {reason}"),
    }
}

pub fn status(state: &SessionState, active: Track) {
    for track in [Track::Image, Track::Object] {
        let marker = if track == active { "*" } else { " " };
        let phase = match state.phase(track) {
            Phase::Idle => "idle".normal(),
            Phase::Submitting => "submitting".bright_yellow(),
        };
        println!(
            "{} {} {} | {} entries | reference: {} | last: {}",
            marker,
            track.to_string().bold(),
            phase,
            state.len(track),
            reference(&state.reference(track)),
            outcome(state.last_outcome(track)),
        );
        let draft = state.draft(track);
        if !draft.is_empty() {
            println!("    draft: {}", preview(draft).bright_black());
        }
    }

    println!(
        "  image model: {}",
        state.image.model.as_deref().unwrap_or("(none, use /models)")
    );

    let object = &state.object;
    let dims = object.dimensions;
    println!("  3d target: {} x {} x {}", dims.x, dims.y, dims.z);
    let viewer = &object.viewer;
    match viewer.instance {
        Some(id) => {
            let size = viewer
                .size
                .map(|s| format!("{:.2} x {:.2} x {:.2}", s.x, s.y, s.z))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  viewer {}: {} objects, size {}, auto-rotate {}, wireframe {}, export {}",
                id,
                viewer.object_count,
                size,
                on_off(viewer.auto_rotate),
                on_off(viewer.wireframe),
                on_off(viewer.export_enabled()),
            );
            if let Some(error) = &viewer.last_error {
                println!("  {}", format!("last error: {error}").red());
            }
        }
        None => println!("  viewer: detached"),
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

pub fn history(state: &SessionState, track: Track) {
    println!("{}", format!("{track} history").bold());
    match track {
        Track::Image => {
            for entry in state.image.track.store.entries() {
                println!(
                    "  #{} {} {}",
                    entry.index,
                    entry.prompt.green(),
                    preview(&entry.artifact.image_url).bright_black()
                );
            }
        }
        Track::Object => {
            for entry in state.object.track.store.entries() {
                println!(
                    "  #{} {} {}",
                    entry.index,
                    entry.prompt.green(),
                    preview(&entry.artifact.source_code).bright_black()
                );
            }
        }
    }
    if let Some(pending) = match track {
        Track::Image => state.image.track.pending(),
        Track::Object => state.object.track.pending(),
    } {
        println!("  (pending) {}", pending.yellow());
    }
}

pub fn models(options: &[ModelOption], selected: Option<&str>) {
    if options.is_empty() {
        println!("{}", "No models available".bright_black());
        return;
    }
    for option in options {
        let marker = if Some(option.id.as_str()) == selected {
            "*"
        } else {
            " "
        };
        println!("{marker} {}", option.label());
    }
}

pub fn samples(samples: &[Sample]) {
    if samples.is_empty() {
        println!("{}", "No samples configured".bright_black());
        return;
    }
    for (index, sample) in samples.iter().enumerate() {
        println!(
            "  {} {} {}",
            index.to_string().bold(),
            sample.title.bright_cyan(),
            preview(&sample.prompt).bright_black()
        );
    }
}
