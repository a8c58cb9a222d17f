//! REPL command parsing.

use std::str::FromStr;

use muse_core::Track;
use muse_core::config::Dimensions;

/// Slash commands offered for completion.
pub const COMMANDS: &[&str] = &[
    "/image",
    "/3d",
    "/track",
    "/submit",
    "/delete",
    "/history",
    "/url",
    "/upload",
    "/clear-ref",
    "/samples",
    "/sample",
    "/models",
    "/model",
    "/dims",
    "/reset",
    "/rotate",
    "/wireframe",
    "/export",
    "/status",
    "/help",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Submit a prompt on a specific track.
    Generate { track: Track, prompt: String },
    /// Plain text: submit on the active track.
    Prompt(String),
    SwitchTrack(Track),
    /// Submit the active track's draft (filled by `/sample`).
    SubmitDraft,
    Delete { track: Track, index: i64 },
    History(Option<Track>),
    Url(String),
    Upload(String),
    ClearReference,
    ListSamples,
    SelectSample(usize),
    ListModels,
    SelectModel(Option<String>),
    Dimensions(Dimensions),
    ResetCamera,
    ToggleAutoRotate,
    ToggleWireframe,
    Export,
    Status,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line == "quit" || line == "exit" {
            return Ok(Command::Quit);
        }
        if !line.starts_with('/') {
            return Ok(Command::Prompt(line.to_string()));
        }

        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        match name {
            "/image" => generate(Track::Image, rest),
            "/3d" | "/object" => generate(Track::Object, rest),
            "/track" => required(rest, "/track <image|3d>")
                .and_then(|t| parse_track(&t))
                .map(Command::SwitchTrack),
            "/submit" => Ok(Command::SubmitDraft),
            "/delete" => parse_delete(rest),
            "/history" => {
                if rest.is_empty() {
                    Ok(Command::History(None))
                } else {
                    parse_track(rest).map(|t| Command::History(Some(t)))
                }
            }
            "/url" => required(rest, "/url <image url>").map(Command::Url),
            "/upload" => required(rest, "/upload <file path>").map(Command::Upload),
            "/clear-ref" => Ok(Command::ClearReference),
            "/samples" => Ok(Command::ListSamples),
            "/sample" => rest
                .parse::<usize>()
                .map(Command::SelectSample)
                .map_err(|_| "Usage: /sample <number>".to_string()),
            "/models" => Ok(Command::ListModels),
            "/model" => Ok(Command::SelectModel(
                Some(rest.to_string()).filter(|m| !m.is_empty()),
            )),
            "/dims" => parse_dimensions(rest).map(Command::Dimensions),
            "/reset" => Ok(Command::ResetCamera),
            "/rotate" => Ok(Command::ToggleAutoRotate),
            "/wireframe" => Ok(Command::ToggleWireframe),
            "/export" => Ok(Command::Export),
            "/status" => Ok(Command::Status),
            "/help" => Ok(Command::Help),
            other => Err(format!("Unknown command: {other} (try /help)")),
        }
    }
}

fn generate(track: Track, prompt: &str) -> Result<Command, String> {
    // An empty prompt is passed through so the session reports it.
    Ok(Command::Generate {
        track,
        prompt: prompt.to_string(),
    })
}

fn required(value: &str, usage: &str) -> Result<String, String> {
    if value.is_empty() {
        Err(format!("Usage: {usage}"))
    } else {
        Ok(value.to_string())
    }
}

fn parse_track(value: &str) -> Result<Track, String> {
    Track::from_str(value).map_err(|_| format!("Unknown track '{value}' (image or 3d)"))
}

fn parse_delete(rest: &str) -> Result<Command, String> {
    const USAGE: &str = "Usage: /delete <image|3d> <index>";
    let mut parts = rest.split_whitespace();
    let track = parts.next().ok_or(USAGE)?;
    let index = parts.next().ok_or(USAGE)?;
    Ok(Command::Delete {
        track: parse_track(track)?,
        index: index.parse().map_err(|_| USAGE.to_string())?,
    })
}

fn parse_dimensions(rest: &str) -> Result<Dimensions, String> {
    const USAGE: &str = "Usage: /dims <x> <y> <z>";
    let values: Vec<f64> = rest
        .split(|c: char| c.is_whitespace() || c == 'x' || c == ',')
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|_| USAGE.to_string())?;
    match values.as_slice() {
        [x, y, z] if *x > 0.0 && *y > 0.0 && *z > 0.0 => Ok(Dimensions::new(*x, *y, *z)),
        _ => Err(USAGE.to_string()),
    }
}

pub const HELP: &str = "\
Type a prompt to generate on the active track, or use a command:
  /image <prompt>          generate or edit an image
  /3d <prompt>             generate or modify a 3D object
  /track <image|3d>        switch the active track
  /submit                  submit the active track's draft
  /delete <track> <index>  delete an entry and everything after it
  /history [track]         list committed entries
  /url <url>               use an image URL as reference
  /upload <path>           use a local image as reference
  /clear-ref               drop the image reference
  /samples, /sample <n>    list samples, or load one
  /models, /model [id]     list models, or pick the image model
  /dims <x> <y> <z>        target size for 3D objects
  /reset /rotate /wireframe /export   viewer controls
  /status                  show both tracks
  quit                     leave";
