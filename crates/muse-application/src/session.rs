//! Process-lifetime session state, one section per track.
//!
//! All mutation goes through short critical sections on the controller's
//! `RwLock<SessionState>`; nothing here awaits.

use serde::Serialize;

use muse_core::artifact::{ImageArtifact, ObjectArtifact};
use muse_core::config::{Dimensions, Sample};
use muse_core::context::{ContextBuilder, ImageSelection, ReferenceState};
use muse_core::models::ModelCatalog;
use muse_core::sandbox::InstanceId;
use muse_core::store::ArtifactStore;
use muse_core::{MuseError, Result, Track};

/// Submission phase of one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Submitting,
}

/// How the last submission on a track ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Committed { index: usize },
    RolledBack { reason: String },
}

/// History plus submission bookkeeping, shared by both tracks.
#[derive(Debug, Clone)]
pub struct TrackState<A> {
    pub store: ArtifactStore<A>,
    phase: Phase,
    /// Prompt shown as a pending entry while `Submitting`.
    pending: Option<String>,
    /// Text currently in the prompt input.
    pub draft: String,
    last_outcome: Option<Outcome>,
}

impl<A> Default for TrackState<A> {
    fn default() -> Self {
        Self {
            store: ArtifactStore::new(),
            phase: Phase::Idle,
            pending: None,
            draft: String::new(),
            last_outcome: None,
        }
    }
}

impl<A> TrackState<A> {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == Phase::Submitting
    }

    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn last_outcome(&self) -> Option<&Outcome> {
        self.last_outcome.as_ref()
    }

    /// `Idle -> Submitting`: shows the pending placeholder and clears the draft.
    pub fn begin(&mut self, track: Track, prompt: &str) -> Result<()> {
        if self.is_submitting() {
            return Err(MuseError::AlreadyInProgress { track });
        }
        self.phase = Phase::Submitting;
        self.pending = Some(prompt.to_string());
        self.draft.clear();
        Ok(())
    }

    /// `Submitting -> Committed -> Idle`: appends the entry.
    pub fn commit(&mut self, prompt: &str, artifact: A) -> usize {
        let index = self.record(prompt, artifact);
        self.finish();
        index
    }

    /// Appends the entry but stays `Submitting` until [`finish`](Self::finish).
    ///
    /// History edits are refused in between, so follow-up work on the new
    /// entry (the sandbox relaunch) cannot interleave with a delete.
    pub fn record(&mut self, prompt: &str, artifact: A) -> usize {
        let index = self.store.append(prompt, artifact);
        self.pending = None;
        self.last_outcome = Some(Outcome::Committed { index });
        index
    }

    pub fn finish(&mut self) {
        self.phase = Phase::Idle;
    }

    /// `Submitting -> RolledBack -> Idle`: drops the placeholder and puts the
    /// prompt back into the input, exactly as submitted.
    pub fn roll_back(&mut self, raw_prompt: &str, error: &MuseError) {
        self.pending = None;
        self.phase = Phase::Idle;
        self.draft = raw_prompt.to_string();
        self.last_outcome = Some(Outcome::RolledBack {
            reason: error.to_string(),
        });
    }
}

/// Image track: history, external reference selection and model choice.
#[derive(Debug, Clone, Default)]
pub struct ImageTrackState {
    pub track: TrackState<ImageArtifact>,
    pub selection: ImageSelection,
    pub model: Option<String>,
}

impl ImageTrackState {
    pub fn reference(&self) -> ReferenceState {
        ContextBuilder::image_reference(&self.track.store, &self.selection)
    }
}

/// What the viewer currently shows for the object track.
///
/// Only events from the current sandbox instance may change it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewerState {
    pub instance: Option<InstanceId>,
    pub object_count: u32,
    pub size: Option<Dimensions>,
    pub auto_rotate: bool,
    pub wireframe: bool,
    pub last_error: Option<String>,
}

impl ViewerState {
    pub fn export_enabled(&self) -> bool {
        self.instance.is_some() && self.object_count > 0
    }

    /// Fresh viewer for a newly launched instance.
    pub fn attach(&mut self, instance: InstanceId) {
        *self = Self {
            instance: Some(instance),
            ..Self::default()
        };
    }

    /// Attaches `instance` unless the viewer already shows it.
    ///
    /// Events of a new instance can arrive before the launcher returns, so
    /// both sides call this and whichever runs first resets the viewer.
    pub fn ensure(&mut self, instance: InstanceId) {
        if self.instance != Some(instance) {
            self.attach(instance);
        }
    }

    pub fn detach(&mut self) {
        *self = Self::default();
    }
}

/// Object track: history, last screenshot, target size and viewer.
#[derive(Debug, Clone, Default)]
pub struct ObjectTrackState {
    pub track: TrackState<ObjectArtifact>,
    pub last_screenshot: Option<String>,
    pub dimensions: Dimensions,
    pub viewer: ViewerState,
}

impl ObjectTrackState {
    pub fn reference(&self) -> ReferenceState {
        ContextBuilder::object_reference(&self.track.store, self.last_screenshot.as_deref())
    }
}

/// The whole session. Owned by the controller, never global.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub image: ImageTrackState,
    pub object: ObjectTrackState,
    pub catalog: ModelCatalog,
    pub samples: Vec<Sample>,
}

impl SessionState {
    pub fn new(dimensions: Dimensions) -> Self {
        let mut state = Self::default();
        state.object.dimensions = dimensions;
        state
    }

    pub fn phase(&self, track: Track) -> Phase {
        match track {
            Track::Image => self.image.track.phase(),
            Track::Object => self.object.track.phase(),
        }
    }

    pub fn draft(&self, track: Track) -> &str {
        match track {
            Track::Image => &self.image.track.draft,
            Track::Object => &self.object.track.draft,
        }
    }

    pub fn set_draft(&mut self, track: Track, text: impl Into<String>) {
        match track {
            Track::Image => self.image.track.draft = text.into(),
            Track::Object => self.object.track.draft = text.into(),
        }
    }

    pub fn len(&self, track: Track) -> usize {
        match track {
            Track::Image => self.image.track.store.len(),
            Track::Object => self.object.track.store.len(),
        }
    }

    pub fn prompt_chain(&self, track: Track) -> Vec<String> {
        let chain = match track {
            Track::Image => self.image.track.store.prompt_chain(),
            Track::Object => self.object.track.store.prompt_chain(),
        };
        chain.into_iter().map(str::to_string).collect()
    }

    pub fn reference(&self, track: Track) -> ReferenceState {
        match track {
            Track::Image => self.image.reference(),
            Track::Object => self.object.reference(),
        }
    }

    pub fn last_outcome(&self, track: Track) -> Option<&Outcome> {
        match track {
            Track::Image => self.image.track.last_outcome(),
            Track::Object => self.object.track.last_outcome(),
        }
    }
}
