use super::*;
use crate::session::Phase;
use crate::test_support::*;

use muse_core::backend::SceneReply;
use muse_core::notice::NoticeLevel;
use muse_core::response::ImageReply;
use muse_core::sandbox::SandboxLauncher;
use muse_execution::{Disposition, LocalSandboxLauncher, SandboxEvents};
use tokio::sync::mpsc;

struct Harness {
    state: Arc<RwLock<SessionState>>,
    backend: Arc<MockBackend>,
    resolver: Arc<MockResolver>,
    sandbox: Arc<SandboxChannel>,
    events: Option<SandboxEvents>,
    notices: mpsc::UnboundedReceiver<Notice>,
    orchestrator: Arc<GenerationOrchestrator>,
}

impl Harness {
    fn build(
        backend: MockBackend,
        resolver: MockResolver,
        launcher: Arc<dyn SandboxLauncher>,
        settings: OrchestratorSettings,
    ) -> Self {
        let state = Arc::new(RwLock::new(SessionState::default()));
        let backend = Arc::new(backend);
        let resolver = Arc::new(resolver);
        let (channel, events) = SandboxChannel::new(launcher);
        let sandbox = Arc::new(channel);
        let (notifier, notices) = Notifier::channel();
        let orchestrator = Arc::new(GenerationOrchestrator::new(
            state.clone(),
            backend.clone(),
            resolver.clone(),
            sandbox.clone(),
            notifier,
            settings,
        ));
        Self {
            state,
            backend,
            resolver,
            sandbox,
            events: Some(events),
            notices,
            orchestrator,
        }
    }

    fn new() -> Self {
        Self::build(
            MockBackend::default(),
            MockResolver::default(),
            Arc::new(LocalSandboxLauncher::headless()),
            OrchestratorSettings::default(),
        )
    }

    async fn with_image_model(self) -> Self {
        self.state.write().await.image.model = Some("google/gemini-2.5-flash-image-preview".into());
        self
    }

    /// Routes sandbox events through the channel the way the controller does.
    fn pump(&mut self) {
        let mut events = self.events.take().expect("pump started twice");
        let sandbox = self.sandbox.clone();
        tokio::spawn(async move {
            while let Some(message) = events.recv().await {
                let _ = sandbox.accept(&message).await;
            }
        });
    }

    fn drain_notices(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            notices.push(notice);
        }
        notices
    }
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_empty_prompt_is_rejected_without_state_change() {
    let mut harness = Harness::new().with_image_model().await;
    harness.state.write().await.image.track.draft = "   ".into();

    let err = harness.orchestrator.submit(Track::Image, "   ").await.unwrap_err();
    assert_eq!(err, MuseError::EmptyPrompt);
    assert!(harness.backend.image_requests().is_empty());

    let state = harness.state.read().await;
    assert_eq!(state.image.track.phase(), Phase::Idle);
    assert_eq!(state.image.track.draft, "   ");
    drop(state);

    let notices = harness.drain_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].title, "Prompt missing");
}

#[tokio::test]
async fn test_image_track_requires_model() {
    let mut harness = Harness::new();
    let err = harness.orchestrator.submit(Track::Image, "a cat").await.unwrap_err();
    assert_eq!(err, MuseError::NoModelSelected { track: Track::Image });

    let state = harness.state.read().await;
    assert!(state.image.track.store.is_empty());
    assert_eq!(state.image.track.pending(), None);
    drop(state);
    assert_eq!(harness.drain_notices()[0].title, "Model missing");
}

// ============================================================================
// Image track
// ============================================================================

#[tokio::test]
async fn test_image_commit_and_follow_up_context() {
    let mut harness = Harness::new().with_image_model().await;

    let first = harness.orchestrator.submit(Track::Image, " a cat ").await.unwrap();
    assert_eq!(first, 0);
    let second = harness.orchestrator.submit(Track::Image, "make it blue").await.unwrap();
    assert_eq!(second, 1);

    let requests = harness.backend.image_requests();
    assert_eq!(requests[0].prompt, "a cat");
    assert_eq!(requests[0].reference_image, None);
    assert!(!requests[0].is_edit());

    assert!(requests[1].prompt.starts_with("make it blue"));
    assert!(requests[1].prompt.contains("\na cat\n"));
    assert_eq!(requests[1].reference_image.as_deref(), Some(GENERATED_IMAGE));

    let state = harness.state.read().await;
    assert_eq!(state.prompt_chain(Track::Image), vec!["a cat", "make it blue"]);
    assert_eq!(
        state.image.track.store.latest().map(|a| a.image_url.as_str()),
        Some(GENERATED_IMAGE)
    );
    drop(state);

    let notices = harness.drain_notices();
    assert!(
        notices
            .iter()
            .all(|n| n.level == NoticeLevel::Success && n.body == "Image generated successfully")
    );
}

#[tokio::test]
async fn test_image_rollback_restores_prompt_verbatim() {
    let mut harness = Harness::new().with_image_model().await;
    harness.orchestrator.submit(Track::Image, "a cat").await.unwrap();
    harness
        .backend
        .push_image(Err(MuseError::backend_status(500, "upstream exploded")));

    let raw = "  make it a dog  ";
    let err = harness.orchestrator.submit(Track::Image, raw).await.unwrap_err();
    assert!(err.is_backend());

    let state = harness.state.read().await;
    assert_eq!(state.image.track.store.len(), 1);
    assert_eq!(
        state.image.track.store.latest().map(|a| a.image_url.as_str()),
        Some(GENERATED_IMAGE)
    );
    assert_eq!(state.image.track.draft, raw);
    assert_eq!(state.image.track.phase(), Phase::Idle);
    drop(state);

    let last = harness.drain_notices().pop().unwrap();
    assert_eq!(last.title, "Generation error");
    assert_eq!(last.level, NoticeLevel::Danger);
}

#[tokio::test]
async fn test_text_only_reply_is_rolled_back() {
    let harness = Harness::new().with_image_model().await;
    harness.backend.push_image(Ok(ImageReply {
        inline_image: None,
        text: Some("I cannot draw that".into()),
    }));

    let err = harness.orchestrator.submit(Track::Image, "a cat").await.unwrap_err();
    assert_eq!(
        err,
        MuseError::NoImageProduced {
            excerpt: "I cannot draw that".into()
        }
    );
    assert!(harness.state.read().await.image.track.store.is_empty());
}

#[tokio::test]
async fn test_pinned_url_is_used_then_released() {
    let harness = Harness::new().with_image_model().await;
    harness.orchestrator.submit(Track::Image, "a cat").await.unwrap();
    harness
        .state
        .write()
        .await
        .image
        .selection
        .set_url("https://example.com/sample.png");

    harness.orchestrator.submit(Track::Image, "restyle").await.unwrap();
    let seen = harness.resolver.seen.lock().unwrap().clone();
    assert_eq!(
        seen.last(),
        Some(&ImageSource::Url("https://example.com/sample.png".into()))
    );

    assert!(!harness.state.read().await.image.selection.is_pinned());
}

#[tokio::test]
async fn test_reference_conversion_failure_is_not_fatal() {
    let harness = Harness::build(
        MockBackend::default(),
        MockResolver::failing(),
        Arc::new(LocalSandboxLauncher::headless()),
        OrchestratorSettings::default(),
    )
    .with_image_model()
    .await;
    harness
        .state
        .write()
        .await
        .image
        .selection
        .set_url("https://example.com/missing.png");

    harness.orchestrator.submit(Track::Image, "a cat").await.unwrap();
    assert_eq!(harness.backend.image_requests()[0].reference_image, None);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn test_second_submit_on_same_track_is_rejected() {
    let gate = Arc::new(Gate::default());
    let harness = Harness::build(
        MockBackend::gated(gate.clone()),
        MockResolver::default(),
        Arc::new(LocalSandboxLauncher::headless()),
        OrchestratorSettings::default(),
    )
    .with_image_model()
    .await;

    let in_flight = {
        let orchestrator = harness.orchestrator.clone();
        tokio::spawn(async move { orchestrator.submit(Track::Image, "first").await })
    };
    gate.entered.notified().await;
    assert_eq!(harness.state.read().await.phase(Track::Image), Phase::Submitting);

    let err = harness.orchestrator.submit(Track::Image, "second").await.unwrap_err();
    assert_eq!(err, MuseError::AlreadyInProgress { track: Track::Image });
    {
        let state = harness.state.read().await;
        assert!(state.image.track.store.is_empty());
        assert_eq!(state.image.track.pending(), Some("first"));
    }

    gate.release.notify_one();
    assert_eq!(in_flight.await.unwrap().unwrap(), 0);

    let state = harness.state.read().await;
    assert_eq!(state.prompt_chain(Track::Image), vec!["first"]);
    assert_eq!(harness.backend.image_requests().len(), 1);
}

#[tokio::test]
async fn test_other_track_proceeds_while_one_is_in_flight() {
    let gate = Arc::new(Gate::default());
    let harness = Harness::build(
        MockBackend::gated(gate.clone()),
        MockResolver::default(),
        Arc::new(LocalSandboxLauncher::headless()),
        OrchestratorSettings::default(),
    )
    .with_image_model()
    .await;

    let in_flight = {
        let orchestrator = harness.orchestrator.clone();
        tokio::spawn(async move { orchestrator.submit(Track::Image, "a cat").await })
    };
    gate.entered.notified().await;

    let index = harness.orchestrator.submit(Track::Object, "a chair").await.unwrap();
    assert_eq!(index, 0);
    assert_eq!(harness.state.read().await.phase(Track::Image), Phase::Submitting);

    gate.release.notify_one();
    in_flight.await.unwrap().unwrap();
}

// ============================================================================
// Object track
// ============================================================================

#[tokio::test]
async fn test_red_cube_end_to_end_request() {
    let mut harness = Harness::new();
    harness.pump();

    let index = harness.orchestrator.submit(Track::Object, "a red cube").await.unwrap();
    assert_eq!(index, 0);

    let requests = harness.backend.scene_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].prompt, "a red cube");
    assert_eq!(requests[0].model, DEFAULT_SCENE_MODEL);
    assert_eq!(requests[0].prior_source, None);
    assert_eq!(requests[0].screenshot, None);
    assert!(!requests[0].is_modification());

    let state = harness.state.read().await;
    let entry = state.object.track.store.latest_entry().unwrap();
    assert_eq!(entry.index, 0);
    assert_eq!(entry.prompt, "a red cube");
    assert_eq!(entry.artifact.source_code, CUBE_CODE);
    assert!(state.object.viewer.instance.is_some());
    assert_eq!(state.reference(Track::Object).source_code(), Some(CUBE_CODE));
}

#[tokio::test]
async fn test_follow_up_captures_screenshot_from_live_sandbox() {
    let mut harness = Harness::new();
    harness.pump();

    harness.orchestrator.submit(Track::Object, "a red cube").await.unwrap();
    harness.orchestrator.submit(Track::Object, "make it taller").await.unwrap();

    let requests = harness.backend.scene_requests();
    let follow_up = &requests[1];
    assert_eq!(follow_up.prior_source.as_deref(), Some(CUBE_CODE));
    assert!(
        follow_up
            .screenshot
            .as_deref()
            .is_some_and(|s| s.starts_with("data:image/png;base64,"))
    );
    assert!(follow_up.is_modification());

    let state = harness.state.read().await;
    assert_eq!(state.object.track.store.len(), 2);
    assert_eq!(
        state.object.track.store.latest().unwrap().screenshot,
        follow_up.screenshot
    );
    // That capture showed the first cube, not the committed code.
    assert_eq!(state.object.last_screenshot, None);
    assert_eq!(state.reference(Track::Object).screenshot(), None);
}

#[tokio::test]
async fn test_screenshot_timeout_is_not_fatal() {
    let harness = Harness::build(
        MockBackend::default(),
        MockResolver::default(),
        Arc::new(SilentLauncher::default()),
        OrchestratorSettings {
            screenshot_timeout: Duration::from_millis(50),
            ..OrchestratorSettings::default()
        },
    );

    harness.orchestrator.submit(Track::Object, "a red cube").await.unwrap();
    harness.orchestrator.submit(Track::Object, "make it blue").await.unwrap();

    let requests = harness.backend.scene_requests();
    assert_eq!(requests[1].prior_source.as_deref(), Some(CUBE_CODE));
    assert_eq!(requests[1].screenshot, None);
    assert_eq!(harness.state.read().await.object.track.store.len(), 2);
}

#[tokio::test]
async fn test_empty_scene_reply_rolls_back() {
    let harness = Harness::new();
    harness.backend.push_scene(Ok(SceneReply {
        content: Some("```javascript\n```".into()),
    }));

    let err = harness.orchestrator.submit(Track::Object, "a chair").await.unwrap_err();
    assert_eq!(err, MuseError::EmptyResponse);

    let state = harness.state.read().await;
    assert!(state.object.track.store.is_empty());
    assert_eq!(state.object.track.draft, "a chair");
    assert!(state.object.viewer.instance.is_none());
    drop(state);
    assert_eq!(harness.sandbox.current_instance().await, None);
}

#[tokio::test]
async fn test_scene_request_carries_image_reference() {
    let harness = Harness::new();
    harness
        .state
        .write()
        .await
        .image
        .selection
        .set_upload("/tmp/chair.png");

    harness.orchestrator.submit(Track::Object, "a chair").await.unwrap();
    let requests = harness.backend.scene_requests();
    let request = &requests[0];
    assert!(request.reference_image.is_some());
    assert_eq!(
        harness.resolver.seen.lock().unwrap().as_slice(),
        &[ImageSource::Upload("/tmp/chair.png".into())]
    );
}

#[tokio::test]
async fn test_stale_instance_after_new_commit() {
    let mut harness = Harness::new();
    harness.pump();

    harness.orchestrator.submit(Track::Object, "one").await.unwrap();
    let first = harness.sandbox.current_instance().await.unwrap();
    harness.orchestrator.submit(Track::Object, "two").await.unwrap();
    let second = harness.sandbox.current_instance().await.unwrap();
    assert_ne!(first, second);

    let stale = muse_core::sandbox::SandboxMessage {
        source: first,
        event: muse_core::sandbox::SandboxEvent::ObjectsReady { count: 9 },
    };
    assert_eq!(harness.sandbox.accept(&stale).await.unwrap(), Disposition::Stale);
}
