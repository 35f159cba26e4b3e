use std::sync::Arc;

use playback::config::PlayerConfig;
use playback::{EngineEvent, EngineFactory, MediaElement, PlaybackController, QualityLevel};

use super::{CallLog, EngineHandle, FakeFactory, FakeMedia, STREAM_URL, settle};

/// A controller wired to recording fakes.
pub struct Harness {
    pub log: CallLog,
    pub factory: Arc<FakeFactory>,
    pub media: Arc<FakeMedia>,
    pub controller: PlaybackController,
}

impl Harness {
    pub fn new() -> Self {
        let log = CallLog::default();
        let factory = Arc::new(FakeFactory::new(log.clone()));
        let media = FakeMedia::new(log.clone());
        Self::with(log, factory, media)
    }

    pub fn with(log: CallLog, factory: Arc<FakeFactory>, media: Arc<FakeMedia>) -> Self {
        let controller = PlaybackController::new(
            Arc::clone(&factory) as Arc<dyn EngineFactory>,
            PlayerConfig::default(),
        )
        .expect("default config is valid");
        Self {
            log,
            factory,
            media,
            controller,
        }
    }

    pub fn media_arg(&self) -> Option<Arc<dyn MediaElement>> {
        Some(Arc::clone(&self.media) as Arc<dyn MediaElement>)
    }

    pub fn engine(&self) -> EngineHandle {
        self.factory.engine()
    }

    pub async fn start(&self) {
        self.controller
            .start(STREAM_URL, self.media_arg())
            .expect("start succeeds");
        settle().await;
    }

    /// Start, parse a manifest with `levels` and let the media element begin playing.
    pub async fn start_playing(&self, levels: Vec<QualityLevel>) {
        self.start().await;
        self.engine().emit(EngineEvent::ManifestParsed { levels });
        settle().await;
    }
}
