//! Transporte de voz en memoria y fixtures para los tests del reproductor

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::sync::mpsc::{self, UnboundedReceiver};

use super::{
    error::PlayerError,
    player::PlayerEvent,
    registry::{PlayerSettings, QueueRegistry},
    track::TrackDescriptor,
    transport::{MockStreamHandle, StreamHandle, StreamNotifier, VoiceTransport},
};

pub(crate) fn guild() -> GuildId {
    GuildId::new(42)
}

pub(crate) fn track(name: &str) -> TrackDescriptor {
    TrackDescriptor::new(name, format!("https://cdn.example/{}.m4a", name))
}

pub(crate) fn registry() -> (QueueRegistry, UnboundedReceiver<PlayerEvent>) {
    registry_with(PlayerSettings::default())
}

pub(crate) fn registry_with(
    settings: PlayerSettings,
) -> (QueueRegistry, UnboundedReceiver<PlayerEvent>) {
    let (events, rx) = mpsc::unbounded_channel();
    (QueueRegistry::new(settings, events), rx)
}

pub(crate) fn drain_events(events: &mut UnboundedReceiver<PlayerEvent>) -> Vec<PlayerEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

struct StartedStream {
    title: String,
    gain: f32,
    notifier: StreamNotifier,
}

/// Registra cada stream pedido y deja que el test decida cuándo termina
pub(crate) struct ScriptedTransport {
    confirm_on_start: bool,
    failing: Mutex<HashSet<String>>,
    streams: Mutex<Vec<StartedStream>>,
    gain_changes: Arc<Mutex<Vec<f32>>>,
    stops: Arc<AtomicUsize>,
    disconnects: AtomicUsize,
}

impl ScriptedTransport {
    /// Los streams confirman la reproducción apenas inician
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::build(true))
    }

    /// Los streams quedan en fase de inicio hasta que el test los confirme
    pub(crate) fn unconfirmed() -> Arc<Self> {
        Arc::new(Self::build(false))
    }

    fn build(confirm_on_start: bool) -> Self {
        Self {
            confirm_on_start,
            failing: Mutex::new(HashSet::new()),
            streams: Mutex::new(Vec::new()),
            gain_changes: Arc::new(Mutex::new(Vec::new())),
            stops: Arc::new(AtomicUsize::new(0)),
            disconnects: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fail_on(&self, title: &str) {
        self.failing.lock().insert(title.to_string());
    }

    pub(crate) fn started_titles(&self) -> Vec<String> {
        self.streams.lock().iter().map(|s| s.title.clone()).collect()
    }

    pub(crate) fn start_gains(&self) -> Vec<f32> {
        self.streams.lock().iter().map(|s| s.gain).collect()
    }

    pub(crate) fn gain_changes(&self) -> Vec<f32> {
        self.gain_changes.lock().clone()
    }

    pub(crate) fn notifier(&self, index: usize) -> StreamNotifier {
        self.streams.lock()[index].notifier.clone()
    }

    pub(crate) fn finish_latest(&self) {
        self.latest().ended(None);
    }

    pub(crate) fn fail_latest(&self, reason: &str) {
        self.latest().ended(Some(reason.to_string()));
    }

    pub(crate) fn stop_calls(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub(crate) fn disconnect_calls(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    fn latest(&self) -> StreamNotifier {
        self.streams
            .lock()
            .last()
            .map(|s| s.notifier.clone())
            .expect("no stream has been started")
    }

    fn handle(&self) -> MockStreamHandle {
        let mut handle = MockStreamHandle::new();
        let stops = self.stops.clone();
        handle.expect_stop().returning(move || {
            stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let gains = self.gain_changes.clone();
        handle.expect_set_gain().returning(move |gain| {
            gains.lock().push(gain);
            Ok(())
        });
        handle.expect_pause().returning(|| Ok(()));
        handle.expect_resume().returning(|| Ok(()));
        handle
    }
}

#[async_trait]
impl VoiceTransport for ScriptedTransport {
    async fn start_stream(
        &self,
        track: &TrackDescriptor,
        gain: f32,
        notifier: StreamNotifier,
    ) -> Result<Box<dyn StreamHandle>, PlayerError> {
        if self.failing.lock().contains(track.title()) {
            return Err(PlayerError::StreamStartFailure(format!(
                "{} is unplayable",
                track.title()
            )));
        }

        if self.confirm_on_start {
            notifier.started();
        }
        self.streams.lock().push(StartedStream {
            title: track.title().to_string(),
            gain,
            notifier,
        });
        Ok(Box::new(self.handle()))
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}
