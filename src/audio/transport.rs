use async_trait::async_trait;
use serenity::model::id::GuildId;
use songbird::{
    input::{HttpRequest, Input},
    tracks::{PlayMode, Track, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::{mpsc::UnboundedSender, Mutex};
use tracing::{debug, warn};

use super::{error::PlayerError, player::PlayerCommand, track::TrackDescriptor};

/// Algo capaz de transmitir un track a una sesión de voz activa
///
/// Cada `start_stream` exitoso debe reportar exactamente un fin a través del
/// [`StreamNotifier`] recibido, ya sea que el stream terminó, se detuvo o falló.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn start_stream(
        &self,
        track: &TrackDescriptor,
        gain: f32,
        notifier: StreamNotifier,
    ) -> Result<Box<dyn StreamHandle>, PlayerError>;

    /// Sale de la sesión de voz
    async fn disconnect(&self);
}

/// Controles sobre un stream activo
#[cfg_attr(test, mockall::automock)]
pub trait StreamHandle: Send + Sync {
    fn stop(&self) -> Result<(), PlayerError>;
    fn set_gain(&self, gain: f32) -> Result<(), PlayerError>;
    fn pause(&self) -> Result<(), PlayerError>;
    fn resume(&self) -> Result<(), PlayerError>;
}

/// Devuelve los callbacks del transporte al buzón del reproductor de la guild
///
/// Los callbacks pueden dispararse en cualquier hilo; solo encolan un mensaje
/// etiquetado con el token de sesión del stream, así el reproductor reconoce
/// e ignora un callback tardío de un stream ya detenido.
#[derive(Clone)]
pub struct StreamNotifier {
    session: u64,
    mailbox: UnboundedSender<PlayerCommand>,
    ended: Arc<AtomicBool>,
}

impl StreamNotifier {
    pub(crate) fn new(session: u64, mailbox: UnboundedSender<PlayerCommand>) -> Self {
        Self {
            session,
            mailbox,
            ended: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn started(&self) {
        let _ = self.mailbox.send(PlayerCommand::StreamStarted {
            session: self.session,
        });
    }

    /// Reporta el fin del stream. Solo se entrega la primera llamada
    pub fn ended(&self, error: Option<String>) {
        if self.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.mailbox.send(PlayerCommand::StreamEnded {
            session: self.session,
            error,
        });
    }
}

/// Transporte de voz sobre una llamada de songbird
pub struct SongbirdTransport {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    call: Arc<Mutex<Call>>,
    http: reqwest::Client,
}

impl SongbirdTransport {
    pub fn new(
        guild_id: GuildId,
        manager: Arc<Songbird>,
        call: Arc<Mutex<Call>>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            guild_id,
            manager,
            call,
            http,
        }
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn start_stream(
        &self,
        track: &TrackDescriptor,
        gain: f32,
        notifier: StreamNotifier,
    ) -> Result<Box<dyn StreamHandle>, PlayerError> {
        url::Url::parse(track.playable_source())
            .map_err(|e| PlayerError::StreamStartFailure(format!("fuente inválida: {}", e)))?;

        let request = HttpRequest::new(self.http.clone(), track.playable_source().to_string());
        // Se encola pausado para armar los handlers antes de preparar el input
        let queued = Track::new(Input::from(request)).volume(gain).pause();

        let handle = {
            let mut call = self.call.lock().await;
            call.play(queued)
        };

        let armed = stream_signals()
            .into_iter()
            .try_for_each(|(event, signal)| {
            handle.add_event(
                Event::Track(event),
                StreamEventHandler {
                    signal,
                    notifier: notifier.clone(),
                },
            )
        })
        .and_then(|()| handle.play());

        if let Err(e) = armed {
            let _ = handle.stop();
            return Err(PlayerError::StreamStartFailure(e.to_string()));
        }

        debug!(
            "🎧 Sesión de stream {} encolada en guild {}",
            notifier.session(),
            self.guild_id
        );
        Ok(Box::new(SongbirdStream(handle)))
    }

    async fn disconnect(&self) {
        if let Err(e) = self.manager.remove(self.guild_id).await {
            debug!("La sesión de voz ya no existe en guild {}: {:?}", self.guild_id, e);
        }
    }
}

struct SongbirdStream(TrackHandle);

impl StreamHandle for SongbirdStream {
    fn stop(&self) -> Result<(), PlayerError> {
        self.0
            .stop()
            .map_err(|e| PlayerError::StreamRuntimeFailure(e.to_string()))
    }

    fn set_gain(&self, gain: f32) -> Result<(), PlayerError> {
        self.0
            .set_volume(gain)
            .map_err(|e| PlayerError::StreamRuntimeFailure(e.to_string()))
    }

    fn pause(&self) -> Result<(), PlayerError> {
        self.0
            .pause()
            .map_err(|e| PlayerError::StreamRuntimeFailure(e.to_string()))
    }

    fn resume(&self) -> Result<(), PlayerError> {
        self.0
            .play()
            .map_err(|e| PlayerError::StreamRuntimeFailure(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamSignal {
    Started,
    Ended,
    Failed,
}

/// Eventos de track que se reenvían al reproductor
///
/// `Playable` confirma el inicio: se dispara cuando el input ya fue creado y
/// parseado. `Play` solo reporta un cambio de modo y llega antes de descargar
/// la fuente, por eso no se escucha.
fn stream_signals() -> [(TrackEvent, StreamSignal); 3] {
    [
        (TrackEvent::Playable, StreamSignal::Started),
        (TrackEvent::End, StreamSignal::Ended),
        (TrackEvent::Error, StreamSignal::Failed),
    ]
}

struct StreamEventHandler {
    signal: StreamSignal,
    notifier: StreamNotifier,
}

#[async_trait]
impl VoiceEventHandler for StreamEventHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        match self.signal {
            StreamSignal::Started => self.notifier.started(),
            StreamSignal::Ended => self.notifier.ended(None),
            StreamSignal::Failed => {
                let reason = match ctx {
                    EventContext::Track(tracks) => tracks
                        .iter()
                        .find_map(|(state, _)| match &state.playing {
                            PlayMode::Errored(e) => Some(format!("{:?}", e)),
                            _ => None,
                        })
                        .unwrap_or_else(|| "error de reproducción desconocido".to_string()),
                    _ => "error de reproducción desconocido".to_string(),
                };
                warn!("❌ Falló la sesión de stream {}: {}", self.notifier.session(), reason);
                self.notifier.ended(Some(reason));
            }
        }
        None
    }
}
