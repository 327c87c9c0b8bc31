use serenity::model::id::GuildId;
use std::{sync::Arc, time::Duration};
use tokio::sync::{
    mpsc::{UnboundedReceiver, UnboundedSender},
    oneshot,
};
use tracing::{debug, error, info, warn};

use super::{
    error::PlayerError,
    queue::GuildQueue,
    registry::{PlayerSettings, QueueRegistry},
    track::TrackDescriptor,
    transport::{StreamHandle, StreamNotifier, VoiceTransport},
};

/// Mensajes que acepta la tarea de reproducción de una guild
///
/// Los comandos de usuario llevan un canal de respuesta; las señales de stream
/// vienen de los callbacks del transporte y van etiquetadas con el token de
/// sesión del stream al que pertenecen.
pub(crate) enum PlayerCommand {
    Enqueue {
        track: TrackDescriptor,
        transport: Arc<dyn VoiceTransport>,
        reply: oneshot::Sender<Result<EnqueueOutcome, PlayerError>>,
    },
    SetVolume {
        percent: i64,
        reply: oneshot::Sender<Result<f32, PlayerError>>,
    },
    ToggleLoop {
        reply: oneshot::Sender<bool>,
    },
    Skip {
        reply: oneshot::Sender<Result<TrackDescriptor, PlayerError>>,
    },
    Pause {
        reply: oneshot::Sender<Result<(), PlayerError>>,
    },
    Resume {
        reply: oneshot::Sender<Result<(), PlayerError>>,
    },
    Stop {
        reply: oneshot::Sender<usize>,
    },
    Peek {
        reply: oneshot::Sender<QueueSnapshot>,
    },
    StreamStarted {
        session: u64,
    },
    StreamEnded {
        session: u64,
        error: Option<String>,
    },
}

impl PlayerCommand {
    pub(crate) fn is_stream_signal(&self) -> bool {
        matches!(
            self,
            PlayerCommand::StreamStarted { .. } | PlayerCommand::StreamEnded { .. }
        )
    }
}

/// Notificaciones publicadas para la capa de comandos
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    NowPlaying {
        guild_id: GuildId,
        track: TrackDescriptor,
    },
    TrackFailed {
        guild_id: GuildId,
        track: TrackDescriptor,
        error: PlayerError,
    },
    QueueFinished {
        guild_id: GuildId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Idle,
    Starting,
    Playing,
    Advancing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueOutcome {
    /// Posición en la cola, 0 es la cabeza
    pub position: usize,
}

/// Vista puntual de la cola y el reproductor de una guild
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSnapshot {
    pub now_playing: Option<TrackDescriptor>,
    pub tracks: Vec<TrackDescriptor>,
    pub queue_length: usize,
    pub volume: f32,
    pub loop_enabled: bool,
    pub phase: PlaybackPhase,
    pub paused: bool,
}

enum PlaybackState {
    Idle,
    Starting {
        session: u64,
        stream: Box<dyn StreamHandle>,
    },
    Playing {
        session: u64,
        stream: Box<dyn StreamHandle>,
        paused: bool,
    },
    Advancing,
}

impl PlaybackState {
    fn phase(&self) -> PlaybackPhase {
        match self {
            PlaybackState::Idle => PlaybackPhase::Idle,
            PlaybackState::Starting { .. } => PlaybackPhase::Starting,
            PlaybackState::Playing { .. } => PlaybackPhase::Playing,
            PlaybackState::Advancing => PlaybackPhase::Advancing,
        }
    }

    fn session(&self) -> Option<u64> {
        match self {
            PlaybackState::Starting { session, .. } | PlaybackState::Playing { session, .. } => {
                Some(*session)
            }
            _ => None,
        }
    }

    fn stream(&self) -> Option<&dyn StreamHandle> {
        match self {
            PlaybackState::Starting { stream, .. } | PlaybackState::Playing { stream, .. } => {
                Some(stream.as_ref())
            }
            _ => None,
        }
    }
}

/// Dueño de la cola de una guild y de su máquina de estados de reproducción
///
/// Cada transición corre dentro de [`GuildPlayer::run`], un mensaje a la vez,
/// así los comandos de usuario y los callbacks del transporte de una misma
/// guild nunca se intercalan.
pub(crate) struct GuildPlayer {
    guild_id: GuildId,
    queue: GuildQueue,
    state: PlaybackState,
    session: u64,
    transport: Option<Arc<dyn VoiceTransport>>,
    mailbox: UnboundedSender<PlayerCommand>,
    events: UnboundedSender<PlayerEvent>,
}

impl GuildPlayer {
    pub(crate) fn new(
        guild_id: GuildId,
        settings: &PlayerSettings,
        mailbox: UnboundedSender<PlayerCommand>,
        events: UnboundedSender<PlayerEvent>,
    ) -> Self {
        Self {
            guild_id,
            queue: GuildQueue::new(settings.default_volume, settings.max_queue_size),
            state: PlaybackState::Idle,
            session: 0,
            transport: None,
            mailbox,
            events,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut inbox: UnboundedReceiver<PlayerCommand>,
        registry: QueueRegistry,
        handle_id: u64,
    ) {
        debug!("🎛️ Tarea de reproducción iniciada para guild {}", self.guild_id);
        let idle_eviction = registry.settings().idle_eviction;

        loop {
            let next = match idle_eviction {
                Some(limit) if self.is_evictable() => {
                    let waited = tokio::time::timeout(limit, inbox.recv()).await;
                    match waited {
                        Ok(next) => next,
                        Err(_) => {
                            self.evict(inbox, &registry, handle_id, limit).await;
                            return;
                        }
                    }
                }
                _ => inbox.recv().await,
            };

            match next {
                Some(command) => self.handle(command).await,
                None => break,
            }
        }
    }

    fn is_evictable(&self) -> bool {
        matches!(self.state, PlaybackState::Idle) && self.queue.is_empty()
    }

    async fn evict(
        &mut self,
        mut inbox: UnboundedReceiver<PlayerCommand>,
        registry: &QueueRegistry,
        handle_id: u64,
        idle_for: Duration,
    ) {
        registry.retire(self.guild_id, handle_id, &mut inbox);
        inbox.close();

        // Los envíos que compitieron con el cierre se redespachan tras los traspasados
        while let Some(command) = inbox.recv().await {
            if !command.is_stream_signal() {
                registry.dispatch(self.guild_id, command);
            }
        }

        info!(
            "🧹 Reproductor de guild {} desalojado tras {:?} inactivo",
            self.guild_id, idle_for
        );
    }

    async fn handle(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::Enqueue {
                track,
                transport,
                reply,
            } => {
                let result = self.enqueue(track, transport).await;
                let _ = reply.send(result);
            }
            PlayerCommand::SetVolume { percent, reply } => {
                let _ = reply.send(self.set_volume(percent));
            }
            PlayerCommand::ToggleLoop { reply } => {
                let _ = reply.send(self.queue.toggle_loop());
            }
            PlayerCommand::Skip { reply } => {
                let result = self.skip().await;
                let _ = reply.send(result);
            }
            PlayerCommand::Pause { reply } => {
                let _ = reply.send(self.set_paused(true));
            }
            PlayerCommand::Resume { reply } => {
                let _ = reply.send(self.set_paused(false));
            }
            PlayerCommand::Stop { reply } => {
                let cleared = self.stop().await;
                let _ = reply.send(cleared);
            }
            PlayerCommand::Peek { reply } => {
                let _ = reply.send(self.snapshot());
            }
            PlayerCommand::StreamStarted { session } => self.on_stream_started(session),
            PlayerCommand::StreamEnded { session, error } => {
                self.on_stream_ended(session, error).await
            }
        }
    }

    async fn enqueue(
        &mut self,
        track: TrackDescriptor,
        transport: Arc<dyn VoiceTransport>,
    ) -> Result<EnqueueOutcome, PlayerError> {
        let position = self.queue.enqueue(track)?;

        if matches!(self.state, PlaybackState::Idle) {
            self.transport = Some(transport);
            self.start_head().await;
        } else if self.transport.is_none() {
            self.transport = Some(transport);
        }

        Ok(EnqueueOutcome { position })
    }

    fn set_volume(&mut self, percent: i64) -> Result<f32, PlayerError> {
        let gain = self.queue.set_volume(percent)?;
        if let Some(stream) = self.state.stream() {
            if let Err(e) = stream.set_gain(gain) {
                warn!("No se pudo aplicar el volumen en guild {}: {}", self.guild_id, e);
            }
        }
        Ok(gain)
    }

    fn set_paused(&mut self, pause: bool) -> Result<(), PlayerError> {
        let PlaybackState::Playing { stream, paused, .. } = &mut self.state else {
            return Err(PlayerError::NothingPlaying);
        };

        if *paused != pause {
            if pause {
                stream.pause()?;
                info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
            } else {
                stream.resume()?;
                info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
            }
            *paused = pause;
        }
        Ok(())
    }

    async fn skip(&mut self) -> Result<TrackDescriptor, PlayerError> {
        match std::mem::replace(&mut self.state, PlaybackState::Advancing) {
            PlaybackState::Starting { stream, .. } | PlaybackState::Playing { stream, .. } => {
                // La señal de fin del stream detenido lleva una sesión vieja
                // y se ignora una vez iniciado el siguiente track.
                if let Err(e) = stream.stop() {
                    warn!("No se pudo detener el stream en guild {}: {}", self.guild_id, e);
                }
                let skipped = self.queue.drop_head();
                self.start_head().await;

                if let Some(track) = &skipped {
                    info!("⏭️ Saltado {} en guild {}", track.title(), self.guild_id);
                }
                skipped.ok_or(PlayerError::NothingPlaying)
            }
            other => {
                self.state = other;
                Err(PlayerError::NothingPlaying)
            }
        }
    }

    async fn stop(&mut self) -> usize {
        if let Some(stream) = self.state.stream() {
            if let Err(e) = stream.stop() {
                warn!("No se pudo detener el stream en guild {}: {}", self.guild_id, e);
            }
        }
        self.state = PlaybackState::Idle;

        let cleared = self.queue.clear();
        if let Some(transport) = self.transport.take() {
            transport.disconnect().await;
        }

        info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
        cleared
    }

    fn on_stream_started(&mut self, session: u64) {
        self.state = match std::mem::replace(&mut self.state, PlaybackState::Idle) {
            PlaybackState::Starting {
                session: current,
                stream,
            } if current == session => {
                self.queue.mark_head_playing();
                if let Some(track) = self.queue.now_playing() {
                    info!("🎵 Reproduciendo en guild {}: {}", self.guild_id, track.title());
                    let _ = self.events.send(PlayerEvent::NowPlaying {
                        guild_id: self.guild_id,
                        track: track.clone(),
                    });
                }
                PlaybackState::Playing {
                    session,
                    stream,
                    paused: false,
                }
            }
            other => {
                debug!(
                    "Ignorando señal de inicio de sesión {} en guild {}",
                    session, self.guild_id
                );
                other
            }
        };
    }

    async fn on_stream_ended(&mut self, session: u64, error: Option<String>) {
        if self.state.session() != Some(session) {
            debug!(
                "Ignorando señal de fin de sesión vieja {} en guild {}",
                session, self.guild_id
            );
            return;
        }

        let was_starting = matches!(self.state, PlaybackState::Starting { .. });
        self.state = PlaybackState::Advancing;

        match error {
            Some(reason) => {
                let error = if was_starting {
                    PlayerError::StreamStartFailure(reason)
                } else {
                    PlayerError::StreamRuntimeFailure(reason)
                };
                if let Some(track) = self.queue.drop_head() {
                    self.report_failure(track, error);
                }
            }
            None => {
                self.queue.advance();
            }
        }

        self.start_head().await;
    }

    /// Inicia la cabeza de la cola, saltando los tracks que no logran iniciar
    async fn start_head(&mut self) {
        loop {
            let Some(track) = self.queue.peek_head().cloned() else {
                if matches!(self.state, PlaybackState::Advancing) {
                    info!("📭 Cola terminada en guild {}", self.guild_id);
                    let _ = self.events.send(PlayerEvent::QueueFinished {
                        guild_id: self.guild_id,
                    });
                }
                self.state = PlaybackState::Idle;
                return;
            };

            let Some(transport) = self.transport.clone() else {
                warn!(
                    "Sin sesión de voz en guild {}, reteniendo {} tracks en cola",
                    self.guild_id,
                    self.queue.len()
                );
                self.state = PlaybackState::Idle;
                return;
            };

            self.session += 1;
            let session = self.session;
            let notifier = StreamNotifier::new(session, self.mailbox.clone());

            match transport
                .start_stream(&track, self.queue.volume(), notifier)
                .await
            {
                Ok(stream) => {
                    debug!(
                        "▶️ Iniciando {} (sesión {}) en guild {}",
                        track.title(),
                        session,
                        self.guild_id
                    );
                    self.state = PlaybackState::Starting { session, stream };
                    return;
                }
                Err(e) => {
                    self.state = PlaybackState::Advancing;
                    self.queue.drop_head();
                    self.report_failure(track, e);
                }
            }
        }
    }

    fn report_failure(&self, track: TrackDescriptor, error: PlayerError) {
        error!(
            "❌ Descartando {} en guild {}: {}",
            track.title(),
            self.guild_id,
            error
        );
        let _ = self.events.send(PlayerEvent::TrackFailed {
            guild_id: self.guild_id,
            track,
            error,
        });
    }

    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            now_playing: self.queue.now_playing().cloned(),
            tracks: self.queue.tracks().cloned().collect(),
            queue_length: self.queue.len(),
            volume: self.queue.volume(),
            loop_enabled: self.queue.loop_enabled(),
            phase: self.state.phase(),
            paused: matches!(self.state, PlaybackState::Playing { paused: true, .. }),
        }
    }
}
