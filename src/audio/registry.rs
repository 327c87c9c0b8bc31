use dashmap::{mapref::entry::Entry, DashMap};
use serenity::model::id::GuildId;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{
    mpsc::{self, error::SendError, UnboundedReceiver, UnboundedSender},
    oneshot,
};
use tracing::debug;

use super::{
    error::PlayerError,
    player::{EnqueueOutcome, GuildPlayer, PlayerCommand, PlayerEvent, QueueSnapshot},
    track::TrackDescriptor,
    transport::VoiceTransport,
};
use crate::config::Config;

/// Política aplicada a cada reproductor de guild
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSettings {
    /// Ganancia para colas nuevas, de 0.0 a 1.0
    pub default_volume: f32,
    /// Límite de la cola; `None` significa sin límite
    pub max_queue_size: Option<usize>,
    /// Cuánto se conserva una guild inactiva y vacía; `None` la conserva siempre
    pub idle_eviction: Option<Duration>,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            default_volume: 1.0,
            max_queue_size: None,
            idle_eviction: None,
        }
    }
}

impl From<&Config> for PlayerSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_volume: config.default_volume as f32 / 100.0,
            max_queue_size: (config.max_queue_size > 0).then_some(config.max_queue_size),
            idle_eviction: (config.idle_eviction_secs > 0)
                .then(|| Duration::from_secs(config.idle_eviction_secs)),
        }
    }
}

#[derive(Clone)]
struct PlayerHandle {
    id: u64,
    mailbox: UnboundedSender<PlayerCommand>,
}

struct RegistryInner {
    players: DashMap<GuildId, PlayerHandle>,
    settings: PlayerSettings,
    events: UnboundedSender<PlayerEvent>,
    next_id: AtomicU64,
}

/// Mapa de guild a reproductor, compartido por todos los handlers
///
/// Cada entrada apunta a una tarea que es dueña exclusiva de la cola de esa
/// guild. Las entradas se crean en la primera referencia y viven hasta que
/// termina el proceso, o hasta que el desalojo por inactividad las quite.
#[derive(Clone)]
pub struct QueueRegistry {
    inner: Arc<RegistryInner>,
}

impl QueueRegistry {
    pub fn new(settings: PlayerSettings, events: UnboundedSender<PlayerEvent>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                players: DashMap::new(),
                settings,
                events,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.inner.settings
    }

    /// Cantidad de guilds con un reproductor vivo
    pub fn guild_count(&self) -> usize {
        self.inner.players.len()
    }

    pub async fn enqueue(
        &self,
        guild_id: GuildId,
        track: TrackDescriptor,
        transport: Arc<dyn VoiceTransport>,
    ) -> Result<EnqueueOutcome, PlayerError> {
        self.request(guild_id, |reply| PlayerCommand::Enqueue {
            track,
            transport,
            reply,
        })
        .await?
    }

    pub async fn set_volume(&self, guild_id: GuildId, percent: i64) -> Result<f32, PlayerError> {
        self.request(guild_id, |reply| PlayerCommand::SetVolume { percent, reply })
            .await?
    }

    pub async fn toggle_loop(&self, guild_id: GuildId) -> Result<bool, PlayerError> {
        self.request(guild_id, |reply| PlayerCommand::ToggleLoop { reply })
            .await
    }

    pub async fn skip(&self, guild_id: GuildId) -> Result<TrackDescriptor, PlayerError> {
        self.request(guild_id, |reply| PlayerCommand::Skip { reply })
            .await?
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<(), PlayerError> {
        self.request(guild_id, |reply| PlayerCommand::Pause { reply })
            .await?
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<(), PlayerError> {
        self.request(guild_id, |reply| PlayerCommand::Resume { reply })
            .await?
    }

    /// Detiene la reproducción, limpia la cola y sale de voz. Devuelve cuántos
    /// tracks se descartaron.
    pub async fn stop(&self, guild_id: GuildId) -> Result<usize, PlayerError> {
        self.request(guild_id, |reply| PlayerCommand::Stop { reply })
            .await
    }

    pub async fn peek_state(&self, guild_id: GuildId) -> Result<QueueSnapshot, PlayerError> {
        self.request(guild_id, |reply| PlayerCommand::Peek { reply })
            .await
    }

    async fn request<T>(
        &self,
        guild_id: GuildId,
        build: impl FnOnce(oneshot::Sender<T>) -> PlayerCommand,
    ) -> Result<T, PlayerError> {
        let (reply, response) = oneshot::channel();
        self.dispatch(guild_id, build(reply));
        response
            .await
            .map_err(|_| PlayerError::PlayerUnavailable(guild_id))
    }

    /// Entrega un comando al reproductor de la guild, creándolo si hace falta
    pub(crate) fn dispatch(&self, guild_id: GuildId, mut command: PlayerCommand) {
        loop {
            let handle = self.get_or_create(guild_id);
            match handle.mailbox.send(command) {
                Ok(()) => return,
                Err(SendError(returned)) => {
                    // El reproductor cerró su buzón al ser desalojado
                    self.forget(guild_id, handle.id);
                    command = returned;
                }
            }
        }
    }

    fn get_or_create(&self, guild_id: GuildId) -> PlayerHandle {
        self.inner
            .players
            .entry(guild_id)
            .or_insert_with(|| self.spawn_player(guild_id))
            .clone()
    }

    fn spawn_player(&self, guild_id: GuildId) -> PlayerHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (mailbox, inbox) = mpsc::unbounded_channel();

        let player = GuildPlayer::new(
            guild_id,
            &self.inner.settings,
            mailbox.clone(),
            self.inner.events.clone(),
        );
        tokio::spawn(player.run(inbox, self.clone(), id));

        debug!("🆕 Reproductor {} creado para guild {}", id, guild_id);
        PlayerHandle { id, mailbox }
    }

    /// Retira al reproductor `id` mientras retiene su entrada: cierra su buzón
    /// y pasa los comandos de usuario pendientes a un reproductor nuevo, antes
    /// que cualquier comando despachado después. Si no quedaba nada, la entrada
    /// se elimina. Devuelve false si la entrada pertenece a otro reproductor.
    pub(crate) fn retire(
        &self,
        guild_id: GuildId,
        id: u64,
        inbox: &mut UnboundedReceiver<PlayerCommand>,
    ) -> bool {
        let Entry::Occupied(mut entry) = self.inner.players.entry(guild_id) else {
            return false;
        };
        if entry.get().id != id {
            return false;
        }

        inbox.close();
        let mut pending = Vec::new();
        while let Ok(command) = inbox.try_recv() {
            if !command.is_stream_signal() {
                pending.push(command);
            }
        }

        if pending.is_empty() {
            entry.remove();
        } else {
            let fresh = self.spawn_player(guild_id);
            debug!(
                "📦 Pasando {} comandos pendientes al reproductor {} en guild {}",
                pending.len(),
                fresh.id,
                guild_id
            );
            for command in pending {
                let _ = fresh.mailbox.send(command);
            }
            entry.insert(fresh);
        }
        true
    }

    /// Quita la entrada de `guild_id` solo si aún pertenece al reproductor `id`
    pub(crate) fn forget(&self, guild_id: GuildId, id: u64) -> bool {
        self.inner
            .players
            .remove_if(&guild_id, |_, handle| handle.id == id)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{guild, registry, registry_with, track, ScriptedTransport};
    use crate::audio::player::PlaybackPhase;

    #[tokio::test]
    async fn concurrent_first_access_creates_one_player() {
        let (registry, _events) = registry();

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.toggle_loop(guild()).await.unwrap()
            }));
        }
        let mut enabled = 0;
        for task in tasks {
            if task.await.unwrap() {
                enabled += 1;
            }
        }

        assert_eq!(registry.guild_count(), 1);
        // 32 toggles sobre una sola cola: exactamente la mitad activó el loop
        assert_eq!(enabled, 16);
        assert!(!registry.peek_state(guild()).await.unwrap().loop_enabled);
    }

    #[tokio::test]
    async fn retired_player_hands_queued_commands_over_first() {
        let (registry, _events) = registry();
        let (mailbox, mut inbox) = mpsc::unbounded_channel();
        registry.inner.players.insert(
            guild(),
            PlayerHandle {
                id: 99,
                mailbox: mailbox.clone(),
            },
        );

        let (reply, first) = oneshot::channel();
        mailbox.send(PlayerCommand::ToggleLoop { reply }).unwrap();
        mailbox
            .send(PlayerCommand::StreamEnded {
                session: 1,
                error: None,
            })
            .unwrap();

        assert!(registry.retire(guild(), 99, &mut inbox));
        assert!(mailbox.is_closed());

        // Despachado después del traspaso, así que se aplica segundo
        let second = registry.toggle_loop(guild()).await.unwrap();
        assert!(first.await.unwrap());
        assert!(!second);
        assert_eq!(registry.guild_count(), 1);
    }

    #[tokio::test]
    async fn retiring_an_empty_mailbox_drops_the_entry() {
        let (registry, _events) = registry();
        let (mailbox, mut inbox) = mpsc::unbounded_channel();
        registry
            .inner
            .players
            .insert(guild(), PlayerHandle { id: 5, mailbox });

        assert!(!registry.retire(guild(), 6, &mut inbox));
        assert_eq!(registry.guild_count(), 1);

        assert!(registry.retire(guild(), 5, &mut inbox));
        assert_eq!(registry.guild_count(), 0);
    }

    #[tokio::test]
    async fn guilds_are_isolated() {
        let (registry, _events) = registry();
        let transport = ScriptedTransport::new();
        let other = GuildId::new(7);

        registry.enqueue(guild(), track("a"), transport.clone()).await.unwrap();
        registry.set_volume(other, 20).await.unwrap();

        let here = registry.peek_state(guild()).await.unwrap();
        let there = registry.peek_state(other).await.unwrap();
        assert_eq!(here.queue_length, 1);
        assert_eq!(here.volume, 1.0);
        assert_eq!(there.queue_length, 0);
        assert_eq!(there.volume, 0.2);
        assert_eq!(there.phase, PlaybackPhase::Idle);
        assert_eq!(registry.guild_count(), 2);
    }

    #[tokio::test]
    async fn settings_apply_to_new_queues() {
        let (registry, _events) = registry_with(PlayerSettings {
            default_volume: 0.25,
            max_queue_size: Some(1),
            idle_eviction: None,
        });
        let transport = ScriptedTransport::new();

        registry.enqueue(guild(), track("a"), transport.clone()).await.unwrap();
        let full = registry.enqueue(guild(), track("b"), transport.clone()).await;
        assert_eq!(full, Err(PlayerError::QueueFull(1)));

        let state = registry.peek_state(guild()).await.unwrap();
        assert_eq!(state.volume, 0.25);
        assert_eq!(state.queue_length, 1);
        assert_eq!(transport.start_gains(), vec![0.25]);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_guild_is_evicted_and_recreated() {
        let (registry, _events) = registry_with(PlayerSettings {
            idle_eviction: Some(Duration::from_secs(30)),
            ..PlayerSettings::default()
        });

        registry.set_volume(guild(), 10).await.unwrap();
        assert_eq!(registry.guild_count(), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(registry.guild_count(), 0);

        // Una entrada nueva parte de los valores por defecto
        let state = registry.peek_state(guild()).await.unwrap();
        assert_eq!(state.volume, 1.0);
        assert_eq!(registry.guild_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_guild_is_not_evicted() {
        let (registry, _events) = registry_with(PlayerSettings {
            idle_eviction: Some(Duration::from_secs(30)),
            ..PlayerSettings::default()
        });
        let transport = ScriptedTransport::new();
        registry.enqueue(guild(), track("a"), transport.clone()).await.unwrap();

        tokio::time::sleep(Duration::from_secs(120)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(registry.guild_count(), 1);
        let state = registry.peek_state(guild()).await.unwrap();
        assert_eq!(state.phase, PlaybackPhase::Playing);
    }

    #[test]
    fn settings_from_config() {
        let config = Config {
            default_volume: 80,
            max_queue_size: 0,
            idle_eviction_secs: 600,
            ..Config::default()
        };
        let settings = PlayerSettings::from(&config);
        assert_eq!(settings.default_volume, 0.8);
        assert_eq!(settings.max_queue_size, None);
        assert_eq!(settings.idle_eviction, Some(Duration::from_secs(600)));
    }
}
