//! # Módulo Bot
//!
//! Superficie de comandos de Discord del jukebox.
//!
//! - Registro de comandos slash ([`commands`]) y despacho ([`handlers`])
//! - Gestión de conexiones de voz por guild
//! - Publicación de eventos del reproductor en el chat ([`events`])
//!
//! Todo el estado de cola y reproducción vive en el [`QueueRegistry`]; este
//! módulo solo traduce interacciones de Discord a llamadas al registro.

use anyhow::Result;
use dashmap::DashMap;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use songbird::Call;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod events;
pub mod handlers;

use crate::{
    audio::{registry::QueueRegistry, transport::SongbirdTransport},
    config::Config,
    sources::MediaResolver,
};

/// Handler principal de eventos de Discord
pub struct JukeboxBot {
    config: Arc<Config>,
    pub registry: QueueRegistry,
    pub resolver: Arc<dyn MediaResolver>,
    /// Canal de texto donde se anuncian los eventos de cada guild
    pub announce_channels: Arc<DashMap<GuildId, ChannelId>>,
    voice_handlers: DashMap<GuildId, Arc<Mutex<Call>>>,
    http: reqwest::Client,
}

impl JukeboxBot {
    pub fn new(
        config: Config,
        registry: QueueRegistry,
        resolver: Arc<dyn MediaResolver>,
        announce_channels: Arc<DashMap<GuildId, ChannelId>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            resolver,
            announce_channels,
            voice_handlers: DashMap::new(),
            http: reqwest::Client::new(),
        }
    }

    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos registrados para guild {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// Se une a `channel_id` y guarda la llamada para reproducir después
    pub async fn join_voice_channel(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<Mutex<Call>>> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        let call = manager.join(guild_id, channel_id).await.map_err(|e| {
            error!("No se pudo conectar a voz en guild {}: {:?}", guild_id, e);
            anyhow::anyhow!("No se pudo conectar al canal de voz")
        })?;

        self.voice_handlers.insert(guild_id, call.clone());
        info!("🔊 Conectado a voz en guild {}", guild_id);
        Ok(call)
    }

    pub fn get_voice_handler(&self, guild_id: GuildId) -> Option<Arc<Mutex<Call>>> {
        self.voice_handlers.get(&guild_id).map(|h| h.clone())
    }

    pub fn forget_voice_handler(&self, guild_id: GuildId) {
        self.voice_handlers.remove(&guild_id);
    }

    /// Construye un transporte de voz sobre la llamada actual de la guild
    pub async fn transport_for(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        call: Arc<Mutex<Call>>,
    ) -> Result<Arc<SongbirdTransport>> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        Ok(Arc::new(SongbirdTransport::new(
            guild_id,
            manager,
            call,
            self.http.clone(),
        )))
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error registrando comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Detiene el reproductor de la guild cuando el bot es desconectado de voz
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            return;
        };

        if self.voice_handlers.remove(&guild_id).is_none() {
            return;
        }

        info!("🔌 Desconectado de voz en guild {}", guild_id);
        match self.registry.stop(guild_id).await {
            Ok(cleared) => info!("🗑️ Descartados {} tracks en cola en guild {}", cleared, guild_id),
            Err(e) => warn!("Error al detener reproducción en guild {}: {}", guild_id, e),
        }
        debug!("📊 {} reproductores de guild activos", self.registry.guild_count());
    }
}
