//! # Módulo de Audio
//!
//! Cola y reproducción por guild para el bot.
//!
//! ## Arquitectura
//!
//! ### [`registry`] - Registro de Colas
//! - Asocia cada guild con su propia tarea de reproducción, creada en el primer uso
//! - Desalojo por inactividad y límite de cola opcionales vía [`registry::PlayerSettings`]
//!
//! ### [`player`] - Reproductor
//! - Una tarea por guild es dueña de su [`queue::GuildQueue`]
//! - Máquina de estados explícita `Idle -> Starting -> Playing -> Advancing`
//! - Los callbacks del transporte llegan como mensajes al buzón etiquetados con
//!   un token de sesión, así se descartan los de streams ya detenidos
//!
//! ### [`transport`] - Transporte de Voz
//! - Contrato [`transport::VoiceTransport`] y su implementación con songbird
//!
//! ## Ejemplo
//!
//! ```rust,no_run
//! # use guild_jukebox::audio::{registry::{QueueRegistry, PlayerSettings}, track::TrackDescriptor};
//! # async fn example(transport: std::sync::Arc<dyn guild_jukebox::audio::transport::VoiceTransport>) -> anyhow::Result<()> {
//! let (events, _rx) = tokio::sync::mpsc::unbounded_channel();
//! let registry = QueueRegistry::new(PlayerSettings::default(), events);
//! let guild_id = serenity::all::GuildId::new(123456789);
//!
//! registry.enqueue(guild_id, TrackDescriptor::new("Song", "https://cdn.example/song.m4a"), transport).await?;
//! registry.set_volume(guild_id, 50).await?;
//! registry.skip(guild_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod player;
pub mod queue;
pub mod registry;
pub mod track;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;
