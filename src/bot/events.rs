use dashmap::DashMap;
use serenity::{
    builder::{CreateEmbed, CreateMessage},
    http::Http,
    model::id::{ChannelId, GuildId},
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error};

use crate::{audio::player::PlayerEvent, ui::embeds};

/// Publica los eventos del reproductor en el canal de anuncios de cada guild
/// hasta que se cierre el stream de eventos
pub async fn announce_player_events(
    http: Arc<Http>,
    channels: Arc<DashMap<GuildId, ChannelId>>,
    mut events: UnboundedReceiver<PlayerEvent>,
) {
    while let Some(event) = events.recv().await {
        let (guild_id, embed) = render(&event);

        let Some(channel_id) = channels.get(&guild_id).map(|c| *c) else {
            debug!("Sin canal de anuncios para guild {}", guild_id);
            continue;
        };

        if let Err(e) = channel_id
            .send_message(&*http, CreateMessage::new().embed(embed))
            .await
        {
            error!("Error al enviar anuncio en guild {}: {:?}", guild_id, e);
        }
    }
}

fn render(event: &PlayerEvent) -> (GuildId, CreateEmbed) {
    match event {
        PlayerEvent::NowPlaying { guild_id, track } => {
            (*guild_id, embeds::create_now_playing_announcement(track))
        }
        PlayerEvent::TrackFailed {
            guild_id,
            track,
            error,
        } => (
            *guild_id,
            embeds::create_error_embed(&format!(
                "Error al reproducir **{}**: {}\nSaltando a la siguiente canción.",
                track.title(),
                error
            )),
        ),
        PlayerEvent::QueueFinished { guild_id } => (
            *guild_id,
            embeds::create_info_embed("Cola Terminada", "No hay más canciones en la cola"),
        ),
    }
}
