use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::{
    player::{PlaybackPhase, QueueSnapshot},
    track::TrackDescriptor,
};

/// Paleta de colores estándar
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

const STANDARD_FOOTER: &str = "🎵 Guild Jukebox";

/// Máximo de canciones listadas antes de resumir el resto
const QUEUE_LISTING_LIMIT: usize = 15;

fn base_embed(title: impl Into<String>) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    base_embed(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
}

pub fn create_info_embed(title: &str, description: &str) -> CreateEmbed {
    base_embed(format!("ℹ️ {}", title))
        .description(description)
        .color(colors::INFO_BLUE)
}

pub fn create_error_embed(description: &str) -> CreateEmbed {
    base_embed("❌ Error")
        .description(description)
        .color(colors::ERROR_RED)
}

fn with_track_details(mut embed: CreateEmbed, track: &TrackDescriptor) -> CreateEmbed {
    embed = embed.url(track.page_url());

    if let Some(artist) = track.artist() {
        embed = embed.field("🎤 Artista", artist, true);
    }
    if let Some(duration) = track.duration() {
        embed = embed.field("⏱️ Duración", format_duration(duration), true);
    }
    if let Some(user) = track.requested_by() {
        embed = embed.field("👤 Solicitado por", format!("<@{}>", user), true);
    }
    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }
    embed
}

/// Anuncio enviado cuando un track empieza a sonar de verdad
pub fn create_now_playing_announcement(track: &TrackDescriptor) -> CreateEmbed {
    with_track_details(
        base_embed("🎵 Reproduciendo Ahora")
            .description(format!("**{}**", track.title()))
            .color(colors::SUCCESS_GREEN),
        track,
    )
}

/// Respuesta a `/nowplaying`, con volumen y estado del loop
pub fn create_now_playing_embed(snapshot: &QueueSnapshot) -> CreateEmbed {
    // Mientras arranca, la cabeza de la cola aún no es `now_playing`
    let current = match snapshot.phase {
        PlaybackPhase::Starting => snapshot.tracks.first(),
        _ => snapshot.now_playing.as_ref(),
    };
    let Some(track) = current else {
        return base_embed("🔇 Nada Sonando")
            .description("No hay ninguna canción reproduciéndose")
            .color(colors::NEUTRAL_GRAY);
    };

    let title = match snapshot.phase {
        PlaybackPhase::Starting => "⏳ Cargando",
        _ if snapshot.paused => "⏸️ En Pausa",
        _ => "🎵 Reproduciendo Ahora",
    };

    with_track_details(
        base_embed(title)
            .description(format!("**{}**", track.title()))
            .color(colors::SUCCESS_GREEN),
        track,
    )
    .field("🔊 Volumen", format!("{}%", volume_percent(snapshot.volume)), true)
    .field("🔂 Loop", if snapshot.loop_enabled { "Activado" } else { "Desactivado" }, true)
}

pub fn create_track_added_embed(track: &TrackDescriptor, position: usize) -> CreateEmbed {
    let placement = if position == 0 {
        "Sonando ahora".to_string()
    } else {
        format!("Posición #{} en la cola", position)
    };

    with_track_details(
        base_embed("✅ Canción Agregada")
            .description(format!("**{}**\n{}", track.title(), placement))
            .color(colors::SUCCESS_GREEN),
        track,
    )
}

pub fn create_search_result_embed(track: &TrackDescriptor) -> CreateEmbed {
    with_track_details(
        base_embed("🔍 Resultado de Búsqueda")
            .description(format!("**{}**", track.title()))
            .color(colors::INFO_BLUE),
        track,
    )
}

pub fn create_queue_embed(snapshot: &QueueSnapshot) -> CreateEmbed {
    if snapshot.tracks.is_empty() {
        return base_embed("📭 Cola Vacía")
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY);
    }

    base_embed("📋 Cola de Reproducción")
        .description(queue_listing(snapshot))
        .color(colors::INFO_BLUE)
        .field("Total de canciones", snapshot.queue_length.to_string(), true)
        .field("🔂 Loop", if snapshot.loop_enabled { "Activado" } else { "Desactivado" }, true)
}

pub fn create_help_embed() -> CreateEmbed {
    base_embed("🎵 Comandos de Música")
        .color(colors::INFO_BLUE)
        .field(
            "▶️ Reproducción",
            "`/play` - Reproduce una canción o la agrega a la cola\n\
             `/stop` - Detiene y limpia la cola\n\
             `/pause` - Pausa la canción actual\n\
             `/resume` - Reanuda la canción pausada",
            false,
        )
        .field(
            "📜 Cola",
            "`/queue` - Muestra la cola\n\
             `/skip` - Salta la canción actual\n\
             `/loop` - Activa o desactiva el loop",
            false,
        )
        .field(
            "ℹ️ Información y Control",
            "`/nowplaying` - Muestra la canción actual\n\
             `/volume [0-100]` - Ajusta el volumen\n\
             `/search` - Busca una canción",
            false,
        )
}

/// Cuerpo de la cola: la cabeza como "Reproduciendo", el resto numerado desde 1
pub fn queue_listing(snapshot: &QueueSnapshot) -> String {
    let mut description = String::new();

    for (index, track) in snapshot.tracks.iter().enumerate().take(QUEUE_LISTING_LIMIT) {
        if index == 0 {
            let heading = if snapshot.now_playing.is_some() {
                "Reproduciendo"
            } else {
                "A continuación"
            };
            description.push_str(&format!("**{}:**\n🎵 {}\n\n", heading, track.title()));
        } else {
            description.push_str(&format!("**{}.** {}\n", index, track.title()));
        }
    }

    let hidden = snapshot.tracks.len().saturating_sub(QUEUE_LISTING_LIMIT);
    if hidden > 0 {
        description.push_str(&format!("\n…y {} más", hidden));
    }
    description
}

pub fn volume_percent(volume: f32) -> u32 {
    (volume * 100.0).round() as u32
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
