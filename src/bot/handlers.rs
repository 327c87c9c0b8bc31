use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    audio::{error::PlayerError, transport::VoiceTransport},
    bot::JukeboxBot,
    ui::embeds,
};

/// Maneja comandos slash: difiere la respuesta, ejecuta el comando y edita la respuesta con el resultado
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content("❌ Los comandos solo funcionan dentro de un servidor")
                        .ephemeral(true),
                ),
            )
            .await?;
        return Ok(());
    };

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    // Defer la respuesta ya que resolver puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let embed = match run_command(ctx, &command, guild_id, bot).await {
        Ok(embed) => embed,
        Err(e) => {
            warn!("Falló /{} en guild {}: {}", command.data.name, guild_id, e);
            embeds::create_error_embed(&e.to_string())
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

async fn run_command(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<CreateEmbed> {
    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, guild_id, bot).await,
        "search" => handle_search(command, bot).await,
        "volume" => handle_volume(command, guild_id, bot).await,
        "skip" => handle_skip(guild_id, bot).await,
        "loop" => handle_loop(guild_id, bot).await,
        "pause" => handle_pause(guild_id, bot).await,
        "resume" => handle_resume(guild_id, bot).await,
        "stop" => handle_stop(ctx, guild_id, bot).await,
        "queue" => handle_queue(guild_id, bot).await,
        "nowplaying" => handle_nowplaying(guild_id, bot).await,
        "help" => Ok(embeds::create_help_embed()),
        other => Err(anyhow::anyhow!("Comando no reconocido /{}", other)),
    }
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<CreateEmbed> {
    let query = string_option(command, "query")?;
    let voice_channel_id = get_user_voice_channel(ctx, guild_id, command.user.id)?;

    let call = match bot.get_voice_handler(guild_id) {
        Some(call) => call,
        None => bot.join_voice_channel(ctx, guild_id, voice_channel_id).await?,
    };
    bot.announce_channels.insert(guild_id, command.channel_id);

    let track = bot
        .resolver
        .resolve(query)
        .await?
        .requested_by_user(command.user.id);

    let transport: Arc<dyn VoiceTransport> = bot.transport_for(ctx, guild_id, call).await?;
    let outcome = bot.registry.enqueue(guild_id, track.clone(), transport).await?;

    info!(
        "🎵 \"{}\" agregado en la posición {} en guild {}",
        track.title(),
        outcome.position,
        guild_id
    );
    Ok(embeds::create_track_added_embed(&track, outcome.position))
}

async fn handle_search(command: &CommandInteraction, bot: &JukeboxBot) -> Result<CreateEmbed> {
    let query = string_option(command, "query")?;
    let track = bot.resolver.resolve(query).await?;
    Ok(embeds::create_search_result_embed(&track))
}

async fn handle_volume(
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<CreateEmbed> {
    let level = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "level")
        .and_then(|opt| opt.value.as_i64())
        .ok_or_else(|| PlayerError::InvalidArgument("falta el nivel".to_string()))?;

    if bot.get_voice_handler(guild_id).is_none() {
        return Err(PlayerError::NotInVoiceContext.into());
    }

    let gain = bot.registry.set_volume(guild_id, level).await?;
    Ok(embeds::create_success_embed(
        "Volumen",
        &format!("🔊 Volumen ajustado a {}%", embeds::volume_percent(gain)),
    ))
}

async fn handle_skip(guild_id: GuildId, bot: &JukeboxBot) -> Result<CreateEmbed> {
    let skipped = bot.registry.skip(guild_id).await?;
    Ok(embeds::create_success_embed(
        "Saltada",
        &format!("⏭️ Saltada **{}**", skipped.title()),
    ))
}

async fn handle_loop(guild_id: GuildId, bot: &JukeboxBot) -> Result<CreateEmbed> {
    let enabled = bot.registry.toggle_loop(guild_id).await?;
    let message = if enabled {
        "🔂 Loop activado"
    } else {
        "➡️ Loop desactivado"
    };
    Ok(embeds::create_success_embed("Loop", message))
}

async fn handle_pause(guild_id: GuildId, bot: &JukeboxBot) -> Result<CreateEmbed> {
    bot.registry.pause(guild_id).await?;
    Ok(embeds::create_success_embed("Pausado", "⏸️ Reproducción pausada"))
}

async fn handle_resume(guild_id: GuildId, bot: &JukeboxBot) -> Result<CreateEmbed> {
    bot.registry.resume(guild_id).await?;
    Ok(embeds::create_success_embed("Reanudado", "▶️ Reproducción reanudada"))
}

async fn handle_stop(ctx: &Context, guild_id: GuildId, bot: &JukeboxBot) -> Result<CreateEmbed> {
    bot.forget_voice_handler(guild_id);
    let cleared = bot.registry.stop(guild_id).await?;

    // El reproductor solo desconecta llamadas en las que transmitió
    if let Some(manager) = songbird::get(ctx).await {
        let _ = manager.remove(guild_id).await;
    }

    Ok(embeds::create_success_embed(
        "Detenido",
        &format!("⏹️ Reproducción detenida, {} canciones eliminadas de la cola", cleared),
    ))
}

async fn handle_queue(guild_id: GuildId, bot: &JukeboxBot) -> Result<CreateEmbed> {
    let snapshot = bot.registry.peek_state(guild_id).await?;
    Ok(embeds::create_queue_embed(&snapshot))
}

async fn handle_nowplaying(guild_id: GuildId, bot: &JukeboxBot) -> Result<CreateEmbed> {
    let snapshot = bot.registry.peek_state(guild_id).await?;
    Ok(embeds::create_now_playing_embed(&snapshot))
}

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Result<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| PlayerError::InvalidArgument(format!("falta `{}`", name)).into())
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Result<ChannelId> {
    let guild = guild_id
        .to_guild_cached(&ctx.cache)
        .ok_or_else(|| anyhow::anyhow!("Guild no encontrada en caché"))?;

    let channel_id = guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or(PlayerError::NotInVoiceContext)?;

    Ok(channel_id)
}
