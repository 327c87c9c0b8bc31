use anyhow::Result;
use serenity::{
    all::Command,
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

/// Registra los comandos globalmente
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    Command::set_global_commands(&ctx.http, command_definitions()).await?;
    Ok(())
}

/// Registra los comandos para una sola guild (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, command_definitions()).await?;
    Ok(())
}

pub fn command_definitions() -> Vec<CreateCommand> {
    vec![
        play_command(),
        search_command(),
        nowplaying_command(),
        queue_command(),
        volume_command(),
        skip_command(),
        loop_command(),
        stop_command(),
        pause_command(),
        resume_command(),
        help_command(),
    ]
}

// Reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una canción o la agrega a la cola")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "Enlace o búsqueda")
                .required(true),
        )
}

fn search_command() -> CreateCommand {
    CreateCommand::new("search")
        .description("Busca una canción sin agregarla a la cola")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "Términos de búsqueda")
                .required(true),
        )
}

// Controles

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la canción actual")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la canción pausada")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Salta la canción actual")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la reproducción, limpia la cola y sale")
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop").description("Activa o desactiva el loop de la canción actual")
}

fn volume_command() -> CreateCommand {
    // El reproductor también valida el rango y rechaza valores fuera de él
    CreateCommand::new("volume")
        .description("Ajusta el volumen de reproducción")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "level", "Volumen (0-100)")
                .required(true),
        )
}

// Cola

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Muestra la cola actual")
}

fn nowplaying_command() -> CreateCommand {
    CreateCommand::new("nowplaying").description("Muestra la canción actual")
}

fn help_command() -> CreateCommand {
    CreateCommand::new("help").description("Lista los comandos de música")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_command_is_registered_once() {
        let names: Vec<String> = command_definitions()
            .iter()
            .map(|command| {
                serde_json::to_value(command).unwrap()["name"]
                    .as_str()
                    .unwrap()
                    .to_string()
            })
            .collect();

        let unique: HashSet<_> = names.iter().cloned().collect();
        assert_eq!(unique.len(), names.len());
        for expected in [
            "play", "search", "nowplaying", "queue", "volume", "skip", "loop", "stop", "pause",
            "resume", "help",
        ] {
            assert!(unique.contains(expected), "missing /{}", expected);
        }
    }
}
