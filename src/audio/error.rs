use serenity::model::id::GuildId;
use thiserror::Error;

/// Errores que el núcleo de reproducción devuelve a la capa de comandos
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    #[error("argumento inválido: {0}")]
    InvalidArgument(String),

    #[error("debes estar en un canal de voz")]
    NotInVoiceContext,

    #[error("no se pudo resolver `{query}`: {reason}")]
    ResolutionFailure { query: String, reason: String },

    #[error("el stream no pudo iniciar: {0}")]
    StreamStartFailure(String),

    #[error("el stream falló durante la reproducción: {0}")]
    StreamRuntimeFailure(String),

    #[error("la cola está llena (límite {0} tracks)")]
    QueueFull(usize),

    #[error("no hay nada reproduciéndose")]
    NothingPlaying,

    #[error("el reproductor de la guild {0} no está disponible")]
    PlayerUnavailable(GuildId),
}

impl PlayerError {
    pub fn resolution(query: impl Into<String>, reason: impl ToString) -> Self {
        Self::ResolutionFailure {
            query: query.into(),
            reason: reason.to_string(),
        }
    }
}
