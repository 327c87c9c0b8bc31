pub mod ytdlp;

use async_trait::async_trait;

use crate::audio::{error::PlayerError, track::TrackDescriptor};

pub use ytdlp::YtDlpResolver;

/// Convierte una búsqueda o enlace en un track reproducible
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Falla con [`PlayerError::ResolutionFailure`] si no hay nada reproducible
    async fn resolve(&self, query: &str) -> Result<TrackDescriptor, PlayerError>;
}
