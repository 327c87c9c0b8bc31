use std::collections::VecDeque;
use tracing::{debug, info};

use super::{error::PlayerError, track::TrackDescriptor};

/// Tracks en orden más los modos de reproducción de una guild
///
/// La cabeza de `pending` es el track que suena (o está por sonar). Solo se
/// quita cuando termina su reproducción, y nunca en un final natural con el
/// loop activado. `now_playing` es una marca sobre la cabeza y no una copia,
/// así ambos no pueden desincronizarse.
#[derive(Debug)]
pub struct GuildQueue {
    pending: VecDeque<TrackDescriptor>,
    volume: f32,
    loop_enabled: bool,
    head_playing: bool,
    max_size: Option<usize>,
}

impl Default for GuildQueue {
    fn default() -> Self {
        Self::new(1.0, None)
    }
}

impl GuildQueue {
    pub fn new(volume: f32, max_size: Option<usize>) -> Self {
        Self {
            pending: VecDeque::new(),
            volume: volume.clamp(0.0, 1.0),
            loop_enabled: false,
            head_playing: false,
            max_size,
        }
    }

    /// Agrega un track a la cola y devuelve su posición (0 = cabeza)
    pub fn enqueue(&mut self, track: TrackDescriptor) -> Result<usize, PlayerError> {
        if let Some(limit) = self.max_size {
            if self.pending.len() >= limit {
                return Err(PlayerError::QueueFull(limit));
            }
        }

        info!("➕ Agregado a la cola: {}", track.title());
        self.pending.push_back(track);
        Ok(self.pending.len() - 1)
    }

    /// Ajusta el volumen desde un porcentaje 0-100 y devuelve la ganancia
    pub fn set_volume(&mut self, percent: i64) -> Result<f32, PlayerError> {
        if !(0..=100).contains(&percent) {
            return Err(PlayerError::InvalidArgument(format!(
                "el volumen debe estar entre 0 y 100, recibido {}",
                percent
            )));
        }

        self.volume = percent as f32 / 100.0;
        info!("🔊 Volumen ajustado a {}%", percent);
        Ok(self.volume)
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.loop_enabled = !self.loop_enabled;
        if self.loop_enabled {
            info!("🔂 Loop activado");
        } else {
            info!("➡️ Loop desactivado");
        }
        self.loop_enabled
    }

    /// Limpia la cola y la marca de reproducción actual
    pub fn clear(&mut self) -> usize {
        let cleared = self.pending.len();
        self.pending.clear();
        self.head_playing = false;
        info!("🗑️ Cola limpiada ({} tracks)", cleared);
        cleared
    }

    pub fn peek_head(&self) -> Option<&TrackDescriptor> {
        self.pending.front()
    }

    /// Paso de final natural: quita la cabeza salvo que el loop esté activado
    pub fn advance(&mut self) -> Option<&TrackDescriptor> {
        self.head_playing = false;
        if self.loop_enabled {
            if let Some(head) = self.pending.front() {
                debug!("🔂 Repitiendo: {}", head.title());
            }
        } else if let Some(finished) = self.pending.pop_front() {
            debug!("⏭️ Terminado: {}", finished.title());
        }
        self.pending.front()
    }

    /// Quita la cabeza sin condiciones, para saltos y tracks irreproducibles
    pub fn drop_head(&mut self) -> Option<TrackDescriptor> {
        self.head_playing = false;
        self.pending.pop_front()
    }

    pub fn mark_head_playing(&mut self) {
        self.head_playing = !self.pending.is_empty();
    }

    pub fn now_playing(&self) -> Option<&TrackDescriptor> {
        if self.head_playing {
            self.pending.front()
        } else {
            None
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn tracks(&self) -> impl Iterator<Item = &TrackDescriptor> {
        self.pending.iter()
    }
}
