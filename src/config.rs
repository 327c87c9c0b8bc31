use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para registrar comandos en desarrollo

    // Reproducción
    pub default_volume: u32, // Porcentaje
    pub max_queue_size: usize, // 0 = sin límite
    pub idle_eviction_secs: u64, // 0 = nunca desalojar

    // Resolver
    pub ytdlp_path: String,
    pub resolver_concurrency: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Reproducción
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,
            idle_eviction_secs: std::env::var("IDLE_EVICTION_SECS")
                .unwrap_or_else(|_| "0".to_string())
                .parse()?,

            // Resolver
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
            resolver_concurrency: std::env::var("RESOLVER_CONCURRENCY")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Valida que los valores de configuración sean correctos
    ///
    /// # Reglas de Validación
    ///
    /// - El token no puede estar vacío
    /// - El volumen por defecto debe estar entre 0 y 100 por ciento
    /// - La concurrencia del resolver debe ser al menos 1
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN no puede estar vacío");
        }

        if self.default_volume > 100 {
            anyhow::bail!(
                "El volumen por defecto debe estar entre 0 y 100, recibido: {}",
                self.default_volume
            );
        }

        if self.resolver_concurrency == 0 {
            anyhow::bail!("La concurrencia del resolver debe ser mayor que 0");
        }

        Ok(())
    }

    /// Devuelve un resumen de la configuración actual para logging
    ///
    /// No incluye el token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Commands: {}\n  \
            Playback: {}% default volume, queue limit {}, idle eviction {}\n  \
            Resolver: {} (x{})",
            self.guild_id
                .map_or("global".to_string(), |id| format!("guild {}", id)),
            self.default_volume,
            if self.max_queue_size == 0 {
                "none".to_string()
            } else {
                self.max_queue_size.to_string()
            },
            if self.idle_eviction_secs == 0 {
                "off".to_string()
            } else {
                format!("{}s", self.idle_eviction_secs)
            },
            self.ytdlp_path,
            self.resolver_concurrency,
        )
    }
}

/// Valores de configuración por defecto
///
/// Se usan cuando no se proporcionan variables de entorno.
impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            guild_id: None,

            default_volume: 100,
            max_queue_size: 1000,
            idle_eviction_secs: 0,

            ytdlp_path: "yt-dlp".to_string(),
            resolver_concurrency: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            discord_token: "token".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::default().validate().is_err());
        assert!(Config { default_volume: 101, ..valid() }.validate().is_err());
        assert!(Config { resolver_concurrency: 0, ..valid() }.validate().is_err());
    }

    #[test]
    fn summary_hides_token() {
        let config = Config {
            discord_token: "super-secret".to_string(),
            max_queue_size: 0,
            idle_eviction_secs: 300,
            ..Config::default()
        };
        let summary = config.summary();
        assert!(!summary.contains("super-secret"));
        assert!(summary.contains("queue limit none"));
        assert!(summary.contains("idle eviction 300s"));
    }
}
