use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::MediaResolver;
use crate::audio::{error::PlayerError, track::TrackDescriptor};

/// Resuelve enlaces y búsquedas con el ejecutable de yt-dlp
pub struct YtDlpResolver {
    executable: String,
    rate_limiter: Semaphore,
}

/// Campos de la salida de `--dump-json` que nos interesan
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    url: Option<String>,
    webpage_url: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
}

impl YtDlpResolver {
    pub fn new(executable: impl Into<String>, concurrency: usize) -> Self {
        Self {
            executable: executable.into(),
            // Limitar extracciones concurrentes para evitar rate limiting
            rate_limiter: Semaphore::new(concurrency.max(1)),
        }
    }

    /// Los enlaces se extraen directo, lo demás se vuelve una búsqueda de un resultado
    fn target(query: &str) -> String {
        if query.starts_with("http") {
            query.to_string()
        } else {
            format!("ytsearch1:{}", query)
        }
    }

    fn parse(query: &str, stdout: &str) -> Result<TrackDescriptor, PlayerError> {
        let line = stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| PlayerError::resolution(query, "no se encontraron resultados"))?;

        let info: YtDlpInfo = serde_json::from_str(line)
            .map_err(|e| PlayerError::resolution(query, format!("salida de yt-dlp ilegible: {}", e)))?;

        let source = info
            .url
            .ok_or_else(|| PlayerError::resolution(query, "sin stream reproducible"))?;

        let mut track = TrackDescriptor::new(info.title, source);
        if let Some(page) = info.webpage_url {
            track = track.with_page_url(page);
        }
        if let Some(thumbnail) = info.thumbnail {
            track = track.with_thumbnail(thumbnail);
        }
        if let Some(uploader) = info.uploader {
            track = track.with_artist(uploader);
        }
        if let Some(seconds) = info.duration.filter(|s| s.is_finite() && *s >= 0.0) {
            track = track.with_duration(Duration::from_secs_f64(seconds));
        }
        Ok(track)
    }

    /// Verifica que el ejecutable se pueda lanzar
    pub async fn verify(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.executable)
            .arg("--version")
            .output()
            .await?;

        if !output.status.success() {
            anyhow::bail!("{} --version terminó con {}", self.executable, output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<TrackDescriptor, PlayerError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| PlayerError::resolution(query, e))?;

        let target = Self::target(query);
        info!("🔍 Resolviendo: {}", target);

        let output = Command::new(&self.executable)
            .args([
                "--dump-json",
                "-f",
                "bestaudio/best",
                "--no-playlist",
                "--no-warnings",
                "--default-search",
                "auto",
                target.as_str(),
            ])
            .output()
            .await
            .map_err(|e| PlayerError::resolution(query, format!("no se pudo ejecutar yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PlayerError::resolution(query, stderr.trim()));
        }

        let track = Self::parse(query, &String::from_utf8_lossy(&output.stdout))?;
        debug!("✅ Resuelto {} -> {}", query, track.title());
        Ok(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn links_are_used_verbatim() {
        assert_eq!(
            YtDlpResolver::target("https://youtu.be/dQw4w9WgXcQ"),
            "https://youtu.be/dQw4w9WgXcQ"
        );
        assert_eq!(
            YtDlpResolver::target("never gonna give you up"),
            "ytsearch1:never gonna give you up"
        );
    }

    #[test]
    fn parses_dump_json() {
        let stdout = r#"{"title":"Song","url":"https://cdn.example/a.webm","webpage_url":"https://video.example/watch?v=a","thumbnail":"https://img.example/a.jpg","duration":212.0,"uploader":"Band"}"#;

        let track = YtDlpResolver::parse("song", stdout).unwrap();
        assert_eq!(track.title(), "Song");
        assert_eq!(track.playable_source(), "https://cdn.example/a.webm");
        assert_eq!(track.page_url(), "https://video.example/watch?v=a");
        assert_eq!(track.thumbnail(), Some("https://img.example/a.jpg"));
        assert_eq!(track.artist(), Some("Band"));
        assert_eq!(track.duration(), Some(Duration::from_secs(212)));
    }

    #[test]
    fn page_url_defaults_to_stream() {
        let stdout = r#"{"title":"Live","url":"https://cdn.example/live.m3u8"}"#;
        let track = YtDlpResolver::parse("live", stdout).unwrap();
        assert_eq!(track.page_url(), "https://cdn.example/live.m3u8");
        assert_eq!(track.thumbnail(), None);
        assert_eq!(track.duration(), None);
    }

    #[test]
    fn empty_or_unplayable_output_is_a_resolution_failure() {
        assert!(matches!(
            YtDlpResolver::parse("nothing", "\n"),
            Err(PlayerError::ResolutionFailure { .. })
        ));
        assert!(matches!(
            YtDlpResolver::parse("nothing", r#"{"title":"No stream"}"#),
            Err(PlayerError::ResolutionFailure { .. })
        ));
        assert!(matches!(
            YtDlpResolver::parse("nothing", "not json"),
            Err(PlayerError::ResolutionFailure { .. })
        ));
    }
}
