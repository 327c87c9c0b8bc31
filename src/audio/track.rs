use serenity::model::id::UserId;
use std::time::Duration;

/// Descripción inmutable de un elemento reproducible
///
/// `playable_source` es lo que el transporte de voz transmite (una URL de
/// media resuelta); `page_url` es el enlace para humanos y cae en la fuente
/// reproducible cuando el resolver no entregó uno.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDescriptor {
    title: String,
    playable_source: String,
    page_url: Option<String>,
    thumbnail: Option<String>,
    artist: Option<String>,
    duration: Option<Duration>,
    requested_by: Option<UserId>,
}

impl TrackDescriptor {
    pub fn new(title: impl Into<String>, playable_source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            playable_source: playable_source.into(),
            page_url: None,
            thumbnail: None,
            artist: None,
            duration: None,
            requested_by: None,
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn playable_source(&self) -> &str {
        &self.playable_source
    }
    pub fn page_url(&self) -> &str {
        self.page_url.as_deref().unwrap_or(&self.playable_source)
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn requested_by(&self) -> Option<UserId> {
        self.requested_by
    }

    // Builders
    pub fn with_page_url(mut self, page_url: impl Into<String>) -> Self {
        self.page_url = Some(page_url.into());
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn requested_by_user(mut self, user: UserId) -> Self {
        self.requested_by = Some(user);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_url_falls_back_to_playable_source() {
        let track = TrackDescriptor::new("Song", "https://cdn.example/a.m4a");
        assert_eq!(track.page_url(), "https://cdn.example/a.m4a");

        let track = track.with_page_url("https://video.example/watch?v=a");
        assert_eq!(track.page_url(), "https://video.example/watch?v=a");
        assert_eq!(track.playable_source(), "https://cdn.example/a.m4a");
    }
}
