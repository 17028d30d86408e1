use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::{process::Stdio, time::Duration};
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use url::Url;

use super::MediaResolver;
use crate::audio::{error::ResolveError, track::Track};

/// Título cuando yt-dlp no trae uno.
const UNTITLED: &str = "Sin título";

/// Resolvedor basado en el binario de yt-dlp (`-J`, salida JSON).
pub struct YtDlpResolver {
    program: String,
    timeout: Duration,
}

impl YtDlpResolver {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Verifica que yt-dlp y ffmpeg estén disponibles
    pub async fn verify_dependencies(&self) -> Result<()> {
        let ytdlp_check = Command::new(&self.program).arg("--version").output().await;
        match ytdlp_check {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                info!("✅ yt-dlp versión: {}", version.trim());
            }
            _ => {
                error!("❌ yt-dlp no encontrado en '{}'. Instala con: pip install yt-dlp", self.program);
                anyhow::bail!("yt-dlp no disponible");
            }
        }

        let ffmpeg_check = Command::new("ffmpeg").arg("-version").output().await;
        match ffmpeg_check {
            Ok(output) if output.status.success() => {
                info!("✅ ffmpeg disponible");
            }
            _ => {
                error!("❌ ffmpeg no encontrado. Instala con: sudo apt install ffmpeg");
                anyhow::bail!("ffmpeg no disponible");
            }
        }

        Ok(())
    }

    /// Ejecuta yt-dlp y parsea su JSON.
    async fn dump_json(&self, extra_args: &[&str], target: &str) -> Result<YtDlpInfo, ResolveError> {
        let mut cmd = Command::new(&self.program);
        cmd.args([
            "-J",
            "--format",
            "bestaudio/best",
            "--ignore-errors",
            "--no-warnings",
            "--quiet",
            "--no-check-certificates",
            "--socket-timeout",
            "15",
        ])
        .args(extra_args)
        .arg(target)
        .stdin(Stdio::null())
        .kill_on_drop(true);

        debug!("🔧 yt-dlp {:?} {}", extra_args, target);
        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ResolveError::Timeout(self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("sin salida de error")
                .trim()
                .to_string();
            return Err(ResolveError::Process(message));
        }

        // Con --ignore-errors yt-dlp imprime "null" si no pudo extraer nada
        let value: Option<YtDlpInfo> = serde_json::from_slice(&output.stdout)?;
        value.ok_or_else(|| ResolveError::Protocol(format!("yt-dlp no devolvió datos para {}", target)))
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<Vec<Track>, ResolveError> {
        let target = search_target(query);
        info!("🔍 Resolviendo con yt-dlp: {}", target);

        let info = self.dump_json(&["--flat-playlist"], &target).await?;
        let tracks = info.into_tracks();

        info!("🎵 {} tracks reproducibles para: {}", tracks.len(), query);
        Ok(tracks)
    }

    async fn resolve_related(&self, seed: &Track, position: usize) -> Result<Option<Track>, ResolveError> {
        let Some(video_id) = extract_video_id(seed.page_url()) else {
            info!("🚫 '{}' no es un video de YouTube, no hay mezcla", seed.title());
            return Ok(None);
        };
        let mix = mix_link(&video_id);
        let item = position.to_string();

        // Solo se pide la entrada `position` de la mezcla
        let listing = self
            .dump_json(&["--flat-playlist", "--playlist-items", &item], &mix)
            .await?;
        let Some(entry_url) = listing.first_entry_url() else {
            debug!("📭 Mezcla de {} sin entrada en la posición {}", video_id, position);
            return Ok(None);
        };

        match self.dump_json(&["--no-playlist"], &entry_url).await {
            Ok(info) => Ok(info.into_tracks().into_iter().next()),
            Err(ResolveError::Process(message)) => {
                warn!("⚠️ Entrada {} de la mezcla no disponible: {}", position, message);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: Option<String>,
}

/// Subconjunto del JSON de yt-dlp que se usa.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    extractor: Option<String>,
    thumbnail: Option<String>,
    thumbnails: Option<Vec<Thumbnail>>,
    duration: Option<f64>,
    availability: Option<String>,
    requires_premium: Option<bool>,
    entries: Option<Vec<Option<YtDlpInfo>>>,
}

impl YtDlpInfo {
    fn into_tracks(self) -> Vec<Track> {
        match self.entries {
            Some(entries) => {
                let total = entries.len();
                let tracks: Vec<Track> = entries
                    .into_iter()
                    .flatten()
                    .filter(YtDlpInfo::is_playable_entry)
                    .filter_map(YtDlpInfo::into_track)
                    .collect();
                if tracks.len() < total {
                    info!("🧹 {} entradas descartadas (privadas, premium o sin URL)", total - tracks.len());
                }
                tracks
            }
            None if self.requires_premium.unwrap_or(false) => {
                info!("💎 Video solo para premium, no se puede reproducir");
                Vec::new()
            }
            None => self.into_track().into_iter().collect(),
        }
    }

    fn is_playable_entry(&self) -> bool {
        self.url.is_some()
            && self.availability.as_deref() != Some("private")
            && !self.requires_premium.unwrap_or(false)
    }

    fn into_track(self) -> Option<Track> {
        let media_url = self.url?;
        let page_url = self.webpage_url.unwrap_or_else(|| media_url.clone());
        // Los enlaces genéricos se sirven tal cual; el resto lo vuelve a resolver yt-dlp al reproducir
        let stream_uri = if self.extractor.as_deref() == Some("generic") {
            media_url
        } else {
            page_url.clone()
        };

        let thumbnail = self.thumbnail.or_else(|| {
            self.thumbnails
                .unwrap_or_default()
                .into_iter()
                .rev()
                .find_map(|t| t.url)
        });
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());

        let mut track = Track::new(title, stream_uri, page_url)
            .with_duration_secs(self.duration.map_or(0, |d| d.max(0.0).round() as u64));
        if let Some(thumbnail) = thumbnail {
            track = track.with_thumbnail(thumbnail);
        }
        Some(track)
    }

    fn first_entry_url(self) -> Option<String> {
        self.entries?
            .into_iter()
            .flatten()
            .find_map(|entry| entry.url.or(entry.webpage_url))
    }
}

/// URLs se usan tal cual; el texto libre se busca en YouTube.
fn search_target(query: &str) -> String {
    let query = query.trim();
    match Url::parse(query) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => query.to_string(),
        _ => format!("ytsearch1:{}", query),
    }
}

/// Extrae video ID de URL de YouTube
pub fn extract_video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;

    // youtube.com/watch?v=VIDEO_ID
    if let Some((_, id)) = parsed.query_pairs().find(|(key, _)| key == "v") {
        return Some(id.into_owned()).filter(|id| !id.is_empty());
    }

    let mut segments = parsed.path_segments()?;
    match host {
        // youtu.be/VIDEO_ID
        "youtu.be" => segments.next().filter(|s| !s.is_empty()).map(str::to_string),
        // youtube.com/shorts/VIDEO_ID
        h if h.ends_with("youtube.com") => match (segments.next(), segments.next()) {
            (Some("shorts"), Some(id)) if !id.is_empty() => Some(id.to_string()),
            _ => None,
        },
        _ => None,
    }
}

/// Mezcla automática de YouTube sembrada con `video_id`.
pub fn mix_link(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}&list=RD{video_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(json: &str) -> YtDlpInfo {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn playlist_drops_private_premium_and_missing_urls() {
        let info = parse(
            r#"{
                "title": "Mi playlist",
                "entries": [
                    {"title": "Pública", "url": "https://www.youtube.com/watch?v=aaa", "duration": 61.4},
                    {"title": "Privada", "url": "https://www.youtube.com/watch?v=bbb", "availability": "private"},
                    {"title": "Premium", "url": "https://www.youtube.com/watch?v=ccc", "requires_premium": true},
                    {"title": "Borrada"},
                    null,
                    {"title": "Sin lista", "url": "https://www.youtube.com/watch?v=ddd", "availability": "unlisted"}
                ]
            }"#,
        );

        let tracks = info.into_tracks();

        let titles: Vec<&str> = tracks.iter().map(Track::title).collect();
        assert_eq!(titles, vec!["Pública", "Sin lista"]);
        assert_eq!(tracks[0].duration_secs(), 61);
        assert_eq!(tracks[0].page_url(), "https://www.youtube.com/watch?v=aaa");
    }

    #[test]
    fn single_premium_video_resolves_to_nothing() {
        let info = parse(r#"{"title": "Exclusivo", "url": "https://rr1.googlevideo.com/x", "requires_premium": true}"#);
        assert!(info.into_tracks().is_empty());
    }

    #[test]
    fn single_video_streams_from_its_page() {
        let info = parse(
            r#"{
                "title": "Canción",
                "url": "https://rr1.googlevideo.com/videoplayback?id=1",
                "webpage_url": "https://www.youtube.com/watch?v=abc123",
                "extractor": "youtube",
                "thumbnail": "https://i.ytimg.com/vi/abc123/hq.jpg",
                "duration": 200
            }"#,
        );

        let track = info.into_tracks().pop().unwrap();

        assert_eq!(track.stream_uri(), "https://www.youtube.com/watch?v=abc123");
        assert_eq!(track.thumbnail_url(), Some("https://i.ytimg.com/vi/abc123/hq.jpg"));
        assert!(!track.is_autoplay_generated());
    }

    #[test]
    fn generic_links_stream_directly() {
        let info = parse(
            r#"{"title": "", "url": "https://cdn.example.com/a.mp3", "webpage_url": "https://cdn.example.com/a.mp3", "extractor": "generic", "thumbnails": [{"url": "https://cdn.example.com/small.jpg"}, {"url": "https://cdn.example.com/big.jpg"}]}"#,
        );

        let track = info.into_tracks().pop().unwrap();

        assert_eq!(track.title(), UNTITLED);
        assert_eq!(track.stream_uri(), "https://cdn.example.com/a.mp3");
        assert_eq!(track.thumbnail_url(), Some("https://cdn.example.com/big.jpg"));
    }

    #[test]
    fn flat_mix_listing_yields_entry_url() {
        let listing = parse(
            r#"{"title": "Mix", "entries": [{"title": "Relacionada", "url": "https://www.youtube.com/watch?v=zzz", "ie_key": "Youtube"}]}"#,
        );
        assert_eq!(
            listing.first_entry_url().as_deref(),
            Some("https://www.youtube.com/watch?v=zzz")
        );
        assert_eq!(parse(r#"{"title": "Mix", "entries": []}"#).first_entry_url(), None);
    }

    #[test]
    fn video_ids_from_common_url_shapes() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(
            extract_video_id("https://music.youtube.com/watch?v=abc").as_deref(),
            Some("abc")
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/shorts/xyz").as_deref(),
            Some("xyz")
        );
        assert_eq!(extract_video_id("https://soundcloud.com/a/b"), None);
        assert_eq!(extract_video_id("no es una url"), None);
    }

    #[test]
    fn mix_link_seeds_with_the_video() {
        assert_eq!(
            mix_link("abc"),
            "https://www.youtube.com/watch?v=abc&list=RDabc"
        );
    }

    #[test]
    fn free_text_becomes_a_search() {
        assert_eq!(search_target("  daft punk  "), "ytsearch1:daft punk");
        assert_eq!(
            search_target("https://youtu.be/abc"),
            "https://youtu.be/abc"
        );
    }
}
