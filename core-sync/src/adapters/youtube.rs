//! YouTube video adapter
//!
//! Music videos rarely carry structured credits. Titles of the form
//! "Artist - Title (Official Video)" are split on the first dash; otherwise
//! the uploading channel is used as the artist.

use super::{unsupported, NormalizedTrack, TrackAdapter};
use crate::error::Result;
use bridge_traits::{ExternalTrack, PlatformKind};
use chrono::Datelike;

const SEPARATORS: [&str; 3] = [" - ", " – ", " — "];

const NOISE_WORDS: [&str; 9] = [
    "official",
    "video",
    "audio",
    "lyric",
    "visualizer",
    "visualiser",
    "hd",
    "4k",
    "remastered",
];

const TOPIC_SUFFIX: &str = " - Topic";
const VEVO_SUFFIX: &str = "VEVO";

#[derive(Debug, Clone, Copy, Default)]
pub struct YouTubeAdapter;

impl TrackAdapter for YouTubeAdapter {
    fn platform(&self) -> PlatformKind {
        PlatformKind::YouTube
    }

    fn normalize(&self, track: &ExternalTrack) -> Result<NormalizedTrack> {
        let ExternalTrack::YouTube(video) = track else {
            return Err(unsupported(self.platform(), track));
        };

        let cleaned = strip_noise(&video.title);
        let (artist, title) = match split_title(cleaned) {
            Some((artist, title)) => (artist.to_string(), title.to_string()),
            None => (
                video
                    .channel_title
                    .as_deref()
                    .map(channel_artist)
                    .unwrap_or_default(),
                cleaned.to_string(),
            ),
        };

        let video_id = video.video_id.trim();

        Ok(NormalizedTrack {
            platform: PlatformKind::YouTube,
            platform_id: video_id.to_string(),
            uri: None,
            title,
            artist,
            album: None,
            duration_ms: video.duration.as_deref().and_then(parse_iso_duration),
            year: video.published_at.map(|at| at.year()),
            file_path: None,
            rating: None,
            added_at: video.added_at,
            metadata: serde_json::to_value(video)?,
        })
    }
}

fn split_title(title: &str) -> Option<(&str, &str)> {
    let (index, separator) = SEPARATORS
        .iter()
        .filter_map(|sep| title.find(sep).map(|i| (i, *sep)))
        .min_by_key(|(i, _)| *i)?;

    let artist = title[..index].trim();
    let title = title[index + separator.len()..].trim();
    (!artist.is_empty() && !title.is_empty()).then_some((artist, title))
}

/// Drop trailing "(Official Video)" / "[HD]" style groups
fn strip_noise(title: &str) -> &str {
    let mut title = title.trim();

    loop {
        let open = match title.chars().last() {
            Some(')') => '(',
            Some(']') => '[',
            _ => return title,
        };
        let Some(start) = title.rfind(open) else {
            return title;
        };

        let group = title[start + 1..title.len() - 1].to_lowercase();
        let is_noise = group
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| NOISE_WORDS.contains(&word));
        if !is_noise {
            return title;
        }

        title = title[..start].trim_end();
    }
}

/// "Artist - Topic" and "ArtistVEVO" channels name the artist
fn channel_artist(channel: &str) -> String {
    let channel = channel.trim();
    let channel = channel.strip_suffix(TOPIC_SUFFIX).unwrap_or(channel);
    let channel = match channel.strip_suffix(VEVO_SUFFIX) {
        Some(name) if !name.is_empty() => name,
        _ => channel,
    };
    channel.trim().to_string()
}

/// ISO-8601 `PT#H#M#S` (optionally with a day part) to milliseconds
fn parse_iso_duration(duration: &str) -> Option<i64> {
    let rest = duration.trim().strip_prefix('P')?;
    let mut seconds: i64 = 0;
    let mut number = String::new();
    let mut in_time = false;

    for c in rest.chars() {
        match c {
            'T' => in_time = true,
            '0'..='9' => number.push(c),
            unit => {
                let value: i64 = number.parse().ok()?;
                number.clear();
                let scale = match (unit, in_time) {
                    ('D', false) => 86_400,
                    ('H', true) => 3600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return None,
                };
                seconds = seconds.checked_add(value.checked_mul(scale)?)?;
            }
        }
    }

    if !number.is_empty() {
        return None;
    }
    if seconds <= 0 {
        return None;
    }
    seconds.checked_mul(1000)
}
