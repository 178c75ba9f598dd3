//! Discogs release tracklist adapter

use super::{non_blank, unsupported, NormalizedTrack, TrackAdapter};
use crate::error::Result;
use bridge_traits::{DiscogsArtist, ExternalTrack, PlatformKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct DiscogsAdapter;

impl TrackAdapter for DiscogsAdapter {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Discogs
    }

    fn normalize(&self, track: &ExternalTrack) -> Result<NormalizedTrack> {
        let ExternalTrack::Discogs(track) = track else {
            return Err(unsupported(self.platform(), track));
        };

        // Track-level credits only exist on compilations
        let credits = if track.artists.is_empty() {
            &track.release_artists
        } else {
            &track.artists
        };

        let position = track.position.trim();
        let platform_id = if position.is_empty() {
            track.release_id.to_string()
        } else {
            format!("{}-{}", track.release_id, position)
        };

        Ok(NormalizedTrack {
            platform: PlatformKind::Discogs,
            platform_id,
            uri: non_blank(track.resource_url.as_deref()),
            title: track.title.trim().to_string(),
            artist: join_artists(credits),
            album: non_blank(track.release_title.as_deref()),
            duration_ms: track.duration.as_deref().and_then(parse_duration),
            year: track.year.filter(|y| *y > 0),
            file_path: None,
            rating: None,
            added_at: track.date_added,
            metadata: serde_json::to_value(track)?,
        })
    }
}

fn join_artists(artists: &[DiscogsArtist]) -> String {
    artists
        .iter()
        .map(|a| {
            let name = a
                .anv
                .as_deref()
                .map(str::trim)
                .filter(|anv| !anv.is_empty())
                .unwrap_or(&a.name);
            strip_disambiguation(name)
        })
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// "Artist (2)" -> "Artist"
fn strip_disambiguation(name: &str) -> &str {
    let name = name.trim();
    if let Some(stripped) = name.strip_suffix(')') {
        if let Some(open) = stripped.rfind(" (") {
            let suffix = &stripped[open + 2..];
            if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
                return stripped[..open].trim_end();
            }
        }
    }
    name
}

/// "m:ss" or "h:mm:ss" to milliseconds
fn parse_duration(duration: &str) -> Option<i64> {
    let parts = duration
        .trim()
        .split(':')
        .map(|part| part.trim().parse::<i64>().ok())
        .collect::<Option<Vec<_>>>()?;

    let (hours, minutes, seconds) = match *parts.as_slice() {
        [minutes, seconds] => (0, minutes, seconds),
        [hours, minutes, seconds] => (hours, minutes, seconds),
        _ => return None,
    };

    let total = hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)?;
    if total <= 0 {
        return None;
    }
    total.checked_mul(1000)
}
