//! rekordbox collection export adapter
//!
//! rekordbox stores durations in whole seconds, ratings on a 0-255 scale
//! (51 per star) and file locations as `file://localhost/` URLs.

use super::{non_blank, unsupported, NormalizedTrack, TrackAdapter};
use crate::error::Result;
use bridge_traits::{ExternalTrack, PlatformKind};

const STARS_SCALE: i32 = 51;

#[derive(Debug, Clone, Copy, Default)]
pub struct RekordboxAdapter;

impl TrackAdapter for RekordboxAdapter {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Rekordbox
    }

    fn normalize(&self, track: &ExternalTrack) -> Result<NormalizedTrack> {
        let ExternalTrack::Rekordbox(track) = track else {
            return Err(unsupported(self.platform(), track));
        };

        Ok(NormalizedTrack {
            platform: PlatformKind::Rekordbox,
            platform_id: track.track_id.trim().to_string(),
            uri: None,
            title: track.name.trim().to_string(),
            artist: track.artist.trim().to_string(),
            album: non_blank(track.album.as_deref()),
            duration_ms: track
                .total_time
                .filter(|secs| *secs > 0)
                .and_then(|secs| secs.checked_mul(1000)),
            year: track.year.filter(|y| *y > 0),
            file_path: track.location.as_deref().and_then(location_to_path),
            rating: track.rating.map(rating_to_stars),
            added_at: track.date_added,
            metadata: serde_json::to_value(track)?,
        })
    }
}

/// 0-255 rating to 0-5 stars, rounding to the nearest star
fn rating_to_stars(rating: i32) -> i32 {
    let rating = rating.clamp(0, 255);
    (rating + STARS_SCALE / 2) / STARS_SCALE
}

/// Decode a `file://localhost/...` location into a local path
fn location_to_path(location: &str) -> Option<String> {
    let location = location.trim();
    if location.is_empty() {
        return None;
    }

    let Some(rest) = location
        .strip_prefix("file://localhost")
        .or_else(|| location.strip_prefix("file://"))
    else {
        return Some(location.to_string());
    };

    let decoded = match urlencoding::decode(rest) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => rest.to_string(),
    };

    // "/C:/Music/x.mp3" on Windows exports
    let bytes = decoded.as_bytes();
    if bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':'
    {
        return Some(decoded[1..].to_string());
    }

    Some(decoded)
}
