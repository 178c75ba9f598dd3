//! Spotify Web API track adapter

use super::{non_blank, unsupported, year_from_date, NormalizedTrack, TrackAdapter};
use crate::error::Result;
use bridge_traits::{ExternalTrack, PlatformKind};

const URI_PREFIX: &str = "spotify:track:";

#[derive(Debug, Clone, Copy, Default)]
pub struct SpotifyAdapter;

impl TrackAdapter for SpotifyAdapter {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Spotify
    }

    fn normalize(&self, track: &ExternalTrack) -> Result<NormalizedTrack> {
        let ExternalTrack::Spotify(track) = track else {
            return Err(unsupported(self.platform(), track));
        };

        let artist = track
            .artists
            .iter()
            .map(|a| a.name.trim())
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        let uri = non_blank(track.uri.as_deref()).or_else(|| {
            let id = track.id.trim();
            (!id.is_empty()).then(|| format!("{}{}", URI_PREFIX, id))
        });

        let album = track.album.as_ref();

        Ok(NormalizedTrack {
            platform: PlatformKind::Spotify,
            platform_id: track.id.trim().to_string(),
            uri,
            title: track.name.trim().to_string(),
            artist,
            album: album.and_then(|a| non_blank(Some(&a.name))),
            duration_ms: track.duration_ms.filter(|ms| *ms > 0),
            year: album
                .and_then(|a| a.release_date.as_deref())
                .and_then(year_from_date),
            file_path: None,
            rating: None,
            added_at: track.added_at,
            metadata: serde_json::to_value(track)?,
        })
    }
}
