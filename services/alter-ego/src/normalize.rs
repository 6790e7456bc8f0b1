//!
//! src/normalize.rs
//!
//! Flattens raw top-track and play-history entries into TrackRecords
//!

use std::collections::HashSet;

use crate::types::{RawPlayEvent, RawTrack, TrackRecord};

/// Most records either list ever carries into the prompt
pub const MAX_TRACKS: usize = 10;

fn to_record(id: &str, track: &RawTrack, played_at: Option<&str>) -> TrackRecord {
    TrackRecord {
        id: id.to_string(),
        name: track.name.clone(),
        artists: track.artists.iter().map(|a| a.name.clone()).collect(),
        album: track.album.name.clone(),
        popularity: track.popularity,
        duration_ms: track.duration_ms,
        external_urls: track.external_urls.spotify.clone(),
        preview_url: track.preview_url.clone(),
        album_cover: track.album.images.first().map(|i| i.url.clone()),
        played_at: played_at.map(str::to_string)
    }
}

/// One record per entry with an id, first MAX_TRACKS, source order
pub fn normalize_top_tracks(raw: &[RawTrack]) -> Vec<TrackRecord> {
    raw.iter()
        .filter_map(|t| t.track_id().map(|id| to_record(id, t, None)))
        .take(MAX_TRACKS)
        .collect()
}

/// Dedupes play events by track id keeping the first (most recent) play,
/// stops at MAX_TRACKS unique records. Plays without an id (local files)
/// are skipped.
pub fn normalize_recent_tracks(raw: &[RawPlayEvent]) -> Vec<TrackRecord> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut unique = Vec::with_capacity(MAX_TRACKS);

    for event in raw {
        let Some(id) = event.track.track_id() else {
            continue;
        };
        if !seen.insert(id) {
            continue;
        }
        unique.push(to_record(id, &event.track, Some(&event.played_at)));
        if unique.len() >= MAX_TRACKS {
            break;
        }
    }
    unique
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{ExternalUrls, RawAlbum, RawArtist, RawImage};

    pub(crate) fn raw_track(id: &str, name: &str, artists: &[&str]) -> RawTrack {
        RawTrack {
            id: Some(id.to_string()),
            name: name.to_string(),
            artists: artists.iter().map(|a| RawArtist { name: a.to_string() }).collect(),
            album: RawAlbum { name: format!("{name} (album)"), images: vec![] },
            popularity: 50,
            duration_ms: 200_000,
            external_urls: ExternalUrls {
                spotify: format!("https://open.spotify.com/track/{id}")
            },
            preview_url: None
        }
    }

    pub(crate) fn play(id: &str, played_at: &str) -> RawPlayEvent {
        RawPlayEvent {
            track: raw_track(id, &format!("song {id}"), &["artist"]),
            played_at: played_at.to_string()
        }
    }

    #[test]
    fn top_tracks_keep_order_and_truncate() {
        let raw: Vec<RawTrack> = (0..14)
            .map(|i| raw_track(&format!("t{i}"), &format!("n{i}"), &["a"]))
            .collect();
        let out = normalize_top_tracks(&raw);
        assert_eq!(out.len(), MAX_TRACKS);
        for (i, rec) in out.iter().enumerate() {
            assert_eq!(rec.id, format!("t{i}"));
            assert!(rec.played_at.is_none());
        }
    }

    #[test]
    fn top_tracks_shorter_than_limit() {
        let raw = vec![raw_track("x", "X", &["A", "B"])];
        let out = normalize_top_tracks(&raw);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].artists, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(out[0].external_urls, "https://open.spotify.com/track/x");
    }

    #[test]
    fn album_cover_is_first_image_or_absent() {
        let mut with_art = raw_track("c", "Cover", &["A"]);
        with_art.album.images = vec![
            RawImage { url: "https://i.scdn.co/640".into(), width: Some(640), height: Some(640) },
            RawImage { url: "https://i.scdn.co/64".into(), width: Some(64), height: Some(64) },
        ];
        let bare = raw_track("d", "Bare", &["A"]);

        let out = normalize_top_tracks(&[with_art, bare]);
        assert_eq!(out[0].album_cover.as_deref(), Some("https://i.scdn.co/640"));
        assert!(out[1].album_cover.is_none());
    }

    #[test]
    fn recent_tracks_dedupe_keeping_first_play() {
        let raw = vec![
            play("a", "2025-09-13T10:00:00Z"),
            play("b", "2025-09-13T09:00:00Z"),
            play("a", "2025-09-13T08:00:00Z"),
            play("c", "2025-09-13T07:00:00Z"),
        ];
        let out = normalize_recent_tracks(&raw);
        let ids: Vec<&str> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(out[0].played_at.as_deref(), Some("2025-09-13T10:00:00Z"));
    }

    #[test]
    fn recent_tracks_skip_plays_without_id() {
        let mut local = play("", "2025-09-13T11:00:00Z");
        local.track.id = None;
        let raw = vec![
            local,
            play("", "2025-09-13T10:30:00Z"),
            play("a", "2025-09-13T10:00:00Z"),
        ];
        let out = normalize_recent_tracks(&raw);
        let ids: Vec<&str> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        assert_eq!(out[0].played_at.as_deref(), Some("2025-09-13T10:00:00Z"));
    }

    #[test]
    fn top_tracks_skip_entries_without_id() {
        let mut raw: Vec<RawTrack> = (0..11)
            .map(|i| raw_track(&format!("t{i}"), &format!("n{i}"), &["a"]))
            .collect();
        raw.insert(0, raw_track("", "blank", &["a"]));
        let out = normalize_top_tracks(&raw);
        assert_eq!(out.len(), MAX_TRACKS);
        assert_eq!(out[0].id, "t0");
        assert!(out.iter().all(|r| !r.id.is_empty()));
    }

    #[test]
    fn recent_tracks_stop_at_ten_unique() {
        // 50 plays cycling over 25 ids
        let raw: Vec<RawPlayEvent> = (0..50)
            .map(|i| play(&format!("id{}", i % 25), "2025-09-13T00:00:00Z"))
            .collect();
        let out = normalize_recent_tracks(&raw);
        assert_eq!(out.len(), MAX_TRACKS);

        let unique: HashSet<&str> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(unique.len(), out.len());
    }

    #[test]
    fn recent_tracks_never_exceed_input() {
        for n in 0..5 {
            let raw: Vec<RawPlayEvent> = (0..n)
                .map(|i| play(&format!("id{}", i % 2), "2025-09-13T00:00:00Z"))
                .collect();
            let out = normalize_recent_tracks(&raw);
            assert!(out.len() <= raw.len());
            assert!(out.len() <= MAX_TRACKS);
        }
    }
}
