//!
//! src/types.rs
//!
//! Raw Spotify payload shapes and the normalized records the
//! pipeline hands around
//!

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawArtist {
    pub name: String
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawImage {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAlbum {
    pub name: String,
    #[serde(default)]
    pub images: Vec<RawImage>
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalUrls {
    #[serde(default)]
    pub spotify: String
}

/// Track object as returned by /me/top/tracks and inside play history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTrack {
    /// null for local files in play history
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<RawArtist>,
    pub album: RawAlbum,
    #[serde(default)]
    pub popularity: i64,
    #[serde(default)]
    pub duration_ms: i64,
    #[serde(default)]
    pub external_urls: ExternalUrls,
    #[serde(default)]
    pub preview_url: Option<String>
}

impl RawTrack {
    /// Catalog id, if the entry has a usable one
    pub fn track_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Entry of /me/player/recently-played
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPlayEvent {
    pub track: RawTrack,
    pub played_at: String
}

/// Spotify wraps every list endpoint in a paging object
#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    pub items: Vec<T>
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Followers {
    #[serde(default)]
    pub total: u64
}

/// Subset of /me we surface
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUser {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub followers: Followers,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub images: Vec<RawImage>
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub followers: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>
}

impl From<RawUser> for UserProfile {
    fn from(user: RawUser) -> Self {
        let profile_image = user.images.into_iter().next().map(|i| i.url);
        Self {
            id: user.id,
            display_name: user.display_name,
            email: user.email,
            followers: user.followers.total,
            country: user.country,
            product: user.product,
            profile_image
        }
    }
}

/// One song, flattened out of the nested Spotify shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub album: String,
    pub popularity: i64,
    pub duration_ms: i64,
    pub external_urls: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub preview_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub album_cover: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub played_at: Option<String>
}

/// Everything one /character request produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    pub prompt: String,
    pub raw_response: String,
    pub character_description: String,
    pub image_prompt: String,
    pub formatted_prompt: String,
    pub image_url: String,
    pub username: String,
    /// set when the generator output was missing a section
    pub degraded: bool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_track_tolerates_missing_optionals() {
        let json = serde_json::json!({
            "id": "6GtOsEzNUhJghrIf6UTbRV",
            "name": "Breathe Deeper",
            "artists": [{ "name": "Tame Impala" }],
            "album": { "name": "The Slow Rush" },
            "popularity": 70,
            "duration_ms": 372000,
            "external_urls": { "spotify": "https://open.spotify.com/track/6GtOsEzNUhJghrIf6UTbRV" },
            "preview_url": null
        });
        let track: RawTrack = serde_json::from_value(json).unwrap();
        assert!(track.album.images.is_empty());
        assert!(track.preview_url.is_none());
        assert_eq!(track.artists[0].name, "Tame Impala");
    }

    #[test]
    fn local_file_plays_with_null_id_still_parse() {
        let json = serde_json::json!({ "items": [
            { "track": { "id": null, "name": "voice memo", "album": { "name": "" },
                         "external_urls": {} },
              "played_at": "2025-09-13T10:00:00Z" },
            { "track": { "id": "abc", "name": "Glue", "artists": [{ "name": "Bicep" }],
                         "album": { "name": "Bicep" } },
              "played_at": "2025-09-13T09:00:00Z" }
        ]});
        let page: Paging<RawPlayEvent> = serde_json::from_value(json).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].track.track_id(), None);
        assert_eq!(page.items[1].track.track_id(), Some("abc"));
    }

    #[test]
    fn empty_id_is_not_a_track_id() {
        let track = RawTrack { id: Some(String::new()), ..Default::default() };
        assert_eq!(track.track_id(), None);
    }

    #[test]
    fn user_profile_takes_first_image() {
        let raw: RawUser = serde_json::from_value(serde_json::json!({
            "id": "listener",
            "display_name": "Listener",
            "followers": { "total": 3 },
            "images": [{ "url": "https://i.scdn.co/a" }, { "url": "https://i.scdn.co/b" }]
        })).unwrap();
        let profile = UserProfile::from(raw);
        assert_eq!(profile.followers, 3);
        assert_eq!(profile.profile_image.as_deref(), Some("https://i.scdn.co/a"));

        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("email").is_none());
        assert!(json.get("country").is_none());
    }

    #[test]
    fn track_record_omits_absent_optionals() {
        let record = TrackRecord {
            id: "a".into(),
            name: "A".into(),
            artists: vec!["X".into()],
            album: "Album".into(),
            popularity: 1,
            duration_ms: 1000,
            external_urls: "https://open.spotify.com/track/a".into(),
            preview_url: None,
            album_cover: None,
            played_at: None
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("album_cover").is_none());
        assert!(json.get("played_at").is_none());
        assert!(json.get("preview_url").is_none());
        assert_eq!(json["artists"], serde_json::json!(["X"]));
    }
}
