//! Wire and domain types shared between the core and its collaborators.
//!
//! Field names follow the server's PascalCase JSON; every optional field has a
//! serde default so partial payloads (list queries return trimmed items)
//! still deserialize.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a browsable item as reported by the server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ItemKind {
    Movie,
    Episode,
    Series,
    Season,
    Audio,
    MusicAlbum,
    MusicVideo,
    Playlist,
    Video,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Kind of an elementary stream inside a variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    EmbeddedImage,
    Data,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct MediaStream {
    #[serde(rename = "Type", default)]
    pub kind: StreamKind,
    #[serde(default)]
    pub codec: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub display_title: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub channels: Option<u32>,
    #[serde(default)]
    pub bit_rate: Option<u64>,
    #[serde(default)]
    pub is_default: bool,
}

/// One playable representation of an item (a "media source" on the server).
///
/// Treated as immutable: a probe produces a fresh value and an item's variant
/// list is only ever replaced as a whole.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct MediaVariant {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub bitrate: Option<u64>,
    #[serde(default)]
    pub supports_direct_play: bool,
    #[serde(default)]
    pub supports_direct_stream: bool,
    #[serde(default)]
    pub supports_transcoding: bool,
    #[serde(default)]
    pub media_streams: Vec<MediaStream>,
}

impl MediaVariant {
    pub fn video_stream(&self) -> Option<&MediaStream> {
        self.media_streams
            .iter()
            .find(|s| s.kind == StreamKind::Video)
    }

    pub fn audio_stream_count(&self) -> usize {
        self.media_streams
            .iter()
            .filter(|s| s.kind == StreamKind::Audio)
            .count()
    }

    /// Short human label, e.g. `mkv 1920x1080 hevc, 2 audio`.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(container) = &self.container {
            parts.push(container.clone());
        }
        if let Some(video) = self.video_stream() {
            if let (Some(w), Some(h)) = (video.width, video.height) {
                parts.push(format!("{}x{}", w, h));
            }
            if let Some(codec) = &video.codec {
                parts.push(codec.clone());
            }
        }
        let mut label = if parts.is_empty() {
            self.name.clone().unwrap_or_else(|| self.id.clone())
        } else {
            parts.join(" ")
        };
        let audio = self.audio_stream_count();
        if audio > 0 {
            label.push_str(&format!(", {} audio", audio));
        }
        label
    }
}

/// A browsable library item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "Type", default)]
    pub kind: ItemKind,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub media_sources: Vec<MediaVariant>,
    #[serde(default)]
    pub premiere_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub critic_rating: Option<f32>,
    #[serde(default)]
    pub index_number: Option<u32>,
    #[serde(default)]
    pub run_time_ticks: Option<u64>,
}

impl Item {
    /// Return a copy of this item carrying `variants` as its variant list.
    pub fn with_variants(&self, variants: Vec<MediaVariant>) -> Self {
        Self {
            media_sources: variants,
            ..self.clone()
        }
    }

    pub fn variant_ids(&self) -> Vec<String> {
        self.media_sources.iter().map(|v| v.id.clone()).collect()
    }
}

/// Server-side sort key for container listings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    SortName,
    DateCreated,
    PremiereDate,
    CriticRating,
    AiredEpisodeOrder,
}

impl SortField {
    /// Value of the `sortBy` query parameter.
    pub fn as_api_str(self) -> &'static str {
        match self {
            SortField::SortName => "SortName",
            SortField::DateCreated => "DateCreated",
            SortField::PremiereDate => "PremiereDate",
            SortField::CriticRating => "CriticRating",
            SortField::AiredEpisodeOrder => "AiredEpisodeOrder",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// Value of the `sortOrder` query parameter.
    pub fn as_api_str(self) -> &'static str {
        match self {
            SortOrder::Ascending => "Ascending",
            SortOrder::Descending => "Descending",
        }
    }
}

// ── Playback capability descriptor ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DirectPlayProfile {
    pub container: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    #[serde(rename = "Type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct TranscodingProfile {
    pub container: String,
    pub video_codec: String,
    pub audio_codec: String,
    pub protocol: String,
    pub context: String,
    #[serde(rename = "Type")]
    pub kind: String,
}

/// Playback-capability descriptor sent with every probe so the server
/// reports streams as this client would play them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceProfile {
    pub name: String,
    pub max_streaming_bitrate: u64,
    pub max_static_bitrate: u64,
    pub direct_play_profiles: Vec<DirectPlayProfile>,
    pub transcoding_profiles: Vec<TranscodingProfile>,
}

// ── Server request / response bodies ─────────────────────────────────────────

/// Body of `POST /Items/{id}/PlaybackInfo`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackInfoRequest<'a> {
    pub user_id: &'a str,
    pub media_source_id: &'a str,
    pub max_streaming_bitrate: u64,
    pub device_profile: &'a DeviceProfile,
    pub enable_direct_play: bool,
    pub enable_direct_stream: bool,
    pub enable_transcoding: bool,
    pub auto_open_live_stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackInfoResponse {
    #[serde(default)]
    pub media_sources: Vec<MediaVariant>,
    #[serde(default)]
    pub play_session_id: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ItemsResult {
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub total_record_count: Option<u32>,
    #[serde(default)]
    pub start_index: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_deserializes_server_payload() {
        let json = serde_json::json!({
            "Id": "abc",
            "Name": "Some Film",
            "Type": "Movie",
            "PremiereDate": "2019-05-01T00:00:00.0000000Z",
            "MediaSources": [
                {
                    "Id": "v1",
                    "Container": "mkv",
                    "MediaStreams": [
                        { "Type": "Video", "Codec": "hevc", "Width": 3840, "Height": 2160 },
                        { "Type": "Audio", "Codec": "eac3", "Channels": 6 },
                        { "Type": "Audio", "Codec": "aac", "Channels": 2 },
                        { "Type": "Subtitle", "Codec": "srt" }
                    ]
                },
                { "Id": "v2", "Container": "mp4" }
            ]
        });
        let item: Item = serde_json::from_value(json).unwrap();
        assert_eq!(item.kind, ItemKind::Movie);
        assert_eq!(item.variant_ids(), vec!["v1", "v2"]);
        assert!(item.premiere_date.is_some());
        assert_eq!(item.media_sources[0].summary(), "mkv 3840x2160 hevc, 2 audio");
        assert_eq!(item.media_sources[1].summary(), "mp4");
    }

    #[test]
    fn test_unknown_kinds_fall_back() {
        let json = serde_json::json!({ "Id": "x", "Type": "BoxSet" });
        let item: Item = serde_json::from_value(json).unwrap();
        assert_eq!(item.kind, ItemKind::Unknown);
        assert!(item.media_sources.is_empty());
    }

    #[test]
    fn test_with_variants_replaces_whole_list() {
        let item = Item {
            id: "i".into(),
            media_sources: vec![
                MediaVariant { id: "a".into(), ..Default::default() },
                MediaVariant { id: "b".into(), ..Default::default() },
            ],
            ..Default::default()
        };
        let updated = item.with_variants(vec![MediaVariant {
            id: "b".into(),
            container: Some("mkv".into()),
            ..Default::default()
        }]);
        assert_eq!(updated.variant_ids(), vec!["b"]);
        assert_eq!(item.variant_ids(), vec!["a", "b"]);
        assert_eq!(updated.id, item.id);
    }

    #[test]
    fn test_playback_info_request_shape() {
        let profile = DeviceProfile {
            name: "test".into(),
            max_streaming_bitrate: 1,
            ..Default::default()
        };
        let body = PlaybackInfoRequest {
            user_id: "u",
            media_source_id: "v1",
            max_streaming_bitrate: 1,
            device_profile: &profile,
            enable_direct_play: true,
            enable_direct_stream: true,
            enable_transcoding: true,
            auto_open_live_stream: false,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["MediaSourceId"], "v1");
        assert_eq!(value["DeviceProfile"]["Name"], "test");
    }
}
