use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::platform;
use crate::protocol::{DeviceProfile, DirectPlayProfile, SortField, SortOrder, TranscodingProfile};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub browse: BrowseConfig,
}

/// Where the media library lives and how to talk to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API key sent as `X-Emby-Token`.
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Progressive list reveal tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoaderConfig {
    /// Entries revealed synchronously when a list arrives.
    #[serde(default = "default_initial_batch_size")]
    pub initial_batch_size: usize,
    /// Entries revealed per deferred step, and page size for "load more".
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Delay between deferred reveal steps.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Minimum spacing between accepted scroll-to-bottom triggers.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

/// Capabilities advertised when probing variants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeConfig {
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default = "default_max_streaming_bitrate")]
    pub max_streaming_bitrate: u64,
    #[serde(default = "default_containers")]
    pub containers: Vec<String>,
    #[serde(default = "default_video_codecs")]
    pub video_codecs: Vec<String>,
    #[serde(default = "default_audio_codecs")]
    pub audio_codecs: Vec<String>,
}

/// Initial sort for container listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BrowseConfig {
    #[serde(default)]
    pub sort_by: SortField,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            user_id: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            initial_batch_size: default_initial_batch_size(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            max_streaming_bitrate: default_max_streaming_bitrate(),
            containers: default_containers(),
            video_codecs: default_video_codecs(),
            audio_codecs: default_audio_codecs(),
        }
    }
}

impl ProbeConfig {
    /// Build the capability descriptor sent with each probe.
    pub fn device_profile(&self) -> DeviceProfile {
        let video_codecs = self.video_codecs.join(",");
        let audio_codecs = self.audio_codecs.join(",");
        let direct_play_profiles = self
            .containers
            .iter()
            .map(|container| DirectPlayProfile {
                container: container.clone(),
                video_codec: Some(video_codecs.clone()),
                audio_codec: Some(audio_codecs.clone()),
                kind: "Video".to_string(),
            })
            .collect();
        DeviceProfile {
            name: self.device_name.clone(),
            max_streaming_bitrate: self.max_streaming_bitrate,
            max_static_bitrate: self.max_streaming_bitrate,
            direct_play_profiles,
            transcoding_profiles: vec![TranscodingProfile {
                container: "ts".to_string(),
                video_codec: self
                    .video_codecs
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "h264".to_string()),
                audio_codec: self
                    .audio_codecs
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "aac".to_string()),
                protocol: "hls".to_string(),
                context: "Streaming".to_string(),
                kind: "Video".to_string(),
            }],
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8096".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_initial_batch_size() -> usize {
    15
}

fn default_batch_size() -> usize {
    25
}

fn default_batch_delay_ms() -> u64 {
    200
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_device_name() -> String {
    "mediabrowse".to_string()
}

fn default_max_streaming_bitrate() -> u64 {
    120_000_000
}

fn default_containers() -> Vec<String> {
    ["mkv", "mp4", "m4v", "webm", "ts", "mov"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_video_codecs() -> Vec<String> {
    ["h264", "hevc", "vp9", "av1"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_audio_codecs() -> Vec<String> {
    ["aac", "ac3", "eac3", "mp3", "opus", "flac", "truehd", "dts"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`, writing defaults there first if nothing exists yet.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
