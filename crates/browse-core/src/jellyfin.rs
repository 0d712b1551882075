//! HTTP library client for Jellyfin-compatible servers.

use std::time::Duration;

use browse_proto::config::ServerConfig;
use browse_proto::protocol::{DeviceProfile, Item, ItemsResult, PlaybackInfoRequest, PlaybackInfoResponse};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::client::{ClientError, LibraryClient, PlaylistQuery, ProbeOutcome};

const TOKEN_HEADER: &str = "X-Emby-Token";
const LIST_FIELDS: &str = "MediaSources,DateCreated,PremiereDate,CriticRating";

pub struct JellyfinClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    user_id: String,
}

impl JellyfinClient {
    pub fn new(config: &ServerConfig) -> Result<Self, ClientError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidUrl(config.base_url.clone()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.clone(),
            user_id: config.user_id.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        let req = req.header("Accept", "application/json");
        if self.api_key.is_empty() {
            req
        } else {
            req.header(TOKEN_HEADER, &self.api_key)
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        not_found_id: &str,
    ) -> Result<T, ClientError> {
        let response = self.authed(req).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(not_found_id.to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn get_item(&self, item_id: &str) -> Result<Item, ClientError> {
        let url = self.endpoint(&format!("Users/{}/Items/{}", self.user_id, item_id));
        debug!("jellyfin: GET {}", url);
        self.send_json(self.http.get(url), item_id).await
    }

    async fn post_playback_info(
        &self,
        item_id: &str,
        variant_id: &str,
        profile: &DeviceProfile,
    ) -> Result<ProbeOutcome, ClientError> {
        let url = self.endpoint(&format!("Items/{}/PlaybackInfo", item_id));
        debug!("jellyfin: POST {} (source {})", url, variant_id);
        let body = PlaybackInfoRequest {
            user_id: &self.user_id,
            media_source_id: variant_id,
            max_streaming_bitrate: profile.max_streaming_bitrate,
            device_profile: profile,
            enable_direct_play: true,
            enable_direct_stream: true,
            enable_transcoding: true,
            auto_open_live_stream: false,
        };
        let req = self
            .http
            .post(url)
            .query(&[("userId", self.user_id.as_str()), ("mediaSourceId", variant_id)])
            .json(&body);
        let response: PlaybackInfoResponse = self.send_json(req, item_id).await?;
        Ok(ProbeOutcome::from_playback_info(response, variant_id))
    }

    async fn list_children(&self, query: &PlaylistQuery) -> Result<Vec<Item>, ClientError> {
        let url = self.endpoint(&format!("Users/{}/Items", self.user_id));
        let mut params = vec![
            ("ParentId", query.container_id.clone()),
            ("SortBy", query.sort_by.as_api_str().to_string()),
            ("SortOrder", query.sort_order.as_api_str().to_string()),
            ("StartIndex", query.offset.to_string()),
            ("Fields", LIST_FIELDS.to_string()),
        ];
        if let Some(limit) = query.limit {
            params.push(("Limit", limit.to_string()));
        }
        debug!(
            "jellyfin: GET {} parent={} offset={} limit={:?}",
            url, query.container_id, query.offset, query.limit
        );
        let result: ItemsResult = self
            .send_json(self.http.get(url).query(&params), &query.container_id)
            .await?;
        Ok(result.items)
    }
}

impl LibraryClient for JellyfinClient {
    fn fetch_item<'a>(&'a self, item_id: &'a str) -> BoxFuture<'a, Result<Item, ClientError>> {
        self.get_item(item_id).boxed()
    }

    fn probe_variant<'a>(
        &'a self,
        item_id: &'a str,
        variant_id: &'a str,
        profile: &'a DeviceProfile,
    ) -> BoxFuture<'a, Result<ProbeOutcome, ClientError>> {
        self.post_playback_info(item_id, variant_id, profile).boxed()
    }

    fn fetch_playlist<'a>(
        &'a self,
        query: &'a PlaylistQuery,
    ) -> BoxFuture<'a, Result<Vec<Item>, ClientError>> {
        self.list_children(query).boxed()
    }
}
