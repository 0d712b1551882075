#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use browse_core::client::{ClientError, LibraryClient, PlaylistQuery, ProbeOutcome};
use browse_core::core::{BrowseCore, CoreEvent};
use browse_core::surface::PresentationSurface;
use browse_proto::config::Config;
use browse_proto::protocol::{DeviceProfile, Item, MediaVariant};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// ── Fixtures ──────────────────────────────────────────────────────────────────

pub fn variant(id: &str) -> MediaVariant {
    MediaVariant {
        id: id.to_string(),
        ..Default::default()
    }
}

pub fn probed(id: &str, container: &str) -> MediaVariant {
    MediaVariant {
        id: id.to_string(),
        container: Some(container.to_string()),
        ..Default::default()
    }
}

pub fn item(id: &str, variants: &[&str]) -> Item {
    Item {
        id: id.to_string(),
        name: format!("Item {}", id),
        media_sources: variants.iter().map(|v| variant(v)).collect(),
        ..Default::default()
    }
}

pub fn entries(n: usize) -> Vec<Item> {
    (0..n)
        .map(|i| Item {
            id: format!("e{}", i),
            name: format!("Entry {}", i),
            ..Default::default()
        })
        .collect()
}

// ── FakeClient ────────────────────────────────────────────────────────────────

/// What one probe request answers, after an optional delay.
#[derive(Debug, Clone)]
pub enum ProbeScript {
    Ok(MediaVariant),
    ErrorCode(String),
    Missing,
    ServerError,
}

/// Scripted in-memory library.
#[derive(Default)]
pub struct FakeClient {
    items: Mutex<HashMap<String, Item>>,
    probes: Mutex<HashMap<String, (Duration, ProbeScript)>>,
    /// Everything the "server" has for the browsed container.
    listing: Mutex<Vec<Item>>,
    /// How much of `listing` an unlimited request returns.
    full_fetch_cap: Mutex<Option<usize>>,
    playlist_failures: AtomicUsize,
    queries: Mutex<Vec<PlaylistQuery>>,
    probe_calls: AtomicUsize,
    item_calls: AtomicUsize,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(self, item: Item) -> Self {
        self.items.lock().unwrap().insert(item.id.clone(), item);
        self
    }

    pub fn with_probe(self, variant_id: &str, delay: Duration, script: ProbeScript) -> Self {
        self.probes
            .lock()
            .unwrap()
            .insert(variant_id.to_string(), (delay, script));
        self
    }

    pub fn with_listing(self, listing: Vec<Item>, full_fetch_cap: Option<usize>) -> Self {
        *self.listing.lock().unwrap() = listing;
        *self.full_fetch_cap.lock().unwrap() = full_fetch_cap;
        self
    }

    /// Fail the next `n` playlist requests with a 500.
    pub fn fail_next_playlists(&self, n: usize) {
        self.playlist_failures.store(n, Ordering::SeqCst);
    }

    pub fn queries(&self) -> Vec<PlaylistQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn item_calls(&self) -> usize {
        self.item_calls.load(Ordering::SeqCst)
    }

    fn server_error() -> ClientError {
        ClientError::Status {
            status: 500,
            message: "scripted failure".into(),
        }
    }
}

impl LibraryClient for FakeClient {
    fn fetch_item<'a>(&'a self, item_id: &'a str) -> BoxFuture<'a, Result<Item, ClientError>> {
        self.item_calls.fetch_add(1, Ordering::SeqCst);
        let found = self.items.lock().unwrap().get(item_id).cloned();
        async move { found.ok_or_else(|| ClientError::NotFound(item_id.to_string())) }.boxed()
    }

    fn probe_variant<'a>(
        &'a self,
        _item_id: &'a str,
        variant_id: &'a str,
        _profile: &'a DeviceProfile,
    ) -> BoxFuture<'a, Result<ProbeOutcome, ClientError>> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.probes.lock().unwrap().get(variant_id).cloned();
        async move {
            let Some((delay, script)) = scripted else {
                return Ok(ProbeOutcome::Missing);
            };
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match script {
                ProbeScript::Ok(v) => Ok(ProbeOutcome::Probed(v)),
                ProbeScript::ErrorCode(code) => Ok(ProbeOutcome::Failed(code)),
                ProbeScript::Missing => Ok(ProbeOutcome::Missing),
                ProbeScript::ServerError => Err(Self::server_error()),
            }
        }
        .boxed()
    }

    fn fetch_playlist<'a>(
        &'a self,
        query: &'a PlaylistQuery,
    ) -> BoxFuture<'a, Result<Vec<Item>, ClientError>> {
        self.queries.lock().unwrap().push(query.clone());
        let failed = self
            .playlist_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let listing = self.listing.lock().unwrap().clone();
        let cap = self.full_fetch_cap.lock().unwrap().unwrap_or(listing.len());
        async move {
            if failed {
                return Err(Self::server_error());
            }
            let end = match query.limit {
                Some(limit) => query.offset + limit,
                None => cap,
            };
            let end = end.min(listing.len());
            let start = query.offset.min(end);
            Ok(listing[start..end].to_vec())
        }
        .boxed()
    }
}

// ── RecordingSurface ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Pushed {
    Item(Item),
    Reveal { start: usize, ids: Vec<String> },
    Busy(bool),
}

#[derive(Default)]
pub struct RecordingSurface {
    pushed: Mutex<Vec<Pushed>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pushed(&self) -> Vec<Pushed> {
        self.pushed.lock().unwrap().clone()
    }

    pub fn items(&self) -> Vec<Item> {
        self.pushed()
            .into_iter()
            .filter_map(|p| match p {
                Pushed::Item(item) => Some(item),
                _ => None,
            })
            .collect()
    }

    /// `(start_index, len)` of every reveal, in order.
    pub fn reveals(&self) -> Vec<(usize, usize)> {
        self.pushed()
            .into_iter()
            .filter_map(|p| match p {
                Pushed::Reveal { start, ids } => Some((start, ids.len())),
                _ => None,
            })
            .collect()
    }

    /// Ids in display order, as assembled from the reveals.
    pub fn revealed_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for p in self.pushed() {
            if let Pushed::Reveal { start, ids: slice } = p {
                ids.truncate(start);
                ids.extend(slice);
            }
        }
        ids
    }

    pub fn busy(&self) -> Vec<bool> {
        self.pushed()
            .into_iter()
            .filter_map(|p| match p {
                Pushed::Busy(v) => Some(v),
                _ => None,
            })
            .collect()
    }
}

impl PresentationSurface for RecordingSurface {
    fn publish_item_update(&self, item: &Item) {
        self.pushed.lock().unwrap().push(Pushed::Item(item.clone()));
    }

    fn reveal_entries(&self, slice: &[Item], start_index: usize) {
        self.pushed.lock().unwrap().push(Pushed::Reveal {
            start: start_index,
            ids: slice.iter().map(|i| i.id.clone()).collect(),
        });
    }

    fn set_busy_visible(&self, visible: bool) {
        self.pushed.lock().unwrap().push(Pushed::Busy(visible));
    }
}

// ── Core harness ──────────────────────────────────────────────────────────────

pub struct Running {
    pub tx: mpsc::Sender<CoreEvent>,
    pub surface: Arc<RecordingSurface>,
    pub task: JoinHandle<()>,
}

impl Running {
    pub async fn send(&self, evt: CoreEvent) {
        self.tx.send(evt).await.unwrap();
    }

    pub async fn shutdown(self) {
        self.tx.send(CoreEvent::Shutdown).await.unwrap();
        self.task.await.unwrap();
    }
}

/// Start a core over `client` with default config.
pub fn spawn_core(client: Arc<FakeClient>) -> Running {
    let surface = Arc::new(RecordingSurface::new());
    let (tx, rx) = mpsc::channel(256);
    let core = BrowseCore::new(&Config::default(), client, surface.clone(), tx.clone());
    let task = tokio::spawn(async move {
        core.run(rx).await.unwrap();
    });
    Running { tx, surface, task }
}

pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
