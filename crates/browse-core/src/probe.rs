//! Fan-out/fan-in refresh of an item's variants.
//!
//! For an item with more than one variant, one probe per variant is spawned
//! against the library client.  Every probe ends in exactly one barrier
//! signal (success, server error, missing variant, transport failure or view
//! cancellation all count), so the session always finalizes.  The finalizer
//! only *reports* the merged set; [`apply_probe`] decides, on the owning
//! context, whether that report still applies to what is on screen.

use std::sync::Arc;

use browse_proto::protocol::{DeviceProfile, Item, MediaVariant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::barrier::CompletionBarrier;
use crate::client::{ClientError, LibraryClient, ProbeOutcome};
use crate::lifecycle::LifecycleGuard;
use crate::surface::PresentationSurface;

/// The item currently on screen plus a revision bumped on every replacement.
///
/// `(id, rev)` identifies "the same item as when the probe started"; a reload
/// of the same id still gets a new revision.
#[derive(Debug, Default)]
pub struct CurrentItem {
    rev: u64,
    item: Option<Item>,
}

impl CurrentItem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rev(&self) -> u64 {
        self.rev
    }

    pub fn item(&self) -> Option<&Item> {
        self.item.as_ref()
    }

    /// Swap in a new item and return its revision.
    pub fn replace(&mut self, item: Item) -> u64 {
        self.rev += 1;
        self.item = Some(item);
        self.rev
    }

    pub fn clear(&mut self) {
        self.rev += 1;
        self.item = None;
    }

    pub fn matches(&self, item_id: &str, rev: u64) -> bool {
        self.rev == rev && self.item.as_ref().is_some_and(|i| i.id == item_id)
    }
}

/// Descriptor of a running probe session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSession {
    pub item_id: String,
    pub rev: u64,
    pub expected: usize,
}

/// Report produced once all probes of a session have completed.
#[derive(Debug, Clone)]
pub struct ProbeFinished {
    pub item_id: String,
    pub rev: u64,
    pub expected: usize,
    pub variants: Vec<MediaVariant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeApplied {
    /// Variant list replaced with this many probed variants and published.
    Updated(usize),
    /// Nothing probed successfully; item left as it was.
    Empty,
    /// The item changed while probing; report dropped.
    Stale,
    /// The view is gone; report dropped.
    Inactive,
}

pub struct ProbeCoordinator {
    client: Arc<dyn LibraryClient>,
    profile: Arc<DeviceProfile>,
}

impl ProbeCoordinator {
    pub fn new(client: Arc<dyn LibraryClient>, profile: DeviceProfile) -> Self {
        Self {
            client,
            profile: Arc::new(profile),
        }
    }

    /// Start probing every variant of the current item.
    ///
    /// Returns immediately.  `on_finish` runs exactly once, on whichever task
    /// delivers the last completion.  Items with fewer than two variants are
    /// not probed and `None` is returned.
    pub fn probe_all<F>(
        &self,
        current: &CurrentItem,
        cancel: CancellationToken,
        on_finish: F,
    ) -> Option<ProbeSession>
    where
        F: FnOnce(ProbeFinished) + Send + 'static,
    {
        let item = current.item()?;
        let expected = item.media_sources.len();
        if expected <= 1 {
            debug!("probe: skipping {} ({} variant(s))", item.id, expected);
            return None;
        }

        let session = ProbeSession {
            item_id: item.id.clone(),
            rev: current.rev(),
            expected,
        };
        let report = session.clone();
        let barrier = match CompletionBarrier::new(expected, move |variants| {
            on_finish(ProbeFinished {
                item_id: report.item_id,
                rev: report.rev,
                expected: report.expected,
                variants,
            })
        }) {
            Ok(b) => Arc::new(b),
            Err(e) => {
                error!("probe: {}", e);
                return None;
            }
        };

        info!("probe: starting {} probes for {}", expected, item.id);
        for variant_id in item.variant_ids() {
            let client = Arc::clone(&self.client);
            let profile = Arc::clone(&self.profile);
            let barrier = Arc::clone(&barrier);
            let cancel = cancel.clone();
            let item_id = item.id.clone();
            tokio::spawn(async move {
                let result = tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("probe: {} abandoned, view closed", variant_id);
                        None
                    }
                    outcome = client.probe_variant(&item_id, &variant_id, &profile) => {
                        interpret(&variant_id, outcome)
                    }
                };
                let signal = barrier.signal(result);
                debug!(
                    "probe: {} done ({}/{}) {:?}",
                    variant_id,
                    barrier.completed(),
                    barrier.expected(),
                    signal
                );
            });
        }
        Some(session)
    }
}

fn interpret(variant_id: &str, outcome: Result<ProbeOutcome, ClientError>) -> Option<MediaVariant> {
    match outcome {
        Ok(ProbeOutcome::Probed(variant)) => {
            debug!("probe: refreshed source {}", variant_id);
            Some(variant)
        }
        Ok(ProbeOutcome::Failed(code)) => {
            warn!("probe: playback info error for source {}: {}", variant_id, code);
            None
        }
        Ok(ProbeOutcome::Missing) => {
            warn!("probe: source {} not found in response", variant_id);
            None
        }
        Err(e) => {
            warn!("probe: request for source {} failed: {}", variant_id, e);
            None
        }
    }
}

/// Apply a finished probe session to the current item.
///
/// Staleness is checked first: a report for an older revision never touches
/// the screen.  The merged variants are kept in the item's original variant
/// order so repeated probes render identically.
pub fn apply_probe(
    current: &mut CurrentItem,
    finished: ProbeFinished,
    surface: &dyn PresentationSurface,
    guard: &dyn LifecycleGuard,
) -> ProbeApplied {
    if !current.matches(&finished.item_id, finished.rev) {
        info!(
            "probe: dropping stale result for {} rev {} (current rev {})",
            finished.item_id,
            finished.rev,
            current.rev()
        );
        return ProbeApplied::Stale;
    }
    if !guard.is_active() {
        debug!("probe: view inactive, dropping result for {}", finished.item_id);
        return ProbeApplied::Inactive;
    }
    let Some(item) = current.item.as_mut() else {
        return ProbeApplied::Stale;
    };
    if finished.variants.is_empty() {
        warn!(
            "probe: no sources of {} probed successfully, keeping {} original",
            item.id,
            item.media_sources.len()
        );
        return ProbeApplied::Empty;
    }

    let order = item.variant_ids();
    let mut variants = finished.variants;
    variants.sort_by_key(|v| order.iter().position(|id| *id == v.id).unwrap_or(usize::MAX));
    let count = variants.len();
    *item = item.with_variants(variants);
    info!(
        "probe: {}/{} sources of {} probed with stream info",
        count, finished.expected, item.id
    );
    surface.publish_item_update(item);
    ProbeApplied::Updated(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Published(Mutex<Vec<Item>>);

    impl PresentationSurface for Published {
        fn publish_item_update(&self, item: &Item) {
            self.0.lock().unwrap().push(item.clone());
        }
        fn reveal_entries(&self, _slice: &[Item], _start_index: usize) {}
        fn set_busy_visible(&self, _visible: bool) {}
    }

    fn variant(id: &str, container: Option<&str>) -> MediaVariant {
        MediaVariant {
            id: id.into(),
            container: container.map(str::to_string),
            ..Default::default()
        }
    }

    fn item(id: &str, variants: &[&str]) -> Item {
        Item {
            id: id.into(),
            media_sources: variants.iter().map(|v| variant(v, None)).collect(),
            ..Default::default()
        }
    }

    fn finished(item_id: &str, rev: u64, variants: Vec<MediaVariant>) -> ProbeFinished {
        ProbeFinished {
            item_id: item_id.into(),
            rev,
            expected: 3,
            variants,
        }
    }

    #[test]
    fn test_merged_set_keeps_original_order() {
        let mut current = CurrentItem::new();
        let rev = current.replace(item("a", &["v1", "v2", "v3"]));
        let surface = Published::default();

        let applied = apply_probe(
            &mut current,
            finished("a", rev, vec![variant("v3", Some("mp4")), variant("v1", Some("mkv"))]),
            &surface,
            &|| true,
        );

        assert_eq!(applied, ProbeApplied::Updated(2));
        assert_eq!(current.item().unwrap().variant_ids(), vec!["v1", "v3"]);
        let published = surface.0.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].media_sources[0].container.as_deref(), Some("mkv"));
    }

    #[test]
    fn test_empty_result_leaves_item_untouched() {
        let mut current = CurrentItem::new();
        let rev = current.replace(item("a", &["v1", "v2", "v3"]));
        let surface = Published::default();

        let applied = apply_probe(&mut current, finished("a", rev, vec![]), &surface, &|| true);

        assert_eq!(applied, ProbeApplied::Empty);
        assert_eq!(current.item().unwrap().variant_ids(), vec!["v1", "v2", "v3"]);
        assert!(surface.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_reload_of_same_id_makes_report_stale() {
        let mut current = CurrentItem::new();
        let old_rev = current.replace(item("a", &["v1", "v2"]));
        current.replace(item("a", &["v1", "v2", "v4"]));
        let surface = Published::default();

        let applied = apply_probe(
            &mut current,
            finished("a", old_rev, vec![variant("v1", None)]),
            &surface,
            &|| true,
        );

        assert_eq!(applied, ProbeApplied::Stale);
        assert_eq!(current.item().unwrap().variant_ids(), vec!["v1", "v2", "v4"]);
        assert!(surface.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_inactive_view_drops_report() {
        let mut current = CurrentItem::new();
        let rev = current.replace(item("a", &["v1", "v2"]));
        let surface = Published::default();

        let applied = apply_probe(
            &mut current,
            finished("a", rev, vec![variant("v1", None)]),
            &surface,
            &|| false,
        );

        assert_eq!(applied, ProbeApplied::Inactive);
        assert!(surface.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_single_variant_is_not_probed() {
        let client: Arc<dyn LibraryClient> = Arc::new(Unreachable);
        let coordinator = ProbeCoordinator::new(client, DeviceProfile::default());
        let mut current = CurrentItem::new();
        current.replace(item("a", &["only"]));
        let session = coordinator.probe_all(&current, CancellationToken::new(), |_| {
            panic!("must not finalize")
        });
        assert!(session.is_none());
    }

    struct Unreachable;

    impl LibraryClient for Unreachable {
        fn fetch_item<'a>(
            &'a self,
            _item_id: &'a str,
        ) -> futures_util::future::BoxFuture<'a, Result<Item, ClientError>> {
            unreachable!()
        }
        fn probe_variant<'a>(
            &'a self,
            _item_id: &'a str,
            _variant_id: &'a str,
            _profile: &'a DeviceProfile,
        ) -> futures_util::future::BoxFuture<'a, Result<ProbeOutcome, ClientError>> {
            unreachable!()
        }
        fn fetch_playlist<'a>(
            &'a self,
            _query: &'a crate::client::PlaylistQuery,
        ) -> futures_util::future::BoxFuture<'a, Result<Vec<Item>, ClientError>> {
            unreachable!()
        }
    }
}
