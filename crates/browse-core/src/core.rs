/// BrowseCore: single-owner event loop for all UI-bound state.
///
/// The core owns the current item, the batch loader and the busy counter
/// exclusively.  Library requests, probe sessions and deferred batch steps run
/// as background tasks and only ever report back by sending a `CoreEvent`
/// into this loop, so every mutation happens in one place and in event order.
///
/// Everything the view should show is pushed through the
/// `PresentationSurface`; nothing is read back from it.
use std::collections::HashMap;
use std::sync::Arc;

use browse_proto::config::Config;
use browse_proto::protocol::Item;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::busy::{BusyCounter, BusyTicket};
use crate::client::{ClientError, LibraryClient};
use crate::lifecycle::{LifecycleGuard, ViewLifecycle};
use crate::loader::{BatchLoader, LoadContext, LoaderSettings, PageRequest, Step};
use crate::probe::{self, apply_probe, CurrentItem, ProbeApplied, ProbeCoordinator};
use crate::sort::{SortSelection, SortSpec};
use crate::surface::PresentationSurface;

// ── CoreEvent ─────────────────────────────────────────────────────────────────

/// All inputs into the BrowseCore loop.
#[derive(Debug)]
pub enum CoreEvent {
    /// Show an item and refresh its variants.
    OpenItem(String),
    /// Fetch the current item again (new revision).
    ReloadItem,
    ItemFetched {
        seq: u64,
        result: Result<Item, ClientError>,
    },
    /// Every probe of a session has reported.
    ProbeFinished(probe::ProbeFinished),
    /// Browse a container.  `sort` overrides the current sort.
    OpenPlaylist {
        container_id: String,
        sort: Option<SortSpec>,
    },
    ChangeSort(SortSelection),
    ListFetched {
        cycle: u64,
        result: Result<Vec<Item>, ClientError>,
    },
    /// A deferred reveal step came due.
    BatchTick { cycle: u64 },
    /// The view scrolled to the end of what is shown.
    ScrolledToBottom,
    PageFetched {
        cycle: u64,
        result: Result<Vec<Item>, ClientError>,
    },
    /// The owning view went away.
    ViewClosed,
    Shutdown,
}

// ── BrowseCore ────────────────────────────────────────────────────────────────

pub struct BrowseCore {
    client: Arc<dyn LibraryClient>,
    probes: ProbeCoordinator,
    surface: Arc<dyn PresentationSurface>,
    lifecycle: ViewLifecycle,
    busy: BusyCounter,
    current: CurrentItem,
    loader: BatchLoader,
    sort: SortSpec,
    /// Channel background tasks use to report back into our own loop.
    event_tx: mpsc::Sender<CoreEvent>,
    /// Sleep task for the next reveal step, if one is scheduled.
    pending_tick: Option<AbortHandle>,
    /// Sequence number of the newest item fetch.
    item_seq: u64,
    /// Busy ticket of the in-flight item fetch, tagged with its sequence.
    item_fetch: Option<(u64, BusyTicket)>,
    /// One busy ticket per running probe session, keyed by item revision.
    probe_tickets: HashMap<u64, BusyTicket>,
}

impl BrowseCore {
    pub fn new(
        config: &Config,
        client: Arc<dyn LibraryClient>,
        surface: Arc<dyn PresentationSurface>,
        event_tx: mpsc::Sender<CoreEvent>,
    ) -> Self {
        let probes = ProbeCoordinator::new(Arc::clone(&client), config.probe.device_profile());
        Self {
            client,
            probes,
            surface,
            lifecycle: ViewLifecycle::new(),
            busy: BusyCounter::new(),
            current: CurrentItem::new(),
            loader: BatchLoader::new(LoaderSettings::from(&config.loader)),
            sort: SortSpec::from(&config.browse),
            event_tx,
            pending_tick: None,
            item_seq: 0,
            item_fetch: None,
            probe_tickets: HashMap::new(),
        }
    }

    /// Lifecycle handle of the view this core feeds.
    pub fn lifecycle(&self) -> ViewLifecycle {
        self.lifecycle.clone()
    }

    /// Run the core event loop.  Returns when a `Shutdown` event is received
    /// or every sender has been dropped.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<CoreEvent>) -> anyhow::Result<()> {
        info!("BrowseCore: starting event loop");

        loop {
            let evt = event_rx.recv().await;
            match evt {
                None => {
                    info!("BrowseCore: event channel closed, shutting down");
                    break;
                }

                Some(CoreEvent::Shutdown) => {
                    info!("BrowseCore: shutdown requested");
                    break;
                }

                Some(evt) => self.handle_event(evt),
            }
        }

        self.cleanup();
        Ok(())
    }

    fn handle_event(&mut self, evt: CoreEvent) {
        match evt {
            CoreEvent::OpenItem(item_id) => {
                info!("BrowseCore: open item {}", item_id);
                self.fetch_item(item_id);
            }

            CoreEvent::ReloadItem => match self.current.item() {
                Some(item) => {
                    let item_id = item.id.clone();
                    info!("BrowseCore: reload item {}", item_id);
                    self.fetch_item(item_id);
                }
                None => debug!("BrowseCore: reload with no current item"),
            },

            CoreEvent::ItemFetched { seq, result } => self.on_item_fetched(seq, result),

            CoreEvent::ProbeFinished(finished) => self.on_probe_finished(finished),

            CoreEvent::OpenPlaylist { container_id, sort } => {
                if let Some(sort) = sort {
                    self.sort = sort;
                }
                info!(
                    "BrowseCore: open playlist {} sorted {}",
                    container_id,
                    self.sort.label()
                );
                self.start_cycle(&container_id);
            }

            CoreEvent::ChangeSort(selection) => {
                let reload = self.sort.apply(selection);
                info!(
                    "BrowseCore: sort now {} (reload: {})",
                    self.sort.label(),
                    reload
                );
                if reload {
                    if let Some(container_id) = self.loader.container_id().map(str::to_string) {
                        self.start_cycle(&container_id);
                    }
                }
            }

            CoreEvent::ListFetched { cycle, result } => {
                let step = self.with_loader(|loader, ctx| loader.on_list_fetched(cycle, result, ctx));
                self.follow(step);
            }

            CoreEvent::BatchTick { cycle } => {
                if cycle == self.loader.cycle() {
                    self.pending_tick = None;
                }
                let step = self.with_loader(|loader, ctx| loader.on_batch_tick(cycle, ctx));
                self.follow(step);
            }

            CoreEvent::ScrolledToBottom => {
                let now = Instant::now();
                let step = self.with_loader(|loader, ctx| loader.on_scrolled_to_bottom(now, ctx));
                self.follow(step);
            }

            CoreEvent::PageFetched { cycle, result } => {
                let step = self.with_loader(|loader, ctx| loader.on_page_fetched(cycle, result, ctx));
                self.follow(step);
            }

            CoreEvent::ViewClosed => {
                info!("BrowseCore: view closed");
                self.close_view();
            }

            CoreEvent::Shutdown => {}
        }
    }

    // ── Item + probes ─────────────────────────────────────────────────────────

    fn fetch_item(&mut self, item_id: String) {
        if !self.lifecycle.is_active() {
            debug!("BrowseCore: view closed, not fetching {}", item_id);
            return;
        }
        // A newer request supersedes whatever is still in flight.
        if let Some((seq, ticket)) = self.item_fetch.take() {
            debug!("BrowseCore: item fetch {} superseded", seq);
            self.leave(ticket);
        }
        self.item_seq += 1;
        let seq = self.item_seq;
        let ticket = self.enter("item fetch");
        self.item_fetch = Some((seq, ticket));

        let client = Arc::clone(&self.client);
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = client.fetch_item(&item_id).await;
            if tx.send(CoreEvent::ItemFetched { seq, result }).await.is_err() {
                debug!("BrowseCore: gone before item {} arrived", item_id);
            }
        });
    }

    fn on_item_fetched(&mut self, seq: u64, result: Result<Item, ClientError>) {
        let ticket = match self.item_fetch.take() {
            Some((current, ticket)) if current == seq => ticket,
            other => {
                self.item_fetch = other;
                debug!("BrowseCore: dropping superseded item fetch {}", seq);
                return;
            }
        };

        match result {
            Err(e) => warn!("BrowseCore: item fetch failed: {}", e),
            Ok(_) if !self.lifecycle.is_active() => {
                debug!("BrowseCore: view closed, dropping fetched item");
            }
            Ok(item) => {
                let rev = self.current.replace(item);
                if let Some(item) = self.current.item() {
                    info!(
                        "BrowseCore: showing {} rev {} ({} variants)",
                        item.id,
                        rev,
                        item.media_sources.len()
                    );
                    self.surface.publish_item_update(item);
                }
                // Enter before leaving the fetch ticket so the indicator
                // stays up across the hand-over.
                self.start_probes();
            }
        }
        self.leave(ticket);
    }

    fn start_probes(&mut self) {
        let tx = self.event_tx.clone();
        let session = self.probes.probe_all(&self.current, self.lifecycle.token(), move |finished| {
            tokio::spawn(async move {
                if tx.send(CoreEvent::ProbeFinished(finished)).await.is_err() {
                    debug!("BrowseCore: gone before probe result arrived");
                }
            });
        });
        if let Some(session) = session {
            let ticket = self.enter("probe session");
            if let Some(old) = self.probe_tickets.insert(session.rev, ticket) {
                error!("BrowseCore: duplicate probe session for rev {}", session.rev);
                self.leave(old);
            }
        }
    }

    fn on_probe_finished(&mut self, finished: probe::ProbeFinished) {
        let ticket = self.probe_tickets.remove(&finished.rev);
        let applied = apply_probe(
            &mut self.current,
            finished,
            self.surface.as_ref(),
            &self.lifecycle,
        );
        debug!("BrowseCore: probe applied: {:?}", applied);
        if applied == ProbeApplied::Empty {
            info!("BrowseCore: keeping unprobed variants");
        }
        if let Some(ticket) = ticket {
            self.leave(ticket);
        }
    }

    // ── Listing ───────────────────────────────────────────────────────────────

    fn start_cycle(&mut self, container_id: &str) {
        if !self.lifecycle.is_active() {
            debug!("BrowseCore: view closed, not loading {}", container_id);
            return;
        }
        self.abort_pending_tick();
        let sort = self.sort;
        let request = self.with_loader(|loader, ctx| loader.begin_cycle(container_id, sort, ctx));
        let PageRequest { cycle, query } = request;

        let client = Arc::clone(&self.client);
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = client.fetch_playlist(&query).await;
            if tx.send(CoreEvent::ListFetched { cycle, result }).await.is_err() {
                debug!("BrowseCore: gone before list for cycle {} arrived", cycle);
            }
        });
    }

    /// Carry out what the loader asked for.
    fn follow(&mut self, step: Step) {
        match step {
            Step::Idle => {}

            Step::ScheduleBatch { cycle, after } => {
                self.abort_pending_tick();
                let tx = self.event_tx.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = tx.send(CoreEvent::BatchTick { cycle }).await;
                });
                self.pending_tick = Some(handle.abort_handle());
            }

            Step::FetchPage(PageRequest { cycle, query }) => {
                let client = Arc::clone(&self.client);
                let tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let result = client.fetch_playlist(&query).await;
                    if tx.send(CoreEvent::PageFetched { cycle, result }).await.is_err() {
                        debug!("BrowseCore: gone before page for cycle {} arrived", cycle);
                    }
                });
            }
        }
    }

    fn abort_pending_tick(&mut self) {
        if let Some(handle) = self.pending_tick.take() {
            handle.abort();
        }
    }

    fn with_loader<R>(&mut self, f: impl FnOnce(&mut BatchLoader, &mut LoadContext<'_>) -> R) -> R {
        let mut ctx = LoadContext {
            busy: &mut self.busy,
            surface: self.surface.as_ref(),
            guard: &self.lifecycle,
        };
        f(&mut self.loader, &mut ctx)
    }

    // ── Busy indicator ────────────────────────────────────────────────────────

    fn enter(&mut self, label: &'static str) -> BusyTicket {
        let (ticket, edge) = self.busy.enter(label);
        self.surface.apply_busy_edge(edge);
        ticket
    }

    fn leave(&mut self, ticket: BusyTicket) {
        let edge = self.busy.leave(ticket);
        self.surface.apply_busy_edge(edge);
    }

    // ── Teardown ──────────────────────────────────────────────────────────────

    fn close_view(&mut self) {
        self.lifecycle.close();
        self.abort_pending_tick();
        self.with_loader(|loader, ctx| loader.abandon(ctx));
        if let Some((seq, ticket)) = self.item_fetch.take() {
            debug!("BrowseCore: dropping item fetch {}", seq);
            self.leave(ticket);
        }
        // Probe sessions finish on their own once the token fires; their
        // tickets are returned when the (discarded) report comes in.
    }

    fn cleanup(&mut self) {
        self.close_view();
        let tickets: Vec<BusyTicket> = self.probe_tickets.drain().map(|(_, t)| t).collect();
        for ticket in tickets {
            self.leave(ticket);
        }
        if self.busy.is_busy() {
            warn!("BrowseCore: exiting with busy count {}", self.busy.count());
        }
        info!("BrowseCore: stopped");
    }
}
