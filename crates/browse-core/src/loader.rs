//! Progressive reveal of a container listing.
//!
//! The whole list is fetched in one request, then revealed in slices so the
//! first rows show up at once and the rest follow on a timer.  Scrolling near
//! the end asks the server for further pages.  The loader is a plain state
//! machine: it never sleeps or spawns; each operation returns a [`Step`]
//! telling the owner what to schedule next.
//!
//! ```text
//!            list fetched (non-empty)
//!  Empty ─────────────────────────────▶ InitialReveal ──more left──▶ Streaming ──tick──┐
//!    ▲                                        │                         │  ▲          │
//!    │ begin_cycle (any state)                │ all shown               │  └──more────┘
//!    │                                        ▼                         │ all shown
//!    │                                     Settled ◀────────────────────┘
//!    │                                     │     ▲
//!    │                       scroll (debounced) page fetched / failed
//!    │                                     ▼     │
//!    │                                   PageFetching
//!    │
//!  Abandoned ◀── view inactive at a tick
//! ```
//!
//! Every entry into `Streaming` or `PageFetching` (and the initial list
//! fetch) holds a [`BusyTicket`]; every exit hands it back, including
//! failures, abandonment and cycle replacement.

use std::time::Duration;

use browse_proto::config::LoaderConfig;
use browse_proto::protocol::Item;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::busy::{BusyCounter, BusyTicket};
use crate::client::{ClientError, PlaylistQuery};
use crate::lifecycle::LifecycleGuard;
use crate::sort::SortSpec;
use crate::surface::PresentationSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Empty,
    InitialReveal,
    Streaming,
    Settled,
    PageFetching,
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSettings {
    pub initial_batch_size: usize,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub debounce: Duration,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self::from(&LoaderConfig::default())
    }
}

impl From<&LoaderConfig> for LoaderSettings {
    fn from(config: &LoaderConfig) -> Self {
        Self {
            initial_batch_size: config.initial_batch_size.max(1),
            batch_size: config.batch_size.max(1),
            batch_delay: Duration::from_millis(config.batch_delay_ms),
            debounce: Duration::from_millis(config.debounce_ms),
        }
    }
}

/// A server page request tagged with the cycle that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub cycle: u64,
    pub query: PlaylistQuery,
}

/// What the owner should do after a loader operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Idle,
    /// Call `on_batch_tick(cycle)` after `after`.
    ScheduleBatch { cycle: u64, after: Duration },
    /// Issue this page request and report back through `on_page_fetched`.
    FetchPage(PageRequest),
}

/// Collaborators every loader operation needs.
pub struct LoadContext<'a> {
    pub busy: &'a mut BusyCounter,
    pub surface: &'a dyn PresentationSurface,
    pub guard: &'a dyn LifecycleGuard,
}

impl LoadContext<'_> {
    fn enter(&mut self, label: &'static str) -> BusyTicket {
        let (ticket, edge) = self.busy.enter(label);
        self.surface.apply_busy_edge(edge);
        ticket
    }

    fn leave(&mut self, ticket: Option<BusyTicket>) {
        if let Some(ticket) = ticket {
            let edge = self.busy.leave(ticket);
            self.surface.apply_busy_edge(edge);
        }
    }
}

#[derive(Debug)]
pub struct BatchLoader {
    settings: LoaderSettings,
    state: LoaderState,
    cycle: u64,
    container_id: Option<String>,
    sort: SortSpec,
    items: Vec<Item>,
    revealed: usize,
    exhausted: bool,
    last_scroll_trigger: Option<Instant>,
    fetch_ticket: Option<BusyTicket>,
    stream_ticket: Option<BusyTicket>,
    page_ticket: Option<BusyTicket>,
}

impl BatchLoader {
    pub fn new(settings: LoaderSettings) -> Self {
        Self {
            settings,
            state: LoaderState::Empty,
            cycle: 0,
            container_id: None,
            sort: SortSpec::default(),
            items: Vec::new(),
            revealed: 0,
            exhausted: false,
            last_scroll_trigger: None,
            fetch_ticket: None,
            stream_ticket: None,
            page_ticket: None,
        }
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn sort(&self) -> SortSpec {
        self.sort
    }

    pub fn container_id(&self) -> Option<&str> {
        self.container_id.as_deref()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn revealed_count(&self) -> usize {
        self.revealed
    }

    pub fn revealed(&self) -> &[Item] {
        &self.items[..self.revealed]
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Start a new load cycle for `container_id`, discarding the old list.
    ///
    /// Any step scheduled or request issued for the previous cycle becomes a
    /// no-op when it reports back.  Returns the full-list query to issue.
    pub fn begin_cycle(
        &mut self,
        container_id: &str,
        sort: SortSpec,
        ctx: &mut LoadContext<'_>,
    ) -> PageRequest {
        // New ticket first so a reload never blinks the indicator.
        let fetch = ctx.enter("list fetch");
        self.release_all(ctx);
        self.cycle += 1;
        self.state = LoaderState::Empty;
        self.container_id = Some(container_id.to_string());
        self.sort = sort;
        self.items = Vec::new();
        self.revealed = 0;
        self.exhausted = false;
        self.last_scroll_trigger = None;
        self.fetch_ticket = Some(fetch);
        info!(
            "loader: cycle {} for {} sorted {}",
            self.cycle,
            container_id,
            sort.label()
        );
        PageRequest {
            cycle: self.cycle,
            query: PlaylistQuery {
                container_id: container_id.to_string(),
                sort_by: sort.field,
                sort_order: sort.order,
                offset: 0,
                limit: None,
            },
        }
    }

    pub fn on_list_fetched(
        &mut self,
        cycle: u64,
        result: Result<Vec<Item>, ClientError>,
        ctx: &mut LoadContext<'_>,
    ) -> Step {
        if cycle != self.cycle || self.state != LoaderState::Empty {
            debug!("loader: dropping list for old cycle {}", cycle);
            return Step::Idle;
        }
        // Released after the stream ticket is taken so the indicator does
        // not flicker between the fetch and the first deferred batch.
        let fetch = self.fetch_ticket.take();
        let step = self.accept_list(result, ctx);
        ctx.leave(fetch);
        step
    }

    fn accept_list(
        &mut self,
        result: Result<Vec<Item>, ClientError>,
        ctx: &mut LoadContext<'_>,
    ) -> Step {
        let items = match result {
            Ok(items) => items,
            Err(e) => {
                warn!("loader: list fetch failed: {}", e);
                return Step::Idle;
            }
        };
        if !ctx.guard.is_active() {
            debug!("loader: view inactive, dropping {} fetched entries", items.len());
            return Step::Idle;
        }
        if items.is_empty() {
            info!("loader: container is empty");
            return Step::Idle;
        }

        self.items = items;
        self.state = LoaderState::InitialReveal;
        let first = self.settings.initial_batch_size.min(self.items.len());
        self.reveal_to(first, ctx);
        info!(
            "loader: revealed first {} of {} entries",
            first,
            self.items.len()
        );

        if self.revealed < self.items.len() {
            self.stream_ticket = Some(ctx.enter("batch stream"));
            self.state = LoaderState::Streaming;
            self.schedule()
        } else {
            self.state = LoaderState::Settled;
            Step::Idle
        }
    }

    /// Deferred reveal step.
    pub fn on_batch_tick(&mut self, cycle: u64, ctx: &mut LoadContext<'_>) -> Step {
        if cycle != self.cycle || self.state != LoaderState::Streaming {
            debug!("loader: ignoring tick for cycle {}", cycle);
            return Step::Idle;
        }
        if !ctx.guard.is_active() {
            info!(
                "loader: view inactive, abandoning at {}/{}",
                self.revealed,
                self.items.len()
            );
            self.state = LoaderState::Abandoned;
            let ticket = self.stream_ticket.take();
            ctx.leave(ticket);
            return Step::Idle;
        }

        let end = (self.revealed + self.settings.batch_size).min(self.items.len());
        self.reveal_to(end, ctx);
        debug!("loader: revealed {}/{}", self.revealed, self.items.len());

        if self.revealed < self.items.len() {
            self.schedule()
        } else {
            info!("loader: all {} entries revealed", self.items.len());
            self.state = LoaderState::Settled;
            let ticket = self.stream_ticket.take();
            ctx.leave(ticket);
            Step::Idle
        }
    }

    /// Scroll reached the end of what is shown.
    pub fn on_scrolled_to_bottom(&mut self, now: Instant, ctx: &mut LoadContext<'_>) -> Step {
        if let Some(last) = self.last_scroll_trigger {
            if now.saturating_duration_since(last) < self.settings.debounce {
                return Step::Idle;
            }
        }
        self.last_scroll_trigger = Some(now);

        if self.state != LoaderState::Settled {
            debug!("loader: scroll ignored in {:?}", self.state);
            return Step::Idle;
        }
        if self.exhausted {
            debug!("loader: scroll ignored, no more entries");
            return Step::Idle;
        }
        let Some(container_id) = self.container_id.clone() else {
            return Step::Idle;
        };

        self.page_ticket = Some(ctx.enter("page fetch"));
        self.state = LoaderState::PageFetching;
        debug!(
            "loader: fetching page at offset {} ({} entries)",
            self.revealed, self.settings.batch_size
        );
        Step::FetchPage(PageRequest {
            cycle: self.cycle,
            query: PlaylistQuery {
                container_id,
                sort_by: self.sort.field,
                sort_order: self.sort.order,
                offset: self.revealed,
                limit: Some(self.settings.batch_size),
            },
        })
    }

    pub fn on_page_fetched(
        &mut self,
        cycle: u64,
        result: Result<Vec<Item>, ClientError>,
        ctx: &mut LoadContext<'_>,
    ) -> Step {
        if cycle != self.cycle || self.state != LoaderState::PageFetching {
            debug!("loader: dropping page for old cycle {}", cycle);
            return Step::Idle;
        }
        self.state = LoaderState::Settled;
        let ticket = self.page_ticket.take();
        ctx.leave(ticket);

        match result {
            Err(e) => warn!("loader: page fetch failed, will retry on next scroll: {}", e),
            Ok(page) if page.is_empty() => {
                info!("loader: end of data at {} entries", self.items.len());
                self.exhausted = true;
            }
            Ok(page) => {
                if !ctx.guard.is_active() {
                    debug!("loader: view inactive, dropping page of {}", page.len());
                    return Step::Idle;
                }
                let count = page.len();
                self.items.extend(page);
                let end = self.items.len();
                self.reveal_to(end, ctx);
                info!("loader: appended page of {}, now {}", count, end);
            }
        }
        Step::Idle
    }

    /// Stop the current cycle (view closing) and release its busy tickets.
    pub fn abandon(&mut self, ctx: &mut LoadContext<'_>) {
        if matches!(self.state, LoaderState::Settled | LoaderState::Abandoned)
            && self.fetch_ticket.is_none()
        {
            return;
        }
        info!("loader: abandoning cycle {} in {:?}", self.cycle, self.state);
        self.release_all(ctx);
        self.state = LoaderState::Abandoned;
    }

    fn schedule(&self) -> Step {
        Step::ScheduleBatch {
            cycle: self.cycle,
            after: self.settings.batch_delay,
        }
    }

    fn reveal_to(&mut self, end: usize, ctx: &mut LoadContext<'_>) {
        let start = self.revealed;
        let end = end.min(self.items.len());
        if end <= start {
            return;
        }
        ctx.surface.reveal_entries(&self.items[start..end], start);
        self.revealed = end;
    }

    fn release_all(&mut self, ctx: &mut LoadContext<'_>) {
        for ticket in [
            self.fetch_ticket.take(),
            self.stream_ticket.take(),
            self.page_ticket.take(),
        ] {
            ctx.leave(ticket);
        }
    }
}
