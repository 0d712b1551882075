//! Presentation surface: where finished data is pushed.
//!
//! The core never reads UI state back; it only pushes item updates, list
//! slices and busy-indicator edges.  [`ChannelSurface`] fans those pushes out
//! on a broadcast channel so any number of listeners (a renderer, the CLI
//! printer, tests) can follow along.

use std::sync::Arc;

use browse_proto::protocol::Item;
use tokio::sync::broadcast;
use tracing::debug;

use crate::busy::BusyEdge;

pub trait PresentationSurface: Send + Sync {
    /// A complete, consistent item to display (never a half-merged one).
    fn publish_item_update(&self, item: &Item);

    /// Entries `start_index..start_index + slice.len()` of the current list.
    fn reveal_entries(&self, slice: &[Item], start_index: usize);

    fn set_busy_visible(&self, visible: bool);

    /// Forward a busy-counter edge, if there is one.
    fn apply_busy_edge(&self, edge: Option<BusyEdge>) {
        if let Some(edge) = edge {
            self.set_busy_visible(edge.visible());
        }
    }
}

/// Everything a [`ChannelSurface`] broadcasts.
#[derive(Debug, Clone)]
pub enum SurfaceEvent {
    ItemUpdated(Arc<Item>),
    EntriesRevealed {
        start_index: usize,
        entries: Arc<Vec<Item>>,
    },
    BusyVisible(bool),
}

#[derive(Debug, Clone)]
pub struct ChannelSurface {
    tx: broadcast::Sender<SurfaceEvent>,
}

impl ChannelSurface {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SurfaceEvent> {
        self.tx.subscribe()
    }

    fn send(&self, event: SurfaceEvent) {
        // No listeners is fine: the core keeps going headless.
        if self.tx.send(event).is_err() {
            debug!("surface: no listeners");
        }
    }
}

impl PresentationSurface for ChannelSurface {
    fn publish_item_update(&self, item: &Item) {
        self.send(SurfaceEvent::ItemUpdated(Arc::new(item.clone())));
    }

    fn reveal_entries(&self, slice: &[Item], start_index: usize) {
        self.send(SurfaceEvent::EntriesRevealed {
            start_index,
            entries: Arc::new(slice.to_vec()),
        });
    }

    fn set_busy_visible(&self, visible: bool) {
        self.send(SurfaceEvent::BusyVisible(visible));
    }
}
