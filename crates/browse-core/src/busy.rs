//! Reference-counted "loading" indicator.
//!
//! Every loading activity takes a [`BusyTicket`] from [`BusyCounter::enter`]
//! and hands it back through [`BusyCounter::leave`].  Tickets cannot be cloned
//! or forged, so a leave always matches an earlier enter and the count can
//! never go below zero.  Only the 0→1 and 1→0 transitions produce a
//! [`BusyEdge`]; the presentation side animates those.

use tracing::{debug, error};

/// Visible-state transition produced by the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyEdge {
    /// Counter went 0 → 1.
    Shown,
    /// Counter went 1 → 0.
    Hidden,
}

impl BusyEdge {
    pub fn visible(self) -> bool {
        matches!(self, BusyEdge::Shown)
    }
}

/// Proof of one outstanding `enter`.  Must be returned via `leave`.
#[derive(Debug)]
#[must_use = "a BusyTicket that is never passed to leave() keeps the indicator visible"]
pub struct BusyTicket {
    label: &'static str,
}

impl BusyTicket {
    pub fn label(&self) -> &'static str {
        self.label
    }
}

#[derive(Debug, Default)]
pub struct BusyCounter {
    count: usize,
}

impl BusyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_busy(&self) -> bool {
        self.count > 0
    }

    /// Start a loading activity.  `label` only feeds the logs.
    pub fn enter(&mut self, label: &'static str) -> (BusyTicket, Option<BusyEdge>) {
        self.count += 1;
        debug!("busy: enter {} → {}", label, self.count);
        let edge = (self.count == 1).then_some(BusyEdge::Shown);
        (BusyTicket { label }, edge)
    }

    /// Finish the activity that produced `ticket`.
    pub fn leave(&mut self, ticket: BusyTicket) -> Option<BusyEdge> {
        let Some(next) = self.count.checked_sub(1) else {
            error!("busy: leave {} with counter already at zero", ticket.label);
            return None;
        };
        self.count = next;
        debug!("busy: leave {} → {}", ticket.label, self.count);
        (self.count == 0).then_some(BusyEdge::Hidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    #[test]
    fn test_single_pair_produces_both_edges() {
        let mut busy = BusyCounter::new();
        let (ticket, edge) = busy.enter("list");
        assert_eq!(edge, Some(BusyEdge::Shown));
        assert!(busy.is_busy());
        assert_eq!(busy.leave(ticket), Some(BusyEdge::Hidden));
        assert!(!busy.is_busy());
    }

    #[test]
    fn test_nested_activities_only_report_outer_edges() {
        let mut busy = BusyCounter::new();
        let (a, e1) = busy.enter("a");
        let (b, e2) = busy.enter("b");
        assert_eq!(e1, Some(BusyEdge::Shown));
        assert_eq!(e2, None);
        assert_eq!(busy.leave(a), None);
        assert!(busy.is_busy());
        assert_eq!(busy.leave(b), Some(BusyEdge::Hidden));
    }

    #[test]
    fn test_any_leave_order_yields_one_show_and_one_hide() {
        let mut rng = rand::thread_rng();
        for n in 1..=40 {
            for _ in 0..5 {
                let mut busy = BusyCounter::new();
                let mut edges = Vec::new();
                let mut tickets = Vec::new();
                for _ in 0..n {
                    let (t, e) = busy.enter("work");
                    tickets.push(t);
                    edges.extend(e);
                }
                tickets.shuffle(&mut rng);
                for t in tickets {
                    edges.extend(busy.leave(t));
                }
                assert_eq!(busy.count(), 0);
                assert_eq!(edges, vec![BusyEdge::Shown, BusyEdge::Hidden], "n={}", n);
            }
        }
    }

    #[test]
    fn test_interleaved_cycles_toggle_each_time() {
        let mut busy = BusyCounter::new();
        let mut edges = Vec::new();
        for _ in 0..3 {
            let (t, e) = busy.enter("cycle");
            edges.extend(e);
            edges.extend(busy.leave(t));
        }
        assert_eq!(edges.len(), 6);
        assert!(edges.iter().step_by(2).all(|e| e.visible()));
    }
}
