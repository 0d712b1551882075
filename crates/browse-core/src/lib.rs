//! Async population of browse views from a remote media library.
//!
//! Two loading shapes live here: a fan-out/fan-in refresh of an item's
//! playable variants ([`probe`]) and progressive reveal of long container
//! listings ([`loader`]).  [`BrowseCore`](crate::core::BrowseCore) owns
//! both and serializes every state change through one event loop.

pub mod barrier;
pub mod busy;
pub mod client;
pub mod core;
pub mod jellyfin;
pub mod lifecycle;
pub mod loader;
pub mod probe;
pub mod sort;
pub mod surface;
