//! # Consumer API
//!
//! One client per connection role. Constructors spawn the role's machine and
//! network thread; every action method only enqueues a command and returns.
//! Events are drained with `drain_events()` (which also answers reconnect
//! requests) or consumed through `events()`; snapshots are read as `Arc`s.

pub mod client;

pub use client::{AuthClient, WorldClient, ZoneClient};
