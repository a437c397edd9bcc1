//! # Transport Layer
//!
//! Moves application messages between a machine and the network.
//!
//! ## Components
//! - **Link**: sequence, acknowledgment, retransmission and fragmentation
//!   for the legacy wire
//! - **UDP**: the network I/O thread owning the socket and the link
//! - **Session layer**: adapter for the modern wire, where an external
//!   session layer delivers complete application payloads

pub mod link;
pub mod session_layer;
pub mod udp;

pub use link::{Link, Received};
pub use session_layer::SessionLayerAdapter;
pub use udp::{IoCommand, NetworkThread};
