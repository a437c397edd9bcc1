//! # zoneline
//!
//! Client-side protocol core for a legacy real-time multiplayer game server
//! family: transport framing, reliability, fragmentation, payload
//! decryption and inflate, application codecs for two wire variants, and
//! the auth, world and zone connection state machines.
//!
//! ## Layout
//! - [`core`]: legacy datagram framing, checksum and fragment reassembly
//! - [`utils`]: payload ciphers, inflate, logging and metrics
//! - [`protocol`]: opcode contract, codecs and state machines
//! - [`transport`]: reliability link, UDP network thread, session-layer adapter
//! - [`service`]: consumer-facing clients
//!
//! ## Example
//! ```no_run
//! use zoneline::config::ClientConfig;
//! use zoneline::protocol::records::Credentials;
//! use zoneline::service::AuthClient;
//!
//! # fn main() -> zoneline::error::Result<()> {
//! let config = ClientConfig::default();
//! zoneline::utils::logging::init_logging(&config.logging)?;
//!
//! let auth = AuthClient::new(&config)?;
//! auth.connect(Credentials::new("user", "secret"))?;
//! for event in auth.drain_events() {
//!     println!("{event:?}");
//! }
//! auth.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use error::{ProtocolError, Result};
