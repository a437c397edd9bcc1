//! # Error Types
//!
//! Error handling for the protocol core.
//!
//! Only a handful of paths surface a `ProtocolError` to a caller: framing
//! decode, inflate, link supervision, configuration loading and thread
//! management. Application decoders return `Option` instead, and nothing in
//! this module ever crosses the consumer/network thread boundary directly;
//! the network thread folds failures into the role event queues.
//!
//! ## Error Categories
//! - **I/O Errors**: socket and file system failures
//! - **Framing Errors**: short or truncated datagrams, bad fragment headers
//! - **Transform Errors**: inflate failures (always recoverable)
//! - **Link Errors**: retransmit budget exhausted, transport not open
//! - **Configuration Errors**: unreadable or invalid settings
//!
//! ## Example Usage
//! ```rust
//! use zoneline::core::codec::decode_frame;
//! use zoneline::error::ProtocolError;
//!
//! match decode_frame(&[0u8; 4]) {
//!     Err(ProtocolError::FrameTooShort(len)) => assert_eq!(len, 4),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Static error messages shared by the machines and the network thread.
pub mod constants {
    /// Transport errors
    pub const ERR_NOT_CONNECTED: &str = "Transport is not connected";
    pub const ERR_SOCKET_CLOSED: &str = "Socket closed";
    pub const ERR_RUNTIME_START: &str = "Failed to start network runtime";
    pub const ERR_SESSION_LAYER_REQUIRED: &str =
        "The modern wire is carried by an external session layer, not the UDP thread";

    /// Handshake errors
    pub const ERR_LOGIN_REJECTED: &str = "Login rejected by server";
    pub const ERR_RECONNECT_BUDGET: &str = "Handshake timed out after exhausting reconnect attempts";
    pub const ERR_PROFILE_DECODE: &str = "Failed to decode player profile";
    pub const ERR_ZONE_DECODE: &str = "Failed to decode zone metadata";
    pub const ERR_CHARACTER_LIST_DECODE: &str = "Failed to decode character list";
    pub const ERR_SERVER_LIST_DECODE: &str = "Failed to decode server list";
    pub const ERR_LOGIN_REPLY_DECODE: &str = "Failed to decode login reply";
    pub const ERR_ZONE_SERVER_DECODE: &str = "Failed to decode zone server info";
    pub const ERR_PLAY_REPLY_DECODE: &str = "Failed to decode play response";

    /// Command errors
    pub const ERR_NOT_IN_ZONE: &str = "Command requires an in-zone connection";
    pub const ERR_WRONG_STATE: &str = "Command not valid in the current state";
}

/// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Frame too short: {0} bytes")]
    FrameTooShort(usize),

    #[error("Truncated frame: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Invalid fragment header: index {index} of {total}")]
    InvalidFragment { index: u16, total: u16 },

    #[error("Message too large: {len} bytes, at most {max} can be fragmented")]
    MessageTooLarge { len: usize, max: usize },

    #[error("Decompression failed")]
    DecompressionFailure,

    #[error("Link failure: {0}")]
    LinkFailure(String),

    #[error("Transport is not connected")]
    NotConnected,

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Handshake failed: {0}")]
    HandshakeError(String),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
