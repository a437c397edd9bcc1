//! # Utility Modules
//!
//! Supporting utilities for payload transforms, logging, and metrics.
//!
//! ## Components
//! - **Cipher**: the two 64-bit block ciphers guarding profile and spawn payloads
//! - **Compression**: zlib inflate/deflate with per-family output limits
//! - **Transform**: cipher reversal followed by inflate, with fallback
//! - **Logging**: tracing-subscriber setup
//! - **Metrics**: Thread-safe observability counters

pub mod cipher;
pub mod compression;
pub mod logging;
pub mod metrics;
pub mod transform;

pub use cipher::CipherFamily;
pub use transform::Transformed;
