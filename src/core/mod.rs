//! # Core Transport Components
//!
//! Low-level handling of the legacy UDP wire format.
//!
//! ## Components
//! - **Checksum**: CRC32 trailer
//! - **Packet**: structured inbound packet and outgoing command types
//! - **Codec**: datagram encode/decode (general, fragment, ack, closing)
//! - **Fragment**: reassembly of multi-datagram messages and payload splitting
//!
//! ## Wire Format
//! ```text
//! [Header(2)] [Seq(2)] [optional ack/fragment fields] [Opcode(2)?] [Payload] [CRC32(4)]
//! ```
//!
//! ## Robustness
//! - Minimum datagram size: 10 bytes
//! - Every optional field is bounds-checked before it is read
//! - Checksum mismatches are tolerated to match observed server behaviour

pub mod checksum;
pub mod codec;
pub mod fragment;
pub mod packet;
