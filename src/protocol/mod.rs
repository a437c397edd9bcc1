//! # Application Protocol
//!
//! Everything above the transport: opcode contract, codecs, and the three
//! connection-role state machines.
//!
//! ## Components
//! - **Opcodes**: `MessageKind` and the per-variant opcode tables
//! - **Codec**: `WireCodec` with legacy and modern implementations
//! - **Size check**: expected payload sizes for handshake-critical kinds
//! - **Dispatcher**: kind → handler lookup used by every machine
//! - **Machines**: auth, world and zone, driven through `ProtocolMachine`
//! - **Snapshot**: whole-value published state readable from any thread
//!
//! ## Threading
//! Machines live on the network thread. Consumers talk to them only through
//! the command/event channels and the published snapshots.

pub mod auth;
pub mod codec;
pub mod commands;
pub mod dispatcher;
pub mod events;
pub mod fields;
pub mod machine;
pub mod message;
pub mod opcodes;
pub mod records;
pub mod size_check;
pub mod snapshot;
pub mod world;
pub mod zone;

pub use auth::AuthMachine;
pub use codec::{codec_for, WireCodec};
pub use commands::{AuthCommand, WorldCommand, ZoneCommand};
pub use events::{AuthEvent, AuthState, Diagnostic, WorldEvent, WorldState, ZoneEvent, ZoneState};
pub use machine::{ProtocolMachine, Role};
pub use opcodes::{MessageKind, WireVariant};
pub use world::WorldMachine;
pub use zone::ZoneMachine;
