//! Application codecs behind a shared opcode contract.
//!
//! A [`WireCodec`] is chosen once per connection from the configured
//! [`WireVariant`]; state machines never branch on the variant except through
//! the few questions the trait answers (`has_server_name_step`,
//! `payload_transform`).
//!
//! Decoders return `None` for any payload too short for its layout. They never
//! panic and never return errors.

pub mod common;
pub mod legacy;
pub mod modern;

use crate::core::packet::OutgoingCommand;
use crate::error::{ProtocolError, Result};
use crate::protocol::message::{Inbound, Outgoing};
use crate::protocol::opcodes::{MessageKind, OpcodeTable, WireVariant};
use crate::utils::cipher::CipherFamily;
use crate::utils::transform;

pub use legacy::LegacyCodec;
pub use modern::ModernCodec;

/// Encode/decode contract implemented once per wire variant.
pub trait WireCodec: Send + Sync + std::fmt::Debug {
    fn variant(&self) -> WireVariant;

    fn opcodes(&self) -> &'static OpcodeTable;

    /// Whether the login handshake includes the server-name exchange.
    fn has_server_name_step(&self) -> bool;

    /// Cipher family guarding an inbound kind, if any.
    fn payload_transform(&self, kind: MessageKind) -> Option<CipherFamily>;

    /// Body of a client message.
    fn encode_outgoing(&self, msg: &Outgoing) -> Vec<u8>;

    /// Decode a server message body (already transform-reversed).
    fn decode_inbound(&self, kind: MessageKind, payload: &[u8]) -> Option<Inbound>;

    /// Body of a server message, before any payload transform.
    fn encode_inbound(&self, msg: &Inbound) -> Vec<u8>;

    /// Decode a client message body.
    fn decode_outgoing(&self, kind: MessageKind, payload: &[u8]) -> Option<Outgoing>;

    /// Opcode and body ready for the transport, or `None` when the variant
    /// has no opcode for this message.
    fn encode_message(&self, msg: &Outgoing) -> Option<OutgoingCommand> {
        let opcode = self.opcodes().opcode(msg.kind())?;
        Some(OutgoingCommand::new(opcode, self.encode_outgoing(msg)))
    }

    /// Server-direction counterpart of [`WireCodec::encode_message`],
    /// applying the payload transform where the variant uses one.
    ///
    /// # Errors
    /// `ProtocolError::Custom` if the variant has no opcode for the message;
    /// compression failures from the transform.
    fn encode_server_message(&self, msg: &Inbound) -> Result<OutgoingCommand> {
        let kind = msg.kind();
        let opcode = self.opcodes().opcode(kind).ok_or_else(|| {
            ProtocolError::Custom(format!("{kind:?} has no opcode on {:?}", self.variant()))
        })?;
        let body = self.encode_inbound(msg);
        let body = match self.payload_transform(kind) {
            Some(family) => transform::apply(family, &body)?,
            None => body,
        };
        Ok(OutgoingCommand::new(opcode, body))
    }
}

static LEGACY: LegacyCodec = LegacyCodec;
static MODERN: ModernCodec = ModernCodec;

/// Codec for a wire variant.
pub fn codec_for(variant: WireVariant) -> &'static dyn WireCodec {
    match variant {
        WireVariant::Legacy => &LEGACY,
        WireVariant::Modern => &MODERN,
    }
}
