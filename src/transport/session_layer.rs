//! Adapter for the modern wire.
//!
//! On the modern wire an external session layer owns the socket, reliability
//! and fragmentation, and hands over complete ordered application payloads
//! of the form `opcode (u16 LE) + body`. The adapter feeds those to a
//! machine and returns the machine's output in the same form.

use std::time::Instant;

use tracing::{debug, trace};

use crate::error::ProtocolError;
use crate::protocol::codec::ModernCodec;
use crate::protocol::machine::ProtocolMachine;
use crate::utils::metrics::global_metrics;

#[derive(Debug)]
pub struct SessionLayerAdapter<M> {
    machine: M,
    open: bool,
}

impl<M: ProtocolMachine> SessionLayerAdapter<M> {
    pub fn new(machine: M) -> Self {
        Self {
            machine,
            open: false,
        }
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut M {
        &mut self.machine
    }

    pub fn into_inner(self) -> M {
        self.machine
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The session layer finished its own handshake.
    pub fn open(&mut self, now: Instant) {
        self.open = true;
        self.machine.on_transport_open(now);
    }

    /// The session layer lost or closed its connection.
    pub fn close(&mut self, now: Instant) {
        self.open = false;
        self.machine.on_transport_closed(now);
    }

    /// Report a session-layer failure to the machine.
    pub fn fail(&mut self, error: &ProtocolError, now: Instant) {
        self.machine.on_transport_error(error, now);
    }

    /// One complete application payload from the session layer.
    pub fn deliver(&mut self, app: &[u8], now: Instant) {
        match ModernCodec::split_app(app) {
            Some((opcode, body)) => {
                trace!(opcode = format_args!("{opcode:#06x}"), len = body.len(), "Delivered");
                self.machine.handle_message(opcode, body, now);
            }
            None => {
                debug!(len = app.len(), "Application payload too short for an opcode");
                global_metrics().decode_failure();
            }
        }
    }

    pub fn tick(&mut self, now: Instant) {
        self.machine.tick(now);
    }

    /// Opcode-prefixed payloads for the session layer to send, in order.
    pub fn take_app_payloads(&mut self) -> Vec<Vec<u8>> {
        self.machine
            .take_outgoing()
            .into_iter()
            .map(|cmd| ModernCodec::frame_app(cmd.opcode, &cmd.payload))
            .collect()
    }
}
