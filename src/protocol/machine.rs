//! Shared machinery for the three connection-role state machines.
//!
//! A machine is driven entirely from the network thread through
//! [`ProtocolMachine`]; it never touches a socket. Consumer commands reach it
//! over a channel and are applied on the next [`ProtocolMachine::tick`].
//! Every observation leaves through the role's event channel.

use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use tracing::{debug, trace, warn};

use crate::config::HandshakeConfig;
use crate::core::packet::OutgoingCommand;
use crate::error::ProtocolError;
use crate::protocol::codec::WireCodec;
use crate::protocol::events::{Diagnostic, RoleEvent};
use crate::protocol::message::{Inbound, Outgoing};
use crate::protocol::opcodes::MessageKind;
use crate::protocol::size_check;
use crate::utils::metrics::global_metrics;
use crate::utils::transform;

/// Connection role, used for logging and thread names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Auth,
    World,
    Zone,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Auth => "auth",
            Role::World => "world",
            Role::Zone => "zone",
        }
    }
}

/// Interface the network thread (or session-layer adapter) drives.
pub trait ProtocolMachine: Send {
    fn role(&self) -> Role;

    /// A fresh transport is ready to carry application messages.
    fn on_transport_open(&mut self, now: Instant);

    /// The transport went away (disconnect, reconnect teardown).
    fn on_transport_closed(&mut self, now: Instant);

    /// Socket or link failure; reported, never fatal by itself.
    fn on_transport_error(&mut self, error: &ProtocolError, now: Instant);

    /// One complete application message.
    fn handle_message(&mut self, opcode: u16, payload: &[u8], now: Instant);

    /// Apply queued commands and run timers.
    fn tick(&mut self, now: Instant);

    /// Messages produced since the last call, in order.
    fn take_outgoing(&mut self) -> Vec<OutgoingCommand>;

    /// No further progress is possible without a new connect command.
    fn is_terminal(&self) -> bool;
}

/// Outcome of polling the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorVerdict {
    Idle,
    /// The handshake window closed; open a fresh connection.
    Reconnect { attempt: u32 },
    /// The reconnect budget is spent.
    Exhausted { attempts: u32 },
}

/// Handshake timeout with a bounded reconnect budget.
///
/// Armed when the initial request goes out, disarmed by the first
/// application payload. Each expiry counts one attempt; reaching the maximum
/// is terminal.
#[derive(Debug, Clone)]
pub struct HandshakeSupervisor {
    timeout: Duration,
    max_attempts: u32,
    deadline: Option<Instant>,
    attempts: u32,
}

impl HandshakeSupervisor {
    pub fn new(timeout: Duration, max_attempts: u32) -> Self {
        Self {
            timeout,
            max_attempts: max_attempts.max(1),
            deadline: None,
            attempts: 0,
        }
    }

    pub fn from_config(config: &HandshakeConfig) -> Self {
        Self::new(config.timeout, config.max_reconnect_attempts)
    }

    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.timeout);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Forget past attempts (new connect command).
    pub fn reset(&mut self) {
        self.deadline = None;
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn poll(&mut self, now: Instant) -> SupervisorVerdict {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.attempts += 1;
                if self.attempts >= self.max_attempts {
                    SupervisorVerdict::Exhausted {
                        attempts: self.attempts,
                    }
                } else {
                    SupervisorVerdict::Reconnect {
                        attempt: self.attempts,
                    }
                }
            }
            _ => SupervisorVerdict::Idle,
        }
    }
}

/// Result of running one inbound message through the decode pipeline.
#[derive(Debug)]
pub struct Decoded {
    pub kind: MessageKind,
    pub message: Option<Inbound>,
}

/// State every role machine carries: codec, event sender, outgoing queue,
/// supervisor and transport readiness.
#[derive(Debug)]
pub struct MachineCore<E: RoleEvent> {
    pub role: Role,
    pub codec: &'static dyn WireCodec,
    pub supervisor: HandshakeSupervisor,
    pub transport_ready: bool,
    events: Sender<E>,
    outgoing: Vec<OutgoingCommand>,
}

impl<E: RoleEvent> MachineCore<E> {
    pub fn new(
        role: Role,
        codec: &'static dyn WireCodec,
        handshake: &HandshakeConfig,
        events: Sender<E>,
    ) -> Self {
        Self {
            role,
            codec,
            supervisor: HandshakeSupervisor::from_config(handshake),
            transport_ready: false,
            events,
            outgoing: Vec::new(),
        }
    }

    /// Queue an event; a dropped receiver only loses the event.
    pub fn emit(&self, event: E) {
        trace!(role = self.role.as_str(), ?event, "Event");
        if self.events.send(event).is_err() {
            trace!(role = self.role.as_str(), "Event receiver dropped");
        }
    }

    pub fn diagnostic(&self, d: Diagnostic) {
        self.emit(E::diagnostic(d));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(E::error(message.into()));
    }

    /// Encode and queue an outgoing message.
    pub fn send(&mut self, msg: Outgoing) {
        match self.codec.encode_message(&msg) {
            Some(cmd) => {
                debug!(
                    role = self.role.as_str(),
                    kind = ?msg.kind(),
                    opcode = format_args!("{:#06x}", cmd.opcode),
                    len = cmd.payload.len(),
                    "Queued message"
                );
                self.outgoing.push(cmd);
            }
            None => warn!(
                role = self.role.as_str(),
                kind = ?msg.kind(),
                variant = ?self.codec.variant(),
                "No opcode for message on this wire, not sent"
            ),
        }
    }

    pub fn take_outgoing(&mut self) -> Vec<OutgoingCommand> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn clear_outgoing(&mut self) {
        self.outgoing.clear();
    }

    /// Map, transform-reverse, size-check and decode one message.
    ///
    /// Returns `None` for opcodes outside the variant's table.
    pub fn decode(&mut self, opcode: u16, payload: &[u8]) -> Option<Decoded> {
        let Some(kind) = self.codec.opcodes().kind(opcode) else {
            debug!(role = self.role.as_str(), opcode = format_args!("{opcode:#06x}"), "Unknown opcode");
            self.diagnostic(Diagnostic::UnknownOpcode { opcode });
            return None;
        };

        let transformed;
        let body: &[u8] = match self.codec.payload_transform(kind) {
            Some(family) => {
                let out = transform::reverse(family, payload);
                if !out.inflated {
                    self.diagnostic(Diagnostic::TransformFallback { kind });
                }
                transformed = out.bytes;
                &transformed
            }
            None => payload,
        };

        if let Some(mismatch) = size_check::check(self.codec.variant(), kind, body.len()) {
            warn!(role = self.role.as_str(), %mismatch, "Payload size mismatch");
            global_metrics().size_mismatch();
            self.diagnostic(Diagnostic::SizeMismatch(mismatch));
        }

        let message = self.codec.decode_inbound(kind, body);
        if message.is_none() {
            debug!(role = self.role.as_str(), ?kind, len = body.len(), "Decode failed");
        }
        Some(Decoded { kind, message })
    }

    /// Run the supervisor; emits the reconnect or failure event.
    ///
    /// Returns the verdict so the machine can move its state.
    pub fn supervise(&mut self, now: Instant) -> SupervisorVerdict {
        let verdict = self.supervisor.poll(now);
        match verdict {
            SupervisorVerdict::Idle => {}
            SupervisorVerdict::Reconnect { attempt } => {
                warn!(
                    role = self.role.as_str(),
                    attempt,
                    max = self.supervisor.max_attempts(),
                    "Handshake timed out, requesting reconnect"
                );
                global_metrics().reconnect_requested();
                self.transport_ready = false;
                self.outgoing.clear();
                self.emit(E::reconnect_required(attempt));
            }
            SupervisorVerdict::Exhausted { attempts } => {
                warn!(role = self.role.as_str(), attempts, "Reconnect budget exhausted");
                self.transport_ready = false;
                self.outgoing.clear();
                self.emit(E::failed(
                    crate::error::constants::ERR_RECONNECT_BUDGET.to_string(),
                ));
            }
        }
        verdict
    }

    pub fn transport_error(&self, error: &ProtocolError) {
        warn!(role = self.role.as_str(), %error, "Transport error");
        global_metrics().socket_error();
        self.error(error.to_string());
    }
}
