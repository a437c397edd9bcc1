//! Login (auth) connection state machine.
//!
//! Session-ready and credentials go out together; an accepted login is
//! followed by the server-name exchange (legacy wire only) and the server
//! list. Choosing a server yields a [`SessionTicket`] for the world server.

use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use once_cell::sync::Lazy;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::HandshakeConfig;
use crate::core::packet::OutgoingCommand;
use crate::error::constants::{
    ERR_LOGIN_REJECTED, ERR_LOGIN_REPLY_DECODE, ERR_PLAY_REPLY_DECODE, ERR_SERVER_LIST_DECODE,
    ERR_WRONG_STATE,
};
use crate::error::ProtocolError;
use crate::protocol::codec::WireCodec;
use crate::protocol::commands::AuthCommand;
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::events::{AuthEvent, AuthState, Diagnostic, SessionTicket};
use crate::protocol::machine::{MachineCore, ProtocolMachine, Role, SupervisorVerdict};
use crate::protocol::message::{Inbound, Outgoing};
use crate::protocol::opcodes::MessageKind;
use crate::protocol::records::{Credentials, ServerEntry};
use crate::protocol::snapshot::Published;
use crate::utils::metrics::global_metrics;

static DISPATCH: Lazy<Dispatcher<AuthMachine>> = Lazy::new(|| {
    let mut d = Dispatcher::new();
    d.register(MessageKind::LoginReply, AuthMachine::on_login_reply)
        .register(MessageKind::ServerName, AuthMachine::on_server_name)
        .register(MessageKind::ServerList, AuthMachine::on_server_list)
        .register(MessageKind::PlayReply, AuthMachine::on_play_reply);
    d
});

fn critical_error(kind: MessageKind) -> Option<&'static str> {
    match kind {
        MessageKind::LoginReply => Some(ERR_LOGIN_REPLY_DECODE),
        MessageKind::ServerList => Some(ERR_SERVER_LIST_DECODE),
        MessageKind::PlayReply => Some(ERR_PLAY_REPLY_DECODE),
        _ => None,
    }
}

/// Account data carried from login reply to session ticket.
#[derive(Debug, Clone, Default)]
struct Account {
    id: u32,
    session_key: String,
}

pub struct AuthMachine {
    core: MachineCore<AuthEvent>,
    commands: Receiver<AuthCommand>,
    state: AuthState,
    published_state: Published<AuthState>,
    servers: Published<Vec<ServerEntry>>,
    ticket: Published<Option<SessionTicket>>,
    credentials: Option<Credentials>,
    account: Account,
    pending_server: Option<u32>,
}

impl AuthMachine {
    pub fn new(
        codec: &'static dyn WireCodec,
        handshake: &HandshakeConfig,
        commands: Receiver<AuthCommand>,
        events: Sender<AuthEvent>,
    ) -> Self {
        Self {
            core: MachineCore::new(Role::Auth, codec, handshake, events),
            commands,
            state: AuthState::Disconnected,
            published_state: Published::new(AuthState::Disconnected),
            servers: Published::default(),
            ticket: Published::new(None),
            credentials: None,
            account: Account::default(),
            pending_server: None,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn state_handle(&self) -> Published<AuthState> {
        self.published_state.clone()
    }

    /// Latest server list.
    pub fn servers(&self) -> Published<Vec<ServerEntry>> {
        self.servers.clone()
    }

    /// Ticket granted by the last successful play request.
    pub fn ticket(&self) -> Published<Option<SessionTicket>> {
        self.ticket.clone()
    }

    fn transition(&mut self, next: AuthState) {
        debug!(from = ?self.state, to = ?next, "Auth state change");
        self.state = next;
        self.published_state.replace(next);
        self.core.emit(AuthEvent::StateChanged(next));
    }

    fn begin_handshake(&mut self, now: Instant) {
        let Some(credentials) = self.credentials.clone() else {
            return;
        };
        info!(user = %credentials.username, "Sending login");
        self.core.send(Outgoing::SessionReady);
        self.core.send(Outgoing::Login(credentials));
        self.core.supervisor.arm(now);
        self.transition(AuthState::AwaitingLogin);
    }

    fn apply_command(&mut self, cmd: AuthCommand, now: Instant) {
        match cmd {
            AuthCommand::Connect(credentials) => {
                self.core.supervisor.reset();
                self.core.clear_outgoing();
                self.credentials = Some(credentials);
                self.account = Account::default();
                self.pending_server = None;
                self.ticket.replace(None);
                self.transition(AuthState::Connecting);
                if self.core.transport_ready {
                    self.begin_handshake(now);
                }
            }
            AuthCommand::RefreshServerList if self.state == AuthState::ServerSelect => {
                self.core.send(Outgoing::ServerListRequest);
            }
            AuthCommand::Play { server_id } if self.state == AuthState::ServerSelect => {
                info!(server_id, "Requesting play");
                self.pending_server = Some(server_id);
                self.core.send(Outgoing::PlayRequest { server_id });
                self.transition(AuthState::AwaitingPlay);
            }
            AuthCommand::Disconnect => {
                self.core.supervisor.reset();
                self.core.clear_outgoing();
                self.transition(AuthState::Disconnected);
            }
            cmd => {
                debug!(?cmd, state = ?self.state, "Command not valid in state");
                self.core.error(ERR_WRONG_STATE);
            }
        }
    }

    fn on_login_reply(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::LoginReply(reply) = msg else {
            return;
        };
        if self.state != AuthState::AwaitingLogin {
            debug!(state = ?self.state, "Unexpected login reply");
            return;
        }

        if !reply.accepted {
            warn!(code = reply.failure_code, "Login rejected");
            self.core.supervisor.reset();
            self.transition(AuthState::Failed);
            self.core.emit(AuthEvent::Failed(ERR_LOGIN_REJECTED.to_string()));
            return;
        }

        info!(account_id = reply.account_id, "Login accepted");
        self.account = Account {
            id: reply.account_id,
            session_key: reply.session_key,
        };
        self.core.emit(AuthEvent::LoginAccepted {
            account_id: reply.account_id,
        });

        if self.core.codec.has_server_name_step() {
            self.core.send(Outgoing::ServerNameRequest);
            self.transition(AuthState::AwaitingServerName);
        } else {
            self.core.send(Outgoing::ServerListRequest);
            self.transition(AuthState::AwaitingServerList);
        }
    }

    fn on_server_name(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::ServerName { name } = msg else {
            return;
        };
        self.core.emit(AuthEvent::ServerName { name });
        if self.state == AuthState::AwaitingServerName {
            self.core.send(Outgoing::ServerListRequest);
            self.transition(AuthState::AwaitingServerList);
        }
    }

    fn on_server_list(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::ServerList(servers) = msg else {
            return;
        };
        info!(count = servers.len(), "Server list received");
        self.servers.replace(servers);
        self.core.emit(AuthEvent::ServerList(self.servers.get()));
        if self.state == AuthState::AwaitingServerList {
            self.transition(AuthState::ServerSelect);
        }
    }

    fn on_play_reply(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::PlayReply(reply) = msg else {
            return;
        };
        if self.state != AuthState::AwaitingPlay {
            debug!(state = ?self.state, "Unexpected play reply");
            return;
        }
        if self.pending_server.is_some_and(|id| id != reply.server_id) {
            debug!(
                expected = ?self.pending_server,
                got = reply.server_id,
                "Play reply for a different server"
            );
        }

        if !reply.allowed {
            info!(server_id = reply.server_id, reason = reply.reason, "Play denied");
            self.pending_server = None;
            self.core.emit(AuthEvent::PlayDenied {
                server_id: reply.server_id,
                reason: reply.reason,
            });
            self.transition(AuthState::ServerSelect);
            return;
        }

        let world_address = self
            .servers
            .get()
            .iter()
            .find(|s| s.id == reply.server_id)
            .map(|s| s.address.clone())
            .unwrap_or_default();
        let ticket = SessionTicket {
            account_id: self.account.id,
            session_key: self.account.session_key.clone(),
            server_id: reply.server_id,
            world_address,
        };
        info!(server_id = ticket.server_id, address = %ticket.world_address, "Session granted");
        self.ticket.replace(Some(ticket.clone()));
        self.core.emit(AuthEvent::SessionGranted(ticket));
        self.transition(AuthState::Authenticated);
    }
}

impl ProtocolMachine for AuthMachine {
    fn role(&self) -> Role {
        Role::Auth
    }

    fn on_transport_open(&mut self, now: Instant) {
        self.core.transport_ready = true;
        if self.state == AuthState::Connecting {
            self.begin_handshake(now);
        }
    }

    fn on_transport_closed(&mut self, _now: Instant) {
        self.core.transport_ready = false;
        self.core.clear_outgoing();
        if !matches!(
            self.state,
            AuthState::Disconnected
                | AuthState::Connecting
                | AuthState::Authenticated
                | AuthState::Failed
        ) {
            self.core.supervisor.disarm();
            self.transition(AuthState::Disconnected);
        }
    }

    fn on_transport_error(&mut self, error: &ProtocolError, _now: Instant) {
        self.core.transport_error(error);
    }

    #[instrument(level = "trace", skip(self, payload, now), fields(len = payload.len()))]
    fn handle_message(&mut self, opcode: u16, payload: &[u8], now: Instant) {
        if matches!(self.state, AuthState::Disconnected | AuthState::Failed) {
            trace!(state = ?self.state, "Message outside a session, dropped");
            return;
        }
        self.core.supervisor.disarm();

        let Some(decoded) = self.core.decode(opcode, payload) else {
            return;
        };
        let Some(message) = decoded.message else {
            global_metrics().decode_failure();
            match critical_error(decoded.kind) {
                Some(err) => self.core.error(err),
                None => self.core.diagnostic(Diagnostic::Dropped { kind: decoded.kind }),
            }
            return;
        };

        match DISPATCH.handler(decoded.kind) {
            Some(handler) => handler(self, message, now),
            None => trace!(kind = ?decoded.kind, "No auth handler"),
        }
    }

    fn tick(&mut self, now: Instant) {
        while let Ok(cmd) = self.commands.try_recv() {
            self.apply_command(cmd, now);
        }

        match self.core.supervise(now) {
            SupervisorVerdict::Idle => {}
            SupervisorVerdict::Reconnect { .. } => self.transition(AuthState::Connecting),
            SupervisorVerdict::Exhausted { .. } => self.transition(AuthState::Failed),
        }
    }

    fn take_outgoing(&mut self) -> Vec<OutgoingCommand> {
        self.core.take_outgoing()
    }

    fn is_terminal(&self) -> bool {
        matches!(self.state, AuthState::Authenticated | AuthState::Failed)
    }
}

impl std::fmt::Debug for AuthMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthMachine")
            .field("state", &self.state)
            .field("credentials", &self.credentials)
            .field("variant", &self.core.codec.variant())
            .finish()
    }
}
