//! World (character select) connection state machine.

use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use once_cell::sync::Lazy;
use tracing::{debug, info, instrument, trace};

use crate::config::HandshakeConfig;
use crate::core::packet::OutgoingCommand;
use crate::error::constants::{ERR_CHARACTER_LIST_DECODE, ERR_WRONG_STATE, ERR_ZONE_SERVER_DECODE};
use crate::error::ProtocolError;
use crate::protocol::codec::WireCodec;
use crate::protocol::commands::WorldCommand;
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::events::{Diagnostic, WorldEvent, WorldState};
use crate::protocol::machine::{MachineCore, ProtocolMachine, Role, SupervisorVerdict};
use crate::protocol::message::{Inbound, Outgoing};
use crate::protocol::opcodes::MessageKind;
use crate::protocol::records::{CharacterSummary, WorldLogin, ZoneServerInfo};
use crate::protocol::snapshot::Published;
use crate::utils::metrics::global_metrics;

static DISPATCH: Lazy<Dispatcher<WorldMachine>> = Lazy::new(|| {
    let mut d = Dispatcher::new();
    d.register(MessageKind::ApproveWorld, WorldMachine::on_approve_world)
        .register(MessageKind::ExpansionInfo, WorldMachine::on_expansion)
        .register(MessageKind::Motd, WorldMachine::on_motd)
        .register(MessageKind::CharacterList, WorldMachine::on_character_list)
        .register(MessageKind::ApproveName, WorldMachine::on_name_approval)
        .register(MessageKind::ZoneServerInfo, WorldMachine::on_zone_server)
        .register(MessageKind::ZoneUnavailable, WorldMachine::on_zone_unavailable);
    d
});

fn critical_error(kind: MessageKind) -> Option<&'static str> {
    match kind {
        MessageKind::CharacterList => Some(ERR_CHARACTER_LIST_DECODE),
        MessageKind::ZoneServerInfo => Some(ERR_ZONE_SERVER_DECODE),
        _ => None,
    }
}

pub struct WorldMachine {
    core: MachineCore<WorldEvent>,
    commands: Receiver<WorldCommand>,
    state: WorldState,
    published_state: Published<WorldState>,
    characters: Published<Vec<CharacterSummary>>,
    zone_server: Published<Option<ZoneServerInfo>>,
    login: Option<WorldLogin>,
    pending_name: Option<String>,
}

impl WorldMachine {
    pub fn new(
        codec: &'static dyn WireCodec,
        handshake: &HandshakeConfig,
        commands: Receiver<WorldCommand>,
        events: Sender<WorldEvent>,
    ) -> Self {
        Self {
            core: MachineCore::new(Role::World, codec, handshake, events),
            commands,
            state: WorldState::Disconnected,
            published_state: Published::new(WorldState::Disconnected),
            characters: Published::default(),
            zone_server: Published::new(None),
            login: None,
            pending_name: None,
        }
    }

    pub fn state(&self) -> WorldState {
        self.state
    }

    pub fn state_handle(&self) -> Published<WorldState> {
        self.published_state.clone()
    }

    pub fn characters(&self) -> Published<Vec<CharacterSummary>> {
        self.characters.clone()
    }

    /// Zone server address from the last successful enter-world.
    pub fn zone_server(&self) -> Published<Option<ZoneServerInfo>> {
        self.zone_server.clone()
    }

    fn transition(&mut self, next: WorldState) {
        debug!(from = ?self.state, to = ?next, "World state change");
        self.state = next;
        self.published_state.replace(next);
        self.core.emit(WorldEvent::StateChanged(next));
    }

    fn begin_handshake(&mut self, now: Instant) {
        let Some(login) = self.login.clone() else {
            return;
        };
        info!(account_id = login.account_id, "Sending world login");
        self.core.send(Outgoing::WorldLogin(login));
        self.core.supervisor.arm(now);
        self.transition(WorldState::AwaitingApproval);
    }

    fn apply_command(&mut self, cmd: WorldCommand, now: Instant) {
        let selecting = self.state == WorldState::CharacterSelect;
        match cmd {
            WorldCommand::Connect {
                account_id,
                session_key,
            } => {
                self.core.supervisor.reset();
                self.core.clear_outgoing();
                self.login = Some(WorldLogin {
                    account_id,
                    session_key,
                    zoning: false,
                });
                self.pending_name = None;
                self.zone_server.replace(None);
                self.transition(WorldState::Connecting);
                if self.core.transport_ready {
                    self.begin_handshake(now);
                }
            }
            WorldCommand::CheckName(request) if selecting => {
                self.pending_name = Some(request.name.clone());
                self.core.send(Outgoing::ApproveName(request));
            }
            WorldCommand::CreateCharacter(create) if selecting => {
                info!(name = %create.name, "Creating character");
                self.core.send(Outgoing::CharacterCreate(create));
            }
            WorldCommand::DeleteCharacter { name } if selecting => {
                info!(%name, "Deleting character");
                self.core.send(Outgoing::CharacterDelete { name });
            }
            WorldCommand::EnterWorld { name } if selecting => {
                info!(%name, "Entering world");
                self.core.send(Outgoing::EnterWorld { name });
                self.transition(WorldState::EnteringWorld);
            }
            WorldCommand::Disconnect => {
                self.core.supervisor.reset();
                self.core.clear_outgoing();
                self.transition(WorldState::Disconnected);
            }
            cmd => {
                debug!(?cmd, state = ?self.state, "Command not valid in state");
                self.core.error(ERR_WRONG_STATE);
            }
        }
    }

    fn on_approve_world(&mut self, _msg: Inbound, _now: Instant) {
        debug!("World approved session");
    }

    fn on_expansion(&mut self, msg: Inbound, _now: Instant) {
        if let Inbound::ExpansionInfo { flags } = msg {
            self.core.emit(WorldEvent::ExpansionInfo { flags });
        }
    }

    fn on_motd(&mut self, msg: Inbound, _now: Instant) {
        if let Inbound::Motd { text } = msg {
            self.core.emit(WorldEvent::Motd(text));
        }
    }

    fn on_character_list(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::CharacterList(characters) = msg else {
            return;
        };
        info!(count = characters.len(), "Character list received");
        self.characters.replace(characters);
        self.core
            .emit(WorldEvent::CharacterList(self.characters.get()));
        if self.state == WorldState::AwaitingApproval {
            self.transition(WorldState::CharacterSelect);
        }
    }

    fn on_name_approval(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::NameApproval { approved } = msg else {
            return;
        };
        let name = self.pending_name.take().unwrap_or_default();
        self.core.emit(WorldEvent::NameApproval { name, approved });
    }

    fn on_zone_server(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::ZoneServerInfo(info) = msg else {
            return;
        };
        if self.state != WorldState::EnteringWorld {
            debug!(state = ?self.state, "Unexpected zone server info");
            return;
        }
        info!(host = %info.host, port = info.port, "Zone handoff");
        self.zone_server.replace(Some(info.clone()));
        self.core.emit(WorldEvent::ZoneHandoff(info));
        self.transition(WorldState::ZoneHandoff);
    }

    fn on_zone_unavailable(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::ZoneUnavailable { zone_name } = msg else {
            return;
        };
        info!(zone = %zone_name, "Zone unavailable");
        self.core.emit(WorldEvent::ZoneUnavailable { zone_name });
        if self.state == WorldState::EnteringWorld {
            self.transition(WorldState::CharacterSelect);
        }
    }
}

impl ProtocolMachine for WorldMachine {
    fn role(&self) -> Role {
        Role::World
    }

    fn on_transport_open(&mut self, now: Instant) {
        self.core.transport_ready = true;
        if self.state == WorldState::Connecting {
            self.begin_handshake(now);
        }
    }

    fn on_transport_closed(&mut self, _now: Instant) {
        self.core.transport_ready = false;
        self.core.clear_outgoing();
        if !matches!(
            self.state,
            WorldState::Disconnected
                | WorldState::Connecting
                | WorldState::ZoneHandoff
                | WorldState::Failed
        ) {
            self.core.supervisor.disarm();
            self.transition(WorldState::Disconnected);
        }
    }

    fn on_transport_error(&mut self, error: &ProtocolError, _now: Instant) {
        self.core.transport_error(error);
    }

    #[instrument(level = "trace", skip(self, payload, now), fields(len = payload.len()))]
    fn handle_message(&mut self, opcode: u16, payload: &[u8], now: Instant) {
        if matches!(self.state, WorldState::Disconnected | WorldState::Failed) {
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
            None => trace!(kind = ?decoded.kind, "No world handler"),
        }
    }

    fn tick(&mut self, now: Instant) {
        while let Ok(cmd) = self.commands.try_recv() {
            self.apply_command(cmd, now);
        }

        match self.core.supervise(now) {
            SupervisorVerdict::Idle => {}
            SupervisorVerdict::Reconnect { .. } => self.transition(WorldState::Connecting),
            SupervisorVerdict::Exhausted { .. } => self.transition(WorldState::Failed),
        }
    }

    fn take_outgoing(&mut self) -> Vec<OutgoingCommand> {
        self.core.take_outgoing()
    }

    fn is_terminal(&self) -> bool {
        matches!(self.state, WorldState::ZoneHandoff | WorldState::Failed)
    }
}

impl std::fmt::Debug for WorldMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldMachine")
            .field("state", &self.state)
            .field("variant", &self.core.codec.variant())
            .finish()
    }
}
