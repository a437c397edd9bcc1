use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::error::constants::ERR_SESSION_LAYER_REQUIRED;
use crate::error::{ProtocolError, Result};
use crate::protocol::auth::AuthMachine;
use crate::protocol::codec::codec_for;
use crate::protocol::commands::{AuthCommand, WorldCommand, ZoneCommand};
use crate::protocol::events::{
    AuthEvent, AuthState, RoleEvent, SessionTicket, WorldEvent, WorldState, ZoneEvent, ZoneState,
};
use crate::protocol::opcodes::WireVariant;
use crate::protocol::records::*;
use crate::protocol::snapshot::{Inventory, Published, SpawnTable, ZoneView};
use crate::protocol::world::WorldMachine;
use crate::protocol::zone::ZoneMachine;
use crate::transport::udp::{IoCommand, NetworkThread};

/// Channels and network thread shared by every role client.
#[derive(Debug)]
struct Connection<C, E> {
    commands: Sender<C>,
    events: Receiver<E>,
    io: NetworkThread,
    shutdown_timeout: Duration,
}

impl<C, E: RoleEvent> Connection<C, E> {
    fn command(&self, cmd: C) -> Result<()> {
        self.commands
            .send(cmd)
            .map_err(|_| ProtocolError::ChannelClosed)
    }

    fn io(&self, cmd: IoCommand) -> Result<()> {
        self.io.send(cmd)
    }

    /// Pending events. A reconnect request is answered with a fresh socket
    /// before the event is handed out.
    fn drain_events(&self) -> Vec<E> {
        let events: Vec<E> = self.events.try_iter().collect();
        for event in &events {
            if let Some(attempt) = event.reconnect_attempt() {
                info!(attempt, "Reconnect requested");
                if let Err(e) = self.io.send(IoCommand::Reconnect) {
                    warn!(error = %e, "Network thread gone, reconnect not issued");
                }
            }
        }
        events
    }

    fn shutdown(&mut self) -> Result<()> {
        self.io.shutdown(self.shutdown_timeout)
    }
}

fn legacy_only(config: &ClientConfig) -> Result<()> {
    match config.client.wire {
        WireVariant::Legacy => Ok(()),
        WireVariant::Modern => Err(ProtocolError::ConfigError(
            ERR_SESSION_LAYER_REQUIRED.to_string(),
        )),
    }
}

fn parse_address(address: &str) -> Result<SocketAddr> {
    address
        .parse()
        .map_err(|e| ProtocolError::ConfigError(format!("Invalid address '{address}': {e}")))
}

/// Login server client.
#[derive(Debug)]
pub struct AuthClient {
    conn: Connection<AuthCommand, AuthEvent>,
    login_address: SocketAddr,
    state: Published<AuthState>,
    servers: Published<Vec<ServerEntry>>,
    ticket: Published<Option<SessionTicket>>,
}

impl AuthClient {
    /// Spawn the auth machine and its network thread.
    ///
    /// # Errors
    /// Invalid configuration, a modern wire selection, or thread spawn failure.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate_strict()?;
        legacy_only(config)?;
        let login_address = parse_address(&config.client.login_address)?;

        let (cmd_tx, cmd_rx) = unbounded();
        let (ev_tx, ev_rx) = unbounded();
        let machine = AuthMachine::new(
            codec_for(config.client.wire),
            &config.handshake,
            cmd_rx,
            ev_tx,
        );
        let state = machine.state_handle();
        let servers = machine.servers();
        let ticket = machine.ticket();
        let io = NetworkThread::spawn(machine, config.transport.clone())?;

        Ok(Self {
            conn: Connection {
                commands: cmd_tx,
                events: ev_rx,
                io,
                shutdown_timeout: config.client.shutdown_timeout,
            },
            login_address,
            state,
            servers,
            ticket,
        })
    }

    #[instrument(skip(self, credentials), fields(user = %credentials.username))]
    pub fn connect(&self, credentials: Credentials) -> Result<()> {
        self.conn.command(AuthCommand::Connect(credentials))?;
        self.conn.io(IoCommand::Connect(self.login_address))
    }

    pub fn refresh_server_list(&self) -> Result<()> {
        self.conn.command(AuthCommand::RefreshServerList)
    }

    pub fn play(&self, server_id: u32) -> Result<()> {
        self.conn.command(AuthCommand::Play { server_id })
    }

    pub fn disconnect(&self) -> Result<()> {
        self.conn.command(AuthCommand::Disconnect)?;
        self.conn.io(IoCommand::Disconnect)
    }

    pub fn drain_events(&self) -> Vec<AuthEvent> {
        self.conn.drain_events()
    }

    /// Receiver for listener-style consumption. Reconnect requests seen
    /// here must be answered with [`AuthClient::reconnect`].
    pub fn events(&self) -> &Receiver<AuthEvent> {
        &self.conn.events
    }

    pub fn reconnect(&self) -> Result<()> {
        self.conn.io(IoCommand::Reconnect)
    }

    pub fn state(&self) -> AuthState {
        *self.state.get()
    }

    pub fn servers(&self) -> Arc<Vec<ServerEntry>> {
        self.servers.get()
    }

    pub fn ticket(&self) -> Option<SessionTicket> {
        (*self.ticket.get()).clone()
    }

    pub fn shutdown(mut self) -> Result<()> {
        self.conn.shutdown()
    }
}

/// World server client.
#[derive(Debug)]
pub struct WorldClient {
    conn: Connection<WorldCommand, WorldEvent>,
    state: Published<WorldState>,
    characters: Published<Vec<CharacterSummary>>,
    zone_server: Published<Option<ZoneServerInfo>>,
}

impl WorldClient {
    /// # Errors
    /// Invalid configuration, a modern wire selection, or thread spawn failure.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate_strict()?;
        legacy_only(config)?;

        let (cmd_tx, cmd_rx) = unbounded();
        let (ev_tx, ev_rx) = unbounded();
        let machine = WorldMachine::new(
            codec_for(config.client.wire),
            &config.handshake,
            cmd_rx,
            ev_tx,
        );
        let state = machine.state_handle();
        let characters = machine.characters();
        let zone_server = machine.zone_server();
        let io = NetworkThread::spawn(machine, config.transport.clone())?;

        Ok(Self {
            conn: Connection {
                commands: cmd_tx,
                events: ev_rx,
                io,
                shutdown_timeout: config.client.shutdown_timeout,
            },
            state,
            characters,
            zone_server,
        })
    }

    /// Connect with a ticket from the login server.
    pub fn connect(&self, ticket: &SessionTicket) -> Result<()> {
        let address = parse_address(&ticket.world_address)?;
        self.connect_to(address, ticket.account_id, ticket.session_key.clone())
    }

    #[instrument(skip(self, session_key))]
    pub fn connect_to(&self, address: SocketAddr, account_id: u32, session_key: String) -> Result<()> {
        self.conn.command(WorldCommand::Connect {
            account_id,
            session_key,
        })?;
        self.conn.io(IoCommand::Connect(address))
    }

    pub fn check_name(&self, request: NameApprovalRequest) -> Result<()> {
        self.conn.command(WorldCommand::CheckName(request))
    }

    pub fn create_character(&self, create: CharacterCreate) -> Result<()> {
        self.conn.command(WorldCommand::CreateCharacter(create))
    }

    pub fn delete_character(&self, name: impl Into<String>) -> Result<()> {
        self.conn
            .command(WorldCommand::DeleteCharacter { name: name.into() })
    }

    pub fn enter_world(&self, name: impl Into<String>) -> Result<()> {
        self.conn
            .command(WorldCommand::EnterWorld { name: name.into() })
    }

    pub fn disconnect(&self) -> Result<()> {
        self.conn.command(WorldCommand::Disconnect)?;
        self.conn.io(IoCommand::Disconnect)
    }

    pub fn drain_events(&self) -> Vec<WorldEvent> {
        self.conn.drain_events()
    }

    pub fn events(&self) -> &Receiver<WorldEvent> {
        &self.conn.events
    }

    pub fn reconnect(&self) -> Result<()> {
        self.conn.io(IoCommand::Reconnect)
    }

    pub fn state(&self) -> WorldState {
        *self.state.get()
    }

    pub fn characters(&self) -> Arc<Vec<CharacterSummary>> {
        self.characters.get()
    }

    pub fn zone_server(&self) -> Option<ZoneServerInfo> {
        (*self.zone_server.get()).clone()
    }

    pub fn shutdown(mut self) -> Result<()> {
        self.conn.shutdown()
    }
}

/// Zone server client. Every action only enqueues a command.
#[derive(Debug)]
pub struct ZoneClient {
    conn: Connection<ZoneCommand, ZoneEvent>,
    state: Published<ZoneState>,
    view: ZoneView,
}

impl ZoneClient {
    /// # Errors
    /// Invalid configuration, a modern wire selection, or thread spawn failure.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate_strict()?;
        legacy_only(config)?;

        let (cmd_tx, cmd_rx) = unbounded();
        let (ev_tx, ev_rx) = unbounded();
        let machine = ZoneMachine::new(
            codec_for(config.client.wire),
            &config.handshake,
            cmd_rx,
            ev_tx,
        );
        let state = machine.state_handle();
        let view = machine.view();
        let io = NetworkThread::spawn(machine, config.transport.clone())?;

        Ok(Self {
            conn: Connection {
                commands: cmd_tx,
                events: ev_rx,
                io,
                shutdown_timeout: config.client.shutdown_timeout,
            },
            state,
            view,
        })
    }

    /// Connect to the zone server named by the world handoff. The host is
    /// resolved on the network thread; a failed lookup arrives as an event.
    pub fn connect(&self, server: &ZoneServerInfo, character: impl Into<String>) -> Result<()> {
        let character = character.into();
        debug!(host = %server.host, port = server.port, %character, "Zone connect");
        self.conn.command(ZoneCommand::Connect { character })?;
        self.conn.io(IoCommand::ConnectHost {
            host: server.host.clone(),
            port: server.port,
        })
    }

    pub fn connect_to(&self, address: SocketAddr, character: impl Into<String>) -> Result<()> {
        let character = character.into();
        debug!(%address, %character, "Zone connect");
        self.conn.command(ZoneCommand::Connect { character })?;
        self.conn.io(IoCommand::Connect(address))
    }

    pub fn move_to(&self, position: SpawnPosition) -> Result<()> {
        self.conn.command(ZoneCommand::Move(position))
    }

    pub fn chat(&self, channel: u16, target: impl Into<String>, message: impl Into<String>) -> Result<()> {
        self.conn.command(ZoneCommand::Chat {
            channel,
            target: target.into(),
            message: message.into(),
        })
    }

    pub fn target(&self, target_id: u32) -> Result<()> {
        self.conn.command(ZoneCommand::Target { target_id })
    }

    pub fn consider(&self, target_id: u32) -> Result<()> {
        self.conn.command(ZoneCommand::Consider { target_id })
    }

    pub fn cast(&self, slot: u16, spell_id: u16, target_id: u32) -> Result<()> {
        self.conn.command(ZoneCommand::Cast {
            slot,
            spell_id,
            target_id,
        })
    }

    pub fn loot(&self, corpse_id: u32) -> Result<()> {
        self.conn.command(ZoneCommand::Loot { corpse_id })
    }

    pub fn loot_item(&self, corpse_id: u32, slot: u16) -> Result<()> {
        self.conn.command(ZoneCommand::LootItem { corpse_id, slot })
    }

    pub fn end_loot(&self, corpse_id: u32) -> Result<()> {
        self.conn.command(ZoneCommand::EndLoot { corpse_id })
    }

    pub fn trade_request(&self, target_id: u32) -> Result<()> {
        self.conn.command(ZoneCommand::TradeRequest { target_id })
    }

    pub fn trade_accept(&self, from_id: u32) -> Result<()> {
        self.conn.command(ZoneCommand::TradeAccept { from_id })
    }

    pub fn trade_cancel(&self, from_id: u32) -> Result<()> {
        self.conn.command(ZoneCommand::TradeCancel { from_id })
    }

    pub fn shop_open(&self, npc_id: u32) -> Result<()> {
        self.conn.command(ZoneCommand::ShopOpen { npc_id })
    }

    pub fn buy(&self, npc_id: u32, slot: u32, quantity: u32) -> Result<()> {
        self.conn.command(ZoneCommand::ShopBuy {
            npc_id,
            slot,
            quantity,
        })
    }

    pub fn shop_close(&self, npc_id: u32) -> Result<()> {
        self.conn.command(ZoneCommand::ShopClose { npc_id })
    }

    pub fn equip(&self, from_slot: u32, to_slot: u32, count: u32) -> Result<()> {
        self.conn.command(ZoneCommand::Equip(MoveItem {
            from_slot,
            to_slot,
            count,
        }))
    }

    pub fn group_invite(&self, name: impl Into<String>) -> Result<()> {
        self.conn
            .command(ZoneCommand::GroupInvite { name: name.into() })
    }

    pub fn group_follow(&self, inviter: impl Into<String>) -> Result<()> {
        self.conn.command(ZoneCommand::GroupFollow {
            inviter: inviter.into(),
        })
    }

    pub fn group_disband(&self) -> Result<()> {
        self.conn.command(ZoneCommand::GroupDisband)
    }

    pub fn camp(&self) -> Result<()> {
        self.conn.command(ZoneCommand::Camp)
    }

    pub fn logout(&self) -> Result<()> {
        self.conn.command(ZoneCommand::Logout)
    }

    pub fn disconnect(&self) -> Result<()> {
        self.conn.command(ZoneCommand::Disconnect)?;
        self.conn.io(IoCommand::Disconnect)
    }

    pub fn drain_events(&self) -> Vec<ZoneEvent> {
        self.conn.drain_events()
    }

    pub fn events(&self) -> &Receiver<ZoneEvent> {
        &self.conn.events
    }

    pub fn reconnect(&self) -> Result<()> {
        self.conn.io(IoCommand::Reconnect)
    }

    pub fn state(&self) -> ZoneState {
        *self.state.get()
    }

    pub fn profile(&self) -> Option<PlayerProfile> {
        (*self.view.profile.get()).clone()
    }

    pub fn spawns(&self) -> Arc<SpawnTable> {
        self.view.spawns.get()
    }

    pub fn inventory(&self) -> Arc<Inventory> {
        self.view.inventory.get()
    }

    pub fn own_spawn_id(&self) -> Option<u32> {
        *self.view.own_spawn_id.get()
    }

    pub fn shutdown(mut self) -> Result<()> {
        self.conn.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modern_wire_needs_session_layer() {
        let config = ClientConfig::default_with_overrides(|c| c.client.wire = WireVariant::Modern);
        assert!(matches!(
            AuthClient::new(&config),
            Err(ProtocolError::ConfigError(_))
        ));
    }
}
