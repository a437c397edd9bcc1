//! Zone (simulation) connection state machine.
//!
//! Handshake: `ZoneEntry` → profile → filter + zone request → zone metadata →
//! spawn request → own identity assignment → in zone. Once in zone, inbound
//! messages maintain the spawn table, profile and inventory snapshots and
//! consumer commands become gameplay messages.

use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use once_cell::sync::Lazy;
use tracing::{debug, info, instrument, trace};

use crate::config::HandshakeConfig;
use crate::core::packet::OutgoingCommand;
use crate::error::constants::{ERR_NOT_IN_ZONE, ERR_PROFILE_DECODE, ERR_ZONE_DECODE};
use crate::error::ProtocolError;
use crate::protocol::codec::WireCodec;
use crate::protocol::commands::ZoneCommand;
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::events::{Diagnostic, ZoneEvent, ZoneState};
use crate::protocol::machine::{MachineCore, ProtocolMachine, Role, SupervisorVerdict};
use crate::protocol::message::{Inbound, Outgoing};
use crate::protocol::opcodes::MessageKind;
use crate::protocol::records::*;
use crate::protocol::snapshot::{Published, SpawnTable, ZoneView};
use crate::utils::metrics::global_metrics;

static DISPATCH: Lazy<Dispatcher<ZoneMachine>> = Lazy::new(|| {
    let mut d = Dispatcher::new();
    d.register(MessageKind::PlayerProfile, ZoneMachine::on_profile)
        .register(MessageKind::NewZone, ZoneMachine::on_new_zone)
        .register(MessageKind::ZoneSpawns, ZoneMachine::on_zone_spawns)
        .register(MessageKind::NewSpawn, ZoneMachine::on_new_spawn)
        .register(MessageKind::DeleteSpawn, ZoneMachine::on_delete_spawn)
        .register(MessageKind::SpawnPositions, ZoneMachine::on_positions)
        .register(MessageKind::SpawnAppearance, ZoneMachine::on_appearance)
        .register(MessageKind::HpUpdate, ZoneMachine::on_hp)
        .register(MessageKind::ItemPacket, ZoneMachine::on_item)
        .register(MessageKind::DeleteItem, ZoneMachine::on_delete_item)
        .register(MessageKind::MoneyUpdate, ZoneMachine::on_money)
        .register(MessageKind::ExpUpdate, ZoneMachine::on_exp)
        .register(MessageKind::LevelUpdate, ZoneMachine::on_level)
        .register(MessageKind::LogoutReply, ZoneMachine::on_logout)
        .register(MessageKind::Damage, ZoneMachine::on_notice)
        .register(MessageKind::Death, ZoneMachine::on_notice)
        .register(MessageKind::ChannelMessage, ZoneMachine::on_notice)
        .register(MessageKind::Consider, ZoneMachine::on_notice)
        .register(MessageKind::BeginCast, ZoneMachine::on_notice)
        .register(MessageKind::LootResponse, ZoneMachine::on_notice)
        .register(MessageKind::TimeOfDay, ZoneMachine::on_notice)
        .register(MessageKind::Weather, ZoneMachine::on_notice)
        .register(MessageKind::TradeRequest, ZoneMachine::on_notice)
        .register(MessageKind::TradeAccept, ZoneMachine::on_notice)
        .register(MessageKind::TradeCancel, ZoneMachine::on_notice)
        .register(MessageKind::ShopRequest, ZoneMachine::on_notice)
        .register(MessageKind::GroupInvite, ZoneMachine::on_notice)
        .register(MessageKind::GroupUpdate, ZoneMachine::on_notice)
        .register(MessageKind::ZoneChange, ZoneMachine::on_notice);
    d
});

/// Error raised when a handshake-critical kind fails to decode.
fn critical_error(kind: MessageKind) -> Option<&'static str> {
    match kind {
        MessageKind::PlayerProfile => Some(ERR_PROFILE_DECODE),
        MessageKind::NewZone => Some(ERR_ZONE_DECODE),
        _ => None,
    }
}

pub struct ZoneMachine {
    core: MachineCore<ZoneEvent>,
    commands: Receiver<ZoneCommand>,
    state: ZoneState,
    published_state: Published<ZoneState>,
    view: ZoneView,
    character: Option<String>,
}

impl ZoneMachine {
    pub fn new(
        codec: &'static dyn WireCodec,
        handshake: &HandshakeConfig,
        commands: Receiver<ZoneCommand>,
        events: Sender<ZoneEvent>,
    ) -> Self {
        Self {
            core: MachineCore::new(Role::Zone, codec, handshake, events),
            commands,
            state: ZoneState::Disconnected,
            published_state: Published::new(ZoneState::Disconnected),
            view: ZoneView::default(),
            character: None,
        }
    }

    pub fn state(&self) -> ZoneState {
        self.state
    }

    /// Shared handle onto the published state.
    pub fn state_handle(&self) -> Published<ZoneState> {
        self.published_state.clone()
    }

    /// Shared handles onto the published snapshots.
    pub fn view(&self) -> ZoneView {
        self.view.clone()
    }

    fn transition(&mut self, next: ZoneState) {
        debug!(from = ?self.state, to = ?next, "Zone state change");
        self.state = next;
        self.published_state.replace(next);
        self.core.emit(ZoneEvent::StateChanged(next));
    }

    fn own_id(&self) -> u32 {
        self.view.own_spawn_id.get().unwrap_or(0)
    }

    fn own_name(&self) -> String {
        self.character.clone().unwrap_or_default()
    }

    fn begin_handshake(&mut self, now: Instant) {
        let name = self.own_name();
        info!(character = %name, "Requesting zone entry");
        self.core.send(Outgoing::ZoneEntry { name });
        self.core.supervisor.arm(now);
        self.transition(ZoneState::AwaitingProfile);
    }

    fn apply_command(&mut self, cmd: ZoneCommand, now: Instant) {
        if cmd.requires_zone() && self.state != ZoneState::InZone {
            debug!(?cmd, state = ?self.state, "Rejected command outside zone");
            self.core.error(ERR_NOT_IN_ZONE);
            return;
        }

        let me = self.own_id();
        let msg = match cmd {
            ZoneCommand::Connect { character } => {
                self.core.supervisor.reset();
                self.core.clear_outgoing();
                self.character = Some(character);
                self.view.own_spawn_id.replace(None);
                self.transition(ZoneState::Connecting);
                if self.core.transport_ready {
                    self.begin_handshake(now);
                }
                return;
            }
            ZoneCommand::Disconnect => {
                self.core.supervisor.reset();
                self.core.clear_outgoing();
                self.transition(ZoneState::Disconnected);
                return;
            }
            ZoneCommand::Move(mut position) => {
                position.spawn_id = me;
                Outgoing::ClientPosition(position)
            }
            ZoneCommand::Chat {
                channel,
                target,
                message,
            } => Outgoing::ChannelMessage(ChatMessage {
                target,
                sender: self.own_name(),
                language: 0,
                channel,
                message,
            }),
            ZoneCommand::Target { target_id } => Outgoing::Target { target_id },
            ZoneCommand::Consider { target_id } => Outgoing::Consider(Consider {
                player_id: me,
                target_id,
                faction: 0,
                level_con: 0,
            }),
            ZoneCommand::Cast {
                slot,
                spell_id,
                target_id,
            } => Outgoing::CastSpell(CastSpell {
                slot,
                spell_id,
                target_id,
            }),
            ZoneCommand::Loot { corpse_id } => Outgoing::LootRequest { corpse_id },
            ZoneCommand::LootItem { corpse_id, slot } => Outgoing::LootItem(LootItem {
                corpse_id,
                looter_id: me,
                slot,
                auto_loot: false,
            }),
            ZoneCommand::EndLoot { corpse_id } => Outgoing::EndLoot { corpse_id },
            ZoneCommand::TradeRequest { target_id } => Outgoing::TradeRequest(TradeRequest {
                to_id: target_id,
                from_id: me,
            }),
            ZoneCommand::TradeAccept { from_id } => Outgoing::TradeAccept { from_id },
            ZoneCommand::TradeCancel { from_id } => Outgoing::TradeCancel { from_id },
            ZoneCommand::ShopOpen { npc_id } => Outgoing::ShopRequest(ShopRequest {
                npc_id,
                player_id: me,
            }),
            ZoneCommand::ShopBuy {
                npc_id,
                slot,
                quantity,
            } => Outgoing::ShopBuy(ShopBuy {
                npc_id,
                player_id: me,
                slot,
                quantity,
            }),
            ZoneCommand::ShopClose { npc_id } => Outgoing::ShopEnd(ShopRequest {
                npc_id,
                player_id: me,
            }),
            ZoneCommand::Equip(mv) => Outgoing::MoveItem(mv),
            ZoneCommand::GroupInvite { name } => Outgoing::GroupInvite(GroupPair {
                actor: self.own_name(),
                subject: name,
            }),
            ZoneCommand::GroupFollow { inviter } => Outgoing::GroupFollow(GroupPair {
                actor: self.own_name(),
                subject: inviter,
            }),
            ZoneCommand::GroupDisband => Outgoing::GroupDisband(GroupPair {
                actor: self.own_name(),
                subject: self.own_name(),
            }),
            ZoneCommand::Camp => Outgoing::Camp,
            ZoneCommand::Logout => Outgoing::Logout,
        };
        self.core.send(msg);
    }

    fn on_profile(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::PlayerProfile(profile) = msg else {
            return;
        };
        info!(name = %profile.name, level = profile.level, zone = profile.zone_id, "Profile loaded");
        self.view.profile.replace(Some(profile.clone()));
        self.core.emit(ZoneEvent::ProfileLoaded(std::sync::Arc::new(profile)));

        if self.state == ZoneState::AwaitingProfile {
            self.core.send(Outgoing::SetFilter(vec![1; FILTER_COUNT]));
            self.core.send(Outgoing::ReqNewZone);
            self.transition(ZoneState::AwaitingZoneData);
        }
    }

    fn on_new_zone(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::NewZone(zone) = msg else {
            return;
        };
        info!(zone = %zone.short_name, "Zone metadata received");
        self.core.emit(ZoneEvent::ZoneInfo(zone));

        if self.state == ZoneState::AwaitingZoneData {
            self.core.send(Outgoing::ReqClientSpawn);
            self.transition(ZoneState::RequestingSpawns);
        }
    }

    fn on_zone_spawns(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::ZoneSpawns(spawns) = msg else {
            return;
        };
        let count = spawns.len();
        self.view.spawns.replace(SpawnTable::from_spawns(spawns));
        self.core.emit(ZoneEvent::SpawnsLoaded { count });
    }

    fn on_new_spawn(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::NewSpawn(spawn) = msg else {
            return;
        };
        self.view.spawns.update(|t| t.with_spawn(spawn.clone()));
        self.core.emit(ZoneEvent::SpawnAdded(spawn));
    }

    fn on_delete_spawn(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::DeleteSpawn { spawn_id } = msg else {
            return;
        };
        self.view.spawns.update(|t| t.without(spawn_id));
        self.core.emit(ZoneEvent::SpawnRemoved { spawn_id });
    }

    fn on_positions(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::SpawnPositions(positions) = msg else {
            return;
        };
        self.view.spawns.update(|t| t.with_positions(&positions));
        for p in positions {
            self.core.emit(ZoneEvent::SpawnMoved(p));
        }
    }

    fn on_appearance(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::SpawnAppearance(appearance) = msg else {
            return;
        };
        let Some(spawn_id) = appearance.assigned_identity() else {
            self.core.emit(ZoneEvent::AppearanceChanged(appearance));
            return;
        };

        match self.state {
            ZoneState::RequestingSpawns => {
                info!(spawn_id, "Own spawn id assigned");
                self.view.own_spawn_id.replace(Some(spawn_id));
                self.core.emit(ZoneEvent::IdentityAssigned { spawn_id });
                self.core.send(Outgoing::ClientReady);
                self.transition(ZoneState::InZone);
            }
            ZoneState::InZone => {
                self.view.own_spawn_id.replace(Some(spawn_id));
                self.core.emit(ZoneEvent::IdentityAssigned { spawn_id });
            }
            state => {
                debug!(spawn_id, ?state, "Identity assignment before spawn request, ignored");
                self.core
                    .diagnostic(Diagnostic::IdentityIgnored { spawn_id });
            }
        }
    }

    fn on_hp(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::HpUpdate(hp) = msg else {
            return;
        };
        let percent = if hp.max > 0 {
            (i64::from(hp.current.clamp(0, hp.max)) * 100 / i64::from(hp.max)) as u8
        } else {
            hp.current.clamp(0, 100) as u8
        };
        self.view
            .spawns
            .update(|t| t.with_hp_percent(hp.spawn_id, percent));
        if hp.spawn_id == self.own_id() {
            self.update_profile(|p| p.hp = hp.current.max(0) as u32);
        }
        self.core.emit(ZoneEvent::HpChanged(hp));
    }

    fn on_item(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::ItemPacket(item) = msg else {
            return;
        };
        let slot = item.slot;
        self.view.inventory.update(|inv| inv.with_item(item.clone()));
        self.core.emit(ZoneEvent::InventoryChanged {
            slot,
            item: Some(item),
        });
    }

    fn on_delete_item(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::DeleteItem { slot } = msg else {
            return;
        };
        self.view.inventory.update(|inv| inv.without(slot));
        self.core
            .emit(ZoneEvent::InventoryChanged { slot, item: None });
    }

    fn on_money(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::MoneyUpdate(coin) = msg else {
            return;
        };
        self.update_profile(|p| p.coin = coin);
        self.core.emit(ZoneEvent::MoneyChanged(coin));
    }

    fn on_exp(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::ExpUpdate { exp } = msg else {
            return;
        };
        self.update_profile(|p| p.exp = exp);
        self.core.emit(ZoneEvent::ExperienceChanged { exp });
    }

    fn on_level(&mut self, msg: Inbound, _now: Instant) {
        let Inbound::LevelUpdate(level) = msg else {
            return;
        };
        self.update_profile(|p| {
            p.level = level.level.min(u32::from(u8::MAX)) as u8;
            p.exp = level.exp;
        });
        self.core.emit(ZoneEvent::LevelChanged(level));
    }

    fn on_logout(&mut self, _msg: Inbound, _now: Instant) {
        info!("Logout confirmed");
        self.core.emit(ZoneEvent::LoggedOut);
        self.core.supervisor.reset();
        self.transition(ZoneState::Disconnected);
    }

    /// Messages that only produce an event.
    fn on_notice(&mut self, msg: Inbound, _now: Instant) {
        let event = match msg {
            Inbound::Damage(d) => ZoneEvent::Damaged(d),
            Inbound::Death(d) => ZoneEvent::Died(d),
            Inbound::ChannelMessage(c) => ZoneEvent::Chat(c),
            Inbound::Consider(c) => ZoneEvent::ConsiderResult(c),
            Inbound::BeginCast(c) => ZoneEvent::CastStarted(c),
            Inbound::LootResponse(l) => ZoneEvent::LootOpened(l),
            Inbound::TimeOfDay(t) => ZoneEvent::TimeOfDay(t),
            Inbound::Weather(w) => ZoneEvent::Weather(w),
            Inbound::TradeRequest(t) => ZoneEvent::TradeRequested { from_id: t.from_id },
            Inbound::TradeAccept { from_id } => ZoneEvent::TradeAccepted { from_id },
            Inbound::TradeCancel { from_id } => ZoneEvent::TradeCancelled { from_id },
            Inbound::ShopOpen(s) => ZoneEvent::ShopOpened(s),
            Inbound::GroupInvite(g) => ZoneEvent::GroupInvited { from: g.actor },
            Inbound::GroupUpdate(g) => ZoneEvent::GroupUpdated(g),
            Inbound::ZoneChange(z) => ZoneEvent::ZoneChange(z),
            other => {
                trace!(kind = ?other.kind(), "No event for message");
                return;
            }
        };
        self.core.emit(event);
    }

    fn update_profile(&self, f: impl FnOnce(&mut PlayerProfile)) {
        self.view.profile.update(|current| {
            current.clone().map(|mut p| {
                f(&mut p);
                p
            })
        });
    }
}

impl ProtocolMachine for ZoneMachine {
    fn role(&self) -> Role {
        Role::Zone
    }

    fn on_transport_open(&mut self, now: Instant) {
        self.core.transport_ready = true;
        if self.state == ZoneState::Connecting {
            self.begin_handshake(now);
        }
    }

    fn on_transport_closed(&mut self, _now: Instant) {
        self.core.transport_ready = false;
        self.core.clear_outgoing();
        if !matches!(
            self.state,
            ZoneState::Disconnected | ZoneState::Connecting | ZoneState::Failed
        ) {
            self.core.supervisor.disarm();
            self.transition(ZoneState::Disconnected);
        }
    }

    fn on_transport_error(&mut self, error: &ProtocolError, _now: Instant) {
        self.core.transport_error(error);
    }

    #[instrument(level = "trace", skip(self, payload, now), fields(len = payload.len()))]
    fn handle_message(&mut self, opcode: u16, payload: &[u8], now: Instant) {
        if matches!(self.state, ZoneState::Disconnected | ZoneState::Failed) {
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
            None => trace!(kind = ?decoded.kind, "No zone handler"),
        }
    }

    fn tick(&mut self, now: Instant) {
        while let Ok(cmd) = self.commands.try_recv() {
            self.apply_command(cmd, now);
        }

        match self.core.supervise(now) {
            SupervisorVerdict::Idle => {}
            SupervisorVerdict::Reconnect { .. } => self.transition(ZoneState::Connecting),
            SupervisorVerdict::Exhausted { .. } => self.transition(ZoneState::Failed),
        }
    }

    fn take_outgoing(&mut self) -> Vec<OutgoingCommand> {
        self.core.take_outgoing()
    }

    fn is_terminal(&self) -> bool {
        self.state == ZoneState::Failed
    }
}

impl std::fmt::Debug for ZoneMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneMachine")
            .field("state", &self.state)
            .field("character", &self.character)
            .field("variant", &self.core.codec.variant())
            .finish()
    }
}
