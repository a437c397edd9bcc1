//! Layouts shared by both wire variants.
//!
//! Most families differ between variants only in name width and spawn-id
//! width; those are parameterised by [`Layout`]. Families whose structure
//! differs (positions, spawns, profile, character list) are left to the
//! variant modules and yield `None` here.

use crate::protocol::fields::{FieldReader, FieldWriter};
use crate::protocol::message::{Inbound, Outgoing};
use crate::protocol::opcodes::MessageKind;
use crate::protocol::records::*;

pub const SESSION_KEY_LEN: usize = 16;
pub const SERVER_NAME_LEN: usize = 64;
pub const SERVER_ADDRESS_LEN: usize = 64;
pub const HOST_LEN: usize = 128;
pub const ZONE_SHORT_NAME_LEN: usize = 32;
pub const ZONE_LONG_NAME_LEN: usize = 128;
pub const UNAVAILABLE_ZONE_LEN: usize = 16;
pub const ITEM_NAME_LEN: usize = 64;

/// Body of the session-ready message.
const SESSION_READY_MAGIC: u32 = 2;

pub const LOGIN_REPLY_LEN: usize = 1 + 2 + 4 + SESSION_KEY_LEN;
pub const PLAY_REPLY_LEN: usize = 4 + 1 + 2;
pub const SERVER_ENTRY_LEN: usize = 4 + 4 + 1 + SERVER_NAME_LEN + SERVER_ADDRESS_LEN;
pub const ZONE_SERVER_INFO_LEN: usize = HOST_LEN + 2;
pub const NAME_APPROVAL_LEN: usize = 1;

/// Per-variant widths for the shared families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub name_len: usize,
    pub wide_ids: bool,
}

impl Layout {
    #[inline]
    pub fn id_len(&self) -> usize {
        if self.wide_ids {
            4
        } else {
            2
        }
    }

    pub fn put_id(&self, w: &mut FieldWriter, id: u32) {
        if self.wide_ids {
            w.u32(id);
        } else {
            w.u16(id as u16);
        }
    }

    pub fn get_id(&self, r: &mut FieldReader<'_>) -> Option<u32> {
        if self.wide_ids {
            r.u32()
        } else {
            r.u16().map(u32::from)
        }
    }

    pub fn put_name(&self, w: &mut FieldWriter, name: &str) {
        w.fixed_str(name, self.name_len);
    }

    pub fn get_name(&self, r: &mut FieldReader<'_>) -> Option<String> {
        r.fixed_str(self.name_len)
    }

    pub fn new_zone_len(&self) -> usize {
        self.name_len + ZONE_SHORT_NAME_LEN + ZONE_LONG_NAME_LEN + 1 + 16
    }

    pub fn appearance_len(&self) -> usize {
        self.id_len() + 2 + 4
    }
}

pub fn put_coin(w: &mut FieldWriter, coin: &Coin) {
    w.u32(coin.platinum)
        .u32(coin.gold)
        .u32(coin.silver)
        .u32(coin.copper);
}

pub fn get_coin(r: &mut FieldReader<'_>) -> Option<Coin> {
    Some(Coin {
        platinum: r.u32()?,
        gold: r.u32()?,
        silver: r.u32()?,
        copper: r.u32()?,
    })
}

fn put_pair(l: &Layout, w: &mut FieldWriter, pair: &GroupPair) {
    l.put_name(w, &pair.actor);
    l.put_name(w, &pair.subject);
}

fn get_pair(l: &Layout, r: &mut FieldReader<'_>) -> Option<GroupPair> {
    Some(GroupPair {
        actor: l.get_name(r)?,
        subject: l.get_name(r)?,
    })
}

fn put_chat(l: &Layout, w: &mut FieldWriter, chat: &ChatMessage) {
    l.put_name(w, &chat.target);
    l.put_name(w, &chat.sender);
    w.u16(chat.language).u16(chat.channel).cstr(&chat.message);
}

fn get_chat(l: &Layout, r: &mut FieldReader<'_>) -> Option<ChatMessage> {
    Some(ChatMessage {
        target: l.get_name(r)?,
        sender: l.get_name(r)?,
        language: r.u16()?,
        channel: r.u16()?,
        message: r.trailing_str()?,
    })
}

fn put_consider(l: &Layout, w: &mut FieldWriter, c: &Consider) {
    l.put_id(w, c.player_id);
    l.put_id(w, c.target_id);
    w.i32(c.faction).u32(c.level_con);
}

fn get_consider(l: &Layout, r: &mut FieldReader<'_>) -> Option<Consider> {
    Some(Consider {
        player_id: l.get_id(r)?,
        target_id: l.get_id(r)?,
        faction: r.i32()?,
        level_con: r.u32()?,
    })
}

fn put_trade(l: &Layout, w: &mut FieldWriter, t: &TradeRequest) {
    l.put_id(w, t.to_id);
    l.put_id(w, t.from_id);
}

fn get_trade(l: &Layout, r: &mut FieldReader<'_>) -> Option<TradeRequest> {
    Some(TradeRequest {
        to_id: l.get_id(r)?,
        from_id: l.get_id(r)?,
    })
}

fn put_shop(l: &Layout, w: &mut FieldWriter, s: &ShopRequest) {
    l.put_id(w, s.npc_id);
    l.put_id(w, s.player_id);
}

fn get_shop(l: &Layout, r: &mut FieldReader<'_>) -> Option<ShopRequest> {
    Some(ShopRequest {
        npc_id: l.get_id(r)?,
        player_id: l.get_id(r)?,
    })
}

fn id_only(l: &Layout, id: u32) -> Vec<u8> {
    let mut w = FieldWriter::with_capacity(4);
    l.put_id(&mut w, id);
    w.finish()
}

/// Client-direction encoder for the shared families.
///
/// Returns `None` for families whose layout is variant specific.
pub fn encode_outgoing(l: &Layout, msg: &Outgoing) -> Option<Vec<u8>> {
    let mut w = FieldWriter::with_capacity(64);
    match msg {
        Outgoing::SessionReady => {
            w.u32(SESSION_READY_MAGIC);
        }
        Outgoing::Login(creds) => {
            l.put_name(&mut w, &creds.username);
            l.put_name(&mut w, &creds.password);
        }
        Outgoing::ServerNameRequest
        | Outgoing::ServerListRequest
        | Outgoing::ReqNewZone
        | Outgoing::ReqClientSpawn
        | Outgoing::ClientReady
        | Outgoing::Camp
        | Outgoing::Logout => {}
        Outgoing::PlayRequest { server_id } => {
            w.u32(*server_id);
        }
        Outgoing::WorldLogin(info) => {
            w.u32(info.account_id)
                .fixed_str(&info.session_key, SESSION_KEY_LEN)
                .bool(info.zoning);
        }
        Outgoing::ApproveName(req) => {
            l.put_name(&mut w, &req.name);
            w.u16(req.race).u16(req.class);
        }
        Outgoing::CharacterCreate(c) => {
            l.put_name(&mut w, &c.name);
            w.u16(c.race)
                .u8(c.class)
                .u8(c.gender)
                .u16(c.deity)
                .u16(c.start_zone)
                .bytes(&c.attributes);
        }
        Outgoing::CharacterDelete { name }
        | Outgoing::EnterWorld { name }
        | Outgoing::ZoneEntry { name } => {
            l.put_name(&mut w, name);
        }
        Outgoing::SetFilter(filters) => {
            for i in 0..FILTER_COUNT {
                w.u32(filters.get(i).copied().unwrap_or(0));
            }
        }
        Outgoing::ClientPosition(_) => return None,
        Outgoing::ChannelMessage(chat) => put_chat(l, &mut w, chat),
        Outgoing::Target { target_id } => return Some(id_only(l, *target_id)),
        Outgoing::Consider(c) => put_consider(l, &mut w, c),
        Outgoing::CastSpell(c) => {
            w.u16(c.slot).u16(c.spell_id);
            l.put_id(&mut w, c.target_id);
        }
        Outgoing::LootRequest { corpse_id } | Outgoing::EndLoot { corpse_id } => {
            return Some(id_only(l, *corpse_id))
        }
        Outgoing::LootItem(item) => {
            l.put_id(&mut w, item.corpse_id);
            l.put_id(&mut w, item.looter_id);
            w.u16(item.slot).bool(item.auto_loot);
        }
        Outgoing::TradeRequest(t) => put_trade(l, &mut w, t),
        Outgoing::TradeAccept { from_id } | Outgoing::TradeCancel { from_id } => {
            return Some(id_only(l, *from_id))
        }
        Outgoing::ShopRequest(s) | Outgoing::ShopEnd(s) => put_shop(l, &mut w, s),
        Outgoing::ShopBuy(b) => {
            l.put_id(&mut w, b.npc_id);
            l.put_id(&mut w, b.player_id);
            w.u32(b.slot).u32(b.quantity);
        }
        Outgoing::MoveItem(m) => {
            w.u32(m.from_slot).u32(m.to_slot).u32(m.count);
        }
        Outgoing::GroupInvite(p) | Outgoing::GroupFollow(p) | Outgoing::GroupDisband(p) => {
            put_pair(l, &mut w, p)
        }
    }
    Some(w.finish())
}

/// Client-direction decoder (server side of the shared families).
pub fn decode_outgoing(l: &Layout, kind: MessageKind, payload: &[u8]) -> Option<Outgoing> {
    let mut r = FieldReader::new(payload);
    let r = &mut r;
    let msg = match kind {
        MessageKind::SessionReady => {
            r.u32()?;
            Outgoing::SessionReady
        }
        MessageKind::Login => Outgoing::Login(Credentials {
            username: l.get_name(r)?,
            password: l.get_name(r)?,
        }),
        MessageKind::ServerNameRequest => Outgoing::ServerNameRequest,
        MessageKind::ServerListRequest => Outgoing::ServerListRequest,
        MessageKind::ReqNewZone => Outgoing::ReqNewZone,
        MessageKind::ReqClientSpawn => Outgoing::ReqClientSpawn,
        MessageKind::ClientReady => Outgoing::ClientReady,
        MessageKind::Camp => Outgoing::Camp,
        MessageKind::Logout => Outgoing::Logout,
        MessageKind::PlayRequest => Outgoing::PlayRequest {
            server_id: r.u32()?,
        },
        MessageKind::WorldLogin => Outgoing::WorldLogin(WorldLogin {
            account_id: r.u32()?,
            session_key: r.fixed_str(SESSION_KEY_LEN)?,
            zoning: r.bool()?,
        }),
        MessageKind::ApproveName => Outgoing::ApproveName(NameApprovalRequest {
            name: l.get_name(r)?,
            race: r.u16()?,
            class: r.u16()?,
        }),
        MessageKind::CharacterCreate => {
            let name = l.get_name(r)?;
            let race = r.u16()?;
            let class = r.u8()?;
            let gender = r.u8()?;
            let deity = r.u16()?;
            let start_zone = r.u16()?;
            let mut attributes = [0u8; 7];
            attributes.copy_from_slice(r.bytes(7)?);
            Outgoing::CharacterCreate(CharacterCreate {
                name,
                race,
                class,
                gender,
                deity,
                start_zone,
                attributes,
            })
        }
        MessageKind::CharacterDelete => Outgoing::CharacterDelete {
            name: l.get_name(r)?,
        },
        MessageKind::EnterWorld => Outgoing::EnterWorld {
            name: l.get_name(r)?,
        },
        MessageKind::ZoneEntry => Outgoing::ZoneEntry {
            name: l.get_name(r)?,
        },
        MessageKind::SetFilter => {
            let mut filters = Vec::with_capacity(FILTER_COUNT);
            for _ in 0..FILTER_COUNT {
                filters.push(r.u32()?);
            }
            Outgoing::SetFilter(filters)
        }
        MessageKind::ChannelMessage => Outgoing::ChannelMessage(get_chat(l, r)?),
        MessageKind::Target => Outgoing::Target {
            target_id: l.get_id(r)?,
        },
        MessageKind::Consider => Outgoing::Consider(get_consider(l, r)?),
        MessageKind::CastSpell => Outgoing::CastSpell(CastSpell {
            slot: r.u16()?,
            spell_id: r.u16()?,
            target_id: l.get_id(r)?,
        }),
        MessageKind::LootRequest => Outgoing::LootRequest {
            corpse_id: l.get_id(r)?,
        },
        MessageKind::EndLoot => Outgoing::EndLoot {
            corpse_id: l.get_id(r)?,
        },
        MessageKind::LootItem => Outgoing::LootItem(LootItem {
            corpse_id: l.get_id(r)?,
            looter_id: l.get_id(r)?,
            slot: r.u16()?,
            auto_loot: r.bool()?,
        }),
        MessageKind::TradeRequest => Outgoing::TradeRequest(get_trade(l, r)?),
        MessageKind::TradeAccept => Outgoing::TradeAccept {
            from_id: l.get_id(r)?,
        },
        MessageKind::TradeCancel => Outgoing::TradeCancel {
            from_id: l.get_id(r)?,
        },
        MessageKind::ShopRequest => Outgoing::ShopRequest(get_shop(l, r)?),
        MessageKind::ShopEnd => Outgoing::ShopEnd(get_shop(l, r)?),
        MessageKind::ShopBuy => Outgoing::ShopBuy(ShopBuy {
            npc_id: l.get_id(r)?,
            player_id: l.get_id(r)?,
            slot: r.u32()?,
            quantity: r.u32()?,
        }),
        MessageKind::MoveItem => Outgoing::MoveItem(MoveItem {
            from_slot: r.u32()?,
            to_slot: r.u32()?,
            count: r.u32()?,
        }),
        MessageKind::GroupInvite => Outgoing::GroupInvite(get_pair(l, r)?),
        MessageKind::GroupFollow => Outgoing::GroupFollow(get_pair(l, r)?),
        MessageKind::GroupDisband => Outgoing::GroupDisband(get_pair(l, r)?),
        _ => return None,
    };
    Some(msg)
}

/// Server-direction encoder for the shared families.
pub fn encode_inbound(l: &Layout, msg: &Inbound) -> Option<Vec<u8>> {
    let mut w = FieldWriter::with_capacity(64);
    match msg {
        Inbound::LoginReply(reply) => {
            w.bool(reply.accepted)
                .u16(reply.failure_code)
                .u32(reply.account_id)
                .fixed_str(&reply.session_key, SESSION_KEY_LEN);
        }
        Inbound::ServerList(servers) => {
            w.u32(servers.len() as u32);
            for s in servers {
                w.u32(s.id)
                    .i32(s.players)
                    .u8(s.status)
                    .fixed_str(&s.name, SERVER_NAME_LEN)
                    .fixed_str(&s.address, SERVER_ADDRESS_LEN);
            }
        }
        Inbound::PlayReply(reply) => {
            w.u32(reply.server_id).bool(reply.allowed).u16(reply.reason);
        }
        Inbound::ApproveWorld | Inbound::LogoutReply => {}
        Inbound::ExpansionInfo { flags } => {
            w.u32(*flags);
        }
        Inbound::Motd { text } => {
            w.cstr(text);
        }
        Inbound::NameApproval { approved } => {
            w.bool(*approved);
        }
        Inbound::ZoneServerInfo(info) => {
            w.fixed_str(&info.host, HOST_LEN).u16(info.port);
        }
        Inbound::ZoneUnavailable { zone_name } => {
            w.fixed_str(zone_name, UNAVAILABLE_ZONE_LEN);
        }
        Inbound::NewZone(z) => {
            l.put_name(&mut w, &z.character);
            w.fixed_str(&z.short_name, ZONE_SHORT_NAME_LEN)
                .fixed_str(&z.long_name, ZONE_LONG_NAME_LEN)
                .u8(z.zone_type)
                .f32(z.safe_x)
                .f32(z.safe_y)
                .f32(z.safe_z)
                .f32(z.gravity);
        }
        Inbound::DeleteSpawn { spawn_id } => return Some(id_only(l, *spawn_id)),
        Inbound::SpawnAppearance(a) => {
            l.put_id(&mut w, a.spawn_id);
            w.u16(a.appearance_type).u32(a.parameter);
        }
        Inbound::HpUpdate(hp) => {
            l.put_id(&mut w, hp.spawn_id);
            w.i32(hp.current).i32(hp.max);
        }
        Inbound::Damage(d) => {
            l.put_id(&mut w, d.target_id);
            l.put_id(&mut w, d.source_id);
            w.u8(d.damage_type).u16(d.spell_id).i32(d.amount);
        }
        Inbound::Death(d) => {
            l.put_id(&mut w, d.spawn_id);
            l.put_id(&mut w, d.killer_id);
            w.i32(d.damage).u16(d.spell_id);
        }
        Inbound::ChannelMessage(chat) => put_chat(l, &mut w, chat),
        Inbound::Consider(c) => put_consider(l, &mut w, c),
        Inbound::BeginCast(c) => {
            l.put_id(&mut w, c.caster_id);
            w.u16(c.spell_id).u32(c.cast_time_ms);
        }
        Inbound::LootResponse(resp) => {
            l.put_id(&mut w, resp.corpse_id);
            w.bool(resp.granted);
            put_coin(&mut w, &resp.coin);
        }
        Inbound::ItemPacket(item) => {
            w.i16(item.slot)
                .u32(item.item_id)
                .u16(item.charges)
                .fixed_str(&item.name, ITEM_NAME_LEN);
        }
        Inbound::DeleteItem { slot } => {
            w.i16(*slot);
        }
        Inbound::MoneyUpdate(coin) => put_coin(&mut w, coin),
        Inbound::ExpUpdate { exp } => {
            w.u32(*exp);
        }
        Inbound::LevelUpdate(lv) => {
            w.u32(lv.level).u32(lv.old_level).u32(lv.exp);
        }
        Inbound::TimeOfDay(t) => {
            w.u8(t.hour).u8(t.minute).u8(t.day).u8(t.month).u16(t.year);
        }
        Inbound::Weather(wx) => {
            w.u32(wx.kind).u32(wx.intensity);
        }
        Inbound::TradeRequest(t) => put_trade(l, &mut w, t),
        Inbound::TradeAccept { from_id } | Inbound::TradeCancel { from_id } => {
            return Some(id_only(l, *from_id))
        }
        Inbound::ShopOpen(s) => {
            l.put_id(&mut w, s.npc_id);
            w.f32(s.rate);
        }
        Inbound::GroupInvite(p) => put_pair(l, &mut w, p),
        Inbound::GroupUpdate(g) => {
            w.u32(g.action);
            l.put_name(&mut w, &g.leader);
            for i in 0..GROUP_MEMBER_SLOTS {
                let name = g.members.get(i).map(String::as_str).unwrap_or("");
                l.put_name(&mut w, name);
            }
        }
        Inbound::ZoneChange(z) => {
            l.put_name(&mut w, &z.character);
            w.u16(z.zone_id).f32(z.x).f32(z.y).f32(z.z).i32(z.success);
        }
        Inbound::ServerName { .. }
        | Inbound::CharacterList(_)
        | Inbound::PlayerProfile(_)
        | Inbound::ZoneSpawns(_)
        | Inbound::NewSpawn(_)
        | Inbound::SpawnPositions(_) => return None,
    }
    Some(w.finish())
}

/// Server-direction decoder for the shared families.
pub fn decode_inbound(l: &Layout, kind: MessageKind, payload: &[u8]) -> Option<Inbound> {
    let mut r = FieldReader::new(payload);
    let r = &mut r;
    let msg = match kind {
        MessageKind::LoginReply => Inbound::LoginReply(LoginReply {
            accepted: r.bool()?,
            failure_code: r.u16()?,
            account_id: r.u32()?,
            session_key: r.fixed_str(SESSION_KEY_LEN)?,
        }),
        MessageKind::ServerList => {
            let count = r.u32()? as usize;
            // Count is untrusted: it must fit in what actually arrived.
            r.need(count.checked_mul(SERVER_ENTRY_LEN)?)?;
            let mut servers = Vec::with_capacity(count);
            for _ in 0..count {
                servers.push(ServerEntry {
                    id: r.u32()?,
                    players: r.i32()?,
                    status: r.u8()?,
                    name: r.fixed_str(SERVER_NAME_LEN)?,
                    address: r.fixed_str(SERVER_ADDRESS_LEN)?,
                });
            }
            Inbound::ServerList(servers)
        }
        MessageKind::PlayReply => Inbound::PlayReply(PlayReply {
            server_id: r.u32()?,
            allowed: r.bool()?,
            reason: r.u16()?,
        }),
        MessageKind::ApproveWorld => Inbound::ApproveWorld,
        MessageKind::LogoutReply => Inbound::LogoutReply,
        MessageKind::ExpansionInfo => Inbound::ExpansionInfo { flags: r.u32()? },
        MessageKind::Motd => Inbound::Motd {
            text: r.trailing_str()?,
        },
        MessageKind::ApproveName => Inbound::NameApproval {
            approved: r.bool()?,
        },
        MessageKind::ZoneServerInfo => Inbound::ZoneServerInfo(ZoneServerInfo {
            host: r.fixed_str(HOST_LEN)?,
            port: r.u16()?,
        }),
        MessageKind::ZoneUnavailable => Inbound::ZoneUnavailable {
            zone_name: r.fixed_str(UNAVAILABLE_ZONE_LEN)?,
        },
        MessageKind::NewZone => Inbound::NewZone(NewZone {
            character: l.get_name(r)?,
            short_name: r.fixed_str(ZONE_SHORT_NAME_LEN)?,
            long_name: r.fixed_str(ZONE_LONG_NAME_LEN)?,
            zone_type: r.u8()?,
            safe_x: r.f32()?,
            safe_y: r.f32()?,
            safe_z: r.f32()?,
            gravity: r.f32()?,
        }),
        MessageKind::DeleteSpawn => Inbound::DeleteSpawn {
            spawn_id: l.get_id(r)?,
        },
        MessageKind::SpawnAppearance => Inbound::SpawnAppearance(SpawnAppearance {
            spawn_id: l.get_id(r)?,
            appearance_type: r.u16()?,
            parameter: r.u32()?,
        }),
        MessageKind::HpUpdate => Inbound::HpUpdate(HpUpdate {
            spawn_id: l.get_id(r)?,
            current: r.i32()?,
            max: r.i32()?,
        }),
        MessageKind::Damage => Inbound::Damage(Damage {
            target_id: l.get_id(r)?,
            source_id: l.get_id(r)?,
            damage_type: r.u8()?,
            spell_id: r.u16()?,
            amount: r.i32()?,
        }),
        MessageKind::Death => Inbound::Death(Death {
            spawn_id: l.get_id(r)?,
            killer_id: l.get_id(r)?,
            damage: r.i32()?,
            spell_id: r.u16()?,
        }),
        MessageKind::ChannelMessage => Inbound::ChannelMessage(get_chat(l, r)?),
        MessageKind::Consider => Inbound::Consider(get_consider(l, r)?),
        MessageKind::BeginCast => Inbound::BeginCast(BeginCast {
            caster_id: l.get_id(r)?,
            spell_id: r.u16()?,
            cast_time_ms: r.u32()?,
        }),
        MessageKind::LootResponse => Inbound::LootResponse(LootResponse {
            corpse_id: l.get_id(r)?,
            granted: r.bool()?,
            coin: get_coin(r)?,
        }),
        MessageKind::ItemPacket => Inbound::ItemPacket(Item {
            slot: r.i16()?,
            item_id: r.u32()?,
            charges: r.u16()?,
            name: r.fixed_str(ITEM_NAME_LEN)?,
        }),
        MessageKind::DeleteItem => Inbound::DeleteItem { slot: r.i16()? },
        MessageKind::MoneyUpdate => Inbound::MoneyUpdate(get_coin(r)?),
        MessageKind::ExpUpdate => Inbound::ExpUpdate { exp: r.u32()? },
        MessageKind::LevelUpdate => Inbound::LevelUpdate(LevelUpdate {
            level: r.u32()?,
            old_level: r.u32()?,
            exp: r.u32()?,
        }),
        MessageKind::TimeOfDay => Inbound::TimeOfDay(TimeOfDay {
            hour: r.u8()?,
            minute: r.u8()?,
            day: r.u8()?,
            month: r.u8()?,
            year: r.u16()?,
        }),
        MessageKind::Weather => Inbound::Weather(Weather {
            kind: r.u32()?,
            intensity: r.u32()?,
        }),
        MessageKind::TradeRequest => Inbound::TradeRequest(get_trade(l, r)?),
        MessageKind::TradeAccept => Inbound::TradeAccept {
            from_id: l.get_id(r)?,
        },
        MessageKind::TradeCancel => Inbound::TradeCancel {
            from_id: l.get_id(r)?,
        },
        MessageKind::ShopRequest => Inbound::ShopOpen(ShopOpen {
            npc_id: l.get_id(r)?,
            rate: r.f32()?,
        }),
        MessageKind::GroupInvite => Inbound::GroupInvite(get_pair(l, r)?),
        MessageKind::GroupUpdate => {
            let action = r.u32()?;
            let leader = l.get_name(r)?;
            let mut members = Vec::with_capacity(GROUP_MEMBER_SLOTS);
            for _ in 0..GROUP_MEMBER_SLOTS {
                let name = l.get_name(r)?;
                if !name.is_empty() {
                    members.push(name);
                }
            }
            Inbound::GroupUpdate(GroupUpdate {
                action,
                leader,
                members,
            })
        }
        MessageKind::ZoneChange => Inbound::ZoneChange(ZoneChange {
            character: l.get_name(r)?,
            zone_id: r.u16()?,
            x: r.f32()?,
            y: r.f32()?,
            z: r.f32()?,
            success: r.i32()?,
        }),
        _ => return None,
    };
    Some(msg)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const NARROW: Layout = Layout {
        name_len: 30,
        wide_ids: false,
    };
    const WIDE: Layout = Layout {
        name_len: 64,
        wide_ids: true,
    };

    #[test]
    fn login_reply_size() {
        let reply = Inbound::LoginReply(LoginReply {
            accepted: true,
            failure_code: 0,
            account_id: 90_210,
            session_key: "ABCDEFGHIJ".into(),
        });
        let body = encode_inbound(&NARROW, &reply).unwrap();
        assert_eq!(body.len(), LOGIN_REPLY_LEN);
        assert_eq!(
            decode_inbound(&NARROW, MessageKind::LoginReply, &body),
            Some(reply)
        );
    }

    #[test]
    fn id_width_follows_layout() {
        let msg = Inbound::DeleteSpawn { spawn_id: 0x1234 };
        assert_eq!(encode_inbound(&NARROW, &msg).unwrap().len(), 2);
        assert_eq!(encode_inbound(&WIDE, &msg).unwrap().len(), 4);
    }

    #[test]
    fn server_list_count_must_fit() {
        let mut body = vec![0u8; 4];
        body[0] = 200;
        assert_eq!(decode_inbound(&NARROW, MessageKind::ServerList, &body), None);
    }

    #[test]
    fn chat_message_is_variable_length() {
        let chat = ChatMessage {
            target: String::new(),
            sender: "Gwyneth".into(),
            language: 0,
            channel: 5,
            message: "anyone selling bone chips?".into(),
        };
        let body = encode_outgoing(&WIDE, &Outgoing::ChannelMessage(chat.clone())).unwrap();
        assert_eq!(body.len(), 64 * 2 + 4 + chat.message.len() + 1);
        assert_eq!(
            decode_inbound(&WIDE, MessageKind::ChannelMessage, &body),
            Some(Inbound::ChannelMessage(chat))
        );
    }

    #[test]
    fn set_filter_is_fixed_width() {
        let body = encode_outgoing(&NARROW, &Outgoing::SetFilter(vec![1, 2])).unwrap();
        assert_eq!(body.len(), FILTER_COUNT * 4);
    }

    #[test]
    fn group_update_skips_empty_slots() {
        let update = GroupUpdate {
            action: 1,
            leader: "Kaelin".into(),
            members: vec!["Mirelle".into()],
        };
        let body = encode_inbound(&NARROW, &Inbound::GroupUpdate(update.clone())).unwrap();
        assert_eq!(body.len(), 4 + 30 * (1 + GROUP_MEMBER_SLOTS));
        assert_eq!(
            decode_inbound(&NARROW, MessageKind::GroupUpdate, &body),
            Some(Inbound::GroupUpdate(update))
        );
    }

    #[test]
    fn short_payloads_yield_none() {
        assert_eq!(decode_inbound(&NARROW, MessageKind::HpUpdate, &[1, 2, 3]), None);
        assert_eq!(decode_inbound(&WIDE, MessageKind::ZoneServerInfo, &[0; 10]), None);
    }

    #[test]
    fn variant_specific_families_are_declined() {
        assert!(encode_outgoing(&NARROW, &Outgoing::ClientPosition(SpawnPosition::default())).is_none());
        assert!(decode_inbound(&NARROW, MessageKind::PlayerProfile, &[0; 200]).is_none());
    }
}
