//! Modern wire layouts.
//!
//! Application payloads arrive complete and in order from the session layer
//! as `opcode (u16 LE) + body`. Names are 64-byte fields, spawn ids 32-bit and
//! coordinates `f32`. Nothing is enciphered or compressed.

use crate::protocol::codec::common::{self, Layout};
use crate::protocol::codec::WireCodec;
use crate::protocol::fields::{FieldReader, FieldWriter};
use crate::protocol::message::{Inbound, Outgoing};
use crate::protocol::opcodes::{MessageKind, OpcodeTable, WireVariant};
use crate::protocol::records::*;
use crate::utils::cipher::CipherFamily;

pub const NAME_LEN: usize = 64;
pub const SURNAME_LEN: usize = 32;

pub const LAYOUT: Layout = Layout {
    name_len: NAME_LEN,
    wide_ids: true,
};

pub const CHARACTER_ENTRY_LEN: usize = NAME_LEN + 1 + 1 + 2 + 1 + 2;
pub const PROFILE_LEN: usize = NAME_LEN + SURNAME_LEN + 1 + 2 + 1 + 1 + 4 + 4 + 16 + 2 + 16 + 4;
pub const SPAWN_LEN: usize = 4 + NAME_LEN + 1 + 2 + 1 + 1 + 1 + 1 + 16;
pub const POSITION_LEN: usize = 4 + 16 + 16 + 2 + 2;

/// Length of the opcode prefix on an application payload.
pub const APP_OPCODE_LEN: usize = 2;

/// Modern wire codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModernCodec;

impl ModernCodec {
    /// Prefix a body with its opcode for the session layer.
    pub fn frame_app(opcode: u16, body: &[u8]) -> Vec<u8> {
        let mut w = FieldWriter::with_capacity(APP_OPCODE_LEN + body.len());
        w.u16(opcode).bytes(body);
        w.finish()
    }

    /// Split a session-layer payload into opcode and body.
    pub fn split_app(payload: &[u8]) -> Option<(u16, &[u8])> {
        let mut r = FieldReader::new(payload);
        let opcode = r.u16()?;
        Some((opcode, &payload[APP_OPCODE_LEN..]))
    }
}

fn put_position(w: &mut FieldWriter, p: &SpawnPosition) {
    w.u32(p.spawn_id)
        .f32(p.x)
        .f32(p.y)
        .f32(p.z)
        .f32(p.heading)
        .f32(p.delta_x)
        .f32(p.delta_y)
        .f32(p.delta_z)
        .f32(p.delta_heading)
        .u16(p.animation)
        .zeros(2);
}

fn get_position(r: &mut FieldReader<'_>) -> Option<SpawnPosition> {
    r.need(POSITION_LEN)?;
    let p = SpawnPosition {
        spawn_id: r.u32()?,
        x: r.f32()?,
        y: r.f32()?,
        z: r.f32()?,
        heading: r.f32()?,
        delta_x: r.f32()?,
        delta_y: r.f32()?,
        delta_z: r.f32()?,
        delta_heading: r.f32()?,
        animation: r.u16()?,
    };
    r.skip(2)?;
    Some(p)
}

fn put_spawn(w: &mut FieldWriter, s: &Spawn) {
    w.u32(s.spawn_id)
        .fixed_str(&s.name, NAME_LEN)
        .u8(s.level)
        .u16(s.race)
        .u8(s.class)
        .u8(s.gender)
        .bool(s.is_npc)
        .u8(s.hp_percent)
        .f32(s.x)
        .f32(s.y)
        .f32(s.z)
        .f32(s.heading);
}

fn get_spawn(r: &mut FieldReader<'_>) -> Option<Spawn> {
    r.need(SPAWN_LEN)?;
    Some(Spawn {
        spawn_id: r.u32()?,
        name: r.fixed_str(NAME_LEN)?,
        level: r.u8()?,
        race: r.u16()?,
        class: r.u8()?,
        gender: r.u8()?,
        is_npc: r.bool()?,
        hp_percent: r.u8()?,
        x: r.f32()?,
        y: r.f32()?,
        z: r.f32()?,
        heading: r.f32()?,
    })
}

fn put_profile(w: &mut FieldWriter, p: &PlayerProfile) {
    w.fixed_str(&p.name, NAME_LEN)
        .fixed_str(&p.surname, SURNAME_LEN)
        .u8(p.gender)
        .u16(p.race)
        .u8(p.class)
        .u8(p.level)
        .u32(p.hp)
        .u32(p.mana)
        .f32(p.x)
        .f32(p.y)
        .f32(p.z)
        .f32(p.heading)
        .u16(p.zone_id);
    common::put_coin(w, &p.coin);
    w.u32(p.exp);
}

fn get_profile(r: &mut FieldReader<'_>) -> Option<PlayerProfile> {
    r.need(PROFILE_LEN)?;
    Some(PlayerProfile {
        name: r.fixed_str(NAME_LEN)?,
        surname: r.fixed_str(SURNAME_LEN)?,
        gender: r.u8()?,
        race: r.u16()?,
        class: r.u8()?,
        level: r.u8()?,
        hp: r.u32()?,
        mana: r.u32()?,
        x: r.f32()?,
        y: r.f32()?,
        z: r.f32()?,
        heading: r.f32()?,
        zone_id: r.u16()?,
        coin: common::get_coin(r)?,
        exp: r.u32()?,
    })
}

fn get_character_list(r: &mut FieldReader<'_>) -> Option<Vec<CharacterSummary>> {
    let count = r.u32()? as usize;
    r.need(count.checked_mul(CHARACTER_ENTRY_LEN)?)?;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(CharacterSummary {
            name: r.fixed_str(NAME_LEN)?,
            level: r.u8()?,
            class: r.u8()?,
            race: r.u16()?,
            gender: r.u8()?,
            zone_id: r.u16()?,
        });
    }
    Some(out)
}

impl WireCodec for ModernCodec {
    fn variant(&self) -> WireVariant {
        WireVariant::Modern
    }

    fn opcodes(&self) -> &'static OpcodeTable {
        OpcodeTable::for_variant(WireVariant::Modern)
    }

    fn has_server_name_step(&self) -> bool {
        false
    }

    fn payload_transform(&self, _kind: MessageKind) -> Option<CipherFamily> {
        None
    }

    fn encode_outgoing(&self, msg: &Outgoing) -> Vec<u8> {
        match msg {
            Outgoing::ClientPosition(p) => {
                let mut w = FieldWriter::with_capacity(POSITION_LEN);
                put_position(&mut w, p);
                w.finish()
            }
            other => common::encode_outgoing(&LAYOUT, other).unwrap_or_default(),
        }
    }

    fn decode_outgoing(&self, kind: MessageKind, payload: &[u8]) -> Option<Outgoing> {
        match kind {
            MessageKind::ClientPosition => {
                get_position(&mut FieldReader::new(payload)).map(Outgoing::ClientPosition)
            }
            MessageKind::ServerNameRequest => None,
            other => common::decode_outgoing(&LAYOUT, other, payload),
        }
    }

    fn encode_inbound(&self, msg: &Inbound) -> Vec<u8> {
        let mut w = FieldWriter::with_capacity(128);
        match msg {
            Inbound::ServerName { .. } => {}
            Inbound::CharacterList(chars) => {
                w.u32(chars.len() as u32);
                for c in chars {
                    w.fixed_str(&c.name, NAME_LEN)
                        .u8(c.level)
                        .u8(c.class)
                        .u16(c.race)
                        .u8(c.gender)
                        .u16(c.zone_id);
                }
            }
            Inbound::PlayerProfile(p) => put_profile(&mut w, p),
            Inbound::ZoneSpawns(spawns) => {
                for s in spawns {
                    put_spawn(&mut w, s);
                }
            }
            Inbound::NewSpawn(s) => put_spawn(&mut w, s),
            // One record per message on this wire.
            Inbound::SpawnPositions(positions) => {
                if let Some(p) = positions.first() {
                    put_position(&mut w, p);
                }
            }
            other => return common::encode_inbound(&LAYOUT, other).unwrap_or_default(),
        }
        w.finish()
    }

    fn decode_inbound(&self, kind: MessageKind, payload: &[u8]) -> Option<Inbound> {
        let mut r = FieldReader::new(payload);
        match kind {
            MessageKind::ServerName => None,
            MessageKind::CharacterList => get_character_list(&mut r).map(Inbound::CharacterList),
            MessageKind::PlayerProfile => get_profile(&mut r).map(Inbound::PlayerProfile),
            MessageKind::ZoneSpawns => {
                let mut spawns = Vec::with_capacity(payload.len() / SPAWN_LEN);
                while r.remaining() >= SPAWN_LEN {
                    spawns.push(get_spawn(&mut r)?);
                }
                Some(Inbound::ZoneSpawns(spawns))
            }
            MessageKind::NewSpawn => get_spawn(&mut r).map(Inbound::NewSpawn),
            MessageKind::SpawnPositions => {
                get_position(&mut r).map(|p| Inbound::SpawnPositions(vec![p]))
            }
            other => common::decode_inbound(&LAYOUT, other, payload),
        }
    }
}
