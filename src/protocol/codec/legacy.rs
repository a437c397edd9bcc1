//! Legacy wire layouts.
//!
//! Names are 30-byte fields, spawn ids 16-bit and world coordinates 16-bit
//! integers. Spawn positions travel as 15-byte records with velocity packed
//! into a single 32-bit word; several records may share one message. The
//! profile and spawn families arrive enciphered and deflated.

use crate::protocol::codec::common::{self, Layout};
use crate::protocol::codec::WireCodec;
use crate::protocol::fields::{FieldReader, FieldWriter};
use crate::protocol::message::{Inbound, Outgoing};
use crate::protocol::opcodes::{MessageKind, OpcodeTable, WireVariant};
use crate::protocol::records::*;
use crate::utils::cipher::CipherFamily;

pub const NAME_LEN: usize = 30;
pub const SURNAME_LEN: usize = 20;
pub const SERVER_NAME_STEP_LEN: usize = 32;
pub const CHARACTER_SLOTS: usize = 10;

pub const LAYOUT: Layout = Layout {
    name_len: NAME_LEN,
    wide_ids: false,
};

/// Per-attribute arrays: names, levels, classes, races, genders, zones.
pub const CHARACTER_LIST_LEN: usize = CHARACTER_SLOTS * (NAME_LEN + 1 + 1 + 2 + 1 + 2);
pub const PROFILE_LEN: usize = NAME_LEN + SURNAME_LEN + 1 + 2 + 1 + 1 + 4 + 4 + 6 + 1 + 2 + 16 + 4;
pub const SPAWN_LEN: usize = 2 + NAME_LEN + 1 + 2 + 1 + 1 + 1 + 1 + 1 + 6;
pub const POSITION_LEN: usize = 15;

const DELTA_Y_BITS: u32 = 11;
const DELTA_Z_BITS: u32 = 10;
const DELTA_X_BITS: u32 = 10;
const DELTA_Z_SHIFT: u32 = DELTA_Y_BITS + 1;
const DELTA_X_SHIFT: u32 = DELTA_Z_SHIFT + DELTA_Z_BITS;

/// Legacy wire codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct LegacyCodec;

#[inline]
fn coord(v: f32) -> i16 {
    v.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

#[inline]
fn heading(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn sign_extend(raw: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((raw << shift) as i32) >> shift
}

fn pack_delta(v: f32, bits: u32) -> u32 {
    let max = (1i32 << (bits - 1)) - 1;
    let min = -(1i32 << (bits - 1));
    let clamped = (v.round() as i32).clamp(min, max);
    (clamped as u32) & ((1u32 << bits) - 1)
}

/// Pack (dy, dz, dx) as 11 + spacer + 10 + 10 bits.
pub fn pack_velocity(dx: f32, dy: f32, dz: f32) -> u32 {
    pack_delta(dy, DELTA_Y_BITS)
        | (pack_delta(dz, DELTA_Z_BITS) << DELTA_Z_SHIFT)
        | (pack_delta(dx, DELTA_X_BITS) << DELTA_X_SHIFT)
}

/// Returns (dx, dy, dz).
pub fn unpack_velocity(packed: u32) -> (f32, f32, f32) {
    let dy = sign_extend(packed & ((1 << DELTA_Y_BITS) - 1), DELTA_Y_BITS);
    let dz = sign_extend((packed >> DELTA_Z_SHIFT) & ((1 << DELTA_Z_BITS) - 1), DELTA_Z_BITS);
    let dx = sign_extend((packed >> DELTA_X_SHIFT) & ((1 << DELTA_X_BITS) - 1), DELTA_X_BITS);
    (dx as f32, dy as f32, dz as f32)
}

fn put_position(w: &mut FieldWriter, p: &SpawnPosition) {
    w.u16(p.spawn_id as u16)
        .u8(p.animation as u8)
        .u8(heading(p.heading))
        .i8(p.delta_heading.round().clamp(-128.0, 127.0) as i8)
        .i16(coord(p.y))
        .i16(coord(p.x))
        .i16(coord(p.z))
        .u32(pack_velocity(p.delta_x, p.delta_y, p.delta_z));
}

fn get_position(r: &mut FieldReader<'_>) -> Option<SpawnPosition> {
    r.need(POSITION_LEN)?;
    let spawn_id = u32::from(r.u16()?);
    let animation = u16::from(r.u8()?);
    let heading = f32::from(r.u8()?);
    let delta_heading = f32::from(r.i8()?);
    let y = f32::from(r.i16()?);
    let x = f32::from(r.i16()?);
    let z = f32::from(r.i16()?);
    let (delta_x, delta_y, delta_z) = unpack_velocity(r.u32()?);
    Some(SpawnPosition {
        spawn_id,
        x,
        y,
        z,
        heading,
        delta_x,
        delta_y,
        delta_z,
        delta_heading,
        animation,
    })
}

fn put_spawn(w: &mut FieldWriter, s: &Spawn) {
    w.u16(s.spawn_id as u16)
        .fixed_str(&s.name, NAME_LEN)
        .u8(s.level)
        .u16(s.race)
        .u8(s.class)
        .u8(s.gender)
        .bool(s.is_npc)
        .u8(s.hp_percent)
        .u8(heading(s.heading))
        .i16(coord(s.x))
        .i16(coord(s.y))
        .i16(coord(s.z));
}

fn get_spawn(r: &mut FieldReader<'_>) -> Option<Spawn> {
    r.need(SPAWN_LEN)?;
    Some(Spawn {
        spawn_id: u32::from(r.u16()?),
        name: r.fixed_str(NAME_LEN)?,
        level: r.u8()?,
        race: r.u16()?,
        class: r.u8()?,
        gender: r.u8()?,
        is_npc: r.bool()?,
        hp_percent: r.u8()?,
        heading: f32::from(r.u8()?),
        x: f32::from(r.i16()?),
        y: f32::from(r.i16()?),
        z: f32::from(r.i16()?),
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
        .i16(coord(p.x))
        .i16(coord(p.y))
        .i16(coord(p.z))
        .u8(heading(p.heading))
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
        x: f32::from(r.i16()?),
        y: f32::from(r.i16()?),
        z: f32::from(r.i16()?),
        heading: f32::from(r.u8()?),
        zone_id: r.u16()?,
        coin: common::get_coin(r)?,
        exp: r.u32()?,
    })
}

fn put_character_list(w: &mut FieldWriter, chars: &[CharacterSummary]) {
    let slot = |i: usize| chars.get(i);
    for i in 0..CHARACTER_SLOTS {
        w.fixed_str(slot(i).map(|c| c.name.as_str()).unwrap_or(""), NAME_LEN);
    }
    for i in 0..CHARACTER_SLOTS {
        w.u8(slot(i).map_or(0, |c| c.level));
    }
    for i in 0..CHARACTER_SLOTS {
        w.u8(slot(i).map_or(0, |c| c.class));
    }
    for i in 0..CHARACTER_SLOTS {
        w.u16(slot(i).map_or(0, |c| c.race));
    }
    for i in 0..CHARACTER_SLOTS {
        w.u8(slot(i).map_or(0, |c| c.gender));
    }
    for i in 0..CHARACTER_SLOTS {
        w.u16(slot(i).map_or(0, |c| c.zone_id));
    }
}

fn get_character_list(r: &mut FieldReader<'_>) -> Option<Vec<CharacterSummary>> {
    r.need(CHARACTER_LIST_LEN)?;
    let mut names = Vec::with_capacity(CHARACTER_SLOTS);
    for _ in 0..CHARACTER_SLOTS {
        names.push(r.fixed_str(NAME_LEN)?);
    }
    let mut slots: Vec<CharacterSummary> = names
        .into_iter()
        .map(|name| CharacterSummary {
            name,
            level: 0,
            class: 0,
            race: 0,
            gender: 0,
            zone_id: 0,
        })
        .collect();
    for c in slots.iter_mut() {
        c.level = r.u8()?;
    }
    for c in slots.iter_mut() {
        c.class = r.u8()?;
    }
    for c in slots.iter_mut() {
        c.race = r.u16()?;
    }
    for c in slots.iter_mut() {
        c.gender = r.u8()?;
    }
    for c in slots.iter_mut() {
        c.zone_id = r.u16()?;
    }
    slots.retain(|c| !c.name.is_empty());
    Some(slots)
}

/// Records packed back to back; a trailing partial record is ignored.
fn get_repeated<T>(
    payload: &[u8],
    record_len: usize,
    mut get: impl FnMut(&mut FieldReader<'_>) -> Option<T>,
) -> Option<Vec<T>> {
    let mut r = FieldReader::new(payload);
    let mut out = Vec::with_capacity(payload.len() / record_len);
    while r.remaining() >= record_len {
        out.push(get(&mut r)?);
    }
    Some(out)
}

impl WireCodec for LegacyCodec {
    fn variant(&self) -> WireVariant {
        WireVariant::Legacy
    }

    fn opcodes(&self) -> &'static OpcodeTable {
        OpcodeTable::for_variant(WireVariant::Legacy)
    }

    fn has_server_name_step(&self) -> bool {
        true
    }

    fn payload_transform(&self, kind: MessageKind) -> Option<CipherFamily> {
        match kind {
            MessageKind::PlayerProfile => Some(CipherFamily::Profile),
            MessageKind::ZoneSpawns | MessageKind::NewSpawn => Some(CipherFamily::Spawn),
            _ => None,
        }
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
            other => common::decode_outgoing(&LAYOUT, other, payload),
        }
    }

    fn encode_inbound(&self, msg: &Inbound) -> Vec<u8> {
        let mut w = FieldWriter::with_capacity(128);
        match msg {
            Inbound::ServerName { name } => {
                w.fixed_str(name, SERVER_NAME_STEP_LEN);
            }
            Inbound::CharacterList(chars) => put_character_list(&mut w, chars),
            Inbound::PlayerProfile(p) => put_profile(&mut w, p),
            Inbound::ZoneSpawns(spawns) => {
                for s in spawns {
                    put_spawn(&mut w, s);
                }
            }
            Inbound::NewSpawn(s) => put_spawn(&mut w, s),
            Inbound::SpawnPositions(positions) => {
                for p in positions {
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
            MessageKind::ServerName => Some(Inbound::ServerName {
                name: r.fixed_str(SERVER_NAME_STEP_LEN)?,
            }),
            MessageKind::CharacterList => get_character_list(&mut r).map(Inbound::CharacterList),
            MessageKind::PlayerProfile => get_profile(&mut r).map(Inbound::PlayerProfile),
            MessageKind::ZoneSpawns => {
                get_repeated(payload, SPAWN_LEN, get_spawn).map(Inbound::ZoneSpawns)
            }
            MessageKind::NewSpawn => get_spawn(&mut r).map(Inbound::NewSpawn),
            MessageKind::SpawnPositions => {
                let positions = get_repeated(payload, POSITION_LEN, get_position)?;
                (!positions.is_empty()).then_some(Inbound::SpawnPositions(positions))
            }
            other => common::decode_inbound(&LAYOUT, other, payload),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn position(spawn_id: u32) -> SpawnPosition {
        SpawnPosition {
            spawn_id,
            x: -1200.0,
            y: 355.0,
            z: 4.0,
            heading: 128.0,
            delta_x: -3.0,
            delta_y: 1000.0,
            delta_z: -512.0,
            delta_heading: -7.0,
            animation: 12,
        }
    }

    #[test]
    fn position_record_is_fifteen_bytes() {
        let body = LegacyCodec.encode_outgoing(&Outgoing::ClientPosition(position(77)));
        assert_eq!(body.len(), POSITION_LEN);
        // y precedes x on this wire.
        assert_eq!(i16::from_le_bytes([body[5], body[6]]), 355);
        assert_eq!(i16::from_le_bytes([body[7], body[8]]), -1200);
    }

    #[test]
    fn velocity_bits_sign_extend() {
        let packed = pack_velocity(-3.0, 1000.0, -512.0);
        assert_eq!(packed & 0x7FF, 1000);
        assert_eq!(packed & (1 << 11), 0, "spacer bit stays clear");
        assert_eq!(unpack_velocity(packed), (-3.0, 1000.0, -512.0));
    }

    #[test]
    fn velocity_clamps_to_field_width() {
        let (dx, dy, dz) = unpack_velocity(pack_velocity(5000.0, -5000.0, 600.0));
        assert_eq!((dx, dy, dz), (511.0, -1024.0, 511.0));
    }

    #[test]
    fn spawn_positions_carry_many_records() {
        let msg = Inbound::SpawnPositions(vec![position(1), position(2), position(3)]);
        let body = LegacyCodec.encode_inbound(&msg);
        assert_eq!(body.len(), 3 * POSITION_LEN);
        assert_eq!(
            LegacyCodec.decode_inbound(MessageKind::SpawnPositions, &body),
            Some(msg)
        );
        assert_eq!(
            LegacyCodec.decode_inbound(MessageKind::SpawnPositions, &body[..14]),
            None
        );
    }

    #[test]
    fn character_list_has_ten_slots() {
        let chars = vec![
            CharacterSummary {
                name: "Tolvan".into(),
                level: 12,
                class: 3,
                race: 2,
                gender: 0,
                zone_id: 54,
            },
            CharacterSummary {
                name: "Essa".into(),
                level: 50,
                class: 11,
                race: 6,
                gender: 1,
                zone_id: 202,
            },
        ];
        let body = LegacyCodec.encode_inbound(&Inbound::CharacterList(chars.clone()));
        assert_eq!(body.len(), CHARACTER_LIST_LEN);
        assert_eq!(
            LegacyCodec.decode_inbound(MessageKind::CharacterList, &body),
            Some(Inbound::CharacterList(chars))
        );
    }

    #[test]
    fn profile_is_fixed_size() {
        let profile = PlayerProfile {
            name: "Tolvan".into(),
            surname: "Ashgrove".into(),
            gender: 0,
            race: 2,
            class: 3,
            level: 12,
            hp: 240,
            mana: 0,
            x: 100.0,
            y: -50.0,
            z: 3.0,
            heading: 64.0,
            zone_id: 54,
            coin: Coin {
                platinum: 1,
                gold: 2,
                silver: 3,
                copper: 4,
            },
            exp: 12_345,
        };
        let body = LegacyCodec.encode_inbound(&Inbound::PlayerProfile(profile.clone()));
        assert_eq!(body.len(), PROFILE_LEN);
        assert_eq!(
            LegacyCodec.decode_inbound(MessageKind::PlayerProfile, &body),
            Some(Inbound::PlayerProfile(profile))
        );
        assert_eq!(
            LegacyCodec.decode_inbound(MessageKind::PlayerProfile, &body[..PROFILE_LEN - 1]),
            None
        );
    }

    #[test]
    fn transforms_cover_profile_and_spawns() {
        assert_eq!(
            LegacyCodec.payload_transform(MessageKind::PlayerProfile),
            Some(CipherFamily::Profile)
        );
        assert_eq!(
            LegacyCodec.payload_transform(MessageKind::ZoneSpawns),
            Some(CipherFamily::Spawn)
        );
        assert_eq!(LegacyCodec.payload_transform(MessageKind::ChannelMessage), None);
    }
}
