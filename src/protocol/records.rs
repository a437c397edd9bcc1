//! Semantic records exchanged between codecs and state machines.
//!
//! Records are variant-neutral: spawn ids are `u32`, coordinates `f32`, names
//! `String`. Each codec narrows or widens them to its own wire layout.

use std::fmt;

/// Appearance type whose parameter assigns the client its own spawn id.
pub const APPEARANCE_SPAWN_ID: u16 = 0x0010;

/// Appearance type carrying an animation/stance change.
pub const APPEARANCE_ANIMATION: u16 = 0x000E;

/// Number of message filter slots sent during zone entry.
pub const FILTER_COUNT: usize = 29;

/// Group members carried by a group update besides the leader.
pub const GROUP_MEMBER_SLOTS: usize = 5;

/// Account credentials. The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginReply {
    pub accepted: bool,
    pub failure_code: u16,
    pub account_id: u32,
    pub session_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEntry {
    pub id: u32,
    pub players: i32,
    pub status: u8,
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayReply {
    pub server_id: u32,
    pub allowed: bool,
    pub reason: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldLogin {
    pub account_id: u32,
    pub session_key: String,
    pub zoning: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterSummary {
    pub name: String,
    pub level: u8,
    pub class: u8,
    pub race: u16,
    pub gender: u8,
    pub zone_id: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameApprovalRequest {
    pub name: String,
    pub race: u16,
    pub class: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterCreate {
    pub name: String,
    pub race: u16,
    pub class: u8,
    pub gender: u8,
    pub deity: u16,
    pub start_zone: u16,
    /// STR, STA, AGI, DEX, WIS, INT, CHA.
    pub attributes: [u8; 7],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneServerInfo {
    pub host: String,
    pub port: u16,
}

/// Coin purse in the four denominations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coin {
    pub platinum: u32,
    pub gold: u32,
    pub silver: u32,
    pub copper: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerProfile {
    pub name: String,
    pub surname: String,
    pub gender: u8,
    pub race: u16,
    pub class: u8,
    pub level: u8,
    pub hp: u32,
    pub mana: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub heading: f32,
    pub zone_id: u16,
    pub coin: Coin,
    pub exp: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewZone {
    pub character: String,
    pub short_name: String,
    pub long_name: String,
    pub zone_type: u8,
    pub safe_x: f32,
    pub safe_y: f32,
    pub safe_z: f32,
    pub gravity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spawn {
    pub spawn_id: u32,
    pub name: String,
    pub level: u8,
    pub race: u16,
    pub class: u8,
    pub gender: u8,
    pub is_npc: bool,
    pub hp_percent: u8,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub heading: f32,
}

/// Position and velocity of one spawn; also the client's own movement update.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpawnPosition {
    pub spawn_id: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub heading: f32,
    pub delta_x: f32,
    pub delta_y: f32,
    pub delta_z: f32,
    pub delta_heading: f32,
    pub animation: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnAppearance {
    pub spawn_id: u32,
    pub appearance_type: u16,
    pub parameter: u32,
}

impl SpawnAppearance {
    /// The spawn id assigned to this client, when this is an identity update.
    pub fn assigned_identity(&self) -> Option<u32> {
        (self.appearance_type == APPEARANCE_SPAWN_ID).then_some(self.parameter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HpUpdate {
    pub spawn_id: u32,
    pub current: i32,
    pub max: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Damage {
    pub target_id: u32,
    pub source_id: u32,
    pub damage_type: u8,
    pub spell_id: u16,
    pub amount: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Death {
    pub spawn_id: u32,
    pub killer_id: u32,
    pub damage: i32,
    pub spell_id: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub target: String,
    pub sender: String,
    pub language: u16,
    pub channel: u16,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Consider {
    pub player_id: u32,
    pub target_id: u32,
    pub faction: i32,
    pub level_con: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastSpell {
    pub slot: u16,
    pub spell_id: u16,
    pub target_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeginCast {
    pub caster_id: u32,
    pub spell_id: u16,
    pub cast_time_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LootResponse {
    pub corpse_id: u32,
    pub granted: bool,
    pub coin: Coin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LootItem {
    pub corpse_id: u32,
    pub looter_id: u32,
    pub slot: u16,
    pub auto_loot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub slot: i16,
    pub item_id: u32,
    pub charges: u16,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelUpdate {
    pub level: u32,
    pub old_level: u32,
    pub exp: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
    pub day: u8,
    pub month: u8,
    pub year: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weather {
    pub kind: u32,
    pub intensity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeRequest {
    pub to_id: u32,
    pub from_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShopRequest {
    pub npc_id: u32,
    pub player_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShopOpen {
    pub npc_id: u32,
    pub rate: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShopBuy {
    pub npc_id: u32,
    pub player_id: u32,
    pub slot: u32,
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveItem {
    pub from_slot: u32,
    pub to_slot: u32,
    pub count: u32,
}

/// Two-name group message (invite, follow, disband).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPair {
    pub actor: String,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupUpdate {
    pub action: u32,
    pub leader: String,
    /// Occupied member slots only.
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneChange {
    pub character: String,
    pub zone_id: u16,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub success: i32,
}
