//! Opcode contract shared by both wire variants.
//!
//! State machines and codecs speak in [`MessageKind`]; only the per-variant
//! [`OpcodeTable`] knows the 16-bit value a kind travels under. A kind missing
//! from a table does not exist on that wire (the server-name step is legacy
//! only).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Wire variant spoken by a server family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireVariant {
    /// Legacy UDP transport framed by [`crate::core::codec`].
    #[default]
    Legacy,
    /// Session-layer transport; framing handled outside this crate.
    Modern,
}

/// Every application message family, independent of wire variant.
///
/// Some kinds travel in both directions with different layouts
/// (e.g. [`MessageKind::Consider`] carries a request from the client and the
/// reply from the server).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    // Login server
    SessionReady,
    Login,
    LoginReply,
    ServerNameRequest,
    ServerName,
    ServerListRequest,
    ServerList,
    PlayRequest,
    PlayReply,

    // World server
    WorldLogin,
    ApproveWorld,
    ExpansionInfo,
    Motd,
    CharacterList,
    ApproveName,
    CharacterCreate,
    CharacterDelete,
    EnterWorld,
    ZoneServerInfo,
    ZoneUnavailable,

    // Zone server
    ZoneEntry,
    SetFilter,
    ReqNewZone,
    ReqClientSpawn,
    ClientReady,
    PlayerProfile,
    NewZone,
    ZoneSpawns,
    NewSpawn,
    DeleteSpawn,
    ClientPosition,
    SpawnPositions,
    SpawnAppearance,
    HpUpdate,
    Damage,
    Death,
    ChannelMessage,
    Target,
    Consider,
    CastSpell,
    BeginCast,
    LootRequest,
    LootResponse,
    LootItem,
    EndLoot,
    ItemPacket,
    DeleteItem,
    MoneyUpdate,
    ExpUpdate,
    LevelUpdate,
    TimeOfDay,
    Weather,
    TradeRequest,
    TradeAccept,
    TradeCancel,
    ShopRequest,
    ShopBuy,
    ShopEnd,
    MoveItem,
    GroupInvite,
    GroupFollow,
    GroupDisband,
    GroupUpdate,
    Camp,
    Logout,
    LogoutReply,
    ZoneChange,
}

use MessageKind as K;

// (kind, legacy opcode, modern opcode)
const ASSIGNMENTS: &[(MessageKind, Option<u16>, Option<u16>)] = &[
    (K::SessionReady, Some(0x0001), Some(0x0001)),
    (K::Login, Some(0x0002), Some(0x0002)),
    (K::LoginReply, Some(0x0017), Some(0x0017)),
    (K::ServerNameRequest, Some(0x0046), None),
    (K::ServerName, Some(0x0047), None),
    (K::ServerListRequest, Some(0x0004), Some(0x0004)),
    (K::ServerList, Some(0x0018), Some(0x0018)),
    (K::PlayRequest, Some(0x000D), Some(0x000D)),
    (K::PlayReply, Some(0x0021), Some(0x0021)),
    (K::WorldLogin, Some(0x5818), Some(0x7A09)),
    (K::ApproveWorld, Some(0x3C25), Some(0x7499)),
    (K::ExpansionInfo, Some(0x04EC), Some(0x7E4D)),
    (K::Motd, Some(0x024D), Some(0x0C22)),
    (K::CharacterList, Some(0x6681), Some(0x00D2)),
    (K::ApproveName, Some(0x3EA6), Some(0x56A2)),
    (K::CharacterCreate, Some(0x0C49), Some(0x10B2)),
    (K::CharacterDelete, Some(0x5A57), Some(0x26C9)),
    (K::EnterWorld, Some(0x7CBA), Some(0x578F)),
    (K::ZoneServerInfo, Some(0x61B6), Some(0x4C44)),
    (K::ZoneUnavailable, Some(0x4BA4), Some(0x582D)),
    (K::ZoneEntry, Some(0x7213), Some(0x5089)),
    (K::SetFilter, Some(0x6563), Some(0x2C2D)),
    (K::ReqNewZone, Some(0x7AC5), Some(0x1C7B)),
    (K::ReqClientSpawn, Some(0x0322), Some(0x35FA)),
    (K::ClientReady, Some(0x345D), Some(0x5E20)),
    (K::PlayerProfile, Some(0x75DF), Some(0x6506)),
    (K::NewZone, Some(0x0920), Some(0x1795)),
    (K::ZoneSpawns, Some(0x2E78), Some(0x0E8A)),
    (K::NewSpawn, Some(0x1860), Some(0x1A0E)),
    (K::DeleteSpawn, Some(0x55BC), Some(0x5C7B)),
    (K::ClientPosition, Some(0x14CB), Some(0x7DFC)),
    (K::SpawnPositions, Some(0x4656), Some(0x14CD)),
    (K::SpawnAppearance, Some(0x7C32), Some(0x234A)),
    (K::HpUpdate, Some(0x3BCF), Some(0x2B7A)),
    (K::Damage, Some(0x5C78), Some(0x3B2C)),
    (K::Death, Some(0x6160), Some(0x49F3)),
    (K::ChannelMessage, Some(0x1004), Some(0x2E3A)),
    (K::Target, Some(0x6C47), Some(0x1E81)),
    (K::Consider, Some(0x4D6A), Some(0x3A25)),
    (K::CastSpell, Some(0x304B), Some(0x2B47)),
    (K::BeginCast, Some(0x3990), Some(0x0F1D)),
    (K::LootRequest, Some(0x6F90), Some(0x0C92)),
    (K::LootResponse, Some(0x7762), Some(0x5D38)),
    (K::LootItem, Some(0x7081), Some(0x3C1A)),
    (K::EndLoot, Some(0x2316), Some(0x1B39)),
    (K::ItemPacket, Some(0x3397), Some(0x5B5A)),
    (K::DeleteItem, Some(0x4D81), Some(0x7CB9)),
    (K::MoneyUpdate, Some(0x267C), Some(0x0D9F)),
    (K::ExpUpdate, Some(0x5ECD), Some(0x6E6B)),
    (K::LevelUpdate, Some(0x6D44), Some(0x7A22)),
    (K::TimeOfDay, Some(0x1580), Some(0x3AEA)),
    (K::Weather, Some(0x254D), Some(0x0A27)),
    (K::TradeRequest, Some(0x372F), Some(0x2F7E)),
    (K::TradeAccept, Some(0x0065), Some(0x4F4C)),
    (K::TradeCancel, Some(0x2DC1), Some(0x03AC)),
    (K::ShopRequest, Some(0x45F9), Some(0x1D47)),
    (K::ShopBuy, Some(0x0A5E), Some(0x1D6B)),
    (K::ShopEnd, Some(0x7E03), Some(0x4AE0)),
    (K::MoveItem, Some(0x420F), Some(0x12E7)),
    (K::GroupInvite, Some(0x1B48), Some(0x5C9F)),
    (K::GroupFollow, Some(0x7BC7), Some(0x4F9D)),
    (K::GroupDisband, Some(0x0E76), Some(0x6A8D)),
    (K::GroupUpdate, Some(0x4F60), Some(0x3F4F)),
    (K::Camp, Some(0x78C1), Some(0x3126)),
    (K::Logout, Some(0x61FF), Some(0x0E3F)),
    (K::LogoutReply, Some(0x3CDC), Some(0x2B1A)),
    (K::ZoneChange, Some(0x5D47), Some(0x2E5F)),
];

/// Bidirectional kind/opcode map for one wire variant.
#[derive(Debug)]
pub struct OpcodeTable {
    variant: WireVariant,
    to_wire: HashMap<MessageKind, u16>,
    from_wire: HashMap<u16, MessageKind>,
}

static LEGACY: Lazy<OpcodeTable> = Lazy::new(|| OpcodeTable::build(WireVariant::Legacy));
static MODERN: Lazy<OpcodeTable> = Lazy::new(|| OpcodeTable::build(WireVariant::Modern));

impl OpcodeTable {
    fn build(variant: WireVariant) -> Self {
        let mut to_wire = HashMap::with_capacity(ASSIGNMENTS.len());
        let mut from_wire = HashMap::with_capacity(ASSIGNMENTS.len());
        for &(kind, legacy, modern) in ASSIGNMENTS {
            let opcode = match variant {
                WireVariant::Legacy => legacy,
                WireVariant::Modern => modern,
            };
            if let Some(opcode) = opcode {
                to_wire.insert(kind, opcode);
                from_wire.insert(opcode, kind);
            }
        }
        Self {
            variant,
            to_wire,
            from_wire,
        }
    }

    /// Table for the given variant.
    pub fn for_variant(variant: WireVariant) -> &'static OpcodeTable {
        match variant {
            WireVariant::Legacy => &LEGACY,
            WireVariant::Modern => &MODERN,
        }
    }

    pub fn variant(&self) -> WireVariant {
        self.variant
    }

    /// Wire opcode for `kind`, if the variant carries it.
    #[inline]
    pub fn opcode(&self, kind: MessageKind) -> Option<u16> {
        self.to_wire.get(&kind).copied()
    }

    /// Kind for a wire opcode, if known.
    #[inline]
    pub fn kind(&self, opcode: u16) -> Option<MessageKind> {
        self.from_wire.get(&opcode).copied()
    }

    pub fn len(&self) -> usize {
        self.to_wire.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_wire.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_bijective() {
        for variant in [WireVariant::Legacy, WireVariant::Modern] {
            let table = OpcodeTable::for_variant(variant);
            assert_eq!(table.to_wire.len(), table.from_wire.len(), "{variant:?}");
            for (&kind, &opcode) in &table.to_wire {
                assert_eq!(table.kind(opcode), Some(kind));
            }
        }
    }

    #[test]
    fn server_name_step_is_legacy_only() {
        let legacy = OpcodeTable::for_variant(WireVariant::Legacy);
        let modern = OpcodeTable::for_variant(WireVariant::Modern);
        assert!(legacy.opcode(MessageKind::ServerNameRequest).is_some());
        assert!(modern.opcode(MessageKind::ServerNameRequest).is_none());
        assert!(modern.opcode(MessageKind::ServerName).is_none());
        assert_eq!(legacy.len(), modern.len() + 2);
    }

    #[test]
    fn unknown_opcode() {
        let legacy = OpcodeTable::for_variant(WireVariant::Legacy);
        assert_eq!(legacy.kind(0xFFFF), None);
    }
}
