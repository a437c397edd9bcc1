//! Consumer commands, one enum per role.
//!
//! Commands are queued by the consumer thread and applied by the machine on
//! the network thread during its next tick.

use crate::protocol::records::*;

#[derive(Debug, Clone, PartialEq)]
pub enum AuthCommand {
    Connect(Credentials),
    RefreshServerList,
    Play { server_id: u32 },
    Disconnect,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorldCommand {
    Connect { account_id: u32, session_key: String },
    CheckName(NameApprovalRequest),
    CreateCharacter(CharacterCreate),
    DeleteCharacter { name: String },
    EnterWorld { name: String },
    Disconnect,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ZoneCommand {
    Connect { character: String },
    Move(SpawnPosition),
    Chat { channel: u16, target: String, message: String },
    Target { target_id: u32 },
    Consider { target_id: u32 },
    Cast { slot: u16, spell_id: u16, target_id: u32 },
    Loot { corpse_id: u32 },
    LootItem { corpse_id: u32, slot: u16 },
    EndLoot { corpse_id: u32 },
    TradeRequest { target_id: u32 },
    TradeAccept { from_id: u32 },
    TradeCancel { from_id: u32 },
    ShopOpen { npc_id: u32 },
    ShopBuy { npc_id: u32, slot: u32, quantity: u32 },
    ShopClose { npc_id: u32 },
    Equip(MoveItem),
    GroupInvite { name: String },
    GroupFollow { inviter: String },
    GroupDisband,
    Camp,
    Logout,
    Disconnect,
}

impl ZoneCommand {
    /// Whether the command needs a fully entered zone.
    pub fn requires_zone(&self) -> bool {
        !matches!(self, ZoneCommand::Connect { .. } | ZoneCommand::Disconnect)
    }
}
