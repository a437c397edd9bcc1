//! Direction-typed application messages.
//!
//! [`Outgoing`] is what the client sends, [`Inbound`] what the server sends.
//! Both map onto the shared [`MessageKind`] contract; the wire layout of a
//! message is the codec's business.

use crate::protocol::opcodes::MessageKind;
use crate::protocol::records::*;

/// Client to server.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    SessionReady,
    Login(Credentials),
    ServerNameRequest,
    ServerListRequest,
    PlayRequest { server_id: u32 },
    WorldLogin(WorldLogin),
    ApproveName(NameApprovalRequest),
    CharacterCreate(CharacterCreate),
    CharacterDelete { name: String },
    EnterWorld { name: String },
    ZoneEntry { name: String },
    SetFilter(Vec<u32>),
    ReqNewZone,
    ReqClientSpawn,
    ClientReady,
    ClientPosition(SpawnPosition),
    ChannelMessage(ChatMessage),
    Target { target_id: u32 },
    Consider(Consider),
    CastSpell(CastSpell),
    LootRequest { corpse_id: u32 },
    LootItem(LootItem),
    EndLoot { corpse_id: u32 },
    TradeRequest(TradeRequest),
    TradeAccept { from_id: u32 },
    TradeCancel { from_id: u32 },
    ShopRequest(ShopRequest),
    ShopBuy(ShopBuy),
    ShopEnd(ShopRequest),
    MoveItem(MoveItem),
    GroupInvite(GroupPair),
    GroupFollow(GroupPair),
    GroupDisband(GroupPair),
    Camp,
    Logout,
}

impl Outgoing {
    pub fn kind(&self) -> MessageKind {
        match self {
            Outgoing::SessionReady => MessageKind::SessionReady,
            Outgoing::Login(_) => MessageKind::Login,
            Outgoing::ServerNameRequest => MessageKind::ServerNameRequest,
            Outgoing::ServerListRequest => MessageKind::ServerListRequest,
            Outgoing::PlayRequest { .. } => MessageKind::PlayRequest,
            Outgoing::WorldLogin(_) => MessageKind::WorldLogin,
            Outgoing::ApproveName(_) => MessageKind::ApproveName,
            Outgoing::CharacterCreate(_) => MessageKind::CharacterCreate,
            Outgoing::CharacterDelete { .. } => MessageKind::CharacterDelete,
            Outgoing::EnterWorld { .. } => MessageKind::EnterWorld,
            Outgoing::ZoneEntry { .. } => MessageKind::ZoneEntry,
            Outgoing::SetFilter(_) => MessageKind::SetFilter,
            Outgoing::ReqNewZone => MessageKind::ReqNewZone,
            Outgoing::ReqClientSpawn => MessageKind::ReqClientSpawn,
            Outgoing::ClientReady => MessageKind::ClientReady,
            Outgoing::ClientPosition(_) => MessageKind::ClientPosition,
            Outgoing::ChannelMessage(_) => MessageKind::ChannelMessage,
            Outgoing::Target { .. } => MessageKind::Target,
            Outgoing::Consider(_) => MessageKind::Consider,
            Outgoing::CastSpell(_) => MessageKind::CastSpell,
            Outgoing::LootRequest { .. } => MessageKind::LootRequest,
            Outgoing::LootItem(_) => MessageKind::LootItem,
            Outgoing::EndLoot { .. } => MessageKind::EndLoot,
            Outgoing::TradeRequest(_) => MessageKind::TradeRequest,
            Outgoing::TradeAccept { .. } => MessageKind::TradeAccept,
            Outgoing::TradeCancel { .. } => MessageKind::TradeCancel,
            Outgoing::ShopRequest(_) => MessageKind::ShopRequest,
            Outgoing::ShopBuy(_) => MessageKind::ShopBuy,
            Outgoing::ShopEnd(_) => MessageKind::ShopEnd,
            Outgoing::MoveItem(_) => MessageKind::MoveItem,
            Outgoing::GroupInvite(_) => MessageKind::GroupInvite,
            Outgoing::GroupFollow(_) => MessageKind::GroupFollow,
            Outgoing::GroupDisband(_) => MessageKind::GroupDisband,
            Outgoing::Camp => MessageKind::Camp,
            Outgoing::Logout => MessageKind::Logout,
        }
    }
}

/// Server to client.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    LoginReply(LoginReply),
    ServerName { name: String },
    ServerList(Vec<ServerEntry>),
    PlayReply(PlayReply),
    ApproveWorld,
    ExpansionInfo { flags: u32 },
    Motd { text: String },
    CharacterList(Vec<CharacterSummary>),
    NameApproval { approved: bool },
    ZoneServerInfo(ZoneServerInfo),
    ZoneUnavailable { zone_name: String },
    PlayerProfile(PlayerProfile),
    NewZone(NewZone),
    ZoneSpawns(Vec<Spawn>),
    NewSpawn(Spawn),
    DeleteSpawn { spawn_id: u32 },
    SpawnPositions(Vec<SpawnPosition>),
    SpawnAppearance(SpawnAppearance),
    HpUpdate(HpUpdate),
    Damage(Damage),
    Death(Death),
    ChannelMessage(ChatMessage),
    Consider(Consider),
    BeginCast(BeginCast),
    LootResponse(LootResponse),
    ItemPacket(Item),
    DeleteItem { slot: i16 },
    MoneyUpdate(Coin),
    ExpUpdate { exp: u32 },
    LevelUpdate(LevelUpdate),
    TimeOfDay(TimeOfDay),
    Weather(Weather),
    TradeRequest(TradeRequest),
    TradeAccept { from_id: u32 },
    TradeCancel { from_id: u32 },
    ShopOpen(ShopOpen),
    GroupInvite(GroupPair),
    GroupUpdate(GroupUpdate),
    LogoutReply,
    ZoneChange(ZoneChange),
}

impl Inbound {
    pub fn kind(&self) -> MessageKind {
        match self {
            Inbound::LoginReply(_) => MessageKind::LoginReply,
            Inbound::ServerName { .. } => MessageKind::ServerName,
            Inbound::ServerList(_) => MessageKind::ServerList,
            Inbound::PlayReply(_) => MessageKind::PlayReply,
            Inbound::ApproveWorld => MessageKind::ApproveWorld,
            Inbound::ExpansionInfo { .. } => MessageKind::ExpansionInfo,
            Inbound::Motd { .. } => MessageKind::Motd,
            Inbound::CharacterList(_) => MessageKind::CharacterList,
            Inbound::NameApproval { .. } => MessageKind::ApproveName,
            Inbound::ZoneServerInfo(_) => MessageKind::ZoneServerInfo,
            Inbound::ZoneUnavailable { .. } => MessageKind::ZoneUnavailable,
            Inbound::PlayerProfile(_) => MessageKind::PlayerProfile,
            Inbound::NewZone(_) => MessageKind::NewZone,
            Inbound::ZoneSpawns(_) => MessageKind::ZoneSpawns,
            Inbound::NewSpawn(_) => MessageKind::NewSpawn,
            Inbound::DeleteSpawn { .. } => MessageKind::DeleteSpawn,
            Inbound::SpawnPositions(_) => MessageKind::SpawnPositions,
            Inbound::SpawnAppearance(_) => MessageKind::SpawnAppearance,
            Inbound::HpUpdate(_) => MessageKind::HpUpdate,
            Inbound::Damage(_) => MessageKind::Damage,
            Inbound::Death(_) => MessageKind::Death,
            Inbound::ChannelMessage(_) => MessageKind::ChannelMessage,
            Inbound::Consider(_) => MessageKind::Consider,
            Inbound::BeginCast(_) => MessageKind::BeginCast,
            Inbound::LootResponse(_) => MessageKind::LootResponse,
            Inbound::ItemPacket(_) => MessageKind::ItemPacket,
            Inbound::DeleteItem { .. } => MessageKind::DeleteItem,
            Inbound::MoneyUpdate(_) => MessageKind::MoneyUpdate,
            Inbound::ExpUpdate { .. } => MessageKind::ExpUpdate,
            Inbound::LevelUpdate(_) => MessageKind::LevelUpdate,
            Inbound::TimeOfDay(_) => MessageKind::TimeOfDay,
            Inbound::Weather(_) => MessageKind::Weather,
            Inbound::TradeRequest(_) => MessageKind::TradeRequest,
            Inbound::TradeAccept { .. } => MessageKind::TradeAccept,
            Inbound::TradeCancel { .. } => MessageKind::TradeCancel,
            Inbound::ShopOpen(_) => MessageKind::ShopRequest,
            Inbound::GroupInvite(_) => MessageKind::GroupInvite,
            Inbound::GroupUpdate(_) => MessageKind::GroupUpdate,
            Inbound::LogoutReply => MessageKind::LogoutReply,
            Inbound::ZoneChange(_) => MessageKind::ZoneChange,
        }
    }
}
