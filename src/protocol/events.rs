//! Semantic events: the only channel from the network thread to the consumer.

use std::sync::Arc;

use crate::protocol::opcodes::MessageKind;
use crate::protocol::records::*;
use crate::protocol::size_check::SizeMismatch;

/// Non-fatal protocol observation worth surfacing.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Payload length disagreed with the documented layout.
    SizeMismatch(SizeMismatch),
    /// Inflate failed; the decrypted payload was decoded as-is.
    TransformFallback { kind: MessageKind },
    /// A non-critical message failed to decode and was dropped.
    Dropped { kind: MessageKind },
    UnknownOpcode { opcode: u16 },
    /// Own-identity assignment seen before the spawn request step.
    IdentityIgnored { spawn_id: u32 },
}

/// Behaviour every role event type shares with the machine core.
pub trait RoleEvent: Send + std::fmt::Debug + 'static {
    fn diagnostic(d: Diagnostic) -> Self;
    fn error(message: String) -> Self;
    fn reconnect_required(attempt: u32) -> Self;
    fn failed(reason: String) -> Self;

    /// Attempt number when this event asks for a fresh connection.
    fn reconnect_attempt(&self) -> Option<u32>;
}

macro_rules! role_event_common {
    ($ty:ident) => {
        impl RoleEvent for $ty {
            fn diagnostic(d: Diagnostic) -> Self {
                $ty::Diagnostic(d)
            }
            fn error(message: String) -> Self {
                $ty::Error(message)
            }
            fn reconnect_required(attempt: u32) -> Self {
                $ty::ReconnectRequired { attempt }
            }
            fn failed(reason: String) -> Self {
                $ty::Failed(reason)
            }
            fn reconnect_attempt(&self) -> Option<u32> {
                match self {
                    $ty::ReconnectRequired { attempt } => Some(*attempt),
                    _ => None,
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthState {
    Disconnected,
    Connecting,
    AwaitingLogin,
    AwaitingServerName,
    AwaitingServerList,
    ServerSelect,
    AwaitingPlay,
    Authenticated,
    Failed,
}

/// Everything the world server needs from a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTicket {
    pub account_id: u32,
    pub session_key: String,
    pub server_id: u32,
    pub world_address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    StateChanged(AuthState),
    LoginAccepted { account_id: u32 },
    ServerName { name: String },
    ServerList(Arc<Vec<ServerEntry>>),
    PlayDenied { server_id: u32, reason: u16 },
    SessionGranted(SessionTicket),
    Diagnostic(Diagnostic),
    Error(String),
    ReconnectRequired { attempt: u32 },
    Failed(String),
}

role_event_common!(AuthEvent);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorldState {
    Disconnected,
    Connecting,
    AwaitingApproval,
    CharacterSelect,
    EnteringWorld,
    ZoneHandoff,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    StateChanged(WorldState),
    ExpansionInfo { flags: u32 },
    Motd(String),
    CharacterList(Arc<Vec<CharacterSummary>>),
    NameApproval { name: String, approved: bool },
    ZoneHandoff(ZoneServerInfo),
    ZoneUnavailable { zone_name: String },
    Diagnostic(Diagnostic),
    Error(String),
    ReconnectRequired { attempt: u32 },
    Failed(String),
}

role_event_common!(WorldEvent);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneState {
    Disconnected,
    Connecting,
    AwaitingProfile,
    AwaitingZoneData,
    RequestingSpawns,
    InZone,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ZoneEvent {
    StateChanged(ZoneState),
    ProfileLoaded(Arc<PlayerProfile>),
    ZoneInfo(NewZone),
    IdentityAssigned { spawn_id: u32 },
    SpawnsLoaded { count: usize },
    SpawnAdded(Spawn),
    SpawnRemoved { spawn_id: u32 },
    SpawnMoved(SpawnPosition),
    AppearanceChanged(SpawnAppearance),
    HpChanged(HpUpdate),
    Damaged(Damage),
    Died(Death),
    Chat(ChatMessage),
    ConsiderResult(Consider),
    CastStarted(BeginCast),
    LootOpened(LootResponse),
    InventoryChanged { slot: i16, item: Option<Item> },
    MoneyChanged(Coin),
    ExperienceChanged { exp: u32 },
    LevelChanged(LevelUpdate),
    TimeOfDay(TimeOfDay),
    Weather(Weather),
    TradeRequested { from_id: u32 },
    TradeAccepted { from_id: u32 },
    TradeCancelled { from_id: u32 },
    ShopOpened(ShopOpen),
    GroupInvited { from: String },
    GroupUpdated(GroupUpdate),
    ZoneChange(ZoneChange),
    LoggedOut,
    Diagnostic(Diagnostic),
    Error(String),
    ReconnectRequired { attempt: u32 },
    Failed(String),
}

role_event_common!(ZoneEvent);
