//! Payload size validation for handshake-critical messages.
//!
//! The servers silently drop mis-sized packets, so a diverging struct layout
//! only shows up here. A mismatch is a diagnostic: callers log it, count it
//! and keep decoding.

use std::fmt;

use crate::protocol::codec::{common, legacy, modern};
use crate::protocol::opcodes::{MessageKind, WireVariant};

/// Documented size rule for one kind on one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedSize {
    Exact(usize),
    /// Non-zero whole number of records.
    MultipleOf(usize),
    AtLeast(usize),
}

impl ExpectedSize {
    pub fn accepts(self, len: usize) -> bool {
        match self {
            ExpectedSize::Exact(n) => len == n,
            ExpectedSize::MultipleOf(n) => n > 0 && len > 0 && len % n == 0,
            ExpectedSize::AtLeast(n) => len >= n,
        }
    }
}

impl fmt::Display for ExpectedSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedSize::Exact(n) => write!(f, "exactly {n}"),
            ExpectedSize::MultipleOf(n) => write!(f, "a multiple of {n}"),
            ExpectedSize::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// Observed payload length disagreeing with the documented layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeMismatch {
    pub variant: WireVariant,
    pub kind: MessageKind,
    pub expected: ExpectedSize,
    pub actual: usize,
}

impl fmt::Display for SizeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} payload on {:?} wire is {} bytes, expected {}",
            self.kind, self.variant, self.actual, self.expected
        )
    }
}

/// Size rule for `kind`, when it is validated at all.
pub fn expected(variant: WireVariant, kind: MessageKind) -> Option<ExpectedSize> {
    use ExpectedSize::*;

    let shared = match kind {
        MessageKind::LoginReply => Some(Exact(common::LOGIN_REPLY_LEN)),
        MessageKind::ServerList => Some(AtLeast(4)),
        MessageKind::PlayReply => Some(Exact(common::PLAY_REPLY_LEN)),
        MessageKind::ApproveName => Some(Exact(common::NAME_APPROVAL_LEN)),
        MessageKind::ZoneServerInfo => Some(Exact(common::ZONE_SERVER_INFO_LEN)),
        _ => None,
    };
    if shared.is_some() {
        return shared;
    }

    match variant {
        WireVariant::Legacy => match kind {
            MessageKind::ServerName => Some(Exact(legacy::SERVER_NAME_STEP_LEN)),
            MessageKind::CharacterList => Some(Exact(legacy::CHARACTER_LIST_LEN)),
            MessageKind::PlayerProfile => Some(Exact(legacy::PROFILE_LEN)),
            MessageKind::NewZone => Some(Exact(legacy::LAYOUT.new_zone_len())),
            MessageKind::ZoneSpawns => Some(MultipleOf(legacy::SPAWN_LEN)),
            MessageKind::NewSpawn => Some(Exact(legacy::SPAWN_LEN)),
            MessageKind::SpawnAppearance => Some(Exact(legacy::LAYOUT.appearance_len())),
            MessageKind::SpawnPositions => Some(MultipleOf(legacy::POSITION_LEN)),
            _ => None,
        },
        WireVariant::Modern => match kind {
            MessageKind::CharacterList => Some(AtLeast(4)),
            MessageKind::PlayerProfile => Some(Exact(modern::PROFILE_LEN)),
            MessageKind::NewZone => Some(Exact(modern::LAYOUT.new_zone_len())),
            MessageKind::ZoneSpawns => Some(MultipleOf(modern::SPAWN_LEN)),
            MessageKind::NewSpawn => Some(Exact(modern::SPAWN_LEN)),
            MessageKind::SpawnAppearance => Some(Exact(modern::LAYOUT.appearance_len())),
            MessageKind::SpawnPositions => Some(Exact(modern::POSITION_LEN)),
            _ => None,
        },
    }
}

/// Compare an observed payload length against the table.
pub fn check(variant: WireVariant, kind: MessageKind, len: usize) -> Option<SizeMismatch> {
    let rule = expected(variant, kind)?;
    (!rule.accepts(len)).then_some(SizeMismatch {
        variant,
        kind,
        expected: rule,
        actual: len,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::protocol::codec::{codec_for, WireCodec};
    use crate::protocol::message::Inbound;
    use crate::protocol::records::{LoginReply, SpawnAppearance};

    #[test]
    fn rules() {
        assert!(ExpectedSize::Exact(8).accepts(8));
        assert!(!ExpectedSize::Exact(8).accepts(9));
        assert!(ExpectedSize::MultipleOf(15).accepts(45));
        assert!(!ExpectedSize::MultipleOf(15).accepts(0));
        assert!(!ExpectedSize::MultipleOf(15).accepts(44));
        assert!(ExpectedSize::AtLeast(4).accepts(400));
    }

    #[test]
    fn unvalidated_kinds_pass() {
        assert_eq!(check(WireVariant::Legacy, MessageKind::ChannelMessage, 3), None);
    }

    #[test]
    fn mismatch_reports_both_sizes() {
        let m = check(WireVariant::Legacy, MessageKind::PlayerProfile, 90).unwrap();
        assert_eq!(m.expected, ExpectedSize::Exact(legacy::PROFILE_LEN));
        assert_eq!(m.actual, 90);
        assert!(m.to_string().contains("expected exactly 92"));
    }

    #[test]
    fn table_matches_encoders() {
        for variant in [WireVariant::Legacy, WireVariant::Modern] {
            let codec = codec_for(variant);
            let samples = [
                Inbound::LoginReply(LoginReply {
                    accepted: true,
                    failure_code: 0,
                    account_id: 1,
                    session_key: "k".into(),
                }),
                Inbound::SpawnAppearance(SpawnAppearance {
                    spawn_id: 9,
                    appearance_type: 16,
                    parameter: 9,
                }),
                Inbound::NameApproval { approved: true },
            ];
            for msg in samples {
                let body = codec.encode_inbound(&msg);
                assert_eq!(check(variant, msg.kind(), body.len()), None, "{msg:?}");
            }
        }
    }
}
