//! Driving a machine over the modern wire through the session-layer adapter.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender};
use zoneline::config::HandshakeConfig;
use zoneline::error::ProtocolError;
use zoneline::protocol::codec::{codec_for, ModernCodec, WireCodec};
use zoneline::protocol::commands::AuthCommand;
use zoneline::protocol::events::{AuthEvent, AuthState};
use zoneline::protocol::message::{Inbound, Outgoing};
use zoneline::protocol::opcodes::WireVariant;
use zoneline::protocol::records::{Credentials, LoginReply};
use zoneline::protocol::AuthMachine;
use zoneline::transport::SessionLayerAdapter;

fn adapter() -> (
    SessionLayerAdapter<AuthMachine>,
    Sender<AuthCommand>,
    Receiver<AuthEvent>,
) {
    let (cmd_tx, cmd_rx) = unbounded();
    let (ev_tx, ev_rx) = unbounded();
    let machine = AuthMachine::new(
        codec_for(WireVariant::Modern),
        &HandshakeConfig::default(),
        cmd_rx,
        ev_tx,
    );
    (SessionLayerAdapter::new(machine), cmd_tx, ev_rx)
}

/// Decode opcode-prefixed payloads back into client messages.
fn decode_all(payloads: &[Vec<u8>]) -> Vec<Outgoing> {
    let codec = codec_for(WireVariant::Modern);
    payloads
        .iter()
        .map(|app| {
            let (opcode, body) = ModernCodec::split_app(app).unwrap();
            let kind = codec.opcodes().kind(opcode).unwrap();
            codec.decode_outgoing(kind, body).unwrap()
        })
        .collect()
}

fn server_payload(msg: &Inbound) -> Vec<u8> {
    let cmd = codec_for(WireVariant::Modern)
        .encode_server_message(msg)
        .unwrap();
    ModernCodec::frame_app(cmd.opcode, &cmd.payload)
}

#[test]
fn login_over_session_layer() {
    let (mut adapter, commands, events) = adapter();
    let now = Instant::now();

    adapter.open(now);
    assert!(adapter.is_open());
    commands
        .send(AuthCommand::Connect(Credentials::new("player", "hunter2")))
        .unwrap();
    adapter.tick(now);

    let sent = decode_all(&adapter.take_app_payloads());
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], Outgoing::SessionReady);
    assert_eq!(
        sent[1],
        Outgoing::Login(Credentials::new("player", "hunter2"))
    );

    adapter.deliver(
        &server_payload(&Inbound::LoginReply(LoginReply {
            accepted: true,
            failure_code: 0,
            account_id: 55,
            session_key: "KEY0123456".into(),
        })),
        now,
    );
    assert!(events
        .try_iter()
        .any(|e| e == AuthEvent::LoginAccepted { account_id: 55 }));
    assert_eq!(
        decode_all(&adapter.take_app_payloads()),
        vec![Outgoing::ServerListRequest]
    );
    assert_eq!(adapter.machine().state(), AuthState::AwaitingServerList);
}

#[test]
fn short_payload_is_dropped() {
    let (mut adapter, commands, events) = adapter();
    let now = Instant::now();
    adapter.open(now);
    commands
        .send(AuthCommand::Connect(Credentials::new("player", "hunter2")))
        .unwrap();
    adapter.tick(now);
    adapter.take_app_payloads();
    events.try_iter().for_each(drop);

    adapter.deliver(&[0x02], now);
    assert!(events.try_iter().next().is_none());
    assert_eq!(adapter.machine().state(), AuthState::AwaitingLogin);
}

#[test]
fn session_loss_disconnects_machine() {
    let (mut adapter, commands, events) = adapter();
    let now = Instant::now();
    adapter.open(now);
    commands
        .send(AuthCommand::Connect(Credentials::new("player", "hunter2")))
        .unwrap();
    adapter.tick(now);
    adapter.take_app_payloads();

    adapter.fail(&ProtocolError::LinkFailure("session reset".into()), now);
    adapter.close(now);
    assert!(!adapter.is_open());
    assert!(events
        .try_iter()
        .any(|e| e == AuthEvent::StateChanged(AuthState::Disconnected)));
    assert!(adapter.take_app_payloads().is_empty());

    let machine = adapter.into_inner();
    assert_eq!(machine.state(), AuthState::Disconnected);
}
