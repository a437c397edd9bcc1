//! End-to-end tests of the network thread against a loopback UDP peer.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};
use zoneline::config::{HandshakeConfig, TransportConfig};
use zoneline::core::codec::{self, decode_frame, AckPair};
use zoneline::core::packet::InboundPacket;
use zoneline::error::constants::ERR_RECONNECT_BUDGET;
use zoneline::protocol::codec::{codec_for, WireCodec};
use zoneline::protocol::commands::AuthCommand;
use zoneline::protocol::events::{AuthEvent, AuthState};
use zoneline::protocol::message::Inbound;
use zoneline::protocol::opcodes::{MessageKind, WireVariant};
use zoneline::protocol::records::{Credentials, LoginReply};
use zoneline::protocol::AuthMachine;
use zoneline::transport::{IoCommand, NetworkThread};

const WAIT: Duration = Duration::from_secs(3);

fn transport() -> TransportConfig {
    TransportConfig {
        bind_address: "127.0.0.1:0".into(),
        ..TransportConfig::default()
    }
}

fn server() -> (UdpSocket, SocketAddr) {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.set_read_timeout(Some(Duration::from_millis(50))).unwrap();
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

/// Receive until a frame carrying `opcode` arrives.
fn await_opcode(server: &UdpSocket, opcode: u16) -> (InboundPacket, SocketAddr) {
    let deadline = Instant::now() + WAIT;
    let mut buf = [0u8; 2048];
    while Instant::now() < deadline {
        let Ok((len, from)) = server.recv_from(&mut buf) else {
            continue;
        };
        let packet = decode_frame(&buf[..len]).unwrap();
        assert!(packet.checksum_ok);
        if packet.opcode == Some(opcode) {
            return (packet, from);
        }
    }
    panic!("no frame with opcode {opcode:#06x}");
}

fn await_event(events: &Receiver<AuthEvent>, want: impl Fn(&AuthEvent) -> bool) -> AuthEvent {
    let deadline = Instant::now() + WAIT;
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match events.recv_timeout(left) {
            Ok(event) if want(&event) => return event,
            Ok(_) => {}
            Err(_) => break,
        }
    }
    panic!("expected event never arrived");
}

fn spawn_auth(
    handshake: &HandshakeConfig,
) -> (
    NetworkThread,
    crossbeam_channel::Sender<AuthCommand>,
    Receiver<AuthEvent>,
) {
    let (cmd_tx, cmd_rx) = unbounded();
    let (ev_tx, ev_rx) = unbounded();
    let machine = AuthMachine::new(codec_for(WireVariant::Legacy), handshake, cmd_rx, ev_tx);
    let io = NetworkThread::spawn(machine, transport()).unwrap();
    (io, cmd_tx, ev_rx)
}

#[test]
fn login_round_trip_over_loopback() {
    let codec: &dyn WireCodec = codec_for(WireVariant::Legacy);
    let table = codec.opcodes();
    let (server, addr) = server();
    let (mut io, commands, events) = spawn_auth(&HandshakeConfig::default());

    commands
        .send(AuthCommand::Connect(Credentials::new("player", "hunter2")))
        .unwrap();
    io.send(IoCommand::Connect(addr)).unwrap();

    let (login, client) = await_opcode(&server, table.opcode(MessageKind::Login).unwrap());
    let client_arq = login.ack_request.unwrap();

    let reply = codec
        .encode_server_message(&Inbound::LoginReply(LoginReply {
            accepted: true,
            failure_code: 0,
            account_id: 77,
            session_key: "KEY0123456".into(),
        }))
        .unwrap();
    let datagram = codec::encode(
        reply.opcode,
        &reply.payload,
        0,
        AckPair {
            response: Some(client_arq),
            request: Some(0),
        },
        true,
    );
    server.send_to(&datagram, client).unwrap();

    await_event(&events, |e| {
        matches!(e, AuthEvent::LoginAccepted { account_id: 77 })
    });
    let (next, _) = await_opcode(
        &server,
        table.opcode(MessageKind::ServerNameRequest).unwrap(),
    );
    assert_eq!(next.ack_response, Some(0));

    io.shutdown(WAIT).unwrap();
    assert!(!io.is_running());

    // The orderly shutdown leaves a closing packet behind.
    let mut buf = [0u8; 64];
    let deadline = Instant::now() + WAIT;
    let mut closed = false;
    while Instant::now() < deadline && !closed {
        if let Ok((len, _)) = server.recv_from(&mut buf) {
            closed = decode_frame(&buf[..len]).is_ok_and(|p| p.is_closing());
        }
    }
    assert!(closed);
}

#[test]
fn silent_server_exhausts_reconnects() {
    let handshake = HandshakeConfig {
        timeout: Duration::from_millis(200),
        max_reconnect_attempts: 2,
    };
    let login_opcode = codec_for(WireVariant::Legacy)
        .opcodes()
        .opcode(MessageKind::Login)
        .unwrap();
    let (server, addr) = server();
    let (mut io, commands, events) = spawn_auth(&handshake);

    commands
        .send(AuthCommand::Connect(Credentials::new("player", "hunter2")))
        .unwrap();
    io.send(IoCommand::Connect(addr)).unwrap();
    let (_, first) = await_opcode(&server, login_opcode);

    await_event(&events, |e| {
        matches!(e, AuthEvent::ReconnectRequired { attempt: 1 })
    });
    io.send(IoCommand::Reconnect).unwrap();

    // The login is repeated from a fresh socket with a fresh sequence.
    let (again, second) = await_opcode(&server, login_opcode);
    assert_eq!(first.ip(), second.ip());
    assert_eq!(again.ack_request, Some(1));

    let failed = await_event(&events, |e| matches!(e, AuthEvent::Failed(_)));
    assert_eq!(failed, AuthEvent::Failed(ERR_RECONNECT_BUDGET.to_string()));
    await_event(&events, |e| {
        matches!(e, AuthEvent::StateChanged(AuthState::Failed))
    });

    io.shutdown(WAIT).unwrap();
}

#[test]
fn shutdown_without_connection() {
    let (mut io, _commands, _events) = spawn_auth(&HandshakeConfig::default());
    assert!(io.is_running());
    io.shutdown(WAIT).unwrap();
    assert!(!io.is_running());
    assert!(io.send(IoCommand::Disconnect).is_err());
}

#[test]
fn connect_by_host_opens_socket() {
    let table = codec_for(WireVariant::Legacy).opcodes();
    let (server, addr) = server();
    let (mut io, commands, _events) = spawn_auth(&HandshakeConfig::default());

    commands
        .send(AuthCommand::Connect(Credentials::new("player", "hunter2")))
        .unwrap();
    io.send(IoCommand::ConnectHost {
        host: addr.ip().to_string(),
        port: addr.port(),
    })
    .unwrap();

    await_opcode(&server, table.opcode(MessageKind::Login).unwrap());
    io.shutdown(WAIT).unwrap();
}

#[test]
fn unresolvable_host_surfaces_as_error_event() {
    let (mut io, _commands, events) = spawn_auth(&HandshakeConfig::default());

    let started = Instant::now();
    io.send(IoCommand::ConnectHost {
        host: "host.invalid".into(),
        port: 7000,
    })
    .unwrap();
    // Queuing the command never waits on the lookup.
    assert!(started.elapsed() < Duration::from_millis(100));

    // The resolver may take its own timeout to give up.
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        let left = deadline
            .checked_duration_since(Instant::now())
            .expect("no error event for the failed lookup");
        if let AuthEvent::Error(_) = events.recv_timeout(left).unwrap() {
            break;
        }
    }
    io.shutdown(Duration::from_secs(30)).unwrap();
}
