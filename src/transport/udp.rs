//! Network I/O thread for the legacy UDP transport.
//!
//! One dedicated OS thread per connection role hosts a current-thread tokio
//! runtime, one UDP socket, the reliability [`Link`] and the role's
//! [`ProtocolMachine`]. Each loop iteration drains I/O commands, attempts one
//! timed receive, ticks the machine, transmits its output and runs the link
//! timers. Nothing here blocks the consumer thread.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tokio::net::UdpSocket;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::TransportConfig;
use crate::error::constants::ERR_RUNTIME_START;
use crate::error::{ProtocolError, Result};
use crate::protocol::machine::ProtocolMachine;
use crate::transport::link::{Link, Received};
use crate::utils::metrics::global_metrics;

/// Commands accepted by the network thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoCommand {
    /// Open (or replace) the socket towards `addr`.
    Connect(SocketAddr),
    /// Resolve `host` on the network thread, then connect as [`IoCommand::Connect`].
    ConnectHost { host: String, port: u16 },
    /// Tear down the socket and open a fresh one to the same peer.
    Reconnect,
    /// Transmit bytes as-is, bypassing the link.
    SendRaw(Vec<u8>),
    /// Send the closing packet and drop the socket.
    Disconnect,
    /// Disconnect and end the thread.
    Shutdown,
}

/// Handle onto a running network thread.
#[derive(Debug)]
pub struct NetworkThread {
    commands: Sender<IoCommand>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl NetworkThread {
    /// Start the thread that drives `machine`.
    ///
    /// # Errors
    /// `ProtocolError::Io` if the OS refuses to spawn the thread.
    pub fn spawn<M>(machine: M, config: TransportConfig) -> Result<Self>
    where
        M: ProtocolMachine + 'static,
    {
        let (tx, rx) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));
        let name = format!("zoneline-{}", machine.role().as_str());

        let thread_stop = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name(name)
            .spawn(move || run(machine, config, rx, thread_stop))?;

        Ok(Self {
            commands: tx,
            stop,
            handle: Some(handle),
        })
    }

    /// Cloneable command sender.
    pub fn sender(&self) -> Sender<IoCommand> {
        self.commands.clone()
    }

    /// Queue a command; never blocks.
    ///
    /// # Errors
    /// `ProtocolError::ChannelClosed` if the thread has exited.
    pub fn send(&self, cmd: IoCommand) -> Result<()> {
        self.commands
            .send(cmd)
            .map_err(|_| ProtocolError::ChannelClosed)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the thread and wait at most `join_timeout` for it to exit.
    ///
    /// # Errors
    /// `ProtocolError::Timeout` if the thread is still running when the wait
    /// ends; it is detached and exits on its next loop iteration.
    #[instrument(skip(self))]
    pub fn shutdown(&mut self, join_timeout: Duration) -> Result<()> {
        let _ = self.commands.send(IoCommand::Shutdown);
        self.stop.store(true, Ordering::Release);

        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let deadline = Instant::now() + join_timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!("Network thread did not exit in time, detaching");
                return Err(ProtocolError::Timeout);
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        if handle.join().is_err() {
            error!("Network thread panicked");
        }
        debug!("Network thread joined");
        Ok(())
    }
}

impl Drop for NetworkThread {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.commands.send(IoCommand::Shutdown);
            self.stop.store(true, Ordering::Release);
        }
    }
}

fn run<M: ProtocolMachine>(
    machine: M,
    config: TransportConfig,
    commands: Receiver<IoCommand>,
    stop: Arc<AtomicBool>,
) {
    let mut io = NetworkLoop::new(machine, config);
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "{}", ERR_RUNTIME_START);
            io.machine
                .on_transport_error(&ProtocolError::Io(e), Instant::now());
            return;
        }
    };
    runtime.block_on(io.run(commands, stop));
}

/// State owned by the network thread.
struct NetworkLoop<M> {
    machine: M,
    link: Link,
    config: TransportConfig,
    socket: Option<UdpSocket>,
    remote: Option<SocketAddr>,
    buf: Vec<u8>,
}

impl<M: ProtocolMachine> NetworkLoop<M> {
    fn new(machine: M, config: TransportConfig) -> Self {
        Self {
            link: Link::new(&config),
            buf: vec![0u8; config.max_datagram_size],
            machine,
            config,
            socket: None,
            remote: None,
        }
    }

    async fn run(&mut self, commands: Receiver<IoCommand>, stop: Arc<AtomicBool>) {
        info!(role = self.machine.role().as_str(), "Network thread started");
        loop {
            if stop.load(Ordering::Acquire) {
                break;
            }

            let mut shutdown = false;
            while let Ok(cmd) = commands.try_recv() {
                if cmd == IoCommand::Shutdown {
                    shutdown = true;
                    break;
                }
                self.apply(cmd).await;
            }
            if shutdown {
                break;
            }

            self.receive_once().await;

            let now = Instant::now();
            self.machine.tick(now);
            self.flush(now).await;
        }
        self.disconnect().await;
        info!(role = self.machine.role().as_str(), "Network thread stopped");
    }

    async fn apply(&mut self, cmd: IoCommand) {
        trace!(?cmd, "I/O command");
        match cmd {
            IoCommand::Connect(addr) => {
                if self.socket.is_some() {
                    self.drop_socket();
                }
                self.open(addr).await;
            }
            IoCommand::ConnectHost { host, port } => match resolve(&host, port).await {
                Ok(addr) => {
                    debug!(%host, %addr, "Resolved peer");
                    if self.socket.is_some() {
                        self.drop_socket();
                    }
                    self.open(addr).await;
                }
                Err(e) => {
                    warn!(%host, port, error = %e, "Peer resolution failed");
                    self.machine.on_transport_error(&e, Instant::now());
                }
            },
            IoCommand::Reconnect => match self.remote {
                Some(addr) => {
                    info!(%addr, "Reconnecting with a fresh socket");
                    self.drop_socket();
                    self.open(addr).await;
                }
                None => debug!("Reconnect without a previous peer ignored"),
            },
            IoCommand::SendRaw(bytes) => self.transmit(&bytes).await,
            IoCommand::Disconnect => self.disconnect().await,
            IoCommand::Shutdown => {}
        }
    }

    async fn open(&mut self, addr: SocketAddr) {
        let now = Instant::now();
        match bind_connected(&self.config.bind_address, addr).await {
            Ok(socket) => {
                debug!(%addr, local = ?socket.local_addr().ok(), "Socket open");
                self.socket = Some(socket);
                self.remote = Some(addr);
                self.link.reset();
                self.machine.on_transport_open(now);
            }
            Err(e) => {
                self.remote = Some(addr);
                self.machine.on_transport_error(&e, now);
            }
        }
    }

    /// Drop the socket without a closing packet (reconnect path).
    fn drop_socket(&mut self) {
        self.socket = None;
        self.link.reset();
        self.machine.on_transport_closed(Instant::now());
    }

    async fn disconnect(&mut self) {
        if self.socket.is_none() {
            return;
        }
        let closing = self.link.close();
        self.transmit(&closing).await;
        self.socket = None;
        self.remote = None;
        self.link.reset();
        self.machine.on_transport_closed(Instant::now());
        debug!("Disconnected");
    }

    async fn receive_once(&mut self) {
        let Some(socket) = self.socket.as_ref() else {
            tokio::time::sleep(self.config.recv_timeout).await;
            return;
        };

        let received =
            tokio::time::timeout(self.config.recv_timeout, socket.recv(&mut self.buf)).await;
        let now = Instant::now();
        match received {
            Err(_elapsed) => {}
            Ok(Ok(len)) => {
                global_metrics().datagram_received(len as u64);
                self.on_datagram(len, now);
            }
            Ok(Err(e)) => {
                self.machine.on_transport_error(&ProtocolError::Io(e), now);
            }
        }
    }

    fn on_datagram(&mut self, len: usize, now: Instant) {
        match self.link.receive(&self.buf[..len]) {
            Ok(Received::Message(message)) => {
                if let Some(opcode) = message.opcode {
                    self.machine.handle_message(opcode, &message.payload, now);
                }
            }
            Ok(Received::Nothing) => {}
            Ok(Received::Closed) => {
                info!("Server closed the connection");
                self.socket = None;
                self.link.reset();
                self.machine.on_transport_closed(now);
            }
            Err(e) => {
                debug!(error = %e, len, "Undecodable datagram dropped");
                global_metrics().decode_failure();
            }
        }
    }

    async fn flush(&mut self, now: Instant) {
        if self.socket.is_none() {
            // Output produced without a socket is discarded.
            let dropped = self.machine.take_outgoing();
            if !dropped.is_empty() {
                trace!(count = dropped.len(), "Outgoing dropped while disconnected");
            }
            return;
        }

        for cmd in self.machine.take_outgoing() {
            for datagram in self.link.send_message(&cmd, now) {
                self.transmit(&datagram).await;
            }
        }

        match self.link.tick(now) {
            Ok(datagrams) => {
                for datagram in datagrams {
                    self.transmit(&datagram).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "Link failed");
                self.machine.on_transport_error(&e, now);
                self.socket = None;
                self.link.reset();
                self.machine.on_transport_closed(now);
            }
        }
    }

    async fn transmit(&mut self, datagram: &[u8]) {
        let Some(socket) = self.socket.as_ref() else {
            trace!("No socket, datagram dropped");
            return;
        };
        match socket.send(datagram).await {
            Ok(sent) => global_metrics().datagram_sent(sent as u64),
            Err(e) => {
                self.machine
                    .on_transport_error(&ProtocolError::Io(e), Instant::now());
            }
        }
    }
}

/// Resolve a peer without blocking the runtime; IP literals skip the lookup.
async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| {
            ProtocolError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("No address for {host}:{port}"),
            ))
        })
}

async fn bind_connected(bind_address: &str, remote: SocketAddr) -> Result<UdpSocket> {
    let socket = UdpSocket::bind(bind_address).await?;
    socket.connect(remote).await?;
    Ok(socket)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ip_literal_skips_lookup() {
        let addr = resolve("127.0.0.1", 7000).await.unwrap();
        assert_eq!(addr, "127.0.0.1:7000".parse().unwrap());
        let v6 = resolve("::1", 7000).await.unwrap();
        assert_eq!(v6, "[::1]:7000".parse().unwrap());
    }

    #[tokio::test]
    async fn unresolvable_host_is_an_io_error() {
        match resolve("host.invalid", 7000).await {
            Err(ProtocolError::Io(_)) => {}
            other => panic!("expected an I/O error, got {other:?}"),
        }
    }
}
