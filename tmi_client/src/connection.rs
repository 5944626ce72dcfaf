use std::{sync::Arc, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    sync::mpsc,
    task::JoinHandle,
};

use tmi_parser::{Command, Message, Mode, Reassembler};

use crate::Error;

pub type ConnectionId = usize;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Permissions {
    pub read: bool,
    pub write: bool,
}

impl Permissions {
    pub const READ: Self = Self {
        read: true,
        write: false,
    };
    pub const WRITE: Self = Self {
        read: false,
        write: true,
    };
    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
    };
}

pub trait Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}
impl<T> Stream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Opens the byte stream a connection talks over.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, address: &str) -> Result<Box<dyn Stream>, Error>;
}

/// TLS over TCP, verified against the webpki roots.
#[derive(Clone)]
pub struct TlsConnector {
    inner: tokio_rustls::TlsConnector,
}

impl TlsConnector {
    pub fn new() -> Result<Self, Error> {
        let roots = rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|err| Error::Tls(err.to_string()))?
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(Self {
            inner: tokio_rustls::TlsConnector::from(Arc::new(config)),
        })
    }
}

#[async_trait::async_trait]
impl Connector for TlsConnector {
    async fn connect(&self, address: &str) -> Result<Box<dyn Stream>, Error> {
        let host = address.rsplit_once(':').map_or(address, |(host, _)| host);
        let name = rustls::pki_types::ServerName::try_from(host.to_string())
            .map_err(|err| Error::Tls(format!("invalid server name '{host}': {err}")))?;

        let stream = TcpStream::connect(address).await?;
        stream.set_nodelay(true)?;

        let stream = self.inner.connect(name, stream).await?;
        Ok(Box::new(stream))
    }
}

/// What a connection reports back to the dispatcher.
#[derive(Debug)]
pub(crate) enum Inbound {
    Ready(ConnectionId),
    Message(ConnectionId, Message<'static>),
    Keepalive(ConnectionId),
    Closed(ConnectionId, Option<Error>),
}

pub(crate) struct Settings {
    pub address: String,
    pub registration: String,
    pub read_buffer_size: usize,
    pub keepalive_interval: Duration,
}

/// The dispatcher's handle to one socket.
///
/// Lines are queued until the socket is registered, so they can be sent right
/// away. Dropping the handle closes the socket.
pub(crate) struct Connection {
    pub id: ConnectionId,
    pub permissions: Permissions,
    pub ready: bool,
    out: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl Connection {
    pub fn spawn(
        id: ConnectionId,
        permissions: Permissions,
        delay: Duration,
        settings: Arc<Settings>,
        connector: Arc<dyn Connector>,
        events: mpsc::UnboundedSender<Inbound>,
    ) -> Self {
        let (out, lines) = mpsc::unbounded_channel();
        let task = Task {
            id,
            settings,
            connector,
            events,
            lines,
        };
        Self {
            id,
            permissions,
            ready: false,
            out,
            task: tokio::spawn(task.run(delay)),
        }
    }

    pub fn send(&self, line: impl Into<String>) {
        let mut line = line.into();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        if self.out.send(line).is_err() {
            log::warn!(target: "tmi::connection", "[{}] dropped a line, connection is gone", self.id);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.task.abort()
    }
}

struct Task {
    id: ConnectionId,
    settings: Arc<Settings>,
    connector: Arc<dyn Connector>,
    events: mpsc::UnboundedSender<Inbound>,
    lines: mpsc::UnboundedReceiver<String>,
}

impl Task {
    async fn run(mut self, delay: Duration) {
        if !delay.is_zero() {
            log::debug!(target: "tmi::connection", "[{}] waiting {delay:?} before connecting", self.id);
            tokio::time::sleep(delay).await;
        }

        let err = self.session().await.err();
        if let Some(err) = &err {
            log::warn!(target: "tmi::connection", "[{}] closed: {err}", self.id);
        } else {
            log::debug!(target: "tmi::connection", "[{}] closed", self.id);
        }
        let _ = self.events.send(Inbound::Closed(self.id, err));
    }

    async fn session(&mut self) -> Result<(), Error> {
        let id = self.id;

        log::debug!(target: "tmi::connection", "[{id}] connecting to {}", self.settings.address);
        let stream = self.connector.connect(&self.settings.address).await?;
        let (mut read, mut write) = tokio::io::split(stream);

        log::trace!(target: "tmi::connection", "[{id}] -> registration ({} bytes)", self.settings.registration.len());
        write.write_all(self.settings.registration.as_bytes()).await?;
        write.flush().await?;

        let mut reassembler = Reassembler::new(Mode::Copied);
        let mut buf = vec![0; self.settings.read_buffer_size.max(1)];
        let mut ready = false;

        let period = self.settings.keepalive_interval;
        let mut keepalive = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                n = read.read(&mut buf) => {
                    let n = n?;
                    if n == 0 {
                        return Ok(());
                    }
                    log::trace!(target: "tmi::connection", "[{id}] <- {}", String::from_utf8_lossy(&buf[..n]).escape_debug());

                    if !ready {
                        ready = true;
                        let _ = self.events.send(Inbound::Ready(id));
                    }

                    let mut pings = 0;
                    let events = &self.events;
                    reassembler.feed(&buf[..n], |msg| {
                        pings += (msg.command == Command::Ping) as usize;
                        let _ = events.send(Inbound::Message(id, msg.into_owned()));
                    })?;

                    for _ in 0..pings {
                        log::trace!(target: "tmi::connection", "[{id}] -> PONG");
                        write.write_all(b"PONG\n").await?;
                    }
                    if pings > 0 {
                        write.flush().await?;
                    }
                }

                line = self.lines.recv() => {
                    let Some(line) = line else { return Ok(()) };
                    log::trace!(target: "tmi::connection", "[{id}] -> {}", line.escape_debug());
                    write.write_all(line.as_bytes()).await?;
                    write.flush().await?;
                }

                _ = keepalive.tick() => {
                    let _ = self.events.send(Inbound::Keepalive(id));
                }
            }
        }
    }
}
