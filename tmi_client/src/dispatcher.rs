use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    time::Instant,
};

use tmi_parser::{Command, Message};

use crate::{
    connection::{ConnectionId, Inbound},
    notices::{Moderation, Outcome},
    pool::{membership_line, plan_join, Pool},
    rooms::RoomTracker,
    Config, Error, Event,
};

pub(crate) type Reply<T> = oneshot::Sender<Result<T, Error>>;

/// Whispers can't be confirmed, so they pass unless a failure shows up this quickly.
const WHISPER_GRACE: Duration = Duration::from_millis(100);

const AUTHENTICATION_FAILURES: [&str; 2] = ["Login authentication failed", "Improperly formatted auth"];

pub(crate) enum Request {
    Join {
        channels: Vec<String>,
        reply: Reply<()>,
    },
    Part {
        channels: Vec<String>,
        reply: Reply<()>,
    },
    Resize {
        size: usize,
        reply: Reply<()>,
    },
    Send {
        line: Outgoing,
        reply: Reply<()>,
    },
    Moderate {
        channel: Option<String>,
        command: Moderation,
        args: String,
        reply: Reply<Option<Vec<String>>>,
    },
    Ping {
        reply: Reply<Duration>,
    },
    Rooms {
        reply: oneshot::Sender<Vec<String>>,
    },
    Close,
}

pub(crate) enum Outgoing {
    Privmsg {
        channel: String,
        text: String,
        timestamp: bool,
        parent: Option<String>,
    },
    Raw(String),
}

impl Outgoing {
    fn render(self) -> String {
        match self {
            Self::Privmsg {
                channel,
                text,
                timestamp,
                parent,
            } => privmsg_line(&channel, &text, timestamp.then(unix_millis), parent.as_deref()),
            Self::Raw(line) => line,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Status {
    Running,
    Closed,
    Authentication(String),
}

/// `[@tags ]PRIVMSG #channel :text`
pub fn privmsg_line(channel: &str, text: &str, sent_ts: Option<u128>, parent: Option<&str>) -> String {
    let mut tags = Vec::new();
    if let Some(ts) = sent_ts {
        tags.push(format!("sent-ts={ts}"));
    }
    if let Some(parent) = parent {
        tags.push(format!("reply-parent-msg-id={parent}"));
    }

    if tags.is_empty() {
        format!("PRIVMSG #{channel} :{text}\n")
    } else {
        format!("@{} PRIVMSG #{channel} :{text}\n", tags.join(";"))
    }
}

fn unix_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Channel names as the server echoes them: no `#`, lowercase.
pub(crate) fn normalize(channel: &str) -> String {
    channel.trim().trim_start_matches('#').to_ascii_lowercase()
}

struct Pending {
    deadline: Instant,
    kind: Kind,
}

enum Kind {
    Membership {
        verb: &'static str,
        channels: HashSet<String>,
        reply: Option<Reply<()>>,
    },
    Command {
        command: Moderation,
        channel: String,
        /// Set when the sending connection reads the channel, so an
        /// announcement can be seen directly. Unconfirmable announcements
        /// resolve at their deadline.
        confirmable: bool,
        reply: Reply<Option<Vec<String>>>,
    },
    Settled {
        result: Result<Option<Vec<String>>, Error>,
        reply: Reply<Option<Vec<String>>>,
    },
    Ping {
        token: u64,
        sent: Instant,
        connection: ConnectionId,
        reply: Option<Reply<Duration>>,
    },
}

impl Kind {
    fn is_abandoned(&self) -> bool {
        match self {
            Self::Membership { reply, .. } => reply.as_ref().map_or(false, |r| r.is_closed()),
            Self::Ping { reply, .. } => reply.as_ref().map_or(false, |r| r.is_closed()),
            Self::Command { reply, .. } | Self::Settled { reply, .. } => reply.is_closed(),
        }
    }

    /// Whether a `NOTICE` with `msg_id`, sent to `at`, settles this command.
    ///
    /// Whisper failures aren't tied to a channel, but `unrecognized_cmd` is
    /// only trusted from the channel the command went to.
    fn answered_by(&self, at: Option<&str>, msg_id: &str) -> bool {
        let Self::Command { command, channel, .. } = self else {
            return false;
        };
        match command.classify(msg_id) {
            None => false,
            Some(Outcome::Unrecognized) => at == Some(channel.as_str()),
            Some(_) if *command == Moderation::Whisper => true,
            Some(_) => at == Some(channel.as_str()),
        }
    }

    fn expire(self) {
        match self {
            Self::Membership {
                verb,
                channels,
                reply,
            } => {
                let mut pending: Vec<_> = channels.into_iter().collect();
                pending.sort_unstable();
                log::warn!(target: "tmi::dispatcher", "{verb} timed out for: {}", pending.join(", "));
                if let Some(reply) = reply {
                    let _ = reply.send(Err(Error::Timeout {
                        what: verb.to_string(),
                        pending,
                    }));
                }
            }

            Self::Command {
                command,
                confirmable,
                reply,
                ..
            } => {
                let result = match command {
                    Moderation::Whisper => Ok(None),
                    Moderation::Announce if !confirmable => Ok(None),
                    _ => Err(Error::timeout(command)),
                };
                let _ = reply.send(result);
            }

            Self::Settled { result, reply } => {
                let _ = reply.send(result);
            }

            Self::Ping {
                connection, reply, ..
            } => match reply {
                Some(reply) => {
                    let _ = reply.send(Err(Error::timeout("PONG")));
                }
                None => log::warn!(target: "tmi::dispatcher", "[{connection}] missed a keepalive PONG"),
            },
        }
    }
}

/// Owns every connection and all protocol state.
///
/// Connections report in over `inbound`, handles talk to it over `requests`.
/// Nothing else touches the pool, the room tracker or the pending requests.
pub(crate) struct Dispatcher {
    config: Config,
    nick: String,
    authenticated: bool,

    pool: Pool,
    rooms: RoomTracker,
    unjoinable: HashSet<String>,
    reserved: HashMap<String, ConnectionId>,
    pending: Vec<Pending>,

    epoch: std::time::Instant,
    last_token: u64,
    reconnect_at: Option<Instant>,

    inbound: mpsc::UnboundedReceiver<Inbound>,
    requests: mpsc::UnboundedReceiver<Request>,
    events: broadcast::Sender<Arc<Event>>,
    ready: watch::Sender<bool>,
    status: watch::Sender<Status>,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        nick: String,
        pool: Pool,
        inbound: mpsc::UnboundedReceiver<Inbound>,
        requests: mpsc::UnboundedReceiver<Request>,
        events: broadcast::Sender<Arc<Event>>,
        ready: watch::Sender<bool>,
        status: watch::Sender<Status>,
    ) -> Self {
        Self {
            authenticated: config.is_authenticated(),
            config,
            nick,
            pool,
            rooms: RoomTracker::default(),
            unjoinable: HashSet::new(),
            reserved: HashMap::new(),
            pending: Vec::new(),
            epoch: std::time::Instant::now(),
            last_token: 0,
            reconnect_at: None,
            inbound,
            requests,
            events,
            ready,
            status,
        }
    }

    pub async fn run(mut self) {
        let channels = std::mem::take(&mut self.config.channels);
        self.pool.open(channels.iter().map(|c| normalize(c)).collect::<HashSet<_>>().len());
        self.update_ready();
        if !channels.is_empty() {
            self.join(channels, None);
        }

        let status = match self.main_loop().await {
            Ok(()) => Status::Closed,
            Err(Error::Authentication(msg)) => Status::Authentication(msg),
            Err(err) => {
                log::error!(target: "tmi::dispatcher", "stopped: {err}");
                Status::Closed
            }
        };

        self.pool.close();
        log::info!(target: "tmi::dispatcher", "dispatcher exited: {status:?}");
        self.status.send_replace(status);
    }

    async fn main_loop(&mut self) -> Result<(), Error> {
        loop {
            self.prune();
            let deadline = self.next_deadline();

            tokio::select! {
                Some(inbound) = self.inbound.recv() => self.on_inbound(inbound)?,

                request = self.requests.recv() => match request {
                    Some(Request::Close) | None => return Ok(()),
                    Some(request) => self.on_request(request),
                },

                _ = wait_until(deadline) => self.on_deadline(Instant::now()),
            }
        }
    }

    fn on_inbound(&mut self, inbound: Inbound) -> Result<(), Error> {
        match inbound {
            Inbound::Ready(id) => {
                log::debug!(target: "tmi::dispatcher", "[{id}] ready");
                if let Some(conn) = self.pool.get_mut(id) {
                    conn.ready = true;
                }
                self.update_ready();
            }

            Inbound::Keepalive(id) => {
                let token = self.next_token();
                self.pool.send(id, format!("PING {token}"));
                self.pending.push(Pending {
                    deadline: Instant::now() + self.config.promise_timeout,
                    kind: Kind::Ping {
                        token,
                        sent: Instant::now(),
                        connection: id,
                        reply: None,
                    },
                });
            }

            Inbound::Closed(id, err) => {
                if self.pool.remove(id).is_none() {
                    return Ok(());
                }
                let lost = self.rooms.remove_connection(id);
                self.reserved.retain(|_, owner| *owner != id);
                match err {
                    Some(err) => log::warn!(target: "tmi::dispatcher", "[{id}] connection lost ({err}), dropping {} channels", lost.len()),
                    None => log::warn!(target: "tmi::dispatcher", "[{id}] connection closed, dropping {} channels", lost.len()),
                }
                self.update_ready();
            }

            Inbound::Message(id, msg) => {
                if self.pool.get(id).is_none() {
                    log::trace!(target: "tmi::dispatcher", "[{id}] ignoring {} from a closed connection", msg.command);
                    return Ok(());
                }
                self.on_message(id, &msg)?;
                let _ = self.events.send(Arc::new(Event {
                    connection: id,
                    message: msg,
                }));
            }
        }
        Ok(())
    }

    fn on_message(&mut self, id: ConnectionId, msg: &Message<'static>) -> Result<(), Error> {
        match msg.command {
            Command::Welcome => {
                if let (true, Some(login)) = (self.authenticated, msg.login()) {
                    self.nick = login.to_string();
                }
                log::info!(target: "tmi::dispatcher", "[{id}] registered as {}", self.nick);
            }

            Command::GlobalUserState => {
                log::debug!(target: "tmi::dispatcher", "[{id}] identity: {:?}", msg.tags.get_str("display-name"));
            }

            Command::Join => {
                let (Some(channel), true) = (msg.channel(), msg.login() == Some(&*self.nick)) else {
                    return Ok(());
                };
                let Some(permissions) = self.pool.get(id).map(|c| c.permissions) else {
                    return Ok(());
                };
                self.rooms.join(channel, id, permissions);
                self.reserved.remove(channel);
                log::debug!(
                    target: "tmi::dispatcher",
                    "[{id}] joined #{channel} ({} readable, {} writable)",
                    self.rooms.readable(),
                    self.rooms.writable()
                );
                self.confirm("JOIN", channel);
            }

            Command::Part => {
                let (Some(channel), true) = (msg.channel(), msg.login() == Some(&*self.nick)) else {
                    return Ok(());
                };
                self.rooms.part(channel);
                log::debug!(
                    target: "tmi::dispatcher",
                    "[{id}] left #{channel} ({} readable, {} writable)",
                    self.rooms.readable(),
                    self.rooms.writable()
                );
                self.confirm("PART", channel);
            }

            Command::Notice => self.on_notice(msg)?,

            Command::UserNotice => {
                if msg.msg_id() == Some("announcement") && msg.tags.get_str("login") == Some(&*self.nick) {
                    if let Some(channel) = msg.channel() {
                        self.confirm_command(Moderation::Announce, channel);
                    }
                }
            }

            Command::ClearChat => {
                if let (Some(channel), None) = (msg.channel(), msg.login()) {
                    self.confirm_command(Moderation::Clear, channel);
                }
            }

            Command::Pong => {
                let Some(token) = msg.message().and_then(|s| s.trim().parse::<u64>().ok()) else {
                    return Ok(());
                };
                let Some(pos) = self
                    .pending
                    .iter()
                    .position(|p| matches!(p.kind, Kind::Ping { token: t, .. } if t == token))
                else {
                    return Ok(());
                };
                if let Kind::Ping { sent, reply, .. } = self.pending.remove(pos).kind {
                    let elapsed = sent.elapsed();
                    log::trace!(target: "tmi::dispatcher", "[{id}] PONG after {elapsed:?}");
                    if let Some(reply) = reply {
                        let _ = reply.send(Ok(elapsed));
                    }
                }
            }

            Command::Reconnect => {
                if self.reconnect_at.is_none() {
                    let delay = self.config.rate_limit_interval;
                    log::warn!(target: "tmi::dispatcher", "[{id}] RECONNECT received, reconnecting in {delay:?}");
                    self.reconnect_at = Some(Instant::now() + delay);
                }
            }

            _ => {}
        }
        Ok(())
    }

    fn on_notice(&mut self, msg: &Message<'static>) -> Result<(), Error> {
        let text = msg.message().unwrap_or_default();
        if self.authenticated && AUTHENTICATION_FAILURES.contains(&text) {
            log::error!(target: "tmi::dispatcher", "{text}");
            return Err(Error::Authentication(text.to_string()));
        }

        let Some(msg_id) = msg.msg_id() else {
            return Ok(());
        };

        if let ("msg_banned" | "msg_channel_suspended", Some(channel)) = (msg_id, msg.channel()) {
            log::warn!(target: "tmi::dispatcher", "#{channel} can't be joined: {text}");
            self.unjoinable.insert(channel.to_string());
            self.reserved.remove(channel);
        }

        let found = self
            .pending
            .iter()
            .position(|p| p.kind.answered_by(msg.channel(), msg_id));
        let Some(pos) = found else {
            return Ok(());
        };

        let pending = self.pending.remove(pos);
        let Kind::Command { command, reply, .. } = pending.kind else {
            return Ok(());
        };
        let Some(outcome) = command.classify(msg_id) else {
            return Ok(());
        };

        log::debug!(target: "tmi::dispatcher", "{command} settled by {msg_id} ({outcome:?})");
        let users = msg
            .users
            .as_ref()
            .map(|users| users.iter().map(ToString::to_string).collect());
        let result = outcome.settle(text, users);

        let delay = command.delay();
        if outcome == Outcome::Pass && !delay.is_zero() {
            self.pending.push(Pending {
                deadline: Instant::now() + delay,
                kind: Kind::Settled { result, reply },
            });
        } else {
            let _ = reply.send(result);
        }
        Ok(())
    }

    /// Resolves the oldest pending `target` for channel `at`.
    fn confirm_command(&mut self, target: Moderation, at: &str) {
        let found = self.pending.iter().position(|p| {
            matches!(&p.kind, Kind::Command { command, channel, .. } if *command == target && channel == at)
        });
        if let Some(Kind::Command { reply, .. }) = found.map(|pos| self.pending.remove(pos).kind) {
            log::debug!(target: "tmi::dispatcher", "{target} confirmed in #{at}");
            let _ = reply.send(Ok(None));
        }
    }

    /// Marks `channel` done for every membership request waiting on it.
    fn confirm(&mut self, what: &'static str, channel: &str) {
        let mut done = Vec::new();
        for (i, pending) in self.pending.iter_mut().enumerate() {
            if let Kind::Membership { verb, channels, .. } = &mut pending.kind {
                if *verb == what && channels.remove(channel) && channels.is_empty() {
                    done.push(i);
                }
            }
        }

        for i in done.into_iter().rev() {
            if let Kind::Membership { reply: Some(reply), .. } = self.pending.remove(i).kind {
                let _ = reply.send(Ok(()));
            }
        }
    }

    fn on_request(&mut self, request: Request) {
        match request {
            Request::Join { channels, reply } => {
                if self.pool.is_write_only() {
                    let _ = reply.send(Err(Error::InvalidArgument(
                        "channels can't be joined in write-only mode".into(),
                    )));
                    return;
                }
                self.join(channels, Some(reply));
            }

            Request::Part { channels, reply } => {
                if self.pool.is_write_only() {
                    let _ = reply.send(Err(Error::InvalidArgument(
                        "channels can't be parted in write-only mode".into(),
                    )));
                    return;
                }
                self.part(channels, reply);
            }

            Request::Resize { size, reply } => {
                if !self.pool.read_ids().is_empty() {
                    let _ = reply.send(Err(Error::InvalidArgument(
                        "only write-only pools can be resized".into(),
                    )));
                    return;
                }
                log::info!(target: "tmi::dispatcher", "resizing to {size} write connections");
                self.pool.resize(size);
                self.update_ready();
                let _ = reply.send(Ok(()));
            }

            Request::Send { line, reply } => {
                let result = self.writer().map(|id| self.pool.send(id, line.render()));
                let _ = reply.send(result);
            }

            Request::Moderate {
                channel,
                command,
                args,
                reply,
            } => {
                let id = match self.writer() {
                    Ok(id) => id,
                    Err(err) => {
                        let _ = reply.send(Err(err));
                        return;
                    }
                };

                let channel = channel.as_deref().map_or_else(|| self.nick.clone(), normalize);
                let line = privmsg_line(&channel, &command.line(&args), None, None);
                for _ in 0..command.repeat() {
                    self.pool.send(id, line.clone());
                }

                let confirmable = command == Moderation::Announce && self.rooms.owner(&channel) == Some(id);

                let timeout = match command {
                    Moderation::Whisper => WHISPER_GRACE,
                    _ => self.config.promise_timeout + command.delay(),
                };

                self.pending.push(Pending {
                    deadline: Instant::now() + timeout,
                    kind: Kind::Command {
                        command,
                        channel,
                        confirmable,
                        reply,
                    },
                });
            }

            Request::Ping { reply } => {
                let Some(id) = self.pool.next_pinger() else {
                    let _ = reply.send(Err(Error::InvalidArgument("there are no connections to ping".into())));
                    return;
                };
                let token = self.next_token();
                self.pool.send(id, format!("PING {token}"));
                self.pending.push(Pending {
                    deadline: Instant::now() + self.config.promise_timeout,
                    kind: Kind::Ping {
                        token,
                        sent: Instant::now(),
                        connection: id,
                        reply: Some(reply),
                    },
                });
            }

            Request::Rooms { reply } => {
                let _ = reply.send(self.rooms.channels());
            }

            Request::Close => {}
        }
    }

    fn join(&mut self, channels: Vec<String>, reply: Option<Reply<()>>) {
        let mut waiting = HashSet::new();
        let mut fresh = Vec::new();

        for channel in channels.iter().map(|c| normalize(c)) {
            if channel.is_empty() || self.unjoinable.contains(&channel) || self.rooms.contains(&channel) {
                continue;
            }
            if waiting.insert(channel.clone()) && !self.reserved.contains_key(&channel) {
                fresh.push(channel);
            }
        }

        if !fresh.is_empty() {
            self.pool.grow(self.rooms.len() + self.reserved.len() + fresh.len());
            self.update_ready();

            let mut loads: Vec<_> = self
                .pool
                .read_ids()
                .iter()
                .map(|&id| {
                    let reserved = self.reserved.values().filter(|&&owner| owner == id).count();
                    (id, self.rooms.count_on(id) + reserved)
                })
                .collect();

            let divisor = self.pool.sizing.read_divisor;
            let plan = plan_join(&mut loads, self.pool.join_cursor(), divisor, &fresh);

            let mut assigned = 0;
            for (id, batch) in plan {
                assigned += batch.len();
                for channel in &batch {
                    self.reserved.insert(channel.clone(), id);
                }
                log::debug!(target: "tmi::dispatcher", "[{id}] joining {} channels", batch.len());
                self.pool.send(id, membership_line("JOIN", &batch));
            }
            if assigned < fresh.len() {
                log::warn!(target: "tmi::dispatcher", "no room for {} channels", fresh.len() - assigned);
            }
        }

        self.wait_for("JOIN", waiting, reply);
    }

    fn part(&mut self, channels: Vec<String>, reply: Reply<()>) {
        let mut waiting = HashSet::new();
        for channel in channels.iter().map(|c| normalize(c)) {
            if self.unjoinable.contains(&channel) {
                continue;
            }
            let Some(id) = self.rooms.owner(&channel) else {
                continue;
            };
            if waiting.insert(channel.clone()) {
                self.pool.send(id, membership_line("PART", std::slice::from_ref(&channel)));
            }
        }

        self.wait_for("PART", waiting, Some(reply));
    }

    fn wait_for(&mut self, verb: &'static str, channels: HashSet<String>, reply: Option<Reply<()>>) {
        if channels.is_empty() {
            if let Some(reply) = reply {
                let _ = reply.send(Ok(()));
            }
            return;
        }

        self.pending.push(Pending {
            deadline: Instant::now() + self.config.membership_timeout,
            kind: Kind::Membership {
                verb,
                channels,
                reply,
            },
        });
    }

    fn on_deadline(&mut self, now: Instant) {
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].deadline > now {
                i += 1;
                continue;
            }
            let pending = self.pending.remove(i);
            if let Kind::Membership {
                verb: "JOIN",
                channels,
                ..
            } = &pending.kind
            {
                self.reserved.retain(|channel, _| !channels.contains(channel));
            }
            pending.kind.expire();
        }

        if self.reconnect_at.map_or(false, |at| at <= now) {
            self.reconnect();
        }
    }

    fn reconnect(&mut self) {
        self.reconnect_at = None;

        let mut channels = self.rooms.channels();
        channels.extend(self.reserved.keys().cloned());
        log::warn!(target: "tmi::dispatcher", "reconnecting with {} channels", channels.len());

        self.pool.close();
        self.rooms.clear();
        self.reserved.clear();

        self.pool.open(channels.len());
        self.update_ready();
        if !channels.is_empty() {
            self.join(channels, None);
        }
    }

    fn writer(&mut self) -> Result<ConnectionId, Error> {
        self.pool
            .next_writer()
            .ok_or_else(|| Error::InvalidArgument("there are no write connections".into()))
    }

    /// Strictly increasing, so concurrent pings on different connections never collide.
    fn next_token(&mut self) -> u64 {
        let now = self.epoch.elapsed().as_nanos() as u64;
        self.last_token = now.max(self.last_token + 1);
        self.last_token
    }

    fn prune(&mut self) {
        self.pending.retain(|p| !p.kind.is_abandoned());
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .iter()
            .map(|p| p.deadline)
            .chain(self.reconnect_at)
            .min()
    }

    fn update_ready(&mut self) {
        let ready = self.pool.is_ready();
        self.ready.send_if_modified(|old| std::mem::replace(old, ready) != ready);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
