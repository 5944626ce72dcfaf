use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;

use crate::{
    connection::{Connection, ConnectionId, Connector, Inbound, Permissions, Settings},
    Config,
};

/// How many connections a channel count needs.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sizing {
    pub merged: bool,
    pub authenticated: bool,
    pub read_divisor: usize,
    pub write_multiplier: f64,
    pub rate_limit: bool,
    pub rate_limit_interval: Duration,
}

impl Sizing {
    pub fn new(config: &Config) -> Self {
        Self {
            merged: config.merge_connections,
            authenticated: config.is_authenticated(),
            read_divisor: config.read_divisor(),
            write_multiplier: config.write_multiplier(),
            rate_limit: config.rate_limit,
            rate_limit_interval: config.rate_limit_interval,
        }
    }

    pub fn read(&self, channels: usize) -> usize {
        channels.div_ceil(self.read_divisor.max(1))
    }

    /// Write-only connections. Merged pools write on their read connections.
    pub fn write(&self, channels: usize) -> usize {
        if self.merged || !self.authenticated {
            return 0;
        }
        (channels.max(1) as f64 * self.write_multiplier).ceil() as usize
    }

    pub fn read_permissions(&self) -> Permissions {
        if self.merged && self.authenticated {
            Permissions::READ_WRITE
        } else {
            Permissions::READ
        }
    }

    /// When the `index`th connection of a batch may authenticate.
    pub fn ramp(&self, index: usize) -> Duration {
        if !(self.authenticated && self.rate_limit) {
            return Duration::ZERO;
        }
        let batch = (index / Config::AUTHENTICATION_BATCH) as u32;
        self.rate_limit_interval * batch
    }
}

/// Spreads `channels` over read connections, continuing from `cursor`.
///
/// `loads` is the live plus reserved channel count of each read connection, in
/// order. Each chosen connection is filled up to `divisor` before moving on,
/// and gets a single batch. Channels that don't fit anywhere are left out.
pub fn plan_join(
    loads: &mut [(ConnectionId, usize)],
    cursor: &mut usize,
    divisor: usize,
    channels: &[String],
) -> Vec<(ConnectionId, Vec<String>)> {
    let mut plan = Vec::new();
    let mut channels = channels.iter();
    let mut remaining = channels.len();

    while remaining > 0 {
        let Some(index) = (0..loads.len())
            .map(|i| cursor.wrapping_add(1 + i) % loads.len())
            .find(|&i| loads[i].1 < divisor)
        else {
            break;
        };
        *cursor = index;

        let (id, load) = &mut loads[index];
        let take = (divisor - *load).min(remaining);
        let batch: Vec<_> = channels.by_ref().take(take).cloned().collect();
        *load += take;
        remaining -= take;
        plan.push((*id, batch));
    }

    plan
}

/// `JOIN #a,#b` for one connection's batch.
pub fn membership_line(verb: &str, channels: &[String]) -> String {
    let mut line = String::with_capacity(verb.len() + 2 + channels.len() * 27);
    line.push_str(verb);
    line.push(' ');
    for (i, channel) in channels.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        line.push('#');
        line.push_str(channel);
    }
    line.push('\n');
    line
}

/// Every connection the client holds, and which of them read or write.
pub(crate) struct Pool {
    pub sizing: Sizing,
    settings: Arc<Settings>,
    connector: Arc<dyn Connector>,
    events: mpsc::UnboundedSender<Inbound>,
    connections: Vec<Connection>,
    next_id: ConnectionId,
    read: Vec<ConnectionId>,
    write: Vec<ConnectionId>,
    join_cursor: usize,
    write_cursor: usize,
    ping_read: usize,
    ping_write: usize,
}

impl Pool {
    pub fn new(
        sizing: Sizing,
        settings: Arc<Settings>,
        connector: Arc<dyn Connector>,
        events: mpsc::UnboundedSender<Inbound>,
    ) -> Self {
        Self {
            sizing,
            settings,
            connector,
            events,
            connections: Vec::new(),
            next_id: 0,
            read: Vec::new(),
            write: Vec::new(),
            join_cursor: usize::MAX,
            write_cursor: usize::MAX,
            ping_read: usize::MAX,
            ping_write: usize::MAX,
        }
    }

    /// Opens a fresh set of connections for `channels` channels, ramping them
    /// in under the authentication rate limit.
    pub fn open(&mut self, channels: usize) {
        let reads = self.sizing.read(channels);
        let writes = self.sizing.write(channels);
        log::info!(target: "tmi::pool", "opening {reads} read and {writes} write connections for {channels} channels");

        let mut index = 0;
        for _ in 0..reads {
            let delay = self.sizing.ramp(index);
            self.spawn(self.sizing.read_permissions(), delay);
            index += 1;
        }
        for _ in 0..writes {
            let delay = self.sizing.ramp(index);
            self.spawn(Permissions::WRITE, delay);
            index += 1;
        }
    }

    /// Grows the pool so `channels` channels fit. Never shrinks it.
    pub fn grow(&mut self, channels: usize) -> usize {
        let mut added = 0;
        while self.read.len() < self.sizing.read(channels) {
            self.spawn(self.sizing.read_permissions(), Duration::ZERO);
            added += 1;
        }
        while !self.sizing.merged && self.write_only_count() < self.sizing.write(channels) {
            self.spawn(Permissions::WRITE, Duration::ZERO);
            added += 1;
        }
        if added > 0 {
            log::debug!(target: "tmi::pool", "grew the pool by {added} connections");
        }
        added
    }

    /// Sets the write connection count of a write-only pool.
    pub fn resize(&mut self, size: usize) {
        while self.write.len() < size {
            self.spawn(Permissions::WRITE, Duration::ZERO);
        }
        while self.write.len() > size {
            if let Some(id) = self.write.pop() {
                self.connections.retain(|c| c.id != id);
            }
        }
    }

    pub fn close(&mut self) {
        log::debug!(target: "tmi::pool", "closing {} connections", self.connections.len());
        self.connections.clear();
        self.read.clear();
        self.write.clear();
    }

    /// Forgets a connection that went away on its own.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Permissions> {
        let pos = self.connections.iter().position(|c| c.id == id)?;
        let conn = self.connections.remove(pos);
        self.read.retain(|&c| c != id);
        self.write.retain(|&c| c != id);
        Some(conn.permissions)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| c.id == id)
    }

    pub fn send(&self, id: ConnectionId, line: impl Into<String>) {
        if let Some(conn) = self.get(id) {
            conn.send(line)
        }
    }

    pub fn read_ids(&self) -> &[ConnectionId] {
        &self.read
    }

    pub fn is_write_only(&self) -> bool {
        self.read.is_empty() && !self.write.is_empty()
    }

    pub fn is_ready(&self) -> bool {
        self.connections.iter().all(|c| c.ready)
    }

    pub fn join_cursor(&mut self) -> &mut usize {
        &mut self.join_cursor
    }

    /// Round robin over write connections.
    pub fn next_writer(&mut self) -> Option<ConnectionId> {
        next(&self.write, &mut self.write_cursor)
    }

    /// Picks a connection to ping: writers for merged or write-only pools,
    /// readers for read-only pools, otherwise weighted by how many of each there are.
    pub fn next_pinger(&mut self) -> Option<ConnectionId> {
        let (reads, writes) = (self.read.len(), self.write.len());
        let use_write = if self.sizing.merged || reads == 0 {
            true
        } else if writes == 0 {
            false
        } else {
            fastrand::f64() > reads as f64 / (reads + writes) as f64
        };

        if use_write {
            next(&self.write, &mut self.ping_write)
        } else {
            next(&self.read, &mut self.ping_read)
        }
    }

    fn write_only_count(&self) -> usize {
        self.write.len()
    }

    fn spawn(&mut self, permissions: Permissions, delay: Duration) -> ConnectionId {
        let id = self.next_id;
        self.next_id += 1;

        log::trace!(target: "tmi::pool", "spawning connection {id} ({permissions:?}) after {delay:?}");
        let conn = Connection::spawn(
            id,
            permissions,
            delay,
            Arc::clone(&self.settings),
            Arc::clone(&self.connector),
            self.events.clone(),
        );
        self.connections.push(conn);

        if permissions.read {
            self.read.push(id);
        }
        if permissions.write {
            self.write.push(id);
        }
        id
    }
}

fn next(ids: &[ConnectionId], cursor: &mut usize) -> Option<ConnectionId> {
    if ids.is_empty() {
        return None;
    }
    *cursor = cursor.wrapping_add(1) % ids.len();
    Some(ids[*cursor])
}
