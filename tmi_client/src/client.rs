use std::{sync::Arc, time::Duration};

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt as _};

use tmi_parser::Message;

use crate::{
    connection::{ConnectionId, Connector, Settings, TlsConnector},
    dispatcher::{Dispatcher, Outgoing, Request, Status},
    notices::{Color, Moderation},
    pool::{Pool, Sizing},
    Config, Error,
};

/// A decoded line and the connection it arrived on.
#[derive(Debug)]
pub struct Event {
    pub connection: ConnectionId,
    pub message: Message<'static>,
}

/// A handle to a running client. Cheap to clone.
///
/// The connections close once every handle is dropped, or on [`Client::close`].
#[derive(Clone)]
pub struct Client {
    requests: mpsc::UnboundedSender<Request>,
    events: broadcast::Sender<Arc<Event>>,
    ready: watch::Receiver<bool>,
    status: watch::Receiver<Status>,
}

impl Client {
    /// Connects to Twitch over TLS. Must be called from within a tokio runtime.
    pub fn connect(config: Config) -> Result<Self, Error> {
        Ok(Self::connect_with(config, TlsConnector::new()?))
    }

    pub fn connect_with(config: Config, connector: impl Connector) -> Self {
        let nick = config.initial_nick();
        log::info!(target: "tmi::client", "connecting to {} as {nick}", config.address);

        let settings = Arc::new(Settings {
            address: config.address.clone(),
            registration: config.registration(&nick),
            read_buffer_size: config.read_buffer_size,
            keepalive_interval: config.keepalive_interval,
        });

        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (requests, requests_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (ready_tx, ready) = watch::channel(false);
        let (status_tx, status) = watch::channel(Status::Running);

        let pool = Pool::new(Sizing::new(&config), settings, Arc::new(connector), inbound_tx);
        let dispatcher = Dispatcher::new(
            config,
            nick,
            pool,
            inbound,
            requests_rx,
            events.clone(),
            ready_tx,
            status_tx,
        );
        tokio::spawn(dispatcher.run());

        Self {
            requests,
            events,
            ready,
            status,
        }
    }

    /// Every line received from here on. Slow subscribers skip what they missed.
    pub fn events(&self) -> impl Stream<Item = Arc<Event>> + Send + 'static {
        BroadcastStream::new(self.events.subscribe()).filter_map(|event| match event {
            Ok(event) => Some(event),
            Err(err) => {
                log::warn!(target: "tmi::client", "event subscriber fell behind: {err}");
                None
            }
        })
    }

    /// Resolves once every connection has heard from the server.
    pub async fn ready(&self) -> Result<(), Error> {
        let mut ready = self.ready.clone();
        ready.wait_for(|&ready| ready).await.map_err(|_| Error::Closed)?;
        Ok(())
    }

    /// Resolves once the server confirms every channel. Channels already
    /// joined, or known to be unjoinable, are skipped.
    pub async fn join<I>(&self, channels: I) -> Result<(), Error>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let channels: Vec<String> = channels.into_iter().map(Into::into).collect();
        self.request(|reply| Request::Join { channels, reply }).await
    }

    pub async fn part<I>(&self, channels: I) -> Result<(), Error>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let channels: Vec<String> = channels.into_iter().map(Into::into).collect();
        self.request(|reply| Request::Part { channels, reply }).await
    }

    /// Sets the number of write connections. Only valid without read connections.
    pub async fn resize(&self, size: usize) -> Result<(), Error> {
        self.request(|reply| Request::Resize { size, reply }).await
    }

    pub async fn privmsg(&self, channel: &str, text: &str) -> Result<(), Error> {
        self.send(channel, text, false, None).await
    }

    /// [`Client::privmsg`] with a `sent-ts` tag.
    pub async fn privmsg_ts(&self, channel: &str, text: &str) -> Result<(), Error> {
        self.send(channel, text, true, None).await
    }

    /// Replies in the thread of the message with the `id` tag `parent`.
    pub async fn reply(&self, channel: &str, text: &str, parent: &str) -> Result<(), Error> {
        self.send(channel, text, false, Some(parent)).await
    }

    pub async fn reply_ts(&self, channel: &str, text: &str, parent: &str) -> Result<(), Error> {
        self.send(channel, text, true, Some(parent)).await
    }

    /// Sends a line as is on the next write connection.
    pub async fn write_raw(&self, line: &str) -> Result<(), Error> {
        let line = Outgoing::Raw(line.to_string());
        self.request(|reply| Request::Send { line, reply }).await
    }

    /// Sends a chat command and waits for the server to settle it.
    ///
    /// `channel` defaults to our own. Returns the user list for
    /// [`Moderation::Mods`] and [`Moderation::Vips`].
    pub async fn moderate(
        &self,
        channel: Option<&str>,
        command: Moderation,
        args: &str,
    ) -> Result<Option<Vec<String>>, Error> {
        let channel = channel.map(ToString::to_string);
        let args = args.to_string();
        self.request(|reply| Request::Moderate {
            channel,
            command,
            args,
            reply,
        })
        .await
    }

    pub async fn ban(&self, channel: &str, login: &str, reason: Option<&str>) -> Result<(), Error> {
        let args = join_args([Some(login), reason]);
        self.moderate(Some(channel), Moderation::Ban, &args).await.map(drop)
    }

    pub async fn timeout(
        &self,
        channel: &str,
        login: &str,
        duration: Option<Duration>,
        reason: Option<&str>,
    ) -> Result<(), Error> {
        let duration = duration.map(|d| d.as_secs().max(1).to_string());
        let args = join_args([Some(login), duration.as_deref(), reason]);
        self.moderate(Some(channel), Moderation::Timeout, &args).await.map(drop)
    }

    /// Changes our chat color, sent from `channel` or our own channel.
    pub async fn color(&self, color: Color, channel: Option<&str>) -> Result<(), Error> {
        self.moderate(channel, Moderation::Color, &color.to_string())
            .await
            .map(drop)
    }

    /// Whispers can't be confirmed: this passes unless a failure arrives right away.
    pub async fn whisper(&self, login: &str, message: &str) -> Result<(), Error> {
        let args = join_args([Some(login), Some(message)]);
        self.moderate(None, Moderation::Whisper, &args).await.map(drop)
    }

    pub async fn raid(&self, channel: &str, login: &str) -> Result<(), Error> {
        self.moderate(Some(channel), Moderation::Raid, login).await.map(drop)
    }

    pub async fn announce(&self, channel: &str, message: &str) -> Result<(), Error> {
        self.moderate(Some(channel), Moderation::Announce, message)
            .await
            .map(drop)
    }

    pub async fn clear(&self, channel: &str) -> Result<(), Error> {
        self.moderate(Some(channel), Moderation::Clear, "").await.map(drop)
    }

    pub async fn mods(&self, channel: &str) -> Result<Vec<String>, Error> {
        let users = self.moderate(Some(channel), Moderation::Mods, "").await?;
        Ok(users.unwrap_or_default())
    }

    pub async fn vips(&self, channel: &str) -> Result<Vec<String>, Error> {
        let users = self.moderate(Some(channel), Moderation::Vips, "").await?;
        Ok(users.unwrap_or_default())
    }

    /// Round trip time to the server on one of the connections.
    pub async fn ping(&self) -> Result<Duration, Error> {
        self.request(|reply| Request::Ping { reply }).await
    }

    /// Channels the server has confirmed we're in.
    pub async fn rooms(&self) -> Result<Vec<String>, Error> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(Request::Rooms { reply })
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)
    }

    pub fn close(&self) {
        let _ = self.requests.send(Request::Close);
    }

    /// Waits for the client to stop. Fails if the server rejected our token.
    pub async fn wait(&self) -> Result<(), Error> {
        let mut status = self.status.clone();
        let status = status
            .wait_for(|status| *status != Status::Running)
            .await
            .map_err(|_| Error::Closed)?
            .clone();

        match status {
            Status::Authentication(msg) => Err(Error::Authentication(msg)),
            _ => Ok(()),
        }
    }

    async fn send(&self, channel: &str, text: &str, timestamp: bool, parent: Option<&str>) -> Result<(), Error> {
        let line = Outgoing::Privmsg {
            channel: crate::dispatcher::normalize(channel),
            text: text.to_string(),
            timestamp,
            parent: parent.map(ToString::to_string),
        };
        self.request(|reply| Request::Send { line, reply }).await
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<Result<T, Error>>) -> Request) -> Result<T, Error> {
        let (reply, rx) = oneshot::channel();
        self.requests.send(make(reply)).map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)?
    }
}

fn join_args<const N: usize>(args: [Option<&str>; N]) -> String {
    args.into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments() {
        assert_eq!(join_args([Some("spammer"), None, Some("being rude")]), "spammer being rude");
        assert_eq!(join_args([Some("spammer"), Some(""), None]), "spammer");
    }
}
