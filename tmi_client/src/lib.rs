//! A client for Twitch chat.
//!
//! Channels are spread over a pool of connections, commands are matched
//! with the notices the server answers them with.
//!
//! ```no_run
//! # async fn demo() -> Result<(), tmi_client::Error> {
//! let client = tmi_client::Client::connect(tmi_client::Config::default())?;
//! client.join(["museun"]).await?;
//! # Ok(()) }
//! ```

pub mod config;
pub use config::Config;

mod error;
pub use error::Error;

mod connection;
pub use connection::{ConnectionId, Connector, Permissions, Stream, TlsConnector};

mod rooms;
pub use rooms::RoomTracker;

mod notices;
pub use notices::{Color, Moderation, Outcome};

mod pool;
pub use pool::{membership_line, plan_join, Sizing};

mod dispatcher;

mod client;
pub use client::{Client, Event};

pub use tmi_parser;
