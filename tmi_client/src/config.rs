use std::time::Duration;

use tmi_config::{overlay_from_env, LoadFromEnv, Secret};

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub address: String,
    /// Used when authenticated. Anonymous connections always get a `justinfan` nick.
    pub nick: Option<String>,
    pub token: Secret<String>,
    /// Channels joined as soon as the pool is up.
    pub channels: Vec<String>,

    pub membership_capability: bool,
    pub commands_capability: bool,

    /// Share connections between reads and writes.
    pub merge_connections: bool,
    /// Write connections per channel, only used when connections aren't merged.
    pub write_multiplier: f64,
    /// Channels per read connection.
    pub read_divisor: i64,
    /// Respect the authentication rate limit when opening connections.
    pub rate_limit: bool,

    pub promise_timeout: Duration,
    pub membership_timeout: Duration,
    pub keepalive_interval: Duration,
    /// Delay between authentication batches, and before acting on a `RECONNECT`.
    pub rate_limit_interval: Duration,

    pub read_buffer_size: usize,
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: String::from("irc.chat.twitch.tv:6697"),
            nick: None,
            token: Secret::default(),
            channels: Vec::new(),

            membership_capability: false,
            commands_capability: true,

            merge_connections: true,
            write_multiplier: 1.0,
            read_divisor: 90,
            rate_limit: true,

            promise_timeout: Duration::from_secs(2),
            membership_timeout: Duration::from_secs(180),
            keepalive_interval: Duration::from_secs(300),
            rate_limit_interval: Duration::from_millis(10_100),

            read_buffer_size: 16 * 1024,
            event_capacity: 1024,
        }
    }
}

impl Config {
    /// An authentication rate limit window allows this many attempts.
    pub const AUTHENTICATION_BATCH: usize = 20;

    /// The token without its `oauth:` prefix, if it looks like a real one.
    pub fn token(&self) -> Option<&str> {
        let token = self.token.strip_prefix("oauth:").unwrap_or(&self.token);
        (token.len() == 30).then_some(token)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn read_divisor(&self) -> usize {
        usize::try_from(self.read_divisor).unwrap_or(0).max(1)
    }

    pub fn write_multiplier(&self) -> f64 {
        if self.write_multiplier.is_finite() {
            self.write_multiplier.max(0.0)
        } else {
            0.0
        }
    }

    /// The nick to register with. Authenticated connections learn their real
    /// login from the welcome reply.
    pub fn initial_nick(&self) -> String {
        match (self.is_authenticated(), &self.nick) {
            (true, Some(nick)) => nick.to_ascii_lowercase(),
            (true, None) => String::from("_"),
            (false, _) => format!("justinfan{}", fastrand::u64(1000..u64::MAX / 2)),
        }
    }

    /// The lines sent as soon as a connection is established.
    pub fn registration(&self, nick: &str) -> String {
        let mut out = String::from("CAP REQ :twitch.tv/tags");
        if self.commands_capability {
            out.push_str(" twitch.tv/commands");
        }
        if self.membership_capability {
            out.push_str(" twitch.tv/membership");
        }
        out.push('\n');

        if let Some(token) = self.token() {
            out.push_str("PASS oauth:");
            out.push_str(token);
            out.push('\n');
        }

        out.push_str("NICK ");
        out.push_str(nick);
        out.push('\n');
        out
    }
}

impl LoadFromEnv for Config {
    fn load_from_env() -> anyhow::Result<Self> {
        fn flag(v: &str) -> anyhow::Result<bool> {
            match v {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => anyhow::bail!("expected a boolean, got '{v}'"),
            }
        }

        fn secs(v: &str) -> anyhow::Result<Duration> {
            Ok(Duration::from_secs_f64(v.parse()?))
        }

        overlay_from_env(
            Self::default(),
            &[
                ("TMI_ADDRESS", |t, v| Ok(t.address = v)),
                ("TMI_NICK", |t, v| Ok(t.nick = Some(v))),
                ("TMI_OAUTH_TOKEN", |t, v| Ok(t.token = Secret(v))),
                ("TMI_CHANNELS", |t, v| {
                    t.channels = v
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(ToString::to_string)
                        .collect();
                    Ok(())
                }),
                ("TMI_MEMBERSHIP", |t, v| Ok(t.membership_capability = flag(&v)?)),
                ("TMI_COMMANDS", |t, v| Ok(t.commands_capability = flag(&v)?)),
                ("TMI_MERGE_CONNECTIONS", |t, v| Ok(t.merge_connections = flag(&v)?)),
                ("TMI_WRITE_MULTIPLIER", |t, v| Ok(t.write_multiplier = v.parse()?)),
                ("TMI_READ_DIVISOR", |t, v| Ok(t.read_divisor = v.parse()?)),
                ("TMI_RATE_LIMIT", |t, v| Ok(t.rate_limit = flag(&v)?)),
                ("TMI_PROMISE_TIMEOUT", |t, v| Ok(t.promise_timeout = secs(&v)?)),
                ("TMI_MEMBERSHIP_TIMEOUT", |t, v| Ok(t.membership_timeout = secs(&v)?)),
                ("TMI_KEEPALIVE_INTERVAL", |t, v| Ok(t.keepalive_interval = secs(&v)?)),
            ],
        )
    }
}
