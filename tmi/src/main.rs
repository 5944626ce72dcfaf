use gumdrop::Options;
use tokio_stream::StreamExt as _;

use tmi_client::{tmi_parser::Command, Client, Config, Moderation};
use tmi_config::LoadFromEnv as _;

#[derive(Debug, Options)]
/// watches twitch chat
struct Args {
    /// print this help message
    help: bool,

    /// nick to log in as, requires TMI_OAUTH_TOKEN
    #[options(meta = "<nick>")]
    nick: Option<String>,

    /// also request the membership capability
    membership: bool,

    /// send lines from stdin to the first channel, `.cmd args` runs a chat command
    input: bool,

    /// channels to join
    #[options(free)]
    channels: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    simple_env_load::load_env_from([".dev.env", ".log.env"]);
    alto_logger::TermLogger::new(
        alto_logger::Options::default()
            .with_time(alto_logger::TimeConfig::relative_now())
            .with_style(alto_logger::StyleConfig::SingleLine),
    )?
    .init()?;

    let args = Args::parse_args_default_or_exit();

    let mut config = Config::load_from_env()?;
    if args.nick.is_some() {
        config.nick = args.nick;
    }
    config.membership_capability |= args.membership;
    config.channels.extend(args.channels);

    if config.channels.is_empty() {
        anyhow::bail!("no channels to join, pass some or set TMI_CHANNELS");
    }
    log::debug!("{config:#?}");
    let channel = config.channels[0].clone();

    let client = Client::connect(config)?;
    let mut events = std::pin::pin!(client.events());

    let watch = async move {
        while let Some(event) = events.next().await {
            let msg = &event.message;
            match msg.command {
                Command::Privmsg if msg.action => log::info!(
                    "[#{}] * {} {}",
                    msg.channel().unwrap_or_default(),
                    msg.login().unwrap_or_default(),
                    msg.message().unwrap_or_default(),
                ),
                Command::Privmsg => log::info!(
                    "[#{}] {}: {}",
                    msg.channel().unwrap_or_default(),
                    msg.login().unwrap_or_default(),
                    msg.message().unwrap_or_default(),
                ),
                Command::Notice => log::warn!(
                    "[#{}] {}",
                    msg.channel().unwrap_or("*"),
                    msg.message().unwrap_or_default(),
                ),
                _ => log::trace!("[{}] {:?}", event.connection, msg),
            }
        }
    };

    tokio::select! {
        _ = watch => {}
        res = client.wait() => res?,
        res = relay(&client, &channel), if args.input => res?,
        _ = tokio::signal::ctrl_c() => {
            log::info!("shutting down");
            client.close();
        }
    }

    Ok(())
}

/// Sends stdin lines to `channel` until stdin closes.
async fn relay(client: &Client, channel: &str) -> anyhow::Result<()> {
    use tokio::io::AsyncBufReadExt as _;

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (name, args) = line.split_once(' ').unwrap_or((line, ""));
        let command = Some(name)
            .filter(|name| name.starts_with('.'))
            .and_then(Moderation::from_name);

        let Some(command) = command else {
            client.privmsg(channel, line).await?;
            continue;
        };

        match client.moderate(Some(channel), command, args).await {
            Ok(Some(users)) => log::info!("{command}: {}", users.join(", ")),
            Ok(None) => log::info!("{command}: done"),
            Err(err) => log::warn!("{command}: {err}"),
        }
    }
    Ok(())
}
