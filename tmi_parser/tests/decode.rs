use std::borrow::Cow;

use tmi_parser::{decode, Badge, BadgeInfo, Command, Decoder, Message, Mode, Reassembler, Value};

fn one(line: &str) -> Message<'_> {
    let (msg, rest) = decode(line.as_bytes());
    assert!(rest.is_none(), "unexpected remainder for {line:?}");
    msg
}

#[test]
fn unknown_command_reply() {
    let msg = one(":tmi.twitch.tv 421 justinfan1 BADCMD :Unknown command\r\n");
    assert_eq!(msg.command, Command::UnknownCommand);
    assert_eq!(msg.login(), Some("justinfan1"));
    assert_eq!(msg.failed.as_deref(), Some("BADCMD"));
    assert_eq!(msg.message(), Some("Unknown command"));
}

#[test]
fn remainder_is_returned() {
    let buf = b":tmi.twitch.tv 001 museun :Welcome, GLHF!\r\n:tmi.twitch.tv 002 museun :Your host is tmi.twitch.tv\r\n";
    let (first, rest) = decode(buf);
    assert_eq!(first.command, Command::Welcome);
    assert_eq!(first.login(), Some("museun"));
    assert_eq!(first.message(), Some("Welcome, GLHF!"));

    let rest = rest.expect("second line");
    let (second, rest) = decode(rest);
    assert_eq!(second.command, Command::YourHost);
    assert_eq!(second.message(), Some("Your host is tmi.twitch.tv"));
    assert!(rest.is_none());
}

#[test]
fn decode_all_counts_lines() {
    let buf = b"PING :tmi.twitch.tv\r\n:tmi.twitch.tv RECONNECT\r\n:tmi.twitch.tv PONG tmi.twitch.tv :42\r\n";
    let mut seen = vec![];
    let count = Decoder::default().decode_all(buf, |msg| seen.push((msg.command, msg.message.map(Cow::into_owned))));
    assert_eq!(count, 3);
    assert_eq!(
        seen,
        [
            (Command::Ping, None),
            (Command::Reconnect, None),
            (Command::Pong, Some("42".to_string())),
        ]
    );
}

#[test]
fn privmsg() {
    let line = "@badge-info=subscriber/63;badges=broadcaster/1,subscriber/3012;color=#FF0000;display-name=as\\sas;emotes=;first-msg=0;id=e6ce0a38;mod=0;room-id=23196011;tmi-sent-ts=1642715756806;user-id=23196011 :museun!museun@museun.tmi.twitch.tv PRIVMSG #museun :hello world\r\n";
    let msg = one(line);
    assert_eq!(msg.command, Command::Privmsg);
    assert_eq!(msg.login(), Some("museun"));
    assert_eq!(msg.channel(), Some("museun"));
    assert_eq!(msg.message(), Some("hello world"));
    assert!(!msg.action);

    let tags = &msg.tags;
    assert_eq!(tags.get_str("display-name"), Some("as as"));
    assert_eq!(tags.get("color").and_then(Value::as_color), Some(Some(0xFF0000)));
    assert_eq!(tags.get_int("room-id"), Some(23_196_011));
    assert_eq!(
        tags.get("tmi-sent-ts").and_then(Value::as_uint),
        Some(1_642_715_756_806)
    );
    assert_eq!(tags.get_str("emotes"), Some(""));

    match tags.get("badge-info") {
        Some(Value::BadgeInfo(info)) => {
            assert_eq!(info.len(), 1);
            assert_eq!(info.get("subscriber"), Some(&BadgeInfo::Tier(63)));
        }
        other => panic!("unexpected badge-info: {other:?}"),
    }
    match tags.get("badges") {
        Some(Value::Badges(badges)) => {
            assert_eq!(badges.get("broadcaster"), Some(&Badge::Tier(1)));
            assert_eq!(badges.get("subscriber"), Some(&Badge::Tier(3012)));
        }
        other => panic!("unexpected badges: {other:?}"),
    }
}

#[test]
fn privmsg_action() {
    let msg = one("@first-msg=0;color= :museun!museun@museun.tmi.twitch.tv PRIVMSG #museun :\x01ACTION waves\x01\r\n");
    assert!(msg.action);
    assert_eq!(msg.message(), Some("waves"));
    assert_eq!(msg.tags.get("color").and_then(Value::as_color), Some(None));
}

#[test]
fn privmsg_without_tags() {
    let msg = one(":museun!museun@museun.tmi.twitch.tv PRIVMSG #museun :hi there\r\n");
    assert_eq!(msg.command, Command::Privmsg);
    assert_eq!(msg.login(), Some("museun"));
    assert_eq!(msg.channel(), Some("museun"));
    assert_eq!(msg.message(), Some("hi there"));
    assert!(msg.tags.is_empty());
}

#[test]
fn whisper() {
    let msg = one("@badges=;color=;display-name=Museun;message-id=7;thread-id=1_2;user-id=1 :museun!museun@museun.tmi.twitch.tv WHISPER shaken_bot :psst\r\n");
    assert_eq!(msg.command, Command::Whisper);
    assert_eq!(msg.login(), Some("museun"));
    assert_eq!(msg.channel(), Some("shaken_bot"));
    assert_eq!(msg.message(), Some("psst"));
}

#[test]
fn names_reply() {
    let msg = one(":shaken_bot.tmi.twitch.tv 353 shaken_bot = #museun :museun shaken_bot someone\r\n");
    assert_eq!(msg.command, Command::NamesReply);
    assert_eq!(msg.login(), Some("shaken_bot"));
    assert_eq!(msg.channel(), Some("museun"));
    assert_eq!(
        msg.members,
        Some(vec!["museun".into(), "shaken_bot".into(), "someone".into()])
    );

    let msg = one(":shaken_bot.tmi.twitch.tv 366 shaken_bot #museun :End of /NAMES list\r\n");
    assert_eq!(msg.command, Command::EndOfNames);
    assert_eq!(msg.channel(), Some("museun"));
    assert_eq!(msg.message(), Some("End of /NAMES list"));
}

#[test]
fn capabilities() {
    let msg = one(":tmi.twitch.tv CAP * ACK :twitch.tv/tags twitch.tv/commands\r\n");
    assert_eq!(msg.command, Command::CapAck);
    assert_eq!(
        msg.capabilities,
        Some(vec!["twitch.tv/tags".into(), "twitch.tv/commands".into()])
    );

    let msg = one(":tmi.twitch.tv CAP * NAK :twitch.tv/foo\r\n");
    assert_eq!(msg.command, Command::CapNak);
    assert_eq!(msg.capabilities, Some(vec!["twitch.tv/foo".into()]));
}

#[test]
fn membership() {
    let msg = one(":shaken_bot!shaken_bot@shaken_bot.tmi.twitch.tv JOIN #museun\r\n");
    assert_eq!(msg.command, Command::Join);
    assert_eq!(msg.login(), Some("shaken_bot"));
    assert_eq!(msg.channel(), Some("museun"));

    let msg = one(":shaken_bot!shaken_bot@shaken_bot.tmi.twitch.tv PART #museun\r\n");
    assert_eq!(msg.command, Command::Part);
    assert_eq!(msg.channel(), Some("museun"));
}

#[test]
fn host_target() {
    let msg = one(":tmi.twitch.tv HOSTTARGET #museun :shaken_bot 42\r\n");
    assert_eq!(msg.command, Command::HostTarget);
    assert_eq!(msg.channel(), Some("museun"));
    assert_eq!(msg.hosting.as_deref(), Some("shaken_bot"));
    assert_eq!(msg.viewers, Some(42));

    let msg = one(":tmi.twitch.tv HOSTTARGET #museun :- \r\n");
    assert_eq!(msg.hosting.as_deref(), Some("-"));
    assert_eq!(msg.viewers, None);
}

#[test]
fn notices() {
    let msg = one("@msg-id=room_mods :tmi.twitch.tv NOTICE #museun :The moderators of this channel are: a, b_c, d\r\n");
    assert_eq!(msg.command, Command::Notice);
    assert_eq!(msg.msg_id(), Some("room_mods"));
    assert_eq!(msg.users, Some(vec!["a".into(), "b_c".into(), "d".into()]));

    let msg = one("@msg-id=vips_success :tmi.twitch.tv NOTICE #museun :The VIPs of this channel are: x, y.\r\n");
    assert_eq!(msg.users, Some(vec!["x".into(), "y".into()]));

    let msg = one("@msg-id=no_mods :tmi.twitch.tv NOTICE #museun :There are no moderators of this channel.\r\n");
    assert_eq!(msg.users, Some(vec![]));

    let msg = one("@msg-id=bad_ban_self :tmi.twitch.tv NOTICE #museun :You cannot ban yourself.\r\n");
    assert_eq!(msg.users, None);
    assert_eq!(msg.message(), Some("You cannot ban yourself."));

    let msg = one(":tmi.twitch.tv NOTICE * :Login authentication failed\r\n");
    assert_eq!(msg.command, Command::Notice);
    assert_eq!(msg.channel(), None);
    assert_eq!(msg.message(), Some("Login authentication failed"));
}

#[test]
fn clear_chat() {
    let msg = one("@ban-duration=600;room-id=1;target-user-id=2;tmi-sent-ts=3 :tmi.twitch.tv CLEARCHAT #museun :spammer\r\n");
    assert_eq!(msg.command, Command::ClearChat);
    assert_eq!(msg.channel(), Some("museun"));
    assert_eq!(msg.login(), Some("spammer"));
    assert_eq!(msg.tags.get_int("ban-duration"), Some(600));

    let msg = one("@room-id=1;tmi-sent-ts=3 :tmi.twitch.tv CLEARCHAT #museun\r\n");
    assert_eq!(msg.login(), None);
}

#[test]
fn user_notice_and_states() {
    let msg = one("@badge-info=;badges=;color=#1E90FF;display-name=Museun;login=museun;msg-id=announcement;msg-param-color=PRIMARY;system-msg= :tmi.twitch.tv USERNOTICE #museun :hello\r\n");
    assert_eq!(msg.command, Command::UserNotice);
    assert_eq!(msg.msg_id(), Some("announcement"));
    assert_eq!(msg.tags.get_str("login"), Some("museun"));
    assert_eq!(msg.message(), Some("hello"));
    assert_eq!(msg.login(), None);

    let msg = one("@badge-info=;badges=;color=;display-name=shaken_bot;emote-sets=0,300374282;user-id=1;user-type= :tmi.twitch.tv GLOBALUSERSTATE\r\n");
    assert_eq!(msg.command, Command::GlobalUserState);
    assert_eq!(msg.channel(), None);
    assert_eq!(
        msg.tags.get("emote-sets"),
        Some(&Value::List(vec!["0".into(), "300374282".into()]))
    );
}

#[test]
fn unknown_lines_never_fail() {
    let msg = one("FOO bar baz\r\n");
    assert_eq!(msg.command, Command::Unknown);
    assert_eq!(msg.raw_command.as_deref(), Some("FOO"));

    for junk in ["", "@", ":", "@;", "@a=", ":x", "\r\n", "@badges=a/", ":tmi.twitch.tv 353"] {
        let _ = decode(junk.as_bytes());
    }
}

#[test]
fn copied_mode_owns_text() {
    let line = b"@display-name=museun;first-msg=0 :museun!museun@museun.tmi.twitch.tv PRIVMSG #museun :hi\r\n";
    let (msg, _) = Decoder::new(Mode::Copied).decode(line);
    assert!(matches!(msg.channel, Some(Cow::Owned(..))));
    assert!(matches!(msg.message, Some(Cow::Owned(..))));

    let (msg, _) = Decoder::new(Mode::Borrowed).decode(line);
    assert!(matches!(msg.channel, Some(Cow::Borrowed("museun"))));
}

#[test]
fn reassembly_matches_whole_decoding() {
    let stream: &[u8] = b"@badge-info=subscriber/63;color=#FF0000;first-msg=0 :museun!museun@museun.tmi.twitch.tv PRIVMSG #museun :one\r\n\
PING :tmi.twitch.tv\r\n\
:tmi.twitch.tv 421 justinfan1 BADCMD :Unknown command\r\n\
@msg-id=room_mods :tmi.twitch.tv NOTICE #museun :The moderators of this channel are: a, b\r\n";

    let mut whole = vec![];
    Decoder::default().decode_all(stream, |msg| whole.push(msg.into_owned()));
    assert_eq!(whole.len(), 4);

    for size in [1, 2, 3, 7, 16, 64, stream.len()] {
        let mut re = Reassembler::default();
        let mut split = vec![];
        for chunk in stream.chunks(size) {
            re.feed(chunk, |msg| split.push(msg.into_owned())).unwrap();
        }
        assert_eq!(split, whole, "chunk size {size}");
        assert_eq!(re.pending(), 0);
    }
}
