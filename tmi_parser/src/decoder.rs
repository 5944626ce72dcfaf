use std::borrow::Cow;

use crate::{
    cursor::{accumulate, Cursor},
    tags::{decode_value, Kind, Tags, Value},
    Command, Message,
};

/// Whether decoded text borrows from the frame or is copied out of it.
///
/// Borrowed text is free while the frame is alive; copied text makes
/// [`Message::into_owned`] free, which is what a message handed to another
/// task needs anyway.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Borrowed,
    Copied,
}

impl Mode {
    pub(crate) fn text(self, bytes: &[u8]) -> Cow<'_, str> {
        match (self, String::from_utf8_lossy(bytes)) {
            (Self::Copied, Cow::Borrowed(s)) => Cow::Owned(s.to_owned()),
            (_, text) => text,
        }
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct Decoder {
    mode: Mode,
}

impl Decoder {
    pub const fn new(mode: Mode) -> Self {
        Self { mode }
    }

    /// Decodes the first line of `frame`.
    ///
    /// If `frame` holds more than one line the bytes after the first line
    /// terminator are returned, and should be decoded in turn.
    pub fn decode<'a>(&self, frame: &'a [u8]) -> (Message<'a>, Option<&'a [u8]>) {
        let mut cur = Cursor::new(frame);
        let msg = match cur.peek() {
            Some(b'@') => self.tagged(&mut cur),
            Some(b':') => self.prefixed(&mut cur),
            _ => self.bare(&mut cur),
        };
        (msg, cur.finish_line())
    }

    /// Decodes every line of `frame`, returning how many were decoded.
    pub fn decode_all<'a>(&self, frame: &'a [u8], mut each: impl FnMut(Message<'a>)) -> usize {
        let mut count = 0;
        let mut next = Some(frame);
        while let Some(frame) = next {
            let (msg, rest) = self.decode(frame);
            each(msg);
            count += 1;
            next = rest;
        }
        count
    }

    fn tagged<'a>(&self, cur: &mut Cursor<'a>) -> Message<'a> {
        cur.bump();

        let mut tags = Tags::default();
        loop {
            let name = cur.take_until(|b| matches!(b, b'=' | b';' | b' '));
            let value = if cur.eat(b'=') {
                decode_value(Kind::of(name), cur, self.mode)
            } else {
                Value::Str(Cow::Borrowed(""))
            };
            if !name.is_empty() {
                tags.push(self.mode.text(name), value);
            }
            if !cur.eat(b';') {
                break;
            }
        }
        cur.skip_spaces();

        // tags are decoded before the verb, so they tell us whether the prefix
        // belongs to a user
        let from_user = tags.contains("first-msg") || tags.contains("thread-id");

        let mut login = None;
        let mut prefix = &[][..];
        if cur.eat(b':') {
            if from_user {
                login = Some(self.mode.text(cur.take_until(|b| b == b'!' || b == b' ')));
            }
            prefix = cur.take_word();
            cur.skip_spaces();
        }

        let mut msg = self.command(cur);
        msg.tags = tags;
        msg.login = login;

        let target = self.target(cur);
        let trailing = trailing(cur);

        match msg.command {
            Command::Notice => {
                let users = match msg.msg_id() {
                    Some("room_mods" | "vips_success") => Some(self.users(trailing.unwrap_or_default())),
                    Some("no_mods" | "no_vips") => Some(Vec::new()),
                    _ => None,
                };
                msg.users = users;
                msg.message = trailing.map(|s| self.mode.text(s));
            }
            Command::Privmsg | Command::Whisper => {
                if msg.login.is_none() {
                    msg.login = self.login_from_prefix(prefix);
                }
                self.body(&mut msg, trailing);
            }
            Command::ClearChat => {
                msg.login = trailing.map(|s| self.mode.text(s));
                msg.message = trailing.map(|s| self.mode.text(s));
            }
            _ => msg.message = trailing.map(|s| self.mode.text(s)),
        }

        msg.channel = target;
        msg
    }

    fn prefixed<'a>(&self, cur: &mut Cursor<'a>) -> Message<'a> {
        cur.bump();
        let prefix = cur.take_word();
        cur.skip_spaces();

        let mut msg = self.command(cur);
        if msg.raw_command.as_deref() == Some("CAP") {
            cur.skip_word();
            msg.command = Command::from_cap(cur.take_word());
            if msg.command != Command::Unknown {
                msg.raw_command = None;
            }
            cur.skip_spaces();
        }

        match msg.command {
            cmd if cmd.is_greeting() => {
                msg.login = Some(self.word(cur));
                msg.message = trailing(cur).map(|s| self.mode.text(s));
            }
            Command::NamesReply => {
                msg.login = Some(self.word(cur));
                cur.skip_word();
                msg.channel = self.target(cur);
                let members = trailing(cur).unwrap_or_default();
                msg.members = Some(self.split_spaces(members));
            }
            Command::EndOfNames => {
                msg.login = Some(self.word(cur));
                msg.channel = self.target(cur);
                msg.message = trailing(cur).map(|s| self.mode.text(s));
            }
            Command::UnknownCommand => {
                msg.login = Some(self.word(cur));
                msg.failed = Some(self.word(cur));
                msg.message = trailing(cur).map(|s| self.mode.text(s));
            }
            Command::CapAck | Command::CapNak | Command::CapLs => {
                let caps = trailing(cur).unwrap_or_else(|| cur.take_line());
                msg.capabilities = Some(self.split_spaces(caps));
            }
            Command::Join | Command::Part => {
                msg.login = self.login_from_prefix(prefix);
                msg.channel = self.target(cur);
            }
            Command::HostTarget => {
                msg.channel = self.target(cur);
                cur.eat(b':');
                msg.hosting = Some(self.word(cur));
                let viewers = cur.take_word();
                msg.viewers = viewers
                    .first()
                    .filter(|b| b.is_ascii_digit())
                    .map(|_| accumulate(viewers));
            }
            Command::Reconnect => {}
            Command::Privmsg | Command::Whisper => {
                msg.login = self.login_from_prefix(prefix);
                msg.channel = self.target(cur);
                let body = trailing(cur);
                self.body(&mut msg, body);
            }
            _ => {
                msg.channel = self.target(cur);
                msg.message = trailing(cur).map(|s| self.mode.text(s));
            }
        }

        msg
    }

    fn bare<'a>(&self, cur: &mut Cursor<'a>) -> Message<'a> {
        self.command(cur)
    }

    fn command<'a>(&self, cur: &mut Cursor<'a>) -> Message<'a> {
        let verb = cur.take_word();
        cur.skip_spaces();

        let mut msg = Message::new(Command::from_verb(verb));
        if msg.command == Command::Unknown {
            msg.raw_command = Some(self.mode.text(verb));
        }
        msg
    }

    fn word<'a>(&self, cur: &mut Cursor<'a>) -> Cow<'a, str> {
        let word = self.mode.text(cur.take_word());
        cur.skip_spaces();
        word
    }

    /// The middle parameter: a `#channel`, a whisper recipient, or `*`.
    fn target<'a>(&self, cur: &mut Cursor<'a>) -> Option<Cow<'a, str>> {
        if cur.at_eol() || cur.peek() == Some(b':') {
            return None;
        }
        let target = cur.take_word();
        cur.skip_spaces();
        match target.strip_prefix(b"#").unwrap_or(target) {
            b"*" | b"" => None,
            name => Some(self.mode.text(name)),
        }
    }

    fn login_from_prefix<'a>(&self, prefix: &'a [u8]) -> Option<Cow<'a, str>> {
        let end = prefix.iter().position(|&b| b == b'!')?;
        Some(self.mode.text(&prefix[..end]))
    }

    fn body<'a>(&self, msg: &mut Message<'a>, trailing: Option<&'a [u8]>) {
        const ACTION: &[u8] = b"\x01ACTION ";

        let Some(mut body) = trailing else { return };
        if let Some(rest) = body.strip_prefix(ACTION) {
            msg.action = true;
            body = rest.strip_suffix(b"\x01").unwrap_or(rest);
        }
        msg.message = Some(self.mode.text(body));
    }

    fn split_spaces<'a>(&self, list: &'a [u8]) -> Vec<Cow<'a, str>> {
        list.split(|&b| b == b' ')
            .filter(|s| !s.is_empty())
            .map(|s| self.mode.text(s))
            .collect()
    }

    // "The moderators of this channel are: a, b, c"
    // "The VIPs of this channel are: a, b, c."
    fn users<'a>(&self, text: &'a [u8]) -> Vec<Cow<'a, str>> {
        let Some(start) = text.iter().position(|&b| b == b':') else {
            return Vec::new();
        };
        text[start + 1..]
            .split(|&b| b == b',')
            .map(|s| trim(s, b" ."))
            .filter(|s| !s.is_empty())
            .map(|s| self.mode.text(s))
            .collect()
    }
}

/// Skips any remaining middle parameters and returns the trailing one.
fn trailing<'a>(cur: &mut Cursor<'a>) -> Option<&'a [u8]> {
    while !cur.at_eol() && cur.peek() != Some(b':') {
        cur.skip_word();
    }
    cur.eat(b':').then(|| cur.take_line())
}

fn trim<'a>(mut s: &'a [u8], strip: &[u8]) -> &'a [u8] {
    while let [first, rest @ ..] = s {
        if !strip.contains(first) {
            break;
        }
        s = rest;
    }
    while let [rest @ .., last] = s {
        if !strip.contains(last) {
            break;
        }
        s = rest;
    }
    s
}

/// Decodes the first line of `frame` with borrowed text.
pub fn decode(frame: &[u8]) -> (Message<'_>, Option<&[u8]>) {
    Decoder::default().decode(frame)
}
