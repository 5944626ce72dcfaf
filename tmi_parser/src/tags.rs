use std::borrow::Cow;

use crate::{
    badges::{self, Badge, BadgeInfo, BadgeMap},
    cursor::{accumulate, is_eol, Cursor},
    Mode,
};

/// How a tag's value is decoded. Fixed per tag name, see [`Kind::of`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    Int,
    Uint,
    Color,
    Bool,
    List,
    Badges,
    BadgeInfo,
    Escaped,
    Raw,
    /// Not in the table: raw, unless the value contains an escape.
    Text,
}

impl Kind {
    pub fn of(name: &[u8]) -> Self {
        match name {
            b"bits"
            | b"mod"
            | b"r9k"
            | b"rituals"
            | b"slow"
            | b"subscriber"
            | b"turbo"
            | b"vip"
            | b"ban-duration"
            | b"emote-only"
            | b"followers-only"
            | b"message-id"
            | b"msg-param-multimonth-duration"
            | b"msg-param-multimonth-tenure"
            | b"msg-param-should-share-streak"
            | b"msg-param-sub-plan"
            | b"msg-param-cumulative-months"
            | b"msg-param-donation-amount"
            | b"msg-param-exponent"
            | b"msg-param-gift-months"
            | b"msg-param-mass-gift-count"
            | b"msg-param-months"
            | b"msg-param-recipient-id"
            | b"msg-param-streak-months"
            | b"msg-param-viewerCount"
            | b"msg-param-goal-current-contributions"
            | b"msg-param-goal-target-contributions"
            | b"msg-param-goal-user-contributions"
            | b"reply-parent-user-id"
            | b"reply-thread-parent-user-id"
            | b"returning-chatter"
            | b"room-id"
            | b"source-room-id"
            | b"subs-only"
            | b"target-user-id"
            | b"user-id"
            | b"first-msg" => Self::Int,

            b"sent-ts" | b"tmi-sent-ts" => Self::Uint,

            b"color" => Self::Color,

            b"msg-param-was-gifted" => Self::Bool,

            b"emote-sets" => Self::List,

            b"badges" | b"source-badges" => Self::Badges,

            b"badge-info" | b"source-badge-info" => Self::BadgeInfo,

            b"client-nonce"
            | b"msg-param-sub-plan-name"
            | b"system-msg"
            | b"reply-parent-msg-body"
            | b"reply-parent-display-name"
            | b"msg-param-displayName"
            | b"display-name" => Self::Escaped,

            b"msg-id"
            | b"login"
            | b"id"
            | b"emotes"
            | b"flags"
            | b"user-type"
            | b"thread-id"
            | b"target-msg-id"
            | b"reply-parent-msg-id"
            | b"reply-parent-user-login"
            | b"reply-thread-parent-msg-id" => Self::Raw,

            _ => Self::Text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value<'a> {
    Int(i64),
    Uint(u64),
    Color(Option<u32>),
    Bool(bool),
    List(Vec<Cow<'a, str>>),
    Badges(BadgeMap<'a, Badge<'a>>),
    BadgeInfo(BadgeMap<'a, BadgeInfo<'a>>),
    Str(Cow<'a, str>),
}

impl<'a> Value<'a> {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub const fn as_int(&self) -> Option<i64> {
        match *self {
            Self::Int(n) => Some(n),
            Self::Uint(n) => Some(n as i64),
            _ => None,
        }
    }

    pub const fn as_uint(&self) -> Option<u64> {
        match *self {
            Self::Uint(n) => Some(n),
            Self::Int(n) if n >= 0 => Some(n as u64),
            _ => None,
        }
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(b) => Some(b),
            Self::Int(n) => Some(n != 0),
            _ => None,
        }
    }

    /// `Some(None)` is the explicit "no color" value.
    pub const fn as_color(&self) -> Option<Option<u32>> {
        match *self {
            Self::Color(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_owned(self) -> Value<'static> {
        match self {
            Self::Int(n) => Value::Int(n),
            Self::Uint(n) => Value::Uint(n),
            Self::Color(c) => Value::Color(c),
            Self::Bool(b) => Value::Bool(b),
            Self::List(list) => Value::List(list.into_iter().map(owned).collect()),
            Self::Badges(map) => Value::Badges(map.into_owned()),
            Self::BadgeInfo(map) => Value::BadgeInfo(map.into_owned()),
            Self::Str(s) => Value::Str(owned(s)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag<'a> {
    pub name: Cow<'a, str>,
    pub value: Value<'a>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tags<'a>(Vec<Tag<'a>>);

impl<'a> Tags<'a> {
    pub fn get(&self, name: &str) -> Option<&Value<'a>> {
        self.0.iter().find(|tag| tag.name == name).map(|tag| &tag.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_str()
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name)?.as_int()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag<'a>> + '_ {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn push(&mut self, name: Cow<'a, str>, value: Value<'a>) {
        self.0.push(Tag { name, value })
    }

    pub fn into_owned(self) -> Tags<'static> {
        Tags(
            self.0
                .into_iter()
                .map(|Tag { name, value }| Tag {
                    name: owned(name),
                    value: value.into_owned(),
                })
                .collect(),
        )
    }
}

/// Decodes a single tag value, returning it and the number of bytes consumed.
///
/// `value` starts right after the `=` and may run on into the rest of the line.
pub fn decode_tag<'a>(name: &str, value: &'a [u8], mode: Mode) -> (Value<'a>, usize) {
    let mut cur = Cursor::new(value);
    let value = decode_value(Kind::of(name.as_bytes()), &mut cur, mode);
    (value, cur.pos())
}

pub(crate) const fn is_tag_end(b: u8) -> bool {
    matches!(b, b';' | b' ') || is_eol(b)
}

pub(crate) fn decode_value<'a>(kind: Kind, cur: &mut Cursor<'a>, mode: Mode) -> Value<'a> {
    match kind {
        Kind::Int => {
            let negative = cur.eat(b'-');
            let n = accumulate(cur.take_until(is_tag_end)) as i64;
            Value::Int(if negative { n.wrapping_neg() } else { n })
        }
        Kind::Uint => Value::Uint(accumulate(cur.take_until(is_tag_end))),
        Kind::Color => Value::Color(decode_color(cur.take_until(is_tag_end))),
        Kind::Bool => Value::Bool(matches!(
            cur.take_until(is_tag_end).first().copied(),
            Some(b't' | b'1')
        )),
        Kind::List => {
            let mut list = vec![mode.text(cur.take_until(|b| b == b',' || is_tag_end(b)))];
            while cur.eat(b',') {
                list.push(mode.text(cur.take_until(|b| b == b',' || is_tag_end(b))));
            }
            Value::List(list)
        }
        Kind::Badges => Value::Badges(badges::decode_badges(cur, mode)),
        Kind::BadgeInfo => Value::BadgeInfo(badges::decode_badge_info(cur, mode)),
        Kind::Escaped => Value::Str(unescape(cur.take_until(is_tag_end), mode)),
        Kind::Raw => Value::Str(mode.text(cur.take_until(is_tag_end))),
        Kind::Text => {
            let raw = cur.take_until(is_tag_end);
            if raw.contains(&b'\\') {
                Value::Str(unescape(raw, mode))
            } else {
                Value::Str(mode.text(raw))
            }
        }
    }
}

fn decode_color(raw: &[u8]) -> Option<u32> {
    let digits = raw.strip_prefix(b"#")?;
    if digits.is_empty() {
        return None;
    }

    let color = digits.iter().fold(0u32, |acc, &b| {
        let nibble = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => 0,
        };
        acc.wrapping_shl(4) | nibble as u32
    });
    Some(color)
}

/// Decodes IRCv3 tag escapes. Unknown escapes yield the escaped byte itself and
/// a trailing lone backslash is dropped.
pub fn unescape(raw: &[u8], mode: Mode) -> Cow<'_, str> {
    if !raw.contains(&b'\\') {
        return mode.text(raw);
    }

    let mut out = Vec::with_capacity(raw.len());
    let mut iter = raw.iter().copied();
    while let Some(b) = iter.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match iter.next() {
            Some(b's') => out.push(b' '),
            Some(b':') => out.push(b';'),
            Some(b'r') => out.push(b'\r'),
            Some(b'n') => out.push(b'\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }

    match String::from_utf8(out) {
        Ok(s) => Cow::Owned(s),
        Err(err) => Cow::Owned(String::from_utf8_lossy(err.as_bytes()).into_owned()),
    }
}

pub(crate) fn owned(s: Cow<'_, str>) -> Cow<'static, str> {
    Cow::Owned(s.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(name: &str, value: &str) -> Value<'static> {
        decode_tag(name, value.as_bytes(), Mode::Borrowed)
            .0
            .into_owned()
    }

    #[test]
    fn integers() {
        assert_eq!(decode("room-id", "12345"), Value::Int(12345));
        assert_eq!(decode("followers-only", "-1"), Value::Int(-1));
        assert_eq!(decode("bits", ""), Value::Int(0));
        assert_eq!(decode("room-id", "-9223372036854775808"), Value::Int(i64::MIN));
        assert_eq!(decode("room-id", "9223372036854775807"), Value::Int(i64::MAX));
        assert_eq!(
            decode("tmi-sent-ts", "1642715756806"),
            Value::Uint(1_642_715_756_806)
        );
    }

    #[test]
    fn colors() {
        assert_eq!(decode("color", "#FF0000"), Value::Color(Some(0xFF0000)));
        assert_eq!(decode("color", "#1e90ff"), Value::Color(Some(0x1E90FF)));
        assert_eq!(decode("color", ""), Value::Color(None));
        assert_eq!(decode("color", "#"), Value::Color(None));
    }

    #[test]
    fn booleans() {
        assert_eq!(decode("msg-param-was-gifted", "true"), Value::Bool(true));
        assert_eq!(decode("msg-param-was-gifted", "false"), Value::Bool(false));
        assert_eq!(decode("msg-param-was-gifted", "1"), Value::Bool(true));
    }

    #[test]
    fn lists() {
        assert_eq!(
            decode("emote-sets", "0,33,50,237"),
            Value::List(vec!["0".into(), "33".into(), "50".into(), "237".into()])
        );
        assert_eq!(decode("emote-sets", ""), Value::List(vec!["".into()]));
    }

    #[test]
    fn escaped_strings() {
        assert_eq!(decode("display-name", r"as\sas"), Value::Str("as as".into()));
        assert_eq!(
            decode("system-msg", r"a\:b\\c\rd\ne"),
            Value::Str("a;b\\c\rd\ne".into())
        );
        assert_eq!(decode("system-msg", r"unknown\qescape"), Value::Str("unknownqescape".into()));
        assert_eq!(decode("system-msg", "dangling\\"), Value::Str("dangling".into()));
    }

    #[test]
    fn raw_and_unknown() {
        assert_eq!(decode("msg-id", r"a\sb"), Value::Str(r"a\sb".into()));
        assert_eq!(decode("some-new-tag", r"a\sb"), Value::Str("a b".into()));
        assert_eq!(decode("some-new-tag", "plain"), Value::Str("plain".into()));
    }

    #[test]
    fn stops_at_delimiters() {
        let (value, used) = decode_tag("display-name", b"museun;color=#FFFFFF", Mode::Borrowed);
        assert_eq!(value, Value::Str("museun".into()));
        assert_eq!(used, 6);

        let (value, used) = decode_tag("mod", b"1 :tmi.twitch.tv", Mode::Borrowed);
        assert_eq!(value, Value::Int(1));
        assert_eq!(used, 1);
    }

    #[test]
    fn borrowed_mode_does_not_copy() {
        let (value, _) = decode_tag("msg-id", b"ban_success", Mode::Borrowed);
        assert!(matches!(value, Value::Str(Cow::Borrowed("ban_success"))));

        let (value, _) = decode_tag("msg-id", b"ban_success", Mode::Copied);
        assert!(matches!(value, Value::Str(Cow::Owned(..))));
    }
}
