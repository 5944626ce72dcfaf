use std::borrow::Cow;

use crate::{
    cursor::{accumulate, Cursor},
    tags::{is_tag_end, owned, unescape},
    Mode,
};

/// Badges whose values aren't plain tiers.
///
/// In `badges` these carry `<variant>-<tier>`, in `badge-info` free-form
/// escaped text.
pub const COMPOUND_BADGES: &[&str] = &["predictions"];

pub fn is_compound(name: &[u8]) -> bool {
    COMPOUND_BADGES.iter().any(|c| c.as_bytes() == name)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Badge<'a> {
    Tier(u64),
    Variant { variant: Cow<'a, str>, tier: u64 },
}

impl<'a> Badge<'a> {
    pub const fn tier(&self) -> u64 {
        match *self {
            Self::Tier(tier) | Self::Variant { tier, .. } => tier,
        }
    }

    fn into_owned(self) -> Badge<'static> {
        match self {
            Self::Tier(tier) => Badge::Tier(tier),
            Self::Variant { variant, tier } => Badge::Variant {
                variant: owned(variant),
                tier,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BadgeInfo<'a> {
    Tier(u64),
    Text(Cow<'a, str>),
}

impl<'a> BadgeInfo<'a> {
    fn into_owned(self) -> BadgeInfo<'static> {
        match self {
            Self::Tier(tier) => BadgeInfo::Tier(tier),
            Self::Text(text) => BadgeInfo::Text(owned(text)),
        }
    }
}

/// An ordered `name -> value` list. Badge lists are short, so lookups are linear.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BadgeMap<'a, V>(Vec<(Cow<'a, str>, V)>);

impl<'a, V> Default for BadgeMap<'a, V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<'a, V> BadgeMap<'a, V> {
    pub fn get(&self, name: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> + '_ {
        self.0.iter().map(|(k, v)| (&**k, v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> BadgeMap<'a, Badge<'a>> {
    pub(crate) fn into_owned(self) -> BadgeMap<'static, Badge<'static>> {
        BadgeMap(
            self.0
                .into_iter()
                .map(|(k, v)| (owned(k), v.into_owned()))
                .collect(),
        )
    }
}

impl<'a> BadgeMap<'a, BadgeInfo<'a>> {
    pub(crate) fn into_owned(self) -> BadgeMap<'static, BadgeInfo<'static>> {
        BadgeMap(
            self.0
                .into_iter()
                .map(|(k, v)| (owned(k), v.into_owned()))
                .collect(),
        )
    }
}

fn is_entry_end(b: u8) -> bool {
    b == b',' || is_tag_end(b)
}

fn entries<'a, V>(
    cur: &mut Cursor<'a>,
    mode: Mode,
    mut value: impl FnMut(&[u8], &mut Cursor<'a>) -> V,
) -> BadgeMap<'a, V> {
    let mut map = BadgeMap::default();
    loop {
        let name = cur.take_until(|b| b == b'/' || is_entry_end(b));
        if cur.eat(b'/') {
            let v = value(name, cur);
            map.0.push((mode.text(name), v));
        }
        if !cur.eat(b',') {
            break map;
        }
    }
}

pub(crate) fn decode_badges<'a>(cur: &mut Cursor<'a>, mode: Mode) -> BadgeMap<'a, Badge<'a>> {
    entries(cur, mode, |name, cur| {
        if !is_compound(name) {
            return Badge::Tier(accumulate(cur.take_until(is_entry_end)));
        }
        let variant = mode.text(cur.take_until(|b| b == b'-' || is_entry_end(b)));
        cur.eat(b'-');
        let tier = accumulate(cur.take_until(is_entry_end));
        Badge::Variant { variant, tier }
    })
}

pub(crate) fn decode_badge_info<'a>(
    cur: &mut Cursor<'a>,
    mode: Mode,
) -> BadgeMap<'a, BadgeInfo<'a>> {
    entries(cur, mode, |name, cur| {
        let raw = cur.take_until(is_entry_end);
        if is_compound(name) {
            BadgeInfo::Text(unescape(raw, mode))
        } else {
            BadgeInfo::Tier(accumulate(raw))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_badges() {
        let mut cur = Cursor::new(b"broadcaster/1,subscriber/3012,glhf-pledge/1;color=");
        let badges = decode_badges(&mut cur, Mode::Borrowed);
        assert_eq!(badges.len(), 3);
        assert_eq!(badges.get("broadcaster"), Some(&Badge::Tier(1)));
        assert_eq!(badges.get("subscriber").map(Badge::tier), Some(3012));
        assert_eq!(badges.get("glhf-pledge"), Some(&Badge::Tier(1)));
        assert_eq!(cur.peek(), Some(b';'));
    }

    #[test]
    fn compound_badges() {
        let mut cur = Cursor::new(b"predictions/blue-1,vip/1 ");
        let badges = decode_badges(&mut cur, Mode::Borrowed);
        assert_eq!(
            badges.get("predictions"),
            Some(&Badge::Variant {
                variant: "blue".into(),
                tier: 1
            })
        );
        assert_eq!(badges.get("vip"), Some(&Badge::Tier(1)));
    }

    #[test]
    fn badge_info() {
        let mut cur = Cursor::new(b"subscriber/63");
        let info = decode_badge_info(&mut cur, Mode::Borrowed);
        assert_eq!(info.get("subscriber"), Some(&BadgeInfo::Tier(63)));

        let mut cur = Cursor::new(br"predictions/Will\sit\swork?,subscriber/2;");
        let info = decode_badge_info(&mut cur, Mode::Borrowed);
        assert_eq!(
            info.get("predictions"),
            Some(&BadgeInfo::Text("Will it work?".into()))
        );
        assert_eq!(info.get("subscriber"), Some(&BadgeInfo::Tier(2)));
    }

    #[test]
    fn empty() {
        let mut cur = Cursor::new(b";");
        assert!(decode_badges(&mut cur, Mode::Borrowed).is_empty());
    }
}
