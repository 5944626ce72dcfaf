use std::time::Duration;

use crate::Error;

/// Chat commands sent as `PRIVMSG #channel :.<command> [args]`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Moderation {
    Followers,
    FollowersOff,
    Slow,
    SlowOff,
    Subscribers,
    SubscribersOff,
    UniqueChat,
    UniqueChatOff,
    EmoteOnly,
    EmoteOnlyOff,
    Delete,
    Ban,
    Unban,
    Timeout,
    Untimeout,
    Color,
    Mod,
    Unmod,
    Vip,
    Unvip,
    Mods,
    Vips,
    Raid,
    Unraid,
    Whisper,
    Announce,
    Clear,
}

/// How a `NOTICE` settles a pending command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail,
    Permission,
    Usage,
    Users,
    Unrecognized,
}

impl Outcome {
    /// Turns a classified notice into the command's result.
    pub fn settle(self, message: &str, users: Option<Vec<String>>) -> Result<Option<Vec<String>>, Error> {
        match self {
            Self::Pass => Ok(None),
            Self::Users => Ok(Some(users.unwrap_or_default())),
            Self::Fail => Err(Error::Failed(message.to_string())),
            Self::Permission => Err(Error::Permission(message.to_string())),
            Self::Usage => Err(Error::Usage(message.to_string())),
            Self::Unrecognized => Err(Error::Unrecognized(message.to_string())),
        }
    }
}

impl Moderation {
    pub const ALL: [Self; 27] = [
        Self::Followers,
        Self::FollowersOff,
        Self::Slow,
        Self::SlowOff,
        Self::Subscribers,
        Self::SubscribersOff,
        Self::UniqueChat,
        Self::UniqueChatOff,
        Self::EmoteOnly,
        Self::EmoteOnlyOff,
        Self::Delete,
        Self::Ban,
        Self::Unban,
        Self::Timeout,
        Self::Untimeout,
        Self::Color,
        Self::Mod,
        Self::Unmod,
        Self::Vip,
        Self::Unvip,
        Self::Mods,
        Self::Vips,
        Self::Raid,
        Self::Unraid,
        Self::Whisper,
        Self::Announce,
        Self::Clear,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Followers => "followers",
            Self::FollowersOff => "followersoff",
            Self::Slow => "slow",
            Self::SlowOff => "slowoff",
            Self::Subscribers => "subscribers",
            Self::SubscribersOff => "subscribersoff",
            Self::UniqueChat => "uniquechat",
            Self::UniqueChatOff => "uniquechatoff",
            Self::EmoteOnly => "emoteonly",
            Self::EmoteOnlyOff => "emoteonlyoff",
            Self::Delete => "delete",
            Self::Ban => "ban",
            Self::Unban => "unban",
            Self::Timeout => "timeout",
            Self::Untimeout => "untimeout",
            Self::Color => "color",
            Self::Mod => "mod",
            Self::Unmod => "unmod",
            Self::Vip => "vip",
            Self::Unvip => "unvip",
            Self::Mods => "mods",
            Self::Vips => "vips",
            Self::Raid => "raid",
            Self::Unraid => "unraid",
            Self::Whisper => "w",
            Self::Announce => "announce",
            Self::Clear => "clear",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.strip_prefix('.').unwrap_or(name);
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Twitch only answers some commands when they're sent twice.
    pub const fn repeat(&self) -> usize {
        match self {
            Self::Slow
            | Self::SlowOff
            | Self::Subscribers
            | Self::SubscribersOff
            | Self::UniqueChat
            | Self::UniqueChatOff
            | Self::EmoteOnly
            | Self::EmoteOnlyOff
            | Self::Raid
            | Self::Unraid => 2,
            _ => 1,
        }
    }

    /// How long a passing command waits before it resolves.
    pub const fn delay(&self) -> Duration {
        match self {
            Self::Color => Duration::from_secs(1),
            _ => Duration::ZERO,
        }
    }

    /// The chat line for this command.
    pub fn line(&self, args: &str) -> String {
        let args = args.trim();
        if args.is_empty() {
            format!(".{}", self.name())
        } else {
            format!(".{} {args}", self.name())
        }
    }

    pub fn classify(&self, msg_id: &str) -> Option<Outcome> {
        use Outcome::*;

        if msg_id == "unrecognized_cmd" {
            return Some(Unrecognized);
        }

        let outcome = match (self, msg_id) {
            (Self::Followers, "followers_on_zero" | "already_followers_on") => Pass,
            (Self::FollowersOff, "followers_off" | "already_followers_off") => Pass,
            (Self::Slow, "slow_on" | "already_slow_on") => Pass,
            (Self::SlowOff, "slow_off" | "already_slow_off") => Pass,
            (Self::Subscribers, "subs_on" | "already_subs_on") => Pass,
            (Self::SubscribersOff, "subs_off" | "already_subs_off") => Pass,
            (Self::UniqueChat, "r9k_on" | "already_r9k_on") => Pass,
            (Self::UniqueChatOff, "r9k_off" | "already_r9k_off") => Pass,
            (Self::EmoteOnly, "emote_only_on" | "already_emote_only_on") => Pass,
            (Self::EmoteOnlyOff, "emote_only_off" | "already_emote_only_off") => Pass,

            (Self::Delete, "delete_message_success") => Pass,
            (Self::Delete, "delete_chat_message_not_found") => Fail,
            (Self::Delete, "usage_delete") => Usage,

            (Self::Ban, "already_banned" | "ban_success") => Pass,
            (
                Self::Ban,
                "bad_ban_broadcaster"
                | "bad_ban_mod"
                | "bad_ban_self"
                | "bad_ban_staff"
                | "bad_unban_no_ban"
                | "bad_ban_admin"
                | "bad_ban_anon",
            ) => Fail,
            (Self::Ban, "usage_ban") => Usage,

            (Self::Unban, "unban_success" | "bad_unban_no_ban") => Pass,
            (Self::Unban, "usage_unban") => Usage,

            (Self::Timeout, "timeout_success") => Pass,
            (
                Self::Timeout,
                "bad_timeout_anon"
                | "bad_timeout_mod"
                | "bad_timeout_staff"
                | "bad_timeout_broadcaster"
                | "bad_timeout_self"
                | "bad_timeout_admin"
                | "bad_timeout_duration",
            ) => Fail,
            (Self::Timeout, "usage_timeout") => Usage,

            (Self::Untimeout, "untimeout_success" | "timeout_no_timeout") => Pass,
            (Self::Untimeout, "usage_untimeout") => Usage,

            (Self::Color, "color_changed") => Pass,
            (Self::Color, "turbo_only_color") => Fail,
            (Self::Color, "usage_color") => Usage,

            (Self::Mod, "mod_success" | "bad_mod_mod") => Pass,
            (Self::Mod, "bad_mod_banned") => Fail,
            (Self::Mod, "mod_usage") => Usage,

            (Self::Unmod, "unmod_success" | "bad_unmod_mod") => Pass,
            (Self::Unmod, "unmod_usage") => Usage,

            (Self::Vip, "vip_success" | "bad_vip_grantee_already_vip") => Pass,
            (Self::Vip, "bad_vip_grantee_banned" | "bad_vip_max_vips_reached") => Fail,
            (Self::Vip, "vip_usage") => Usage,

            (Self::Unvip, "unvip_success" | "bad_unvip_grantee_not_vip") => Pass,
            (Self::Unvip, "unvip_usage") => Usage,

            (Self::Mods, "room_mods" | "no_mods") => Users,
            (Self::Vips, "vips_success" | "no_vips") => Users,

            (
                Self::Raid,
                "raid_error_already_raiding" | "raid_notice_mature" | "raid_notice_restricted_chat",
            ) => Pass,
            (Self::Raid, "raid_error_self" | "raid_error_forbidden") => Fail,
            (Self::Raid, "usage_raid") => Usage,

            (Self::Unraid, "unraid_success" | "unraid_error_no_active_raid") => Pass,
            (Self::Unraid, "unraid_error_unexpected") => Fail,

            (
                Self::Whisper,
                "whisper_restricted"
                | "whisper_banned_recipient"
                | "whisper_limit_per_min"
                | "whisper_limit_per_sec"
                | "whisper_restricted_recipient"
                | "whisper_invalid_login"
                | "usage_whisper"
                | "whisper_banned"
                | "whisper_invalid_args"
                | "whisper_invalid_self",
            ) => Fail,

            (Self::Announce, "usage_announce") => Fail,

            (
                Self::Followers
                | Self::FollowersOff
                | Self::Slow
                | Self::SlowOff
                | Self::Subscribers
                | Self::SubscribersOff
                | Self::UniqueChat
                | Self::UniqueChatOff
                | Self::EmoteOnly
                | Self::EmoteOnlyOff
                | Self::Delete
                | Self::Ban
                | Self::Unban
                | Self::Timeout
                | Self::Untimeout
                | Self::Mod
                | Self::Unmod
                | Self::Vip
                | Self::Unvip
                | Self::Announce
                | Self::Clear,
                "no_permission",
            ) => Permission,

            _ => return None,
        };
        Some(outcome)
    }
}

impl std::fmt::Display for Moderation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A chat color, rendered as `#RRGGBB`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Color(pub u32);

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:06X}", self.0 & 0x00FF_FFFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ban_notices() {
        assert_eq!(Moderation::Ban.classify("ban_success"), Some(Outcome::Pass));
        assert_eq!(Moderation::Ban.classify("bad_ban_self"), Some(Outcome::Fail));
        assert_eq!(Moderation::Ban.classify("no_permission"), Some(Outcome::Permission));
        assert_eq!(Moderation::Ban.classify("usage_ban"), Some(Outcome::Usage));
        assert_eq!(Moderation::Ban.classify("slow_on"), None);
    }

    #[test]
    fn every_command_knows_unrecognized() {
        for cmd in Moderation::ALL {
            assert_eq!(cmd.classify("unrecognized_cmd"), Some(Outcome::Unrecognized), "{cmd}");
            assert_eq!(Moderation::from_name(cmd.name()), Some(cmd));
        }
    }

    #[test]
    fn lists_and_whispers() {
        assert_eq!(Moderation::Mods.classify("no_mods"), Some(Outcome::Users));
        assert_eq!(Moderation::Vips.classify("vips_success"), Some(Outcome::Users));
        assert_eq!(Moderation::Mods.classify("no_permission"), None);
        assert_eq!(Moderation::Whisper.classify("whisper_invalid_self"), Some(Outcome::Fail));
        assert_eq!(Moderation::Color.classify("no_permission"), None);
    }

    #[test]
    fn lines() {
        assert_eq!(Moderation::Ban.line("spammer  "), ".ban spammer");
        assert_eq!(Moderation::Slow.line(""), ".slow");
        assert_eq!(Moderation::Whisper.line("museun hi there"), ".w museun hi there");
        assert_eq!(Moderation::from_name(".timeout"), Some(Moderation::Timeout));
        assert_eq!(Moderation::Raid.repeat(), 2);
        assert_eq!(Moderation::Ban.repeat(), 1);
        assert_eq!(Moderation::Color.delay(), Duration::from_secs(1));
    }

    #[test]
    fn colors() {
        assert_eq!(Color(0x1E90FF).to_string(), "#1E90FF");
        assert_eq!(Color(0xFF).to_string(), "#0000FF");
    }

    #[test]
    fn settle() {
        assert!(matches!(
            Outcome::Usage.settle("Usage: \"/ban <username> [reason]\"", None),
            Err(Error::Usage(..))
        ));
        assert_eq!(
            Outcome::Users.settle("", Some(vec!["a".into()])).unwrap(),
            Some(vec!["a".to_string()])
        );
        assert_eq!(Outcome::Pass.settle("", None).unwrap(), None);
    }
}
