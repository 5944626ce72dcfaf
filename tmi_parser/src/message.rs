use std::borrow::Cow;

use crate::{
    tags::{owned, Tags},
    Command,
};

/// One decoded protocol line.
///
/// Only the fields the command's layout carries are set; everything else is
/// left at its default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message<'a> {
    pub command: Command,
    /// The verb as sent, kept only for [`Command::Unknown`].
    pub raw_command: Option<Cow<'a, str>>,
    pub tags: Tags<'a>,
    /// Channel name without the leading `#`. For `WHISPER` this is the recipient.
    pub channel: Option<Cow<'a, str>>,
    pub login: Option<Cow<'a, str>>,
    pub message: Option<Cow<'a, str>>,
    /// `PRIVMSG` sent with `/me`.
    pub action: bool,
    /// Moderator or VIP list from a `NOTICE`.
    pub users: Option<Vec<Cow<'a, str>>>,
    /// `353` names listing.
    pub members: Option<Vec<Cow<'a, str>>>,
    pub capabilities: Option<Vec<Cow<'a, str>>>,
    /// The command a `421` complains about.
    pub failed: Option<Cow<'a, str>>,
    pub hosting: Option<Cow<'a, str>>,
    pub viewers: Option<u64>,
}

impl<'a> Message<'a> {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            raw_command: None,
            tags: Tags::default(),
            channel: None,
            login: None,
            message: None,
            action: false,
            users: None,
            members: None,
            capabilities: None,
            failed: None,
            hosting: None,
            viewers: None,
        }
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn login(&self) -> Option<&str> {
        self.login.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn msg_id(&self) -> Option<&str> {
        self.tags.get_str("msg-id")
    }

    pub fn into_owned(self) -> Message<'static> {
        fn list(list: Option<Vec<Cow<'_, str>>>) -> Option<Vec<Cow<'static, str>>> {
            list.map(|list| list.into_iter().map(owned).collect())
        }

        Message {
            command: self.command,
            raw_command: self.raw_command.map(owned),
            tags: self.tags.into_owned(),
            channel: self.channel.map(owned),
            login: self.login.map(owned),
            message: self.message.map(owned),
            action: self.action,
            users: list(self.users),
            members: list(self.members),
            capabilities: list(self.capabilities),
            failed: self.failed.map(owned),
            hosting: self.hosting.map(owned),
            viewers: self.viewers,
        }
    }
}
