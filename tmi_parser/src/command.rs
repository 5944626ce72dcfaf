#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    /// `001`
    Welcome,
    /// `002`
    YourHost,
    /// `003`
    Created,
    /// `004`
    MyInfo,
    /// `372`
    Motd,
    /// `375`
    MotdStart,
    /// `376`
    EndOfMotd,
    /// `353`
    NamesReply,
    /// `366`
    EndOfNames,
    /// `410`
    InvalidCap,
    /// `421`
    UnknownCommand,
    Notice,
    Ping,
    Pong,
    CapAck,
    CapNak,
    CapLs,
    Join,
    Part,
    Privmsg,
    Whisper,
    UserNotice,
    UserState,
    RoomState,
    GlobalUserState,
    ClearChat,
    ClearMsg,
    HostTarget,
    Reconnect,
    Unknown,
}

impl Command {
    pub fn from_verb(verb: &[u8]) -> Self {
        match verb {
            b"001" => Self::Welcome,
            b"002" => Self::YourHost,
            b"003" => Self::Created,
            b"004" => Self::MyInfo,
            b"372" => Self::Motd,
            b"375" => Self::MotdStart,
            b"376" => Self::EndOfMotd,
            b"353" => Self::NamesReply,
            b"366" => Self::EndOfNames,
            b"410" => Self::InvalidCap,
            b"421" => Self::UnknownCommand,
            b"NOTICE" => Self::Notice,
            b"PING" => Self::Ping,
            b"PONG" => Self::Pong,
            b"JOIN" => Self::Join,
            b"PART" => Self::Part,
            b"PRIVMSG" => Self::Privmsg,
            b"WHISPER" => Self::Whisper,
            b"USERNOTICE" => Self::UserNotice,
            b"USERSTATE" => Self::UserState,
            b"ROOMSTATE" => Self::RoomState,
            b"GLOBALUSERSTATE" => Self::GlobalUserState,
            b"CLEARCHAT" => Self::ClearChat,
            b"CLEARMSG" => Self::ClearMsg,
            b"HOSTTARGET" => Self::HostTarget,
            b"RECONNECT" => Self::Reconnect,
            _ => Self::Unknown,
        }
    }

    pub(crate) fn from_cap(sub: &[u8]) -> Self {
        match sub {
            b"ACK" => Self::CapAck,
            b"NAK" => Self::CapNak,
            b"LS" => Self::CapLs,
            _ => Self::Unknown,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Welcome => "001",
            Self::YourHost => "002",
            Self::Created => "003",
            Self::MyInfo => "004",
            Self::Motd => "372",
            Self::MotdStart => "375",
            Self::EndOfMotd => "376",
            Self::NamesReply => "353",
            Self::EndOfNames => "366",
            Self::InvalidCap => "410",
            Self::UnknownCommand => "421",
            Self::Notice => "NOTICE",
            Self::Ping => "PING",
            Self::Pong => "PONG",
            Self::CapAck => "CAP * ACK",
            Self::CapNak => "CAP * NAK",
            Self::CapLs => "CAP * LS",
            Self::Join => "JOIN",
            Self::Part => "PART",
            Self::Privmsg => "PRIVMSG",
            Self::Whisper => "WHISPER",
            Self::UserNotice => "USERNOTICE",
            Self::UserState => "USERSTATE",
            Self::RoomState => "ROOMSTATE",
            Self::GlobalUserState => "GLOBALUSERSTATE",
            Self::ClearChat => "CLEARCHAT",
            Self::ClearMsg => "CLEARMSG",
            Self::HostTarget => "HOSTTARGET",
            Self::Reconnect => "RECONNECT",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// The numeric replies sent during registration share one layout.
    pub const fn is_greeting(&self) -> bool {
        matches!(
            self,
            Self::Welcome
                | Self::YourHost
                | Self::Created
                | Self::MyInfo
                | Self::Motd
                | Self::MotdStart
                | Self::EndOfMotd
        )
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
