//! Decoding for Twitch's IRC dialect.
//!
//! Lines are decoded in a single forward pass. Text either borrows from the
//! frame ([`Mode::Borrowed`]) or is copied out of it ([`Mode::Copied`]).
//!
//! ```
//! let (msg, rest) = tmi_parser::decode(b"@badge-info=subscriber/63 :tmi.twitch.tv USERSTATE #museun\r\n");
//! assert_eq!(msg.command, tmi_parser::Command::UserState);
//! assert_eq!(msg.channel(), Some("museun"));
//! assert!(rest.is_none());
//! ```

pub mod badges;
pub use badges::{Badge, BadgeInfo, BadgeMap, COMPOUND_BADGES};

mod command;
pub use command::Command;

mod cursor;
pub use cursor::Cursor;

mod decoder;
pub use decoder::{decode, Decoder, Mode};

mod message;
pub use message::Message;

mod reassembler;
pub use reassembler::{Overflow, Reassembler, CARRY_CAPACITY};

mod tags;
pub use tags::{decode_tag, unescape, Kind, Tag, Tags, Value};
