use crate::{Decoder, Message, Mode};

/// The most bytes an incomplete line may occupy before it's considered garbage.
pub const CARRY_CAPACITY: usize = 30_000;

#[derive(Debug, thiserror::Error)]
#[error("incomplete line exceeded {CARRY_CAPACITY} bytes ({size} buffered)")]
pub struct Overflow {
    pub size: usize,
}

/// Turns arbitrarily split socket reads into whole lines.
///
/// Every complete line of a read is decoded right away. Only the bytes after
/// the last `\n` are held back, and those count against [`CARRY_CAPACITY`].
#[derive(Debug)]
pub struct Reassembler {
    decoder: Decoder,
    carry: Vec<u8>,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(Mode::default())
    }
}

impl Reassembler {
    pub fn new(mode: Mode) -> Self {
        Self {
            decoder: Decoder::new(mode),
            carry: Vec::new(),
        }
    }

    /// Bytes currently held back waiting for a line terminator.
    pub fn pending(&self) -> usize {
        self.carry.len()
    }

    /// Feeds one read, calling `each` for every line it completes.
    ///
    /// On overflow the held back bytes are discarded, so the next complete
    /// read starts clean. Lines completed by this read are still delivered.
    pub fn feed(
        &mut self,
        chunk: &[u8],
        mut each: impl FnMut(Message<'_>),
    ) -> Result<usize, Overflow> {
        let split = chunk.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
        let (lines, rest) = chunk.split_at(split);

        let mut count = 0;
        if !lines.is_empty() {
            if self.carry.is_empty() {
                count = self.decoder.decode_all(lines, |msg| each(msg));
            } else {
                self.carry.extend_from_slice(lines);
                count = self.decoder.decode_all(&self.carry, |msg| each(msg));
                self.carry.clear();
            }
        }

        let size = self.carry.len() + rest.len();
        if size > CARRY_CAPACITY {
            log::warn!(target: "tmi::parser", "dropping {size} bytes without a line ending");
            self.carry = Vec::new();
            return Err(Overflow { size });
        }

        self.carry.extend_from_slice(rest);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Command;

    fn commands(re: &mut Reassembler, chunk: &[u8]) -> Vec<Command> {
        let mut out = Vec::new();
        re.feed(chunk, |msg| out.push(msg.command)).unwrap();
        out
    }

    #[test]
    fn whole_lines_pass_straight_through() {
        let mut re = Reassembler::default();
        assert_eq!(
            commands(&mut re, b"PING :tmi.twitch.tv\r\nRECONNECT\r\n"),
            [Command::Ping, Command::Reconnect]
        );
        assert_eq!(re.pending(), 0);
    }

    #[test]
    fn split_lines_are_joined() {
        let mut re = Reassembler::default();
        assert!(commands(&mut re, b":tmi.twitch.tv PO").is_empty());
        assert!(commands(&mut re, b"NG tmi.twitch.tv :1").is_empty());
        assert_eq!(re.pending(), 36);
        assert_eq!(
            commands(&mut re, b"23\r\nPING :tmi.twitch.tv\r\n"),
            [Command::Pong, Command::Ping]
        );
        assert_eq!(re.pending(), 0);
    }

    #[test]
    fn split_between_cr_and_lf() {
        let mut re = Reassembler::default();
        assert!(commands(&mut re, b"RECONNECT\r").is_empty());
        assert_eq!(commands(&mut re, b"\n"), [Command::Reconnect]);
    }

    #[test]
    fn overflow_discards_carry() {
        let mut re = Reassembler::default();
        let junk = vec![b'a'; CARRY_CAPACITY];
        assert!(commands(&mut re, &junk).is_empty());

        let err = re.feed(b"b", |_| {}).unwrap_err();
        assert_eq!(err.size, CARRY_CAPACITY + 1);
        assert_eq!(re.pending(), 0);

        assert_eq!(commands(&mut re, b"RECONNECT\r\n"), [Command::Reconnect]);
    }

    #[test]
    fn long_streams_in_read_sized_chunks() {
        let line = b":tmi.twitch.tv PONG tmi.twitch.tv :1\r\n";
        let stream = line.repeat(1100);
        assert!(stream.len() > CARRY_CAPACITY);

        let mut re = Reassembler::new(Mode::Copied);
        let mut pongs = 0;
        let mut total = 0;
        for chunk in stream.chunks(16 * 1024) {
            total += re
                .feed(chunk, |msg| {
                    assert_eq!(msg.command, Command::Pong);
                    assert_eq!(msg.message(), Some("1"));
                    pongs += 1;
                })
                .unwrap();
            assert!(re.pending() < line.len());
        }
        assert_eq!(pongs, 1100);
        assert_eq!(total, 1100);
        assert_eq!(re.pending(), 0);
    }
}
