/// A bounds-checked position in a frame.
///
/// Every scan stops at the end of the current line (`\r` or `\n`) unless it is
/// explicitly asked to skip over it, so a multi-line buffer is never read past
/// the line being decoded.
#[derive(Copy, Clone, Debug)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub const fn pos(&self) -> usize {
        self.pos
    }

    pub fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    pub fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    pub fn eat(&mut self, expected: u8) -> bool {
        let ok = self.peek() == Some(expected);
        self.pos += ok as usize;
        ok
    }

    pub fn eat_slice(&mut self, expected: &[u8]) -> bool {
        let ok = self.rest().starts_with(expected);
        if ok {
            self.pos += expected.len();
        }
        ok
    }

    pub fn at_eol(&self) -> bool {
        self.peek().map_or(true, is_eol)
    }

    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos.min(self.buf.len())..]
    }

    /// Consumes bytes up to (not including) the first byte matching `stop`,
    /// or the end of the line.
    pub fn take_until(&mut self, stop: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if stop(b) || is_eol(b) {
                break;
            }
            self.pos += 1;
        }
        &self.buf[start..self.pos]
    }

    pub fn take_word(&mut self) -> &'a [u8] {
        self.take_until(|b| b == b' ')
    }

    pub fn take_line(&mut self) -> &'a [u8] {
        self.take_until(|_| false)
    }

    pub fn skip_spaces(&mut self) {
        while self.eat(b' ') {}
    }

    /// Skips the current word and the spaces after it.
    pub fn skip_word(&mut self) {
        self.take_word();
        self.skip_spaces();
    }

    /// Moves past the end of the current line, returning whatever follows it.
    pub fn finish_line(mut self) -> Option<&'a [u8]> {
        self.take_line();
        self.eat(b'\r');
        self.eat(b'\n');
        Some(self.rest()).filter(|rest| !rest.is_empty())
    }
}

pub const fn is_eol(b: u8) -> bool {
    matches!(b, b'\r' | b'\n')
}

/// Accumulates ASCII digits, ignoring anything else.
pub fn accumulate(digits: &[u8]) -> u64 {
    digits
        .iter()
        .filter(|b| b.is_ascii_digit())
        .fold(0u64, |acc, b| acc.wrapping_mul(10).wrapping_add((b - b'0') as u64))
}
