//! Line/column tracking over a byte-producing stream.

use std::fmt;
use std::io::{self, Read};

use crate::error::Error;

/// A 1-based line, 0-based column pair identifying a byte in the input.
///
/// Column `0` means "just after the preceding newline, no bytes consumed on
/// this line yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// 1-based line number.
    pub line: u32,
    /// 0-based column within that line.
    pub column: u32,
}

impl Position {
    /// The position of the first byte of a fresh stream.
    pub const START: Position = Position { line: 1, column: 0 };
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Wraps an opaque byte-producing stream, yielding one byte at a time while
/// tracking [`Position`].
///
/// A newline is `\r`, or `\n` not preceded by `\r`; CRLF therefore advances
/// the line counter once, on the `\r`.
pub struct ByteSource<R> {
    inner: R,
    pos: Position,
    last_was_cr: bool,
}

impl<R: Read> ByteSource<R> {
    /// Wraps `inner`, starting position tracking at [`Position::START`].
    pub fn new(inner: R) -> Self {
        ByteSource {
            inner,
            pos: Position::START,
            last_was_cr: false,
        }
    }

    /// Position of the byte most recently returned by [`next_byte`](Self::next_byte).
    pub fn position(&self) -> Position {
        self.pos
    }

    /// Produces the next byte, or `None` at end of stream.
    pub fn next_byte(&mut self) -> Result<Option<u8>, Error> {
        let mut buf = [0u8; 1];
        loop {
            return match self.inner.read(&mut buf) {
                Ok(0) => Ok(None),
                Ok(_) => {
                    self.advance(buf[0]);
                    Ok(Some(buf[0]))
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => Err(Error::ReadFailed(self.pos, e.to_string())),
            };
        }
    }

    fn advance(&mut self, byte: u8) {
        let is_newline = byte == b'\r' || (byte == b'\n' && !self.last_was_cr);
        if is_newline {
            self.pos.line += 1;
            self.pos.column = 0;
        } else {
            self.pos.column += 1;
        }
        self.last_was_cr = byte == b'\r';
    }
}
