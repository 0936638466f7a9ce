//! A growable character buffer over an input source with unbounded
//! look-ahead.
//!
//! `ReaderBuffer` is the base of every matcher in this crate: `peek` never
//! consumes, `read` always does, and both keep `line`/`column` consistent so
//! that every error raised downstream can point at an exact source position.

use crate::error::Position;
use std::io;

/// Grows in 1024-char blocks; a block must be fully consumed (minus the
/// look-behind floor) before the front of the buffer is ever discarded.
const BLOCK_SIZE: usize = 1024;

/// Characters behind the cursor are never discarded closer than this, so
/// lexer rules that need to look behind the current position (none in this
/// crate today, but the buffer makes no assumption about its callers) stay
/// valid.
const LOOK_BEHIND: usize = 16;

/// A source of characters, decoupled from `std::io::Read` so that both byte
/// streams and in-memory strings can feed a `ReaderBuffer` without an extra
/// copy.
pub trait CharSource {
    /// Returns the next character, `Ok(None)` at end of stream, or an I/O
    /// error from the underlying source.
    fn next_char(&mut self) -> io::Result<Option<char>>;
}

/// A `CharSource` over an in-memory string. The common case in tests and for
/// callers that already have the whole input in memory.
pub struct StrSource<'a> {
    chars: std::str::Chars<'a>,
}

impl<'a> StrSource<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars(),
        }
    }
}

impl<'a> CharSource for StrSource<'a> {
    fn next_char(&mut self) -> io::Result<Option<char>> {
        Ok(self.chars.next())
    }
}

/// A `CharSource` over any `std::io::Read`, decoding UTF-8 one character at
/// a time as bytes arrive.
pub struct Utf8Source<R> {
    inner: R,
    pending: [u8; 4],
    pending_len: u8,
}

impl<R: io::Read> Utf8Source<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: [0; 4],
            pending_len: 0,
        }
    }
}

impl<R: io::Read> CharSource for Utf8Source<R> {
    fn next_char(&mut self) -> io::Result<Option<char>> {
        loop {
            if self.pending_len > 0 {
                let bytes = &self.pending[..self.pending_len as usize];
                match std::str::from_utf8(bytes) {
                    Ok(s) => return Ok(Some(self.take_one(s))),
                    Err(e) if e.valid_up_to() > 0 => {
                        let s = std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap();
                        return Ok(Some(self.take_one(s)));
                    }
                    Err(_) => { /* need more bytes before we can decode */ }
                }
            }
            if self.pending_len as usize == self.pending.len() {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "invalid utf-8"));
            }
            let mut byte = [0u8; 1];
            match self.inner.read(&mut byte)? {
                0 if self.pending_len > 0 => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "truncated utf-8 sequence",
                    ))
                }
                0 => return Ok(None),
                _ => {
                    self.pending[self.pending_len as usize] = byte[0];
                    self.pending_len += 1;
                }
            }
        }
    }
}

impl<R> Utf8Source<R> {
    fn take_one(&mut self, decoded: &str) -> char {
        let c = decoded.chars().next().expect("non-empty decode");
        let consumed = c.len_utf8();
        self.pending.copy_within(consumed..self.pending_len as usize, 0);
        self.pending_len -= consumed as u8;
        c
    }
}

/// A growable character buffer with unbounded look-ahead and line/column
/// tracking.
///
/// `peek(offset)` never advances the cursor; `read(n)` always does, and is
/// the only operation that moves `line`/`column`. Characters more than
/// [`LOOK_BEHIND`] behind the cursor may be discarded once a full block has
/// been consumed; this is purely an internal memory optimization and is
/// never observable through `peek`/`read`/`position`.
pub struct ReaderBuffer<S> {
    source: Option<S>,
    buf: Vec<char>,
    /// Index into `buf` of the next character to be read.
    pos: usize,
    /// Number of valid characters currently in `buf`.
    filled: usize,
    line: u32,
    column: u32,
    io_error: Option<String>,
}

impl<S: CharSource> ReaderBuffer<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Some(source),
            buf: Vec::with_capacity(BLOCK_SIZE),
            pos: 0,
            filled: 0,
            line: 1,
            column: 1,
            io_error: None,
        }
    }

    /// Rebinds this buffer to a new source, discarding all buffered state.
    /// Mirrors `Tokenizer::reset`, which calls through to this.
    pub fn reset(&mut self, source: S) {
        self.source = Some(source);
        self.buf.clear();
        self.pos = 0;
        self.filled = 0;
        self.line = 1;
        self.column = 1;
        self.io_error = None;
    }

    /// The current line/column of the cursor (1-indexed).
    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    /// Takes and clears any I/O error recorded while filling the buffer.
    /// Once recorded, the source is detached and further `peek`s behave as
    /// EOF (spec-mandated fail-closed behavior on read failure).
    pub fn take_io_error(&mut self) -> Option<String> {
        self.io_error.take()
    }

    /// Detaches the underlying source; subsequent reads see only whatever
    /// is already buffered, then EOF.
    pub fn dispose(&mut self) {
        self.source = None;
    }

    /// Looks `offset` characters ahead of the cursor without consuming
    /// anything. `peek(0)` is the next character that `read` would return.
    pub fn peek(&mut self, offset: usize) -> Option<char> {
        self.fill_to(self.pos + offset);
        self.buf.get(self.pos + offset).copied()
    }

    /// Consumes and returns up to `n` characters, advancing the cursor and
    /// updating `line`/`column`. Returns fewer than `n` characters at EOF.
    pub fn read(&mut self, n: usize) -> String {
        let mut out = String::with_capacity(n);
        for _ in 0..n {
            self.fill_to(self.pos);
            let Some(&c) = self.buf.get(self.pos) else {
                break;
            };
            out.push(c);
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.trim();
        out
    }

    /// Grows the buffer, one block at a time, until `index` is filled or the
    /// source is exhausted/failed.
    fn fill_to(&mut self, index: usize) {
        while self.filled <= index && self.source.is_some() {
            let mut read_this_block = 0usize;
            while read_this_block < BLOCK_SIZE {
                match self.source.as_mut().unwrap().next_char() {
                    Ok(Some(c)) => {
                        if self.filled == self.buf.len() {
                            self.buf.push(c);
                        } else {
                            self.buf[self.filled] = c;
                        }
                        self.filled += 1;
                        read_this_block += 1;
                        if self.filled > index {
                            break;
                        }
                    }
                    Ok(None) => {
                        self.source = None;
                        break;
                    }
                    Err(e) => {
                        self.io_error = Some(e.to_string());
                        self.source = None;
                        break;
                    }
                }
            }
            if read_this_block == 0 {
                break;
            }
        }
    }

    /// Discards characters more than `LOOK_BEHIND` behind the cursor, once a
    /// full block has been consumed. Block-aligned so this doesn't run on
    /// every single `read`.
    fn trim(&mut self) {
        if self.pos > BLOCK_SIZE {
            let drop = self.pos - LOOK_BEHIND;
            if drop > 0 {
                self.buf.drain(0..drop);
                self.pos -= drop;
                self.filled -= drop;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_does_not_consume() {
        let mut buf = ReaderBuffer::new(StrSource::new("abc"));
        assert_eq!(buf.peek(0), Some('a'));
        assert_eq!(buf.peek(1), Some('b'));
        assert_eq!(buf.peek(0), Some('a'));
        assert_eq!(buf.read(1), "a");
        assert_eq!(buf.peek(0), Some('b'));
    }

    #[test]
    fn peek_past_eof_is_none() {
        let mut buf = ReaderBuffer::new(StrSource::new("a"));
        assert_eq!(buf.peek(5), None);
        assert_eq!(buf.read(1), "a");
        assert_eq!(buf.peek(0), None);
    }

    #[test]
    fn read_tracks_line_and_column() {
        let mut buf = ReaderBuffer::new(StrSource::new("ab\ncd"));
        assert_eq!(buf.position(), Position::new(1, 1));
        buf.read(2);
        assert_eq!(buf.position(), Position::new(1, 3));
        buf.read(1); // consumes the \n
        assert_eq!(buf.position(), Position::new(2, 1));
        buf.read(2);
        assert_eq!(buf.position(), Position::new(2, 3));
    }

    #[test]
    fn carriage_return_is_not_special_cased() {
        // spec: CR is not special-cased, only \n increments line.
        let mut buf = ReaderBuffer::new(StrSource::new("a\rb"));
        buf.read(3);
        assert_eq!(buf.position(), Position::new(1, 4));
    }

    #[test]
    fn trim_is_not_observable_through_peek_and_read() {
        let long_input: String = std::iter::repeat('x').take(4096).collect();
        let mut buf = ReaderBuffer::new(StrSource::new(&long_input));
        for _ in 0..3000 {
            buf.read(1);
        }
        // Far-ahead look-ahead must still work after internal trimming.
        assert_eq!(buf.peek(50), Some('x'));
        assert_eq!(buf.position(), Position::new(1, 3001));
    }

    #[test]
    fn io_error_detaches_source_and_further_peeks_are_eof() {
        struct FailingSource {
            yielded: bool,
        }
        impl CharSource for FailingSource {
            fn next_char(&mut self) -> io::Result<Option<char>> {
                if !self.yielded {
                    self.yielded = true;
                    Ok(Some('a'))
                } else {
                    Err(io::Error::new(io::ErrorKind::Other, "boom"))
                }
            }
        }
        let mut buf = ReaderBuffer::new(FailingSource { yielded: false });
        assert_eq!(buf.read(1), "a");
        assert_eq!(buf.peek(0), None);
        assert!(buf.take_io_error().is_some());
        assert_eq!(buf.peek(0), None);
    }

    #[test]
    fn reset_clears_buffered_state() {
        let mut buf = ReaderBuffer::new(StrSource::new("abc"));
        buf.read(2);
        buf.reset(StrSource::new("xyz"));
        assert_eq!(buf.position(), Position::new(1, 1));
        assert_eq!(buf.read(3), "xyz");
    }
}
