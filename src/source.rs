// src/source.rs
//! Buffered byte source feeding the decoder.
//!
//! Wraps any `Read` with a fixed-capacity refill buffer. Unread bytes are
//! compacted to the front before each fill, so callers only ever see
//! "give me exactly N bytes" and "is anything left".

use std::io::{self, Read};

const BUFFER_SIZE: usize = 8 * 1024;
const MIN_CAPACITY: usize = 64;

pub struct ByteSource<R> {
    inner: R,
    buf: Vec<u8>,
    start: usize,
    end: usize,
    stream_done: bool,
}

impl<R: Read> ByteSource<R> {
    pub fn new(inner: R) -> Self {
        Self::with_capacity(BUFFER_SIZE, inner)
    }

    pub fn with_capacity(capacity: usize, inner: R) -> Self {
        ByteSource {
            inner,
            buf: vec![0; capacity.max(MIN_CAPACITY)],
            start: 0,
            end: 0,
            stream_done: false,
        }
    }

    #[inline]
    fn buffered(&self) -> usize {
        self.end - self.start
    }

    /// Compacts unread bytes to the front and fills the tail from the
    /// underlying stream. Returns false once the stream is exhausted and
    /// nothing new arrived.
    fn refill(&mut self) -> io::Result<bool> {
        if self.stream_done {
            return Ok(false);
        }

        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }

        let mut filled = 0;
        while self.end < self.buf.len() {
            match self.inner.read(&mut self.buf[self.end..]) {
                Ok(0) => {
                    self.stream_done = true;
                    break;
                }
                Ok(n) => {
                    self.end += n;
                    filled += n;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(filled > 0)
    }

    /// True when the underlying stream is exhausted and the buffer is
    /// empty; the terminal state.
    pub fn at_end(&mut self) -> io::Result<bool> {
        if self.buffered() > 0 {
            return Ok(false);
        }
        self.refill()?;
        Ok(self.buffered() == 0)
    }

    /// Reads exactly `out.len()` bytes. A shortfall surfaces as
    /// `UnexpectedEof`, which the decoder reports as a truncated record.
    pub fn read_exact(&mut self, out: &mut [u8]) -> io::Result<()> {
        let mut written = 0;
        while written < out.len() {
            if self.buffered() == 0 && !self.refill()? {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended mid-record",
                ));
            }
            let n = (out.len() - written).min(self.buffered());
            out[written..written + n].copy_from_slice(&self.buf[self.start..self.start + n]);
            self.start += n;
            written += n;
        }
        Ok(())
    }

    /// Reads a big-endian u16, the record length prefix.
    pub fn read_u16(&mut self) -> io::Result<u16> {
        let mut b = [0u8; 2];
        self.read_exact(&mut b)?;
        Ok(u16::from_be_bytes(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_across_refills() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let mut src = ByteSource::with_capacity(64, Cursor::new(data.clone()));

        let mut out = vec![0u8; 1000];
        src.read_exact(&mut out).unwrap();
        assert_eq!(out, data);
        assert!(src.at_end().unwrap());
    }

    #[test]
    fn short_read_is_unexpected_eof() {
        let mut src = ByteSource::new(Cursor::new(vec![1u8, 2, 3]));
        let mut out = [0u8; 4];
        let err = src.read_exact(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn empty_stream_is_at_end() {
        let mut src = ByteSource::new(Cursor::new(Vec::<u8>::new()));
        assert!(src.at_end().unwrap());
    }

    #[test]
    fn request_larger_than_buffer_capacity() {
        let data = vec![7u8; 500];
        let mut src = ByteSource::with_capacity(64, Cursor::new(data));
        let mut out = vec![0u8; 500];
        src.read_exact(&mut out).unwrap();
        assert!(out.iter().all(|&b| b == 7));
    }
}
