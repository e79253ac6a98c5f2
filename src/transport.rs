//! Line-oriented TCP transport
//!
//! A connection is a byte stream carrying newline-terminated UTF-8 lines
//! in both directions. `LineCodec` does the framing for `FramedRead` and
//! `FramedWrite`; `Listener` hands out accepted connections.

use std::fmt;
use std::net::SocketAddr;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Decoder, Encoder, FramedRead, FramedWrite};
use tracing::debug;

use crate::error::AppError;

/// Default upper bound on an inbound line, terminator excluded
pub const DEFAULT_MAX_LINE_LENGTH: usize = 100_000;

/// Newline-delimited text codec
///
/// Decoding splits on `\n` and strips one trailing `\r`. An unterminated
/// fragment left at end of stream is dropped, never yielded as a line,
/// unless the codec was built with [`LineCodec::keep_fragment`].
/// Encoding writes any `Display` item followed by `\n`.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
    /// Yield an unterminated fragment at end of stream instead of dropping it
    keep_fragment: bool,
    /// Where to resume the newline search in the read buffer
    next_index: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            keep_fragment: false,
            next_index: 0,
        }
    }

    /// Treat end of stream as a terminator for the last line
    ///
    /// For local input such as piped stdin; peer connections keep the
    /// default of dropping the fragment.
    pub fn keep_fragment(mut self) -> Self {
        self.keep_fragment = true;
        self
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(offset) = buf[self.next_index..].iter().position(|b| *b == b'\n') else {
            // Everything buffered belongs to the line in progress; a
            // trailing `\r` may still be stripped once `\n` arrives
            let pending = match buf.last() {
                Some(b'\r') => buf.len() - 1,
                _ => buf.len(),
            };
            if pending > self.max_length {
                return Err(AppError::LineTooLong(self.max_length));
            }
            self.next_index = buf.len();
            return Ok(None);
        };

        let newline = self.next_index + offset;
        self.next_index = 0;

        let frame = buf.split_to(newline + 1);
        let mut line = &frame[..newline];
        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }
        if line.len() > self.max_length {
            return Err(AppError::LineTooLong(self.max_length));
        }

        Ok(Some(String::from_utf8_lossy(line).into_owned()))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        if buf.is_empty() {
            return Ok(None);
        }
        if self.keep_fragment {
            let fragment = buf.split();
            let line = fragment.strip_suffix(b"\r").unwrap_or(&fragment[..]);
            return Ok(Some(String::from_utf8_lossy(line).into_owned()));
        }
        debug!("Discarding {} bytes of unterminated input", buf.len());
        buf.clear();
        Ok(None)
    }
}

impl<T: fmt::Display> Encoder<T> for LineCodec {
    type Error = AppError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = item.to_string();
        dst.reserve(line.len() + 1);
        dst.put(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

/// Wrap the read half of a connection as a stream of lines
pub fn line_reader<R: AsyncRead>(reader: R, max_length: usize) -> FramedRead<R, LineCodec> {
    FramedRead::new(reader, LineCodec::with_max_length(max_length))
}

/// Wrap the write half of a connection as a sink of lines
pub fn line_writer<W: AsyncWrite>(writer: W) -> FramedWrite<W, LineCodec> {
    FramedWrite::new(writer, LineCodec::new())
}

/// TCP listener yielding accepted connections
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind to `addr` (`host:port`); failure here is fatal to the server
    pub async fn bind(addr: &str) -> Result<Self, AppError> {
        let inner = TcpListener::bind(addr).await?;
        Ok(Self { inner })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.inner.local_addr()?)
    }

    /// Wait for the next connection
    ///
    /// Errors affect only this accept attempt; callers keep accepting.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), AppError> {
        Ok(self.inner.accept().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::{SinkExt, StreamExt};
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_decode_lines() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("who\nrename|carol\r\n");

        assert_eq!(codec.decode(&mut buf).unwrap(), Some("who".to_string()));
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some("rename|carol".to_string())
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_partial_then_complete() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("hel");

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"lo\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("hello".to_string()));
    }

    #[test]
    fn test_decode_empty_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(String::new()));
    }

    #[test]
    fn test_decode_eof_discards_fragment() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("last\nno-terminator");

        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some("last".to_string()));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_too_long() {
        let mut codec = LineCodec::with_max_length(4);

        let mut buf = BytesMut::from("abcd\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("abcd".to_string()));

        let mut buf = BytesMut::from("abcdef");
        assert!(matches!(
            codec.decode(&mut buf),
            Err(AppError::LineTooLong(4))
        ));
    }

    #[test]
    fn test_decode_limit_independent_of_crlf_split() {
        // CRLF arriving in one read
        let mut codec = LineCodec::with_max_length(4);
        let mut buf = BytesMut::from("abcd\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("abcd".to_string()));

        // `\r` and `\n` in separate reads
        let mut codec = LineCodec::with_max_length(4);
        let mut buf = BytesMut::from("abcd\r");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("abcd".to_string()));

        // A fifth real byte is still too long
        let mut codec = LineCodec::with_max_length(4);
        let mut buf = BytesMut::from("abcde\r");
        assert!(matches!(
            codec.decode(&mut buf),
            Err(AppError::LineTooLong(4))
        ));
    }

    #[test]
    fn test_decode_eof_keep_fragment() {
        let mut codec = LineCodec::new().keep_fragment();
        let mut buf = BytesMut::from("first\nlast\r");

        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some("first".to_string()));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some("last".to_string()));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_decode_invalid_utf8_is_lossy() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"a\xffb\n"[..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some("a\u{FFFD}b".to_string())
        );
    }

    #[test]
    fn test_encode_appends_newline() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("hello", &mut buf).unwrap();
        codec.encode(String::from("world"), &mut buf).unwrap();
        assert_eq!(&buf[..], b"hello\nworld\n");
    }

    #[tokio::test]
    async fn test_framed_over_duplex() {
        let (client, server) = tokio::io::duplex(64);
        let (server_read, _server_write) = tokio::io::split(server);
        let mut lines = line_reader(server_read, DEFAULT_MAX_LINE_LENGTH);
        let mut writer = line_writer(client);

        writer.send("one").await.unwrap();
        writer.send("two").await.unwrap();
        writer.get_mut().write_all(b"partial").await.unwrap();
        drop(writer);

        assert_eq!(lines.next().await.unwrap().unwrap(), "one");
        assert_eq!(lines.next().await.unwrap().unwrap(), "two");
        assert!(lines.next().await.is_none());
    }

    #[tokio::test]
    async fn test_listener_accepts() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let connect = tokio::spawn(async move { TcpStream::connect(addr).await });
        let (_stream, peer) = listener.accept().await.unwrap();
        let client = connect.await.unwrap().unwrap();

        assert_eq!(peer, client.local_addr().unwrap());
    }
}
