//! Buffered, idle-timeout aware reader for line oriented protocols.
//!
//! Bytes already buffered past the current line stay in the reader, so pipelined commands
//! are served one at a time and a line split over several TCP segments is reassembled.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::time::timeout;

use crate::error_handling::types::SessionError;

pub const DEFAULT_MAX_LINE_LENGTH: usize = 8192;

pub struct LineReader<R> {
    inner: BufReader<R>,
    idle_timeout: Duration,
    max_line_length: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R, idle_timeout: Duration) -> Self {
        Self {
            inner: BufReader::new(reader),
            idle_timeout,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    /// Reads one line and strips its `\r\n` (or bare `\n`) terminator.
    ///
    /// Returns `Ok(None)` when the peer closed the connection, including in the middle of
    /// a line. The whole line must arrive within the idle timeout.
    ///
    /// # Errors
    ///
    /// - `SessionError::Timeout` if no complete line arrived in time
    /// - `SessionError::LineTooLong` if no terminator shows up within the maximum length
    /// - `SessionError::IoError` for transport failures
    pub async fn read_line(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        let max = self.max_line_length;
        let mut line = Vec::new();

        let read = timeout(self.idle_timeout, async {
            (&mut self.inner)
                .take(max as u64)
                .read_until(b'\n', &mut line)
                .await
        })
        .await
        .map_err(|_| SessionError::Timeout)??;

        if read == 0 {
            return Ok(None);
        }
        if line.last() != Some(&b'\n') {
            if line.len() >= max {
                return Err(SessionError::LineTooLong(max));
            }
            return Ok(None);
        }

        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Reads exactly `len` bytes, e.g. the payload of an IMAP literal.
    ///
    /// Returns `Ok(None)` if the peer closed the connection first.
    pub async fn read_exact_bytes(&mut self, len: usize) -> Result<Option<Vec<u8>>, SessionError> {
        let mut buf = vec![0u8; len];
        let result = timeout(self.idle_timeout, self.inner.read_exact(&mut buf))
            .await
            .map_err(|_| SessionError::Timeout)?;

        match result {
            Ok(_) => Ok(Some(buf)),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(SessionError::IoError(e)),
        }
    }
}
