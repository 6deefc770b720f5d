//! Demultiplexer for the engine's framed container log transport.
//!
//! When a container has no TTY the engine multiplexes stdout and stderr
//! into frames:
//!
//! ```text
//! +--------+-----------+----------------------+-----------------+
//! | tag u8 | 0  0  0   | payload length u32BE | payload (L)     |
//! +--------+-----------+----------------------+-----------------+
//!   1 = stdout, 2 = stderr
//! ```
//!
//! With a TTY the multiplexing is switched off and the stream is plain
//! bytes. [`LogDemux`] tells the two apart from the first header it reads
//! and yields the payload bytes of both streams, in arrival order, as one
//! plain stream.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

/// Size of a frame header.
pub const HEADER_LEN: usize = 8;

/// Frame tag for stdout payloads.
pub const STDOUT_TAG: u8 = 1;

/// Frame tag for stderr payloads.
pub const STDERR_TAG: u8 = 2;

/// Protocol failures surfaced through [`io::Error`] (kind `InvalidData`).
#[derive(Debug, thiserror::Error)]
pub enum LogStreamError {
    #[error("invalid stream type {0} in log frame header")]
    InvalidStreamType(u8),
}

impl From<LogStreamError> for io::Error {
    fn from(err: LogStreamError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Nothing decided yet; the first header is being read.
    Detecting,
    /// Frames confirmed.
    Framed,
    /// Not multiplexed. Latched for the rest of the stream.
    Raw,
}

/// Plain-byte view over a multiplexed (or raw) log stream.
///
/// Single consumer only. Dropping the demultiplexer drops, and thereby
/// closes, the underlying stream; [`into_inner`](Self::into_inner) hands
/// it back instead.
#[derive(Debug)]
pub struct LogDemux<R> {
    inner: R,
    mode: Mode,
    header: [u8; HEADER_LEN],
    /// Bytes of `header` read so far.
    header_len: usize,
    /// Raw mode only: bytes of `header` already handed to the caller.
    replayed: usize,
    /// Payload bytes of the current frame not yet delivered.
    remainder: usize,
    /// Inner failure seen after bytes were already handed out; reported by
    /// the next read.
    pending_error: Option<io::Error>,
}

fn is_stream_tag(tag: u8) -> bool {
    tag == STDOUT_TAG || tag == STDERR_TAG
}

impl<R> LogDemux<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            mode: Mode::Detecting,
            header: [0; HEADER_LEN],
            header_len: 0,
            replayed: 0,
            remainder: 0,
            pending_error: None,
        }
    }

    /// Whether the stream turned out not to be multiplexed.
    pub fn is_raw(&self) -> bool {
        self.mode == Mode::Raw
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for LogDemux<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Some(err) = this.pending_error.take() {
            return Poll::Ready(Err(err));
        }
        let start = buf.filled().len();

        loop {
            if buf.remaining() == 0 {
                return Poll::Ready(Ok(()));
            }

            match this.mode {
                Mode::Raw => {
                    if this.replayed < this.header_len {
                        let pending = &this.header[this.replayed..this.header_len];
                        let n = pending.len().min(buf.remaining());
                        buf.put_slice(&pending[..n]);
                        this.replayed += n;
                        return Poll::Ready(Ok(()));
                    }
                    return Pin::new(&mut this.inner).poll_read(cx, buf);
                }

                Mode::Framed if this.remainder > 0 => {
                    let want = this.remainder.min(buf.remaining());
                    let mut chunk = ReadBuf::new(buf.initialize_unfilled_to(want));
                    let polled = Pin::new(&mut this.inner).poll_read(cx, &mut chunk);
                    let n = chunk.filled().len();

                    let delivered = buf.filled().len() > start;
                    match partial(&mut this.pending_error, polled, delivered) {
                        Some(ready) => return ready,
                        None if n == 0 => {
                            return eof(buf.filled().len() > start, "log frame payload");
                        }
                        None => {
                            buf.advance(n);
                            this.remainder -= n;
                        }
                    }
                }

                Mode::Detecting | Mode::Framed => {
                    if this.header_len < HEADER_LEN {
                        let mut chunk = ReadBuf::new(&mut this.header[this.header_len..]);
                        let polled = Pin::new(&mut this.inner).poll_read(cx, &mut chunk);
                        let n = chunk.filled().len();

                        let delivered = buf.filled().len() > start;
                        if let Some(ready) = partial(&mut this.pending_error, polled, delivered) {
                            return ready;
                        }
                        if n == 0 {
                            if this.header_len == 0 {
                                // Clean end of stream on a frame boundary.
                                return Poll::Ready(Ok(()));
                            }
                            return eof(buf.filled().len() > start, "log frame header");
                        }
                        this.header_len += n;

                        if this.mode == Mode::Detecting && !is_stream_tag(this.header[0]) {
                            tracing::debug!(
                                first_byte = this.header[0],
                                "Log stream is not multiplexed, passing through"
                            );
                            this.mode = Mode::Raw;
                            continue;
                        }
                        if this.header_len < HEADER_LEN {
                            continue;
                        }
                    }

                    let tag = this.header[0];
                    if !is_stream_tag(tag) {
                        // The header stays buffered, so the next read fails too.
                        if buf.filled().len() > start {
                            return Poll::Ready(Ok(()));
                        }
                        return Poll::Ready(Err(LogStreamError::InvalidStreamType(tag).into()));
                    }
                    let len = u32::from_be_bytes([
                        this.header[4],
                        this.header[5],
                        this.header[6],
                        this.header[7],
                    ]);
                    this.remainder = len as usize;
                    this.header_len = 0;
                    this.mode = Mode::Framed;
                }
            }
        }
    }
}

/// Resolve an inner poll that did not produce data for the caller.
///
/// Returns `None` when the inner read completed successfully and the loop
/// should carry on. Once bytes have been placed in the caller's buffer,
/// a pending or failed inner read ends the call with those bytes. A failure
/// is parked in `pending` because the inner stream may not repeat it (a
/// body stream reports end of data after its first error).
fn partial(
    pending: &mut Option<io::Error>,
    polled: Poll<io::Result<()>>,
    delivered: bool,
) -> Option<Poll<io::Result<()>>> {
    match polled {
        Poll::Ready(Ok(())) => None,
        Poll::Ready(Err(e)) if delivered => {
            *pending = Some(e);
            Some(Poll::Ready(Ok(())))
        }
        Poll::Ready(Err(e)) => Some(Poll::Ready(Err(e))),
        Poll::Pending if delivered => Some(Poll::Ready(Ok(()))),
        Poll::Pending => Some(Poll::Pending),
    }
}

/// End of stream in the middle of a frame.
fn eof(delivered: bool, what: &str) -> Poll<io::Result<()>> {
    if delivered {
        return Poll::Ready(Ok(()));
    }
    Poll::Ready(Err(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("log stream ended inside a {what}"),
    )))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
