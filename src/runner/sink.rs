//! Line-oriented writer over the caller's output stream.
//!
//! Every write is one complete, newline-terminated line followed by a
//! flush, performed under a lock so lines from concurrent pumps never
//! interleave. Transport failures are absorbed here.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Terminator appended to every line.
pub const LINE_TERMINATOR: &str = "\n";

/// Shared destination for streamed output lines.
pub struct LineSink<W> {
    inner: Mutex<W>,
    broken: AtomicBool,
    /// A cancelled write left part of a line on the stream.
    torn: AtomicBool,
}

impl<W: AsyncWrite + Unpin + Send> LineSink<W> {
    /// Wrap a writable stream.
    pub fn new(inner: W) -> Self {
        Self {
            inner: Mutex::new(inner),
            broken: AtomicBool::new(false),
            torn: AtomicBool::new(false),
        }
    }

    /// Write `text` plus the line terminator, then flush.
    ///
    /// Never fails. Once a write fails the sink is considered disconnected
    /// and later lines are dropped. If an earlier cancelled write left a
    /// partial line behind, that line is terminated first.
    pub async fn write_line(&self, text: &str) {
        if self.is_broken() {
            debug!(line = %text, "Sink disconnected, dropping line");
            return;
        }

        let mut inner = self.inner.lock().await;

        let mut formatted = String::with_capacity(text.len() + 2 * LINE_TERMINATOR.len());
        if self.torn.load(Ordering::SeqCst) {
            formatted.push_str(LINE_TERMINATOR);
        }
        formatted.push_str(text);
        formatted.push_str(LINE_TERMINATOR);

        let result = match self.write_whole(&mut *inner, formatted.as_bytes()).await {
            Ok(()) => inner.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            if !self.broken.swap(true, Ordering::SeqCst) {
                warn!(error = %e, "Output sink failed, discarding further output");
            }
        }
    }

    /// Like [`write_line`](Self::write_line), but gives up once `cancel`
    /// fires. Returns `false` if the line was abandoned.
    pub async fn write_line_until(&self, text: &str, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            () = self.write_line(text) => true,
        }
    }

    /// Whether a previous write failed.
    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }

    /// Unwrap the underlying stream.
    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }

    async fn write_whole(&self, inner: &mut W, bytes: &[u8]) -> io::Result<()> {
        let mut written = 0;
        while written < bytes.len() {
            let n = inner.write(&bytes[written..]).await?;
            if n == 0 {
                return Err(io::ErrorKind::WriteZero.into());
            }
            written += n;
            self.torn.store(written < bytes.len(), Ordering::SeqCst);
        }
        Ok(())
    }
}
