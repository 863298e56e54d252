//! Drains one process output channel into the shared sink.

use std::fmt;
use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::sink::LineSink;

/// Which output channel a pump reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stdout,
    Stderr,
}

impl Channel {
    /// Marker written in front of every forwarded line.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Stdout => "[out]",
            Self::Stderr => "[err]",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// Forward every line of `reader` to `sink` as `"{tag} {line}"`.
///
/// Returns when the reader reaches end-of-stream or `cancel` fires, whether
/// the pump is waiting on the reader or on the sink. Cancellation is not an
/// error.
pub async fn pump<R, W>(
    reader: R,
    channel: Channel,
    sink: &LineSink<W>,
    cancel: &CancellationToken,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut forwarded = 0usize;

    loop {
        buf.clear();
        let read = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(%channel, forwarded, "Pump cancelled");
                return Ok(());
            }
            read = reader.read_until(b'\n', &mut buf) => read?,
        };

        if read == 0 {
            break;
        }

        let line = String::from_utf8_lossy(trim_line_end(&buf));
        if !sink
            .write_line_until(&format!("{} {line}", channel.tag()), cancel)
            .await
        {
            debug!(%channel, forwarded, "Pump cancelled while writing");
            return Ok(());
        }
        forwarded += 1;
    }

    debug!(%channel, forwarded, "Pump reached end of stream");
    Ok(())
}

fn trim_line_end(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

/// Pump an optional channel; a missing channel has nothing to drain.
pub async fn pump_optional<R, W>(
    reader: Option<R>,
    channel: Channel,
    sink: &LineSink<W>,
    cancel: &CancellationToken,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send,
{
    match reader {
        Some(reader) => pump(reader, channel, sink, cancel).await,
        None => Ok(()),
    }
}
