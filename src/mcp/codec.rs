//! Line codec for the stdio transport.
//!
//! Frame format: one JSON-RPC message per line, terminated by `\n`.
//! A trailing `\r` is tolerated. The final line may omit its terminator.
//! Lines are handed over as raw bytes; UTF-8 and JSON decoding happen
//! together in the server, so a malformed line is answered, not fatal.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read one message line.
///
/// Returns `None` on clean EOF. Blank lines are skipped. `max_line_bytes`
/// caps the accepted line length (excluding the terminator); an over-long
/// line is the only framing error.
pub async fn read_message<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    max_line_bytes: usize,
) -> std::io::Result<Option<Vec<u8>>> {
    loop {
        let mut buf = Vec::new();
        // +2 leaves room for "\r\n" on a line of exactly max_line_bytes.
        let limit = max_line_bytes.saturating_add(2) as u64;
        let n = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(None);
        }

        let terminated = buf.last() == Some(&b'\n');
        if terminated {
            buf.pop();
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        if buf.len() > max_line_bytes || (!terminated && n as u64 == limit) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Message too large: exceeds {} bytes", max_line_bytes),
            ));
        }

        if buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        return Ok(Some(buf));
    }
}

/// Write one message line and flush.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &str,
) -> std::io::Result<()> {
    writer.write_all(message.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
