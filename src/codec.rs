//! `Content-Length`-framed JSON-RPC transport.
//!
//! The editor and the upstream both speak JSON bodies prefixed by a
//! `Content-Length: N\r\n\r\n` header block. [`MessageReader`] and
//! [`MessageWriter`] handle one direction each over any async byte stream.

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Upper bound on a single frame body. Generated Go files can get large, but
/// anything past this is a framing bug, not a document.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Reads framed JSON-RPC messages.
pub struct MessageReader<R> {
    input: BufReader<R>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: BufReader::new(input),
        }
    }

    /// Read the next message. `Ok(None)` means the peer closed the stream
    /// cleanly between frames.
    pub async fn read(&mut self) -> Result<Option<serde_json::Value>> {
        let Some(length) = self.read_header_block().await? else {
            return Ok(None);
        };
        if length > MAX_BODY_BYTES {
            bail!("frame body of {length} bytes exceeds the {MAX_BODY_BYTES} byte limit");
        }
        let mut body = vec![0u8; length];
        self.input
            .read_exact(&mut body)
            .await
            .context("reading frame body")?;
        let message = serde_json::from_slice(&body).context("decoding frame body")?;
        Ok(Some(message))
    }

    /// Consume header lines up to the blank separator and return the
    /// announced body length, or `None` on EOF before any header byte.
    async fn read_header_block(&mut self) -> Result<Option<usize>> {
        let mut length = None;
        let mut line = String::new();
        loop {
            let start_of_block = length.is_none() && line.is_empty();
            line.clear();
            let n = self
                .input
                .read_line(&mut line)
                .await
                .context("reading frame header")?;
            if n == 0 {
                if start_of_block {
                    return Ok(None);
                }
                bail!("stream ended inside a frame header block");
            }
            let header = line.trim_end_matches(['\r', '\n']);
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':')
                && name.trim().eq_ignore_ascii_case("Content-Length")
            {
                length = Some(
                    value
                        .trim()
                        .parse()
                        .context("unparseable Content-Length header")?,
                );
            }
            // Content-Type and anything else a peer sends is ignored.
        }
        match length {
            Some(length) => Ok(Some(length)),
            None => bail!("frame header block carried no Content-Length"),
        }
    }
}

/// Writes framed JSON-RPC messages.
pub struct MessageWriter<W> {
    output: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    pub async fn write(&mut self, message: &serde_json::Value) -> Result<()> {
        let body = serde_json::to_vec(message).context("encoding frame body")?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        self.output
            .write_all(header.as_bytes())
            .await
            .context("writing frame header")?;
        self.output
            .write_all(&body)
            .await
            .context("writing frame body")?;
        self.output.flush().await.context("flushing frame")?;
        Ok(())
    }
}
