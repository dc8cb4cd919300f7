//! DAP wire framing over a child process's stdio (spec §4.2).
//!
//! Inbound bytes accumulate in a growable buffer rather than being read
//! line-by-line, so a `Content-Length` header and its payload can straddle
//! arbitrary read boundaries. Header matching is case-insensitive and a
//! negative or missing length is a fatal protocol error; `Content-Length: 0`
//! is valid and yields an empty payload.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, ChildStdout};

use crate::error::{Error, Result};

use super::types::Message;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

pub struct DapTransport {
    stdin: ChildStdin,
    stdout: ChildStdout,
    buf: Vec<u8>,
}

impl DapTransport {
    pub fn new(stdin: ChildStdin, stdout: ChildStdout) -> Self {
        Self {
            stdin,
            stdout,
            buf: Vec::new(),
        }
    }

    /// Read and decode the next frame, blocking (asynchronously) until a
    /// complete message is available or the stream ends.
    pub async fn read_message(&mut self) -> Result<Message> {
        loop {
            if let Some(msg) = self.try_decode_one()? {
                return Ok(msg);
            }
            let mut chunk = [0u8; 4096];
            let n = self.stdout.read(&mut chunk).await?;
            if n == 0 {
                return Err(Error::TransportClosed(
                    "child stdout closed mid-frame".into(),
                ));
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Attempt to decode a single frame from the buffer, consuming it on
    /// success. Returns `Ok(None)` if more bytes are needed.
    fn try_decode_one(&mut self) -> Result<Option<Message>> {
        let Some(header_end) = find_subslice(&self.buf, HEADER_TERMINATOR) else {
            return Ok(None);
        };
        let header_block = std::str::from_utf8(&self.buf[..header_end])
            .map_err(|e| Error::ProtocolHeaderInvalid(format!("non-UTF-8 header: {e}")))?;

        let content_length = parse_content_length(header_block)?;

        let payload_start = header_end + HEADER_TERMINATOR.len();
        let payload_end = payload_start + content_length;
        if self.buf.len() < payload_end {
            return Ok(None);
        }

        let payload = &self.buf[payload_start..payload_end];
        let content = std::str::from_utf8(payload)
            .map_err(|e| Error::ProtocolJsonInvalid(format!("invalid UTF-8 payload: {e}")))?;
        let msg: Message = if content_length == 0 {
            serde_json::from_str("{}")
                .map_err(|e| Error::ProtocolJsonInvalid(format!("empty frame decode: {e}")))?
        } else {
            serde_json::from_str(content)
                .map_err(|e| Error::ProtocolJsonInvalid(format!("failed to parse DAP message: {e}")))?
        };

        self.buf.drain(..payload_end);
        Ok(Some(msg))
    }

    pub async fn write_message(&mut self, msg: &Message) -> Result<()> {
        let content = serde_json::to_string(msg)
            .map_err(|e| Error::ProtocolJsonInvalid(format!("failed to serialize DAP message: {e}")))?;
        let header = format!("Content-Length: {}\r\n\r\n", content.len());
        self.stdin.write_all(header.as_bytes()).await?;
        self.stdin.write_all(content.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }
}

fn parse_content_length(header_block: &str) -> Result<usize> {
    let line = header_block
        .lines()
        .find(|line| line.to_ascii_lowercase().starts_with("content-length:"))
        .ok_or_else(|| Error::ProtocolHeaderInvalid("missing Content-Length header".into()))?;
    let value = line
        .splitn(2, ':')
        .nth(1)
        .ok_or_else(|| Error::ProtocolHeaderInvalid("malformed Content-Length header".into()))?
        .trim();
    let parsed: i64 = value
        .parse()
        .map_err(|_| Error::ProtocolHeaderInvalid(format!("non-numeric Content-Length: {value}")))?;
    if parsed < 0 {
        return Err(Error::ProtocolHeaderInvalid(format!(
            "negative Content-Length: {parsed}"
        )));
    }
    Ok(parsed as usize)
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_content_length_is_case_insensitive() {
        assert_eq!(parse_content_length("CONTENT-LENGTH: 42\r\n").unwrap(), 42);
        assert_eq!(parse_content_length("Content-Length: 0\r\n").unwrap(), 0);
    }

    #[test]
    fn parse_content_length_rejects_negative() {
        assert!(parse_content_length("Content-Length: -1\r\n").is_err());
    }

    #[test]
    fn parse_content_length_rejects_missing_header() {
        assert!(parse_content_length("X-Other: 1\r\n").is_err());
    }

    #[test]
    fn find_subslice_locates_terminator() {
        let data = b"Content-Length: 2\r\n\r\n{}";
        let pos = find_subslice(data, HEADER_TERMINATOR).unwrap();
        assert_eq!(&data[..pos], b"Content-Length: 2");
    }
}
