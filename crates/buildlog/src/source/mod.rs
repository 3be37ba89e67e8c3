//! Source — where raw build output lines come from.
//!
//! The parser consumes one abstract [`LineSource`] and does not know whether
//! it is attached to a local `docker build` or decoding a remote job's
//! polled output. Both constructors here produce the same stream type.

use std::pin::Pin;

use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_stream::Stream;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Reading build output failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decoding remote job output failed: {0}")]
    Decode(String),
}

pub type LineSource = Pin<Box<dyn Stream<Item = Result<Bytes, SourceError>> + Send>>;

/// Stream raw lines from a reader: a local build process's combined
/// output, a log file, or stdin.
///
/// Lines are split on `\n` only and passed on byte-for-byte; the
/// normalizer deals with `\r`, escape codes and invalid UTF-8. At most
/// `max_line_size + 1` bytes of a line are buffered: the rest of an
/// oversized line is discarded while reading, and the truncated line still
/// exceeds the limit so the parser skips it.
pub fn from_reader<R>(reader: R, max_line_size: usize) -> LineSource
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let limit = max_line_size.saturating_add(1);
    let stream = async_stream::try_stream! {
        let mut reader = reader;
        loop {
            let mut buf = Vec::new();
            if !read_line_bounded(&mut reader, limit, &mut buf).await? {
                break;
            }
            yield Bytes::from(buf);
        }
    };
    Box::pin(stream)
}

/// Read one line without its `\n`, keeping at most `limit` bytes.
/// Returns `false` at end of input.
async fn read_line_bounded<R>(
    reader: &mut R,
    limit: usize,
    buf: &mut Vec<u8>,
) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    let mut read_any = false;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(read_any);
        }
        read_any = true;

        let newline = available.iter().position(|&b| b == b'\n');
        let chunk = &available[..newline.unwrap_or(available.len())];
        let room = limit.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);

        let consumed = chunk.len() + usize::from(newline.is_some());
        reader.consume(consumed);
        if newline.is_some() {
            return Ok(true);
        }
    }
}

/// Stream the lines of a remote job's accumulated output.
///
/// Remote builders report the whole log so far on every poll, so this is
/// always the full sequence from the first line.
pub fn from_remote_output(output: impl Into<Bytes>) -> LineSource {
    let output: Bytes = output.into();
    let lines: Vec<Result<Bytes, SourceError>> = split_lines(&output).map(Ok).collect();
    Box::pin(tokio_stream::iter(lines))
}

/// Payload a remote job reports when polled.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteJobOutput {
    #[serde(default)]
    pub output: Option<String>,
}

/// Decode a polled job payload (`{"output": "..."}`) into a line source.
/// A job that has not produced output yet yields no lines.
pub fn from_job_payload(payload: &[u8]) -> Result<LineSource, SourceError> {
    let job: RemoteJobOutput =
        serde_json::from_slice(payload).map_err(|e| SourceError::Decode(e.to_string()))?;
    Ok(from_remote_output(job.output.unwrap_or_default()))
}

fn split_lines(output: &Bytes) -> impl Iterator<Item = Bytes> + '_ {
    let mut start = 0;
    let mut done = output.is_empty();
    std::iter::from_fn(move || {
        if done {
            return None;
        }
        match output[start..].iter().position(|&b| b == b'\n') {
            Some(offset) => {
                let line = output.slice(start..start + offset);
                start += offset + 1;
                if start >= output.len() {
                    done = true;
                }
                Some(line)
            }
            None => {
                done = true;
                Some(output.slice(start..))
            }
        }
    })
}
