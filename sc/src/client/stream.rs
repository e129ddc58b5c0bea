//! Streamed run responses
//!
//! `run_pipeline` answers with a chunked body that stays open while the
//! backend works. [`ExecutionHandle`] owns that connection and hands out
//! chunks one pull at a time, in the order the server sent them.
//!
//! ```text
//! Opened --chunk--> Streaming --chunk--> Streaming
//!    |                 |
//!    |                 +--end of body--> Exhausted
//!    |                 +--read error---> Failed
//!    +-----close()-----+---------------> Closed
//! ```
//!
//! Dropping the handle closes it, so the connection is released on every
//! exit path, including early returns and `?`.

use std::collections::VecDeque;
use std::fmt;

use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::ClientError;
use crate::run_id::RunId;

/// Raw chunk source behind an [`ExecutionHandle`]
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, ClientError>>;

/// Lifecycle of an [`ExecutionHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Response headers received, no chunk yet
    Opened,
    /// At least one chunk delivered, more may follow
    Streaming,
    /// Server ended the body cleanly
    Exhausted,
    /// The connection broke mid-body
    Failed,
    /// Caller closed the handle early
    Closed,
}

impl HandleState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            HandleState::Exhausted | HandleState::Failed | HandleState::Closed
        )
    }
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandleState::Opened => "opened",
            HandleState::Streaming => "streaming",
            HandleState::Exhausted => "exhausted",
            HandleState::Failed => "failed",
            HandleState::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

/// Single-owner handle on one in-flight pipeline run
pub struct ExecutionHandle {
    run_id: RunId,
    stream: Option<ChunkStream>,
    state: HandleState,
    chunks: usize,
    decoder: EventDecoder,
    events: VecDeque<RunEvent>,
}

impl ExecutionHandle {
    /// Wrap an arbitrary chunk source
    pub fn new(run_id: RunId, stream: ChunkStream) -> Self {
        debug!(%run_id, "ExecutionHandle::new: called");
        Self {
            run_id,
            stream: Some(stream),
            state: HandleState::Opened,
            chunks: 0,
            decoder: EventDecoder::default(),
            events: VecDeque::new(),
        }
    }

    /// Wrap the body of a `run_pipeline` response without reading it
    pub fn from_response(run_id: RunId, response: reqwest::Response) -> Self {
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ClientError::Transport))
            .boxed();
        Self::new(run_id, stream)
    }

    /// Build a handle over a fixed list of chunk results (handy for tests and replays)
    pub fn from_chunks(run_id: RunId, chunks: Vec<Result<Vec<u8>, ClientError>>) -> Self {
        Self::new(run_id, futures::stream::iter(chunks).boxed())
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    /// Number of chunks delivered so far
    pub fn chunks_received(&self) -> usize {
        self.chunks
    }

    /// Pull the next chunk
    ///
    /// `Ok(None)` means the stream is over (exhausted or closed) and stays
    /// over. A broken connection is reported as
    /// [`ClientError::StreamTerminated`], never as a quiet end; pulling again
    /// after that yields [`ClientError::StreamFailed`].
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ClientError> {
        match self.state {
            HandleState::Exhausted | HandleState::Closed => return Ok(None),
            HandleState::Failed => return Err(ClientError::StreamFailed),
            HandleState::Opened | HandleState::Streaming => {}
        }

        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };

        loop {
            match stream.next().await {
                Some(Ok(chunk)) if chunk.is_empty() => {
                    debug!(run_id = %self.run_id, "next_chunk: skipping empty chunk");
                }
                Some(Ok(chunk)) => {
                    self.state = HandleState::Streaming;
                    self.chunks += 1;
                    debug!(run_id = %self.run_id, index = self.chunks, len = chunk.len(), "next_chunk: chunk");
                    return Ok(Some(chunk));
                }
                Some(Err(e)) => {
                    let reason = error_chain(&e);
                    warn!(run_id = %self.run_id, chunks = self.chunks, %reason, "next_chunk: stream failed");
                    self.state = HandleState::Failed;
                    self.stream = None;
                    return Err(ClientError::StreamTerminated {
                        chunks: self.chunks,
                        reason,
                    });
                }
                None => {
                    debug!(run_id = %self.run_id, chunks = self.chunks, "next_chunk: exhausted");
                    self.state = HandleState::Exhausted;
                    self.stream = None;
                    return Ok(None);
                }
            }
        }
    }

    /// Pull the next decoded [`RunEvent`]
    ///
    /// Records are reassembled across chunk boundaries, so a record split
    /// over two reads yields one event and two records in one read yield
    /// two. Bytes left over when the body ends come back as text.
    pub async fn next_event(&mut self) -> Result<Option<RunEvent>, ClientError> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return Ok(Some(event));
            }
            match self.next_chunk().await? {
                Some(chunk) => {
                    let decoded = self.decoder.push(&chunk);
                    self.events.extend(decoded);
                }
                None => return Ok(self.decoder.finish()),
            }
        }
    }

    /// Drain the remaining chunks
    pub async fn collect_chunks(mut self) -> Result<Vec<Vec<u8>>, ClientError> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    /// Stop reading and release the connection
    ///
    /// Closing an already finished handle is a no-op.
    pub fn close(&mut self) {
        if !self.state.is_terminal() {
            debug!(run_id = %self.run_id, chunks = self.chunks, "close: closing open stream");
            self.state = HandleState::Closed;
        }
        self.stream = None;
        self.events.clear();
        self.decoder = EventDecoder::default();
    }
}

impl Drop for ExecutionHandle {
    fn drop(&mut self) {
        if self.stream.is_some() {
            debug!(run_id = %self.run_id, state = %self.state, "ExecutionHandle dropped while open, closing");
            self.close();
        }
    }
}

impl fmt::Debug for ExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionHandle")
            .field("run_id", &self.run_id)
            .field("state", &self.state)
            .field("chunks", &self.chunks)
            .finish()
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Counters the backend emits while a long task runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Progress {
    pub success: u64,
    pub failed: u64,
    pub total: u64,
}

impl Progress {
    /// Completed fraction in `[0, 1]`, if the total is known
    pub fn fraction(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(((self.success + self.failed) as f64 / self.total as f64).min(1.0))
    }
}

/// Decoded view of one run chunk
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Progress(Progress),
    Json(Value),
    Text(String),
}

impl RunEvent {
    /// Classify one complete JSON record
    pub fn from_value(value: Value) -> Self {
        match Progress::deserialize(&value) {
            Ok(progress) => RunEvent::Progress(progress),
            Err(_) => RunEvent::Json(value),
        }
    }

    /// Decode a complete body (or any self-contained byte run) in one go
    pub fn decode_all(bytes: &[u8]) -> Vec<RunEvent> {
        let mut decoder = EventDecoder::default();
        let mut events = decoder.push(bytes);
        events.extend(decoder.finish());
        events
    }
}

/// Incremental decoder for the run body
///
/// The backend writes bare JSON records and plain text lines back to back
/// with no framing, and the transport is free to split or merge them.
/// Objects and arrays are parsed as they complete; an incomplete record is
/// held until more bytes arrive. Anything else is text, running up to the
/// next `{`.
#[derive(Debug, Default)]
pub struct EventDecoder {
    pending: Vec<u8>,
}

impl EventDecoder {
    /// Feed bytes in, get back every event they complete
    pub fn push(&mut self, bytes: &[u8]) -> Vec<RunEvent> {
        self.pending.extend_from_slice(bytes);
        let mut events = Vec::new();
        let mut pos = 0;

        while pos < self.pending.len() {
            let rest = &self.pending[pos..];
            let Some(start) = rest.iter().position(|b| !b.is_ascii_whitespace()) else {
                pos = self.pending.len();
                break;
            };
            let rest = &rest[start..];

            if matches!(rest[0], b'{' | b'[') {
                let mut values = serde_json::Deserializer::from_slice(rest).into_iter::<Value>();
                match values.next() {
                    Some(Ok(value)) => {
                        pos += start + values.byte_offset();
                        events.push(RunEvent::from_value(value));
                        continue;
                    }
                    Some(Err(e)) if e.is_eof() => {
                        debug!(buffered = rest.len(), "EventDecoder::push: partial record, waiting");
                        pos += start;
                        break;
                    }
                    // not JSON after all
                    _ => {}
                }
            }

            let end = rest[1..]
                .iter()
                .position(|&b| b == b'{')
                .map(|i| i + 1)
                .unwrap_or(rest.len());
            let text = String::from_utf8_lossy(&rest[..end]).trim_end().to_string();
            events.push(RunEvent::Text(text));
            pos += start + end;
        }

        self.pending.drain(..pos);
        events
    }

    /// Flush whatever is still buffered once the body has ended
    pub fn finish(&mut self) -> Option<RunEvent> {
        let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        if text.is_empty() {
            None
        } else {
            debug!(len = text.len(), "EventDecoder::finish: flushing incomplete data as text");
            Some(RunEvent::Text(text))
        }
    }
}
