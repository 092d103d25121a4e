//! Incremental UTF-8 decoding of response body chunks.
//!
//! A multi-byte code point may be split across two reads; the incomplete tail
//! is held back until the next chunk completes it. Invalid sequences decode to
//! U+FFFD and decoding continues.

use crate::api::ByteStream;
use crate::error::ApiError;
use futures::stream::{self, Stream, StreamExt};

const REPLACEMENT: char = '\u{FFFD}';

/// Stateful decoder for one response body.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Bytes of a code point still waiting for its continuation bytes.
    pending: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk, carrying any incomplete trailing sequence forward.
    ///
    /// Returns an empty string when the chunk only extends a pending sequence.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    // `valid_up_to` marks a UTF-8 prefix.
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match err.error_len() {
                        Some(bad) => {
                            out.push(REPLACEMENT);
                            rest = &after[bad..];
                        }
                        None => {
                            // Truncated sequence at the end: wait for more bytes.
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush at end of input. A dangling partial sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            REPLACEMENT.to_string()
        }
    }
}

/// Lazily decode a body into non-empty text fragments.
///
/// The sequence ends after the body ends (flushing the decoder) or after the
/// first transport error, which is yielded as the final item.
pub fn fragments(body: ByteStream) -> impl Stream<Item = Result<String, ApiError>> + Send {
    struct State {
        body: ByteStream,
        decoder: StreamDecoder,
        done: bool,
    }

    let state = State {
        body,
        decoder: StreamDecoder::new(),
        done: false,
    };
    stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        loop {
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let text = state.decoder.decode(&chunk);
                    if !text.is_empty() {
                        return Some((Ok(text), state));
                    }
                }
                Some(Err(err)) => {
                    state.done = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.done = true;
                    let tail = state.decoder.finish();
                    if tail.is_empty() {
                        return None;
                    }
                    return Some((Ok(tail), state));
                }
            }
        }
    })
}
