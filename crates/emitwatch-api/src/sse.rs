//! Incremental frame decoder for the telemetry stream.
//!
//! The monitoring endpoint is served by more than one backend, and they do
//! not agree on framing. Some send proper server-sent events (`data:`
//! lines terminated by a blank line), some omit the space after `data:`,
//! and some skip SSE entirely and write one bare JSON object per line.
//! [`FrameDecoder`] accepts all of them from arbitrarily split text chunks.
//!
//! Decoding runs two splitting strategies over the same buffer:
//!
//! 1. **Blocks**: everything up to the last run of two or more `\n` is
//!    split into blank-line separated blocks, and every line of every
//!    block is examined.
//! 2. **Lines**: what remains is split on single `\n`; every complete
//!    line (all but the last) is examined too.
//!
//! Both strategies share one ordered table of [`LineShape`]s. Text is
//! removed from the buffer as soon as either strategy has examined it,
//! so a payload is never emitted twice. No I/O happens here.

/// One logical message extracted from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    /// The raw JSON body, before any domain parsing.
    pub payload: String,
}

impl StreamFrame {
    fn new(payload: &str) -> Self {
        Self {
            payload: payload.to_owned(),
        }
    }
}

/// Recognized single-line payload carriers, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineShape {
    /// `data: {...}`
    DataSpaced,
    /// `data:{...}`
    DataCompact,
    /// `{...}` with no SSE framing at all.
    BareJson,
}

impl LineShape {
    const PRECEDENCE: [Self; 3] = [Self::DataSpaced, Self::DataCompact, Self::BareJson];

    fn extract(self, line: &str) -> Option<&str> {
        match self {
            Self::DataSpaced => line.strip_prefix("data: "),
            Self::DataCompact => line.strip_prefix("data:"),
            Self::BareJson => line.starts_with('{').then_some(line),
        }
    }
}

/// Extract the payload carried by a single line, if any.
///
/// Lines that match no shape (`event:`, `id:`, `:` comments, blanks)
/// yield `None` and are dropped by the caller.
fn extract_payload(line: &str) -> Option<&str> {
    let line = line.strip_suffix('\r').unwrap_or(line).trim();
    LineShape::PRECEDENCE
        .iter()
        .find_map(|shape| shape.extract(line))
        .map(str::trim)
        .filter(|payload| !payload.is_empty())
}

/// Split `buffer` at every run of two or more `\n`.
///
/// Returns the complete blocks and the byte offset at which the
/// unterminated remainder starts.
fn split_blocks(buffer: &str) -> (Vec<&str>, usize) {
    let bytes = buffer.as_bytes();
    let mut blocks = Vec::new();
    let mut start = 0;

    while let Some(rel) = buffer[start..].find("\n\n") {
        let boundary = start + rel;
        blocks.push(&buffer[start..boundary]);

        let mut next = boundary + 2;
        while bytes.get(next) == Some(&b'\n') {
            next += 1;
        }
        start = next;
    }

    (blocks, start)
}

/// Stateful decoder that turns text chunks into [`StreamFrame`]s.
///
/// The internal buffer always holds exactly the received text that has
/// not yet been resolved into frames. Text still buffered when the
/// stream ends is dropped.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every frame it completes, in wire order.
    pub fn feed(&mut self, chunk: &str) -> Vec<StreamFrame> {
        self.buffer.push_str(chunk);

        let mut frames = Vec::new();
        let (blocks, rest_start) = split_blocks(&self.buffer);
        for block in blocks {
            frames.extend(block.split('\n').filter_map(extract_payload).map(StreamFrame::new));
        }

        // Newline-delimited producers never send a blank line; drain
        // complete lines from the remainder too. The last piece may still
        // be growing, so it stays.
        let rest = &self.buffer[rest_start..];
        let consumed = match rest.rfind('\n') {
            Some(last_newline) => {
                frames.extend(
                    rest[..last_newline]
                        .split('\n')
                        .filter_map(extract_payload)
                        .map(StreamFrame::new),
                );
                rest_start + last_newline + 1
            }
            None => rest_start,
        };

        self.buffer.drain(..consumed);
        frames
    }

    /// Text received but not yet resolved into a frame.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Discard any buffered partial input.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

// ── Tests ────────────────────────────────────────────────────────────
