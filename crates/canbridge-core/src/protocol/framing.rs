//! Inbound framing: assembling `<`/`>` delimited frames from a byte stream.
//!
//! The session feeds this state machine one byte at a time.  Bytes outside
//! any frame are discarded until a `<` appears; the frame then accumulates
//! until the closing `>`.  A frame that outgrows the buffer budget before
//! closing is discarded and framing returns to idle, so a garbled client
//! cannot wedge its session – the next well-formed frame parses normally.

/// Size of the inbound frame buffer, including both delimiters.
///
/// A frame whose cursor passes `MAX_FRAME_LEN - 2` without a closing `>`
/// is discarded.  The longest valid command (6-char bus name, 8 data
/// bytes, maximal integer fields) fits comfortably.
pub const MAX_FRAME_LEN: usize = 100;

/// Per-session framing state: the accumulation buffer and the in-frame flag.
///
/// Exclusively owned by its session and mutated only by the inbound-byte
/// handler; reset on overflow, on frame completion, and on termination.
#[derive(Debug)]
pub struct FramingState {
    buf: Vec<u8>,
    in_frame: bool,
}

impl FramingState {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(MAX_FRAME_LEN),
            in_frame: false,
        }
    }

    /// Feeds one byte from the client stream.
    ///
    /// Returns the complete frame, delimiters included, when `byte` closes
    /// one; `None` while a frame is still accumulating or the byte was
    /// discarded.  Completion resets the state to idle either way.
    pub fn advance(&mut self, byte: u8) -> Option<Vec<u8>> {
        if !self.in_frame {
            if byte == b'<' {
                self.in_frame = true;
                self.buf.clear();
                self.buf.push(byte);
            }
            return None;
        }

        self.buf.push(byte);

        // Overflow wins over a closing delimiter in the same position:
        // a `>` arriving past the budget is discarded with the rest.
        if self.buf.len() > MAX_FRAME_LEN - 1 {
            self.reset();
            return None;
        }
        if byte == b'>' {
            self.in_frame = false;
            return Some(std::mem::take(&mut self.buf));
        }
        None
    }

    /// Discards any partial frame and returns to the idle state.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.in_frame = false;
    }
}

impl Default for FramingState {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
