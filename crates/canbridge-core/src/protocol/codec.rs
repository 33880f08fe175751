//! ASCII codec for client command frames and outbound bus events.
//!
//! Inbound wire format (one frame, as assembled by
//! [`FramingState`](crate::protocol::framing::FramingState)):
//!
//! ```text
//! < BUSNAME CMD SEC USEC ID DLC [B0 B1 ... B(DLC-1)] >
//! ```
//!
//! - `BUSNAME` – interface name, at most 6 characters
//! - `CMD`     – one of `S A U D R F X` (see [`JobKind`])
//! - `SEC`/`USEC` – decimal timer interval, seconds and microseconds
//! - `ID`      – CAN identifier in hex
//! - `DLC`     – decimal data length code, 0-8
//! - `Bn`      – exactly `DLC` payload bytes in hex
//!
//! The token count must equal `6 + DLC`; every field is validated
//! independently, and any violation yields a [`DecodeError`] that the
//! session drops silently – no error frame exists in the protocol.  The
//! single exception is an unrecognized command character, which is fatal
//! to the session (see [`DecodeError::is_fatal`]).
//!
//! Outbound wire format:
//!
//! ```text
//! < BUSNAME f ID DLC B0 B1 ... > NUL
//! ```
//!
//! with `ID` as uppercase hex of minimum width 3 and each payload byte as
//! 2-digit uppercase hex.  The trailing NUL byte is part of the format:
//! XML-socket style clients use it as a record delimiter, and it must be
//! preserved byte-for-byte.

use thiserror::Error;

use crate::domain::{BusEvent, BusJob, CanFrame, JobInterval, JobKind};

/// Longest accepted bus (interface) name, in characters.
pub const MAX_BUS_NAME: usize = 6;

/// Errors that can occur while decoding one complete command frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The frame contains bytes that are not valid UTF-8.
    #[error("frame contains non-text bytes")]
    NotText,

    /// The frame is not wrapped in `<` and `>`.
    #[error("frame is not `<`/`>` delimited")]
    NotDelimited,

    /// The bus name or command token is missing entirely.
    #[error("frame is missing the bus name or command token")]
    MissingTokens,

    /// The bus name exceeds [`MAX_BUS_NAME`] characters.
    #[error("bus name {0:?} exceeds {MAX_BUS_NAME} characters")]
    BusNameTooLong(String),

    /// The command token is longer than a single character.
    #[error("command token {0:?} is not a single character")]
    BadCommandToken(String),

    /// The command character is not in the command table.
    ///
    /// This is the only fatal decode error: strict protocol discipline
    /// terminates the session rather than dropping the frame.
    #[error("unrecognized command character '{0}'")]
    UnknownCommand(char),

    /// Fewer than the six mandatory tokens are present.
    #[error("expected at least 6 tokens, got {0}")]
    TooFewFields(usize),

    /// A numeric field failed to parse.
    #[error("invalid {field} field {value:?}")]
    InvalidField {
        field: &'static str,
        value: String,
    },

    /// The data length code is outside 0-8.
    #[error("data length code {0} out of range (0-8)")]
    DlcOutOfRange(u8),

    /// The token count does not match `6 + DLC`.
    #[error("got {actual} tokens but dlc {dlc} requires exactly {expected}")]
    FieldCountMismatch {
        dlc: u8,
        expected: usize,
        actual: usize,
    },
}

impl DecodeError {
    /// Whether this error terminates the session instead of being dropped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DecodeError::UnknownCommand(_))
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decodes one complete `<...>` frame into a [`BusJob`].
///
/// `frame` is the full frame as returned by
/// [`FramingState::advance`](crate::protocol::framing::FramingState::advance),
/// delimiters included.
///
/// # Errors
///
/// Returns [`DecodeError`]; the caller drops the frame silently unless
/// [`DecodeError::is_fatal`] says otherwise.
pub fn decode_command(frame: &[u8]) -> Result<BusJob, DecodeError> {
    let text = std::str::from_utf8(frame).map_err(|_| DecodeError::NotText)?;
    let body = text
        .strip_prefix('<')
        .and_then(|t| t.strip_suffix('>'))
        .ok_or(DecodeError::NotDelimited)?;

    let tokens: Vec<&str> = body.split_whitespace().collect();
    if tokens.len() < 2 {
        return Err(DecodeError::MissingTokens);
    }

    let bus = tokens[0];
    if bus.len() > MAX_BUS_NAME {
        return Err(DecodeError::BusNameTooLong(bus.to_string()));
    }

    let kind = parse_command(tokens[1])?;

    if tokens.len() < 6 {
        return Err(DecodeError::TooFewFields(tokens.len()));
    }

    let sec = parse_u64_dec(tokens[2], "seconds")?;
    let usec = parse_u64_dec(tokens[3], "microseconds")?;
    let id = parse_u32_hex(tokens[4], "can id")?;
    let dlc = parse_u8_dec(tokens[5], "dlc")?;
    if dlc as usize > crate::domain::CAN_MAX_DLC {
        return Err(DecodeError::DlcOutOfRange(dlc));
    }

    let expected = 6 + dlc as usize;
    if tokens.len() != expected {
        return Err(DecodeError::FieldCountMismatch {
            dlc,
            expected,
            actual: tokens.len(),
        });
    }

    let mut payload = [0u8; crate::domain::CAN_MAX_DLC];
    for (slot, token) in payload.iter_mut().zip(tokens[6..].iter().copied()) {
        *slot = parse_u8_hex(token, "data byte")?;
    }

    let frame = CanFrame::new(id, &payload[..dlc as usize])
        .map_err(|_| DecodeError::DlcOutOfRange(dlc))?;

    Ok(BusJob {
        bus: bus.to_string(),
        kind,
        interval: JobInterval { sec, usec },
        frame,
    })
}

/// Maps the command token to a [`JobKind`].
fn parse_command(token: &str) -> Result<JobKind, DecodeError> {
    let mut chars = token.chars();
    let cmd = chars.next().ok_or(DecodeError::MissingTokens)?;
    if chars.next().is_some() {
        return Err(DecodeError::BadCommandToken(token.to_string()));
    }
    match cmd {
        'S' => Ok(JobKind::SendOnce),
        'A' => Ok(JobKind::AddCyclicSend),
        'U' => Ok(JobKind::UpdateCyclicSend),
        'D' => Ok(JobKind::DeleteCyclicSend),
        'R' => Ok(JobKind::AddReceiveFilter),
        'F' => Ok(JobKind::AddContentFilter),
        'X' => Ok(JobKind::DeleteReceiveFilter),
        other => Err(DecodeError::UnknownCommand(other)),
    }
}

fn parse_u64_dec(token: &str, field: &'static str) -> Result<u64, DecodeError> {
    token.parse().map_err(|_| DecodeError::InvalidField {
        field,
        value: token.to_string(),
    })
}

fn parse_u8_dec(token: &str, field: &'static str) -> Result<u8, DecodeError> {
    token.parse().map_err(|_| DecodeError::InvalidField {
        field,
        value: token.to_string(),
    })
}

fn parse_u32_hex(token: &str, field: &'static str) -> Result<u32, DecodeError> {
    u32::from_str_radix(token, 16).map_err(|_| DecodeError::InvalidField {
        field,
        value: token.to_string(),
    })
}

fn parse_u8_hex(token: &str, field: &'static str) -> Result<u8, DecodeError> {
    u8::from_str_radix(token, 16).map_err(|_| DecodeError::InvalidField {
        field,
        value: token.to_string(),
    })
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encodes a [`BusEvent`] as one outbound write: the ASCII frame followed
/// by the single NUL delimiter byte.
pub fn encode_event(event: &BusEvent) -> Vec<u8> {
    let mut text = format!(
        "< {} f {:03X} {} ",
        event.bus,
        event.frame.id(),
        event.frame.dlc()
    );
    for byte in event.frame.data() {
        text.push_str(&format!("{byte:02X} "));
    }
    text.push('>');

    let mut bytes = text.into_bytes();
    bytes.push(0);
    bytes
}

// ── Tests ─────────────────────────────────────────────────────────────────────
