//! Protocol module: framing, the ASCII codec, and the beacon builder.

pub mod beacon;
pub mod codec;
pub mod framing;

pub use beacon::{build_beacon, BEACON_CAPACITY};
pub use codec::{decode_command, encode_event, DecodeError, MAX_BUS_NAME};
pub use framing::{FramingState, MAX_FRAME_LEN};
