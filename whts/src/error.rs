use thiserror::Error;

use crate::PacketId;

/// Errors raised while delimiting and slicing frames out of a byte stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
	#[error("invalid frame delimiter: expected AB CD, got {0:02X} {1:02X}")]
	InvalidDelimiter(u8, u8),

	#[error("truncated frame: need {expected} bytes, have {actual}")]
	Truncated { expected: usize, actual: usize },

	#[error("frame payload of {0} bytes exceeds the u16 length field")]
	OversizePayload(usize),
}

/// Errors raised while decoding a frame payload into a typed packet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
	#[error("unknown packet id 0x{0:02X}")]
	UnknownPacketId(u8),

	#[error("unknown message id 0x{message_id:02X} for {packet_id:?}")]
	UnknownMessageId { packet_id: PacketId, message_id: u8 },

	#[error("message body too short: need at least {expected} bytes, have {actual}")]
	InsufficientBytes { expected: usize, actual: usize },

	#[error("declared length {declared} exceeds the {available} bytes remaining")]
	DeclaredLengthExceedsBuffer { declared: usize, available: usize },
}
