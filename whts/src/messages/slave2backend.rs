//! Bulk measurement data a slave addresses to the backend. The master
//! forwards these frames upstream without reinterpreting the body.

use std::io::{self, Write};

use wirestruct::{int_enum, WriteTo};
use wirestruct_derive::{Size, WireStruct};

use super::decode_fixed;
use crate::{DecodeError, PacketId};

int_enum! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub enum MessageId: u8 {
		ConductionData = 0x00,
		ResistanceData = 0x01,
		ClipData = 0x02,
	}
}

/// A bit-packed conduction matrix, length-prefixed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConductionData {
	pub data: Vec<u8>,
}

/// A bit-packed resistance matrix, length-prefixed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResistanceData {
	pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct ClipData {
	pub data: u16,
}

impl WriteTo for ConductionData {
	fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		(self.data.len() as u16).write_to(writer)?;
		writer.write_all(&self.data)
	}
}

impl WriteTo for ResistanceData {
	fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		(self.data.len() as u16).write_to(writer)?;
		writer.write_all(&self.data)
	}
}

fn decode_length_prefixed(body: &[u8]) -> Result<Vec<u8>, DecodeError> {
	if body.len() < 2 {
		return Err(DecodeError::InsufficientBytes {
			expected: 2,
			actual: body.len(),
		});
	}

	let declared = u16::from_le_bytes([body[0], body[1]]) as usize;
	if 2 + declared > body.len() {
		return Err(DecodeError::DeclaredLengthExceedsBuffer {
			declared,
			available: body.len() - 2,
		});
	}

	Ok(body[2..2 + declared].to_vec())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
	ConductionData(ConductionData),
	ResistanceData(ResistanceData),
	ClipData(ClipData),
}

impl Message {
	pub fn id(&self) -> MessageId {
		match self {
			Message::ConductionData(_) => MessageId::ConductionData,
			Message::ResistanceData(_) => MessageId::ResistanceData,
			Message::ClipData(_) => MessageId::ClipData,
		}
	}

	pub fn decode(message_id: u8, body: &[u8]) -> Result<Message, DecodeError> {
		let id = MessageId::try_from(message_id).map_err(|raw| DecodeError::UnknownMessageId {
			packet_id: PacketId::SlaveToBackend,
			message_id: raw,
		})?;

		Ok(match id {
			MessageId::ConductionData => Message::ConductionData(ConductionData {
				data: decode_length_prefixed(body)?,
			}),
			MessageId::ResistanceData => Message::ResistanceData(ResistanceData {
				data: decode_length_prefixed(body)?,
			}),
			MessageId::ClipData => Message::ClipData(decode_fixed(body)?),
		})
	}
}

impl WriteTo for Message {
	fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		match self {
			Message::ConductionData(m) => m.write_to(writer),
			Message::ResistanceData(m) => m.write_to(writer),
			Message::ClipData(m) => m.write_to(writer),
		}
	}
}
