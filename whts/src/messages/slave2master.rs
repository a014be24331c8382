//! Unicast replies from a slave to the master: configuration echoes
//! with a status byte, ping responses, and enrollment traffic.

use std::io::{self, Write};

use wirestruct::{int_enum, WriteTo};
use wirestruct_derive::{Size, WireStruct};

use super::decode_fixed;
use crate::{DecodeError, PacketId};

int_enum! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub enum MessageId: u8 {
		ConductionConfigResponse = 0x10,
		ResistanceConfigResponse = 0x11,
		ClipConfigResponse = 0x22,
		RstResponse = 0x30,
		PingResponse = 0x41,
		Announce = 0x50,
		ShortIdConfirm = 0x51,
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct ConductionConfigResponse {
	pub status: u8,
	pub time_slot: u8,
	pub interval: u8,
	pub total_conduction_num: u16,
	pub start_conduction_num: u16,
	pub conduction_num: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct ResistanceConfigResponse {
	pub status: u8,
	pub time_slot: u8,
	pub interval: u8,
	pub total_num: u16,
	pub start_num: u16,
	pub num: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct ClipConfigResponse {
	pub status: u8,
	pub interval: u8,
	pub mode: u8,
	pub clip_pin: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct RstResponse {
	pub status: u8,
	pub lock_status: u8,
	pub clip_led: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct PingResponse {
	pub sequence_number: u16,
	pub timestamp: u32,
}

/// Sent unsolicited by a slave so the master can register it and assign
/// a short id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct Announce {
	pub device_id: u32,
	pub version_major: u8,
	pub version_minor: u8,
	pub version_patch: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct ShortIdConfirm {
	pub status: u8,
	pub short_id: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
	ConductionConfigResponse(ConductionConfigResponse),
	ResistanceConfigResponse(ResistanceConfigResponse),
	ClipConfigResponse(ClipConfigResponse),
	RstResponse(RstResponse),
	PingResponse(PingResponse),
	Announce(Announce),
	ShortIdConfirm(ShortIdConfirm),
}

impl Message {
	pub fn id(&self) -> MessageId {
		match self {
			Message::ConductionConfigResponse(_) => MessageId::ConductionConfigResponse,
			Message::ResistanceConfigResponse(_) => MessageId::ResistanceConfigResponse,
			Message::ClipConfigResponse(_) => MessageId::ClipConfigResponse,
			Message::RstResponse(_) => MessageId::RstResponse,
			Message::PingResponse(_) => MessageId::PingResponse,
			Message::Announce(_) => MessageId::Announce,
			Message::ShortIdConfirm(_) => MessageId::ShortIdConfirm,
		}
	}

	pub fn decode(message_id: u8, body: &[u8]) -> Result<Message, DecodeError> {
		let id = MessageId::try_from(message_id).map_err(|raw| DecodeError::UnknownMessageId {
			packet_id: PacketId::SlaveToMaster,
			message_id: raw,
		})?;

		Ok(match id {
			MessageId::ConductionConfigResponse => {
				Message::ConductionConfigResponse(decode_fixed(body)?)
			}
			MessageId::ResistanceConfigResponse => {
				Message::ResistanceConfigResponse(decode_fixed(body)?)
			}
			MessageId::ClipConfigResponse => Message::ClipConfigResponse(decode_fixed(body)?),
			MessageId::RstResponse => Message::RstResponse(decode_fixed(body)?),
			MessageId::PingResponse => Message::PingResponse(decode_fixed(body)?),
			MessageId::Announce => Message::Announce(decode_fixed(body)?),
			MessageId::ShortIdConfirm => Message::ShortIdConfirm(decode_fixed(body)?),
		})
	}
}

impl WriteTo for Message {
	fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		match self {
			Message::ConductionConfigResponse(m) => m.write_to(writer),
			Message::ResistanceConfigResponse(m) => m.write_to(writer),
			Message::ClipConfigResponse(m) => m.write_to(writer),
			Message::RstResponse(m) => m.write_to(writer),
			Message::PingResponse(m) => m.write_to(writer),
			Message::Announce(m) => m.write_to(writer),
			Message::ShortIdConfirm(m) => m.write_to(writer),
		}
	}
}
