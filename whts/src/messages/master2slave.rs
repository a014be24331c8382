//! Commands broadcast from the master to the slave population. A
//! destination id of `BROADCAST_ID` addresses every slave.

use std::io::{self, Write};

use wirestruct::{int_enum, WriteTo};
use wirestruct_derive::{Size, WireStruct};

use super::decode_fixed;
use crate::{DecodeError, PacketId};

int_enum! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub enum MessageId: u8 {
		Sync = 0x00,
		ConductionConfig = 0x10,
		ResistanceConfig = 0x11,
		ClipConfig = 0x12,
		ReadConductionData = 0x20,
		ReadResistanceData = 0x21,
		ReadClipData = 0x22,
		Rst = 0x30,
		PingRequest = 0x40,
		ShortIdAssign = 0x50,
	}
}

/// Kicks off a collection cycle on every configured slave. `mode`
/// selects conduction (0), resistance (1), or clip (2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct Sync {
	pub mode: u8,
	pub timestamp: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct ConductionConfig {
	pub time_slot: u8,
	pub interval: u8,
	pub total_conduction_num: u16,
	pub start_conduction_num: u16,
	pub conduction_num: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct ResistanceConfig {
	pub time_slot: u8,
	pub interval: u8,
	pub total_num: u16,
	pub start_num: u16,
	pub num: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct ClipConfig {
	pub interval: u8,
	pub mode: u8,
	pub clip_pin: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct ReadConductionData {
	pub reserve: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct ReadResistanceData {
	pub reserve: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct ReadClipData {
	pub reserve: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct Rst {
	pub lock_status: u8,
	pub clip_led: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct PingRequest {
	pub sequence_number: u16,
	pub timestamp: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct ShortIdAssign {
	pub short_id: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
	Sync(Sync),
	ConductionConfig(ConductionConfig),
	ResistanceConfig(ResistanceConfig),
	ClipConfig(ClipConfig),
	ReadConductionData(ReadConductionData),
	ReadResistanceData(ReadResistanceData),
	ReadClipData(ReadClipData),
	Rst(Rst),
	PingRequest(PingRequest),
	ShortIdAssign(ShortIdAssign),
}

impl Message {
	pub fn id(&self) -> MessageId {
		match self {
			Message::Sync(_) => MessageId::Sync,
			Message::ConductionConfig(_) => MessageId::ConductionConfig,
			Message::ResistanceConfig(_) => MessageId::ResistanceConfig,
			Message::ClipConfig(_) => MessageId::ClipConfig,
			Message::ReadConductionData(_) => MessageId::ReadConductionData,
			Message::ReadResistanceData(_) => MessageId::ReadResistanceData,
			Message::ReadClipData(_) => MessageId::ReadClipData,
			Message::Rst(_) => MessageId::Rst,
			Message::PingRequest(_) => MessageId::PingRequest,
			Message::ShortIdAssign(_) => MessageId::ShortIdAssign,
		}
	}

	pub fn decode(message_id: u8, body: &[u8]) -> Result<Message, DecodeError> {
		let id = MessageId::try_from(message_id).map_err(|raw| DecodeError::UnknownMessageId {
			packet_id: PacketId::MasterToSlave,
			message_id: raw,
		})?;

		Ok(match id {
			MessageId::Sync => Message::Sync(decode_fixed(body)?),
			MessageId::ConductionConfig => Message::ConductionConfig(decode_fixed(body)?),
			MessageId::ResistanceConfig => Message::ResistanceConfig(decode_fixed(body)?),
			MessageId::ClipConfig => Message::ClipConfig(decode_fixed(body)?),
			MessageId::ReadConductionData => Message::ReadConductionData(decode_fixed(body)?),
			MessageId::ReadResistanceData => Message::ReadResistanceData(decode_fixed(body)?),
			MessageId::ReadClipData => Message::ReadClipData(decode_fixed(body)?),
			MessageId::Rst => Message::Rst(decode_fixed(body)?),
			MessageId::PingRequest => Message::PingRequest(decode_fixed(body)?),
			MessageId::ShortIdAssign => Message::ShortIdAssign(decode_fixed(body)?),
		})
	}
}

impl WriteTo for Message {
	fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		match self {
			Message::Sync(m) => m.write_to(writer),
			Message::ConductionConfig(m) => m.write_to(writer),
			Message::ResistanceConfig(m) => m.write_to(writer),
			Message::ClipConfig(m) => m.write_to(writer),
			Message::ReadConductionData(m) => m.write_to(writer),
			Message::ReadResistanceData(m) => m.write_to(writer),
			Message::ReadClipData(m) => m.write_to(writer),
			Message::Rst(m) => m.write_to(writer),
			Message::PingRequest(m) => m.write_to(writer),
			Message::ShortIdAssign(m) => m.write_to(writer),
		}
	}
}
