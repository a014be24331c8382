//! Control-plane requests from the backend to the master.

use std::io::{self, Write};

use wirestruct::{int_enum, WriteTo};
use wirestruct_derive::{Size, WireStruct};

use super::{decode_counted, decode_fixed, SlaveConfigEntry, SlaveResetEntry};
use crate::{DecodeError, PacketId};

int_enum! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub enum MessageId: u8 {
		SlaveConfig = 0x00,
		ModeConfig = 0x01,
		Rst = 0x02,
		Ctrl = 0x03,
		PingControl = 0x10,
		DeviceListRequest = 0x11,
	}
}

/// Registers the slave population and its per-slave measurement
/// configuration. On the wire: a u8 count followed by fixed entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SlaveConfig {
	pub slaves: Vec<SlaveConfigEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct ModeConfig {
	pub mode: u8,
}

/// Resets the listed slaves. On the wire: a u8 count followed by fixed
/// entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rst {
	pub slaves: Vec<SlaveResetEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct Ctrl {
	pub running_status: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct PingControl {
	pub ping_mode: u8,
	pub ping_count: u16,
	pub interval: u16,
	pub destination_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, WireStruct, Size)]
pub struct DeviceListRequest {
	pub reserve: u8,
}

impl WriteTo for SlaveConfig {
	fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		(self.slaves.len() as u8).write_to(writer)?;
		for slave in &self.slaves {
			slave.write_to(writer)?;
		}
		Ok(())
	}
}

impl WriteTo for Rst {
	fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		(self.slaves.len() as u8).write_to(writer)?;
		for slave in &self.slaves {
			slave.write_to(writer)?;
		}
		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
	SlaveConfig(SlaveConfig),
	ModeConfig(ModeConfig),
	Rst(Rst),
	Ctrl(Ctrl),
	PingControl(PingControl),
	DeviceListRequest(DeviceListRequest),
}

impl Message {
	pub fn id(&self) -> MessageId {
		match self {
			Message::SlaveConfig(_) => MessageId::SlaveConfig,
			Message::ModeConfig(_) => MessageId::ModeConfig,
			Message::Rst(_) => MessageId::Rst,
			Message::Ctrl(_) => MessageId::Ctrl,
			Message::PingControl(_) => MessageId::PingControl,
			Message::DeviceListRequest(_) => MessageId::DeviceListRequest,
		}
	}

	pub fn decode(message_id: u8, body: &[u8]) -> Result<Message, DecodeError> {
		let id = MessageId::try_from(message_id).map_err(|raw| DecodeError::UnknownMessageId {
			packet_id: PacketId::BackendToMaster,
			message_id: raw,
		})?;

		Ok(match id {
			MessageId::SlaveConfig => {
				let count = counted_header(body)?;
				Message::SlaveConfig(SlaveConfig {
					slaves: decode_counted(count, &body[1..])?,
				})
			}
			MessageId::ModeConfig => Message::ModeConfig(decode_fixed(body)?),
			MessageId::Rst => {
				let count = counted_header(body)?;
				Message::Rst(Rst {
					slaves: decode_counted(count, &body[1..])?,
				})
			}
			MessageId::Ctrl => Message::Ctrl(decode_fixed(body)?),
			MessageId::PingControl => Message::PingControl(decode_fixed(body)?),
			MessageId::DeviceListRequest => Message::DeviceListRequest(decode_fixed(body)?),
		})
	}
}

fn counted_header(body: &[u8]) -> Result<usize, DecodeError> {
	match body.first() {
		Some(count) => Ok(*count as usize),
		None => Err(DecodeError::InsufficientBytes { expected: 1, actual: 0 }),
	}
}

impl WriteTo for Message {
	fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		match self {
			Message::SlaveConfig(m) => m.write_to(writer),
			Message::ModeConfig(m) => m.write_to(writer),
			Message::Rst(m) => m.write_to(writer),
			Message::Ctrl(m) => m.write_to(writer),
			Message::PingControl(m) => m.write_to(writer),
			Message::DeviceListRequest(m) => m.write_to(writer),
		}
	}
}
